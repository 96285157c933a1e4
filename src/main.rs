use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use onu_poller::collector::{AlwaysUp, Poller, Reachability, TcpEchoProbe};
use onu_poller::config::AppConfig;
use onu_poller::formatter::JsonFormatter;
use onu_poller::inventory::{DeviceSource, YamlInventory};
use onu_poller::snmp::V2cConnector;
use onu_poller::store::{DeviceStatus, MemoryStore, SqliteStore, TelemetryStore};

/// Опрос ONU телеметрии с OLT по SNMP
#[derive(Parser, Debug)]
#[command(name = "onu-poller")]
#[command(version, about, long_about = None)]
struct Args {
    /// Файл настроек
    #[arg(short, long, default_value = "./profiles/poller.yaml")]
    config: String,

    /// Файл инвентаря (перекрывает настройки)
    #[arg(short, long)]
    inventory: Option<String>,

    /// Опросить только устройство с этим адресом или именем
    #[arg(short, long)]
    device: Option<String>,

    /// Не писать в базу, хранить записи в памяти
    #[arg(long)]
    dry_run: bool,

    /// Количество параллельных сессий
    #[arg(short, long)]
    workers: Option<usize>,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config = AppConfig::load_or_default(&args.config)?;
    let registry = Arc::new(config.vendor_registry()?);

    let inventory_path = args
        .inventory
        .clone()
        .unwrap_or_else(|| config.settings.inventory.path.clone());
    let devices = YamlInventory::new(inventory_path)
        .only(args.device.clone())
        .list_pollable()?;
    if devices.is_empty() {
        info!("no pollable devices");
    }

    let (store, status): (Arc<dyn TelemetryStore>, Arc<dyn DeviceStatus>) = if args.dry_run {
        let store = Arc::new(MemoryStore::new());
        (store.clone() as Arc<dyn TelemetryStore>, store as Arc<dyn DeviceStatus>)
    } else {
        let path = config.get_db_path();
        let store = Arc::new(
            SqliteStore::open(&path).with_context(|| format!("Не удалось открыть базу данных {path}"))?,
        );
        (store.clone() as Arc<dyn TelemetryStore>, store as Arc<dyn DeviceStatus>)
    };

    let reachability: Arc<dyn Reachability> = if config.settings.probe.enabled {
        Arc::new(TcpEchoProbe::new(config.settings.probe.port))
    } else {
        Arc::new(AlwaysUp)
    };

    let connector = Arc::new(V2cConnector::new(config.get_timeout(), config.get_retries()));
    let workers = args.workers.unwrap_or_else(|| config.get_workers());

    let poller = Poller::new(registry, connector, store, status)
        .with_reachability(reachability, config.get_probe_timeout())
        .with_workers(workers);

    let reports = poller.poll_all(&devices).await;
    println!("{}", JsonFormatter::to_json_string(&reports, args.dry_run)?);
    Ok(())
}
