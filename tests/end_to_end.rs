use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Duration;

use onu_poller::collector::{Poller, Reachability, SessionState, TableStatus};
use onu_poller::error::TransportError;
use onu_poller::models::Device;
use onu_poller::snmp::agent::TableAgent;
use onu_poller::snmp::{Connector, RawValue, SnmpTransport, VendorRegistry};
use onu_poller::store::{DeviceStatus, MemoryStore, SqliteStore, TelemetryStore};
use onu_poller::telemetry::TelemetryKind;

/// Агенты по id устройства, каждый отдаётся на одно подключение.
#[derive(Default)]
struct Agents(Mutex<HashMap<i64, TableAgent>>);

impl Agents {
    fn with(self, device_id: i64, agent: TableAgent) -> Self {
        self.0.lock().insert(device_id, agent);
        self
    }
}

#[async_trait]
impl Connector for Agents {
    async fn connect(&self, device: &Device) -> Result<Box<dyn SnmpTransport>, TransportError> {
        self.0
            .lock()
            .remove(&device.id)
            .map(|agent| Box::new(agent) as Box<dyn SnmpTransport>)
            .ok_or_else(|| TransportError::Protocol(format!("no agent for {}", device.id)))
    }
}

/// Все адреса доступны, кроме перечисленных.
struct Blocklist(Vec<&'static str>);

#[async_trait]
impl Reachability for Blocklist {
    async fn is_up(&self, address: &str, _timeout: Duration) -> bool {
        !self.0.iter().any(|blocked| *blocked == address)
    }
}

fn device(id: i64, vendor: &str) -> Device {
    Device {
        id,
        name: Some(format!("olt-{id}")),
        address: format!("10.10.0.{id}"),
        vendor: vendor.into(),
        community: "public".into(),
        port: 161,
    }
}

fn text(s: &str) -> RawValue {
    RawValue::DisplayString(s.to_string())
}

fn mac(last: u8) -> RawValue {
    RawValue::OctetStringHex(vec![0x00, 0x1a, 0x2b, 0x3c, 0x4d, last])
}

fn bdcom_agent() -> TableAgent {
    TableAgent::new()
        .with("1.3.6.1.2.1.31.1.1.1.1.10", text("EPON0/1:1"))
        .with("1.3.6.1.2.1.31.1.1.1.1.11", text("EPON0/1:2"))
        .with("1.3.6.1.4.1.3320.101.10.1.1.3.10", mac(0x01))
        .with("1.3.6.1.4.1.3320.101.10.1.1.3.11", text("e0:67:b3:00:11:22"))
        .with("1.3.6.1.4.1.3320.101.10.1.1.26.10", RawValue::Integer(3))
        .with("1.3.6.1.4.1.3320.101.10.1.1.26.11", RawValue::Integer(4))
        .with("1.3.6.1.4.1.3320.101.10.5.1.5.10", RawValue::Integer(-215))
        .with("1.3.6.1.4.1.3320.101.10.5.1.5.11", RawValue::Integer(-198))
}

/// VSOL: дескрипторы с индекса `first`, MAC таблица с 1.
fn vsol_agent(first: u64) -> TableAgent {
    let descr = "1.3.6.1.4.1.37950.1.1.5.12.2.1.14.1.2";
    let power = "1.3.6.1.4.1.37950.1.1.5.12.2.1.8.1.7";
    let macs = "1.3.6.1.4.1.37950.1.1.5.10.3.2.1.3";
    TableAgent::new()
        .with(&format!("{descr}.{first}"), text("EPON01ONU1 online"))
        .with(&format!("{descr}.{}", first + 1), text("EPON01ONU2"))
        .with(&format!("{descr}.{}", first + 2), text("EPON02ONU1 offline"))
        .with(&format!("{power}.1.1"), text("0.0347 mW (-14.60 dBm)"))
        .with(&format!("{power}.1.2"), text(""))
        .with(&format!("{power}.2.1"), text("0.0102 mW (-19.91 dBm)"))
        .with(&format!("{power}.3.9"), text("0.0200 mW (-16.99 dBm)"))
        .with(&format!("{macs}.1"), mac(0xa1))
        .with(&format!("{macs}.2"), mac(0xa2))
        .with(&format!("{macs}.40"), mac(0xff))
}

fn poller(agents: Agents, reach: Blocklist, store: Arc<MemoryStore>, workers: usize) -> Poller {
    Poller::new(
        Arc::new(VendorRegistry::builtin()),
        Arc::new(agents),
        store.clone() as Arc<dyn TelemetryStore>,
        store as Arc<dyn DeviceStatus>,
    )
    .with_reachability(Arc::new(reach), Duration::from_millis(50))
    .with_workers(workers)
}

#[tokio::test]
async fn unreachable_device_is_marked_and_nothing_is_stored() {
    let store = Arc::new(MemoryStore::new());
    let poller = poller(
        Agents::default().with(1, bdcom_agent()),
        Blocklist(vec!["10.10.0.1"]),
        store.clone(),
        1,
    );

    let report = poller.poll_device(&device(1, "BDCOM")).await;

    assert_eq!(report.state, SessionState::Failed);
    assert!(report.tables.is_empty());
    assert!(store.is_empty());
    assert_eq!(store.device_error(1), Some(Some("unreachable".into())));
}

#[tokio::test]
async fn descriptor_timeout_fails_device_and_skips_other_walks() {
    let store = Arc::new(MemoryStore::new());
    let poller = poller(
        Agents::default().with(2, bdcom_agent().silent()),
        Blocklist(Vec::new()),
        store.clone(),
        1,
    );

    let report = poller.poll_device(&device(2, "BDCOM")).await;

    assert_eq!(report.state, SessionState::Failed);
    assert_eq!(report.tables.len(), 1);
    assert_eq!(report.tables[0].status, TableStatus::NoResponse);
    assert!(store.is_empty());
    assert_eq!(store.device_error(2), Some(Some("SNMP: no response".into())));
}

#[tokio::test]
async fn power_timeout_does_not_block_mac_and_status() {
    let store = Arc::new(MemoryStore::new());
    store.mark_error(3, "SNMP: no response").unwrap();
    let agent = bdcom_agent().silent_under("1.3.6.1.4.1.3320.101.10.5.1.5");
    let poller = poller(Agents::default().with(3, agent), Blocklist(Vec::new()), store.clone(), 1);

    let report = poller.poll_device(&device(3, "BDCOM")).await;

    assert_eq!(report.state, SessionState::Done);
    assert_eq!(
        report.table(TelemetryKind::Power).map(|t| &t.status),
        Some(&TableStatus::NoResponse)
    );
    assert_eq!(store.count_kind(3, TelemetryKind::IfDescr), 2);
    assert_eq!(store.count_kind(3, TelemetryKind::Power), 0);
    assert_eq!(store.count_kind(3, TelemetryKind::Mac), 2);
    assert_eq!(store.count_kind(3, TelemetryKind::Status), 2);

    assert_eq!(store.get(3, "10", TelemetryKind::Mac).unwrap().value, "00:1A:2B:3C:4D:01");
    assert_eq!(store.get(3, "11", TelemetryKind::Mac).unwrap().value, "E0:67:B3:00:11:22");
    assert_eq!(store.get(3, "10", TelemetryKind::Status).unwrap().value, "1");
    assert_eq!(store.get(3, "11", TelemetryKind::Status).unwrap().value, "2");
    assert_eq!(store.device_error(3), Some(None));
}

#[tokio::test]
async fn vsol_power_is_correlated_through_port_names() {
    let store = Arc::new(MemoryStore::new());
    let poller = poller(
        Agents::default().with(4, vsol_agent(5)),
        Blocklist(Vec::new()),
        store.clone(),
        1,
    );

    let report = poller.poll_device(&device(4, "VSOL")).await;
    assert_eq!(report.state, SessionState::Done);

    assert_eq!(store.get(4, "5", TelemetryKind::IfDescr).unwrap().value, "EPON0/1:1");
    assert_eq!(store.get(4, "7", TelemetryKind::IfDescr).unwrap().value, "EPON0/2:1");

    assert_eq!(store.get(4, "5", TelemetryKind::Power).unwrap().value, "-14.60");
    assert_eq!(store.get(4, "6", TelemetryKind::Power).unwrap().value, "0");
    assert_eq!(store.get(4, "7", TelemetryKind::Power).unwrap().value, "-19.91");
    let power = report.table(TelemetryKind::Power).unwrap();
    assert_eq!((power.bindings, power.stored, power.dropped), (4, 3, 1));

    // MAC индекс 1 + смещение 5
    assert_eq!(store.get(4, "6", TelemetryKind::Mac).unwrap().value, "00:1A:2B:3C:4D:A1");
    assert_eq!(store.get(4, "7", TelemetryKind::Mac).unwrap().value, "00:1A:2B:3C:4D:A2");
    assert_eq!(store.count_kind(4, TelemetryKind::Mac), 2);

    assert_eq!(
        report.table(TelemetryKind::Status).map(|t| &t.status),
        Some(&TableStatus::Skipped)
    );
}

#[tokio::test]
async fn concurrent_sessions_do_not_share_offsets() {
    let store = Arc::new(MemoryStore::new());
    let poller = poller(
        Agents::default().with(5, vsol_agent(5)).with(6, vsol_agent(100)),
        Blocklist(Vec::new()),
        store.clone(),
        2,
    );

    let reports = poller.poll_all(&[device(5, "VSOL"), device(6, "VSOL")]).await;
    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(|r| r.state == SessionState::Done));

    assert!(store.get(5, "6", TelemetryKind::Mac).is_some());
    assert!(store.get(5, "101", TelemetryKind::Mac).is_none());
    assert!(store.get(6, "101", TelemetryKind::Mac).is_some());
    assert!(store.get(6, "6", TelemetryKind::Mac).is_none());
    assert_eq!(store.get(6, "100", TelemetryKind::Power).unwrap().value, "-14.60");
}

/// DBC: только MAC таблица, дескрипторов нет.
fn dbc_agent_without_descriptors() -> TableAgent {
    TableAgent::new()
        .with("1.3.6.1.4.1.37950.1.1.5.12.1.12.1.6.1", mac(0xd1))
        .with("1.3.6.1.4.1.37950.1.1.5.12.1.12.1.6.2", mac(0xd2))
}

#[tokio::test]
async fn sequential_sessions_of_different_vendors_start_clean() {
    let store = Arc::new(MemoryStore::new());
    let poller = poller(
        Agents::default()
            .with(20, vsol_agent(5))
            .with(21, bdcom_agent())
            .with(22, dbc_agent_without_descriptors()),
        Blocklist(Vec::new()),
        store.clone(),
        1,
    );

    let vsol = poller.poll_device(&device(20, "VSOL")).await;
    assert_eq!(vsol.state, SessionState::Done);
    assert!(store.get(20, "6", TelemetryKind::Mac).is_some());

    let bdcom = poller.poll_device(&device(21, "BDCOM")).await;
    assert_eq!(bdcom.state, SessionState::Done);
    // индексы BDCOM берутся как есть: ни смещения 5, ни портов VSOL
    assert_eq!(store.get(21, "10", TelemetryKind::IfDescr).unwrap().value, "EPON0/1:1");
    assert_eq!(store.get(21, "10", TelemetryKind::Mac).unwrap().value, "00:1A:2B:3C:4D:01");
    assert_eq!(store.get(21, "11", TelemetryKind::Mac).unwrap().value, "E0:67:B3:00:11:22");
    assert!(store.get(21, "15", TelemetryKind::Mac).is_none());
    assert!(store.get(21, "16", TelemetryKind::Mac).is_none());
    assert_eq!(store.get(21, "10", TelemetryKind::Power).unwrap().value, "-21.5");
    assert!(store.get(21, "5", TelemetryKind::Power).is_none());

    // смещение VSOL не переходит в сессию DBC
    let dbc = poller.poll_device(&device(22, "DBC")).await;
    assert_eq!(dbc.state, SessionState::Done);
    let macs = dbc.table(TelemetryKind::Mac).unwrap();
    assert_eq!((macs.bindings, macs.stored, macs.dropped), (2, 0, 2));
    assert!(store.records_for(22).is_empty());
}

#[tokio::test]
async fn failed_device_does_not_affect_others() {
    let store = Arc::new(MemoryStore::new());
    let poller = poller(
        Agents::default().with(7, bdcom_agent()).with(8, bdcom_agent()),
        Blocklist(vec!["10.10.0.8"]),
        store.clone(),
        4,
    );

    let reports = poller
        .poll_all(&[device(7, "BDCOM"), device(8, "BDCOM"), device(9, "BDCOM")])
        .await;

    let state = |id: i64| reports.iter().find(|r| r.device_id == id).map(|r| r.state);
    assert_eq!(state(7), Some(SessionState::Done));
    assert_eq!(state(8), Some(SessionState::Failed));
    // нет агента: подключение не удалось
    assert_eq!(state(9), Some(SessionState::Failed));
    assert_eq!(store.records_for(7).len(), 8);
    assert!(store.records_for(8).is_empty());
    assert_eq!(
        store.device_error(9),
        Some(Some("SNMP: protocol error: no agent for 9".into()))
    );
}

#[tokio::test]
async fn repeated_cycles_keep_one_row_per_key_in_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteStore::open(dir.path().join("onu.db")).unwrap());

    for _ in 0..2 {
        let poller = Poller::new(
            Arc::new(VendorRegistry::builtin()),
            Arc::new(Agents::default().with(10, bdcom_agent())),
            store.clone() as Arc<dyn TelemetryStore>,
            store.clone() as Arc<dyn DeviceStatus>,
        );
        let report = poller.poll_device(&device(10, "BDCOM")).await;
        assert_eq!(report.state, SessionState::Done);
    }

    assert_eq!(store.count(10).unwrap(), 8);
    assert_eq!(
        store.get(10, "10", TelemetryKind::Power).unwrap().map(|(v, _)| v).as_deref(),
        Some("-21.5")
    );
    assert_eq!(store.device_error(10).unwrap(), Some(None));
}
