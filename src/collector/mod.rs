use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio::time::Duration;
use tracing::info;

use crate::models::Device;
use crate::snmp::{Connector, VendorRegistry};
use crate::store::{DeviceStatus, TelemetryStore};

pub mod reachability;
pub mod session;
pub mod table_collector;

pub use reachability::{AlwaysUp, Reachability, TcpEchoProbe};
pub use session::{PollSession, SessionEnv, SessionReport, SessionState};
pub use table_collector::{TableCollector, TableStats, TableStatus};

/// Опрашивает набор устройств пулом из `workers` параллельных сессий.
///
/// У каждого устройства своя сессия и свой транспорт; общие здесь только
/// реестр профилей и хранилище.
pub struct Poller {
    registry: Arc<VendorRegistry>,
    connector: Arc<dyn Connector>,
    reachability: Arc<dyn Reachability>,
    store: Arc<dyn TelemetryStore>,
    status: Arc<dyn DeviceStatus>,
    probe_timeout: Duration,
    workers: usize,
}

impl Poller {
    pub fn new(
        registry: Arc<VendorRegistry>,
        connector: Arc<dyn Connector>,
        store: Arc<dyn TelemetryStore>,
        status: Arc<dyn DeviceStatus>,
    ) -> Self {
        Self {
            registry,
            connector,
            reachability: Arc::new(AlwaysUp),
            store,
            status,
            probe_timeout: Duration::from_secs(5),
            workers: 1,
        }
    }

    pub fn with_reachability(mut self, reachability: Arc<dyn Reachability>, timeout: Duration) -> Self {
        self.reachability = reachability;
        self.probe_timeout = timeout;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Одна сессия для одного устройства.
    pub async fn poll_device(&self, device: &Device) -> SessionReport {
        let env = SessionEnv {
            connector: self.connector.as_ref(),
            reachability: self.reachability.as_ref(),
            probe_timeout: self.probe_timeout,
            store: Arc::clone(&self.store),
            status: self.status.as_ref(),
        };
        let profile = self.registry.profile(&device.vendor);
        PollSession::new(device, profile).run(&env).await
    }

    /// Опрашивает все устройства. Порядок отчётов соответствует порядку
    /// завершения сессий.
    pub async fn poll_all(&self, devices: &[Device]) -> Vec<SessionReport> {
        info!(devices = devices.len(), workers = self.workers, "poll cycle started");
        let reports: Vec<SessionReport> = stream::iter(devices)
            .map(|device| self.poll_device(device))
            .buffer_unordered(self.workers)
            .collect()
            .await;

        let failed = reports
            .iter()
            .filter(|r| r.state == SessionState::Failed)
            .count();
        info!(devices = reports.len(), failed, "poll cycle finished");
        reports
    }
}
