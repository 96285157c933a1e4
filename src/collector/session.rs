//! Сессия опроса одного устройства.
//!
//! `Init → ReachabilityChecked → DescriptorWalked → PowerWalked → MacWalked →
//! StatusWalked → Done`, либо `Failed`, если устройство недоступно или не
//! отдало таблицу дескрипторов. Ошибки обходов мощности, MAC и статуса
//! учитываются в статистике, но устройство не валят.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Duration;
use tracing::{error, info, warn};

use super::reachability::Reachability;
use super::table_collector::{TableCollector, TableStats, TableStatus};
use crate::error::PollError;
use crate::models::Device;
use crate::snmp::{Connector, SnmpTransport, VendorProfile};
use crate::store::{DeviceStatus, TelemetryStore};
use crate::telemetry::{SessionContext, TelemetryKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Init,
    ReachabilityChecked,
    DescriptorWalked,
    PowerWalked,
    MacWalked,
    StatusWalked,
    Done,
    Failed,
}

/// Итог сессии.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub device_id: i64,
    pub address: String,
    pub vendor: String,
    pub state: SessionState,
    /// Причина `Failed`
    pub error: Option<String>,
    pub tables: Vec<TableStats>,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl SessionReport {
    pub fn stored(&self) -> usize {
        self.tables.iter().map(|t| t.stored).sum()
    }

    pub fn table(&self, kind: TelemetryKind) -> Option<&TableStats> {
        self.tables.iter().find(|t| t.kind == kind)
    }
}

/// Окружение, общее для всех сессий: только чтение.
pub struct SessionEnv<'a> {
    pub connector: &'a dyn Connector,
    pub reachability: &'a dyn Reachability,
    pub probe_timeout: Duration,
    pub store: Arc<dyn TelemetryStore>,
    pub status: &'a dyn DeviceStatus,
}

/// Опрос одного устройства. Контекст (смещение индексов, таблица портов)
/// принадлежит сессии и создаётся заново для каждого устройства.
pub struct PollSession<'a> {
    device: &'a Device,
    profile: &'a VendorProfile,
    state: SessionState,
    ctx: SessionContext,
    tables: Vec<TableStats>,
}

impl<'a> PollSession<'a> {
    pub fn new(device: &'a Device, profile: &'a VendorProfile) -> Self {
        Self {
            device,
            profile,
            state: SessionState::Init,
            ctx: SessionContext::new(),
            tables: Vec::with_capacity(TelemetryKind::ALL.len()),
        }
    }

    /// Проводит сессию до `Done` или `Failed` и обновляет статус устройства.
    pub async fn run(mut self, env: &SessionEnv<'_>) -> SessionReport {
        let started_at = Utc::now();
        let clock = Instant::now();

        let error = match self.poll(env).await {
            Ok(()) => {
                self.state = SessionState::Done;
                if let Err(e) = env.status.clear_error(self.device.id) {
                    error!(device_id = self.device.id, error = %e, "failed to clear device error");
                }
                None
            }
            Err(e) => {
                self.state = SessionState::Failed;
                let reason = failure_reason(&e);
                warn!(device_id = self.device.id, address = %self.device.address, %reason, "poll failed");
                if let Err(e) = env.status.mark_error(self.device.id, &reason) {
                    error!(device_id = self.device.id, error = %e, "failed to mark device error");
                }
                Some(reason)
            }
        };

        let report = SessionReport {
            device_id: self.device.id,
            address: self.device.address.clone(),
            vendor: self.profile.name.clone(),
            state: self.state,
            error,
            tables: self.tables,
            started_at,
            elapsed_ms: clock.elapsed().as_millis() as u64,
        };
        info!(
            device_id = report.device_id,
            state = ?report.state,
            stored = report.stored(),
            elapsed_ms = report.elapsed_ms,
            "device polled"
        );
        report
    }

    async fn poll(&mut self, env: &SessionEnv<'_>) -> Result<(), PollError> {
        if !env.reachability.is_up(&self.device.address, env.probe_timeout).await {
            return Err(PollError::Unreachable(self.device.address.clone()));
        }
        self.state = SessionState::ReachabilityChecked;

        let mut transport = env.connector.connect(self.device).await?;
        let collector = TableCollector::new(self.device.id, self.profile, Arc::clone(&env.store));

        let descriptors = self.collect(&collector, transport.as_mut(), TelemetryKind::IfDescr).await;
        match descriptors {
            TableStatus::NoResponse => return Err(PollError::NoResponse),
            TableStatus::ProtocolError(reason) => return Err(PollError::Protocol(reason)),
            TableStatus::Skipped | TableStatus::Completed(_) => {}
        }
        self.state = SessionState::DescriptorWalked;

        for (kind, next) in [
            (TelemetryKind::Power, SessionState::PowerWalked),
            (TelemetryKind::Mac, SessionState::MacWalked),
            (TelemetryKind::Status, SessionState::StatusWalked),
        ] {
            let status = self.collect(&collector, transport.as_mut(), kind).await;
            if status.is_failure() {
                warn!(device_id = self.device.id, %kind, ?status, "walk failed, continuing");
            }
            self.state = next;
        }
        Ok(())
    }

    async fn collect(
        &mut self,
        collector: &TableCollector<'_>,
        transport: &mut dyn SnmpTransport,
        kind: TelemetryKind,
    ) -> TableStatus {
        let stats = collector.collect_table(transport, kind, &mut self.ctx).await;
        let status = stats.status.clone();
        self.tables.push(stats);
        status
    }
}

fn failure_reason(e: &PollError) -> String {
    match e {
        PollError::Unreachable(_) => "unreachable".to_string(),
        PollError::NoResponse => "SNMP: no response".to_string(),
        PollError::Protocol(reason) => format!("SNMP: protocol error: {reason}"),
    }
}
