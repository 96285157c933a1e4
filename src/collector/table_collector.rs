//! Обход одной таблицы телеметрии с нормализацией и записью в хранилище.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::snmp::{OidPath, SnmpTransport, Termination, VendorProfile, WalkEngine, WalkOutcome};
use crate::store::{TelemetryStore, UpsertOutcome};
use crate::telemetry::{KindStrategy, NormalizedRecord, SessionContext, TelemetryKind};

/// Чем закончился обход одного вида телеметрии.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum TableStatus {
    /// У вендора нет корня для этого вида
    Skipped,
    Completed(String),
    NoResponse,
    ProtocolError(String),
}

impl TableStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, TableStatus::NoResponse | TableStatus::ProtocolError(_))
    }
}

/// Статистика одного обхода.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableStats {
    pub kind: TelemetryKind,
    /// Корень обхода, если он был
    pub root: Option<String>,
    /// Привязок получено от агента
    pub bindings: usize,
    /// Записей сохранено (включая обновления)
    pub stored: usize,
    /// Записей отброшено: ошибка декодирования или хранилища, устаревшие
    pub dropped: usize,
    pub status: TableStatus,
}

impl TableStats {
    fn new(kind: TelemetryKind, root: Option<&OidPath>) -> Self {
        Self {
            kind,
            root: root.map(ToString::to_string),
            bindings: 0,
            stored: 0,
            dropped: 0,
            status: TableStatus::Skipped,
        }
    }
}

/// Сборщик таблиц одного устройства.
pub struct TableCollector<'a> {
    device_id: i64,
    profile: &'a VendorProfile,
    store: Arc<dyn TelemetryStore>,
}

impl<'a> TableCollector<'a> {
    pub fn new(device_id: i64, profile: &'a VendorProfile, store: Arc<dyn TelemetryStore>) -> Self {
        Self {
            device_id,
            profile,
            store,
        }
    }

    /// Проходит таблицу `kind` целиком и только потом нормализует и сохраняет
    /// записи. Если обход оборвался, в хранилище и контекст сессии ничего
    /// не попадает.
    ///
    /// Ошибки отдельных записей гасятся здесь; ошибка транспорта возвращается
    /// в статусе, решение о судьбе устройства принимает сессия.
    pub async fn collect_table(
        &self,
        transport: &mut dyn SnmpTransport,
        kind: TelemetryKind,
        ctx: &mut SessionContext,
    ) -> TableStats {
        let root = self.profile.root(kind);
        let mut stats = TableStats::new(kind, root);
        let Some(root) = root else {
            debug!(device_id = self.device_id, %kind, vendor = %self.profile.name, "no root, walk skipped");
            return stats;
        };

        let (bindings, termination) = match WalkEngine::collect(transport, root.clone()).await {
            WalkOutcome::Bindings { bindings, termination } => (bindings, termination),
            WalkOutcome::NoResponse => {
                stats.status = TableStatus::NoResponse;
                return stats;
            }
            WalkOutcome::ProtocolError(reason) => {
                stats.status = TableStatus::ProtocolError(reason);
                return stats;
            }
        };
        stats.bindings = bindings.len();

        let strategy = self.profile.strategy(kind);
        let observed_at = Utc::now();
        let mut records = Vec::with_capacity(bindings.len());
        for binding in &bindings {
            let normalized = match strategy.normalize(ctx, root, self.profile.index_shape, binding) {
                Ok(normalized) => normalized,
                Err(e) => {
                    warn!(device_id = self.device_id, %kind, oid = %binding.oid, error = %e, "record dropped");
                    stats.dropped += 1;
                    continue;
                }
            };

            if let KindStrategy::Descriptor { offset, .. } = &strategy {
                if let Err(e) = ctx.observe_descriptor(*offset, &normalized.value, &normalized.if_index) {
                    warn!(device_id = self.device_id, oid = %binding.oid, error = %e, "descriptor dropped");
                    stats.dropped += 1;
                    continue;
                }
            }

            records.push(NormalizedRecord {
                device_id: self.device_id,
                if_index: normalized.if_index,
                kind,
                value: normalized.value,
                observed_at,
            });
        }

        self.store_records(records, &mut stats).await;
        stats.status = TableStatus::Completed(
            termination
                .as_ref()
                .map(describe_termination)
                .unwrap_or_else(|| "finished".to_string()),
        );
        info!(
            device_id = self.device_id,
            %kind,
            bindings = stats.bindings,
            stored = stats.stored,
            dropped = stats.dropped,
            "table collected"
        );
        stats
    }

    /// Пишет записи обхода пачкой в блокирующем пуле tokio.
    async fn store_records(&self, records: Vec<NormalizedRecord>, stats: &mut TableStats) {
        if records.is_empty() {
            return;
        }
        let store = Arc::clone(&self.store);
        let written = tokio::task::spawn_blocking(move || {
            let outcomes = store.upsert_batch(&records);
            (records, outcomes)
        })
        .await;

        let (records, outcomes) = match written {
            Ok(written) => written,
            Err(e) => {
                error!(device_id = self.device_id, kind = %stats.kind, error = %e, "store task failed");
                stats.dropped = stats.bindings;
                return;
            }
        };
        for (record, outcome) in records.iter().zip(outcomes) {
            match outcome {
                Ok(UpsertOutcome::Inserted | UpsertOutcome::Updated) => stats.stored += 1,
                Ok(UpsertOutcome::Stale) => stats.dropped += 1,
                Err(e) => {
                    warn!(device_id = self.device_id, kind = %record.kind, if_index = %record.if_index, error = %e, "store failed");
                    stats.dropped += 1;
                }
            }
        }
    }
}

fn describe_termination(t: &Termination) -> String {
    match t {
        Termination::MissingOid => "empty varbind list".to_string(),
        Termination::ShorterThanRoot => "OID shorter than root".to_string(),
        Termination::OutsideSubtree => "end of subtree".to_string(),
        Termination::Exception(kind) => format!("{kind:?}"),
        Termination::NotIncreasing => "OID not increasing".to_string(),
    }
}
