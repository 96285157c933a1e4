//! Хранилище нормализованной телеметрии и статуса устройств.

use crate::error::StoreError;
use crate::telemetry::NormalizedRecord;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Что произошло при upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    /// Ключ уже был, строка обновлена
    Updated,
    /// В хранилище уже более свежая запись
    Stale,
}

/// Приёмник записей. Ключ: `(device_id, if_index, kind)`; повторная запись
/// того же значения даёт то же итоговое состояние.
pub trait TelemetryStore: Send + Sync {
    fn upsert(&self, record: &NormalizedRecord) -> Result<UpsertOutcome, StoreError>;

    /// Записи одного обхода. Результаты идут в порядке `records`.
    fn upsert_batch(&self, records: &[NormalizedRecord]) -> Vec<Result<UpsertOutcome, StoreError>> {
        records.iter().map(|record| self.upsert(record)).collect()
    }
}

/// Статус ошибки устройства — единственный сохраняемый признак отказа.
pub trait DeviceStatus: Send + Sync {
    fn mark_error(&self, device_id: i64, reason: &str) -> Result<(), StoreError>;
    fn clear_error(&self, device_id: i64) -> Result<(), StoreError>;
}
