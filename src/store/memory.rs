use std::collections::HashMap;

use parking_lot::Mutex;

use super::{DeviceStatus, TelemetryStore, UpsertOutcome};
use crate::error::StoreError;
use crate::telemetry::{NormalizedRecord, TelemetryKind};

type Key = (i64, String, TelemetryKind);

/// Хранилище в памяти (режим `--dry-run` и тесты).
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<Key, NormalizedRecord>>,
    errors: Mutex<HashMap<i64, Option<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn get(&self, device_id: i64, if_index: &str, kind: TelemetryKind) -> Option<NormalizedRecord> {
        self.records
            .lock()
            .get(&(device_id, if_index.to_string(), kind))
            .cloned()
    }

    /// Все записи устройства, отсортированные по (kind, if_index)
    pub fn records_for(&self, device_id: i64) -> Vec<NormalizedRecord> {
        let mut out: Vec<NormalizedRecord> = self
            .records
            .lock()
            .values()
            .filter(|r| r.device_id == device_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| (a.kind, &a.if_index).cmp(&(b.kind, &b.if_index)));
        out
    }

    pub fn count_kind(&self, device_id: i64, kind: TelemetryKind) -> usize {
        self.records
            .lock()
            .values()
            .filter(|r| r.device_id == device_id && r.kind == kind)
            .count()
    }

    /// `None` — устройство ещё не опрашивалось; `Some(None)` — ошибок нет.
    pub fn device_error(&self, device_id: i64) -> Option<Option<String>> {
        self.errors.lock().get(&device_id).cloned()
    }
}

impl TelemetryStore for MemoryStore {
    fn upsert(&self, record: &NormalizedRecord) -> Result<UpsertOutcome, StoreError> {
        let key = (record.device_id, record.if_index.clone(), record.kind);
        let mut records = self.records.lock();
        match records.get_mut(&key) {
            None => {
                records.insert(key, record.clone());
                Ok(UpsertOutcome::Inserted)
            }
            Some(existing) if existing.observed_at <= record.observed_at => {
                existing.value = record.value.clone();
                existing.observed_at = record.observed_at;
                Ok(UpsertOutcome::Updated)
            }
            Some(_) => Ok(UpsertOutcome::Stale),
        }
    }
}

impl DeviceStatus for MemoryStore {
    fn mark_error(&self, device_id: i64, reason: &str) -> Result<(), StoreError> {
        self.errors.lock().insert(device_id, Some(reason.to_string()));
        Ok(())
    }

    fn clear_error(&self, device_id: i64) -> Result<(), StoreError> {
        self.errors.lock().insert(device_id, None);
        Ok(())
    }
}
