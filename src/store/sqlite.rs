use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use tracing::debug;

use super::{DeviceStatus, TelemetryStore, UpsertOutcome};
use crate::error::StoreError;
use crate::telemetry::{NormalizedRecord, TelemetryKind};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS onu_telemetry (
    device_id   INTEGER NOT NULL,
    if_index    TEXT    NOT NULL,
    kind        TEXT    NOT NULL,
    value       TEXT    NOT NULL,
    observed_at INTEGER NOT NULL,
    PRIMARY KEY (device_id, if_index, kind)
);
CREATE TABLE IF NOT EXISTS device_status (
    device_id  INTEGER PRIMARY KEY,
    error      TEXT,
    updated_at INTEGER NOT NULL
);
";

/// SQLite хранилище. Все запросы параметризованы.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Other(format!("Не удалось создать каталог {}: {e}", parent.display()))
                })?;
            }
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Текущее значение и время наблюдения для ключа.
    pub fn get(
        &self,
        device_id: i64,
        if_index: &str,
        kind: TelemetryKind,
    ) -> Result<Option<(String, DateTime<Utc>)>, StoreError> {
        let conn = self.conn.lock();
        let row: Option<(String, i64)> = conn
            .query_row(
                "SELECT value, observed_at FROM onu_telemetry
                 WHERE device_id = ?1 AND if_index = ?2 AND kind = ?3",
                params![device_id, if_index, kind.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        Ok(row.and_then(|(value, millis)| {
            Utc.timestamp_millis_opt(millis)
                .single()
                .map(|at| (value, at))
        }))
    }

    pub fn count(&self, device_id: i64) -> Result<usize, StoreError> {
        let conn = self.conn.lock();
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM onu_telemetry WHERE device_id = ?1",
            params![device_id],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    /// `None` — статус не записывался; `Some(None)` — ошибок нет.
    pub fn device_error(&self, device_id: i64) -> Result<Option<Option<String>>, StoreError> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT error FROM device_status WHERE device_id = ?1",
                params![device_id],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?;
        Ok(row)
    }

    fn set_status(&self, device_id: i64, error: Option<&str>) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO device_status (device_id, error, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(device_id) DO UPDATE SET error = excluded.error, updated_at = excluded.updated_at",
            params![device_id, error, Utc::now().timestamp_millis()],
        )?;
        Ok(())
    }
}

impl TelemetryStore for SqliteStore {
    fn upsert(&self, record: &NormalizedRecord) -> Result<UpsertOutcome, StoreError> {
        let conn = self.conn.lock();
        upsert_row(&conn, record)
    }

    /// Весь обход пишется одной транзакцией под одной блокировкой.
    fn upsert_batch(&self, records: &[NormalizedRecord]) -> Vec<Result<UpsertOutcome, StoreError>> {
        let mut conn = self.conn.lock();
        let tx = match conn.transaction() {
            Ok(tx) => tx,
            Err(e) => return fail_all(records.len(), &e),
        };
        let results: Vec<_> = records.iter().map(|record| upsert_row(&tx, record)).collect();
        match tx.commit() {
            Ok(()) => results,
            Err(e) => fail_all(records.len(), &e),
        }
    }
}

/// Сначала INSERT; при нарушении ключа — UPDATE, если запись не старее сохранённой.
fn upsert_row(conn: &Connection, record: &NormalizedRecord) -> Result<UpsertOutcome, StoreError> {
    let observed = record.observed_at.timestamp_millis();

    let inserted = conn.execute(
        "INSERT INTO onu_telemetry (device_id, if_index, kind, value, observed_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            record.device_id,
            record.if_index,
            record.kind.as_str(),
            record.value,
            observed
        ],
    );

    match inserted {
        Ok(_) => Ok(UpsertOutcome::Inserted),
        Err(rusqlite::Error::SqliteFailure(err, _)) if err.code == ErrorCode::ConstraintViolation => {
            debug!(
                device_id = record.device_id,
                if_index = %record.if_index,
                kind = %record.kind,
                "key exists, updating"
            );
            let changed = conn.execute(
                "UPDATE onu_telemetry SET value = ?4, observed_at = ?5
                 WHERE device_id = ?1 AND if_index = ?2 AND kind = ?3 AND observed_at <= ?5",
                params![
                    record.device_id,
                    record.if_index,
                    record.kind.as_str(),
                    record.value,
                    observed
                ],
            )?;
            Ok(if changed > 0 {
                UpsertOutcome::Updated
            } else {
                UpsertOutcome::Stale
            })
        }
        Err(e) => Err(e.into()),
    }
}

fn fail_all(n: usize, e: &rusqlite::Error) -> Vec<Result<UpsertOutcome, StoreError>> {
    (0..n)
        .map(|_| Err(StoreError::Other(format!("Ошибка транзакции SQLite: {e}"))))
        .collect()
}

impl DeviceStatus for SqliteStore {
    fn mark_error(&self, device_id: i64, reason: &str) -> Result<(), StoreError> {
        self.set_status(device_id, Some(reason))
    }

    fn clear_error(&self, device_id: i64) -> Result<(), StoreError> {
        self.set_status(device_id, None)
    }
}
