//! Нормализация ONU телеметрии: индексы таблиц, значения, корреляция портов.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod correlation;
pub mod index;
pub mod normalize;

pub use correlation::PortCorrelationTable;
pub use index::IndexShape;
pub use normalize::{KindStrategy, Normalized, OffsetRule, PowerFormat, PowerIndex, SessionContext};

/// Вид телеметрии, который снимается отдельным обходом.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TelemetryKind {
    IfDescr,
    Power,
    Mac,
    Status,
}

impl TelemetryKind {
    /// Порядок обходов в сессии: дескрипторы всегда первыми.
    pub const ALL: [TelemetryKind; 4] = [
        TelemetryKind::IfDescr,
        TelemetryKind::Power,
        TelemetryKind::Mac,
        TelemetryKind::Status,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TelemetryKind::IfDescr => "IFDESCR",
            TelemetryKind::Power => "POWER",
            TelemetryKind::Mac => "MAC",
            TelemetryKind::Status => "STATUS",
        }
    }
}

impl fmt::Display for TelemetryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Запись, которая уходит в хранилище. Ключ: `(device_id, if_index, kind)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub device_id: i64,
    /// Может быть составным, например `"1.12"`
    pub if_index: String,
    pub kind: TelemetryKind,
    pub value: String,
    pub observed_at: DateTime<Utc>,
}
