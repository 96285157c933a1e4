//! Ошибки поллера.
//!
//! Уровни: ошибки записи (`DecodeError`) гасятся на месте, ошибки обхода
//! (`WalkError`) гасятся на уровне вида телеметрии, и только недоступность
//! устройства и отказ обхода дескрипторов поднимаются до статуса устройства.

use thiserror::Error;

use crate::telemetry::TelemetryKind;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Невалидный OID '{input}': {reason}")]
pub struct MalformedOid {
    pub input: String,
    pub reason: String,
}

impl MalformedOid {
    pub fn new(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            reason: reason.into(),
        }
    }
}

/// Ошибки транспорта одного GETNEXT.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Исчерпаны повторы/таймаут
    #[error("Агент не отвечает")]
    NoResponse,

    #[error("Ошибка протокола: {0}")]
    Protocol(String),
}

/// Ошибки обхода поддерева.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalkError {
    #[error("Нет ответа")]
    NoResponse,

    #[error("Ошибка протокола: {0}")]
    Protocol(String),
}

impl From<TransportError> for WalkError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::NoResponse => WalkError::NoResponse,
            TransportError::Protocol(reason) => WalkError::Protocol(reason),
        }
    }
}

/// Значение не удалось привести к каноническому виду; запись отбрасывается.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("У OID {oid} нет индекса под корнем {root}")]
    MissingIndex { oid: String, root: String },

    #[error("Неожиданное значение {kind}: {detail}")]
    UnexpectedValue { kind: TelemetryKind, detail: String },

    #[error("Порт '{0}' отсутствует в таблице дескрипторов")]
    UnknownPort(String),

    #[error("Нужно смещение индекса, но индексов дескрипторов не было")]
    OffsetUnknown,

    #[error("Индекс {0} после смещения не совпадает ни с одним дескриптором")]
    UncorrelatedIndex(String),
}

impl DecodeError {
    pub fn unexpected(kind: TelemetryKind, detail: impl Into<String>) -> Self {
        DecodeError::UnexpectedValue {
            kind,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Ошибка SQLite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Ошибка хранилища: {0}")]
    Other(String),
}

/// Ошибки уровня устройства: с ними сессия завершается в `Failed`.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("Устройство {0} недоступно")]
    Unreachable(String),

    #[error("Нет ответа")]
    NoResponse,

    #[error("Ошибка протокола: {0}")]
    Protocol(String),
}

impl From<WalkError> for PollError {
    fn from(e: WalkError) -> Self {
        match e {
            WalkError::NoResponse => PollError::NoResponse,
            WalkError::Protocol(reason) => PollError::Protocol(reason),
        }
    }
}

impl From<TransportError> for PollError {
    fn from(e: TransportError) -> Self {
        WalkError::from(e).into()
    }
}
