use async_trait::async_trait;

use crate::error::TransportError;
use crate::models::Device;

pub mod agent;
pub mod device_profiles;
pub mod oid;
pub mod v2c;
pub mod walk;

pub use device_profiles::{VendorProfile, VendorRegistry};
pub use oid::OidPath;
pub use v2c::{SnmpClientV2c, V2cConnector};
pub use walk::{Termination, Walk, WalkEngine, WalkOutcome};

/// Исключения SNMPv2 вместо значения
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionKind {
    NoSuchObject,
    NoSuchInstance,
    EndOfMibView,
}

/// Декодированное значение привязки.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    Integer(i64),
    /// Непечатные октеты
    OctetStringHex(Vec<u8>),
    DisplayString(String),
    ExceptionMarker(ExceptionKind),
}

impl RawValue {
    /// Печатная строка становится `DisplayString`, остальное остаётся байтами.
    pub fn from_octets(bytes: &[u8]) -> Self {
        if !bytes.is_empty() && bytes.iter().all(|b| (32..=126).contains(b)) {
            RawValue::DisplayString(String::from_utf8_lossy(bytes).into_owned())
        } else if bytes.is_empty() {
            RawValue::DisplayString(String::new())
        } else {
            RawValue::OctetStringHex(bytes.to_vec())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableBinding {
    pub oid: OidPath,
    pub value: RawValue,
}

/// Ответ на один GETNEXT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetNextResponse {
    pub error_status: u32,
    /// `None`, если агент вернул пустой список привязок
    pub binding: Option<VariableBinding>,
}

/// Транспорт одного устройства: один GETNEXT за раз.
///
/// Политика повторов и таймаутов принадлежит реализации; исчерпание повторов
/// возвращается как [`TransportError::NoResponse`].
#[async_trait]
pub trait SnmpTransport: Send {
    async fn get_next(&mut self, oid: &OidPath) -> Result<GetNextResponse, TransportError>;
}

/// Создаёт транспорт на каждую сессию опроса.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, device: &Device) -> Result<Box<dyn SnmpTransport>, TransportError>;
}
