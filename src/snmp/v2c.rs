use async_trait::async_trait;
use snmp2::{AsyncSession, Oid, Value};
use tokio::time::{Duration, timeout};
use tracing::{debug, warn};

use super::{Connector, ExceptionKind, GetNextResponse, OidPath, RawValue, SnmpTransport, VariableBinding};
use crate::error::TransportError;
use crate::models::Device;

pub struct SnmpClientV2c {
    pub(crate) session: AsyncSession,
    target: String,
    timeout: Duration,
    retries: u32,
}

impl SnmpClientV2c {
    pub async fn new(
        target: &str,
        community: &[u8],
        timeout: Duration,
        retries: u32,
    ) -> Result<Self, TransportError> {
        let session = AsyncSession::new_v2c(target, community, 0)
            .await
            .map_err(|e| TransportError::Protocol(format!("Не удалось создать SNMP сессию к {target}: {e}")))?;

        Ok(Self {
            session,
            target: target.to_string(),
            timeout,
            retries,
        })
    }

    /// Один GETNEXT с повторами. Ответ сразу копируется, т.к. PDU ссылается
    /// на буфер сессии.
    async fn get_next_once(&mut self, oid: &Oid<'_>) -> Result<Option<GetNextResponse>, String> {
        match timeout(self.timeout, self.session.getnext(oid)).await {
            Err(_) => Ok(None),
            Ok(Err(e)) => Err(format!("{e:?}")),
            Ok(Ok(pdu)) => {
                let error_status = pdu.error_status;
                let binding = match pdu.varbinds.into_iter().next() {
                    Some((oid, value)) => Some(VariableBinding {
                        oid: convert_oid(&oid)?,
                        value: convert_value(&value),
                    }),
                    None => None,
                };
                Ok(Some(GetNextResponse {
                    error_status,
                    binding,
                }))
            }
        }
    }
}

#[async_trait]
impl SnmpTransport for SnmpClientV2c {
    async fn get_next(&mut self, oid: &OidPath) -> Result<GetNextResponse, TransportError> {
        let request = Oid::from(oid.components())
            .map_err(|e| TransportError::Protocol(format!("Не удалось закодировать OID {oid}: {e:?}")))?;

        let mut last_error = None;
        for attempt in 0..=self.retries {
            match self.get_next_once(&request).await {
                Ok(Some(resp)) => return Ok(resp),
                Ok(None) => {
                    debug!(target = %self.target, %oid, attempt, "GETNEXT timed out");
                    last_error = None;
                }
                Err(e) => {
                    warn!(target = %self.target, %oid, attempt, error = %e, "GETNEXT failed");
                    last_error = Some(e);
                }
            }
        }

        // Если последняя попытка упала не по таймауту, это ошибка протокола
        match last_error {
            Some(e) => Err(TransportError::Protocol(e)),
            None => Err(TransportError::NoResponse),
        }
    }
}

fn convert_oid(oid: &Oid<'_>) -> Result<OidPath, String> {
    let components: Vec<u64> = oid
        .iter()
        .ok_or_else(|| format!("В OID {oid} компонент шире 64 бит"))?
        .collect();
    OidPath::from_components(&components).map_err(|e| e.to_string())
}

fn convert_value(value: &Value<'_>) -> RawValue {
    match value {
        Value::Integer(v) => RawValue::Integer(*v),
        Value::OctetString(bytes) => RawValue::from_octets(bytes),
        Value::Counter32(v) | Value::Unsigned32(v) | Value::Timeticks(v) => {
            RawValue::Integer(i64::from(*v))
        }
        Value::Counter64(v) => match i64::try_from(*v) {
            Ok(v) => RawValue::Integer(v),
            Err(_) => RawValue::DisplayString(v.to_string()),
        },
        Value::IpAddress(ip) => {
            RawValue::DisplayString(format!("{}.{}.{}.{}", ip[0], ip[1], ip[2], ip[3]))
        }
        Value::ObjectIdentifier(oid) => RawValue::DisplayString(oid.to_string()),
        Value::NoSuchObject => RawValue::ExceptionMarker(ExceptionKind::NoSuchObject),
        Value::NoSuchInstance => RawValue::ExceptionMarker(ExceptionKind::NoSuchInstance),
        Value::EndOfMibView => RawValue::ExceptionMarker(ExceptionKind::EndOfMibView),
        Value::Null => RawValue::DisplayString(String::new()),
        other => RawValue::DisplayString(format!("{other:?}")),
    }
}

/// Создаёт SNMPv2c клиента на устройство.
pub struct V2cConnector {
    pub timeout: Duration,
    pub retries: u32,
}

impl V2cConnector {
    pub fn new(timeout: Duration, retries: u32) -> Self {
        Self { timeout, retries }
    }
}

#[async_trait]
impl Connector for V2cConnector {
    async fn connect(&self, device: &Device) -> Result<Box<dyn SnmpTransport>, TransportError> {
        let target = device.target();
        let client =
            SnmpClientV2c::new(&target, device.community.as_bytes(), self.timeout, self.retries)
                .await?;
        Ok(Box::new(client))
    }
}
