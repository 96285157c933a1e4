use std::io::ErrorKind;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::{Duration, timeout};
use tracing::debug;

/// Предварительная проверка доступности устройства.
#[async_trait]
pub trait Reachability: Send + Sync {
    async fn is_up(&self, address: &str, timeout: Duration) -> bool;
}

/// TCP проверка на echo порт.
///
/// Устройство считается живым, если соединение установлено или отклонено
/// (RST тоже ответ). Таймаут и прочие ошибки означают недоступность.
#[derive(Debug, Clone)]
pub struct TcpEchoProbe {
    port: u16,
}

impl TcpEchoProbe {
    pub fn new(port: u16) -> Self {
        Self { port }
    }
}

impl Default for TcpEchoProbe {
    fn default() -> Self {
        Self::new(7)
    }
}

#[async_trait]
impl Reachability for TcpEchoProbe {
    async fn is_up(&self, address: &str, limit: Duration) -> bool {
        let host = address.trim_start_matches('[').trim_end_matches(']');
        match timeout(limit, TcpStream::connect((host, self.port))).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => true,
            Ok(Err(e)) => {
                debug!(address, error = %e, "probe failed");
                false
            }
            Err(_) => {
                debug!(address, ?limit, "probe timed out");
                false
            }
        }
    }
}

/// Проверка выключена: все устройства доступны.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysUp;

#[async_trait]
impl Reachability for AlwaysUp {
    async fn is_up(&self, _address: &str, _timeout: Duration) -> bool {
        true
    }
}
