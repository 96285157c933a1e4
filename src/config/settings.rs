use serde::{Deserialize, Serialize};

/// Базовые настройки приложения
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Настройки SNMP транспорта
    pub connection: ConnectionSettings,
    /// Проверка доступности перед опросом
    pub probe: ProbeSettings,
    pub poller: PollerSettings,
    pub storage: StorageSettings,
    pub inventory: InventorySettings,
    /// Дополнительные профили вендоров (YAML)
    pub vendors_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Таймаут одного GETNEXT (секунды)
    pub timeout_secs: u64,
    /// Количество повторов при отсутствии ответа
    pub retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    pub enabled: bool,
    pub timeout_ms: u64,
    /// TCP порт для проверки (echo)
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerSettings {
    /// Сколько устройств опрашивается одновременно
    pub workers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub sqlite_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InventorySettings {
    pub path: String,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 3,
            retries: 3,
        }
    }
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: 5000,
            port: 7,
        }
    }
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self { workers: 8 }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            sqlite_path: "onu_telemetry.db".to_string(),
        }
    }
}

impl Default for InventorySettings {
    fn default() -> Self {
        Self {
            path: "./profiles/devices.yaml".to_string(),
        }
    }
}
