use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

pub mod settings;

pub use settings::Settings;

use crate::snmp::VendorRegistry;

/// Главная конфигурация приложения
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(flatten)]
    pub settings: Settings,
}

impl AppConfig {
    /// Загружает конфигурацию из YAML файла. Пустой файл даёт настройки по умолчанию.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Не удалось прочитать конфигурацию: {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: Settings = serde_yml::from_str(&content)
            .with_context(|| format!("Не удалось разобрать конфигурацию: {}", path.display()))?;
        Ok(Self { settings })
    }

    /// Конфигурация из файла, если он есть, иначе по умолчанию
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Таймаут GETNEXT из переменной окружения или из настроек
    pub fn get_timeout(&self) -> Duration {
        let secs = env::var("SNMP_TIMEOUT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(self.settings.connection.timeout_secs);
        Duration::from_secs(secs)
    }

    pub fn get_retries(&self) -> u32 {
        env::var("SNMP_RETRIES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(self.settings.connection.retries)
    }

    pub fn get_db_path(&self) -> String {
        env::var("ONU_POLLER_DB").unwrap_or_else(|_| self.settings.storage.sqlite_path.clone())
    }

    pub fn get_workers(&self) -> usize {
        env::var("ONU_POLLER_WORKERS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(self.settings.poller.workers)
            .max(1)
    }

    pub fn get_probe_timeout(&self) -> Duration {
        Duration::from_millis(self.settings.probe.timeout_ms)
    }

    /// Профили вендоров: встроенные плюс файл из настроек
    pub fn vendor_registry(&self) -> Result<VendorRegistry> {
        match &self.settings.vendors_path {
            Some(path) => VendorRegistry::with_file(path),
            None => Ok(VendorRegistry::builtin()),
        }
    }
}
