//! Источник списка устройств для опроса.

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use crate::models::Device;

/// Отдаёт устройства, пригодные для опроса.
pub trait DeviceSource {
    fn list_pollable(&self) -> Result<Vec<Device>>;
}

#[derive(Debug, Deserialize)]
struct InventoryEntry {
    #[serde(flatten)]
    device: Device,
    #[serde(default = "enabled_by_default")]
    enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct InventoryFile {
    #[serde(default)]
    devices: Vec<InventoryEntry>,
}

/// Инвентарь из YAML файла.
///
/// ```yaml
/// devices:
///   - id: 45102
///     name: olt-north
///     address: 10.233.254.2
///     vendor: VSOL
///     community: public
///     port: 161
/// ```
pub struct YamlInventory {
    path: String,
    only: Option<String>,
}

impl YamlInventory {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            only: None,
        }
    }

    /// Оставить только устройство с этим адресом или именем
    pub fn only(mut self, address_or_name: Option<String>) -> Self {
        self.only = address_or_name;
        self
    }

    fn parse(&self, content: &str) -> Result<Vec<Device>> {
        let file: InventoryFile = serde_yml::from_str(content)
            .with_context(|| format!("Не удалось разобрать инвентарь: {}", self.path))?;

        let devices = file
            .devices
            .into_iter()
            .filter(|entry| {
                let keep = entry.enabled && !entry.device.community.is_empty();
                if !keep {
                    debug!(device_id = entry.device.id, "skipped: disabled or no community");
                }
                keep
            })
            .map(|entry| entry.device)
            .filter(|device| self.only.as_deref().is_none_or(|wanted| device.matches(wanted)))
            .collect();
        Ok(devices)
    }
}

impl DeviceSource for YamlInventory {
    fn list_pollable(&self) -> Result<Vec<Device>> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Не удалось прочитать инвентарь: {}", self.path))?;
        self.parse(&content)
    }
}
