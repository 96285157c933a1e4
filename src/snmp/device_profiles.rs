use std::collections::HashMap;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::OidPath;
use crate::telemetry::{IndexShape, KindStrategy, OffsetRule, PowerFormat, PowerIndex, TelemetryKind};

/// Профиль вендора: корни таблиц и правила нормализации.
///
/// Отсутствующий корень значит, что вендор этот вид телеметрии не отдаёт,
/// и обход для него пропускается.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorProfile {
    pub name: String,
    #[serde(default)]
    pub if_descr: Option<OidPath>,
    #[serde(default)]
    pub power: Option<OidPath>,
    #[serde(default)]
    pub mac: Option<OidPath>,
    #[serde(default)]
    pub status: Option<OidPath>,
    #[serde(default)]
    pub index_shape: IndexShape,
    /// Канонизировать имена портов (`EPON01ONU3` → `EPON0/1:3`)
    #[serde(default)]
    pub canonicalize_descr: bool,
    #[serde(default)]
    pub mac_index_offset: OffsetRule,
    #[serde(default)]
    pub power_format: PowerFormat,
    #[serde(default)]
    pub power_index: PowerIndex,
    /// Вычитается из кода статуса, чтобы получить 1=up / 2=down
    #[serde(default)]
    pub status_code_offset: i64,
}

impl VendorProfile {
    fn bare(name: &str) -> Self {
        Self {
            name: name.to_string(),
            if_descr: None,
            power: None,
            mac: None,
            status: None,
            index_shape: IndexShape::Single,
            canonicalize_descr: false,
            mac_index_offset: OffsetRule::None,
            power_format: PowerFormat::Plain,
            power_index: PowerIndex::Table,
            status_code_offset: 0,
        }
    }

    pub fn root(&self, kind: TelemetryKind) -> Option<&OidPath> {
        match kind {
            TelemetryKind::IfDescr => self.if_descr.as_ref(),
            TelemetryKind::Power => self.power.as_ref(),
            TelemetryKind::Mac => self.mac.as_ref(),
            TelemetryKind::Status => self.status.as_ref(),
        }
    }

    pub fn strategy(&self, kind: TelemetryKind) -> KindStrategy {
        match kind {
            TelemetryKind::IfDescr => KindStrategy::Descriptor {
                canonicalize: self.canonicalize_descr,
                offset: self.mac_index_offset,
            },
            TelemetryKind::Power => KindStrategy::Power {
                format: self.power_format,
                index: self.power_index.clone(),
            },
            TelemetryKind::Mac => KindStrategy::Mac {
                offset: self.mac_index_offset,
            },
            TelemetryKind::Status => KindStrategy::Status {
                code_offset: self.status_code_offset,
            },
        }
    }
}

fn oid(s: &str) -> Option<OidPath> {
    OidPath::parse(s).ok()
}

pub const DEFAULT_VENDOR: &str = "generic";

/// Встроенные профили
static BUILTIN: LazyLock<VendorRegistry> = LazyLock::new(|| {
    let generic = VendorProfile {
        // IF-MIB::ifName / IF-MIB::ifOperStatus
        if_descr: oid("1.3.6.1.2.1.31.1.1.1.1"),
        status: oid("1.3.6.1.2.1.2.2.1.8"),
        ..VendorProfile::bare(DEFAULT_VENDOR)
    };

    let bdcom = VendorProfile {
        if_descr: oid("1.3.6.1.2.1.31.1.1.1.1"),
        power: oid("1.3.6.1.4.1.3320.101.10.5.1.5"),
        mac: oid("1.3.6.1.4.1.3320.101.10.1.1.3"),
        status: oid("1.3.6.1.4.1.3320.101.10.1.1.26"),
        power_format: PowerFormat::Tenths,
        status_code_offset: 2,
        ..VendorProfile::bare("BDCOM")
    };

    let vsol = VendorProfile {
        if_descr: oid("1.3.6.1.4.1.37950.1.1.5.12.2.1.14.1.2"),
        power: oid("1.3.6.1.4.1.37950.1.1.5.12.2.1.8.1.7"),
        mac: oid("1.3.6.1.4.1.37950.1.1.5.10.3.2.1.3"),
        canonicalize_descr: true,
        mac_index_offset: OffsetRule::FirstDescriptorIndex,
        power_format: PowerFormat::MilliwattComposite,
        power_index: PowerIndex::Correlated {
            port_prefix: "EPON0/".to_string(),
        },
        ..VendorProfile::bare("VSOL")
    };

    let dbc = VendorProfile {
        if_descr: oid("1.3.6.1.4.1.37950.1.1.5.12.2.1.14.1.2"),
        power: oid("1.3.6.1.4.1.37950.1.1.5.12.2.1.14.1.3"),
        mac: oid("1.3.6.1.4.1.37950.1.1.5.12.1.12.1.6"),
        canonicalize_descr: true,
        mac_index_offset: OffsetRule::FirstDescriptorIndex,
        ..VendorProfile::bare("DBC")
    };

    let vsol_gpon = VendorProfile {
        if_descr: oid("1.3.6.1.4.1.37950.1.1.6.1.1.4.1.24"),
        power: oid("1.3.6.1.4.1.37950.1.1.6.1.1.3.1.7"),
        mac: oid("1.3.6.1.4.1.37950.1.1.5.12.1.12.1.6"),
        status: oid("1.3.6.1.4.1.37950.1.1.6.1.1.1.1.4"),
        index_shape: IndexShape::Composite,
        canonicalize_descr: true,
        ..VendorProfile::bare("VSOL-GPON")
    };

    let mut registry = VendorRegistry::new(generic);
    for profile in [bdcom, vsol, dbc, vsol_gpon] {
        registry.insert(profile);
    }
    registry
});

#[derive(Debug, Deserialize)]
struct VendorFile {
    vendors: Vec<VendorProfile>,
}

/// Таблица профилей, ключ — идентификатор вендора (без учёта регистра).
///
/// После старта не меняется и читается всеми сессиями без синхронизации.
#[derive(Debug, Clone)]
pub struct VendorRegistry {
    default: VendorProfile,
    profiles: HashMap<String, VendorProfile>,
}

impl VendorRegistry {
    pub fn new(default: VendorProfile) -> Self {
        Self {
            default,
            profiles: HashMap::new(),
        }
    }

    pub fn builtin() -> Self {
        BUILTIN.clone()
    }

    /// Встроенные профили плюс профили из YAML файла (файл имеет приоритет).
    pub fn with_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Не удалось прочитать профили вендоров: {path}"))?;
        let file: VendorFile = serde_yml::from_str(&content)
            .with_context(|| format!("Не удалось разобрать профили вендоров: {path}"))?;

        let mut registry = Self::builtin();
        for profile in file.vendors {
            debug!(vendor = %profile.name, "vendor profile loaded from file");
            registry.insert(profile);
        }
        Ok(registry)
    }

    pub fn insert(&mut self, profile: VendorProfile) {
        if profile.name.eq_ignore_ascii_case(DEFAULT_VENDOR) {
            self.default = profile;
        } else {
            self.profiles.insert(profile.name.to_ascii_uppercase(), profile);
        }
    }

    pub fn get(&self, vendor: &str) -> Option<&VendorProfile> {
        self.profiles.get(&vendor.to_ascii_uppercase())
    }

    /// Профиль вендора или общий профиль по умолчанию.
    pub fn profile(&self, vendor: &str) -> &VendorProfile {
        match self.get(vendor) {
            Some(profile) => profile,
            None => {
                if !vendor.eq_ignore_ascii_case(DEFAULT_VENDOR) {
                    warn!(vendor, "unknown vendor, using generic profile");
                }
                &self.default
            }
        }
    }

    pub fn vendors(&self) -> impl Iterator<Item = &str> {
        self.profiles.values().map(|p| p.name.as_str())
    }
}

impl Default for VendorRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
