use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::snmp::OidPath;

/// Форма индекса таблицы. Задаётся в профиле вендора, по OID не угадывается.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexShape {
    /// Последняя компонента: `...7.15` → `"15"`
    #[default]
    Single,
    /// Две последние компоненты: `...7.1.15` → `"1.15"`
    Composite,
}

impl IndexShape {
    fn width(self) -> usize {
        match self {
            IndexShape::Single => 1,
            IndexShape::Composite => 2,
        }
    }

    /// Извлекает индекс из OID, полученного при обходе `root`.
    pub fn resolve(self, root: &OidPath, oid: &OidPath) -> Result<String, DecodeError> {
        let below = oid.strip_root(root).unwrap_or_default();
        if below.len() < self.width() {
            return Err(DecodeError::MissingIndex {
                oid: oid.to_string(),
                root: root.to_string(),
            });
        }

        Ok(match self {
            IndexShape::Single => oid.suffix(1)[0].to_string(),
            IndexShape::Composite => {
                let tail = oid.suffix(2);
                format!("{}.{}", tail[0], tail[1])
            }
        })
    }
}
