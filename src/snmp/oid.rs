use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MalformedOid;

/// Числовой OID (например `1.3.6.1.2.1.31.1.1.1.1`).
///
/// Порядок (`Ord`) совпадает с порядком SNMP: покомпонентное сравнение,
/// при общем префиксе более короткий OID меньше.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OidPath(Vec<u64>);

impl OidPath {
    /// Парсит OID из строки с точками. Допускается ведущая точка и пробелы по краям.
    pub fn parse(s: &str) -> Result<Self, MalformedOid> {
        let trimmed = s.trim();
        let body = trimmed.strip_prefix('.').unwrap_or(trimmed);
        if body.is_empty() {
            return Err(MalformedOid::new(s, "пустой OID"));
        }

        let parts: Result<Vec<u64>, _> = body
            .split('.')
            .map(|p| {
                if p.is_empty() {
                    Err(MalformedOid::new(s, "пустой компонент"))
                } else {
                    p.parse::<u64>()
                        .map_err(|_| MalformedOid::new(s, format!("нечисловой компонент '{p}'")))
                }
            })
            .collect();

        Ok(Self(parts?))
    }

    pub fn from_components(components: &[u64]) -> Result<Self, MalformedOid> {
        if components.is_empty() {
            return Err(MalformedOid::new("", "пустой OID"));
        }
        Ok(Self(components.to_vec()))
    }

    pub fn components(&self) -> &[u64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// true, если первые `root.len()` компонент совпадают с `root`.
    pub fn is_within_subtree(&self, root: &OidPath) -> bool {
        self.0.len() >= root.0.len() && self.0[..root.0.len()] == root.0[..]
    }

    /// Последние `n` компонент (или весь OID, если он короче).
    pub fn suffix(&self, n: usize) -> &[u64] {
        let start = self.0.len().saturating_sub(n);
        &self.0[start..]
    }

    /// Компоненты после префикса `root`; `None`, если OID не из поддерева.
    pub fn strip_root(&self, root: &OidPath) -> Option<&[u64]> {
        if self.is_within_subtree(root) {
            Some(&self.0[root.0.len()..])
        } else {
            None
        }
    }
}

impl fmt::Display for OidPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for c in &self.0 {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{c}")?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for OidPath {
    type Err = MalformedOid;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for OidPath {
    type Error = MalformedOid;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<OidPath> for String {
    fn from(value: OidPath) -> Self {
        value.to_string()
    }
}
