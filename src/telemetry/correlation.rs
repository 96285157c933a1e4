use std::collections::HashMap;

/// Соответствие "имя порта → индекс" в рамках одной сессии опроса.
///
/// Заполняется при обходе дескрипторов, читается при обходе мощности у вендоров,
/// где нумерация таблицы мощности не совпадает с таблицей дескрипторов.
#[derive(Debug, Default, Clone)]
pub struct PortCorrelationTable {
    ports: HashMap<String, String>,
}

impl PortCorrelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Последняя запись побеждает.
    pub fn put(&mut self, name: impl Into<String>, index: impl Into<String>) {
        self.ports.insert(name.into(), index.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.ports.get(name).map(String::as_str)
    }

    pub fn contains_index(&self, index: &str) -> bool {
        self.ports.values().any(|v| v == index)
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}
