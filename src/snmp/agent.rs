//! Агент в памяти: отвечает на GETNEXT по упорядоченной таблице.
//! Используется в тестах и для прогонов без сети.

use std::collections::{BTreeMap, VecDeque};
use std::ops::Bound;

use async_trait::async_trait;

use super::{ExceptionKind, GetNextResponse, OidPath, RawValue, SnmpTransport, VariableBinding};
use crate::error::TransportError;

/// Заранее заданный ответ, отдаётся раньше табличного.
#[derive(Debug, Clone)]
pub enum Scripted {
    Reply(GetNextResponse),
    NoResponse,
    Protocol(String),
}

#[derive(Debug, Default, Clone)]
pub struct TableAgent {
    table: BTreeMap<OidPath, RawValue>,
    script: VecDeque<Scripted>,
    silent: bool,
    silent_subtrees: Vec<OidPath>,
    requested: Vec<OidPath>,
}

impl TableAgent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Добавляет строку таблицы. Паникует на невалидном OID: только для фикстур.
    pub fn with(mut self, oid: &str, value: RawValue) -> Self {
        let oid = OidPath::parse(oid).unwrap_or_else(|e| panic!("fixture OID: {e}"));
        self.table.insert(oid, value);
        self
    }

    pub fn script(mut self, step: Scripted) -> Self {
        self.script.push_back(step);
        self
    }

    /// Не отвечает ни на что
    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    /// Не отвечает на запросы внутри поддерева `root`
    pub fn silent_under(mut self, root: &str) -> Self {
        let oid = OidPath::parse(root).unwrap_or_else(|e| panic!("fixture OID: {e}"));
        self.silent_subtrees.push(oid);
        self
    }

    pub fn requests(&self) -> usize {
        self.requested.len()
    }
}

#[async_trait]
impl SnmpTransport for TableAgent {
    async fn get_next(&mut self, oid: &OidPath) -> Result<GetNextResponse, TransportError> {
        self.requested.push(oid.clone());

        if self.silent || self.silent_subtrees.iter().any(|root| oid.is_within_subtree(root)) {
            return Err(TransportError::NoResponse);
        }

        if let Some(step) = self.script.pop_front() {
            return match step {
                Scripted::Reply(resp) => Ok(resp),
                Scripted::NoResponse => Err(TransportError::NoResponse),
                Scripted::Protocol(reason) => Err(TransportError::Protocol(reason)),
            };
        }

        let binding = match self
            .table
            .range((Bound::Excluded(oid.clone()), Bound::Unbounded))
            .next()
        {
            Some((next, value)) => VariableBinding {
                oid: next.clone(),
                value: value.clone(),
            },
            None => VariableBinding {
                oid: oid.clone(),
                value: RawValue::ExceptionMarker(ExceptionKind::EndOfMibView),
            },
        };

        Ok(GetNextResponse {
            error_status: 0,
            binding: Some(binding),
        })
    }
}
