//! GETNEXT обход поддерева.
//!
//! Обход ленивый: каждая привязка запрашивается по одной через [`Walk::next`],
//! следующий запрос строится от OID последней полученной привязки. Обход
//! останавливается, как только срабатывает одно из условий [`Termination`];
//! привязка, вызвавшая остановку, наружу не отдаётся. Ненулевой error-status
//! обрывает обход ошибкой протокола.

use tracing::{debug, trace};

use super::{ExceptionKind, GetNextResponse, OidPath, SnmpTransport, VariableBinding};
use crate::error::WalkError;

/// Причина нормального завершения обхода.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// Агент не вернул привязку
    MissingOid,
    /// OID короче корня
    ShorterThanRoot,
    /// OID вне поддерева корня
    OutsideSubtree,
    Exception(ExceptionKind),
    /// OID не больше запрошенного: агент ходит по кругу
    NotIncreasing,
}

/// Итог обхода целиком.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkOutcome {
    /// Обход дошёл до конца; `termination` — сработавшее условие остановки
    Bindings {
        bindings: Vec<VariableBinding>,
        termination: Option<Termination>,
    },
    NoResponse,
    ProtocolError(String),
}

pub struct WalkEngine;

impl WalkEngine {
    /// Начинает обход `root`. Сеть не трогается до первого [`Walk::next`].
    pub fn walk(transport: &mut dyn SnmpTransport, root: OidPath) -> Walk<'_> {
        Walk {
            transport,
            requested: root.clone(),
            root,
            finished: false,
            termination: None,
            received: 0,
        }
    }

    /// Проходит поддерево целиком.
    pub async fn collect(transport: &mut dyn SnmpTransport, root: OidPath) -> WalkOutcome {
        let mut walk = Self::walk(transport, root);
        let mut bindings = Vec::new();
        loop {
            match walk.next().await {
                Ok(Some(binding)) => bindings.push(binding),
                Ok(None) => {
                    return WalkOutcome::Bindings {
                        bindings,
                        termination: walk.termination().cloned(),
                    };
                }
                Err(WalkError::NoResponse) => return WalkOutcome::NoResponse,
                Err(WalkError::Protocol(reason)) => return WalkOutcome::ProtocolError(reason),
            }
        }
    }
}

/// Один обход одного корня на одном устройстве. Повторно не запускается.
pub struct Walk<'t> {
    transport: &'t mut dyn SnmpTransport,
    root: OidPath,
    requested: OidPath,
    finished: bool,
    termination: Option<Termination>,
    received: usize,
}

impl Walk<'_> {
    /// Какое условие остановило обход (`None`, пока обход идёт или если он
    /// оборвался ошибкой транспорта).
    pub fn termination(&self) -> Option<&Termination> {
        self.termination.as_ref()
    }

    /// Следующая привязка поддерева; `Ok(None)` после завершения.
    pub async fn next(&mut self) -> Result<Option<VariableBinding>, WalkError> {
        if self.finished {
            return Ok(None);
        }

        let response = match self.transport.get_next(&self.requested).await {
            Ok(response) => response,
            Err(e) => {
                self.finished = true;
                debug!(root = %self.root, received = self.received, error = %e, "walk aborted");
                return Err(e.into());
            }
        };

        if response.error_status != 0 {
            self.finished = true;
            debug!(root = %self.root, received = self.received, error_status = response.error_status, "walk aborted");
            return Err(WalkError::Protocol(format!("error-status {}", response.error_status)));
        }

        match check_walk_finished(&self.root, &self.requested, response) {
            Err(reason) => {
                debug!(root = %self.root, received = self.received, ?reason, "walk finished");
                self.finished = true;
                self.termination = Some(reason);
                Ok(None)
            }
            Ok(binding) => {
                trace!(oid = %binding.oid, value = ?binding.value, "binding");
                self.requested = binding.oid.clone();
                self.received += 1;
                Ok(Some(binding))
            }
        }
    }
}

/// Проверяет ответ с нулевым error-status по условиям остановки, в
/// фиксированном порядке.
fn check_walk_finished(
    root: &OidPath,
    requested: &OidPath,
    response: GetNextResponse,
) -> Result<VariableBinding, Termination> {
    let binding = response.binding.ok_or(Termination::MissingOid)?;
    if binding.oid.len() < root.len() {
        return Err(Termination::ShorterThanRoot);
    }
    if !binding.oid.is_within_subtree(root) {
        return Err(Termination::OutsideSubtree);
    }
    if let super::RawValue::ExceptionMarker(kind) = binding.value {
        return Err(Termination::Exception(kind));
    }
    if binding.oid <= *requested {
        return Err(Termination::NotIncreasing);
    }
    Ok(binding)
}
