//! Decision oracle boundary and simple implementations.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::context::ReviewContext;
use crate::error::{OracleError, OracleResult};

/// External judgment source: a human, a rule engine, or an LLM.
///
/// Returns raw text. Interpreting it is the Authority's job.
#[async_trait]
pub trait DecisionOracle: Send + Sync {
    /// Identifier recorded as `decided_by`.
    fn identifier(&self) -> &str;

    async fn decide(&self, context: &ReviewContext) -> OracleResult<String>;
}

/// Oracle that always returns the same response.
pub struct StaticOracle {
    identifier: String,
    response: String,
}

impl StaticOracle {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            identifier: "static-oracle".into(),
            response: response.into(),
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = identifier.into();
        self
    }
}

#[async_trait]
impl DecisionOracle for StaticOracle {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    async fn decide(&self, _context: &ReviewContext) -> OracleResult<String> {
        Ok(self.response.clone())
    }
}

/// Oracle that is always unreachable.
pub struct FailingOracle;

#[async_trait]
impl DecisionOracle for FailingOracle {
    fn identifier(&self) -> &str {
        "failing-oracle"
    }

    async fn decide(&self, _context: &ReviewContext) -> OracleResult<String> {
        Err(OracleError::Unavailable("simulated oracle failure".into()))
    }
}

/// Oracle that replays a fixed sequence of outcomes, one per call.
/// Once exhausted it reports itself unavailable.
pub struct ScriptedOracle {
    identifier: String,
    script: Mutex<VecDeque<OracleResult<String>>>,
}

impl ScriptedOracle {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_outcomes(responses.into_iter().map(|r| Ok(r.into())))
    }

    pub fn from_outcomes<I>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = OracleResult<String>>,
    {
        Self {
            identifier: "scripted-oracle".into(),
            script: Mutex::new(outcomes.into_iter().collect()),
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = identifier.into();
        self
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().len()
    }
}

#[async_trait]
impl DecisionOracle for ScriptedOracle {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    async fn decide(&self, _context: &ReviewContext) -> OracleResult<String> {
        let next = self.script.lock().pop_front();
        next.unwrap_or_else(|| Err(OracleError::Unavailable("script exhausted".into())))
    }
}
