use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// How high the Authority sets the evidence bar.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    Strict,
    #[default]
    Balanced,
    Permissive,
}

impl Strictness {
    /// Instruction given to the oracle for this level.
    pub fn guidance(&self) -> &'static str {
        match self {
            Strictness::Strict => {
                "Be conservative. Default to REJECT unless the evidence for the change is \
                 overwhelming, e.g. the primary metric would improve by more than 20%."
            }
            Strictness::Balanced => {
                "Be balanced. ACCEPT changes backed by solid evidence of improvement and \
                 weigh the expected gain against the risk of destabilizing the system."
            }
            Strictness::Permissive => {
                "Be exploratory. ACCEPT promising changes even on moderate evidence; \
                 learning is worth more than stability here."
            }
        }
    }
}

impl fmt::Display for Strictness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Strictness::Strict => "strict",
            Strictness::Balanced => "balanced",
            Strictness::Permissive => "permissive",
        };
        f.write_str(s)
    }
}

impl FromStr for Strictness {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Strictness::Strict),
            "balanced" => Ok(Strictness::Balanced),
            "permissive" => Ok(Strictness::Permissive),
            other => Err(format!("unknown strictness: {other}")),
        }
    }
}

fn default_oracle_timeout_ms() -> u64 {
    120_000
}

fn default_history_window() -> usize {
    10
}

/// Authority configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuthorityConfig {
    #[serde(default)]
    pub strictness: Strictness,

    /// Domain description placed at the top of every review prompt.
    #[serde(default)]
    pub domain_context: String,

    /// Upper bound on one oracle call.
    #[serde(default = "default_oracle_timeout_ms")]
    pub oracle_timeout_ms: u64,

    /// Generations of history handed to the oracle.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            strictness: Strictness::default(),
            domain_context: String::new(),
            oracle_timeout_ms: default_oracle_timeout_ms(),
            history_window: default_history_window(),
        }
    }
}

impl AuthorityConfig {
    pub fn with_strictness(mut self, strictness: Strictness) -> Self {
        self.strictness = strictness;
        self
    }

    pub fn with_domain_context(mut self, context: impl Into<String>) -> Self {
        self.domain_context = context.into();
        self
    }

    pub fn with_oracle_timeout(mut self, timeout: Duration) -> Self {
        self.oracle_timeout_ms = timeout.as_millis().min(u64::MAX as u128) as u64;
        self
    }

    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_millis(self.oracle_timeout_ms)
    }
}
