//! Session configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::{Formulary, RuleEngine};
use crate::validation::ValidationError;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid value: {0}")]
    Invalid(#[from] ValidationError),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Settings for a clinical session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Identifier written into audit exports.
    pub system_id: Option<String>,
    /// Artificial delay added to each generation, in milliseconds.
    pub simulated_latency_ms: u64,
    /// Pins "today" for age computation; the local date when unset.
    pub reference_date: Option<NaiveDate>,
    /// JSON formulary replacing the built-in one.
    pub formulary_path: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            system_id: None,
            simulated_latency_ms: 0,
            reference_date: None,
            formulary_path: None,
        }
    }
}

impl SessionConfig {
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn with_system_id(mut self, system_id: impl Into<String>) -> Self {
        self.system_id = Some(system_id.into());
        self
    }

    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.simulated_latency_ms = latency.as_millis() as u64;
        self
    }

    pub fn with_formulary_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.formulary_path = Some(path.into());
        self
    }

    /// The reference date, falling back to today's local date.
    pub fn reference_date(&self) -> NaiveDate {
        self.reference_date
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }

    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.simulated_latency_ms)
    }

    /// Build the rule engine these settings describe.
    pub fn rule_engine(&self) -> ConfigResult<RuleEngine> {
        let formulary = match &self.formulary_path {
            Some(path) => Formulary::from_file(path)?,
            None => Formulary::default(),
        };
        Ok(RuleEngine::with_formulary(formulary).with_latency(self.latency()))
    }
}
