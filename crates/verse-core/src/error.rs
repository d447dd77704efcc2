//! Error Types
//!
//! Every failure the orchestration core can surface. Registry and
//! configuration errors fail fast at startup; agent failures end the run but
//! leave the environment in its last good state.

use std::time::Duration;
use thiserror::Error;

/// Registry misuse.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("{registry}: key '{key}' is already registered")]
    DuplicateKey { registry: String, key: String },

    #[error("{registry}: no entry registered under '{key}'")]
    UnknownKey { registry: String, key: String },
}

/// Failure returned by an agent implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    /// The backend (model call, tool, process) failed
    #[error("backend failure: {0}")]
    Backend(String),

    /// A scripted agent has no replies left
    #[error("script exhausted after {0} replies")]
    ScriptExhausted(usize),
}

/// An agent's action step failed or ran out of time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgentActionError {
    #[error("agent '{agent}' failed on turn {turn_index}: {source}")]
    Failed {
        agent: String,
        turn_index: u64,
        #[source]
        source: AgentError,
    },

    #[error("agent '{agent}' timed out on turn {turn_index} after {budget:?}")]
    TimedOut {
        agent: String,
        turn_index: u64,
        budget: Duration,
    },
}

impl AgentActionError {
    pub fn agent(&self) -> &str {
        match self {
            AgentActionError::Failed { agent, .. } | AgentActionError::TimedOut { agent, .. } => {
                agent
            }
        }
    }
}

/// Contract violations on a running environment.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvironmentError {
    #[error("episode already finished at turn {turn_index}")]
    EpisodeFinished { turn_index: u64 },
}

/// Task configuration problems.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("unknown task '{0}'")]
    UnknownTask(String),
}

/// Top-level error for the orchestration core.
#[derive(Error, Debug)]
pub enum VerseError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Environment(#[from] EnvironmentError),

    #[error(transparent)]
    AgentAction(#[from] AgentActionError),

    #[error(transparent)]
    InvalidConfiguration(#[from] ConfigError),
}

impl VerseError {
    /// Shorthand for a validation failure.
    pub fn invalid(message: impl Into<String>) -> Self {
        VerseError::InvalidConfiguration(ConfigError::Invalid(message.into()))
    }

    pub fn is_agent_failure(&self) -> bool {
        matches!(self, VerseError::AgentAction(_))
    }
}

pub type Result<T, E = VerseError> = std::result::Result<T, E>;
