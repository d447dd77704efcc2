//! Task Configuration
//!
//! Loads a named task (environment variant, agent roster, limits) from TOML.
//! Task files are looked up on disk first and fall back to the tasks compiled
//! into the binary.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, VerseError};

/// Default directory searched for task files
pub const DEFAULT_TASKS_DIR: &str = "tasks";

/// Task run when none is named on the command line
pub const DEFAULT_TASK: &str = "sde_team_3players";

/// Tasks shipped with the binary.
pub const BUILTIN_TASKS: &[(&str, &str)] = &[
    (
        "nlp_classroom_3players",
        include_str!("../tasks/nlp_classroom_3players.toml"),
    ),
    ("pokemon_town", include_str!("../tasks/pokemon_town.toml")),
    (
        "sde_team_3players",
        include_str!("../tasks/sde_team_3players.toml"),
    ),
];

/// Returns the source of a built-in task.
pub fn builtin_task(name: &str) -> Option<&'static str> {
    BUILTIN_TASKS
        .iter()
        .find(|(task, _)| *task == name)
        .map(|(_, source)| *source)
}

/// Complete configuration of one task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Task name; filled in by the loader
    #[serde(default)]
    pub name: String,
    pub environment: EnvironmentConfig,
    #[serde(default)]
    pub agents: Vec<AgentSpec>,
}

/// Environment section of a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Environment registry key
    pub kind: String,
    /// Step ceiling; `None` runs until the variant terminates
    #[serde(default)]
    pub max_turns: Option<u64>,
    /// Per-call agent budget in milliseconds; `None` blocks without limit
    #[serde(default)]
    pub agent_timeout_ms: Option<u64>,
    #[serde(default)]
    pub on_agent_failure: FailurePolicy,
    /// Selection policy override (registry key)
    #[serde(default)]
    pub order: Option<String>,
    /// Visibility policy override (registry key)
    #[serde(default)]
    pub visibility: Option<String>,
    /// Variant and policy options
    #[serde(default)]
    pub options: toml::Table,
}

impl EnvironmentConfig {
    /// Minimal config for the given variant key.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            max_turns: None,
            agent_timeout_ms: None,
            on_agent_failure: FailurePolicy::default(),
            order: None,
            visibility: None,
            options: toml::Table::new(),
        }
    }

    pub fn agent_timeout(&self) -> Option<Duration> {
        self.agent_timeout_ms.map(Duration::from_millis)
    }

    pub fn options(&self) -> Options<'_> {
        Options::new(&self.options)
    }
}

/// What happens when an agent's action step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abandon the step and propagate the error
    #[default]
    Abort,
    /// Record a no-op for the failing agent and continue
    Skip,
}

/// One agent in the roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSpec {
    pub name: String,
    #[serde(default)]
    pub role: String,
    /// Agent registry key
    #[serde(default = "default_agent_kind")]
    pub kind: String,
    /// Canned replies for scripted agents
    #[serde(default)]
    pub responses: Vec<String>,
    /// Cycle through `responses` instead of failing when they run out
    #[serde(default = "default_true")]
    pub repeat: bool,
    /// Model-call parameters, passed through untouched
    #[serde(default)]
    pub llm: toml::Table,
}

fn default_agent_kind() -> String {
    "scripted".to_string()
}

fn default_true() -> bool {
    true
}

impl AgentSpec {
    /// Scripted agent spec with the given replies.
    pub fn scripted<I, S>(name: impl Into<String>, role: impl Into<String>, responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            role: role.into(),
            kind: default_agent_kind(),
            responses: responses.into_iter().map(Into::into).collect(),
            repeat: true,
            llm: toml::Table::new(),
        }
    }
}

impl TaskConfig {
    /// Loads configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_str(&content)
    }

    /// Parses configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Checks everything the orchestrator relies on before anything is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.environment.kind.trim().is_empty() {
            return Err(ConfigError::Invalid("environment.kind is empty".into()));
        }
        if self.agents.is_empty() {
            return Err(ConfigError::Invalid("task defines no agents".into()));
        }
        if self.environment.agent_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "environment.agent_timeout_ms must be positive".into(),
            ));
        }

        let mut seen = BTreeSet::new();
        for agent in &self.agents {
            if agent.name.trim().is_empty() {
                return Err(ConfigError::Invalid("agent with empty name".into()));
            }
            if !seen.insert(agent.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate agent name '{}'",
                    agent.name
                )));
            }
        }
        Ok(())
    }
}

/// Resolves task names to configurations.
#[derive(Debug, Clone)]
pub struct TaskLoader {
    tasks_dir: PathBuf,
}

impl Default for TaskLoader {
    fn default() -> Self {
        Self::new(DEFAULT_TASKS_DIR)
    }
}

impl TaskLoader {
    pub fn new(tasks_dir: impl Into<PathBuf>) -> Self {
        Self {
            tasks_dir: tasks_dir.into(),
        }
    }

    pub fn tasks_dir(&self) -> &Path {
        &self.tasks_dir
    }

    /// Loads `task` from `<dir>/<task>.toml`, `<dir>/<task>/config.toml`, or
    /// the built-in tasks, in that order. Path-like names are rejected.
    pub fn load(&self, task: &str) -> Result<TaskConfig, ConfigError> {
        if task.is_empty() || task.contains(['/', '\\']) || task.contains("..") {
            return Err(ConfigError::Invalid(format!(
                "task name '{task}' must be a plain name"
            )));
        }

        let candidates = [
            self.tasks_dir.join(format!("{task}.toml")),
            self.tasks_dir.join(task).join("config.toml"),
        ];

        let mut config = match candidates.iter().find(|p| p.is_file()) {
            Some(path) => {
                tracing::debug!(task, path = %path.display(), "loading task file");
                TaskConfig::load(path)?
            }
            None => {
                let source =
                    builtin_task(task).ok_or_else(|| ConfigError::UnknownTask(task.to_string()))?;
                tracing::debug!(task, "loading built-in task");
                TaskConfig::from_str(source)?
            }
        };

        if config.name.is_empty() {
            config.name = task.to_string();
        }
        Ok(config)
    }
}

/// Typed read access to a variant's `options` table.
#[derive(Debug, Clone, Copy)]
pub struct Options<'a> {
    table: &'a toml::Table,
}

impl<'a> Options<'a> {
    pub fn new(table: &'a toml::Table) -> Self {
        Self { table }
    }

    pub fn str(&self, key: &str) -> Result<Option<&'a str>, VerseError> {
        match self.table.get(key) {
            None => Ok(None),
            Some(toml::Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(type_error(key, "a string")),
        }
    }

    pub fn u64(&self, key: &str) -> Result<Option<u64>, VerseError> {
        match self.table.get(key) {
            None => Ok(None),
            Some(toml::Value::Integer(n)) if *n >= 0 => Ok(Some(*n as u64)),
            Some(_) => Err(type_error(key, "a non-negative integer")),
        }
    }

    pub fn str_list(&self, key: &str) -> Result<Option<Vec<String>>, VerseError> {
        match self.table.get(key) {
            None => Ok(None),
            Some(toml::Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    toml::Value::String(s) => Ok(s.clone()),
                    _ => Err(type_error(key, "a list of strings")),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Some),
            Some(_) => Err(type_error(key, "a list of strings")),
        }
    }

    pub fn table(&self, key: &str) -> Result<Option<&'a toml::Table>, VerseError> {
        match self.table.get(key) {
            None => Ok(None),
            Some(toml::Value::Table(t)) => Ok(Some(t)),
            Some(_) => Err(type_error(key, "a table")),
        }
    }
}

fn type_error(key: &str, expected: &str) -> VerseError {
    VerseError::invalid(format!("option '{key}' must be {expected}"))
}
