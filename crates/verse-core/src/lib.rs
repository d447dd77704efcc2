//! Multi-agent episode orchestration: registries, environments, agents,
//! selection and visibility policies, and the step loop driving them.

pub mod agent;
pub mod config;
pub mod environment;
pub mod error;
pub mod log;
pub mod orchestrator;
pub mod policy;
pub mod registry;

pub use agent::{Agent, AgentRegistry, MirrorAgent, ScriptedAgent};
pub use config::{AgentSpec, EnvironmentConfig, FailurePolicy, TaskConfig, TaskLoader};
pub use environment::{Environment, EnvironmentRegistry, EnvironmentSpec, PolicyEnvironment, Rules};
pub use error::{
    AgentActionError, AgentError, ConfigError, EnvironmentError, RegistryError, VerseError,
};
pub use log::{MemoryLog, StepLog, TracingLog};
pub use orchestrator::{EpisodeSummary, Orchestrator, Registries};
pub use registry::Registry;
pub use verse_events::{AgentProfile, Message, Observation, Reply, StepResult, TurnRecord};
