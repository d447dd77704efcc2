//! Orchestrator
//!
//! Turns a task configuration into a running episode: resolves the
//! environment, agents and policy overrides through the registries, then
//! drives `reset` and `step` until the environment reports done.

use uuid::Uuid;

use crate::agent::{self, Agent, AgentRegistry};
use crate::config::{TaskConfig, TaskLoader};
use crate::environment::{self, Environment, EnvironmentRegistry, EnvironmentSpec};
use crate::error::VerseError;
use crate::log::{StepLog, TracingLog};
use crate::policy::{self, PolicySpec, SelectionRegistry, VisibilityRegistry};

/// Every registry the orchestrator resolves names against.
#[derive(Debug)]
pub struct Registries {
    pub environments: EnvironmentRegistry,
    pub agents: AgentRegistry,
    pub orders: SelectionRegistry,
    pub visibilities: VisibilityRegistry,
}

impl Registries {
    /// Registries with nothing registered.
    pub fn empty() -> Self {
        Self {
            environments: EnvironmentRegistry::new("EnvironmentRegistry"),
            agents: AgentRegistry::new("AgentRegistry"),
            orders: SelectionRegistry::new("OrderRegistry"),
            visibilities: VisibilityRegistry::new("VisibilityRegistry"),
        }
    }

    /// Registries populated with every built-in variant, agent kind and policy.
    pub fn with_builtins() -> Result<Self, VerseError> {
        let mut registries = Self::empty();
        environment::register(&mut registries.environments)?;
        agent::register(&mut registries.agents)?;
        policy::register_selection(&mut registries.orders)?;
        policy::register_visibility(&mut registries.visibilities)?;
        Ok(registries)
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeSummary {
    pub task: String,
    pub episode_id: String,
    pub turns: u64,
    pub done: bool,
}

/// Drives one environment through an episode.
pub struct Orchestrator {
    task: String,
    environment: Box<dyn Environment>,
    log: Box<dyn StepLog>,
}

impl Orchestrator {
    /// Loads `task` from the default task directory with the built-in registries.
    pub fn from_task(task: &str) -> Result<Self, VerseError> {
        Self::from_task_with(&TaskLoader::default(), task)
    }

    pub fn from_task_with(loader: &TaskLoader, task: &str) -> Result<Self, VerseError> {
        let config = loader.load(task)?;
        Self::from_config(config, &Registries::with_builtins()?)
    }

    /// Validates `config` and builds the environment it describes.
    pub fn from_config(config: TaskConfig, registries: &Registries) -> Result<Self, VerseError> {
        config.validate()?;
        let TaskConfig {
            name,
            environment: env_config,
            agents: agent_specs,
        } = config;

        let agents = agent_specs
            .into_iter()
            .map(|spec| registries.agents.create(&spec.kind.clone(), spec))
            .collect::<Result<Vec<Box<dyn Agent>>, VerseError>>()?;

        let mut spec = EnvironmentSpec::new(agents, env_config);
        let roster = spec.profiles();
        if let Some(order) = spec.config.order.clone() {
            let policy_spec = PolicySpec::new(roster.clone(), spec.config.options.clone());
            spec.selection = Some(registries.orders.create(&order, policy_spec)?);
        }
        if let Some(visibility) = spec.config.visibility.clone() {
            let policy_spec = PolicySpec::new(roster, spec.config.options.clone());
            spec.visibility = Some(registries.visibilities.create(&visibility, policy_spec)?);
        }

        let kind = spec.config.kind.clone();
        let environment = registries.environments.create(&kind, spec)?;
        tracing::debug!(task = %name, kind = %kind, agents = environment.profiles().len(), "environment built");

        Ok(Self {
            task: name,
            environment,
            log: Box::new(TracingLog::new()),
        })
    }

    /// Replaces the step log.
    pub fn with_log(mut self, log: impl StepLog + 'static) -> Self {
        self.log = Box::new(log);
        self
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    /// The environment, in whatever state the last run left it.
    pub fn environment(&self) -> &dyn Environment {
        self.environment.as_ref()
    }

    /// Resets the environment and steps until it is done.
    ///
    /// An error is reported to the log and returned unchanged; the
    /// environment keeps the turns completed before it.
    pub async fn run(&mut self) -> Result<EpisodeSummary, VerseError> {
        let episode_id = Uuid::new_v4().to_string();
        self.environment.reset();

        let agents: Vec<String> = self
            .environment
            .profiles()
            .iter()
            .map(|p| p.name.clone())
            .collect();
        self.log.on_start(&self.task, &episode_id, &agents);

        while !self.environment.is_done() {
            match self.environment.step().await {
                Ok(result) => self.log.on_step(&result),
                Err(err) => {
                    self.log.on_error(&err);
                    return Err(err);
                }
            }
        }

        let turns = self.environment.turn_index();
        self.log.on_finish(turns);
        Ok(EpisodeSummary {
            task: self.task.clone(),
            episode_id,
            turns,
            done: self.environment.is_done(),
        })
    }
}
