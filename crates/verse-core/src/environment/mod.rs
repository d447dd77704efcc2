//! Environment Contract
//!
//! An environment owns the agents, the append-only turn history and the
//! variant payload. Every variant is the same [`PolicyEnvironment`] assembled
//! from a selection policy, a visibility policy and a set of [`Rules`].
//!
//! # Step
//!
//! ```text
//! select actors ─▶ build observations ─▶ invoke + route each action ─▶ apply ─▶ append record
//!                                         (sequential or                          │
//!                                          concurrent join)                       ▼
//!                                                               turn_index += 1, check done
//! ```

pub mod basic;
pub mod game;
pub mod team;

pub use basic::Conversation;
pub use game::TownMap;
pub use team::TeamBoard;

use async_trait::async_trait;
use futures::future::join_all;
use std::collections::BTreeSet;
use std::time::Duration;
use verse_events::{AgentProfile, Message, Observation, StepResult, TurnRecord};

use crate::agent::Agent;
use crate::config::{EnvironmentConfig, FailurePolicy};
use crate::error::{AgentActionError, EnvironmentError, RegistryError, VerseError};
use crate::policy::{Invocation, Selection, SelectionPolicy, VisibilityPolicy};
use crate::registry::Registry;

/// The state machine every environment variant implements.
#[async_trait]
pub trait Environment: Send {
    /// Registry key of the variant.
    fn kind(&self) -> &str;

    /// Agent identities in construction order.
    fn profiles(&self) -> &[AgentProfile];

    fn history(&self) -> &[TurnRecord];

    /// Number of completed steps since the last reset.
    fn turn_index(&self) -> u64;

    fn max_turns(&self) -> Option<u64>;

    /// Snapshot of the variant payload.
    fn state(&self) -> serde_json::Value;

    /// Back to the initial state for this configuration. Idempotent.
    fn reset(&mut self);

    /// Plays exactly one turn.
    ///
    /// On error nothing is appended and `turn_index` is unchanged.
    async fn step(&mut self) -> Result<StepResult, VerseError>;

    /// True once the rules terminate or `max_turns` is reached.
    fn is_done(&self) -> bool;
}

/// Variant-specific update and termination logic, owning the payload.
pub trait Rules: Send + Sync {
    /// Restores the initial payload.
    fn reset(&mut self);

    /// Adjusts a message's audience before it is recorded.
    ///
    /// Called on each action as soon as it is produced, so sequential
    /// siblings only see what they are allowed to hear.
    fn route(&self, _message: &mut Message) {}

    /// Folds one step's actions (construction order) into the payload.
    fn apply(&mut self, turn_index: u64, actions: &[Message]);

    /// Whether the payload reached a terminal condition.
    fn is_terminal(&self) -> bool;

    /// Part of the payload shown to `agent` in its observation.
    fn view_for(&self, _agent: &AgentProfile) -> Option<serde_json::Value> {
        None
    }

    /// Full payload snapshot.
    fn state(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
}

/// Everything a variant constructor receives.
pub struct EnvironmentSpec {
    pub agents: Vec<Box<dyn Agent>>,
    pub config: EnvironmentConfig,
    /// Selection override from the task's `order` key
    pub selection: Option<Box<dyn SelectionPolicy>>,
    /// Visibility override from the task's `visibility` key
    pub visibility: Option<Box<dyn VisibilityPolicy>>,
}

impl EnvironmentSpec {
    pub fn new(agents: Vec<Box<dyn Agent>>, config: EnvironmentConfig) -> Self {
        Self {
            agents,
            config,
            selection: None,
            visibility: None,
        }
    }

    pub fn profiles(&self) -> Vec<AgentProfile> {
        self.agents.iter().map(|a| a.profile().clone()).collect()
    }
}

pub type EnvironmentRegistry = Registry<Box<dyn Environment>, EnvironmentSpec>;

/// Registers the built-in environment variants.
pub fn register(registry: &mut EnvironmentRegistry) -> Result<(), RegistryError> {
    registry.register(basic::KIND, basic::build)?;
    registry.register(game::KIND, game::build)?;
    registry.register(team::KIND, team::build)?;
    Ok(())
}

/// The environment contract implemented once, parameterized by policies.
pub struct PolicyEnvironment {
    kind: String,
    agents: Vec<Box<dyn Agent>>,
    profiles: Vec<AgentProfile>,
    selection: Box<dyn SelectionPolicy>,
    visibility: Box<dyn VisibilityPolicy>,
    rules: Box<dyn Rules>,
    history: Vec<TurnRecord>,
    turn_index: u64,
    max_turns: Option<u64>,
    agent_timeout: Option<Duration>,
    failure_policy: FailurePolicy,
    finished: bool,
}

impl PolicyEnvironment {
    /// Creates an environment in its reset state.
    ///
    /// Fails with `InvalidConfiguration` on an empty roster or duplicate names.
    pub fn new(
        kind: impl Into<String>,
        agents: Vec<Box<dyn Agent>>,
        selection: Box<dyn SelectionPolicy>,
        visibility: Box<dyn VisibilityPolicy>,
        rules: Box<dyn Rules>,
    ) -> Result<Self, VerseError> {
        let kind = kind.into();
        if agents.is_empty() {
            return Err(VerseError::invalid(format!(
                "environment '{kind}' needs at least one agent"
            )));
        }

        let profiles: Vec<AgentProfile> = agents.iter().map(|a| a.profile().clone()).collect();
        let mut names = BTreeSet::new();
        for profile in &profiles {
            if !names.insert(profile.name.as_str()) {
                return Err(VerseError::invalid(format!(
                    "duplicate agent name '{}'",
                    profile.name
                )));
            }
        }

        Ok(Self {
            kind,
            agents,
            profiles,
            selection,
            visibility,
            rules,
            history: Vec::new(),
            turn_index: 0,
            max_turns: None,
            agent_timeout: None,
            failure_policy: FailurePolicy::Abort,
            finished: false,
        })
    }

    /// Builds a variant, preferring the task's policy overrides
    /// over the variant defaults and applying the generic limits.
    pub fn from_spec(
        kind: &str,
        spec: EnvironmentSpec,
        default_selection: Box<dyn SelectionPolicy>,
        default_visibility: Box<dyn VisibilityPolicy>,
        rules: Box<dyn Rules>,
    ) -> Result<Self, VerseError> {
        let selection = spec.selection.unwrap_or(default_selection);
        let visibility = spec.visibility.unwrap_or(default_visibility);

        Ok(Self::new(kind, spec.agents, selection, visibility, rules)?
            .with_max_turns(spec.config.max_turns)
            .with_agent_timeout(spec.config.agent_timeout())
            .with_failure_policy(spec.config.on_agent_failure))
    }

    pub fn with_max_turns(mut self, max_turns: Option<u64>) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn with_agent_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.agent_timeout = timeout;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    fn observe(&self, turn_index: u64, index: usize, pending: &[Message]) -> Observation {
        let profile = &self.profiles[index];
        Observation {
            turn_index,
            agent: profile.name.clone(),
            role: profile.role.clone(),
            messages: self
                .visibility
                .visible(profile, &self.profiles, &self.history, pending),
            state: self.rules.view_for(profile),
        }
    }

    /// Applies the failure policy to one agent outcome.
    fn settle(
        &self,
        index: usize,
        outcome: Result<Message, AgentActionError>,
    ) -> Result<Message, VerseError> {
        match outcome {
            Ok(message) => Ok(message),
            Err(err) => match self.failure_policy {
                FailurePolicy::Abort => Err(err.into()),
                FailurePolicy::Skip => {
                    tracing::warn!(
                        turn = self.turn_index,
                        agent = %self.profiles[index].name,
                        error = %err,
                        "agent failed, recording no-op"
                    );
                    Ok(Message::no_op(self.profiles[index].name.clone()))
                }
            },
        }
    }

    async fn invoke_sequential(
        &mut self,
        turn_index: u64,
        actors: &[usize],
    ) -> Result<(Vec<Observation>, Vec<Message>), VerseError> {
        let timeout = self.agent_timeout;
        let mut observations = Vec::with_capacity(actors.len());
        let mut actions = Vec::with_capacity(actors.len());

        for &index in actors {
            let observation = self.observe(turn_index, index, &actions);
            let outcome =
                call_agent(self.agents[index].as_mut(), &observation, timeout, turn_index).await;
            let mut message = self.settle(index, outcome)?;
            // Later siblings see the message with its final audience
            self.rules.route(&mut message);
            observations.push(observation);
            actions.push(message);
        }
        Ok((observations, actions))
    }

    async fn invoke_concurrent(
        &mut self,
        turn_index: u64,
        actors: &[usize],
    ) -> Result<(Vec<Observation>, Vec<Message>), VerseError> {
        let timeout = self.agent_timeout;
        let observations: Vec<Observation> = actors
            .iter()
            .map(|&index| self.observe(turn_index, index, &[]))
            .collect();

        // `actors` is sorted and unique, so the filtered roster lines up with it
        let calls = self
            .agents
            .iter_mut()
            .enumerate()
            .filter(|(index, _)| actors.binary_search(index).is_ok())
            .zip(observations.iter())
            .map(|((_, agent), observation)| {
                call_agent(agent.as_mut(), observation, timeout, turn_index)
            });
        // join_all yields results in input order, not completion order
        let outcomes = join_all(calls).await;

        let mut actions = Vec::with_capacity(actors.len());
        for (&index, outcome) in actors.iter().zip(outcomes) {
            let mut message = self.settle(index, outcome)?;
            self.rules.route(&mut message);
            actions.push(message);
        }
        Ok((observations, actions))
    }

    fn limit_reached(&self) -> bool {
        self.max_turns.is_some_and(|max| self.turn_index >= max)
    }
}

/// Invokes one agent, enforcing the optional time budget.
async fn call_agent(
    agent: &mut dyn Agent,
    observation: &Observation,
    timeout: Option<Duration>,
    turn_index: u64,
) -> Result<Message, AgentActionError> {
    let name = agent.name().to_string();
    let outcome = match timeout {
        Some(budget) => match tokio::time::timeout(budget, agent.act(observation)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                return Err(AgentActionError::TimedOut {
                    agent: name,
                    turn_index,
                    budget,
                })
            }
        },
        None => agent.act(observation).await,
    };

    match outcome {
        Ok(reply) => Ok(reply.into_message(name)),
        Err(source) => Err(AgentActionError::Failed {
            agent: name,
            turn_index,
            source,
        }),
    }
}

#[async_trait]
impl Environment for PolicyEnvironment {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn profiles(&self) -> &[AgentProfile] {
        &self.profiles
    }

    fn history(&self) -> &[TurnRecord] {
        &self.history
    }

    fn turn_index(&self) -> u64 {
        self.turn_index
    }

    fn max_turns(&self) -> Option<u64> {
        self.max_turns
    }

    fn state(&self) -> serde_json::Value {
        self.rules.state()
    }

    fn reset(&mut self) {
        self.history.clear();
        self.turn_index = 0;
        self.finished = false;
        self.rules.reset();
        self.selection.reset();
        for agent in &mut self.agents {
            agent.reset();
        }
    }

    async fn step(&mut self) -> Result<StepResult, VerseError> {
        if self.is_done() {
            return Err(EnvironmentError::EpisodeFinished {
                turn_index: self.turn_index,
            }
            .into());
        }

        let turn_index = self.turn_index;
        let chosen = self
            .selection
            .select(turn_index, &self.profiles, &self.history)?;
        // Custom policies may hand back unsorted or repeated indices
        let selection = Selection::new(chosen.actors, chosen.invocation);
        if selection.actors.is_empty() {
            return Err(VerseError::invalid(format!(
                "selection policy chose no agent on turn {turn_index}"
            )));
        }
        if let Some(bad) = selection.actors.iter().find(|&&i| i >= self.agents.len()) {
            return Err(VerseError::invalid(format!(
                "selection policy chose agent #{bad} of {}",
                self.agents.len()
            )));
        }

        let (observations, actions) = match selection.invocation {
            Invocation::Sequential => self.invoke_sequential(turn_index, &selection.actors).await?,
            Invocation::Concurrent => self.invoke_concurrent(turn_index, &selection.actors).await?,
        };

        self.rules.apply(turn_index, &actions);

        let record = TurnRecord {
            turn_index,
            actors: selection
                .actors
                .iter()
                .map(|&i| self.profiles[i].name.clone())
                .collect(),
            observations,
            actions,
        };
        self.turn_index += 1;
        self.finished = self.rules.is_terminal() || self.limit_reached();

        let result = StepResult::from_record(&record, self.finished);
        self.history.push(record);

        tracing::debug!(
            turn = turn_index,
            actors = ?result.actors,
            done = result.done,
            "step complete"
        );
        Ok(result)
    }

    fn is_done(&self) -> bool {
        self.finished || self.rules.is_terminal() || self.limit_reached()
    }
}
