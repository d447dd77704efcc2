//! Turn selection and visibility policies.
//!
//! Environment variants are assembled from these pieces plus their own rules,
//! so the same ordering or visibility policy can be reused by any variant and
//! overridden per task by registry key.

pub mod selection;
pub mod visibility;

pub use selection::{AllAgents, Controller, Pipeline, RandomOrder, RoundRobin};
pub use visibility::{Addressed, FullTranscript, LastFromOthers, RoleScoped};

use verse_events::{AgentProfile, Message, TurnRecord};

use crate::config::Options;
use crate::error::{RegistryError, VerseError};
use crate::registry::Registry;

/// How the acting agents of one step are invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invocation {
    /// One after another; later agents see earlier siblings' messages
    Sequential,
    /// All at once against the same pre-step snapshot
    Concurrent,
}

/// The agents chosen to act in one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Roster indices, always in construction order
    pub actors: Vec<usize>,
    pub invocation: Invocation,
}

impl Selection {
    pub fn single(index: usize) -> Self {
        Self {
            actors: vec![index],
            invocation: Invocation::Sequential,
        }
    }

    /// Builds a selection, sorting actors into construction order.
    pub fn new(mut actors: Vec<usize>, invocation: Invocation) -> Self {
        actors.sort_unstable();
        actors.dedup();
        Self { actors, invocation }
    }
}

/// Decides who acts each step.
pub trait SelectionPolicy: Send + Sync {
    fn select(
        &mut self,
        turn_index: u64,
        roster: &[AgentProfile],
        history: &[TurnRecord],
    ) -> Result<Selection, VerseError>;

    /// Returns to the initial state; called from the environment's reset.
    fn reset(&mut self) {}
}

/// Decides which messages an acting agent is shown.
pub trait VisibilityPolicy: Send + Sync {
    /// Messages visible to `viewer`, oldest first.
    ///
    /// `pending` holds messages already produced earlier in the current step.
    fn visible(
        &self,
        viewer: &AgentProfile,
        roster: &[AgentProfile],
        history: &[TurnRecord],
        pending: &[Message],
    ) -> Vec<Message>;
}

/// Inputs available to policy constructors.
#[derive(Debug, Clone)]
pub struct PolicySpec {
    pub roster: Vec<AgentProfile>,
    pub options: toml::Table,
}

impl PolicySpec {
    pub fn new(roster: Vec<AgentProfile>, options: toml::Table) -> Self {
        Self { roster, options }
    }

    pub fn options(&self) -> Options<'_> {
        Options::new(&self.options)
    }
}

pub type SelectionRegistry = Registry<Box<dyn SelectionPolicy>, PolicySpec>;
pub type VisibilityRegistry = Registry<Box<dyn VisibilityPolicy>, PolicySpec>;

/// All messages of the episode so far, followed by this step's pending ones.
pub(crate) fn transcript<'a>(
    history: &'a [TurnRecord],
    pending: &'a [Message],
) -> impl Iterator<Item = &'a Message> + 'a {
    history
        .iter()
        .flat_map(|record| record.actions.iter())
        .chain(pending.iter())
}

/// Registers the built-in selection policies.
pub fn register_selection(registry: &mut SelectionRegistry) -> Result<(), RegistryError> {
    registry.register("sequential", selection::build_round_robin)?;
    registry.register("concurrent", selection::build_all_agents)?;
    registry.register("random", selection::build_random)?;
    registry.register("controller", selection::build_controller)?;
    registry.register("pipeline", selection::build_pipeline)?;
    Ok(())
}

/// Registers the built-in visibility policies.
pub fn register_visibility(registry: &mut VisibilityRegistry) -> Result<(), RegistryError> {
    registry.register("all", visibility::build_full_transcript)?;
    registry.register("last_from_others", visibility::build_last_from_others)?;
    registry.register("addressed", visibility::build_addressed)?;
    registry.register("role_scoped", visibility::build_role_scoped)?;
    Ok(())
}
