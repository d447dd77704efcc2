//! Agents
//!
//! The environment only needs one capability from an agent: given an
//! observation, produce a reply. Everything behind that call (prompting,
//! model access, retries) belongs to the agent implementation.

mod scripted;

pub use scripted::{MirrorAgent, ScriptedAgent};

use async_trait::async_trait;
use verse_events::{AgentProfile, Observation, Reply};

use crate::config::AgentSpec;
use crate::error::{AgentError, RegistryError, VerseError};
use crate::registry::Registry;

/// An autonomous participant in an episode.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Name and role; stable for the lifetime of the agent.
    fn profile(&self) -> &AgentProfile;

    /// Produces this agent's action for the current turn.
    ///
    /// May be slow (network-bound) and may fail.
    async fn act(&mut self, observation: &Observation) -> Result<Reply, AgentError>;

    /// Forgets any per-episode memory.
    fn reset(&mut self) {}

    fn name(&self) -> &str {
        &self.profile().name
    }
}

/// Registry of agent kinds, keyed by the `kind` field of an agent spec.
pub type AgentRegistry = Registry<Box<dyn Agent>, AgentSpec>;

/// Registers the built-in agent kinds.
pub fn register(registry: &mut AgentRegistry) -> Result<(), RegistryError> {
    registry.register("scripted", build_scripted)?;
    registry.register("mirror", build_mirror)?;
    Ok(())
}

fn build_scripted(spec: AgentSpec) -> Result<Box<dyn Agent>, VerseError> {
    Ok(Box::new(ScriptedAgent::from_spec(spec)))
}

fn build_mirror(spec: AgentSpec) -> Result<Box<dyn Agent>, VerseError> {
    Ok(Box::new(MirrorAgent::from_spec(spec)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_agent_kinds() {
        let mut registry = AgentRegistry::new("AgentRegistry");
        register(&mut registry).unwrap();

        let keys: Vec<&str> = registry.keys().collect();
        assert_eq!(keys, vec!["mirror", "scripted"]);

        let agent = registry
            .create("scripted", AgentSpec::scripted("A", "student", ["hi"]))
            .unwrap();
        assert_eq!(agent.name(), "A");
        assert_eq!(agent.profile().role, "student");
    }

    #[test]
    fn test_double_registration_fails() {
        let mut registry = AgentRegistry::new("AgentRegistry");
        register(&mut registry).unwrap();
        assert!(register(&mut registry).is_err());
    }
}
