//! Built-in agents that need no model backend.

use async_trait::async_trait;
use verse_events::{AgentProfile, Observation, Reply};

use super::Agent;
use crate::config::AgentSpec;
use crate::error::AgentError;

/// Replays a fixed list of replies, one per turn it is asked to act.
#[derive(Debug, Clone)]
pub struct ScriptedAgent {
    profile: AgentProfile,
    responses: Vec<String>,
    repeat: bool,
    cursor: usize,
}

impl ScriptedAgent {
    pub fn new<I, S>(profile: AgentProfile, responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            profile,
            responses: responses.into_iter().map(Into::into).collect(),
            repeat: true,
            cursor: 0,
        }
    }

    pub fn from_spec(spec: AgentSpec) -> Self {
        Self {
            profile: AgentProfile::new(spec.name, spec.role),
            responses: spec.responses,
            repeat: spec.repeat,
            cursor: 0,
        }
    }

    /// Fail with `ScriptExhausted` instead of wrapping around.
    pub fn once(mut self) -> Self {
        self.repeat = false;
        self
    }

    /// Number of replies handed out since the last reset.
    pub fn replies_given(&self) -> usize {
        self.cursor
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    async fn act(&mut self, _observation: &Observation) -> Result<Reply, AgentError> {
        if self.responses.is_empty() || (!self.repeat && self.cursor >= self.responses.len()) {
            return Err(AgentError::ScriptExhausted(self.cursor));
        }
        let reply = self.responses[self.cursor % self.responses.len()].clone();
        self.cursor += 1;
        Ok(Reply::new(reply))
    }

    fn reset(&mut self) {
        self.cursor = 0;
    }
}

/// Answers by quoting the latest message it can see.
///
/// Speaks its first scripted line (or an ellipsis) when nothing is visible yet.
#[derive(Debug, Clone)]
pub struct MirrorAgent {
    profile: AgentProfile,
    opening: String,
}

impl MirrorAgent {
    pub fn new(profile: AgentProfile, opening: impl Into<String>) -> Self {
        Self {
            profile,
            opening: opening.into(),
        }
    }

    pub fn from_spec(spec: AgentSpec) -> Self {
        let opening = spec
            .responses
            .into_iter()
            .next()
            .unwrap_or_else(|| "...".to_string());
        Self::new(AgentProfile::new(spec.name, spec.role), opening)
    }
}

#[async_trait]
impl Agent for MirrorAgent {
    fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    async fn act(&mut self, observation: &Observation) -> Result<Reply, AgentError> {
        let last = observation
            .messages
            .iter()
            .rev()
            .find(|m| !m.is_no_op() && m.sender != self.profile.name);

        Ok(match last {
            Some(message) => Reply::new(format!("{} said: {}", message.sender, message.content)),
            None => Reply::new(self.opening.clone()),
        })
    }
}
