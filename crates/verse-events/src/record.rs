//! Turn Records
//!
//! The append-only history of an episode and the per-step summaries handed to
//! the orchestrator.

use serde::{Deserialize, Serialize};

use crate::message::Message;

/// What one acting agent was shown before it acted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Turn being played
    pub turn_index: u64,
    /// Agent receiving the observation
    pub agent: String,
    /// Role of that agent
    pub role: String,
    /// History messages the visibility policy exposes
    pub messages: Vec<Message>,
    /// Variant payload view, if the variant exposes one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<serde_json::Value>,
}

impl Observation {
    /// Most recent visible message, if any.
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

/// One completed turn.
///
/// `actors`, `observations` and `actions` are index-aligned and always listed
/// in the environment's construction order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub turn_index: u64,
    pub actors: Vec<String>,
    pub observations: Vec<Observation>,
    pub actions: Vec<Message>,
}

impl TurnRecord {
    /// Action produced by the named agent this turn.
    pub fn action_of(&self, agent: &str) -> Option<&Message> {
        self.actors
            .iter()
            .position(|a| a == agent)
            .and_then(|i| self.actions.get(i))
    }

    /// Iterates `(actor, action)` pairs in record order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Message)> {
        self.actors
            .iter()
            .map(String::as_str)
            .zip(self.actions.iter())
    }

    /// Serialize to a single JSON line.
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Summary of one `step()` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    /// Index of the turn that just completed
    pub turn_index: u64,
    pub actors: Vec<String>,
    pub actions: Vec<Message>,
    /// Whether the episode is finished after this step
    pub done: bool,
}

impl StepResult {
    /// Builds the summary from the record that was just appended.
    pub fn from_record(record: &TurnRecord, done: bool) -> Self {
        Self {
            turn_index: record.turn_index,
            actors: record.actors.clone(),
            actions: record.actions.clone(),
            done,
        }
    }

    /// Human-readable rendering, one line per action.
    pub fn render(&self) -> String {
        let mut out = format!("[Turn {:>3}]", self.turn_index);
        for action in &self.actions {
            if action.is_no_op() {
                out.push_str(&format!("\n  {}: <no-op>", action.sender));
            } else {
                out.push_str(&format!("\n  {}: {}", action.sender, action.content));
            }
        }
        if self.done {
            out.push_str("\n  (episode finished)");
        }
        out
    }
}
