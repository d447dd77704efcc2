//! Message Types
//!
//! What agents say to each other, and who gets to hear it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Identity of an agent inside one environment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentProfile {
    /// Unique name within the environment
    pub name: String,
    /// Free-form role label (e.g. "professor", "code_writer")
    pub role: String,
}

impl AgentProfile {
    pub fn new(name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
        }
    }
}

/// Audience of a message.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Receivers {
    /// Broadcast to every agent
    #[default]
    All,
    /// Only the named agents
    Only(BTreeSet<String>),
}

impl Receivers {
    /// Builds a restricted audience from any iterator of names.
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Receivers::Only(names.into_iter().map(Into::into).collect())
    }

    /// Checks whether the named agent is part of the audience.
    pub fn includes(&self, name: &str) -> bool {
        match self {
            Receivers::All => true,
            Receivers::Only(names) => names.contains(name),
        }
    }
}

/// How a message came to be in the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Produced by the agent
    #[default]
    Speech,
    /// Placeholder recorded when the agent failed and the failure was skipped
    NoOp,
}

/// One action produced by an agent during a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub sender: String,
    pub content: String,
    #[serde(default)]
    pub receivers: Receivers,
    #[serde(default)]
    pub kind: MessageKind,
}

impl Message {
    /// Creates a broadcast speech message.
    pub fn new(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            content: content.into(),
            receivers: Receivers::All,
            kind: MessageKind::Speech,
        }
    }

    /// Creates the placeholder recorded for a skipped agent failure.
    pub fn no_op(sender: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            content: String::new(),
            receivers: Receivers::All,
            kind: MessageKind::NoOp,
        }
    }

    /// Builder-style audience override.
    pub fn with_receivers(mut self, receivers: Receivers) -> Self {
        self.receivers = receivers;
        self
    }

    /// Checks whether the named agent can see this message (sender or audience).
    pub fn is_visible_to(&self, name: &str) -> bool {
        self.sender == name || self.receivers.includes(name)
    }

    pub fn is_no_op(&self) -> bool {
        self.kind == MessageKind::NoOp
    }
}

/// What an agent hands back from its action step.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Reply {
    pub content: String,
    /// Explicit audience; `None` means broadcast
    #[serde(default)]
    pub receivers: Option<BTreeSet<String>>,
}

impl Reply {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            receivers: None,
        }
    }

    /// Restricts the reply to the given agents.
    pub fn to<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.receivers = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Turns the reply into a history message sent by `sender`.
    pub fn into_message(self, sender: impl Into<String>) -> Message {
        let receivers = match self.receivers {
            Some(names) => Receivers::Only(names),
            None => Receivers::All,
        };
        Message::new(sender, self.content).with_receivers(receivers)
    }
}

impl From<&str> for Reply {
    fn from(content: &str) -> Self {
        Reply::new(content)
    }
}

impl From<String> for Reply {
    fn from(content: String) -> Self {
        Reply::new(content)
    }
}
