//! Generic conversational environment.
//!
//! Agents take turns in construction order and everyone sees the whole
//! transcript. The episode ends at `max_turns`, or as soon as any agent says
//! the configured `stop_phrase`.

use serde_json::json;
use verse_events::Message;

use super::{Environment, EnvironmentSpec, PolicyEnvironment, Rules};
use crate::error::VerseError;
use crate::policy::{FullTranscript, RoundRobin};

pub const KIND: &str = "basic";

/// Payload of the basic environment: a message count and the stop signal.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    stop_phrase: Option<String>,
    messages: u64,
    stopped: bool,
}

impl Conversation {
    pub fn new(stop_phrase: Option<String>) -> Self {
        Self {
            stop_phrase: stop_phrase.filter(|p| !p.is_empty()),
            messages: 0,
            stopped: false,
        }
    }
}

impl Rules for Conversation {
    fn reset(&mut self) {
        self.messages = 0;
        self.stopped = false;
    }

    fn apply(&mut self, _turn_index: u64, actions: &[Message]) {
        for action in actions.iter().filter(|m| !m.is_no_op()) {
            self.messages += 1;
            if let Some(phrase) = &self.stop_phrase {
                if action.content.contains(phrase.as_str()) {
                    self.stopped = true;
                }
            }
        }
    }

    fn is_terminal(&self) -> bool {
        self.stopped
    }

    fn state(&self) -> serde_json::Value {
        json!({
            "messages": self.messages,
            "stopped": self.stopped,
        })
    }
}

pub(crate) fn build(spec: EnvironmentSpec) -> Result<Box<dyn Environment>, VerseError> {
    let stop_phrase = spec.config.options().str("stop_phrase")?.map(str::to_string);
    let env = PolicyEnvironment::from_spec(
        KIND,
        spec,
        Box::new(RoundRobin),
        Box::new(FullTranscript),
        Box::new(Conversation::new(stop_phrase)),
    )?;
    Ok(Box::new(env))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Agent, ScriptedAgent};
    use crate::config::EnvironmentConfig;
    use verse_events::AgentProfile;

    #[test]
    fn test_stop_phrase_terminates() {
        let mut rules = Conversation::new(Some("[END]".into()));
        rules.apply(0, &[Message::new("a", "still going")]);
        assert!(!rules.is_terminal());

        rules.apply(1, &[Message::new("b", "that's all [END]")]);
        assert!(rules.is_terminal());

        rules.reset();
        assert!(!rules.is_terminal());
        assert_eq!(rules.state()["messages"], 0);
    }

    #[test]
    fn test_no_ops_not_counted() {
        let mut rules = Conversation::new(None);
        rules.apply(0, &[Message::no_op("a"), Message::new("b", "hi")]);
        assert_eq!(rules.state()["messages"], 1);
    }

    #[test]
    fn test_empty_stop_phrase_ignored() {
        let mut rules = Conversation::new(Some(String::new()));
        rules.apply(0, &[Message::new("a", "anything")]);
        assert!(!rules.is_terminal());
    }

    #[tokio::test]
    async fn test_build_from_spec() {
        let mut config = EnvironmentConfig::new(KIND);
        config.max_turns = Some(6);
        config
            .options
            .insert("stop_phrase".into(), toml::Value::String("bye".into()));

        let agents: Vec<Box<dyn Agent>> = vec![
            Box::new(ScriptedAgent::new(AgentProfile::new("A", "x"), ["hello"])),
            Box::new(ScriptedAgent::new(AgentProfile::new("B", "x"), ["bye"])),
        ];
        let mut env = build(EnvironmentSpec::new(agents, config)).unwrap();

        assert_eq!(env.kind(), "basic");
        assert_eq!(env.max_turns(), Some(6));
        assert!(!env.step().await.unwrap().done);
        assert!(env.step().await.unwrap().done);
        assert_eq!(env.turn_index(), 2);
    }
}
