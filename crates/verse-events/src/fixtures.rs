//! Sample data fixtures for testing.
//!
//! Enable the `test-fixtures` feature to access these helpers from other
//! crates.
//!
//! # Example
//!
//! ```ignore
//! // In your Cargo.toml:
//! // [dev-dependencies]
//! // verse-events = { path = "../verse-events", features = ["test-fixtures"] }
//!
//! use verse_events::fixtures;
//!
//! let history = fixtures::sample_history();
//! ```

use crate::{AgentProfile, Message, Observation, Receivers, TurnRecord};

/// Three-agent classroom roster: one professor, two students.
pub fn sample_profiles() -> Vec<AgentProfile> {
    vec![
        AgentProfile::new("Professor", "professor"),
        AgentProfile::new("Alice", "student"),
        AgentProfile::new("Bob", "student"),
    ]
}

/// Four completed turns of a round-robin classroom conversation.
///
/// - turn 0: professor opens the lecture (broadcast)
/// - turn 1: Alice asks a question (broadcast)
/// - turn 2: Bob whispers to Alice only
/// - turn 3: professor answers (broadcast)
pub fn sample_history() -> Vec<TurnRecord> {
    let lines = [
        ("Professor", "professor", Message::new("Professor", "Today we cover parsing.")),
        ("Alice", "student", Message::new("Alice", "What is a grammar?")),
        (
            "Bob",
            "student",
            Message::new("Bob", "I think it is a set of rules.")
                .with_receivers(Receivers::only(["Alice"])),
        ),
        ("Professor", "professor", Message::new("Professor", "A grammar is a set of rules.")),
    ];

    lines
        .into_iter()
        .enumerate()
        .map(|(i, (agent, role, action))| TurnRecord {
            turn_index: i as u64,
            actors: vec![agent.to_string()],
            observations: vec![Observation {
                turn_index: i as u64,
                agent: agent.to_string(),
                role: role.to_string(),
                messages: vec![],
                state: None,
            }],
            actions: vec![action],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_history_shape() {
        let history = sample_history();
        assert_eq!(history.len(), 4);
        for (i, record) in history.iter().enumerate() {
            assert_eq!(record.turn_index, i as u64);
            assert_eq!(record.actors.len(), record.actions.len());
        }
    }

    #[test]
    fn test_sample_profiles_unique() {
        let profiles = sample_profiles();
        let names: std::collections::BTreeSet<_> =
            profiles.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names.len(), profiles.len());
    }
}
