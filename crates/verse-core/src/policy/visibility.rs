//! Visibility Policies

use std::collections::{BTreeMap, BTreeSet};
use verse_events::{AgentProfile, Message, TurnRecord};

use super::{transcript, PolicySpec, VisibilityPolicy};
use crate::error::VerseError;

/// Everyone sees the whole transcript.
#[derive(Debug, Clone, Default)]
pub struct FullTranscript;

impl VisibilityPolicy for FullTranscript {
    fn visible(
        &self,
        _viewer: &AgentProfile,
        _roster: &[AgentProfile],
        history: &[TurnRecord],
        pending: &[Message],
    ) -> Vec<Message> {
        transcript(history, pending).cloned().collect()
    }
}

/// Only the most recent message another agent addressed to the viewer.
#[derive(Debug, Clone, Default)]
pub struct LastFromOthers;

impl VisibilityPolicy for LastFromOthers {
    fn visible(
        &self,
        viewer: &AgentProfile,
        _roster: &[AgentProfile],
        history: &[TurnRecord],
        pending: &[Message],
    ) -> Vec<Message> {
        let all: Vec<&Message> = transcript(history, pending).collect();
        all.into_iter()
            .rev()
            .find(|m| m.sender != viewer.name && !m.is_no_op() && m.is_visible_to(&viewer.name))
            .cloned()
            .into_iter()
            .collect()
    }
}

/// Messages the viewer sent or that are addressed to it.
#[derive(Debug, Clone, Default)]
pub struct Addressed;

impl VisibilityPolicy for Addressed {
    fn visible(
        &self,
        viewer: &AgentProfile,
        _roster: &[AgentProfile],
        history: &[TurnRecord],
        pending: &[Message],
    ) -> Vec<Message> {
        transcript(history, pending)
            .filter(|m| m.is_visible_to(&viewer.name))
            .cloned()
            .collect()
    }
}

/// Each role sees its own messages plus those of the roles it is allowed to
/// watch. Roles without an entry see every message addressed to them.
#[derive(Debug, Clone, Default)]
pub struct RoleScoped {
    sees: BTreeMap<String, BTreeSet<String>>,
}

impl RoleScoped {
    pub fn new(sees: BTreeMap<String, BTreeSet<String>>) -> Self {
        Self { sees }
    }

    /// Lets `role` see messages from `visible` roles.
    pub fn allow<I, S>(mut self, role: impl Into<String>, visible: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sees
            .entry(role.into())
            .or_default()
            .extend(visible.into_iter().map(Into::into));
        self
    }

    pub fn from_options(table: Option<&toml::Table>) -> Result<Self, VerseError> {
        let mut policy = Self::default();
        let Some(table) = table else {
            return Ok(policy);
        };
        for (role, value) in table {
            let roles = value
                .as_array()
                .ok_or_else(|| VerseError::invalid(format!("sees.{role} must be a list of roles")))?;
            let mut visible = BTreeSet::new();
            for item in roles {
                let name = item.as_str().ok_or_else(|| {
                    VerseError::invalid(format!("sees.{role} must be a list of roles"))
                })?;
                visible.insert(name.to_string());
            }
            policy.sees.insert(role.clone(), visible);
        }
        Ok(policy)
    }
}

impl VisibilityPolicy for RoleScoped {
    fn visible(
        &self,
        viewer: &AgentProfile,
        roster: &[AgentProfile],
        history: &[TurnRecord],
        pending: &[Message],
    ) -> Vec<Message> {
        let allowed = self.sees.get(&viewer.role);
        let role_of = |name: &str| {
            roster
                .iter()
                .find(|p| p.name == name)
                .map(|p| p.role.as_str())
        };

        transcript(history, pending)
            .filter(|m| m.is_visible_to(&viewer.name))
            .filter(|m| {
                m.sender == viewer.name
                    || match allowed {
                        None => true,
                        Some(roles) => role_of(&m.sender).is_some_and(|r| roles.contains(r)),
                    }
            })
            .cloned()
            .collect()
    }
}

pub(crate) fn build_full_transcript(
    _spec: PolicySpec,
) -> Result<Box<dyn VisibilityPolicy>, VerseError> {
    Ok(Box::new(FullTranscript))
}

pub(crate) fn build_last_from_others(
    _spec: PolicySpec,
) -> Result<Box<dyn VisibilityPolicy>, VerseError> {
    Ok(Box::new(LastFromOthers))
}

pub(crate) fn build_addressed(_spec: PolicySpec) -> Result<Box<dyn VisibilityPolicy>, VerseError> {
    Ok(Box::new(Addressed))
}

pub(crate) fn build_role_scoped(spec: PolicySpec) -> Result<Box<dyn VisibilityPolicy>, VerseError> {
    Ok(Box::new(RoleScoped::from_options(spec.options().table("sees")?)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use verse_events::fixtures::{sample_history, sample_profiles};

    fn contents(messages: &[Message]) -> Vec<&str> {
        messages.iter().map(|m| m.content.as_str()).collect()
    }

    #[test]
    fn test_full_transcript_sees_everything() {
        let roster = sample_profiles();
        let seen = FullTranscript.visible(&roster[2], &roster, &sample_history(), &[]);
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn test_addressed_hides_whispers() {
        let roster = sample_profiles();
        let history = sample_history();

        // Professor is not in the audience of Bob's whisper
        let seen = Addressed.visible(&roster[0], &roster, &history, &[]);
        assert_eq!(seen.len(), 3);
        assert!(!contents(&seen).contains(&"I think it is a set of rules."));

        // Alice is
        let seen = Addressed.visible(&roster[1], &roster, &history, &[]);
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn test_last_from_others() {
        let roster = sample_profiles();
        let history = sample_history();

        // Bob's whisper to Alice is skipped for the professor
        let seen = LastFromOthers.visible(&roster[0], &roster, &history, &[]);
        assert_eq!(contents(&seen), vec!["What is a grammar?"]);

        let seen = LastFromOthers.visible(&roster[1], &roster, &history, &[]);
        assert_eq!(contents(&seen), vec!["A grammar is a set of rules."]);

        let pending = vec![Message::new("Alice", "fresh")];
        let seen = LastFromOthers.visible(&roster[0], &roster, &history, &pending);
        assert_eq!(contents(&seen), vec!["fresh"]);

        let seen = LastFromOthers.visible(&roster[0], &roster, &[], &[]);
        assert!(seen.is_empty());
    }

    #[test]
    fn test_role_scoped() {
        let roster = sample_profiles();
        let history = sample_history();
        let policy = RoleScoped::default().allow("student", ["professor"]);

        // Students see the professor plus their own lines
        let seen = policy.visible(&roster[1], &roster, &history, &[]);
        assert_eq!(
            contents(&seen),
            vec![
                "Today we cover parsing.",
                "What is a grammar?",
                "A grammar is a set of rules.",
            ]
        );

        // Professor has no entry and sees everything addressed to them
        let seen = policy.visible(&roster[0], &roster, &history, &[]);
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_role_scoped_from_options() {
        let table: toml::Table =
            toml::from_str("code_writer = [\"code_tester\", \"code_reviewer\"]").unwrap();
        let policy = RoleScoped::from_options(Some(&table)).unwrap();
        assert_eq!(policy.sees["code_writer"].len(), 2);

        let bad: toml::Table = toml::from_str("code_writer = \"code_tester\"").unwrap();
        assert!(RoleScoped::from_options(Some(&bad)).is_err());
    }
}
