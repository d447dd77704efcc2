//! Software-engineering team environment.
//!
//! Roles act in pipeline order (writer, tester, reviewer by default). The
//! author's latest message is the shared document; the episode ends when the
//! reviewer approves a document. Each role only sees the roles it is allowed
//! to watch.

use serde_json::json;
use std::collections::BTreeSet;
use verse_events::{AgentProfile, Message};

use super::{Environment, EnvironmentSpec, PolicyEnvironment, Rules};
use crate::error::VerseError;
use crate::policy::selection::build_pipeline;
use crate::policy::{PolicySpec, RoleScoped};

pub const KIND: &str = "sde_team";

pub const AUTHOR_ROLE: &str = "code_writer";
pub const TESTER_ROLE: &str = "code_tester";
pub const REVIEWER_ROLE: &str = "code_reviewer";
pub const DEFAULT_APPROVE_PHRASE: &str = "APPROVED";

/// Payload of the team environment: the shared document and review state.
#[derive(Debug, Clone)]
pub struct TeamBoard {
    authors: BTreeSet<String>,
    reviewers: BTreeSet<String>,
    approve_phrase: String,
    document: Option<String>,
    revision: u32,
    feedback: Option<String>,
    approved: bool,
}

impl TeamBoard {
    /// Resolves the author and reviewer roles against the roster.
    pub fn new(
        roster: &[AgentProfile],
        author_role: &str,
        reviewer_role: &str,
        approve_phrase: impl Into<String>,
    ) -> Result<Self, VerseError> {
        let holders = |role: &str| -> BTreeSet<String> {
            roster
                .iter()
                .filter(|p| p.role == role)
                .map(|p| p.name.clone())
                .collect()
        };
        let authors = holders(author_role);
        let reviewers = holders(reviewer_role);
        if authors.is_empty() {
            return Err(VerseError::invalid(format!(
                "no agent holds the author role '{author_role}'"
            )));
        }
        if reviewers.is_empty() {
            return Err(VerseError::invalid(format!(
                "no agent holds the reviewer role '{reviewer_role}'"
            )));
        }

        let approve_phrase = approve_phrase.into();
        if approve_phrase.is_empty() {
            return Err(VerseError::invalid("approve phrase must not be empty"));
        }

        Ok(Self {
            authors,
            reviewers,
            approve_phrase,
            document: None,
            revision: 0,
            feedback: None,
            approved: false,
        })
    }

    pub fn document(&self) -> Option<&str> {
        self.document.as_deref()
    }

    pub fn revision(&self) -> u32 {
        self.revision
    }
}

impl Rules for TeamBoard {
    fn reset(&mut self) {
        self.document = None;
        self.revision = 0;
        self.feedback = None;
        self.approved = false;
    }

    fn apply(&mut self, _turn_index: u64, actions: &[Message]) {
        for action in actions.iter().filter(|m| !m.is_no_op()) {
            if self.authors.contains(&action.sender) {
                self.document = Some(action.content.clone());
                self.revision += 1;
                self.approved = false;
            } else if self.reviewers.contains(&action.sender) {
                self.feedback = Some(action.content.clone());
                if self.document.is_some() && action.content.contains(&self.approve_phrase) {
                    self.approved = true;
                }
            }
        }
    }

    fn is_terminal(&self) -> bool {
        self.approved
    }

    fn view_for(&self, _agent: &AgentProfile) -> Option<serde_json::Value> {
        Some(self.state())
    }

    fn state(&self) -> serde_json::Value {
        json!({
            "document": self.document,
            "revision": self.revision,
            "feedback": self.feedback,
            "approved": self.approved,
        })
    }
}

/// Writer hears tester and reviewer, tester reads the writer, reviewer hears both.
pub fn default_visibility(author: &str, tester: &str, reviewer: &str) -> RoleScoped {
    RoleScoped::default()
        .allow(author, [tester, reviewer])
        .allow(tester, [author])
        .allow(reviewer, [author, tester])
}

pub(crate) fn build(mut spec: EnvironmentSpec) -> Result<Box<dyn Environment>, VerseError> {
    let roster = spec.profiles();
    let options = spec.config.options();

    let author_role = options.str("author_role")?.unwrap_or(AUTHOR_ROLE).to_string();
    let tester_role = options.str("tester_role")?.unwrap_or(TESTER_ROLE).to_string();
    let reviewer_role = options
        .str("reviewer_role")?
        .unwrap_or(REVIEWER_ROLE)
        .to_string();
    let approve_phrase = options
        .str("approve_phrase")?
        .unwrap_or(DEFAULT_APPROVE_PHRASE)
        .to_string();
    let sees = options.table("sees")?.cloned();

    let rules = TeamBoard::new(&roster, &author_role, &reviewer_role, approve_phrase)?;

    let selection = match spec.selection.take() {
        Some(policy) => policy,
        None => build_pipeline(PolicySpec::new(roster, spec.config.options.clone()))?,
    };
    let visibility: Box<dyn crate::policy::VisibilityPolicy> = match sees {
        Some(table) => Box::new(RoleScoped::from_options(Some(&table))?),
        None => Box::new(default_visibility(&author_role, &tester_role, &reviewer_role)),
    };

    let env = PolicyEnvironment::from_spec(KIND, spec, selection, visibility, Box::new(rules))?;
    Ok(Box::new(env))
}
