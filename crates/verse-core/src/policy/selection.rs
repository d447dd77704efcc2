//! Turn Selection Policies

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use verse_events::{AgentProfile, TurnRecord};

use super::{Invocation, PolicySpec, Selection, SelectionPolicy};
use crate::error::VerseError;

fn ensure_roster(roster: &[AgentProfile]) -> Result<usize, VerseError> {
    if roster.is_empty() {
        return Err(VerseError::invalid("cannot select from an empty roster"));
    }
    Ok(roster.len())
}

/// Strict round-robin in construction order, one agent per step.
#[derive(Debug, Clone, Default)]
pub struct RoundRobin;

impl SelectionPolicy for RoundRobin {
    fn select(
        &mut self,
        turn_index: u64,
        roster: &[AgentProfile],
        _history: &[TurnRecord],
    ) -> Result<Selection, VerseError> {
        let n = ensure_roster(roster)?;
        Ok(Selection::single((turn_index % n as u64) as usize))
    }
}

/// Every agent acts every step, invoked concurrently.
#[derive(Debug, Clone, Default)]
pub struct AllAgents;

impl SelectionPolicy for AllAgents {
    fn select(
        &mut self,
        _turn_index: u64,
        roster: &[AgentProfile],
        _history: &[TurnRecord],
    ) -> Result<Selection, VerseError> {
        let n = ensure_roster(roster)?;
        Ok(Selection::new((0..n).collect(), Invocation::Concurrent))
    }
}

/// One uniformly random agent per step from a seeded generator.
///
/// Reset reseeds, so replays from the same seed pick the same speakers.
#[derive(Debug, Clone)]
pub struct RandomOrder {
    seed: u64,
    rng: SmallRng,
}

impl RandomOrder {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl SelectionPolicy for RandomOrder {
    fn select(
        &mut self,
        _turn_index: u64,
        roster: &[AgentProfile],
        _history: &[TurnRecord],
    ) -> Result<Selection, VerseError> {
        let n = ensure_roster(roster)?;
        Ok(Selection::single(self.rng.gen_range(0..n)))
    }

    fn reset(&mut self) {
        self.rng = SmallRng::seed_from_u64(self.seed);
    }
}

/// A designated controller picks the next speaker.
///
/// The controller acts, then the first agent (in construction order) whose
/// name appears in the controller's message acts. When nobody is named, the
/// other agents take turns in rotation.
#[derive(Debug, Clone)]
pub struct Controller {
    controller: usize,
}

impl Controller {
    pub fn new(controller: usize) -> Self {
        Self { controller }
    }

    fn named_in(&self, content: &str, roster: &[AgentProfile]) -> Option<usize> {
        roster
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != self.controller)
            .find(|(_, p)| content.contains(p.name.as_str()))
            .map(|(i, _)| i)
    }

    /// Next non-controller agent after the last one that spoke.
    fn rotate(&self, roster: &[AgentProfile], history: &[TurnRecord]) -> usize {
        let n = roster.len();
        let last_speaker = history
            .iter()
            .rev()
            .flat_map(|record| record.actors.iter().rev())
            .filter_map(|name| roster.iter().position(|p| &p.name == name))
            .find(|i| *i != self.controller);

        let start = last_speaker.map(|i| i + 1).unwrap_or(0);
        (0..n)
            .map(|offset| (start + offset) % n)
            .find(|i| *i != self.controller)
            .unwrap_or(self.controller)
    }
}

impl SelectionPolicy for Controller {
    fn select(
        &mut self,
        _turn_index: u64,
        roster: &[AgentProfile],
        history: &[TurnRecord],
    ) -> Result<Selection, VerseError> {
        ensure_roster(roster)?;
        let Some(controller) = roster.get(self.controller) else {
            return Err(VerseError::invalid(format!(
                "controller #{} is outside a roster of {}",
                self.controller,
                roster.len()
            )));
        };
        let controller_name = &controller.name;

        let directive = history.last().and_then(|record| {
            if record.actors.len() == 1 && &record.actors[0] == controller_name {
                record.actions.first()
            } else {
                None
            }
        });

        let next = match directive {
            Some(message) => self
                .named_in(&message.content, roster)
                .unwrap_or_else(|| self.rotate(roster, history)),
            None => self.controller,
        };
        Ok(Selection::single(next))
    }
}

/// Walks an ordered list of roles; every agent holding the current role acts.
#[derive(Debug, Clone)]
pub struct Pipeline {
    stages: Vec<Vec<usize>>,
}

impl Pipeline {
    /// Builds stages from `roles`. Roles without agents are dropped.
    pub fn new(roles: &[String], roster: &[AgentProfile]) -> Result<Self, VerseError> {
        let stages: Vec<Vec<usize>> = roles
            .iter()
            .map(|role| {
                roster
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| &p.role == role)
                    .map(|(i, _)| i)
                    .collect::<Vec<_>>()
            })
            .filter(|stage| !stage.is_empty())
            .collect();

        if stages.is_empty() {
            return Err(VerseError::invalid(format!(
                "pipeline roles {roles:?} match no agent"
            )));
        }
        Ok(Self { stages })
    }

    /// Distinct roles in order of first appearance.
    pub fn roles_of(roster: &[AgentProfile]) -> Vec<String> {
        let mut roles: Vec<String> = Vec::new();
        for profile in roster {
            if !roles.contains(&profile.role) {
                roles.push(profile.role.clone());
            }
        }
        roles
    }
}

impl SelectionPolicy for Pipeline {
    fn select(
        &mut self,
        turn_index: u64,
        _roster: &[AgentProfile],
        _history: &[TurnRecord],
    ) -> Result<Selection, VerseError> {
        let stage = &self.stages[(turn_index % self.stages.len() as u64) as usize];
        Ok(Selection::new(stage.clone(), Invocation::Sequential))
    }
}

pub(crate) fn build_round_robin(_spec: PolicySpec) -> Result<Box<dyn SelectionPolicy>, VerseError> {
    Ok(Box::new(RoundRobin))
}

pub(crate) fn build_all_agents(_spec: PolicySpec) -> Result<Box<dyn SelectionPolicy>, VerseError> {
    Ok(Box::new(AllAgents))
}

pub(crate) fn build_random(spec: PolicySpec) -> Result<Box<dyn SelectionPolicy>, VerseError> {
    let seed = spec.options().u64("seed")?.unwrap_or(0);
    Ok(Box::new(RandomOrder::new(seed)))
}

pub(crate) fn build_controller(spec: PolicySpec) -> Result<Box<dyn SelectionPolicy>, VerseError> {
    let index = match spec.options().str("controller")? {
        Some(name) => spec
            .roster
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| VerseError::invalid(format!("controller '{name}' is not an agent")))?,
        None => 0,
    };
    Ok(Box::new(Controller::new(index)))
}

pub(crate) fn build_pipeline(spec: PolicySpec) -> Result<Box<dyn SelectionPolicy>, VerseError> {
    let roles = match spec.options().str_list("pipeline")? {
        Some(roles) => roles,
        None => Pipeline::roles_of(&spec.roster),
    };
    Ok(Box::new(Pipeline::new(&roles, &spec.roster)?))
}
