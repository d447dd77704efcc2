//! Town-map game environment.
//!
//! Agents stand at named locations. Whatever an agent says is heard only by
//! the agents sharing its location at that moment, and a reply starting with
//! the move prefix (`"MOVE lab"`) relocates the speaker. The episode can end
//! when everyone has gathered at a goal location.
//!
//! Options:
//!
//! ```toml
//! [environment.options]
//! locations = ["town", "lab", "gym"]   # required, first one is the default start
//! goal = "lab"                         # optional
//! move_prefix = "MOVE "                # optional
//! [environment.options.start]
//! Ash = "town"
//! ```

use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use verse_events::{AgentProfile, Message, Receivers};

use super::{Environment, EnvironmentSpec, PolicyEnvironment, Rules};
use crate::error::VerseError;
use crate::policy::{Addressed, AllAgents};

pub const KIND: &str = "game";

/// Default prefix of a movement action
pub const DEFAULT_MOVE_PREFIX: &str = "MOVE ";

/// Payload of the game environment: where everybody stands.
#[derive(Debug, Clone)]
pub struct TownMap {
    locations: Vec<String>,
    start: BTreeMap<String, String>,
    positions: BTreeMap<String, String>,
    goal: Option<String>,
    move_prefix: String,
    moves: u64,
}

impl TownMap {
    /// Creates the map. Agents missing from `start` begin at the first location.
    pub fn new(
        locations: Vec<String>,
        roster: &[AgentProfile],
        start: BTreeMap<String, String>,
        goal: Option<String>,
    ) -> Result<Self, VerseError> {
        let Some(default_location) = locations.first().cloned() else {
            return Err(VerseError::invalid("game needs at least one location"));
        };

        for (agent, location) in &start {
            if !roster.iter().any(|p| &p.name == agent) {
                return Err(VerseError::invalid(format!(
                    "start position given for unknown agent '{agent}'"
                )));
            }
            if !locations.contains(location) {
                return Err(VerseError::invalid(format!(
                    "unknown start location '{location}' for '{agent}'"
                )));
            }
        }
        if let Some(goal) = &goal {
            if !locations.contains(goal) {
                return Err(VerseError::invalid(format!("unknown goal location '{goal}'")));
            }
        }

        let start: BTreeMap<String, String> = roster
            .iter()
            .map(|p| {
                let location = start
                    .get(&p.name)
                    .cloned()
                    .unwrap_or_else(|| default_location.clone());
                (p.name.clone(), location)
            })
            .collect();

        Ok(Self {
            positions: start.clone(),
            locations,
            start,
            goal,
            move_prefix: DEFAULT_MOVE_PREFIX.to_string(),
            moves: 0,
        })
    }

    pub fn with_move_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.move_prefix = prefix.into();
        self
    }

    pub fn location_of(&self, agent: &str) -> Option<&str> {
        self.positions.get(agent).map(String::as_str)
    }

    /// Agents currently standing at `location`, in name order.
    pub fn present_at(&self, location: &str) -> BTreeSet<String> {
        self.positions
            .iter()
            .filter(|(_, at)| at.as_str() == location)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Destination named by a movement action, if it is a known location.
    fn destination<'a>(&self, content: &'a str) -> Option<&'a str> {
        let target = content.trim_start().strip_prefix(self.move_prefix.as_str())?.trim();
        self.locations
            .iter()
            .any(|l| l == target)
            .then_some(target)
    }
}

impl Rules for TownMap {
    fn reset(&mut self) {
        self.positions = self.start.clone();
        self.moves = 0;
    }

    fn route(&self, message: &mut Message) {
        let Some(location) = self.location_of(&message.sender) else {
            return;
        };
        let nearby = self.present_at(location);
        message.receivers = match &message.receivers {
            Receivers::All => Receivers::Only(nearby),
            Receivers::Only(chosen) => {
                Receivers::Only(chosen.intersection(&nearby).cloned().collect())
            }
        };
    }

    fn apply(&mut self, _turn_index: u64, actions: &[Message]) {
        for action in actions.iter().filter(|m| !m.is_no_op()) {
            let Some(target) = self.destination(&action.content).map(str::to_string) else {
                continue;
            };
            if let Some(position) = self.positions.get_mut(&action.sender) {
                if *position != target {
                    *position = target;
                    self.moves += 1;
                }
            }
        }
    }

    fn is_terminal(&self) -> bool {
        match &self.goal {
            Some(goal) => self.positions.values().all(|at| at == goal),
            None => false,
        }
    }

    fn view_for(&self, agent: &AgentProfile) -> Option<serde_json::Value> {
        let location = self.location_of(&agent.name)?;
        let mut present = self.present_at(location);
        present.remove(&agent.name);
        Some(json!({
            "location": location,
            "present": present,
            "locations": self.locations,
        }))
    }

    fn state(&self) -> serde_json::Value {
        json!({
            "positions": self.positions,
            "goal": self.goal,
            "moves": self.moves,
        })
    }
}

pub(crate) fn build(spec: EnvironmentSpec) -> Result<Box<dyn Environment>, VerseError> {
    let roster = spec.profiles();
    let options = spec.config.options();

    let locations = options
        .str_list("locations")?
        .ok_or_else(|| VerseError::invalid("game option 'locations' is required"))?;
    let mut start = BTreeMap::new();
    if let Some(table) = options.table("start")? {
        for (agent, value) in table {
            let location = value.as_str().ok_or_else(|| {
                VerseError::invalid(format!("start.{agent} must be a location name"))
            })?;
            start.insert(agent.clone(), location.to_string());
        }
    }
    let goal = options.str("goal")?.map(str::to_string);
    let prefix = options
        .str("move_prefix")?
        .unwrap_or(DEFAULT_MOVE_PREFIX)
        .to_string();

    let rules = TownMap::new(locations, &roster, start, goal)?.with_move_prefix(prefix);
    let env = PolicyEnvironment::from_spec(
        KIND,
        spec,
        Box::new(AllAgents),
        Box::new(Addressed),
        Box::new(rules),
    )?;
    Ok(Box::new(env))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> Vec<AgentProfile> {
        vec![
            AgentProfile::new("Ash", "player"),
            AgentProfile::new("Misty", "npc"),
            AgentProfile::new("Oak", "npc"),
        ]
    }

    fn map(goal: Option<&str>) -> TownMap {
        let mut start = BTreeMap::new();
        start.insert("Oak".to_string(), "lab".to_string());
        TownMap::new(
            vec!["town".into(), "lab".into()],
            &roster(),
            start,
            goal.map(str::to_string),
        )
        .unwrap()
    }

    #[test]
    fn test_default_start_is_first_location() {
        let map = map(None);
        assert_eq!(map.location_of("Ash"), Some("town"));
        assert_eq!(map.location_of("Misty"), Some("town"));
        assert_eq!(map.location_of("Oak"), Some("lab"));
    }

    #[test]
    fn test_invalid_setup_rejected() {
        assert!(TownMap::new(vec![], &roster(), BTreeMap::new(), None).is_err());
        assert!(TownMap::new(vec!["town".into()], &roster(), BTreeMap::new(), Some("moon".into()))
            .is_err());

        let mut start = BTreeMap::new();
        start.insert("Gary".to_string(), "town".to_string());
        assert!(TownMap::new(vec!["town".into()], &roster(), start, None).is_err());
    }

    #[test]
    fn test_route_limits_audience_to_location() {
        let map = map(None);
        let mut msg = Message::new("Ash", "hello?");
        map.route(&mut msg);
        assert_eq!(msg.receivers, Receivers::only(["Ash", "Misty"]));

        let mut whisper = Message::new("Ash", "psst").with_receivers(Receivers::only(["Oak"]));
        map.route(&mut whisper);
        assert_eq!(whisper.receivers, Receivers::only(Vec::<String>::new()));
    }

    #[test]
    fn test_move_and_goal() {
        let mut map = map(Some("lab"));
        assert!(!map.is_terminal());

        map.apply(
            0,
            &[
                Message::new("Ash", "MOVE lab"),
                Message::new("Misty", "MOVE moon"),
                Message::new("Oak", "welcome"),
            ],
        );
        assert_eq!(map.location_of("Ash"), Some("lab"));
        assert_eq!(map.location_of("Misty"), Some("town"));
        assert!(!map.is_terminal());

        map.apply(1, &[Message::new("Misty", "  MOVE lab ")]);
        assert!(map.is_terminal());
        assert_eq!(map.state()["moves"], 2);

        map.reset();
        assert_eq!(map.location_of("Ash"), Some("town"));
        assert!(!map.is_terminal());
    }

    #[test]
    fn test_view_for_lists_company() {
        let map = map(None);
        let view = map.view_for(&AgentProfile::new("Ash", "player")).unwrap();
        assert_eq!(view["location"], "town");
        assert_eq!(view["present"], json!(["Misty"]));
        assert_eq!(view["locations"], json!(["town", "lab"]));
    }
}
