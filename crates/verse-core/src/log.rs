//! Step Log
//!
//! The orchestrator reports episode progress through a [`StepLog`] instead of
//! printing. [`TracingLog`] renders every step through `tracing`;
//! [`MemoryLog`] keeps the rendered lines for inspection.

use std::sync::{Arc, Mutex};
use verse_events::StepResult;

use crate::error::VerseError;

/// Receives episode progress from the orchestrator.
pub trait StepLog: Send {
    /// Called once after reset, before the first step.
    fn on_start(&mut self, task: &str, episode_id: &str, agents: &[String]);

    fn on_step(&mut self, result: &StepResult);

    /// Called with the error that ends the run, before it is propagated.
    fn on_error(&mut self, error: &VerseError);

    fn on_finish(&mut self, turns: u64);
}

/// Renders progress as human-readable `tracing` events.
#[derive(Debug, Clone, Default)]
pub struct TracingLog {
    task: String,
}

impl TracingLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StepLog for TracingLog {
    fn on_start(&mut self, task: &str, episode_id: &str, agents: &[String]) {
        self.task = task.to_string();
        tracing::info!(task, episode = episode_id, agents = %agents.join(", "), "episode started");
    }

    fn on_step(&mut self, result: &StepResult) {
        tracing::info!(task = %self.task, turn = result.turn_index, "{}", result.render());
    }

    fn on_error(&mut self, error: &VerseError) {
        tracing::error!(task = %self.task, error = %error, "episode aborted");
    }

    fn on_finish(&mut self, turns: u64) {
        tracing::info!(task = %self.task, turns, "episode finished");
    }
}

/// Captures rendered lines in memory.
///
/// Clones share the same buffer, so a test can keep one handle and give the
/// other to the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct MemoryLog {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every line logged so far.
    pub fn lines(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(lines) => lines.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.lines().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, line: String) {
        match self.lines.lock() {
            Ok(mut lines) => lines.push(line),
            Err(poisoned) => poisoned.into_inner().push(line),
        }
    }
}

impl StepLog for MemoryLog {
    fn on_start(&mut self, task: &str, episode_id: &str, agents: &[String]) {
        self.push(format!("start {task} {episode_id} [{}]", agents.join(", ")));
    }

    fn on_step(&mut self, result: &StepResult) {
        self.push(result.render());
    }

    fn on_error(&mut self, error: &VerseError) {
        self.push(format!("error: {error}"));
    }

    fn on_finish(&mut self, turns: u64) {
        self.push(format!("finished after {turns} turns"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EnvironmentError;
    use verse_events::Message;

    fn result(done: bool) -> StepResult {
        StepResult {
            turn_index: 0,
            actors: vec!["A".into()],
            actions: vec![Message::new("A", "ack")],
            done,
        }
    }

    #[test]
    fn test_memory_log_shares_buffer() {
        let log = MemoryLog::new();
        let mut handle = log.clone();

        handle.on_start("demo", "ep-1", &["A".to_string(), "B".to_string()]);
        handle.on_step(&result(false));
        handle.on_finish(1);

        let lines = log.lines();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "start demo ep-1 [A, B]");
        assert!(lines[1].contains("A: ack"));
        assert_eq!(lines[2], "finished after 1 turns");
    }

    #[test]
    fn test_memory_log_records_errors() {
        let mut log = MemoryLog::new();
        log.on_error(&EnvironmentError::EpisodeFinished { turn_index: 3 }.into());
        assert_eq!(log.lines(), vec!["error: episode already finished at turn 3"]);
    }

    #[test]
    fn test_tracing_log_does_not_panic_without_subscriber() {
        let mut log = TracingLog::new();
        log.on_start("demo", "ep-1", &[]);
        log.on_step(&result(true));
        log.on_error(&VerseError::invalid("bad"));
        log.on_finish(1);
    }
}
