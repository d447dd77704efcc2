//! End-to-end episode scenarios driven through the orchestrator.

use async_trait::async_trait;
use std::time::Duration;

use verse_core::config::{AgentSpec, EnvironmentConfig, FailurePolicy, TaskConfig};
use verse_core::environment::Conversation;
use verse_core::policy::{AllAgents, FullTranscript};
use verse_core::{
    Agent, AgentActionError, AgentError, AgentProfile, ConfigError, Environment, EnvironmentError,
    MemoryLog, Observation, Orchestrator, PolicyEnvironment, Registries, Reply, ScriptedAgent,
    VerseError,
};

/// Fails on one turn, says "ack" otherwise.
struct FlakyAgent {
    profile: AgentProfile,
    fail_on: u64,
}

#[async_trait]
impl Agent for FlakyAgent {
    fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    async fn act(&mut self, observation: &Observation) -> Result<Reply, AgentError> {
        if observation.turn_index == self.fail_on {
            return Err(AgentError::Backend("model unavailable".into()));
        }
        Ok(Reply::from("ack"))
    }
}

fn build_flaky(spec: AgentSpec) -> Result<Box<dyn Agent>, VerseError> {
    Ok(Box::new(FlakyAgent {
        profile: AgentProfile::new(spec.name, spec.role),
        fail_on: 2,
    }))
}

/// Sleeps before replying with its own name.
struct SlowAgent {
    profile: AgentProfile,
    delay: Duration,
}

#[async_trait]
impl Agent for SlowAgent {
    fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    async fn act(&mut self, _observation: &Observation) -> Result<Reply, AgentError> {
        tokio::time::sleep(self.delay).await;
        Ok(Reply::from(self.profile.name.clone()))
    }
}

fn slow(name: &str, millis: u64) -> Box<dyn Agent> {
    Box::new(SlowAgent {
        profile: AgentProfile::new(name, "worker"),
        delay: Duration::from_millis(millis),
    })
}

fn task(kind: &str, max_turns: Option<u64>, agents: Vec<AgentSpec>) -> TaskConfig {
    let mut environment = EnvironmentConfig::new(kind);
    environment.max_turns = max_turns;
    TaskConfig {
        name: "scenario".into(),
        environment,
        agents,
    }
}

#[tokio::test]
async fn test_round_robin_ack() {
    let registries = Registries::with_builtins().unwrap();
    let config = task(
        "basic",
        Some(4),
        vec![
            AgentSpec::scripted("A", "peer", ["ack"]),
            AgentSpec::scripted("B", "peer", ["ack"]),
        ],
    );
    let mut orchestrator = Orchestrator::from_config(config, &registries).unwrap();
    let summary = orchestrator.run().await.unwrap();
    assert_eq!(summary.turns, 4);
    assert!(summary.done);

    let entries: Vec<(u64, String, String)> = orchestrator
        .environment()
        .history()
        .iter()
        .flat_map(|r| {
            r.entries()
                .map(|(name, m)| (r.turn_index, name.to_string(), m.content.clone()))
                .collect::<Vec<_>>()
        })
        .collect();
    let expected: Vec<(u64, String, String)> = [(0, "A"), (1, "B"), (2, "A"), (3, "B")]
        .into_iter()
        .map(|(t, n)| (t, n.to_string(), "ack".to_string()))
        .collect();
    assert_eq!(entries, expected);
}

#[tokio::test]
async fn test_agent_failure_aborts_run() {
    let mut registries = Registries::with_builtins().unwrap();
    registries.agents.register("flaky", build_flaky).unwrap();

    let mut flaky = AgentSpec::scripted("A", "peer", Vec::<String>::new());
    flaky.kind = "flaky".into();
    let config = task(
        "basic",
        Some(5),
        vec![flaky, AgentSpec::scripted("B", "peer", ["ack"])],
    );

    let log = MemoryLog::new();
    let mut orchestrator = Orchestrator::from_config(config, &registries)
        .unwrap()
        .with_log(log.clone());
    let err = orchestrator.run().await.unwrap_err();

    match err {
        VerseError::AgentAction(AgentActionError::Failed {
            ref agent,
            turn_index,
            ..
        }) => {
            assert_eq!(agent, "A");
            assert_eq!(turn_index, 2);
        }
        other => panic!("unexpected error: {other}"),
    }

    let env = orchestrator.environment();
    assert_eq!(env.history().len(), 2);
    assert_eq!(env.turn_index(), 2);
    assert!(!env.is_done());
    assert!(log.lines().last().unwrap().starts_with("error:"));
}

#[tokio::test]
async fn test_skip_policy_records_no_op() {
    let mut registries = Registries::with_builtins().unwrap();
    registries.agents.register("flaky", build_flaky).unwrap();

    let mut flaky = AgentSpec::scripted("A", "peer", Vec::<String>::new());
    flaky.kind = "flaky".into();
    let mut config = task(
        "basic",
        Some(5),
        vec![flaky, AgentSpec::scripted("B", "peer", ["ack"])],
    );
    config.environment.on_agent_failure = FailurePolicy::Skip;

    let mut orchestrator = Orchestrator::from_config(config, &registries).unwrap();
    let summary = orchestrator.run().await.unwrap();
    assert_eq!(summary.turns, 5);

    let history = orchestrator.environment().history();
    assert!(history[2].actions[0].is_no_op());
    assert_eq!(history[2].actions[0].sender, "A");
    assert!(!history[4].actions[0].is_no_op());
}

#[test]
fn test_zero_agents_rejected_before_any_step() {
    let registries = Registries::with_builtins().unwrap();
    let err = Orchestrator::from_config(task("basic", Some(3), vec![]), &registries)
        .err()
        .unwrap();
    assert!(matches!(
        err,
        VerseError::InvalidConfiguration(ConfigError::Invalid(_))
    ));
}

#[tokio::test]
async fn test_concurrent_results_in_construction_order() {
    let mut env = PolicyEnvironment::new(
        "basic",
        vec![slow("A", 60), slow("B", 0), slow("C", 30)],
        Box::new(AllAgents),
        Box::new(FullTranscript),
        Box::new(Conversation::new(None)),
    )
    .unwrap();

    let result = env.step().await.unwrap();
    assert_eq!(result.actors, vec!["A", "B", "C"]);
    let contents: Vec<&str> = result.actions.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["A", "B", "C"]);
}

#[tokio::test]
async fn test_timeout_surfaces_as_timed_out() {
    let mut env = PolicyEnvironment::new(
        "basic",
        vec![slow("Sleepy", 500)],
        Box::new(AllAgents),
        Box::new(FullTranscript),
        Box::new(Conversation::new(None)),
    )
    .unwrap()
    .with_agent_timeout(Some(Duration::from_millis(20)));

    let err = env.step().await.unwrap_err();
    assert!(matches!(
        err,
        VerseError::AgentAction(AgentActionError::TimedOut { turn_index: 0, .. })
    ));
    assert!(env.history().is_empty());
    assert_eq!(env.turn_index(), 0);
}

#[tokio::test]
async fn test_done_exactly_at_max_turns() {
    for k in [1u64, 3, 7] {
        let agents: Vec<Box<dyn Agent>> = vec![Box::new(ScriptedAgent::new(
            AgentProfile::new("Solo", "peer"),
            ["..."],
        ))];
        let mut env = PolicyEnvironment::new(
            "basic",
            agents,
            Box::new(AllAgents),
            Box::new(FullTranscript),
            Box::new(Conversation::new(None)),
        )
        .unwrap()
        .with_max_turns(Some(k));

        for n in 1..=k {
            let result = env.step().await.unwrap();
            assert_eq!(result.done, n == k);
        }
        assert_eq!(env.turn_index(), k);

        let err = env.step().await.unwrap_err();
        assert!(matches!(
            err,
            VerseError::Environment(EnvironmentError::EpisodeFinished { .. })
        ));
        assert_eq!(env.history().len() as u64, k);
    }
}

#[tokio::test]
async fn test_builtin_tasks_run_to_completion() {
    let registries = Registries::with_builtins().unwrap();
    let loader = verse_core::TaskLoader::new("does-not-exist");

    let classroom = loader.load("nlp_classroom_3players").unwrap();
    let mut orchestrator = Orchestrator::from_config(classroom, &registries).unwrap();
    let summary = orchestrator.run().await.unwrap();
    assert_eq!(summary.turns, 5);
    let speakers: Vec<&str> = orchestrator
        .environment()
        .history()
        .iter()
        .map(|r| r.actors[0].as_str())
        .collect();
    assert_eq!(speakers, vec!["Professor", "Alice", "Professor", "Bob", "Professor"]);

    let town = loader.load("pokemon_town").unwrap();
    let mut orchestrator = Orchestrator::from_config(town, &registries).unwrap();
    let summary = orchestrator.run().await.unwrap();
    assert_eq!(summary.turns, 2);
    assert_eq!(
        orchestrator.environment().state()["positions"]["Red"],
        "Oak's Lab"
    );

    let team = loader.load("sde_team_3players").unwrap();
    let mut orchestrator = Orchestrator::from_config(team, &registries).unwrap();
    let summary = orchestrator.run().await.unwrap();
    assert_eq!(summary.turns, 6);
    let state = orchestrator.environment().state();
    assert_eq!(state["approved"], true);
    assert_eq!(state["revision"], 2);
}

#[tokio::test]
async fn test_max_turns_override_cuts_episode() {
    let registries = Registries::with_builtins().unwrap();
    let mut team = verse_core::TaskLoader::new("does-not-exist")
        .load("sde_team_3players")
        .unwrap();
    team.environment.max_turns = Some(2);

    let mut orchestrator = Orchestrator::from_config(team, &registries).unwrap();
    let summary = orchestrator.run().await.unwrap();
    assert_eq!(summary.turns, 2);
    assert_eq!(orchestrator.environment().state()["approved"], false);
}
