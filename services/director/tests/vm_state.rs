//! Integration tests for agent state polling.
//!
//! Each test seeds an in-memory repository, scripts the agents and checks
//! the reports written to a memory sink.

use std::sync::Arc;
use std::time::Duration;

use fleet_director::agent::{AgentScript, ScriptedAgents, StateScope};
use fleet_director::db::{DeploymentRecord, MemoryRepository, NewInstance, Repository, VmRecord};
use async_trait::async_trait;
use fleet_director::jobs::{
    FileResultSink, MemoryResultSink, PollError, ResultSink, SinkError, VmStatePoller,
    UNRESPONSIVE_AGENT,
};
use rstest::rstest;
use serde_json::{json, Value};

struct Fixture {
    repository: Arc<MemoryRepository>,
    agents: Arc<ScriptedAgents>,
    sink: Arc<MemoryResultSink>,
    deployment: DeploymentRecord,
}

impl Fixture {
    async fn new() -> Self {
        let repository = Arc::new(MemoryRepository::new());
        let deployment = repository.create_deployment("deployment").await;
        Self {
            repository,
            agents: Arc::new(ScriptedAgents::new()),
            sink: Arc::new(MemoryResultSink::new()),
            deployment,
        }
    }

    async fn vm(&self) -> VmRecord {
        self.repository
            .create_vm(self.deployment.id, "fake-agent-id", Some("fake-vm-cid"))
            .await
    }

    fn poller(&self) -> VmStatePoller {
        VmStatePoller::new(self.repository.clone(), self.agents.clone(), self.sink.clone())
    }

    async fn poll(&self) -> Vec<Value> {
        self.poller()
            .poll(&self.deployment, StateScope::Full)
            .await
            .unwrap();
        self.sink.values()
    }
}

/// Rejects documents mentioning `reject`, keeps the rest.
struct RejectingSink {
    reject: &'static str,
    inner: MemoryResultSink,
}

#[async_trait]
impl ResultSink for RejectingSink {
    async fn write(&self, document: &str) -> Result<(), SinkError> {
        if document.contains(self.reject) {
            return Err(SinkError::Io {
                path: "rejected.jsonl".into(),
                source: std::io::Error::other("disk full"),
            });
        }
        self.inner.write(document).await
    }
}

fn running_state() -> Value {
    json!({
        "vm_cid": "fake-vm-cid",
        "agent_id": "fake-agent-id",
        "job_state": "running",
        "networks": { "test": { "ip": "1.1.1.1" } },
        "resource_pool": { "name": "test_resource_pool" }
    })
}

#[tokio::test]
async fn test_parses_agent_info_into_report() {
    let fixture = Fixture::new().await;
    fixture.vm().await;
    fixture
        .agents
        .script("fake-agent-id", AgentScript::Respond(running_state()));

    let reports = fixture.poll().await;

    assert_eq!(reports.len(), 1);
    let status = &reports[0];
    assert_eq!(status["ips"], json!(["1.1.1.1"]));
    assert_eq!(status["dns"], json!([]));
    assert_eq!(status["vm_cid"], "fake-vm-cid");
    assert_eq!(status["agent_id"], "fake-agent-id");
    assert_eq!(status["job_state"], "running");
    assert_eq!(status["resource_pool"], "test_resource_pool");
    assert!(status.get("vitals").is_none());
    assert!(status.get("resurrection_paused").is_none());

    let calls = fixture.agents.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].scope, StateScope::Full);
    assert_eq!(calls[0].timeout, Duration::from_secs(5));
}

#[tokio::test]
async fn test_passes_vitals_through() {
    let fixture = Fixture::new().await;
    fixture.vm().await;
    let mut state = running_state();
    state["vitals"] = json!({
        "load": ["1", "5", "15"],
        "cpu": { "user": "u", "sys": "s", "wait": "w" },
        "mem": { "percent": "p", "kb": "k" },
        "swap": { "percent": "p", "kb": "k" },
        "disk": { "system": { "percent": "p" }, "ephemeral": { "percent": "p" } }
    });
    fixture
        .agents
        .script("fake-agent-id", AgentScript::Respond(state));

    let reports = fixture.poll().await;

    let vitals = &reports[0]["vitals"];
    assert_eq!(vitals["load"], json!(["1", "5", "15"]));
    assert_eq!(vitals["cpu"], json!({ "user": "u", "sys": "s", "wait": "w" }));
    assert_eq!(vitals["mem"], json!({ "percent": "p", "kb": "k" }));
    assert_eq!(vitals["swap"], json!({ "percent": "p", "kb": "k" }));
    assert_eq!(
        vitals["disk"],
        json!({ "system": { "percent": "p" }, "ephemeral": { "percent": "p" } })
    );
}

#[tokio::test]
async fn test_returns_dns_records_for_instance_ips() {
    let fixture = Fixture::new().await;
    fixture.vm().await;
    fixture
        .repository
        .create_dns_record("index.job.network.deployment.microbosh", "1.1.1.1")
        .await;
    fixture
        .repository
        .create_dns_record("other.job.network.deployment.microbosh", "2.2.2.2")
        .await;
    fixture
        .agents
        .script("fake-agent-id", AgentScript::Respond(running_state()));

    let reports = fixture.poll().await;

    assert_eq!(
        reports[0]["dns"],
        json!(["index.job.network.deployment.microbosh"])
    );
}

#[tokio::test]
async fn test_unresponsive_agent() {
    let fixture = Fixture::new().await;
    let vm = fixture.vm().await;
    let mut new = NewInstance::new(fixture.deployment.id, "job", Some(0));
    new.resurrection_paused = true;
    let instance = fixture.repository.create_instance(new).await;
    fixture
        .repository
        .attach_vm(instance.id, vm.id, true)
        .await
        .unwrap();
    fixture.agents.script("fake-agent-id", AgentScript::Timeout);

    let summary = fixture
        .poller()
        .poll(&fixture.deployment, StateScope::Full)
        .await
        .unwrap();
    assert_eq!(summary.unresponsive, 1);

    let reports = fixture.sink.values();
    let status = &reports[0];
    assert_eq!(status["vm_cid"], "fake-vm-cid");
    assert_eq!(status["agent_id"], "fake-agent-id");
    assert_eq!(status["job_state"], UNRESPONSIVE_AGENT);
    assert!(status.get("resurrection_paused").is_none());
}

#[tokio::test]
async fn test_reports_resurrection_paused() {
    let fixture = Fixture::new().await;
    let vm = fixture.vm().await;
    let mut new = NewInstance::new(fixture.deployment.id, "dea", Some(0));
    new.resurrection_paused = true;
    let instance = fixture.repository.create_instance(new).await;
    fixture
        .repository
        .attach_vm(instance.id, vm.id, true)
        .await
        .unwrap();

    let mut state = running_state();
    state["job"] = json!({ "name": "dea" });
    state["index"] = json!(0);
    fixture
        .agents
        .script("fake-agent-id", AgentScript::Respond(state));

    let reports = fixture.poll().await;

    assert_eq!(reports[0]["resurrection_paused"], true);
    assert_eq!(reports[0]["job_name"], "dea");
    assert_eq!(reports[0]["index"], 0);
}

#[tokio::test]
async fn test_empty_index_does_not_fail() {
    let fixture = Fixture::new().await;
    let vm = fixture.vm().await;
    let instance = fixture
        .repository
        .create_instance(NewInstance::new(fixture.deployment.id, "dea", Some(0)))
        .await;
    fixture
        .repository
        .attach_vm(instance.id, vm.id, true)
        .await
        .unwrap();

    let mut state = running_state();
    state["job"] = json!({ "name": "dea" });
    state["index"] = json!("");
    fixture
        .agents
        .script("fake-agent-id", AgentScript::Respond(state));

    let reports = fixture.poll().await;

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0]["job_state"], "running");
    assert!(reports[0].get("index").is_none());
    // Found through the VM reference instead.
    assert_eq!(reports[0]["resurrection_paused"], false);
}

#[rstest]
#[case::fraction(json!(1.5))]
#[case::boolean(json!(true))]
#[case::out_of_range(json!(u64::MAX))]
#[case::object(json!({ "value": 0 }))]
#[tokio::test]
async fn test_non_integer_index_still_reports(#[case] index: Value) {
    let fixture = Fixture::new().await;
    let vm = fixture.vm().await;
    let mut new = NewInstance::new(fixture.deployment.id, "dea", Some(0));
    new.resurrection_paused = true;
    let instance = fixture.repository.create_instance(new).await;
    fixture
        .repository
        .attach_vm(instance.id, vm.id, true)
        .await
        .unwrap();

    let mut state = running_state();
    state["job"] = json!({ "name": "dea" });
    state["index"] = index;
    fixture
        .agents
        .script("fake-agent-id", AgentScript::Respond(state));

    let summary = fixture
        .poller()
        .poll(&fixture.deployment, StateScope::Full)
        .await
        .unwrap();

    assert_eq!(summary.reported, 1);
    assert_eq!(summary.failed, 0);
    let reports = fixture.sink.values();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0]["job_state"], "running");
    assert!(reports[0].get("index").is_none());
    // Resolved through the VM reference.
    assert_eq!(reports[0]["resurrection_paused"], true);
}

#[tokio::test]
async fn test_one_timeout_does_not_block_others() {
    let fixture = Fixture::new().await;
    fixture
        .repository
        .create_vm(fixture.deployment.id, "agent-slow", Some("vm-slow"))
        .await;
    fixture
        .repository
        .create_vm(fixture.deployment.id, "agent-ok", Some("vm-ok"))
        .await;
    fixture
        .repository
        .create_vm(fixture.deployment.id, "agent-broken", Some("vm-broken"))
        .await;
    fixture.agents.script("agent-slow", AgentScript::Timeout);
    fixture
        .agents
        .script("agent-ok", AgentScript::Respond(running_state()));
    fixture.agents.script(
        "agent-broken",
        AgentScript::Fail("connection refused".to_string()),
    );

    let summary = fixture
        .poller()
        .with_concurrency(4)
        .poll(&fixture.deployment, StateScope::Full)
        .await
        .unwrap();

    assert_eq!(summary.reported, 1);
    assert_eq!(summary.unresponsive, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(fixture.sink.values().len(), 2);
}

#[tokio::test]
async fn test_sink_error_does_not_drop_other_reports() {
    let fixture = Fixture::new().await;
    for agent in ["agent-a", "agent-bad", "agent-b", "agent-c"] {
        fixture
            .repository
            .create_vm(fixture.deployment.id, agent, Some(&format!("vm-{agent}")))
            .await;
    }

    let sink = Arc::new(RejectingSink {
        reject: "agent-bad",
        inner: MemoryResultSink::new(),
    });
    let err = VmStatePoller::new(fixture.repository.clone(), fixture.agents.clone(), sink.clone())
        .with_concurrency(2)
        .poll(&fixture.deployment, StateScope::Full)
        .await
        .unwrap_err();

    assert!(matches!(err, PollError::Sink(_)));
    let agents: Vec<Value> = sink
        .inner
        .values()
        .iter()
        .map(|report| report["agent_id"].clone())
        .collect();
    assert_eq!(agents.len(), 3);
    for agent in ["agent-a", "agent-b", "agent-c"] {
        assert!(agents.contains(&json!(agent)), "missing report for {agent}");
    }
}

#[tokio::test]
async fn test_file_sink_gets_one_line_per_vm() {
    let fixture = Fixture::new().await;
    fixture.vm().await;
    fixture
        .repository
        .create_vm(fixture.deployment.id, "agent-2", Some("vm-2"))
        .await;
    fixture
        .agents
        .script("fake-agent-id", AgentScript::Respond(running_state()));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("result.jsonl");
    let sink = Arc::new(FileResultSink::open(&path).await.unwrap());
    VmStatePoller::new(fixture.repository.clone(), fixture.agents.clone(), sink)
        .poll(&fixture.deployment, StateScope::Full)
        .await
        .unwrap();

    let contents = tokio::fs::read_to_string(&path).await.unwrap();
    let lines: Vec<Value> = contents
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert!(lines
        .iter()
        .any(|status| status["job_state"] == UNRESPONSIVE_AGENT));
}

#[tokio::test]
async fn test_poll_all_covers_every_deployment() {
    let fixture = Fixture::new().await;
    fixture.vm().await;
    let other = fixture.repository.create_deployment("other").await;
    fixture
        .repository
        .create_vm(other.id, "agent-other", Some("vm-other"))
        .await;

    let summary = fixture.poller().poll_all(StateScope::Basic).await.unwrap();

    assert_eq!(summary.unresponsive, 2);
    assert!(fixture
        .agents
        .calls()
        .iter()
        .all(|call| call.scope == StateScope::Basic));
    let deployments = fixture.repository.deployments().await.unwrap();
    assert_eq!(deployments.len(), 2);
}
