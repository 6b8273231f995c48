//! Scripted agents for tests and local development.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::client::{AgentClient, AgentClientFactory, AgentError};
use super::state::{AgentState, StateScope};

/// What a scripted agent does when asked for its state.
#[derive(Debug, Clone)]
pub enum AgentScript {
    /// Reply with this state (given as the raw JSON an agent would send).
    Respond(serde_json::Value),
    /// Never reply in time.
    Timeout,
    /// Fail with a transport error.
    Fail(String),
}

/// A recorded `get_state` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub agent_id: String,
    pub timeout: Duration,
    pub scope: StateScope,
}

/// Factory whose agents follow a fixed script per agent id.
///
/// Agents without a script time out.
#[derive(Debug, Default, Clone)]
pub struct ScriptedAgents {
    scripts: Arc<Mutex<HashMap<String, AgentScript>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl ScriptedAgents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, agent_id: &str, script: AgentScript) {
        if let Ok(mut scripts) = self.scripts.lock() {
            scripts.insert(agent_id.to_string(), script);
        }
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl AgentClientFactory for ScriptedAgents {
    fn client(&self, agent_id: &str, timeout: Duration) -> Box<dyn AgentClient> {
        let script = self
            .scripts
            .lock()
            .ok()
            .and_then(|s| s.get(agent_id).cloned())
            .unwrap_or(AgentScript::Timeout);

        Box::new(ScriptedAgent {
            agent_id: agent_id.to_string(),
            timeout,
            script,
            calls: Arc::clone(&self.calls),
        })
    }
}

struct ScriptedAgent {
    agent_id: String,
    timeout: Duration,
    script: AgentScript,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

#[async_trait]
impl AgentClient for ScriptedAgent {
    async fn get_state(&self, scope: StateScope) -> Result<AgentState, AgentError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                agent_id: self.agent_id.clone(),
                timeout: self.timeout,
                scope,
            });
        }

        match &self.script {
            AgentScript::Respond(value) => {
                serde_json::from_value(value.clone()).map_err(|e| AgentError::InvalidResponse {
                    agent_id: self.agent_id.clone(),
                    message: e.to_string(),
                })
            }
            AgentScript::Timeout => Err(AgentError::Timeout {
                agent_id: self.agent_id.clone(),
                timeout: self.timeout,
            }),
            AgentScript::Fail(message) => Err(AgentError::Transport {
                agent_id: self.agent_id.clone(),
                message: message.clone(),
            }),
        }
    }
}
