//! HTTP transport to agents.
//!
//! Each agent is reachable at `{base_url}/agents/{agent_id}`. Requests are
//! `{"method": ..., "arguments": [...]}` and replies carry either a `value`
//! or an `exception`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::client::{AgentClient, AgentClientFactory, AgentError};
use super::state::{AgentState, StateScope};

/// Builds [`HttpAgentClient`]s sharing one connection pool.
#[derive(Clone)]
pub struct HttpAgentClientFactory {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAgentClientFactory {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl AgentClientFactory for HttpAgentClientFactory {
    fn client(&self, agent_id: &str, timeout: Duration) -> Box<dyn AgentClient> {
        Box::new(HttpAgentClient {
            client: self.client.clone(),
            url: format!("{}/agents/{}", self.base_url, agent_id),
            agent_id: agent_id.to_string(),
            timeout,
        })
    }
}

/// Client for a single agent over HTTP.
pub struct HttpAgentClient {
    client: reqwest::Client,
    url: String,
    agent_id: String,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct AgentRequest<'a> {
    method: &'a str,
    arguments: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct AgentReply {
    #[serde(default)]
    value: Option<AgentState>,
    #[serde(default)]
    exception: Option<AgentException>,
}

#[derive(Debug, Deserialize)]
struct AgentException {
    message: String,
}

impl HttpAgentClient {
    fn timeout_error(&self) -> AgentError {
        AgentError::Timeout {
            agent_id: self.agent_id.clone(),
            timeout: self.timeout,
        }
    }

    fn map_error(&self, err: reqwest::Error) -> AgentError {
        if err.is_timeout() {
            self.timeout_error()
        } else if err.is_decode() {
            AgentError::InvalidResponse {
                agent_id: self.agent_id.clone(),
                message: err.to_string(),
            }
        } else {
            AgentError::Transport {
                agent_id: self.agent_id.clone(),
                message: err.to_string(),
            }
        }
    }

    async fn send(&self, request: &AgentRequest<'_>) -> Result<AgentReply, reqwest::Error> {
        self.client
            .post(&self.url)
            .json(request)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?
            .json::<AgentReply>()
            .await
    }
}

#[async_trait]
impl AgentClient for HttpAgentClient {
    async fn get_state(&self, scope: StateScope) -> Result<AgentState, AgentError> {
        let request = AgentRequest {
            method: "get_state",
            arguments: scope.arguments(),
        };
        debug!(agent_id = %self.agent_id, scope = %scope, "Requesting agent state");

        let reply = match tokio::time::timeout(self.timeout, self.send(&request)).await {
            Err(_) => return Err(self.timeout_error()),
            Ok(result) => result.map_err(|e| self.map_error(e))?,
        };

        if let Some(exception) = reply.exception {
            return Err(AgentError::Remote {
                agent_id: self.agent_id.clone(),
                message: exception.message,
            });
        }

        reply.value.ok_or_else(|| AgentError::InvalidResponse {
            agent_id: self.agent_id.clone(),
            message: "reply carried neither value nor exception".to_string(),
        })
    }
}
