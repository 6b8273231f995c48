//! Agent client interface.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use super::state::{AgentState, StateScope};

/// Default time to wait for an agent's `get_state` reply.
pub const DEFAULT_AGENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors talking to an agent.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The agent did not answer within the caller's timeout.
    #[error("agent {agent_id} did not respond within {timeout:?}")]
    Timeout { agent_id: String, timeout: Duration },

    /// The request could not be delivered.
    #[error("transport error talking to agent {agent_id}: {message}")]
    Transport { agent_id: String, message: String },

    /// The agent answered with an exception.
    #[error("agent {agent_id} returned an error: {message}")]
    Remote { agent_id: String, message: String },

    /// The reply could not be understood.
    #[error("invalid response from agent {agent_id}: {message}")]
    InvalidResponse { agent_id: String, message: String },
}

impl AgentError {
    /// Returns true if this error is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Request/response client bound to one agent.
#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Ask the agent for its current state.
    async fn get_state(&self, scope: StateScope) -> Result<AgentState, AgentError>;
}

/// Builds clients for individual agents.
pub trait AgentClientFactory: Send + Sync {
    /// A client for `agent_id` that gives up after `timeout`.
    fn client(&self, agent_id: &str, timeout: Duration) -> Box<dyn AgentClient>;
}
