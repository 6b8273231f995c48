//! Clients for the per-VM management agents.
//!
//! - `client`: the request/response contract and its error taxonomy
//! - `state`: the `get_state` payload
//! - `http`: HTTP transport
//! - `scripted`: canned agents for tests

mod client;
pub mod http;
pub mod scripted;
pub mod state;

pub use client::{AgentClient, AgentClientFactory, AgentError, DEFAULT_AGENT_TIMEOUT};
pub use http::HttpAgentClientFactory;
pub use scripted::{AgentScript, RecordedCall, ScriptedAgents};
pub use state::{AgentIndex, AgentState, StateScope, Vitals};
