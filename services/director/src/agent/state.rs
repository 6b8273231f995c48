//! Payload returned by an agent's `get_state` call.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

/// How much state the agent should report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateScope {
    /// Everything, including vitals.
    Full,
    /// Identity and job state only.
    Basic,
}

impl StateScope {
    /// Arguments for the `get_state` call.
    pub fn arguments(&self) -> Vec<&'static str> {
        match self {
            Self::Full => vec!["full"],
            Self::Basic => Vec::new(),
        }
    }
}

impl fmt::Display for StateScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::Basic => write!(f, "basic"),
        }
    }
}

/// A job index as reported by an agent.
///
/// Agents have been seen to report integers, numeric strings and empty
/// strings here. Anything else is kept as `Other` and never parses.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum AgentIndex {
    Number(i64),
    Text(String),
    Other(serde_json::Value),
}

impl AgentIndex {
    /// The index as an integer, if it is one.
    pub fn parsed(&self) -> Option<u32> {
        match self {
            Self::Number(n) => u32::try_from(*n).ok(),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Other(_) => None,
        }
    }
}

/// One network entry of the agent state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AgentNetwork {
    #[serde(default)]
    pub ip: Option<String>,
}

/// Name-only reference used by `job` and `resource_pool`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NamedRef {
    #[serde(default)]
    pub name: Option<String>,
}

/// Resource usage reported by the agent, passed through as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vitals {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mem: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swap: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk: Option<serde_json::Value>,
    /// Keys beyond the well-known sections.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// State reported by an agent.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AgentState {
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub vm_cid: Option<String>,
    #[serde(default)]
    pub job_state: Option<String>,
    /// Networks in the order the agent listed them.
    #[serde(default, deserialize_with = "ordered_networks")]
    pub networks: Vec<(String, AgentNetwork)>,
    #[serde(default)]
    pub resource_pool: Option<NamedRef>,
    #[serde(default)]
    pub index: Option<AgentIndex>,
    #[serde(default)]
    pub job: Option<NamedRef>,
    #[serde(default)]
    pub vitals: Option<Vitals>,
}

impl AgentState {
    /// Every reported IP, flattened in network order.
    pub fn ips(&self) -> Vec<String> {
        self.networks
            .iter()
            .filter_map(|(_, network)| network.ip.clone())
            .collect()
    }

    pub fn job_name(&self) -> Option<&str> {
        self.job.as_ref().and_then(|j| j.name.as_deref())
    }

    pub fn resource_pool_name(&self) -> Option<&str> {
        self.resource_pool.as_ref().and_then(|r| r.name.as_deref())
    }
}

fn ordered_networks<'de, D>(deserializer: D) -> Result<Vec<(String, AgentNetwork)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct NetworksVisitor;

    impl<'de> Visitor<'de> for NetworksVisitor {
        type Value = Vec<(String, AgentNetwork)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of network name to network settings")
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut networks = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((name, network)) = map.next_entry::<String, AgentNetwork>()? {
                networks.push((name, network));
            }
            Ok(networks)
        }
    }

    deserializer.deserialize_any(NetworksVisitor)
}
