//! The message bus authorization document.
//!
//! Users are identified by certificate subject. The director and the health
//! monitor get fixed users; every agent gets one user scoped to its own
//! subjects.

use serde::{Deserialize, Serialize};

const SUBJECT_BASE: &str = "C=USA, O=Cloud Foundry, CN=";
const SUBJECT_SUFFIX: &str = ".bosh-internal";

/// Certificate subject for a bus identity such as `default.director`.
pub fn certificate_subject(who: &str) -> String {
    format!("{SUBJECT_BASE}{who}{SUBJECT_SUFFIX}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub publish: Vec<String>,
    pub subscribe: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user: String,
    pub permissions: Permissions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    pub users: Vec<User>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NatsAuthDocument {
    pub authorization: Authorization,
}

fn subjects(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Builds the authorization document for a set of agents.
#[derive(Debug, Clone)]
pub struct NatsAuthConfig {
    agent_ids: Vec<String>,
}

impl NatsAuthConfig {
    pub fn new(agent_ids: Vec<String>) -> Self {
        Self { agent_ids }
    }

    pub fn director_user() -> User {
        User {
            user: certificate_subject("default.director"),
            permissions: Permissions {
                publish: subjects(&["agent.*", "hm.director.alert"]),
                subscribe: subjects(&["director.>"]),
            },
        }
    }

    pub fn hm_user() -> User {
        User {
            user: certificate_subject("default.hm"),
            permissions: Permissions {
                publish: Vec::new(),
                subscribe: subjects(&[
                    "hm.agent.heartbeat.*",
                    "hm.agent.alert.*",
                    "hm.agent.shutdown.*",
                    "hm.director.alert",
                ]),
            },
        }
    }

    pub fn agent_user(agent_id: &str) -> User {
        User {
            user: certificate_subject(&format!("{agent_id}.agent")),
            permissions: Permissions {
                publish: vec![
                    format!("hm.agent.heartbeat.{agent_id}"),
                    format!("hm.agent.alert.{agent_id}"),
                    format!("hm.agent.shutdown.{agent_id}"),
                    format!("director.*.{agent_id}.*"),
                ],
                subscribe: vec![format!("agent.{agent_id}")],
            },
        }
    }

    /// Director, health monitor, then one user per agent in input order.
    pub fn create_config(&self) -> NatsAuthDocument {
        let mut users = vec![Self::director_user(), Self::hm_user()];
        users.extend(self.agent_ids.iter().map(|id| Self::agent_user(id)));
        NatsAuthDocument {
            authorization: Authorization { users },
        }
    }
}
