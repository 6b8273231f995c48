use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Director endpoint and credentials.
///
/// Basic auth uses `user`/`password`; UAA uses the client credentials.
#[derive(Debug, Clone, Default)]
pub struct DirectorConfig {
    pub url: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub log_level: String,
    pub director: DirectorConfig,
    pub poll_interval: Duration,
    /// Authorization file read by the message bus.
    pub config_path: PathBuf,
}

impl SyncConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let interval = match lookup("FLEET_NATS_SYNC_INTERVAL_SECS") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("Invalid value for FLEET_NATS_SYNC_INTERVAL_SECS: {raw:?}"))?,
            None => 10,
        };
        if interval == 0 {
            bail!("FLEET_NATS_SYNC_INTERVAL_SECS must be greater than zero");
        }

        Ok(Self {
            log_level: lookup("FLEET_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            director: DirectorConfig {
                url: lookup("FLEET_DIRECTOR_URL")
                    .unwrap_or_else(|| "http://127.0.0.1:25555".to_string()),
                user: lookup("FLEET_DIRECTOR_USER"),
                password: lookup("FLEET_DIRECTOR_PASSWORD"),
                client_id: lookup("FLEET_DIRECTOR_CLIENT_ID"),
                client_secret: lookup("FLEET_DIRECTOR_CLIENT_SECRET"),
            },
            poll_interval: Duration::from_secs(interval),
            config_path: lookup("FLEET_NATS_CONFIG_PATH")
                .unwrap_or_else(|| "nats_auth.json".to_string())
                .into(),
        })
    }
}
