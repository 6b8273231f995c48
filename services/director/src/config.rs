use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::db::DbConfig;
use crate::deployment_plan::FeatureDefaults;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub dev_mode: bool,
    pub database: DbConfig,
    pub agent: AgentConfig,
    pub dns: DnsConfig,
    pub features: FeatureDefaults,
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Base URL of the agent gateway.
    pub url: String,
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub poll_concurrency: usize,
    /// JSON-lines file receiving VM status reports.
    pub result_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct DnsConfig {
    pub domain: String,
    pub include_index_records: bool,
    pub records_path: PathBuf,
    pub publish_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let string = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let flag = |key: &str| {
            lookup(key)
                .map(|v| v == "1" || v.to_lowercase() == "true")
                .unwrap_or(false)
        };

        let agent = AgentConfig {
            url: string("FLEET_AGENT_URL", "http://127.0.0.1:6868"),
            timeout: Duration::from_secs(parse(&lookup, "FLEET_AGENT_TIMEOUT_SECS", 5)?),
            poll_interval: interval(&lookup, "FLEET_POLL_INTERVAL_SECS", 60)?,
            poll_concurrency: parse(&lookup, "FLEET_POLL_CONCURRENCY", 8)?,
            result_path: string("FLEET_RESULT_PATH", "vm_state.jsonl").into(),
        };

        let dns = DnsConfig {
            domain: string("FLEET_DNS_DOMAIN", "bosh"),
            include_index_records: flag("FLEET_DNS_INCLUDE_INDEX"),
            records_path: string("FLEET_DNS_RECORDS_PATH", "records.json").into(),
            publish_interval: interval(&lookup, "FLEET_DNS_PUBLISH_INTERVAL_SECS", 30)?,
        };

        let defaults = DbConfig::default();
        let database = DbConfig {
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            max_connections: parse(&lookup, "DB_MAX_CONNECTIONS", defaults.max_connections)?,
            migrations_dir: lookup("FLEET_MIGRATIONS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.migrations_dir),
        };

        let features = FeatureDefaults {
            use_dns_addresses: flag("FLEET_DNS_USE_DNS_ADDRESSES"),
            use_short_dns_addresses: flag("FLEET_DNS_USE_SHORT_DNS_ADDRESSES"),
            randomize_az_placement: flag("FLEET_RANDOMIZE_AZ_PLACEMENT"),
        };

        Ok(Self {
            log_level: string("FLEET_LOG_LEVEL", "info"),
            dev_mode: flag("FLEET_DEV"),
            database,
            agent,
            dns,
            features,
        })
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {key}: {raw:?}")),
        None => Ok(default),
    }
}

/// A period in whole seconds; zero is rejected.
fn interval(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> Result<Duration> {
    match parse(lookup, key, default)? {
        0 => bail!("{key} must be greater than zero"),
        secs => Ok(Duration::from_secs(secs)),
    }
}
