//! One synchronization pass: list every VM the director knows about and
//! rewrite the bus authorization file with one user per agent.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::auth::{read_ok_body, AuthProvider, DirectorInfo};
use crate::auth_config::NatsAuthConfig;
use crate::config::DirectorConfig;
use crate::error::SyncError;

#[derive(Debug, Deserialize)]
struct DeploymentSummary {
    name: String,
}

#[derive(Debug, Deserialize)]
struct VmSummary {
    agent_id: Option<String>,
}

pub struct UsersSync {
    http: reqwest::Client,
    director: DirectorConfig,
    config_path: PathBuf,
}

impl UsersSync {
    pub fn new(director: DirectorConfig, config_path: impl Into<PathBuf>) -> Self {
        Self {
            http: reqwest::Client::new(),
            director,
            config_path: config_path.into(),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Query the director and write the authorization file.
    ///
    /// Returns the agent ids written, in director order.
    #[instrument(skip(self), fields(path = %self.config_path.display()))]
    pub async fn execute_users_sync(&self) -> Result<Vec<String>, SyncError> {
        info!("Executing NATS users synchronization");

        let info: DirectorInfo = self.get_json("/info", None).await?;
        let header = AuthProvider::new(&info, &self.director)
            .auth_header(&self.http)
            .await?;

        let agent_ids = self.query_all_running_vms(&header).await?;
        self.write_config_file(&agent_ids).await?;

        info!(agent_count = agent_ids.len(), "Finished NATS users synchronization");
        Ok(agent_ids)
    }

    async fn query_all_running_vms(&self, header: &str) -> Result<Vec<String>, SyncError> {
        let deployments: Vec<DeploymentSummary> =
            self.get_json("/deployments", Some(header)).await?;

        let mut agent_ids = Vec::new();
        for deployment in deployments {
            let vms: Vec<VmSummary> = self
                .get_json(&format!("/deployments/{}/vms", deployment.name), Some(header))
                .await?;
            debug!(deployment = %deployment.name, vm_count = vms.len(), "Listed VMs");
            agent_ids.extend(vms.into_iter().filter_map(|vm| vm.agent_id));
        }
        Ok(agent_ids)
    }

    async fn get_json<T>(&self, endpoint: &str, header: Option<&str>) -> Result<T, SyncError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let url = format!("{}{}", self.director.url.trim_end_matches('/'), endpoint);
        let mut request = self.http.get(&url);
        if let Some(header) = header {
            request = request.header(reqwest::header::AUTHORIZATION, header);
        }

        let response = request.send().await.map_err(|source| SyncError::Http {
            endpoint: endpoint.to_string(),
            source,
        })?;
        let body = read_ok_body(endpoint, response).await?;
        serde_json::from_str(&body).map_err(|source| SyncError::InvalidResponse {
            endpoint: endpoint.to_string(),
            source,
        })
    }

    /// Replace the file through a temporary sibling so readers never see a
    /// partial document.
    async fn write_config_file(&self, agent_ids: &[String]) -> Result<(), SyncError> {
        let document = serde_json::to_string(&NatsAuthConfig::new(agent_ids.to_vec()).create_config())?;

        let io_err = |source| SyncError::Io {
            path: self.config_path.clone(),
            source,
        };
        if let Some(parent) = self.config_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
            }
        }
        let tmp = self.config_path.with_extension("json.tmp");
        tokio::fs::write(&tmp, document).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.config_path)
            .await
            .map_err(io_err)?;
        Ok(())
    }
}
