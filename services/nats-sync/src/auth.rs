//! Director authentication.
//!
//! The director advertises its scheme on the unauthenticated `/info`
//! endpoint. Basic auth sends the configured user; UAA exchanges the client
//! credentials for a token on every sync.

use base64::Engine;
use serde::Deserialize;
use tracing::debug;

use crate::config::DirectorConfig;
use crate::error::SyncError;

#[derive(Debug, Clone, Deserialize)]
pub struct DirectorInfo {
    pub user_authentication: UserAuthentication,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserAuthentication {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub options: AuthOptions,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthOptions {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// Produces the `Authorization` header for director requests.
pub struct AuthProvider<'a> {
    info: &'a DirectorInfo,
    director: &'a DirectorConfig,
}

impl<'a> AuthProvider<'a> {
    pub fn new(info: &'a DirectorInfo, director: &'a DirectorConfig) -> Self {
        Self { info, director }
    }

    pub async fn auth_header(&self, http: &reqwest::Client) -> Result<String, SyncError> {
        match self.info.user_authentication.kind.as_str() {
            "basic" => {
                let user = self
                    .director
                    .user
                    .as_deref()
                    .ok_or(SyncError::MissingCredentials("basic"))?;
                let password = self.director.password.as_deref().unwrap_or_default();
                Ok(basic_header(user, password))
            }
            "uaa" => self.uaa_token(http).await,
            other => Err(SyncError::UnsupportedAuth(other.to_string())),
        }
    }

    async fn uaa_token(&self, http: &reqwest::Client) -> Result<String, SyncError> {
        let (client_id, client_secret) = match (
            self.director.client_id.as_deref(),
            self.director.client_secret.as_deref(),
        ) {
            (Some(id), Some(secret)) => (id, secret),
            _ => return Err(SyncError::MissingCredentials("uaa")),
        };
        let base = self
            .info
            .user_authentication
            .options
            .url
            .as_deref()
            .ok_or(SyncError::MissingCredentials("uaa"))?;
        let endpoint = format!("{}/oauth/token", base.trim_end_matches('/'));
        debug!(endpoint = %endpoint, "Requesting UAA token");

        let response = http
            .post(&endpoint)
            .basic_auth(client_id, Some(client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|source| SyncError::Http {
                endpoint: endpoint.clone(),
                source,
            })?;
        let body = read_ok_body(&endpoint, response).await?;
        let token: TokenResponse =
            serde_json::from_str(&body).map_err(|source| SyncError::InvalidResponse {
                endpoint: endpoint.clone(),
                source,
            })?;
        Ok(format!("{} {}", token.token_type, token.access_token))
    }
}

/// The body of a 200 response, or a [`SyncError::Status`].
pub(crate) async fn read_ok_body(
    endpoint: &str,
    response: reqwest::Response,
) -> Result<String, SyncError> {
    let status = response.status();
    let body = response.text().await.map_err(|source| SyncError::Http {
        endpoint: endpoint.to_string(),
        source,
    })?;
    if status != reqwest::StatusCode::OK {
        return Err(SyncError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

fn basic_header(user: &str, password: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(format!("{user}:{password}"));
    format!("Basic {encoded}")
}
