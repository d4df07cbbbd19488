//! Request/response calls to a device's agent for configuration
//! retrieval and sync.

use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::connection::Target;
use crate::error::{RdError, Result};
use crate::model::{Button, DEFAULT_GRID, Profile};

/// Id of the profile synthesized from a legacy `{"buttons": [...]}` body.
pub const LEGACY_PROFILE_ID: &str = "default";
/// Name of the profile synthesized from a legacy body.
pub const LEGACY_PROFILE_NAME: &str = "Home";

/// Remote configuration endpoint of an agent.
pub trait AgentClient: Send + Sync + 'static {
    /// Fetch the profile list the agent currently holds.
    fn fetch_config(&self, target: &Target) -> BoxFuture<'static, Result<Vec<Profile>>>;

    /// Replace the agent's profile list.
    fn push_config(&self, target: &Target, profiles: Vec<Profile>) -> BoxFuture<'static, Result<()>>;
}

/// Body returned by the agent's configuration endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub profiles: Option<Vec<Profile>>,
    #[serde(default)]
    pub buttons: Option<Vec<Button>>,
}

impl AgentConfig {
    /// Normalize to a profile list. A legacy flat button list becomes one
    /// default profile. Returns `None` when the body carries neither.
    #[must_use]
    pub fn into_profiles(self) -> Option<Vec<Profile>> {
        match (self.profiles, self.buttons) {
            (Some(profiles), _) => Some(profiles),
            (None, Some(buttons)) => Some(vec![
                Profile::new(LEGACY_PROFILE_ID, LEGACY_PROFILE_NAME, buttons)
                    .with_grid(DEFAULT_GRID, DEFAULT_GRID),
            ]),
            (None, None) => None,
        }
    }
}

#[derive(Serialize)]
struct PushBody<'a> {
    profiles: &'a [Profile],
}

/// HTTP client for `http://host:port/<config_path>`.
#[derive(Debug, Clone)]
pub struct HttpAgentClient {
    http: reqwest::Client,
    path: String,
    fetch_timeout: Duration,
    push_timeout: Duration,
}

impl HttpAgentClient {
    pub fn new(path: impl Into<String>, fetch_timeout: Duration, push_timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            path: path.into(),
            fetch_timeout,
            push_timeout,
        }
    }
}

impl Default for HttpAgentClient {
    fn default() -> Self {
        Self::new("/config", Duration::from_secs(3), Duration::from_secs(5))
    }
}

impl AgentClient for HttpAgentClient {
    #[instrument(skip(self), fields(target = %target))]
    fn fetch_config(&self, target: &Target) -> BoxFuture<'static, Result<Vec<Profile>>> {
        let url = target.http_url(&self.path);
        let request = self.http.get(&url).timeout(self.fetch_timeout);
        async move {
            debug!(%url, "Fetching agent config");
            let response = request
                .send()
                .await
                .map_err(|e| RdError::Agent(format!("GET {url} failed: {e}")))?;
            let status = response.status();
            if !status.is_success() {
                return Err(RdError::Agent(format!("GET {url} returned {status}")));
            }
            let config: AgentConfig = response
                .json()
                .await
                .map_err(|e| RdError::Agent(format!("Invalid config body from {url}: {e}")))?;
            config
                .into_profiles()
                .ok_or_else(|| RdError::Agent(format!("{url} returned neither profiles nor buttons")))
        }
        .boxed()
    }

    #[instrument(skip(self, profiles), fields(target = %target, profiles = profiles.len()))]
    fn push_config(&self, target: &Target, profiles: Vec<Profile>) -> BoxFuture<'static, Result<()>> {
        let url = target.http_url(&self.path);
        let request = self
            .http
            .post(&url)
            .timeout(self.push_timeout)
            .json(&PushBody { profiles: &profiles });
        async move {
            debug!(%url, "Pushing agent config");
            let response = request
                .send()
                .await
                .map_err(|e| RdError::Agent(format!("POST {url} failed: {e}")))?;
            let status = response.status();
            if !status.is_success() {
                return Err(RdError::Agent(format!("POST {url} returned {status}")));
            }
            Ok(())
        }
        .boxed()
    }
}
