//! Hetzner Cloud API client.
//!
//! Implements [`CloudProvider`] against the public REST API
//! (`https://api.hetzner.cloud/v1`). Only the endpoints needed to create
//! clusters are covered: servers, actions and SSH keys.

use super::{ActionRef, CloudProvider, Server, ServerCreateRequest, ServerCreated};
use crate::error::{HkubeError, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

/// Default API endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.hetzner.cloud/v1";

/// Error code returned when a resource name is already taken.
const UNIQUENESS_ERROR: &str = "uniqueness_error";

/// Hetzner Cloud client.
#[derive(Clone)]
pub struct HcloudClient {
    client: Client,
    endpoint: String,
    token: String,
    poll_interval: Duration,
    action_timeout: Option<Duration>,
}

impl HcloudClient {
    /// Create a client for the given API token.
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent(concat!("hkube/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HkubeError::InvalidConfig {
                reason: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token: token.into(),
            poll_interval: Duration::from_secs(1),
            action_timeout: None,
        })
    }

    /// Use a different API endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Set how often action status is polled.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Bound the time spent waiting for a single action.
    pub fn with_action_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.action_timeout = timeout;
        self
    }

    /// Upload a public key. An existing key with the same name is accepted.
    #[instrument(skip(self, public_key))]
    pub async fn create_ssh_key(&self, name: &str, public_key: &str) -> Result<()> {
        let body = SshKeyCreateBody { name, public_key };
        let request = self.client.post(self.url("/ssh_keys")).json(&body);
        match self.send::<serde_json::Value>(request).await {
            Ok(_) => Ok(()),
            Err(HkubeError::Cloud { code, .. }) if code == UNIQUENESS_ERROR => {
                debug!("SSH key already uploaded");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.bearer_auth(&self.token).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(api_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| HkubeError::Cloud {
            status: status.as_u16(),
            code: "invalid_response".to_string(),
            message: e.to_string(),
        })
    }

    async fn get_action(&self, id: u64) -> Result<ApiAction> {
        let request = self.client.get(self.url(&format!("/actions/{}", id)));
        let response: ActionResponse = self.send(request).await?;
        Ok(response.action)
    }
}

#[async_trait]
impl CloudProvider for HcloudClient {
    #[instrument(skip(self, request), fields(server = %request.name))]
    async fn create_server(&self, request: &ServerCreateRequest) -> Result<ServerCreated> {
        let body = ServerCreateBody {
            name: &request.name,
            server_type: &request.server_type,
            image: &request.image,
            ssh_keys: vec![request.ssh_key.as_str()],
        };
        let http = self.client.post(self.url("/servers")).json(&body);

        match self.send::<ServerCreateResponse>(http).await {
            Ok(response) => Ok(ServerCreated {
                server: response.server.into(),
                action: ActionRef { id: response.action.id },
            }),
            Err(e) => Err(create_error(e, &request.name)),
        }
    }

    #[instrument(skip(self))]
    async fn get_server_by_name(&self, name: &str) -> Result<Server> {
        let request = self.client.get(self.url("/servers")).query(&[("name", name)]);
        let response: ServerListResponse = self.send(request).await?;

        response
            .servers
            .into_iter()
            .find(|s| s.name == name)
            .map(Server::from)
            .ok_or_else(|| HkubeError::ServerNotFound { name: name.to_string() })
    }

    #[instrument(skip(self), fields(action_id = action.id))]
    async fn await_action(&self, action: &ActionRef) -> Result<()> {
        poll_action(action.id, self.poll_interval, self.action_timeout, || self.get_action(action.id)).await
    }

    fn name(&self) -> &str {
        "hcloud"
    }
}

impl std::fmt::Debug for HcloudClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HcloudClient").field("endpoint", &self.endpoint).finish_non_exhaustive()
    }
}

/// Poll `fetch` until the action leaves the running state.
async fn poll_action<F, Fut>(id: u64, interval: Duration, timeout: Option<Duration>, mut fetch: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<ApiAction>>,
{
    let started = Instant::now();
    loop {
        let current = fetch().await?;
        match current.status.as_str() {
            "success" => return Ok(()),
            "error" => {
                let reason = current
                    .error
                    .map(|e| format!("{}: {}", e.code, e.message))
                    .unwrap_or_else(|| "unknown error".to_string());
                return Err(HkubeError::ActionFailed { action_id: id, reason });
            }
            status => debug!(status, progress = current.progress, "Action still running"),
        }

        if let Some(timeout) = timeout {
            if started.elapsed() >= timeout {
                warn!(?timeout, "Gave up waiting for action");
                return Err(HkubeError::Timeout { operation: format!("action {}", id), timeout });
            }
        }

        tokio::time::sleep(interval).await;
    }
}

/// A taken server name is a conflict, not a failure.
fn create_error(err: HkubeError, name: &str) -> HkubeError {
    match err {
        HkubeError::Cloud { code, .. } if code == UNIQUENESS_ERROR => {
            HkubeError::ServerConflict { name: name.to_string() }
        }
        other => other,
    }
}

/// Map a non-success response to an error, decoding the API error envelope when present.
fn api_error(status: StatusCode, body: &str) -> HkubeError {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(envelope) => HkubeError::Cloud {
            status: status.as_u16(),
            code: envelope.error.code,
            message: envelope.error.message,
        },
        Err(_) => HkubeError::Cloud {
            status: status.as_u16(),
            code: "unknown".to_string(),
            message: body.chars().take(200).collect(),
        },
    }
}

#[derive(Serialize)]
struct ServerCreateBody<'a> {
    name: &'a str,
    server_type: &'a str,
    image: &'a str,
    ssh_keys: Vec<&'a str>,
}

#[derive(Serialize)]
struct SshKeyCreateBody<'a> {
    name: &'a str,
    public_key: &'a str,
}

#[derive(Deserialize)]
struct ServerCreateResponse {
    server: ApiServer,
    action: ApiAction,
}

#[derive(Deserialize)]
struct ServerListResponse {
    servers: Vec<ApiServer>,
}

#[derive(Deserialize)]
struct ActionResponse {
    action: ApiAction,
}

#[derive(Deserialize)]
struct ApiServer {
    id: u64,
    name: String,
    #[serde(default)]
    public_net: Option<ApiPublicNet>,
}

#[derive(Deserialize)]
struct ApiPublicNet {
    ipv4: Option<ApiIpv4>,
}

#[derive(Deserialize)]
struct ApiIpv4 {
    ip: Ipv4Addr,
}

impl From<ApiServer> for Server {
    fn from(api: ApiServer) -> Self {
        Server {
            id: api.id,
            name: api.name,
            public_ipv4: api.public_net.and_then(|n| n.ipv4).map(|v4| v4.ip),
        }
    }
}

#[derive(Deserialize)]
struct ApiAction {
    id: u64,
    #[serde(default)]
    status: String,
    #[serde(default)]
    progress: u32,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    code: String,
    message: String,
}
