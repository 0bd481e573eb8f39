//! Cloud provider abstraction.
//!
//! The provisioner only needs three operations from a provider: create a
//! server, look one up by name, and wait for an asynchronous action. All
//! provider integrations implement [`CloudProvider`].

use crate::error::Result;
use async_trait::async_trait;
use std::net::Ipv4Addr;

pub mod hcloud;

pub use hcloud::HcloudClient;

/// Cloud provider trait.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Create a server.
    ///
    /// Returns [`HkubeError::ServerConflict`](crate::HkubeError::ServerConflict)
    /// when a server with the same name already exists.
    async fn create_server(&self, request: &ServerCreateRequest) -> Result<ServerCreated>;

    /// Fetch an existing server by name.
    async fn get_server_by_name(&self, name: &str) -> Result<Server>;

    /// Block until the action has finished successfully.
    async fn await_action(&self, action: &ActionRef) -> Result<()>;

    /// Get provider name (for logging).
    fn name(&self) -> &str;
}

/// Parameters for creating one server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCreateRequest {
    pub name: String,
    pub server_type: String,
    pub image: String,
    pub ssh_key: String,
}

/// A server as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Server {
    pub id: u64,
    pub name: String,
    pub public_ipv4: Option<Ipv4Addr>,
}

/// Handle to an asynchronous provider action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionRef {
    pub id: u64,
}

/// Result of a successful create call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCreated {
    pub server: Server,
    /// Action that boots the server; the address is usable once it completes
    pub action: ActionRef,
}
