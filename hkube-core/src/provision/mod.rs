//! Node allocation.
//!
//! The provisioner turns a [`NodeTemplate`] and a count into servers named
//! `<cluster>-<role>-<NN>`. Allocation is idempotent: a server whose name is
//! already taken is fetched instead of created, so a crashed run can simply
//! be repeated.

use crate::cloud::{CloudProvider, ServerCreateRequest};
use crate::config::DEFAULT_IMAGE;
use crate::error::{HkubeError, Result};
use crate::observability::metrics;
use crate::types::{Node, NodeTemplate};
use std::sync::Arc;
use tracing::{info, instrument};

/// Nodes produced by one allocation batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Allocation {
    /// Allocated nodes in index order
    pub nodes: Vec<Node>,
    /// At least one node was freshly created (rather than fetched)
    pub created_any: bool,
}

/// Allocates nodes through a cloud provider.
#[derive(Clone)]
pub struct Provisioner {
    cloud: Arc<dyn CloudProvider>,
    image: String,
}

impl Provisioner {
    pub fn new(cloud: Arc<dyn CloudProvider>) -> Self {
        Self { cloud, image: DEFAULT_IMAGE.to_string() }
    }

    /// Use `image` as the base image for new servers.
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    /// Allocate `count` nodes for `template`.
    ///
    /// Stops at the first failure other than a name conflict. The returned
    /// [`HkubeError::AllocationFailed`] carries the nodes allocated before the
    /// failure so the caller can persist them.
    #[instrument(skip(self, template), fields(role = %template.role, provider = self.cloud.name()))]
    pub async fn allocate_nodes(&self, cluster: &str, template: &NodeTemplate, count: usize) -> Result<Allocation> {
        let mut allocation = Allocation::default();

        for index in 1..=count {
            let name = Node::server_name(cluster, template.role, index);
            match self.allocate_one(&name, template).await {
                Ok((node, created)) => {
                    allocation.created_any |= created;
                    allocation.nodes.push(node);
                }
                Err(e) => {
                    return Err(HkubeError::AllocationFailed {
                        node: name,
                        allocated: allocation.nodes,
                        source: Box::new(e),
                    })
                }
            }
        }

        Ok(allocation)
    }

    /// Create or fetch one server. The flag is true when it was created.
    async fn allocate_one(&self, name: &str, template: &NodeTemplate) -> Result<(Node, bool)> {
        let request = ServerCreateRequest {
            name: name.to_string(),
            server_type: template.server_type.clone(),
            image: self.image.clone(),
            ssh_key: template.ssh_key_name.clone(),
        };

        info!(server = name, "Creating server");
        let (server, created) = match self.cloud.create_server(&request).await {
            Ok(result) => {
                self.cloud.await_action(&result.action).await?;
                let server = if result.server.public_ipv4.is_some() {
                    result.server
                } else {
                    self.cloud.get_server_by_name(name).await?
                };
                (server, true)
            }
            Err(e) if e.is_conflict() => {
                info!(server = name, "Server exists, loading it");
                (self.cloud.get_server_by_name(name).await?, false)
            }
            Err(e) => return Err(e),
        };

        let ip = server.public_ipv4.ok_or_else(|| HkubeError::MissingAddress { name: name.to_string() })?;
        metrics::record_node_allocated(template.role, !created);
        info!(server = name, %ip, created, "Node ready");

        Ok((
            Node {
                name: name.to_string(),
                role: template.role,
                server_type: template.server_type.clone(),
                ip_address: Some(ip),
                ssh_key_name: template.ssh_key_name.clone(),
            },
            created,
        ))
    }
}
