//! Fixed bootstrap command lists.

use crate::config::PipelineConfig;
use crate::types::{NodeRole, RemoteCommand};

pub const LABEL_PACKAGES_INSTALLED: &str = "packages installed";
pub const LABEL_WAITING_FOR_MASTER: &str = "waiting for master";
pub const LABEL_REGISTERING_NODE: &str = "registering node";
pub const LABEL_JOIN_CLUSTER: &str = "join cluster";
pub const LABEL_COMPLETE: &str = "complete!";

/// Prints the `kubeadm join ...` command workers must run.
pub const JOIN_TOKEN_COMMAND: &str = "kubeadm token create --print-join-command";

const FLANNEL_MANIFEST: &str =
    "https://raw.githubusercontent.com/coreos/flannel/v0.9.1/Documentation/kube-flannel.yml";

const CCM_MANIFEST: &str =
    "https://raw.githubusercontent.com/hetznercloud/hcloud-cloud-controller-manager/master/deploy/v1.0.0.yaml";

const FLANNEL_TOLERATION_PATCH: &str = concat!(
    r#"kubectl -n kube-system patch ds kube-flannel-ds --type json -p "#,
    r#"'[{"op":"add","path":"/spec/template/spec/tolerations/-","value":"#,
    r#"{"key":"node.cloudprovider.kubernetes.io/uninitialized","value":"true","effect":"NoSchedule"}}]'"#
);

/// Renders the command lists for one cluster.
#[derive(Debug, Clone)]
pub struct BootstrapPlan {
    package_script_url: String,
    pod_network_cidr: String,
    provider_token: String,
}

impl BootstrapPlan {
    pub fn new(config: &PipelineConfig, provider_token: impl Into<String>) -> Self {
        Self {
            package_script_url: config.package_script_url.clone(),
            pod_network_cidr: config.pod_network_cidr.clone(),
            provider_token: provider_token.into(),
        }
    }

    /// Installs docker and kubeadm. The label is the node's next state.
    pub fn package_command(&self, role: NodeRole) -> RemoteCommand {
        let label = match role {
            NodeRole::Master => LABEL_PACKAGES_INSTALLED,
            NodeRole::Worker => LABEL_WAITING_FOR_MASTER,
        };
        RemoteCommand::new(label, format!("wget -cO- {} | bash -", self.package_script_url))
    }

    /// Control-plane setup, in execution order.
    ///
    /// A single-node cluster also untaints the master so it can run workloads.
    pub fn master_commands(&self, single_node: bool) -> Vec<RemoteCommand> {
        let mut commands = vec![
            RemoteCommand::new("disable swap", "swapoff -a"),
            RemoteCommand::new(
                "kubeadm init",
                format!("kubeadm reset && kubeadm init --pod-network-cidr={}", self.pod_network_cidr),
            ),
            RemoteCommand::new(
                "configure kubectl",
                "mkdir -p $HOME/.kube && cp -i /etc/kubernetes/admin.conf $HOME/.kube/config && chown $(id -u):$(id -g) $HOME/.kube/config",
            ),
            RemoteCommand::new("install flannel", format!("kubectl apply -f {}", FLANNEL_MANIFEST)),
            RemoteCommand::new("configure flannel", FLANNEL_TOLERATION_PATCH),
            RemoteCommand::new(
                "install hcloud integration",
                format!(
                    "kubectl -n kube-system create secret generic hcloud --from-literal=token={}",
                    self.provider_token
                ),
            ),
            RemoteCommand::new("deploy cloud controller manager", format!("kubectl apply -f {}", CCM_MANIFEST)),
        ];

        if single_node {
            commands.push(RemoteCommand::new(
                "taint master",
                "kubectl taint nodes --all node-role.kubernetes.io/master-",
            ));
        }

        commands
    }

    /// Joins a worker using the text printed by [`JOIN_TOKEN_COMMAND`], unmodified.
    pub fn worker_join_command(&self, join_command: &str) -> RemoteCommand {
        RemoteCommand::new(LABEL_JOIN_CLUSTER, format!("swapoff -a && {}", join_command))
    }

    /// Number of progress events a node emits over a full run.
    pub fn expected_steps(&self, role: NodeRole, total_nodes: usize) -> usize {
        match role {
            // package event, master commands, completion
            NodeRole::Master => 1 + self.master_commands(total_nodes == 1).len() + 1,
            // package event, registering, join, completion
            NodeRole::Worker => 4,
        }
    }
}
