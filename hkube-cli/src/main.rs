use anyhow::Result;
use clap::{Parser, Subcommand};
use hkube_core::ClusterSpec;

mod commands;
mod progress;

#[derive(Parser)]
#[command(name = "hkube")]
#[command(about = "Provision Kubernetes clusters on Hetzner Cloud", long_about = None)]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage clusters
    #[command(subcommand)]
    Cluster(ClusterCommands),

    /// Manage SSH keys
    #[command(subcommand)]
    SshKey(SshKeyCommands),

    /// Manage provider contexts (API tokens)
    #[command(subcommand)]
    Context(ContextCommands),
}

#[derive(Subcommand)]
enum ClusterCommands {
    /// Create a cluster: one master plus `nodes - 1` workers
    Create {
        /// Cluster name (random when omitted)
        #[arg(long)]
        name: Option<String>,

        /// Name of a registered SSH key
        #[arg(short = 'k', long)]
        ssh_key: Option<String>,

        /// Server type of the master (e.g. "cx21")
        #[arg(long)]
        master_server_type: Option<String>,

        /// Server type of the workers (e.g. "cx11")
        #[arg(long)]
        worker_server_type: Option<String>,

        /// Total number of nodes, master included
        #[arg(short, long, default_value_t = ClusterSpec::DEFAULT_NODES)]
        nodes: usize,

        /// Install a self-hosted control plane
        #[arg(long)]
        self_hosted: bool,
    },

    /// List clusters
    List,
}

#[derive(Subcommand)]
enum SshKeyCommands {
    /// Upload a key pair to the provider and register it
    Add {
        /// Key name
        #[arg(long)]
        name: String,

        /// Path to the private key
        #[arg(long, default_value = "~/.ssh/id_rsa")]
        private_key_path: String,

        /// Path to the public key
        #[arg(long, default_value = "~/.ssh/id_rsa.pub")]
        public_key_path: String,
    },

    /// List registered keys
    List,
}

#[derive(Subcommand)]
enum ContextCommands {
    /// Add a context and make it current
    Add {
        /// Context name
        name: String,

        /// Hetzner Cloud API token
        #[arg(short, long)]
        token: String,
    },

    /// Switch the current context
    Use {
        /// Context name
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    hkube_core::init_observability(cli.verbose).map_err(|e| anyhow::anyhow!(e))?;

    match cli.command {
        Commands::Cluster(cluster_cmd) => match cluster_cmd {
            ClusterCommands::Create { name, ssh_key, master_server_type, worker_server_type, nodes, self_hosted } => {
                let spec = ClusterSpec {
                    name,
                    ssh_key: ssh_key.unwrap_or_default(),
                    master_server_type: master_server_type.unwrap_or_default(),
                    worker_server_type: worker_server_type.unwrap_or_default(),
                    nodes,
                    self_hosted,
                };
                commands::cluster::create(spec).await?;
            }

            ClusterCommands::List => {
                commands::cluster::list()?;
            }
        },

        Commands::SshKey(key_cmd) => match key_cmd {
            SshKeyCommands::Add { name, private_key_path, public_key_path } => {
                commands::ssh_key::add(&name, &private_key_path, &public_key_path).await?;
            }

            SshKeyCommands::List => {
                commands::ssh_key::list()?;
            }
        },

        Commands::Context(context_cmd) => match context_cmd {
            ContextCommands::Add { name, token } => {
                commands::context::add(&name, &token)?;
            }

            ContextCommands::Use { name } => {
                commands::context::use_context(&name)?;
            }
        },
    }

    Ok(())
}
