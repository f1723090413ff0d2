//! Rollout CLI tool.

use clap::{Parser, Subcommand};

mod client;
mod commands;

use client::ApiClient;

#[derive(Parser)]
#[command(name = "rollout")]
#[command(about = "Rollout deployment orchestrator CLI", long_about = None)]
struct Cli {
    /// API server URL
    #[arg(long, env = "ROLLOUT_API_URL", default_value = "http://localhost:3000")]
    api_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a module deployment
    Deploy {
        /// Module name
        module: String,
        /// Module version
        version: String,
        /// Target environment (Development, QA, Staging, Production)
        environment: String,
        /// Deployment strategy (direct, rolling, blue-green, canary)
        #[arg(long, default_value = "rolling")]
        strategy: String,
        /// Require operator approval before the pipeline proceeds
        #[arg(long)]
        require_approval: bool,
        /// Requester's email, recorded on the deployment job
        #[arg(long)]
        requester_email: String,
        /// Free-text description
        #[arg(long)]
        description: Option<String>,
        /// Metadata entry in key=value form, may be repeated
        #[arg(long = "meta", value_parser = parse_key_value)]
        metadata: Vec<(String, String)>,
    },
    /// Show the status of a deployment
    Status {
        /// Execution id
        execution_id: String,
    },
    /// List recent deployments
    List {
        /// Maximum number of deployments to show
        #[arg(long, default_value = "50")]
        limit: i64,
    },
    /// Roll back a succeeded or failed deployment
    Rollback {
        /// Execution id
        execution_id: String,
    },
    /// Approve a deployment awaiting approval
    Approve {
        /// Execution id
        execution_id: String,
        /// Approver's email
        #[arg(long)]
        approver_email: String,
        /// Reason recorded alongside the decision
        #[arg(long)]
        reason: Option<String>,
    },
    /// Reject a deployment awaiting approval
    Reject {
        /// Execution id
        execution_id: String,
        /// Approver's email
        #[arg(long)]
        approver_email: String,
        /// Reason recorded alongside the decision
        #[arg(long)]
        reason: Option<String>,
    },
    /// List registered environment clusters
    Clusters,
    /// Show node-level detail for one environment cluster
    Cluster {
        /// Environment name
        environment: String,
    },
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let client = ApiClient::new(&cli.api_url);

    match cli.command {
        Commands::Deploy {
            module,
            version,
            environment,
            strategy,
            require_approval,
            requester_email,
            description,
            metadata,
        } => {
            commands::deployments::deploy(
                &client,
                &module,
                &version,
                &environment,
                &strategy,
                require_approval,
                &requester_email,
                description,
                metadata,
            )
            .await?;
        }
        Commands::Status { execution_id } => {
            commands::deployments::status(&client, &execution_id).await?;
        }
        Commands::List { limit } => {
            commands::deployments::list(&client, limit).await?;
        }
        Commands::Rollback { execution_id } => {
            commands::deployments::rollback(&client, &execution_id).await?;
        }
        Commands::Approve {
            execution_id,
            approver_email,
            reason,
        } => {
            commands::approvals::approve(&client, &execution_id, &approver_email, reason).await?;
        }
        Commands::Reject {
            execution_id,
            approver_email,
            reason,
        } => {
            commands::approvals::reject(&client, &execution_id, &approver_email, reason).await?;
        }
        Commands::Clusters => {
            commands::clusters::list(&client).await?;
        }
        Commands::Cluster { environment } => {
            commands::clusters::show(&client, &environment).await?;
        }
    }

    Ok(())
}
