//! AutoDeploy - natural-language deployment CLI
//!
//! One entry command per provider family:
//!
//! - `aws`: provision onto an EC2 instance in the default VPC
//! - `gcp`: provision onto a Compute Engine instance
//! - `azure`: provision a full resource-group chain and Linux VM
//!
//! Each command takes a plain-language description of what to deploy and
//! a repository URL, prompting for whichever was not supplied as a flag.
//! Exit code 0 means the deployment was verified reachable.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{warn, Level};

use autodeploy_core::{
    discover_ssh_public_key, ChatIntentClassifier, ClassifiedIntent, DeploymentEngine,
    DeploymentRequest, DeploymentStatus, EngineConfig, GitRepositoryInspector, HttpVerifier,
    IntentClassifier, Provider, TerraformDriver,
};

#[derive(Parser)]
#[command(name = "autodeploy")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Deploy a repository to the cloud from a plain-language request", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct RunArgs {
    /// What to deploy, in plain language (prompted for if omitted)
    #[arg(short, long)]
    description: Option<String>,

    /// Repository URL to deploy (prompted for if omitted)
    #[arg(short, long)]
    repo: Option<String>,

    /// API key for the intent classification service
    #[arg(long, env = "AUTODEPLOY_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// SSH public key file (defaults to ~/.ssh/id_ed25519.pub or id_rsa.pub)
    #[arg(long)]
    ssh_public_key_file: Option<PathBuf>,

    /// Directory under which generated artifacts are written
    #[arg(long, default_value = ".")]
    work_dir: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy onto an AWS EC2 instance
    Aws {
        #[command(flatten)]
        run: RunArgs,

        #[arg(long, env = "AWS_ACCESS_KEY_ID")]
        access_key_id: Option<String>,

        #[arg(long, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
        secret_access_key: Option<String>,

        #[arg(long, default_value = "us-east-1")]
        region: String,
    },

    /// Deploy onto a GCP Compute Engine instance
    Gcp {
        #[command(flatten)]
        run: RunArgs,

        #[arg(long, env = "GOOGLE_CLOUD_PROJECT")]
        project: Option<String>,

        #[arg(long, env = "GCP_BILLING_ACCOUNT_ID")]
        billing_account_id: Option<String>,

        #[arg(long, default_value = "us-central1-a")]
        zone: String,
    },

    /// Deploy onto an Azure Linux virtual machine
    Azure {
        #[command(flatten)]
        run: RunArgs,

        #[arg(long, env = "AZURE_SUBSCRIPTION_ID")]
        subscription_id: Option<String>,

        #[arg(long, default_value = "eastus")]
        location: String,
    },
}

impl Commands {
    fn provider(&self) -> Provider {
        match self {
            Commands::Aws { .. } => Provider::Aws,
            Commands::Gcp { .. } => Provider::Gcp,
            Commands::Azure { .. } => Provider::Azure,
        }
    }

    fn run_args(&self) -> &RunArgs {
        match self {
            Commands::Aws { run, .. } | Commands::Gcp { run, .. } | Commands::Azure { run, .. } => {
                run
            }
        }
    }
}

/// The subcommand already names the provider, so free text only has to
/// supply the application-kind hint. A classifier failure degrades to the
/// pinned provider with no hint rather than aborting the run.
struct PinnedProviderClassifier {
    inner: ChatIntentClassifier,
    provider: Provider,
}

#[async_trait]
impl IntentClassifier for PinnedProviderClassifier {
    async fn classify(&self, description: &str) -> autodeploy_core::Result<ClassifiedIntent> {
        match self.inner.classify(description).await {
            Ok(mut classified) => {
                classified.provider = self.provider;
                Ok(classified)
            }
            Err(err) => {
                warn!(%err, "Intent classification failed; proceeding with the selected provider");
                Ok(ClassifiedIntent {
                    provider: self.provider,
                    app_kind_hint: autodeploy_core::AppKind::Unknown,
                })
            }
        }
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{label}: ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    let line = line.trim().to_string();
    if line.is_empty() {
        bail!("{label} must not be empty");
    }
    Ok(line)
}

fn build_config(command: &Commands) -> Result<EngineConfig> {
    let run = command.run_args();
    let mut config = EngineConfig::default();

    config.classifier.api_key = run.api_key.clone().unwrap_or_default();
    config.work_dir = run.work_dir.clone();
    config.ssh_public_key = match &run.ssh_public_key_file {
        Some(path) => Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read SSH public key from {}", path.display()))?
                .trim()
                .to_string(),
        ),
        None => discover_ssh_public_key(),
    };

    match command {
        Commands::Aws {
            access_key_id,
            secret_access_key,
            region,
            ..
        } => {
            config.aws.access_key_id = access_key_id.clone();
            config.aws.secret_access_key = secret_access_key.clone();
            config.aws.region = region.clone();
        }
        Commands::Gcp {
            project,
            billing_account_id,
            zone,
            ..
        } => {
            config.gcp.project = project.clone();
            config.gcp.billing_account_id = billing_account_id.clone();
            config.gcp.zone = zone.clone();
            config.gcp.region = zone
                .rsplit_once('-')
                .map(|(region, _)| region.to_string())
                .unwrap_or_else(|| zone.clone());
        }
        Commands::Azure {
            subscription_id,
            location,
            ..
        } => {
            config.azure.subscription_id = subscription_id.clone();
            config.azure.location = location.clone();
        }
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    autodeploy_core::init_tracing(cli.json, level);

    let provider = cli.command.provider();
    let config = build_config(&cli.command)?;
    config
        .validate_for(provider)
        .context("Configuration is incomplete for the selected provider")?;

    let run = cli.command.run_args();
    let description = match &run.description {
        Some(d) => d.clone(),
        None => prompt("Describe the deployment")?,
    };
    let repo_url = match &run.repo {
        Some(r) => r.clone(),
        None => prompt("Repository URL")?,
    };

    let classifier = PinnedProviderClassifier {
        inner: ChatIntentClassifier::new(config.classifier.clone()),
        provider,
    };
    let engine = DeploymentEngine::new(
        config.clone(),
        Arc::new(classifier),
        Arc::new(GitRepositoryInspector),
        Arc::new(TerraformDriver::new(config.apply_timeout)),
        Arc::new(HttpVerifier::new(config.verify.clone())),
    );

    // Ctrl-C must not orphan billable resources: the engine rolls the
    // in-flight attempt back before the abort surfaces here.
    let result = engine
        .deploy_with_abort(
            &DeploymentRequest {
                description,
                repo_url,
            },
            async {
                let _ = tokio::signal::ctrl_c().await;
            },
        )
        .await;

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(err) if !err.is_terminal() => {
            bail!("deployment failed (transient, safe to retry as-is): {err}")
        }
        Err(err) => return Err(err.into()),
    };

    match outcome.status {
        DeploymentStatus::Succeeded => {
            let endpoint = outcome.final_endpoint.unwrap_or_default();
            println!("Deployment verified reachable at http://{endpoint}/");
            Ok(())
        }
        DeploymentStatus::FailedTerminal => {
            for record in &outcome.attempt_history {
                eprintln!(
                    "attempt {} ({}): {}",
                    record.attempt,
                    record.target.run_strategy.name(),
                    record
                        .failure
                        .map(|f| format!("{f:?}"))
                        .unwrap_or_else(|| "ok".to_string())
                );
            }
            bail!(
                "deployment failed: {}",
                outcome
                    .last_error
                    .unwrap_or_else(|| "unknown failure".to_string())
            )
        }
    }
}
