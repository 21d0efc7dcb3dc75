use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use dvn_governance::aws::{AwsCredentials, KmsClient, SecretsManagerClient};
use dvn_governance::config::{parse_binary_flag, parse_chain_names, Settings};
use dvn_governance::registry::load_signers;
use dvn_governance::utils::logging::init_tracing;
use dvn_governance::{
    log_info, Environment, FailurePolicy, GovernanceOperation, GovernanceRequest, Orchestrator, Registry, SignerMode,
    Signers,
};

#[derive(Parser)]
#[command(author, version, about = "Build quorum-signed DVN governance payloads")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Add or remove a DVN signer
    SetSigner {
        #[command(flatten)]
        common: CommonArgs,
        #[arg(long)]
        quorum: usize,
        #[arg(long)]
        signer_address: String,
        /// 0 adds the signer, 1 removes it
        #[arg(long)]
        should_revoke: u8,
    },
    /// Change the signature quorum
    SetQuorum {
        #[command(flatten)]
        common: CommonArgs,
        /// Current quorum; the payload carries this many signatures
        #[arg(long)]
        old_quorum: usize,
        #[arg(long)]
        new_quorum: u64,
    },
    /// Grant or revoke MESSAGE_LIB_ROLE for a message library
    SetRole {
        #[command(flatten)]
        common: CommonArgs,
        #[arg(long)]
        quorum: usize,
        #[arg(long)]
        message_lib_address: String,
        /// 0 grants the role, 1 revokes it
        #[arg(long)]
        access: u8,
    },
}

#[derive(Args)]
struct CommonArgs {
    #[arg(short, long, default_value = "mainnet")]
    environment: Environment,
    /// Comma-separated chain names
    #[arg(short, long)]
    chain_names: String,
    /// kms | mnemonic | local
    #[arg(long, default_value = "kms")]
    signer_mode: SignerMode,
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,
    #[arg(long)]
    output: Option<PathBuf>,
    /// Absolute expiration in milliseconds
    #[arg(long)]
    expiration: Option<u64>,
    #[arg(long, default_value = "all-or-nothing")]
    failure_policy: FailurePolicy,
    #[arg(long)]
    verbose: bool,
}

async fn signers_for(mode: SignerMode, settings: &Settings) -> anyhow::Result<Signers> {
    let signers = match mode {
        SignerMode::RawMnemonic => Signers::local(),
        SignerMode::Custodial => {
            let mut kms = KmsClient::new(AwsCredentials::resolve().await?)?;
            if let Some(endpoint) = &settings.kms_endpoint {
                kms = kms.with_endpoint(endpoint)?;
            }
            Signers::local().with_custodial(Arc::new(kms))
        }
        SignerMode::DerivedMnemonic => {
            let mut secrets = SecretsManagerClient::new(AwsCredentials::resolve().await?)?;
            if let Some(endpoint) = &settings.secrets_endpoint {
                secrets = secrets.with_endpoint(endpoint)?;
            }
            Signers::local().with_secret_store(Arc::new(secrets))
        }
    };
    Ok(signers)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (common, operation, quorum) = match cli.cmd {
        Command::SetSigner { common, quorum, signer_address, should_revoke } => {
            let revoke = parse_binary_flag(should_revoke, "--should-revoke")?;
            let operation = GovernanceOperation::SetSigner { signer_address, active: !revoke };
            (common, operation, quorum)
        }
        Command::SetQuorum { common, old_quorum, new_quorum } => {
            (common, GovernanceOperation::set_quorum(new_quorum), old_quorum)
        }
        Command::SetRole { common, quorum, message_lib_address, access } => {
            let revoke = parse_binary_flag(access, "--access")?;
            (common, GovernanceOperation::message_lib_role(message_lib_address, !revoke), quorum)
        }
    };

    init_tracing(common.verbose);

    let settings = Settings::resolve(
        common.environment,
        common.data_dir,
        common.output,
        common.expiration,
        common.failure_policy,
        &operation,
    );
    let chains = parse_chain_names(&common.chain_names)?;

    let registry = Registry::load(&settings.data_dir, settings.environment)
        .with_context(|| format!("loading registries from {}", settings.data_dir.display()))?;
    let descriptors = load_signers(&settings.data_dir, settings.environment, common.signer_mode)?;
    let signers = signers_for(common.signer_mode, &settings).await?;

    let orchestrator = Orchestrator::new(registry, Arc::new(signers)).with_failure_policy(settings.failure_policy);
    let (targets, unresolved) = orchestrator.resolve_targets(&chains)?;

    log_info!(
        "main",
        "Building payloads",
        operation = operation.name(),
        environment = settings.environment,
        chains = targets.len(),
        keys = descriptors.len()
    );

    let report = if targets.is_empty() {
        unresolved
    } else {
        let request = GovernanceRequest::new(
            settings.environment,
            operation,
            targets,
            quorum,
            settings.expiration,
            descriptors,
        )?;
        let mut report = orchestrator.run(&request).await?;
        report.results.extend(unresolved.results);
        report
    };

    report.write(&settings.output, settings.failure_policy)?;

    let failed: Vec<String> = report.failures().map(|(chain, e)| format!("{}: {}", chain, e)).collect();
    if !failed.is_empty() {
        bail!("{} chain(s) failed:\n{}", failed.len(), failed.join("\n"));
    }
    Ok(())
}
