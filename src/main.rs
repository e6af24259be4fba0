// src/main.rs
//! Bridge end-to-end harness entry point.
use anyhow::{Context, Result};
use bridge_e2e::blockchain::{EthereumClient, EthersBridge, RouterApiClient};
use bridge_e2e::cli::{Cli, Commands, DeployArgs, RunArgs, TrackArgs};
use bridge_e2e::core::config::wallet_private_key;
use bridge_e2e::core::{HarnessConfig, TokenRegistry};
use bridge_e2e::harness::{
    ChainClients, CheckpointLog, ClaimOutcome, ClaimResult, RunOptions, ScenarioOrchestrator,
};
use bridge_e2e::ops::{balances, deploy, track};
use clap::Parser;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::Address;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{filter::Directive, EnvFilter, FmtSubscriber};

/// Live collaborators for one invocation.
struct Connections {
    router: Arc<RouterApiClient>,
    bridge: Arc<EthersBridge>,
    clients: ChainClients,
    wallet: Address,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Ok(path) = dotenvy::dotenv() {
        eprintln!("Loaded environment from {}", path.display());
    }

    init_logging(cli.verbose)?;
    info!("bridge-e2e v{}", env!("CARGO_PKG_VERSION"));

    let mut config = HarnessConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Run(args) => run_suite(&mut config, args).await,
        Commands::Claims { dry_run } => {
            config.settings.dry_run |= dry_run;
            process_existing_claims(&config).await
        }
        Commands::Balances { address } => show_balances(&config, address).await,
        Commands::DeployToken(args) => deploy_token(&config, args).await,
        Commands::Track(args) => track_transaction(&config, args).await,
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,hyper=info,h2=info"));
    if verbose {
        filter = filter.add_directive("bridge_e2e=debug".parse::<Directive>()?);
    }

    let subscriber = FmtSubscriber::builder().with_env_filter(filter).with_target(verbose).finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// `PRIVATE_KEY`, or a throwaway key for read-only commands.
fn signing_key(required: bool) -> Result<String> {
    match wallet_private_key() {
        Ok(key) => Ok(key),
        Err(e) if required => Err(e.into()),
        Err(_) => {
            let wallet = LocalWallet::new(&mut rand::thread_rng());
            Ok(hex::encode(wallet.signer().to_bytes()))
        }
    }
}

async fn connect(config: &HarnessConfig, key: &str, only_chain: Option<&str>) -> Result<Connections> {
    let wallet = LocalWallet::from_str(key).context("Invalid PRIVATE_KEY")?.address();
    let router = Arc::new(RouterApiClient::new(&config.settings.router_api_url)?);
    let bridge = Arc::new(EthersBridge::from_chains(&config.chains)?);

    let mut clients = ChainClients::new();
    for chain in config.chains.iter().filter(|c| only_chain.map_or(true, |k| k == c.key)) {
        let client = EthereumClient::connect(chain, key)
            .await
            .with_context(|| format!("Failed to connect to {}", chain.key))?;
        clients.insert(&chain.key, Arc::new(client));
    }
    Ok(Connections { router, bridge, clients, wallet })
}

async fn run_suite(config: &mut HarnessConfig, args: RunArgs) -> Result<()> {
    config.settings.dry_run |= args.dry_run;
    let key = signing_key(true)?;
    let conn = connect(config, &key, None).await?;

    let checkpoint = CheckpointLog::new(&config.settings.checkpoint_path);
    let orchestrator =
        ScenarioOrchestrator::new(config.clone(), conn.router, conn.bridge, conn.clients, conn.wallet)
            .with_checkpoint(checkpoint);
    let options = RunOptions { resume: args.resume, only: args.only, skip_existing_claims: args.no_existing_claims };

    let report = orchestrator.run(&options).await?;
    report.log_summary();
    report.write_to(&config.settings.results_dir)?;
    Ok(())
}

async fn process_existing_claims(config: &HarnessConfig) -> Result<()> {
    let key = signing_key(true)?;
    let conn = connect(config, &key, None).await?;
    let orchestrator =
        ScenarioOrchestrator::new(config.clone(), conn.router, conn.bridge, conn.clients, conn.wallet);
    let results = orchestrator.claims().check_for_existing_claims().await?;
    log_claims(&results);
    Ok(())
}

fn log_claims(results: &[ClaimResult]) {
    for result in results {
        let label = result.claim.label();
        match &result.outcome {
            ClaimOutcome::Claimed { hash, block_number, .. } => info!(claim = %label, tx_hash = %hash, block = ?block_number, "Claimed"),
            ClaimOutcome::Simulated { hash } => info!(claim = %label, tx_hash = %hash, "[DRY RUN] Claim simulated"),
            ClaimOutcome::AlreadyClaimed => info!(claim = %label, "Already claimed"),
            ClaimOutcome::Failed { kind, error } => warn!(claim = %label, kind = %kind, "{}", error),
        }
    }
}

async fn show_balances(config: &HarnessConfig, address: Option<Address>) -> Result<()> {
    let key = signing_key(address.is_none())?;
    let conn = connect(config, &key, None).await?;
    let owner = address.unwrap_or(conn.wallet);

    let registry = TokenRegistry::from_config(&config.tokens);
    for symbol in registry.symbols() {
        if let Err(e) = registry.refresh_wrapped(conn.router.as_ref(), &config.chains, &symbol).await {
            warn!(token = %symbol, error = %e, "Wrapped token refresh failed");
        }
    }
    let lines = balances::collect_balances(config, &registry, conn.bridge.as_ref(), &conn.clients, owner).await;
    balances::log_balances(owner, &lines);
    Ok(())
}

async fn deploy_token(config: &HarnessConfig, args: DeployArgs) -> Result<()> {
    let chain = config.chain(&args.chain)?;
    let key = signing_key(true)?;
    let artifact = deploy::load_artifact(&args.artifact)
        .with_context(|| format!("Failed to read artifact {}", args.artifact.display()))?;
    let client = EthereumClient::connect(chain, &key).await?;

    let params = deploy::TokenParams {
        name: args.name,
        symbol: args.symbol,
        decimals: args.decimals,
        supply: args.supply,
    };
    let deployer = client.signer().address();
    let record = deploy::deploy_token(client.signer(), &artifact, &params, deployer, chain).await?;
    let path = record.write_to(&config.settings.deployments_dir)?;
    info!(
        path = %path.display(),
        "Add `address = \"{:?}\"` to the {} token entry on {} to use it as a bridge source",
        record.address, record.symbol, record.chain
    );
    Ok(())
}

async fn track_transaction(config: &HarnessConfig, args: TrackArgs) -> Result<()> {
    let has_wallet = wallet_private_key().is_ok();
    let key = signing_key(false)?;
    let conn = connect(config, &key, Some(&args.chain)).await?;
    let client = conn.clients.get(&args.chain)?;

    let options = track::TrackOptions {
        watch: args.watch,
        interval: Duration::from_secs(args.interval),
        max_polls: args.max_polls,
    };
    let owner = has_wallet.then_some(conn.wallet);
    let status = track::track_transaction(client.as_ref(), conn.router.as_ref(), owner, &args.hash, &options).await?;
    track::log_status(&status);
    Ok(())
}
