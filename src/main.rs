use anyhow::Context;
use clap::{Parser, Subcommand};
use hotspot_keeper::config::{required_env, AdminSecrets, Config};
use hotspot_keeper::flow::signer::AdminSigner;
use hotspot_keeper::flow::types::{Location, TxOutcome};
use hotspot_keeper::flow::{FlowService, Registry};
use hotspot_keeper::http::{self, AppState};
use hotspot_keeper::jobs::{self, location::LocationJob, status::StatusJob, LastPass};
use hotspot_keeper::keys::KeyPool;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hotspot-keeper")]
#[command(about = "Keeps the on-chain 5G hotspot registry located and alive")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the background jobs and the health endpoint (default)
    Run,
    /// Print every hotspot in the registry
    Hotspots,
    /// List the operator NFTs held by an address
    Nfts { address: String },
    /// Check whether an address holds any operator NFT
    OwnsNft { address: String },
    /// Print the FLOW balance of an address
    Balance { address: String },
    /// Add copies of the admin public key to the admin account
    AddKeys { count: u32 },
    /// Send empty admin transactions concurrently to exercise key rotation
    Probe {
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _ = dotenvy::dotenv();

    // Load configuration
    let mut config = Config::load(&cli.config).unwrap_or_else(|e| {
        eprintln!("Warning: Failed to load config from {:?}: {}", cli.config, e);
        eprintln!("Using default configuration");
        Config::default()
    });
    config.apply_env()?;

    // Initialize tracing/logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config).await,
        Command::Hotspots => {
            let service = FlowService::read_only(&config.flow)?;
            let hotspots = service.all_hotspots().await?;
            for hotspot in &hotspots {
                let location = match (hotspot.lat, hotspot.lng) {
                    (Some(lat), Some(lng)) => Location { lat, lng }.to_string(),
                    _ => "unlocated".to_string(),
                };
                let updated = hotspot
                    .last_updated_at()
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string());
                println!(
                    "#{:<6} {} {} {} updated {}",
                    hotspot.id,
                    hotspot.owner,
                    location,
                    if hotspot.online { "online" } else { "offline" },
                    updated
                );
            }
            println!("{} hotspots", hotspots.len());
            Ok(())
        }
        Command::Nfts { address } => {
            let service = FlowService::read_only(&config.flow)?;
            let nfts = service.operator_nfts(&address).await?;
            for nft in &nfts {
                match nft.rewards_balance {
                    Some(balance) => {
                        println!("#{} {} ({:.8} rewards)", nft.id, nft.name(), balance)
                    }
                    None => println!("#{} {}", nft.id, nft.name()),
                }
            }
            println!("{} operator NFTs held by {}", nfts.len(), address);
            Ok(())
        }
        Command::OwnsNft { address } => {
            let service = FlowService::read_only(&config.flow)?;
            println!("{}", service.owns_operator_nft(&address).await?);
            Ok(())
        }
        Command::Balance { address } => {
            let service = FlowService::read_only(&config.flow)?;
            println!("{:.8} FLOW", service.flow_balance(&address).await?);
            Ok(())
        }
        Command::AddKeys { count } => {
            let service = admin_service(&config)?;
            let public_key = match required_env("ADMIN_PUBLIC_KEY") {
                Ok(key) => key,
                Err(_) => match service.signer() {
                    Some(signer) => signer.public_key_hex(),
                    None => anyhow::bail!("no admin public key available"),
                },
            };
            report(service.add_keys(&public_key, count).await?);
            Ok(())
        }
        Command::Probe { count } => {
            let service = admin_service(&config)?;
            let probes = (0..count).map(|_| service.probe());
            for result in futures::future::join_all(probes).await {
                match result {
                    Ok(outcome) => report(outcome),
                    Err(e) => error!("Probe failed: {:#}", e),
                }
            }
            Ok(())
        }
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    info!("hotspot-keeper v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Network: {} via {}",
        config.flow.network,
        config.flow.access_node()
    );

    let service = Arc::new(admin_service(&config)?);
    let registry: Arc<dyn Registry> = service.clone();

    let (trigger, shutdown) = triggered::trigger();
    let state = Arc::new(AppState {
        network: config.flow.network,
        key_pool: service.key_pool().clone(),
        location: LastPass::default(),
        status: LastPass::default(),
    });

    let mut tasks = tokio::task::JoinSet::new();

    if config.jobs.location.enabled {
        let job = Arc::new(LocationJob::new(
            registry.clone(),
            config.jobs.location.normalize_longitude,
        ));
        tasks.spawn(jobs::run_periodic(
            job,
            config.jobs.location.interval,
            state.location.clone(),
            shutdown.clone(),
        ));
    } else {
        info!("Location job disabled");
    }

    if config.jobs.status.enabled {
        let job = Arc::new(StatusJob::new(
            registry.clone(),
            config.jobs.status.online_ratio,
        ));
        tasks.spawn(jobs::run_periodic(
            job,
            config.jobs.status.interval,
            state.status.clone(),
            shutdown.clone(),
        ));
    } else {
        info!("Status job disabled");
    }

    let bind = config.http.bind.clone();
    let http_state = state.clone();
    let http_shutdown = shutdown.clone();
    tasks.spawn(async move { http::serve(&bind, http_state, http_shutdown).await });

    info!("Keeper running. Press Ctrl+C to stop.");
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Shutting down...");
        }
        Some(joined) = tasks.join_next() => {
            // A task ending before shutdown is fatal
            match joined {
                Ok(Ok(())) => error!("Background task exited unexpectedly"),
                Ok(Err(e)) => error!("Background task failed: {:#}", e),
                Err(e) => error!("Background task panicked: {}", e),
            }
        }
    }

    trigger.trigger();
    while let Some(joined) = tasks.join_next().await {
        if let Ok(Err(e)) = joined {
            error!("Task failed during shutdown: {:#}", e);
        }
    }
    Ok(())
}

fn admin_service(config: &Config) -> anyhow::Result<FlowService> {
    if config.admin.address.is_empty() {
        anyhow::bail!("admin address is not configured (admin.address or ADMIN_ADDRESS)");
    }
    let secrets = AdminSecrets::from_env()?;
    let signer = AdminSigner::from_encrypted(
        &config.admin.address,
        &secrets.encrypted_private_key,
        &secrets.passphrase,
    )
    .context("failed to load admin signer")?;
    FlowService::with_signer(&config.flow, signer, KeyPool::new(config.admin.key_count))
}

fn report(outcome: TxOutcome) {
    match outcome {
        TxOutcome::Sealed { id } => info!("Transaction sealed: {}", id),
        TxOutcome::Skipped => info!("No admin key free, transaction skipped"),
    }
}
