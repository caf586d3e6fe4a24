use clap::{Parser, Subcommand};
use flotilla_core::{
    load_yaml_file, to_json_pretty, validate_placement, ClusterResourcePlacement, MemberCluster,
    PolicySnapshot, StaticResourceCatalog,
};
use flotilla_scheduler::{
    Framework, FrameworkConfig, MemoryBindingSink, Scheduler, SchedulerConfig,
    StaticClusterSource,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "flotilla", about = "Flotilla multi-cluster placement scheduler")]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "FLOTILLA_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct CycleArgs {
    /// Maximum number of clusters evaluated concurrently
    #[arg(long, env = "FLOTILLA_PARALLELISM", default_value_t = 16)]
    parallelism: usize,
    /// Deadline for a single scheduling cycle, in seconds
    #[arg(long, env = "FLOTILLA_CYCLE_TIMEOUT_SECS", default_value_t = 30)]
    timeout_secs: u64,
}

impl CycleArgs {
    fn framework_config(&self) -> FrameworkConfig {
        FrameworkConfig {
            parallelism: self.parallelism,
            cycle_timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run one scheduling cycle and print the decision as JSON
    Schedule {
        /// Path to a ClusterResourcePlacement YAML document
        #[arg(long)]
        placement: PathBuf,
        /// Path to a YAML list of MemberCluster documents
        #[arg(long)]
        clusters: PathBuf,
        #[command(flatten)]
        cycle: CycleArgs,
    },
    /// Schedule several placements through the scheduler queue
    Run {
        /// Paths to ClusterResourcePlacement YAML documents
        #[arg(long = "placement", required = true)]
        placements: Vec<PathBuf>,
        /// Path to a YAML list of MemberCluster documents
        #[arg(long)]
        clusters: PathBuf,
        #[command(flatten)]
        cycle: CycleArgs,
    },
    /// Validate a placement document
    Validate {
        /// Path to a ClusterResourcePlacement YAML document
        #[arg(long)]
        placement: PathBuf,
    },
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Schedule {
            placement,
            clusters,
            cycle,
        } => run_schedule(&placement, &clusters, cycle.framework_config()).await,
        Commands::Run {
            placements,
            clusters,
            cycle,
        } => run_queue(&placements, &clusters, cycle.framework_config()).await,
        Commands::Validate { placement } => run_validate(&placement),
    }
}

/// Schedule a single placement
async fn run_schedule(
    placement: &Path,
    clusters: &Path,
    config: FrameworkConfig,
) -> miette::Result<()> {
    let crp = load_placement(placement)?;
    let clusters: Vec<MemberCluster> = load_yaml_file(clusters)?;

    let framework = Framework::with_default_plugins(config)?;
    let token = CancellationToken::new();
    spawn_ctrl_c_handler(token.clone());

    let decision = framework
        .run_scheduling_cycle(&PolicySnapshot::from_placement(&crp), clusters, &token)
        .await?;

    println!("{}", to_json_pretty(&decision)?);
    Ok(())
}

/// Feed every placement through the scheduler loop and print all decisions
async fn run_queue(
    placements: &[PathBuf],
    clusters: &Path,
    config: FrameworkConfig,
) -> miette::Result<()> {
    let source = Arc::new(StaticClusterSource::new(load_yaml_file(clusters)?));
    let sink = Arc::new(MemoryBindingSink::new());
    let config = SchedulerConfig {
        framework: config,
        ..Default::default()
    };
    let (tx, rx) = config.channel();
    let scheduler = Scheduler::new(source, sink.clone(), config)?;

    let token = CancellationToken::new();
    spawn_ctrl_c_handler(token.clone());

    let mut snapshots = Vec::with_capacity(placements.len());
    for path in placements {
        snapshots.push(PolicySnapshot::from_placement(&load_placement(path)?));
    }

    let submitter = tokio::spawn(async move {
        for snapshot in snapshots {
            if tx.send(snapshot).await.is_err() {
                break;
            }
        }
    });

    scheduler.run(rx, token).await?;
    if let Err(e) = submitter.await {
        error!("Placement submitter failed: {}", e);
    }

    let decisions = sink.decisions().await;
    info!(
        "Scheduled {} of {} placements",
        decisions.len(),
        placements.len()
    );
    println!("{}", to_json_pretty(&decisions)?);
    Ok(())
}

/// Validate a placement document
fn run_validate(placement: &Path) -> miette::Result<()> {
    load_placement(placement)?;
    println!("{} is valid", placement.display());
    Ok(())
}

/// Load a placement and run admission validation on it
fn load_placement(path: &Path) -> miette::Result<ClusterResourcePlacement> {
    let crp: ClusterResourcePlacement = load_yaml_file(path)?;
    let catalog = StaticResourceCatalog::well_known();
    validate_placement(&crp, Some(&catalog))?;
    info!("Loaded placement {} from {}", crp.name(), path.display());
    Ok(crp)
}

/// Cancel the token on ctrl-c
fn spawn_ctrl_c_handler(token: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupted, cancelling scheduling");
                token.cancel();
            }
            Err(e) => error!("Failed to listen for ctrl-c: {}", e),
        }
    });
}
