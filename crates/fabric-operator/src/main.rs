//! Fabric Operator
//!
//! Converges switch fabric topology and addressing from LLDP neighbor facts.

use clap::{Parser, Subcommand};
use fabric_operator::{
    controllers::{log_population, Context, SwitchController},
    crds,
    http::{self, AppState, Readiness},
    observability::{init_metrics, init_tracing, shutdown_tracing, TracingConfig},
    repository::KubeRepository,
    version, OperatorConfig,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "fabric-operator")]
#[command(about = "Kubernetes operator converging switch fabric topology and addressing")]
#[command(version = version::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print CRD manifests to stdout
    Crds,
    /// Run the operator
    Run {
        /// Namespace to watch; all namespaces when unset
        #[arg(long)]
        namespace: Option<String>,

        /// Listen address for /health, /ready and /metrics
        #[arg(long)]
        bind_addr: Option<SocketAddr>,
    },
    /// Print build information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Crds => {
            print!("{}", crds::manifests()?);
            Ok(())
        }
        Commands::Version => {
            println!("{}", version::build_info());
            Ok(())
        }
        Commands::Run {
            namespace,
            bind_addr,
        } => {
            let mut config = OperatorConfig::from_env();
            if namespace.is_some() {
                config.namespace = namespace;
            }
            if let Some(addr) = bind_addr {
                config.bind_addr = addr;
            }
            run_operator(config).await
        }
    }
}

async fn run_operator(config: OperatorConfig) -> anyhow::Result<()> {
    init_tracing(TracingConfig::from_env()).map_err(|e| anyhow::anyhow!(e))?;

    info!(
        version = %version::full_version(),
        namespace = config.namespace.as_deref().unwrap_or("*"),
        families = ?config.families,
        "Starting fabric-operator"
    );

    let metrics = match init_metrics() {
        Ok(state) => Some(state),
        Err(e) => {
            warn!(error = %e, "Metrics disabled");
            None
        }
    };

    let client = kube::Client::try_default().await?;
    info!("Connected to Kubernetes");

    let repository = Arc::new(KubeRepository::new(client.clone(), config.namespace.clone()));
    let ctx = Arc::new(Context::new(repository, config.clone()));

    let readiness = Readiness::default();
    let state = AppState {
        client: client.clone(),
        readiness: readiness.clone(),
        metrics,
    };

    // Fails fast when the CRDs are not installed.
    log_population(&ctx).await?;
    readiness.set_ready();

    let result = tokio::select! {
        res = http::serve(config.bind_addr, state) => res.map_err(anyhow::Error::from),
        _ = SwitchController::run(client, ctx) => {
            info!("Controller stopped");
            Ok(())
        }
    };

    shutdown_tracing();
    result
}
