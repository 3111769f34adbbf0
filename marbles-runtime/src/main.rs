use anyhow::Context;
use clap::Parser;
use marbles_runtime::{MarblesRuntime, ServiceConfig};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(version, about = "Runs marbles batch loads against a ledger")]
struct Args {
    /// Path to the TOML service configuration.
    #[arg(short, long)]
    config: PathBuf,

    /// Overrides `[http] listen`.
    #[arg(short, long)]
    listen: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = ServiceConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.filter))
        .context("invalid [logging] filter")?;
    FmtSubscriber::builder().with_env_filter(filter).init();

    if let Some(metrics) = &config.metrics {
        PrometheusBuilder::new()
            .with_http_listener(metrics.listen)
            .install()
            .context("installing Prometheus exporter")?;
        marbles::describe_metrics();
        info!("Serving metrics on {}", metrics.listen);
    }

    let mut runtime = MarblesRuntime::new(config);
    if let Some(listen) = args.listen {
        runtime = runtime.listen(listen);
    }
    runtime.run().await?;
    Ok(())
}
