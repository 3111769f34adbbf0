use clap::Parser;
use mock_ledger::MockLedger;
use rand_distr::SkewNormal;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(version, about = "In-memory marbles ledger")]
struct Args {
    #[arg(short, long, default_value = "0.0.0.0:7051")]
    listen: SocketAddr,

    /// Answer "ledger busy" above this many calls per second.
    #[arg(long)]
    max_tps: Option<NonZeroU32>,

    /// Mean simulated latency, in milliseconds.
    #[arg(long)]
    latency_ms: Option<f64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_env_filter("mock_ledger=debug,tower_http=info")
        .init();

    let args = Args::parse();

    let mut ledger = MockLedger::new();
    if let Some(tps) = args.max_tps {
        ledger = ledger.with_tps_limit(tps);
    }
    if let Some(mean) = args.latency_ms {
        ledger = ledger.with_latency(SkewNormal::new(mean, mean / 4., 2.)?);
    }

    mock_ledger::run(args.listen, Arc::new(ledger)).await?;
    Ok(())
}
