use marbles::Marbles;
use marbles_client::{ClientConfig, HttpTransport, LedgerClient, Peer, StaticDiscovery};
use metrics_exporter_prometheus::PrometheusBuilder;
use mock_ledger::{LocalTransport, MockLedger};
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::error;
use tracing_subscriber::FmtSubscriber;

#[allow(unused)]
pub fn init() {
    static ONCE_LOCK: OnceLock<()> = OnceLock::new();

    ONCE_LOCK.get_or_init(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            default_panic(info);
            error!("Panic occurred: {info:?}");
        }));

        let _ = FmtSubscriber::builder()
            .with_env_filter("marbles=debug,marbles_client=debug,mock_ledger=info")
            .try_init();

        // Recorder only, so timed transactions have somewhere to go.
        if let Err(err) = PrometheusBuilder::new().install_recorder() {
            error!("Could not install metrics recorder: {err}");
        }
        marbles::describe_metrics();
    });
}

#[allow(unused)]
pub fn peers(org1: &str, org2: &str) -> Vec<Peer> {
    vec![Peer::new(org1, "Org1MSP"), Peer::new(org2, "Org2MSP")]
}

#[allow(unused)]
pub fn client_config(peers: Vec<Peer>) -> ClientConfig {
    ClientConfig::new("User1", "Org1MSP", peers).backoff(
        Duration::from_millis(1),
        Duration::from_millis(10),
        2.0,
    )
}

/// Marbles on an in-process ledger.
#[allow(unused)]
pub fn local_marbles() -> (Arc<MockLedger>, Marbles<LocalTransport>) {
    let ledger = Arc::new(MockLedger::new());
    let peers = peers("http://p0.org1", "http://p0.org2");
    let discovery = Arc::new(StaticDiscovery::new(["consortium"], peers.clone()));
    let transport = Arc::new(LocalTransport::new(ledger.clone()));
    let client = LedgerClient::new(client_config(peers), transport, discovery).unwrap();

    (ledger, Marbles::new(Arc::new(client)))
}

/// Serves a fresh mock ledger on an ephemeral local port.
#[allow(unused)]
pub async fn spawn_ledger() -> (Arc<MockLedger>, SocketAddr) {
    let ledger = Arc::new(MockLedger::new());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let served = ledger.clone();
    tokio::spawn(async move {
        if let Err(err) = mock_ledger::serve(listener, served).await {
            error!("Mock ledger stopped: {err}");
        }
    });
    (ledger, addr)
}

/// Marbles over HTTP against a served mock ledger. Both replica groups point
/// at the same server.
#[allow(unused)]
pub async fn http_marbles() -> (Arc<MockLedger>, Arc<LedgerClient<HttpTransport>>) {
    let (ledger, addr) = spawn_ledger().await;
    let url = format!("http://{addr}");
    let client = LedgerClient::connect(client_config(peers(&url, &url))).unwrap();
    (ledger, Arc::new(client))
}

/// An unused local port.
#[allow(unused)]
pub async fn free_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}
