use crate::ops::Marbles;
use marbles_client::{ClientConfig, LedgerClient, Peer, StaticDiscovery};
use mock_ledger::{LocalTransport, MockLedger};
use std::sync::Arc;
use std::time::Duration;

/// A fresh in-process ledger and the marbles procedures bound to it.
pub fn harness() -> (Arc<MockLedger>, Marbles<LocalTransport>) {
    let ledger = Arc::new(MockLedger::new());
    let peers = vec![
        Peer::new("http://p0.org1", "Org1MSP"),
        Peer::new("http://p0.org2", "Org2MSP"),
    ];
    let config = ClientConfig::new("User1", "Org1MSP", peers.clone()).backoff(
        Duration::ZERO,
        Duration::ZERO,
        2.0,
    );
    let discovery = Arc::new(StaticDiscovery::new(["consortium"], peers));
    let transport = Arc::new(LocalTransport::new(ledger.clone()));
    let client = LedgerClient::new(config, transport, discovery).unwrap();

    (ledger, Marbles::new(Arc::new(client)))
}
