mod utils;
#[allow(unused)]
use utils::*;

#[cfg(feature = "integration")]
mod tests {
    use super::*;

    use marbles::{LoadGenerator, Marbles};
    use marbles_client::{EventListener, ListenerState};
    use marbles_core::{BatchConfig, BatchResult, BatchStatus, InitBatchResponse};
    use marbles_runtime::{MarblesRuntime, ServiceConfig};
    use mock_ledger::status;
    use reqwest::{Client, StatusCode};
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    #[ntest::timeout(30_000)]
    async fn batch_over_http() {
        init();
        let (ledger, client) = http_marbles().await;

        let result = LoadGenerator::new("bH", BatchConfig::new(2, 3), Marbles::new(client))
            .run()
            .await
            .unwrap();

        assert_eq!(result.status, BatchStatus::Success);
        assert_eq!(result.total_successes, 6);
        assert_eq!(ledger.calls("set_owner"), 6);
        assert!(ledger.value("bHBRR").is_some());
    }

    #[tokio::test]
    #[ntest::timeout(30_000)]
    async fn busy_ledger_is_retried() {
        init();
        let (ledger, client) = http_marbles().await;
        ledger.fail_calls("write", [1, 2], status::BUSY);

        let reply = client
            .invoke("consortium", "marblescc", &["write", "k", "v"], None)
            .await
            .unwrap();

        assert!(!reply.tx_id.is_empty());
        assert_eq!(ledger.calls("write"), 3);
        assert_eq!(ledger.value("k"), Some(b"v".to_vec()));
    }

    #[tokio::test]
    #[ntest::timeout(30_000)]
    async fn rejected_invoke_is_not_retried() {
        init();
        let (ledger, client) = http_marbles().await;

        let err = client
            .invoke("consortium", "marblescc", &["set_owner", "m-missing", "o1", "ACME"], None)
            .await
            .unwrap_err();

        assert_eq!(err.status().map(|s| s.code), Some(status::NOT_FOUND));
        assert_eq!(ledger.calls("set_owner"), 1);
    }

    #[tokio::test]
    #[ntest::timeout(30_000)]
    async fn events_over_websocket() {
        init();
        let (_, client) = http_marbles().await;
        let url = client.config().peers[0].url.clone();

        let mut listener = EventListener::new(client.clone(), "consortium", "marblescc");
        listener.register("write").await.unwrap();
        // Let the socket finish its handshake before the event fires.
        tokio::time::sleep(Duration::from_millis(200)).await;

        client
            .invoke("consortium", "marblescc", &["write", "k", "v"], None)
            .await
            .unwrap();

        let source = listener
            .block_wait(Some(Duration::from_secs(5)), 1)
            .await
            .unwrap();
        assert_eq!(source, Some(url));
        assert_eq!(listener.state(), ListenerState::Fired);
        listener.close();
        listener.close();
    }

    #[tokio::test]
    #[ntest::timeout(60_000)]
    async fn service_runs_batches() {
        init();
        let (_, ledger_addr) = spawn_ledger().await;
        let listen = free_addr().await;

        let config = ServiceConfig::from_toml(&format!(
            r#"
[http]
listen = "{listen}"

[batch]
create_marble_attempts = 10

[client]
user_id = "User1"
organization = "Org1MSP"
initial_backoff_ms = 1
max_backoff_ms = 10

[[client.peers]]
url = "http://{ledger_addr}"
group = "Org1MSP"

[[client.peers]]
url = "http://{ledger_addr}"
group = "Org2MSP"
"#
        ))
        .unwrap();
        tokio::spawn(async move {
            let _ = MarblesRuntime::new(config).run().await;
        });
        tokio::time::sleep(Duration::from_millis(300)).await;

        let http = Client::new();
        let base = format!("http://{listen}");

        let hello = http
            .get(format!("{base}/hello"))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(hello, "Hello World\n");

        let started: InitBatchResponse = http
            .post(format!("{base}/batch_run"))
            .json(&json!({"concurrency": 3, "iterations": 4, "extraDataLength": 8}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        let uri = format!("{base}/batch_run/{}", started.batch_id);
        let result: BatchResult = loop {
            let res = http.get(&uri).send().await.unwrap();
            match res.status() {
                StatusCode::OK => break res.json().await.unwrap(),
                StatusCode::NOT_FOUND => tokio::time::sleep(Duration::from_millis(50)).await,
                other => panic!("unexpected status {other}"),
            }
        };

        assert_eq!(result.status, BatchStatus::Success);
        assert_eq!(result.total_successes, 12);
        assert_eq!(result.request.extra_data_length, 8);
    }
}
