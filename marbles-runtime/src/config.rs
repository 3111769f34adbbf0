use crate::error::RuntimeError;
use marbles_client::ClientConfig;
use marbles_core::{CREATE_MARBLE_MAX_ATTEMPTS, MARBLES_PROCEDURE_ID};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

const DEFAULT_LOG_FILTER: &str =
    "marbles=info,marbles_client=info,marbles_runtime=info,tower_http=debug";
const DEFAULT_QUEUE_SIZE: usize = 16;

/// Configuration of the service process, read from a TOML file.
///
/// `[http]` and `[client]` are required; every other section falls back to
/// its defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    pub http: HttpConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: Option<MetricsConfig>,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub batch: BatchQueueConfig,
    pub client: ClientConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfig {
    pub listen: SocketAddr,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directives; `RUST_LOG` takes precedence.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

/// Prometheus scrape endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub listen: SocketAddr,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Defaults to the client's consortium channel.
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default = "default_procedure")]
    pub procedure_id: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            channel_id: None,
            procedure_id: default_procedure(),
        }
    }
}

fn default_procedure() -> String {
    MARBLES_PROCEDURE_ID.to_string()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchQueueConfig {
    /// Batch requests accepted before `/batch_run` waits for the queue.
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
    #[serde(default = "default_create_attempts")]
    pub create_marble_attempts: usize,
}

impl Default for BatchQueueConfig {
    fn default() -> Self {
        Self {
            queue_size: default_queue_size(),
            create_marble_attempts: default_create_attempts(),
        }
    }
}

fn default_queue_size() -> usize {
    DEFAULT_QUEUE_SIZE
}

fn default_create_attempts() -> usize {
    CREATE_MARBLE_MAX_ATTEMPTS
}

impl ServiceConfig {
    pub fn load(path: &Path) -> Result<Self, RuntimeError> {
        let raw = std::fs::read_to_string(path).map_err(|source| RuntimeError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, RuntimeError> {
        let config: ServiceConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RuntimeError> {
        self.client.validate()?;
        if self.ledger.procedure_id.is_empty() {
            return Err(RuntimeError::Config(
                "ledger.procedure_id must not be empty".to_string(),
            ));
        }
        if self.batch.queue_size == 0 {
            return Err(RuntimeError::Config(
                "batch.queue_size must be positive".to_string(),
            ));
        }
        if self.batch.create_marble_attempts == 0 {
            return Err(RuntimeError::Config(
                "batch.create_marble_attempts must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Channel the marbles procedures live on.
    pub fn channel_id(&self) -> &str {
        self.ledger
            .channel_id
            .as_deref()
            .unwrap_or(&self.client.consortium_channel_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[http]
listen = "127.0.0.1:8080"

[metrics]
listen = "127.0.0.1:9000"

[client]
user_id = "User1"
organization = "Org1MSP"
invoke_max_attempts = 6
initial_backoff_ms = 250
event_timeout_seconds = 30

[[client.peers]]
url = "http://p0.org1:7051"
group = "Org1MSP"

[[client.peers]]
url = "http://p0.org2:7051"
group = "Org2MSP"
"#;

    #[test]
    fn parses_sample() {
        let config = ServiceConfig::from_toml(SAMPLE).unwrap();

        assert_eq!(config.http.listen, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.logging, LoggingConfig::default());
        assert_eq!(
            config.metrics.as_ref().map(|m| m.listen),
            Some("127.0.0.1:9000".parse().unwrap())
        );
        assert_eq!(config.ledger.procedure_id, "marblescc");
        assert_eq!(config.channel_id(), "consortium");
        assert_eq!(config.batch.create_marble_attempts, 3000);

        assert_eq!(config.client.invoke_policy().max_attempts, 6);
        assert_eq!(config.client.query_policy().max_attempts, 5);
        assert_eq!(
            config.client.initial_backoff,
            std::time::Duration::from_millis(250)
        );
        assert_eq!(config.client.peers.len(), 2);
    }

    #[test]
    fn channel_override() {
        let raw = format!("{SAMPLE}\n[ledger]\nchannel_id = \"org1\"\n");
        let config = ServiceConfig::from_toml(&raw).unwrap();
        assert_eq!(config.channel_id(), "org1");
        assert_eq!(config.ledger.procedure_id, "marblescc");
    }

    #[test]
    fn missing_section_is_fatal() {
        let raw = SAMPLE.replace("[http]\nlisten = \"127.0.0.1:8080\"\n", "");
        assert!(matches!(
            ServiceConfig::from_toml(&raw),
            Err(RuntimeError::ConfigParse(_))
        ));
    }

    #[test]
    fn missing_credentials_are_fatal() {
        let raw = SAMPLE.replace("user_id = \"User1\"\n", "");
        assert!(matches!(
            ServiceConfig::from_toml(&raw),
            Err(RuntimeError::Client(_))
        ));
    }

    #[test]
    fn empty_queue_is_rejected() {
        let raw = format!("{SAMPLE}\n[batch]\nqueue_size = 0\n");
        assert!(matches!(
            ServiceConfig::from_toml(&raw),
            Err(RuntimeError::Config(_))
        ));
    }
}
