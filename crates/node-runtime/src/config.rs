//! # Node Configuration
//!
//! Loaded from an optional TOML file, then overlaid with `LEDGER_*`
//! environment variables. Every field has a default, so an empty file (or
//! no file at all) yields a single-replica development node.
//!
//! ```toml
//! [node]
//! replica_id = 0
//! cluster_size = 4
//! listen_addr = "127.0.0.1:7400"
//! data_dir = "./data"
//!
//! [replication]
//! submit_timeout_ms = 5000
//! snapshot_interval = 1000
//! queue_capacity = 1024
//!
//! [security]
//! policy = "signature+hmac"
//! nonce_retention = "window"
//! nonce_ttl_secs = 86400
//! max_nonces = 1000000
//!
//! [store]
//! backend = "memory"
//!
//! [telemetry]
//! log_level = "info"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use lg_02_envelope::{NonceRetention, VerificationPolicy};
use lg_03_replication::ClusterConfig;
use lg_04_read_store::ReconcilerConfig;
use lg_05_ledger_service::ServiceConfig;
use ledger_telemetry::TelemetryConfig;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {error}")]
    Io { path: String, error: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid value '{value}' for {var}")]
    Env { var: String, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Complete node configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub node: NodeSection,
    pub replication: ReplicationSection,
    pub security: SecuritySection,
    pub store: StoreSection,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NodeSection {
    /// Index of the replica this node answers from.
    pub replica_id: usize,
    /// Replicas in the in-process cluster (n = 3f + 1).
    pub cluster_size: usize,
    pub listen_addr: String,
    pub data_dir: PathBuf,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            replica_id: 0,
            cluster_size: 1,
            listen_addr: "127.0.0.1:7400".to_string(),
            data_dir: PathBuf::from("./data"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReplicationSection {
    pub submit_timeout_ms: u64,
    /// Commits between snapshot files.
    pub snapshot_interval: u64,
    /// Snapshot files kept on disk.
    pub snapshot_retain: usize,
    /// Matching replies required. Defaults to f + 1.
    pub reply_quorum: Option<usize>,
    /// Bounded submission queue. A full queue refuses new submissions.
    pub queue_capacity: usize,
}

impl Default for ReplicationSection {
    fn default() -> Self {
        Self {
            submit_timeout_ms: 5_000,
            snapshot_interval: 1_000,
            snapshot_retain: 3,
            reply_quorum: None,
            queue_capacity: 1_024,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetentionMode {
    Unbounded,
    Window,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecuritySection {
    /// `signature` or `signature+hmac`.
    pub policy: String,
    pub nonce_retention: RetentionMode,
    pub nonce_ttl_secs: u64,
    pub max_nonces: usize,
    /// 32-byte secp256k1 secret, hex. Generated at startup when absent.
    pub service_key_hex: Option<String>,
}

impl Default for SecuritySection {
    fn default() -> Self {
        Self {
            policy: "signature".to_string(),
            nonce_retention: RetentionMode::Unbounded,
            nonce_ttl_secs: 24 * 60 * 60,
            max_nonces: 1_000_000,
            service_key_hex: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Rocksdb,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub backend: StoreBackend,
    /// RocksDB directory. Defaults to `<data_dir>/read-store`.
    pub path: Option<PathBuf>,
    pub retry_initial_ms: u64,
    pub retry_max_ms: u64,
    /// Hold mutating responses until the read store has caught up.
    pub await_reconciliation: bool,
    pub reconciliation_timeout_ms: u64,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            path: None,
            retry_initial_ms: 50,
            retry_max_ms: 5_000,
            await_reconciliation: false,
            reconciliation_timeout_ms: 2_000,
        }
    }
}

fn parsed<T: std::str::FromStr>(var: &str, value: String) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::Env { var: var.to_string(), value })
}

fn flag(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value == "1"
}

impl NodeConfig {
    /// Read `path` (when given), overlay the process environment and
    /// validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
                    path: path.display().to_string(),
                    error: e.to_string(),
                })?;
                Self::parse(&content)?
            }
            None => Self::default(),
        };
        let mut config = config.merge_env(|var| std::env::var(var).ok())?;
        config.telemetry = config.telemetry.merge_env();
        config.validate()?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Overlay `LEDGER_*` variables found through `lookup`.
    pub fn merge_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).map(|value| (var.to_string(), value));

        if let Some((var, v)) = get("LEDGER_REPLICA_ID") {
            self.node.replica_id = parsed(&var, v)?;
        }
        if let Some((var, v)) = get("LEDGER_CLUSTER_SIZE") {
            self.node.cluster_size = parsed(&var, v)?;
        }
        if let Some((_, v)) = get("LEDGER_LISTEN_ADDR") {
            self.node.listen_addr = v;
        }
        if let Some((_, v)) = get("LEDGER_DATA_DIR") {
            self.node.data_dir = PathBuf::from(v);
        }

        if let Some((var, v)) = get("LEDGER_SUBMIT_TIMEOUT_MS") {
            self.replication.submit_timeout_ms = parsed(&var, v)?;
        }
        if let Some((var, v)) = get("LEDGER_SNAPSHOT_INTERVAL") {
            self.replication.snapshot_interval = parsed(&var, v)?;
        }
        if let Some((var, v)) = get("LEDGER_REPLY_QUORUM") {
            self.replication.reply_quorum = Some(parsed(&var, v)?);
        }
        if let Some((var, v)) = get("LEDGER_QUEUE_CAPACITY") {
            self.replication.queue_capacity = parsed(&var, v)?;
        }

        if let Some((_, v)) = get("LEDGER_POLICY") {
            self.security.policy = v;
        }
        if let Some((var, v)) = get("LEDGER_NONCE_RETENTION") {
            self.security.nonce_retention = match v.to_ascii_lowercase().as_str() {
                "unbounded" => RetentionMode::Unbounded,
                "window" => RetentionMode::Window,
                _ => return Err(ConfigError::Env { var, value: v }),
            };
        }
        if let Some((var, v)) = get("LEDGER_NONCE_TTL_SECS") {
            self.security.nonce_ttl_secs = parsed(&var, v)?;
        }
        if let Some((var, v)) = get("LEDGER_MAX_NONCES") {
            self.security.max_nonces = parsed(&var, v)?;
        }
        if let Some((_, v)) = get("LEDGER_SERVICE_KEY_HEX") {
            self.security.service_key_hex = Some(v);
        }

        if let Some((var, v)) = get("LEDGER_STORE_BACKEND") {
            self.store.backend = match v.to_ascii_lowercase().as_str() {
                "memory" => StoreBackend::Memory,
                "rocksdb" => StoreBackend::Rocksdb,
                _ => return Err(ConfigError::Env { var, value: v }),
            };
        }
        if let Some((_, v)) = get("LEDGER_STORE_PATH") {
            self.store.path = Some(PathBuf::from(v));
        }
        if let Some((_, v)) = get("LEDGER_AWAIT_RECONCILIATION") {
            self.store.await_reconciliation = flag(&v);
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node.cluster_size < 1 {
            return Err(ConfigError::Invalid("cluster_size must be >= 1".into()));
        }
        if self.node.replica_id >= self.node.cluster_size {
            return Err(ConfigError::Invalid(format!(
                "replica_id {} outside cluster of {}",
                self.node.replica_id, self.node.cluster_size
            )));
        }
        let quorum = self.reply_quorum();
        if quorum == 0 || quorum > self.node.cluster_size {
            return Err(ConfigError::Invalid(format!(
                "reply_quorum {quorum} must be within 1..={}",
                self.node.cluster_size
            )));
        }
        if self.replication.submit_timeout_ms == 0 {
            return Err(ConfigError::Invalid("submit_timeout_ms must be > 0".into()));
        }
        if self.replication.queue_capacity == 0 {
            return Err(ConfigError::Invalid("queue_capacity must be > 0".into()));
        }
        if self.store.retry_initial_ms == 0 || self.store.retry_max_ms < self.store.retry_initial_ms {
            return Err(ConfigError::Invalid(
                "store retry delays must satisfy 0 < retry_initial_ms <= retry_max_ms".into(),
            ));
        }
        if self.security.nonce_retention == RetentionMode::Window
            && (self.security.nonce_ttl_secs == 0 || self.security.max_nonces == 0)
        {
            return Err(ConfigError::Invalid(
                "window nonce retention needs nonce_ttl_secs and max_nonces > 0".into(),
            ));
        }
        self.policy()?;
        Ok(())
    }

    // =========================================================================
    // Derived component configs
    // =========================================================================

    pub fn reply_quorum(&self) -> usize {
        self.replication
            .reply_quorum
            .unwrap_or_else(|| ClusterConfig::default_quorum(self.node.cluster_size))
    }

    pub fn cluster(&self) -> ClusterConfig {
        ClusterConfig {
            size: self.node.cluster_size,
            local: self.node.replica_id,
            reply_quorum: self.reply_quorum(),
            submit_timeout: Duration::from_millis(self.replication.submit_timeout_ms),
            snapshot_interval: self.replication.snapshot_interval,
            submission_capacity: self.replication.queue_capacity,
        }
    }

    pub fn policy(&self) -> Result<VerificationPolicy, ConfigError> {
        self.security
            .policy
            .parse()
            .map_err(|e: lg_02_envelope::EnvelopeError| ConfigError::Invalid(e.to_string()))
    }

    pub fn nonce_retention(&self) -> NonceRetention {
        match self.security.nonce_retention {
            RetentionMode::Unbounded => NonceRetention::Unbounded,
            RetentionMode::Window => NonceRetention::Window {
                ttl: Duration::from_secs(self.security.nonce_ttl_secs),
                max_entries: self.security.max_nonces,
            },
        }
    }

    pub fn reconciler(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            retry_initial: Duration::from_millis(self.store.retry_initial_ms),
            retry_max: Duration::from_millis(self.store.retry_max_ms),
        }
    }

    pub fn service(&self) -> ServiceConfig {
        ServiceConfig {
            await_reconciliation: self.store.await_reconciliation,
            reconciliation_timeout: Duration::from_millis(self.store.reconciliation_timeout_ms),
        }
    }

    pub fn snapshot_dir(&self) -> PathBuf {
        self.node.data_dir.join("snapshots")
    }

    pub fn store_path(&self) -> PathBuf {
        self.store
            .path
            .clone()
            .unwrap_or_else(|| self.node.data_dir.join("read-store"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = NodeConfig::default();
        config.validate().unwrap();
        assert_eq!(config.reply_quorum(), 1);
        assert_eq!(config.nonce_retention(), NonceRetention::Unbounded);
    }

    #[test]
    fn test_parse_toml_sections() {
        let config = NodeConfig::parse(
            r#"
            [node]
            replica_id = 2
            cluster_size = 4
            data_dir = "/var/lib/ledger"

            [replication]
            submit_timeout_ms = 250
            queue_capacity = 8

            [security]
            policy = "signature+hmac"
            nonce_retention = "window"
            nonce_ttl_secs = 60
            max_nonces = 10

            [store]
            backend = "rocksdb"

            [telemetry]
            log_level = "debug"
            "#,
        )
        .unwrap();
        config.validate().unwrap();

        let cluster = config.cluster();
        assert_eq!(cluster.size, 4);
        assert_eq!(cluster.local, 2);
        assert_eq!(cluster.reply_quorum, 2);
        assert_eq!(cluster.submit_timeout, Duration::from_millis(250));
        assert_eq!(config.policy().unwrap(), VerificationPolicy::hmac_augmented());
        assert_eq!(
            config.nonce_retention(),
            NonceRetention::Window {
                ttl: Duration::from_secs(60),
                max_entries: 10
            }
        );
        assert_eq!(config.store.backend, StoreBackend::Rocksdb);
        assert_eq!(config.store_path(), PathBuf::from("/var/lib/ledger/read-store"));
        assert_eq!(config.telemetry.log_level, "debug");
    }

    #[test]
    fn test_env_overrides_file() {
        let config = NodeConfig::parse("[node]\ncluster_size = 4\n")
            .unwrap()
            .merge_env(env(&[
                ("LEDGER_CLUSTER_SIZE", "7"),
                ("LEDGER_REPLY_QUORUM", "5"),
                ("LEDGER_STORE_BACKEND", "RocksDB"),
                ("LEDGER_AWAIT_RECONCILIATION", "1"),
            ]))
            .unwrap();

        assert_eq!(config.node.cluster_size, 7);
        assert_eq!(config.reply_quorum(), 5);
        assert_eq!(config.store.backend, StoreBackend::Rocksdb);
        assert!(config.service().await_reconciliation);
    }

    #[test]
    fn test_bad_env_value_names_variable() {
        let err = NodeConfig::default()
            .merge_env(env(&[("LEDGER_CLUSTER_SIZE", "four")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { var, .. } if var == "LEDGER_CLUSTER_SIZE"));
    }

    #[test]
    fn test_validation_rejects_bad_shapes() {
        let mut config = NodeConfig::default();
        config.node.cluster_size = 0;
        assert!(config.validate().is_err());

        let mut config = NodeConfig::default();
        config.node.cluster_size = 4;
        config.replication.reply_quorum = Some(5);
        assert!(config.validate().is_err());

        let mut config = NodeConfig::default();
        config.replication.submit_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = NodeConfig::default();
        config.security.policy = "none".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_backend_is_parse_error() {
        assert!(matches!(
            NodeConfig::parse("[store]\nbackend = \"postgres\"\n"),
            Err(ConfigError::Parse(_))
        ));
    }
}
