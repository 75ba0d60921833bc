use pending_query_actor::DuplicatePolicy;
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_PREFIX: &str = "FORWARDER";

/// Reads the file at `config_path`, then lets `FORWARDER__SECTION__KEY`
/// environment variables override single values.
pub fn get_config<'de, T: Deserialize<'de>>(config_path: PathBuf) -> Result<T, config::ConfigError> {
    let f = config::File::from(config_path);
    let env = config::Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true);

    let config = config::Config::builder()
        .add_source(f)
        .add_source(env)
        .build()?;
    config.try_deserialize::<T>()
}

#[derive(Debug, Deserialize)]
pub struct ForwarderConfiguration {
    pub server: ServerConfiguration,
    pub upstream: UpstreamConfiguration,
    #[serde(default)]
    pub cache: CacheConfiguration,
    #[serde(default)]
    pub pending: PendingConfiguration,
    #[serde(default)]
    pub transport: TransportConfiguration,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfiguration {
    ip_address: IpAddr,
    port: u16,
}

impl ServerConfiguration {
    pub fn bind_address(&self) -> SocketAddr {
        SocketAddr::new(self.ip_address, self.port)
    }
}

#[derive(Debug, Deserialize)]
pub struct UpstreamConfiguration {
    pub server_address: SocketAddr,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CacheConfiguration {
    pub storage_path: PathBuf,
    /// TTL, in seconds, of answers built from the cache.
    pub answer_ttl: u32,
    pub forwarding_only: bool,
}

impl Default for CacheConfiguration {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from("./records.txt"),
            answer_ttl: 60,
            forwarding_only: false,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PendingConfiguration {
    timeout_ms: u64,
    sweep_interval_ms: u64,
    pub duplicate_policy: DuplicatePolicy,
}

impl PendingConfiguration {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        // tokio intervals panic on a zero period
        Duration::from_millis(self.sweep_interval_ms.max(1))
    }
}

impl Default for PendingConfiguration {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            sweep_interval_ms: 1_000,
            duplicate_policy: DuplicatePolicy::Replace,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TransportConfiguration {
    pub max_datagram_size: usize,
}

impl Default for TransportConfiguration {
    fn default() -> Self {
        Self {
            max_datagram_size: 4096,
        }
    }
}
