use serde::Deserialize;
use std::net::Ipv4Addr;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub allocation: AllocationConfig,
    pub monitoring: MonitoringConfig,
    pub publishing: PublishingConfig,
    pub rebuild: RebuildConfig,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// One JSON record per pup lives here.
    pub pups_dir: PathBuf,
    /// Live OS configuration directory that patches write into.
    pub config_dir: PathBuf,
    /// Point-in-time copies of `config_dir`, one per applied patch.
    pub snapshot_dir: PathBuf,
    /// Per-pup storage volumes (`<data_dir>/<id>`), measured for the disk metric.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AllocationConfig {
    /// Reserved for the host; the first pup gets the next address.
    #[serde(default = "default_ip_base")]
    pub ip_base: Ipv4Addr,
    /// Highest address that may be handed out.
    #[serde(default = "default_ip_ceiling")]
    pub ip_ceiling: Ipv4Addr,
    #[serde(default = "default_port_start")]
    pub port_start: u16,
}

fn default_ip_base() -> Ipv4Addr {
    Ipv4Addr::new(10, 69, 0, 1)
}

fn default_ip_ceiling() -> Ipv4Addr {
    Ipv4Addr::new(10, 69, 255, 254)
}

fn default_port_start() -> u16 {
    10000
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            ip_base: default_ip_base(),
            ip_ceiling: default_ip_ceiling(),
            port_start: default_port_start(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    pub slow_interval_ms: u64,
    pub fast_interval_ms: u64,
    /// Samples emitted per fast-poll request before falling back to slow cadence.
    #[serde(default = "default_fast_poll_count")]
    pub fast_poll_count: u32,
    /// Points kept per metric buffer.
    pub metric_buffer_size: usize,
    /// How often to log manager stats (pups, subscribers) at INFO level.
    #[serde(default = "default_stats_log_interval_secs")]
    pub stats_log_interval_secs: u64,
}

fn default_fast_poll_count() -> u32 {
    10
}

fn default_stats_log_interval_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishingConfig {
    /// Queue depth per subscriber; a full queue drops the subscriber.
    pub subscriber_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RebuildConfig {
    /// Program and arguments, e.g. ["nixos-rebuild", "switch"].
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub id: String,
    pub path: PathBuf,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            !self.storage.pups_dir.as_os_str().is_empty(),
            "storage.pups_dir must be non-empty"
        );
        anyhow::ensure!(
            !self.storage.config_dir.as_os_str().is_empty(),
            "storage.config_dir must be non-empty"
        );
        anyhow::ensure!(
            !self.storage.snapshot_dir.as_os_str().is_empty(),
            "storage.snapshot_dir must be non-empty"
        );
        anyhow::ensure!(
            !self.storage.snapshot_dir.starts_with(&self.storage.config_dir),
            "storage.snapshot_dir must not be inside storage.config_dir"
        );
        anyhow::ensure!(
            self.allocation.ip_base < self.allocation.ip_ceiling,
            "allocation.ip_base ({}) must be below allocation.ip_ceiling ({})",
            self.allocation.ip_base,
            self.allocation.ip_ceiling
        );
        anyhow::ensure!(
            self.allocation.port_start > 0,
            "allocation.port_start must be > 0"
        );
        anyhow::ensure!(
            self.monitoring.slow_interval_ms > 0,
            "monitoring.slow_interval_ms must be > 0, got {}",
            self.monitoring.slow_interval_ms
        );
        anyhow::ensure!(
            self.monitoring.fast_interval_ms > 0,
            "monitoring.fast_interval_ms must be > 0, got {}",
            self.monitoring.fast_interval_ms
        );
        anyhow::ensure!(
            self.monitoring.metric_buffer_size > 0,
            "monitoring.metric_buffer_size must be > 0, got {}",
            self.monitoring.metric_buffer_size
        );
        anyhow::ensure!(
            self.monitoring.stats_log_interval_secs > 0,
            "monitoring.stats_log_interval_secs must be > 0, got {}",
            self.monitoring.stats_log_interval_secs
        );
        anyhow::ensure!(
            self.publishing.subscriber_capacity > 0,
            "publishing.subscriber_capacity must be > 0, got {}",
            self.publishing.subscriber_capacity
        );
        anyhow::ensure!(
            !self.rebuild.command.is_empty(),
            "rebuild.command must name a program"
        );
        for source in &self.sources {
            anyhow::ensure!(!source.id.is_empty(), "sources[].id must be non-empty");
        }
        Ok(())
    }
}
