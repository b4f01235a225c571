//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/parking.toml

use anyhow::{ensure, Context};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config/parking.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Site identifier, shown in logs
    #[serde(default = "default_site_id")]
    pub id: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self { id: default_site_id() }
    }
}

fn default_site_id() -> String {
    "parking".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// Base URL, optionally with embedded `user:pass@` for Basic auth
    #[serde(default = "default_registry_base_url")]
    pub base_url: String,
    /// Budget for each registry call
    #[serde(default = "default_registry_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { base_url: default_registry_base_url(), timeout_ms: default_registry_timeout_ms() }
    }
}

fn default_registry_base_url() -> String {
    "http://192.168.18.214:8000".to_string()
}

fn default_registry_timeout_ms() -> u64 {
    2500
}

#[derive(Debug, Clone, Deserialize)]
pub struct OccupancyConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_cycle_interval_ms")]
    pub cycle_interval_ms: u64,
    #[serde(default = "default_echo_timeout_ms")]
    pub echo_timeout_ms: u64,
}

impl Default for OccupancyConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            cycle_interval_ms: default_cycle_interval_ms(),
            echo_timeout_ms: default_echo_timeout_ms(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_cycle_interval_ms() -> u64 {
    100
}

fn default_echo_timeout_ms() -> u64 {
    40
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpaceConfig {
    /// Distances strictly below this read as occupied
    pub threshold_cm: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BarrierConfig {
    #[serde(default = "default_open_angle")]
    pub open_angle: u16,
    #[serde(default)]
    pub closed_angle: u16,
    #[serde(default = "default_transition_delay_ms")]
    pub transition_delay_ms: u64,
    #[serde(default = "default_barrier_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for BarrierConfig {
    fn default() -> Self {
        Self {
            open_angle: default_open_angle(),
            closed_angle: 0,
            transition_delay_ms: default_transition_delay_ms(),
            poll_interval_ms: default_barrier_poll_interval_ms(),
        }
    }
}

fn default_open_angle() -> u16 {
    90
}

fn default_transition_delay_ms() -> u64 {
    10_000
}

fn default_barrier_poll_interval_ms() -> u64 {
    100
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccessLogConfig {
    #[serde(default = "default_access_log_file")]
    pub file: String,
}

impl Default for AccessLogConfig {
    fn default() -> Self {
        Self { file: default_access_log_file() }
    }
}

fn default_access_log_file() -> String {
    "access_log.txt".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    /// Characters per line used for centering
    #[serde(default = "default_display_width")]
    pub width: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { width: default_display_width() }
    }
}

fn default_display_width() -> usize {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimConfig {
    #[serde(default = "default_sim_listener_enabled")]
    pub listener_enabled: bool,
    #[serde(default = "default_sim_listener_port")]
    pub listener_port: u16,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            listener_enabled: default_sim_listener_enabled(),
            listener_port: default_sim_listener_port(),
        }
    }
}

fn default_sim_listener_enabled() -> bool {
    true
}

fn default_sim_listener_port() -> u16 {
    25900
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_interval_secs")]
    pub interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval_secs() }
    }
}

fn default_metrics_interval_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub occupancy: OccupancyConfig,
    pub spaces: Vec<SpaceConfig>,
    #[serde(default)]
    pub barrier: BarrierConfig,
    #[serde(default)]
    pub access_log: AccessLogConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub sim: SimConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    site_id: String,
    registry_base_url: String,
    registry_timeout_ms: u64,
    debounce_ms: u64,
    cycle_interval_ms: u64,
    echo_timeout_ms: u64,
    space_thresholds_cm: Vec<f32>,
    open_angle: u16,
    closed_angle: u16,
    transition_delay_ms: u64,
    barrier_poll_interval_ms: u64,
    access_log_file: String,
    display_width: usize,
    sim_listener_enabled: bool,
    sim_listener_port: u16,
    metrics_interval_secs: u64,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site_id: default_site_id(),
            registry_base_url: default_registry_base_url(),
            registry_timeout_ms: default_registry_timeout_ms(),
            debounce_ms: default_debounce_ms(),
            cycle_interval_ms: default_cycle_interval_ms(),
            echo_timeout_ms: default_echo_timeout_ms(),
            space_thresholds_cm: vec![16.92, 18.54],
            open_angle: default_open_angle(),
            closed_angle: 0,
            transition_delay_ms: default_transition_delay_ms(),
            barrier_poll_interval_ms: default_barrier_poll_interval_ms(),
            access_log_file: default_access_log_file(),
            display_width: default_display_width(),
            sim_listener_enabled: default_sim_listener_enabled(),
            sim_listener_port: default_sim_listener_port(),
            metrics_interval_secs: default_metrics_interval_secs(),
            config_file: "default".to_string(),
        }
    }
}

impl Config {
    /// Determine config file path from args or environment
    pub fn resolve_config_path(args: &[String]) -> String {
        for (i, arg) in args.iter().enumerate() {
            if arg == "--config" {
                if let Some(path) = args.get(i + 1) {
                    return path.clone();
                }
            }
            if let Some(path) = arg.strip_prefix("--config=") {
                return path.to_string();
            }
        }

        if let Ok(path) = env::var("CONFIG_FILE") {
            return path;
        }

        DEFAULT_CONFIG_PATH.to_string()
    }

    /// Load and validate configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        ensure!(!toml_config.spaces.is_empty(), "{}: at least one space is required", path.display());
        for (i, space) in toml_config.spaces.iter().enumerate() {
            ensure!(
                space.threshold_cm.is_finite() && space.threshold_cm > 0.0,
                "{}: space {} threshold_cm must be positive, got {}",
                path.display(),
                i + 1,
                space.threshold_cm
            );
        }
        ensure!(toml_config.occupancy.cycle_interval_ms > 0, "occupancy.cycle_interval_ms must be > 0");
        ensure!(toml_config.occupancy.echo_timeout_ms > 0, "occupancy.echo_timeout_ms must be > 0");
        ensure!(toml_config.barrier.poll_interval_ms > 0, "barrier.poll_interval_ms must be > 0");
        ensure!(toml_config.registry.timeout_ms > 0, "registry.timeout_ms must be > 0");
        ensure!(toml_config.metrics.interval_secs > 0, "metrics.interval_secs must be > 0");

        Ok(Self {
            site_id: toml_config.site.id,
            registry_base_url: toml_config.registry.base_url,
            registry_timeout_ms: toml_config.registry.timeout_ms,
            debounce_ms: toml_config.occupancy.debounce_ms,
            cycle_interval_ms: toml_config.occupancy.cycle_interval_ms,
            echo_timeout_ms: toml_config.occupancy.echo_timeout_ms,
            space_thresholds_cm: toml_config.spaces.iter().map(|s| s.threshold_cm).collect(),
            open_angle: toml_config.barrier.open_angle,
            closed_angle: toml_config.barrier.closed_angle,
            transition_delay_ms: toml_config.barrier.transition_delay_ms,
            barrier_poll_interval_ms: toml_config.barrier.poll_interval_ms,
            access_log_file: toml_config.access_log.file,
            display_width: toml_config.display.width,
            sim_listener_enabled: toml_config.sim.listener_enabled,
            sim_listener_port: toml_config.sim.listener_port,
            metrics_interval_secs: toml_config.metrics.interval_secs,
            config_file: path.display().to_string(),
        })
    }

    /// Load from an explicit path, falling back to defaults on any error
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {:#}. Using defaults.", e);
                Self::default()
            }
        }
    }

    /// Load configuration - tries TOML file first, falls back to defaults
    pub fn load(args: &[String]) -> Self {
        Self::load_from_path(Self::resolve_config_path(args))
    }

    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    pub fn registry_base_url(&self) -> &str {
        &self.registry_base_url
    }

    pub fn registry_timeout(&self) -> Duration {
        Duration::from_millis(self.registry_timeout_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn cycle_interval(&self) -> Duration {
        Duration::from_millis(self.cycle_interval_ms)
    }

    pub fn echo_timeout(&self) -> Duration {
        Duration::from_millis(self.echo_timeout_ms)
    }

    /// Occupancy thresholds in space order
    pub fn space_thresholds_cm(&self) -> &[f32] {
        &self.space_thresholds_cm
    }

    pub fn space_count(&self) -> usize {
        self.space_thresholds_cm.len()
    }

    pub fn open_angle(&self) -> u16 {
        self.open_angle
    }

    pub fn closed_angle(&self) -> u16 {
        self.closed_angle
    }

    pub fn transition_delay(&self) -> Duration {
        Duration::from_millis(self.transition_delay_ms)
    }

    pub fn barrier_poll_interval(&self) -> Duration {
        Duration::from_millis(self.barrier_poll_interval_ms)
    }

    pub fn access_log_file(&self) -> &str {
        &self.access_log_file
    }

    pub fn display_width(&self) -> usize {
        self.display_width
    }

    pub fn sim_listener_enabled(&self) -> bool {
        self.sim_listener_enabled
    }

    pub fn sim_listener_port(&self) -> u16 {
        self.sim_listener_port
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }
}
