//! Shared configuration for the `p2pd` tools.
//!
//! TOML file plus `P2PD_`-prefixed environment, layered with figment, and
//! translation into `p2pd_core::SupervisorConfig`. The core crate never
//! touches the filesystem; everything disk-related lives here.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use p2pd_core::config::{DEFAULT_COMMAND_CHANNEL_SIZE, DEFAULT_JOIN_LIMIT, DEFAULT_SIGNAL_CHANNEL_SIZE};
use p2pd_core::{Feature, FeatureSet, ObserverSettings, P2pSettings, SupervisorConfig};

/// Largest join retry limit accepted from configuration.
pub const MAX_JOIN_LIMIT: u32 = 10;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub daemon: Daemon,

    #[serde(default)]
    pub p2p: P2p,

    #[serde(default)]
    pub observers: Observers,

    #[serde(default)]
    pub features: Features,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    /// table, json, json-compact, yaml, or plain.
    #[serde(default = "default_output")]
    pub output: String,

    /// auto, always, or never.
    #[serde(default = "default_color")]
    pub color: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Daemon {
    #[serde(default = "default_command_channel_size")]
    pub command_channel_size: usize,

    #[serde(default = "default_signal_channel_size")]
    pub signal_channel_size: usize,
}

impl Default for Daemon {
    fn default() -> Self {
        Self {
            command_channel_size: default_command_channel_size(),
            signal_channel_size: default_signal_channel_size(),
        }
    }
}

fn default_command_channel_size() -> usize {
    DEFAULT_COMMAND_CHANNEL_SIZE
}
fn default_signal_channel_size() -> usize {
    DEFAULT_SIGNAL_CHANNEL_SIZE
}

/// Group-owner capabilities and join behavior.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct P2p {
    #[serde(default)]
    pub go_ht40: bool,

    #[serde(default)]
    pub go_vht: bool,

    #[serde(default)]
    pub go_he: bool,

    #[serde(default)]
    pub allow_6ghz: bool,

    #[serde(default = "default_join_limit")]
    pub join_limit: u32,
}

impl Default for P2p {
    fn default() -> Self {
        Self {
            go_ht40: false,
            go_vht: false,
            go_he: false,
            allow_6ghz: false,
            join_limit: default_join_limit(),
        }
    }
}

fn default_join_limit() -> u32 {
    DEFAULT_JOIN_LIMIT
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Observers {
    #[serde(default = "default_true")]
    pub legacy_bus: bool,

    #[serde(default = "default_true")]
    pub binding: bool,
}

impl Default for Observers {
    fn default() -> Self {
        Self {
            legacy_bus: true,
            binding: true,
        }
    }
}

/// Runtime switches for event categories. A category compiled out of
/// `p2pd-core` stays off regardless.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct Features {
    #[serde(default = "default_true")]
    pub wps: bool,
    #[serde(default = "default_true")]
    pub interworking: bool,
    #[serde(default = "default_true")]
    pub hs20: bool,
    #[serde(default = "default_true")]
    pub dpp: bool,
    #[serde(default = "default_true")]
    pub mesh: bool,
    #[serde(default = "default_true")]
    pub nan: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            wps: true,
            interworking: true,
            hs20: true,
            dpp: true,
            mesh: true,
            nan: true,
        }
    }
}

impl Features {
    fn enabled(&self, feature: Feature) -> bool {
        match feature {
            Feature::Wps => self.wps,
            Feature::Interworking => self.interworking,
            Feature::Hs20 => self.hs20,
            Feature::Dpp => self.dpp,
            Feature::Mesh => self.mesh,
            Feature::Nan => self.nan,
        }
    }
}

fn default_true() -> bool {
    true
}

// ── Translation ─────────────────────────────────────────────────────

impl Config {
    /// Validate and build the in-memory supervisor configuration.
    pub fn to_supervisor_config(&self) -> Result<SupervisorConfig, ConfigError> {
        if self.daemon.command_channel_size == 0 {
            return Err(ConfigError::Validation {
                field: "daemon.command_channel_size".into(),
                reason: "must be greater than zero".into(),
            });
        }
        if self.daemon.signal_channel_size == 0 {
            return Err(ConfigError::Validation {
                field: "daemon.signal_channel_size".into(),
                reason: "must be greater than zero".into(),
            });
        }
        if !(1..=MAX_JOIN_LIMIT).contains(&self.p2p.join_limit) {
            return Err(ConfigError::Validation {
                field: "p2p.join_limit".into(),
                reason: format!(
                    "expected 1..={MAX_JOIN_LIMIT}, got {}",
                    self.p2p.join_limit
                ),
            });
        }

        let features = FeatureSet::compiled()
            .iter()
            .filter(|f| self.features.enabled(*f))
            .collect();

        Ok(SupervisorConfig {
            command_channel_size: self.daemon.command_channel_size,
            signal_channel_size: self.daemon.signal_channel_size,
            p2p: P2pSettings {
                go_ht40: self.p2p.go_ht40,
                go_vht: self.p2p.go_vht,
                go_he: self.p2p.go_he,
                allow_6ghz: self.p2p.allow_6ghz,
                join_limit: self.p2p.join_limit,
            },
            observers: ObserverSettings {
                legacy_bus: self.observers.legacy_bus,
                binding: self.observers.binding,
            },
            features,
        })
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "p2pd", "p2pd").map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("p2pd");
    p
}

// ── Config loading ──────────────────────────────────────────────────

fn figment_for(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("P2PD_").split("__"))
}

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file. A missing file just yields defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = figment_for(path).extract()?;
    Ok(config)
}

/// Load config, returning a default if anything goes wrong.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}
