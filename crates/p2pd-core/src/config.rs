// ── Runtime supervisor configuration ──
//
// In-memory settings handed to the `Supervisor`. The core never reads
// files; `p2pd-config` builds one of these from TOML and environment.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoEnumIterator};

pub const DEFAULT_COMMAND_CHANNEL_SIZE: usize = 64;
pub const DEFAULT_SIGNAL_CHANNEL_SIZE: usize = 256;
/// How many times the engine may retry a group join before giving up.
pub const DEFAULT_JOIN_LIMIT: u32 = 3;

// ── Features ────────────────────────────────────────────────────────

/// Optional event categories, each behind a Cargo feature of this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Feature {
    Wps,
    Interworking,
    Hs20,
    Dpp,
    Mesh,
    Nan,
}

/// Set of enabled event categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeatureSet(u8);

impl FeatureSet {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn all() -> Self {
        Feature::iter().collect()
    }

    /// Categories compiled into this build.
    pub fn compiled() -> Self {
        Feature::iter().filter(|f| Self::is_compiled(*f)).collect()
    }

    fn is_compiled(feature: Feature) -> bool {
        match feature {
            Feature::Wps => cfg!(feature = "wps"),
            Feature::Interworking => cfg!(feature = "interworking"),
            Feature::Hs20 => cfg!(feature = "hs20"),
            Feature::Dpp => cfg!(feature = "dpp"),
            Feature::Mesh => cfg!(feature = "mesh"),
            Feature::Nan => cfg!(feature = "nan"),
        }
    }

    fn bit(feature: Feature) -> u8 {
        Feature::iter()
            .position(|f| f == feature)
            .map_or(0, |idx| 1u8 << idx)
    }

    pub fn contains(self, feature: Feature) -> bool {
        self.0 & Self::bit(feature) != 0
    }

    pub fn with(self, feature: Feature) -> Self {
        Self(self.0 | Self::bit(feature))
    }

    pub fn without(self, feature: Feature) -> Self {
        Self(self.0 & !Self::bit(feature))
    }

    pub fn iter(self) -> impl Iterator<Item = Feature> {
        Feature::iter().filter(move |f| self.contains(*f))
    }
}

impl FromIterator<Feature> for FeatureSet {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), Self::with)
    }
}

// ── Settings ────────────────────────────────────────────────────────

/// Group-owner capabilities applied when starting or joining groups.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct P2pSettings {
    pub go_ht40: bool,
    pub go_vht: bool,
    pub go_he: bool,
    pub allow_6ghz: bool,
    pub join_limit: u32,
}

impl Default for P2pSettings {
    fn default() -> Self {
        Self {
            go_ht40: false,
            go_vht: false,
            go_he: false,
            allow_6ghz: false,
            join_limit: DEFAULT_JOIN_LIMIT,
        }
    }
}

/// Which notification observers are switched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserverSettings {
    pub legacy_bus: bool,
    pub binding: bool,
}

impl Default for ObserverSettings {
    fn default() -> Self {
        Self {
            legacy_bus: true,
            binding: true,
        }
    }
}

/// Configuration for one `Supervisor`.
///
/// Built by the CLI or an embedding daemon and passed in; the core
/// never reads configuration files.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub command_channel_size: usize,
    pub signal_channel_size: usize,
    pub p2p: P2pSettings,
    pub observers: ObserverSettings,
    pub features: FeatureSet,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            command_channel_size: DEFAULT_COMMAND_CHANNEL_SIZE,
            signal_channel_size: DEFAULT_SIGNAL_CHANNEL_SIZE,
            p2p: P2pSettings::default(),
            observers: ObserverSettings::default(),
            features: FeatureSet::compiled(),
        }
    }
}
