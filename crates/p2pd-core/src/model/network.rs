// ── Network profiles and interface descriptors ──

use std::fmt;

use serde::{Deserialize, Serialize};

use super::credentials::{Passphrase, Ssid};
use super::addr::MacAddr;

// ── NetworkId ───────────────────────────────────────────────────────

/// Engine-assigned network profile identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NetworkId(pub i32);

impl NetworkId {
    /// "No such network", as reported by lookups that found nothing.
    pub const INVALID: Self = Self(-1);
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Profiles ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkKind {
    /// Ordinary infrastructure network.
    Station,
    /// Stored P2P group that can be re-instantiated.
    PersistentGroup,
    /// Short-lived P2P client profile used only to carry join parameters.
    TemporaryGroup,
}

impl NetworkKind {
    pub fn is_p2p_group(self) -> bool {
        !matches!(self, Self::Station)
    }
}

/// A profile to be created in the engine's network table.
#[derive(Debug, Clone)]
pub struct NewNetwork {
    pub kind: NetworkKind,
    pub ssid: Option<Ssid>,
    pub passphrase: Option<Passphrase>,
    pub bssid: Option<MacAddr>,
}

impl NewNetwork {
    pub fn blank() -> Self {
        Self {
            kind: NetworkKind::Station,
            ssid: None,
            passphrase: None,
            bssid: None,
        }
    }

    pub fn temporary_group(ssid: Ssid, passphrase: Passphrase, bssid: Option<MacAddr>) -> Self {
        Self {
            kind: NetworkKind::TemporaryGroup,
            ssid: Some(ssid),
            passphrase: Some(passphrase),
            bssid,
        }
    }
}

/// A profile as stored by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkProfile {
    pub id: NetworkId,
    pub kind: NetworkKind,
    pub ssid: Option<Ssid>,
    pub bssid: Option<MacAddr>,
}

/// Serializable view of a profile for replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkSummary {
    pub id: NetworkId,
    pub kind: NetworkKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bssid: Option<MacAddr>,
}

impl From<&NetworkProfile> for NetworkSummary {
    fn from(p: &NetworkProfile) -> Self {
        Self {
            id: p.id,
            kind: p.kind,
            ssid: p.ssid.as_ref().map(Ssid::to_text),
            bssid: p.bssid,
        }
    }
}

// ── Interfaces ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IfaceType {
    Sta,
    P2p,
}

/// Runtime state of an interface as seen by dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IfaceStatus {
    /// The network interface itself is administratively disabled.
    pub interface_disabled: bool,
    /// The P2P subsystem is unavailable or turned off.
    pub p2p_disabled: bool,
}

/// Identity of an interface as announced by the engine.
///
/// `parent` names the interface this one was derived from: the P2P
/// device for a group interface, the station interface for a
/// management-only P2P device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IfaceContext {
    pub name: String,
    #[serde(default)]
    pub management_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl IfaceContext {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            management_only: false,
            parent: None,
        }
    }

    pub fn management(name: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            management_only: true,
            parent: Some(parent.into()),
        }
    }

    pub fn group(name: impl Into<String>, p2p_device: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            management_only: false,
            parent: Some(p2p_device.into()),
        }
    }

    /// Interface whose P2P callbacks represent this interface's P2P
    /// activity: the owning P2P device for group interfaces, else itself.
    pub fn p2p_owner(&self) -> &str {
        match (&self.parent, self.management_only) {
            (Some(parent), false) => parent,
            _ => &self.name,
        }
    }

    /// Interface whose bus object carries this interface's signals.
    /// Management-only interfaces have no object of their own.
    pub fn bus_owner(&self) -> Option<&str> {
        if self.management_only {
            self.parent.as_deref()
        } else {
            Some(&self.name)
        }
    }
}
