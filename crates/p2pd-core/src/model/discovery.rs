// ── Discovery, scanning, and service types ──

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use super::addr::MacAddr;
use super::credentials::Ssid;

/// Which channels a find operation covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScanType {
    #[default]
    Full,
    Social,
    SpecificFreq { freq_mhz: u32 },
}

/// Inclusive frequency range in MHz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreqRange {
    pub min: u32,
    pub max: u32,
}

/// Engine-owned radio reservation, released when the work concludes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RadioWorkId(pub u64);

/// One BSS observed in a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanEntry {
    pub bssid: MacAddr,
    pub ssid: String,
    #[serde(default)]
    pub freq: u32,
}

impl ScanEntry {
    pub fn matches(&self, ssid: &Ssid, bssid: Option<MacAddr>) -> bool {
        self.ssid.as_bytes() == ssid.as_bytes() && bssid.is_none_or(|b| b == self.bssid)
    }
}

/// What a join scan is looking for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinTarget {
    pub ssid: Ssid,
    /// `None` when the group owner address is the wildcard.
    pub bssid: Option<MacAddr>,
    pub freq: u32,
}

/// A local P2P service advertisement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceRecord {
    Bonjour { query: Vec<u8>, response: Vec<u8> },
    Upnp { version: u32, name: String },
}

impl ServiceRecord {
    /// Two records describe the same service.
    pub fn same_service(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bonjour { query: a, .. }, Self::Bonjour { query: b, .. }) => a == b,
            (
                Self::Upnp {
                    version: va,
                    name: na,
                },
                Self::Upnp {
                    version: vb,
                    name: nb,
                },
            ) => va == vb && na == nb,
            _ => false,
        }
    }
}

/// Addresses handed out to P2P clients during the EAPOL 4-way handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpAllocation {
    pub go: Ipv4Addr,
    pub mask: Ipv4Addr,
    pub start: Ipv4Addr,
    pub end: Ipv4Addr,
}
