// ── Typed request payloads for operations ──

use serde::{Deserialize, Serialize};

use crate::model::{RawAddr, WpsProvisionMethod};

/// Negotiate a connection with a peer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct ConnectRequest {
    pub peer: RawAddr,
    pub method: WpsProvisionMethod,
    /// Empty lets the engine generate one when `method` is `display`.
    #[serde(default)]
    pub pin: String,
    #[serde(default)]
    pub join_existing_group: bool,
    #[serde(default)]
    pub persistent: bool,
    #[serde(default)]
    pub go_intent: u32,
}

/// Start a group owner, or join an existing group, with explicit
/// credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupConfigRequest {
    /// Raw SSID bytes. Scenario files usually give text; see
    /// `ssid_text`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ssid: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssid_text: Option<String>,
    pub passphrase: String,
    #[serde(default)]
    pub persistent: bool,
    #[serde(default)]
    pub freq: u32,
    /// Group owner to join; `02:00:00:00:00:00` means any. Any other
    /// address, all-zero included, is used as a BSSID filter.
    #[serde(default)]
    pub peer: RawAddr,
    #[serde(default)]
    pub join_existing_group: bool,
}

impl GroupConfigRequest {
    pub fn ssid_bytes(&self) -> Vec<u8> {
        match &self.ssid_text {
            Some(text) => text.as_bytes().to_vec(),
            None => self.ssid.clone(),
        }
    }
}

/// Start discovery with an explicit scan type.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DiscoveryRequest {
    #[serde(default)]
    pub scan: crate::model::ScanType,
    #[serde(default)]
    pub timeout_secs: u32,
}
