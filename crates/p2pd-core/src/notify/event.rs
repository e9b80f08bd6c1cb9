// ── Notification events ──
//
// One variant per engine state transition that observers may care
// about. Events are immutable and emitted only after the mutation that
// produced them has completed.

use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};

use crate::config::Feature;
use crate::model::{MacAddr, NetworkId, WpsProvisionMethod};

/// Which part of the supplicant an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum EventScope {
    /// Interface creation and teardown.
    Lifecycle,
    /// Station-side (infrastructure) state.
    Station,
    /// P2P device and group state.
    P2p,
    /// Stations associating with a local group owner.
    Ap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SupplicantState {
    Disconnected,
    InterfaceDisabled,
    Inactive,
    Scanning,
    Authenticating,
    Associating,
    Associated,
    FourWayHandshake,
    GroupHandshake,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, IntoStaticStr)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    // ── Lifecycle ────────────────────────────────────────────────────
    InterfaceAdded,
    InterfaceRemoved,

    // ── Station ──────────────────────────────────────────────────────
    StateChanged {
        state: SupplicantState,
    },
    DisconnectReason {
        bssid: MacAddr,
        reason: u16,
        #[serde(default)]
        locally_generated: bool,
    },
    AssocReject {
        bssid: MacAddr,
        status: u16,
        #[serde(default)]
        timed_out: bool,
    },
    AuthTimeout {
        bssid: MacAddr,
    },
    BssidChanged {
        bssid: MacAddr,
    },
    NetworkAdded {
        network: NetworkId,
        #[serde(default)]
        p2p_group: bool,
    },
    NetworkRemoved {
        network: NetworkId,
        #[serde(default)]
        p2p_group: bool,
    },
    NetworkSelected {
        network: NetworkId,
    },
    NetworkRequest {
        network: NetworkId,
        field: String,
    },
    ScanDone {
        success: bool,
    },
    BssAdded {
        bss: u32,
        bssid: MacAddr,
    },
    BssRemoved {
        bss: u32,
        bssid: MacAddr,
    },
    FrequencyChanged {
        freq: u32,
    },
    NetworkNotFound {
        ssid: String,
    },
    EapStatus {
        status: String,
        parameter: String,
    },
    EapError {
        code: i32,
    },
    Certification {
        depth: u32,
        subject: String,
    },

    // ── WPS ──────────────────────────────────────────────────────────
    WpsCredential {
        ssid: String,
    },
    WpsFail {
        config_error: u16,
        error_indication: u16,
    },
    WpsSuccess,
    WpsPbcOverlap,

    // ── Interworking / Hotspot 2.0 ───────────────────────────────────
    AnqpQueryDone {
        bssid: MacAddr,
        result: String,
    },
    Hs20IconQueryDone {
        bssid: MacAddr,
        file_name: String,
        size: usize,
    },
    Hs20SubscriptionRemediation {
        bssid: MacAddr,
        url: String,
    },
    Hs20DeauthImminent {
        bssid: MacAddr,
        reason_code: u8,
        reauth_delay: u16,
        url: String,
    },

    // ── DPP ──────────────────────────────────────────────────────────
    DppProgress {
        stage: String,
    },

    // ── Mesh ─────────────────────────────────────────────────────────
    MeshGroupStarted {
        ssid: String,
    },
    MeshGroupRemoved {
        ssid: String,
        reason: String,
    },
    MeshPeerConnected {
        peer: MacAddr,
    },
    MeshPeerDisconnected {
        peer: MacAddr,
        reason: u16,
    },

    // ── NAN ──────────────────────────────────────────────────────────
    NanDiscoveryResult {
        subscribe_id: u8,
        peer_publish_id: u8,
        peer: MacAddr,
    },
    NanReplied {
        publish_id: u8,
        peer_subscribe_id: u8,
        peer: MacAddr,
    },
    NanReceive {
        id: u8,
        peer_id: u8,
        peer: MacAddr,
    },
    NanPublishTerminated {
        publish_id: u8,
        reason: String,
    },
    NanSubscribeTerminated {
        subscribe_id: u8,
        reason: String,
    },

    // ── P2P ──────────────────────────────────────────────────────────
    FindStopped,
    DeviceFound {
        peer: MacAddr,
        #[serde(default)]
        device_name: String,
        /// First sighting of this peer.
        #[serde(default = "default_true")]
        new_peer: bool,
    },
    DeviceLost {
        peer: MacAddr,
    },
    GroupStarted {
        group: String,
        ssid: String,
        go: bool,
        #[serde(default)]
        freq: u32,
        #[serde(default)]
        persistent: bool,
        go_device: MacAddr,
    },
    GroupRemoved {
        group: String,
        go: bool,
        #[serde(default)]
        reason: String,
    },
    GoNegotiationRequest {
        peer: MacAddr,
        passwd_id: u16,
        intent: u8,
    },
    GoNegotiationCompleted {
        status: i32,
    },
    InvitationReceived {
        peer: MacAddr,
        bssid: MacAddr,
        #[serde(default)]
        persistent_network: Option<NetworkId>,
        #[serde(default)]
        freq: u32,
    },
    InvitationResult {
        bssid: MacAddr,
        status: i32,
    },
    ProvisionDiscovery {
        peer: MacAddr,
        request: bool,
        method: WpsProvisionMethod,
        #[serde(default)]
        pin: Option<String>,
    },
    ServiceDiscoveryRequest {
        peer: MacAddr,
        freq: u32,
        dialog_token: u8,
        update_indicator: u16,
    },
    ServiceDiscoveryResponse {
        peer: MacAddr,
        update_indicator: u16,
        #[serde(default)]
        tlvs: crate::model::HexBytes,
    },
    GroupFormationFailure {
        reason: String,
    },
    P2pWpsFailed {
        peer: MacAddr,
        status: u16,
    },
    PersistentGroupAdded {
        network: NetworkId,
    },
    PersistentGroupRemoved {
        network: NetworkId,
    },

    // ── AP (local group owner) ───────────────────────────────────────
    StaAuthorized {
        sta: MacAddr,
        #[serde(default)]
        p2p_device: Option<MacAddr>,
    },
    StaDeauthorized {
        sta: MacAddr,
        #[serde(default)]
        p2p_device: Option<MacAddr>,
    },
}

fn default_true() -> bool {
    true
}

impl Event {
    /// Variant name, used as the signal member on the legacy bus.
    pub fn name(&self) -> &'static str {
        self.into()
    }

    pub fn scope(&self) -> EventScope {
        match self {
            Self::InterfaceAdded | Self::InterfaceRemoved => EventScope::Lifecycle,
            Self::FindStopped
            | Self::DeviceFound { .. }
            | Self::DeviceLost { .. }
            | Self::GroupStarted { .. }
            | Self::GroupRemoved { .. }
            | Self::GoNegotiationRequest { .. }
            | Self::GoNegotiationCompleted { .. }
            | Self::InvitationReceived { .. }
            | Self::InvitationResult { .. }
            | Self::ProvisionDiscovery { .. }
            | Self::ServiceDiscoveryRequest { .. }
            | Self::ServiceDiscoveryResponse { .. }
            | Self::GroupFormationFailure { .. }
            | Self::P2pWpsFailed { .. }
            | Self::PersistentGroupAdded { .. }
            | Self::PersistentGroupRemoved { .. } => EventScope::P2p,
            Self::StaAuthorized { .. } | Self::StaDeauthorized { .. } => EventScope::Ap,
            _ => EventScope::Station,
        }
    }

    /// Optional category gating this event, if any.
    pub fn feature(&self) -> Option<Feature> {
        match self {
            Self::WpsCredential { .. }
            | Self::WpsFail { .. }
            | Self::WpsSuccess
            | Self::WpsPbcOverlap => Some(Feature::Wps),
            Self::AnqpQueryDone { .. } => Some(Feature::Interworking),
            Self::Hs20IconQueryDone { .. }
            | Self::Hs20SubscriptionRemediation { .. }
            | Self::Hs20DeauthImminent { .. } => Some(Feature::Hs20),
            Self::DppProgress { .. } => Some(Feature::Dpp),
            Self::MeshGroupStarted { .. }
            | Self::MeshGroupRemoved { .. }
            | Self::MeshPeerConnected { .. }
            | Self::MeshPeerDisconnected { .. } => Some(Feature::Mesh),
            Self::NanDiscoveryResult { .. }
            | Self::NanReplied { .. }
            | Self::NanReceive { .. }
            | Self::NanPublishTerminated { .. }
            | Self::NanSubscribeTerminated { .. } => Some(Feature::Nan),
            _ => None,
        }
    }
}
