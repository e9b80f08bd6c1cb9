// ── Operation API ──
//
// Every externally invocable P2P interface operation is one `Operation`
// variant. Callers send it, together with the interface handle they
// hold, to the event loop; the loop guards and dispatches it and sends
// a `Reply` back.

pub mod requests;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;
use tokio::sync::oneshot;

use crate::error::StatusError;
use crate::iface::InterfaceHandle;
use crate::join::JoinTicket;
use crate::model::{
    FreqRange, HexBytes, IfaceType, IpAllocation, MacAddr, MiracastMode, NetworkId,
    NetworkSummary, RawAddr, WpsProvisionMethod,
};
#[cfg(feature = "binding")]
use crate::notify::binding::P2pIfaceCallback;

pub use requests::{ConnectRequest, DiscoveryRequest, GroupConfigRequest};

/// A command envelope sent through the command channel.
pub(crate) struct CommandEnvelope {
    pub command: Command,
    pub response_tx: oneshot::Sender<Result<Reply, StatusError>>,
}

pub(crate) enum Command {
    Execute {
        handle: Arc<InterfaceHandle>,
        op: Operation,
    },
    #[cfg(feature = "binding")]
    RegisterCallback {
        handle: Arc<InterfaceHandle>,
        callback: Box<dyn P2pIfaceCallback>,
    },
    /// Round-trip through the loop once all earlier work is done.
    Settle,
}

/// All operations on a P2P interface.
#[derive(Debug, Clone, Serialize, Deserialize, IntoStaticStr)]
#[serde(tag = "op", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Operation {
    // ── Identity & networks ──────────────────────────────────────────
    GetName,
    GetType,
    AddNetwork,
    RemoveNetwork { id: NetworkId },
    GetNetwork { id: NetworkId },
    ListNetworks,
    GetDeviceAddress,
    SetSsidPostfix { postfix: HexBytes },
    SetGroupIdle { group: String, timeout_secs: u32 },
    SetPowerSave { group: String, enable: bool },
    SaveConfig,

    // ── Discovery ────────────────────────────────────────────────────
    Find {
        #[serde(default)]
        timeout_secs: u32,
    },
    FindWithParams(DiscoveryRequest),
    StopFind,
    Flush,
    #[serde(alias = "configure_ext_listen_with_params")]
    ConfigureExtListen { period_ms: u32, interval_ms: u32 },
    SetListenChannel { channel: u32, operating_class: u32 },
    SetDisallowedFrequencies { ranges: Vec<FreqRange> },

    // ── Connection & groups ──────────────────────────────────────────
    #[serde(alias = "connect_with_params")]
    Connect(ConnectRequest),
    CancelConnect,
    ProvisionDiscovery { peer: RawAddr, method: WpsProvisionMethod },
    Reject { peer: RawAddr },
    Invite {
        group: String,
        go_device: RawAddr,
        peer: RawAddr,
    },
    Reinvoke { network: NetworkId, peer: RawAddr },
    #[serde(alias = "create_group_owner")]
    AddGroup {
        #[serde(default)]
        persistent: bool,
        #[serde(default, alias = "persistent_network_id")]
        network: Option<NetworkId>,
    },
    #[serde(alias = "add_group_with_config_params")]
    AddGroupWithConfig(GroupConfigRequest),
    RemoveGroup { group: String },
    RemoveClient {
        peer: RawAddr,
        #[serde(default)]
        legacy: bool,
    },
    GetSsid { peer: RawAddr },
    GetGroupCapability { peer: RawAddr },

    // ── Service discovery ────────────────────────────────────────────
    AddBonjourService { query: HexBytes, response: HexBytes },
    RemoveBonjourService { query: HexBytes },
    AddUpnpService { version: u32, name: String },
    RemoveUpnpService { version: u32, name: String },
    FlushServices,
    RequestServiceDiscovery {
        #[serde(default)]
        peer: RawAddr,
        query: HexBytes,
    },
    CancelServiceDiscovery { id: u64 },

    // ── WPS ──────────────────────────────────────────────────────────
    StartWpsPbc {
        group: String,
        #[serde(default)]
        bssid: Option<RawAddr>,
    },
    StartWpsPinKeypad { group: String, pin: String },
    StartWpsPinDisplay {
        group: String,
        #[serde(default)]
        bssid: Option<RawAddr>,
    },
    CancelWps { group: String },
    SetWpsDeviceName { name: String },
    SetWpsDeviceType { device_type: HexBytes },
    SetWpsManufacturer { manufacturer: String },
    SetWpsModelName { model_name: String },
    SetWpsModelNumber { model_number: String },
    SetWpsSerialNumber { serial_number: String },
    SetWpsConfigMethods { methods: u16 },

    // ── Wi-Fi Display ────────────────────────────────────────────────
    EnableWfd { enable: bool },
    SetWfdDeviceInfo { info: HexBytes },
    SetWfdR2DeviceInfo { info: HexBytes },
    SetMiracastMode { mode: MiracastMode },

    // ── NFC ──────────────────────────────────────────────────────────
    CreateNfcHandoverRequest,
    CreateNfcHandoverSelect,
    ReportNfcHandoverResponse { request: HexBytes },
    ReportNfcHandoverInitiation { select: HexBytes },

    // ── Misc ─────────────────────────────────────────────────────────
    SetVendorElements { mask: u32, elements: HexBytes },
    ConfigureEapolIpAllocation(IpAllocation),
    SetMacRandomization { enable: bool },
    SetEdmg { enable: bool },
    GetEdmg,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        self.into()
    }
}

/// Successful result of an operation.
#[derive(Debug, Serialize)]
#[serde(tag = "reply", content = "value", rename_all = "snake_case")]
pub enum Reply {
    Ok,
    Name(String),
    Type(IfaceType),
    NetworkId(NetworkId),
    Network(NetworkSummary),
    Networks(Vec<NetworkId>),
    Address(MacAddr),
    /// Eight-digit WPS PIN, or empty when none was generated.
    Pin(String),
    Bytes(HexBytes),
    Ssid(HexBytes),
    GroupCapability(u8),
    RequestId(u64),
    Edmg(bool),
    /// The join is pending; the ticket resolves once it concludes.
    JoinScheduled(JoinTicket),
}

impl Reply {
    /// Take the join ticket out of a `JoinScheduled` reply.
    pub fn into_ticket(self) -> Option<JoinTicket> {
        match self {
            Self::JoinScheduled(ticket) => Some(ticket),
            _ => None,
        }
    }
}
