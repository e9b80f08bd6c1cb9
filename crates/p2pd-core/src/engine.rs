// ── Supplicant engine seam ──
//
// The P2P state machines, WPS, service discovery, and radio control all
// live behind `P2pEngine`. The supervisor owns exactly one engine and
// only ever touches it from its event-loop task.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::Notify;

use crate::config::P2pSettings;
use crate::error::EngineError;
use crate::model::{
    DeviceInfo, FrameType, FreqRange, IfaceContext, IfaceStatus, IpAllocation, JoinTarget,
    MacAddr, NetworkId, NetworkProfile, NewNetwork, Passphrase, RadioWorkId, ScanEntry, ScanType,
    ServiceRecord, Ssid, WpsProvisionMethod,
};
use crate::notify::Event;

// ── Engine events ───────────────────────────────────────────────────

/// Something the engine reports back to the event loop.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    InterfaceAdded { iface: IfaceContext },
    InterfaceRemoved { iface: String },
    /// Results of a scan previously started with `start_join_scan`.
    ScanResults {
        iface: String,
        work: RadioWorkId,
        results: Vec<ScanEntry>,
    },
    Notification { iface: String, event: Event },
}

// ── Parameter bundles ───────────────────────────────────────────────

/// Channel-width capabilities for a group we start or join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct GroupParams {
    pub ht40: bool,
    pub vht: bool,
    pub he: bool,
    pub edmg: bool,
    pub allow_6ghz: bool,
}

impl GroupParams {
    pub fn from_settings(settings: &P2pSettings, edmg: bool) -> Self {
        Self {
            ht40: settings.go_ht40 || settings.go_vht,
            vht: settings.go_vht,
            he: settings.go_he,
            edmg,
            allow_6ghz: settings.allow_6ghz,
        }
    }
}

/// Join an existing group using a prepared client profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupJoin {
    pub network: NetworkId,
    pub target: JoinTarget,
    pub join_limit: u32,
    pub params: GroupParams,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectParams {
    pub peer: MacAddr,
    pub method: WpsProvisionMethod,
    pub pin: Option<String>,
    pub join_existing_group: bool,
    pub persistent: bool,
    /// `None` lets the engine pick (always the case when joining).
    pub go_intent: Option<u8>,
    pub params: GroupParams,
}

// ── P2pEngine ───────────────────────────────────────────────────────

/// Operations the binding layer needs from the supplicant core.
///
/// Methods are synchronous: anything slow (scans, negotiation) is
/// started here and reported later through `drain_events`.
pub trait P2pEngine: Send + 'static {
    // ── Event plumbing ───────────────────────────────────────────────

    /// Signalled whenever new events are queued.
    fn events_ready(&self) -> Arc<Notify>;
    fn drain_events(&mut self) -> Vec<EngineEvent>;

    // ── Interfaces ───────────────────────────────────────────────────

    fn interface_exists(&self, iface: &str) -> bool;
    fn interface_status(&self, iface: &str) -> Option<IfaceStatus>;
    fn device_address(&self, iface: &str) -> Result<MacAddr, EngineError>;
    fn group_exists(&self, group: &str) -> bool;

    // ── Networks ─────────────────────────────────────────────────────

    fn add_network(&mut self, iface: &str, profile: NewNetwork) -> Result<NetworkId, EngineError>;
    fn remove_network(&mut self, iface: &str, id: NetworkId) -> Result<(), EngineError>;
    fn network(&self, iface: &str, id: NetworkId) -> Option<NetworkProfile>;
    fn network_ids(&self, iface: &str) -> Vec<NetworkId>;
    fn save_config(&mut self, iface: &str) -> Result<(), EngineError>;
    fn set_ssid_postfix(&mut self, iface: &str, postfix: &[u8]) -> Result<(), EngineError>;
    fn set_group_idle(&mut self, group: &str, timeout_secs: u32) -> Result<(), EngineError>;
    fn set_power_save(&mut self, group: &str, enable: bool) -> Result<(), EngineError>;

    // ── Discovery ────────────────────────────────────────────────────

    fn find(&mut self, iface: &str, scan: ScanType, timeout_secs: u32) -> Result<(), EngineError>;
    fn stop_find(&mut self, iface: &str);
    fn flush(&mut self, iface: &str);
    fn configure_ext_listen(
        &mut self,
        iface: &str,
        period_ms: u32,
        interval_ms: u32,
    ) -> Result<(), EngineError>;
    fn set_listen_channel(
        &mut self,
        iface: &str,
        channel: u32,
        operating_class: u32,
    ) -> Result<(), EngineError>;
    fn set_disallowed_frequencies(
        &mut self,
        iface: &str,
        ranges: &[FreqRange],
    ) -> Result<(), EngineError>;

    // ── Group join ───────────────────────────────────────────────────

    /// Reserve the radio and scan for `target`. Results arrive as
    /// `EngineEvent::ScanResults` tagged with the returned work id.
    fn start_join_scan(
        &mut self,
        iface: &str,
        target: &JoinTarget,
    ) -> Result<RadioWorkId, EngineError>;
    fn release_radio_work(&mut self, iface: &str, work: RadioWorkId);
    fn join_group(
        &mut self,
        iface: &str,
        join: &GroupJoin,
        results: &[ScanEntry],
    ) -> Result<(), EngineError>;

    // ── Connection & groups ──────────────────────────────────────────

    /// Returns the PIN the engine generated, if it generated one.
    fn connect(&mut self, iface: &str, params: &ConnectParams) -> Result<Option<u32>, EngineError>;
    fn cancel_connect(&mut self, iface: &str) -> Result<(), EngineError>;
    fn provision_discovery(
        &mut self,
        iface: &str,
        peer: MacAddr,
        method: WpsProvisionMethod,
    ) -> Result<(), EngineError>;
    fn reject(&mut self, iface: &str, peer: MacAddr) -> Result<(), EngineError>;
    fn invite(
        &mut self,
        iface: &str,
        group: &str,
        go_device: MacAddr,
        peer: MacAddr,
    ) -> Result<(), EngineError>;
    fn reinvoke(&mut self, iface: &str, network: NetworkId, peer: MacAddr)
    -> Result<(), EngineError>;
    fn group_add(
        &mut self,
        iface: &str,
        persistent: bool,
        freq: u32,
        params: &GroupParams,
    ) -> Result<(), EngineError>;
    fn group_add_persistent(
        &mut self,
        iface: &str,
        network: NetworkId,
        freq: u32,
        params: &GroupParams,
    ) -> Result<(), EngineError>;
    /// Credentials the next autonomous group will use.
    fn set_group_credentials(
        &mut self,
        iface: &str,
        ssid: &Ssid,
        passphrase: &Passphrase,
    ) -> Result<(), EngineError>;
    fn remove_group(&mut self, group: &str) -> Result<(), EngineError>;
    fn remove_client(&mut self, iface: &str, peer: MacAddr, legacy: bool)
    -> Result<(), EngineError>;
    fn peer_ssid(&self, iface: &str, peer: MacAddr) -> Result<Vec<u8>, EngineError>;
    fn peer_group_capability(&self, iface: &str, peer: MacAddr) -> Result<u8, EngineError>;

    // ── Service discovery ────────────────────────────────────────────

    fn add_service(&mut self, iface: &str, service: ServiceRecord) -> Result<(), EngineError>;
    fn remove_service(&mut self, iface: &str, service: &ServiceRecord) -> Result<(), EngineError>;
    fn flush_services(&mut self, iface: &str);
    /// `None` peer means broadcast. Returns the request id, 0 on failure.
    fn request_service_discovery(&mut self, iface: &str, peer: Option<MacAddr>, query: &[u8])
    -> u64;
    fn cancel_service_discovery(&mut self, iface: &str, id: u64) -> Result<(), EngineError>;

    // ── WPS ──────────────────────────────────────────────────────────

    fn wps_pbc(&mut self, group: &str, bssid: Option<MacAddr>) -> Result<(), EngineError>;
    fn wps_pin_keypad(&mut self, group: &str, pin: &str) -> Result<(), EngineError>;
    fn wps_pin_display(&mut self, group: &str, bssid: Option<MacAddr>) -> Result<u32, EngineError>;
    fn wps_cancel(&mut self, group: &str) -> Result<(), EngineError>;
    fn set_device_info(&mut self, iface: &str, info: DeviceInfo) -> Result<(), EngineError>;

    // ── Wi-Fi Display ────────────────────────────────────────────────

    fn set_wfd_enabled(&mut self, iface: &str, enable: bool) -> Result<(), EngineError>;
    /// `command` is `"<subelem id> <hex body>"`.
    fn set_wfd_subelement(&mut self, iface: &str, command: &str) -> Result<(), EngineError>;
    fn driver_command(&mut self, iface: &str, command: &str) -> Result<(), EngineError>;

    // ── NFC ──────────────────────────────────────────────────────────

    fn nfc_handover_request(&mut self, iface: &str) -> Result<Vec<u8>, EngineError>;
    fn nfc_handover_select(&mut self, iface: &str) -> Result<Vec<u8>, EngineError>;
    fn nfc_report_handover(
        &mut self,
        iface: &str,
        initiator: bool,
        message: &[u8],
    ) -> Result<(), EngineError>;

    // ── Misc ─────────────────────────────────────────────────────────

    /// `None` clears the slot; `Some` replaces it.
    fn set_vendor_elements(&mut self, iface: &str, frame: FrameType, elements: Option<Bytes>);
    fn set_ip_allocation(&mut self, iface: &str, alloc: &IpAllocation) -> Result<(), EngineError>;
    fn mac_randomization(&self, iface: &str) -> bool;
    /// Flip the configured policy without touching the radio.
    fn set_mac_randomization(&mut self, iface: &str, enable: bool);
    /// Program the device address according to the configured policy.
    fn apply_mac_address(&mut self, iface: &str) -> Result<(), EngineError>;
    fn edmg(&self, iface: &str) -> bool;
    fn set_edmg(&mut self, iface: &str, enable: bool);
}
