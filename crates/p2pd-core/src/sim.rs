// ── Simulated engine ──
//
// In-memory `P2pEngine` used by the test suites and the `p2pd run`
// scenario harness. It keeps just enough state to make the binding
// layer's behavior observable: network tables, vendor elements, radio
// work, issued scans, groups, and a queue of engine events.
//
// Clones share state, so a test can hand one clone to the supervisor
// and inspect through another.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tokio::sync::Notify;
use tracing::trace;

use crate::engine::{ConnectParams, EngineEvent, GroupJoin, GroupParams, P2pEngine};
use crate::error::EngineError;
use crate::model::{
    DeviceInfo, FrameType, FreqRange, IfaceContext, IfaceStatus, IpAllocation, JoinTarget,
    MacAddr, NetworkId, NetworkKind, NetworkProfile, NewNetwork, Passphrase, RadioWorkId,
    ScanEntry, ScanType, ServiceRecord, Ssid, VendorElementSet, WpsProvisionMethod,
};
use crate::notify::Event;

/// PIN the simulated engine hands out for display-method provisioning.
pub const SIM_GENERATED_PIN: u32 = 12_345_670;

// ── Public inspection types ─────────────────────────────────────────

/// A peer the simulated engine has "discovered".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimPeer {
    pub ssid: Vec<u8>,
    pub group_capability: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRecord {
    pub iface: String,
    pub target: JoinTarget,
    pub work: RadioWorkId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimGroup {
    pub name: String,
    pub parent: String,
    pub go: bool,
    pub ssid: String,
    pub idle_secs: u32,
    pub power_save: bool,
    pub wps_active: bool,
}

// ── State ───────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct SimIface {
    ctx: Option<IfaceContext>,
    address: MacAddr,
    status: IfaceStatus,
    networks: BTreeMap<NetworkId, NetworkProfile>,
    finding: Option<(ScanType, u32)>,
    ext_listen: Option<(u32, u32)>,
    listen_channel: Option<(u32, u32)>,
    disallowed: Vec<FreqRange>,
    ssid_postfix: Vec<u8>,
    vendor: VendorElementSet,
    services: Vec<ServiceRecord>,
    sd_requests: BTreeSet<u64>,
    device_info: Vec<DeviceInfo>,
    wfd_enabled: bool,
    wfd_subelements: Vec<String>,
    driver_commands: Vec<String>,
    mac_randomization: bool,
    edmg: bool,
    ip_allocation: Option<IpAllocation>,
    peers: BTreeMap<MacAddr, SimPeer>,
    group_ssid: Option<Ssid>,
    connecting: Option<MacAddr>,
    next_group: u32,
}

#[derive(Debug, Default)]
struct SimState {
    ifaces: BTreeMap<String, SimIface>,
    groups: BTreeMap<String, SimGroup>,
    events: VecDeque<EngineEvent>,
    scans: Vec<ScanRecord>,
    radio_work: BTreeSet<RadioWorkId>,
    joins: Vec<GroupJoin>,
    next_work: u64,
    next_network: i32,
    next_sd_request: u64,
    next_address: u32,
    mac_setup_error: Option<EngineError>,
    scan_error: Option<EngineError>,
    config_read_only: bool,
    mutations: u64,
}

impl SimState {
    fn iface(&self, name: &str) -> Result<&SimIface, EngineError> {
        self.ifaces
            .get(name)
            .ok_or_else(|| EngineError::not_found(format!("interface {name}")))
    }

    fn iface_mut(&mut self, name: &str) -> Result<&mut SimIface, EngineError> {
        self.mutations += 1;
        self.ifaces
            .get_mut(name)
            .ok_or_else(|| EngineError::not_found(format!("interface {name}")))
    }

    fn group_mut(&mut self, name: &str) -> Result<&mut SimGroup, EngineError> {
        self.mutations += 1;
        self.groups
            .get_mut(name)
            .ok_or_else(|| EngineError::not_found(format!("group {name}")))
    }

    fn notify(&mut self, iface: &str, event: Event) {
        self.events.push_back(EngineEvent::Notification {
            iface: iface.to_owned(),
            event,
        });
    }

    fn insert_iface(&mut self, ctx: IfaceContext) {
        // Locally administered, counting up from 02:00:00:00:00:01 so the
        // wildcard address is never handed out.
        self.next_address = (self.next_address + 1) & 0x00ff_ffff;
        if self.next_address == 0 {
            self.next_address = 1;
        }
        let [_, a, b, c] = self.next_address.to_be_bytes();
        let iface = SimIface {
            address: MacAddr::new([0x02, 0x00, 0x00, a, b, c]),
            ctx: Some(ctx.clone()),
            ..SimIface::default()
        };
        self.ifaces.insert(ctx.name.clone(), iface);
        self.events.push_back(EngineEvent::InterfaceAdded { iface: ctx });
    }

    fn drop_iface(&mut self, name: &str) {
        if self.ifaces.remove(name).is_some() {
            self.events.push_back(EngineEvent::InterfaceRemoved {
                iface: name.to_owned(),
            });
        }
    }

    fn start_group(
        &mut self,
        parent: &str,
        go: bool,
        ssid: String,
        freq: u32,
        persistent: bool,
        go_device: MacAddr,
    ) -> Result<String, EngineError> {
        let seq = {
            let iface = self.iface_mut(parent)?;
            let seq = iface.next_group;
            iface.next_group += 1;
            iface.finding = None;
            iface.connecting = None;
            seq
        };
        let name = format!("p2p-{parent}-{seq}");
        self.insert_iface(IfaceContext::group(name.clone(), parent));
        self.groups.insert(
            name.clone(),
            SimGroup {
                name: name.clone(),
                parent: parent.to_owned(),
                go,
                ssid: ssid.clone(),
                idle_secs: 0,
                power_save: false,
                wps_active: false,
            },
        );
        self.notify(
            &name,
            Event::GroupStarted {
                group: name.clone(),
                ssid,
                go,
                freq,
                persistent,
                go_device,
            },
        );
        Ok(name)
    }
}

// ── SimEngine ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct SimEngine {
    state: Arc<Mutex<SimState>>,
    ready: Arc<Notify>,
}

impl SimEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wake(&self) {
        self.ready.notify_one();
    }

    // ── Scenario controls ────────────────────────────────────────────

    /// Bring up an interface and announce it.
    pub fn add_interface(&self, ctx: IfaceContext) {
        self.state().insert_iface(ctx);
        self.wake();
    }

    /// Tear down an interface, and any groups it owns.
    pub fn remove_interface(&self, name: &str) {
        {
            let mut state = self.state();
            let owned: Vec<String> = state
                .groups
                .values()
                .filter(|g| g.parent == name)
                .map(|g| g.name.clone())
                .collect();
            for group in owned {
                remove_group_locked(&mut state, &group, "interface removed");
            }
            state.drop_iface(name);
        }
        self.wake();
    }

    pub fn set_interface_disabled(&self, name: &str, disabled: bool) {
        if let Some(iface) = self.state().ifaces.get_mut(name) {
            iface.status.interface_disabled = disabled;
        }
    }

    pub fn set_p2p_disabled(&self, name: &str, disabled: bool) {
        if let Some(iface) = self.state().ifaces.get_mut(name) {
            iface.status.p2p_disabled = disabled;
        }
    }

    pub fn add_peer(&self, iface: &str, peer: MacAddr, info: SimPeer) {
        if let Some(iface) = self.state().ifaces.get_mut(iface) {
            iface.peers.insert(peer, info);
        }
    }

    /// Make the next MAC address programming fail with `error`.
    pub fn set_mac_setup_error(&self, error: Option<EngineError>) {
        self.state().mac_setup_error = error;
    }

    /// Make join scans fail to start with `error`.
    pub fn set_scan_error(&self, error: Option<EngineError>) {
        self.state().scan_error = error;
    }

    pub fn set_config_read_only(&self, read_only: bool) {
        self.state().config_read_only = read_only;
    }

    /// Queue an arbitrary notification as if the engine emitted it.
    pub fn inject(&self, iface: &str, event: Event) {
        self.state().notify(iface, event);
        self.wake();
    }

    /// Deliver results for the most recent join scan on `iface`,
    /// whether or not that scan is still wanted.
    pub fn deliver_scan_results(&self, iface: &str, results: Vec<ScanEntry>) -> Option<RadioWorkId> {
        let work = {
            let mut state = self.state();
            let work = state.scans.iter().rev().find(|s| s.iface == iface)?.work;
            state.events.push_back(EngineEvent::ScanResults {
                iface: iface.to_owned(),
                work,
                results,
            });
            work
        };
        self.wake();
        Some(work)
    }

    // ── Inspection ───────────────────────────────────────────────────

    pub fn networks(&self, iface: &str) -> Vec<NetworkProfile> {
        self.state()
            .ifaces
            .get(iface)
            .map(|i| i.networks.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn vendor_elements(&self, iface: &str) -> VendorElementSet {
        self.state()
            .ifaces
            .get(iface)
            .map(|i| i.vendor.clone())
            .unwrap_or_default()
    }

    pub fn scans(&self) -> Vec<ScanRecord> {
        self.state().scans.clone()
    }

    pub fn outstanding_radio_work(&self) -> usize {
        self.state().radio_work.len()
    }

    pub fn joins(&self) -> Vec<GroupJoin> {
        self.state().joins.clone()
    }

    pub fn groups(&self) -> Vec<SimGroup> {
        self.state().groups.values().cloned().collect()
    }

    pub fn is_finding(&self, iface: &str) -> bool {
        self.state()
            .ifaces
            .get(iface)
            .is_some_and(|i| i.finding.is_some())
    }

    pub fn driver_commands(&self, iface: &str) -> Vec<String> {
        self.state()
            .ifaces
            .get(iface)
            .map(|i| i.driver_commands.clone())
            .unwrap_or_default()
    }

    pub fn wfd_subelements(&self, iface: &str) -> Vec<String> {
        self.state()
            .ifaces
            .get(iface)
            .map(|i| i.wfd_subelements.clone())
            .unwrap_or_default()
    }

    pub fn device_info(&self, iface: &str) -> Vec<DeviceInfo> {
        self.state()
            .ifaces
            .get(iface)
            .map(|i| i.device_info.clone())
            .unwrap_or_default()
    }

    pub fn ssid_postfix(&self, iface: &str) -> Vec<u8> {
        self.state()
            .ifaces
            .get(iface)
            .map(|i| i.ssid_postfix.clone())
            .unwrap_or_default()
    }

    pub fn service_count(&self, iface: &str) -> usize {
        self.state().ifaces.get(iface).map_or(0, |i| i.services.len())
    }

    pub fn ip_allocation(&self, iface: &str) -> Option<IpAllocation> {
        self.state().ifaces.get(iface).and_then(|i| i.ip_allocation)
    }

    /// Count of state-changing engine calls so far.
    pub fn mutations(&self) -> u64 {
        self.state().mutations
    }
}

fn remove_group_locked(state: &mut SimState, name: &str, reason: &str) -> bool {
    let Some(group) = state.groups.remove(name) else {
        return false;
    };
    state.notify(
        name,
        Event::GroupRemoved {
            group: name.to_owned(),
            go: group.go,
            reason: reason.to_owned(),
        },
    );
    state.drop_iface(name);
    true
}

fn default_group_ssid(iface: &SimIface) -> String {
    iface.group_ssid.as_ref().map_or_else(
        || format!("DIRECT-{:02x}", iface.address.octets()[5]),
        Ssid::to_text,
    )
}

// ── P2pEngine impl ──────────────────────────────────────────────────

impl P2pEngine for SimEngine {
    fn events_ready(&self) -> Arc<Notify> {
        Arc::clone(&self.ready)
    }

    fn drain_events(&mut self) -> Vec<EngineEvent> {
        self.state().events.drain(..).collect()
    }

    fn interface_exists(&self, iface: &str) -> bool {
        self.state().ifaces.contains_key(iface)
    }

    fn interface_status(&self, iface: &str) -> Option<IfaceStatus> {
        self.state().ifaces.get(iface).map(|i| i.status)
    }

    fn device_address(&self, iface: &str) -> Result<MacAddr, EngineError> {
        Ok(self.state().iface(iface)?.address)
    }

    fn group_exists(&self, group: &str) -> bool {
        self.state().groups.contains_key(group)
    }

    // ── Networks ─────────────────────────────────────────────────────

    fn add_network(&mut self, iface: &str, profile: NewNetwork) -> Result<NetworkId, EngineError> {
        let mut state = self.state();
        let id = NetworkId(state.next_network);
        state.next_network += 1;
        state.iface_mut(iface)?.networks.insert(
            id,
            NetworkProfile {
                id,
                kind: profile.kind,
                ssid: profile.ssid,
                bssid: profile.bssid,
            },
        );
        let event = match profile.kind {
            NetworkKind::PersistentGroup => Event::PersistentGroupAdded { network: id },
            kind => Event::NetworkAdded {
                network: id,
                p2p_group: kind.is_p2p_group(),
            },
        };
        state.notify(iface, event);
        drop(state);
        self.wake();
        Ok(id)
    }

    fn remove_network(&mut self, iface: &str, id: NetworkId) -> Result<(), EngineError> {
        let mut state = self.state();
        let removed = state
            .iface_mut(iface)?
            .networks
            .remove(&id)
            .ok_or_else(|| EngineError::not_found(format!("network {id}")))?;
        let event = match removed.kind {
            NetworkKind::PersistentGroup => Event::PersistentGroupRemoved { network: id },
            kind => Event::NetworkRemoved {
                network: id,
                p2p_group: kind.is_p2p_group(),
            },
        };
        state.notify(iface, event);
        drop(state);
        self.wake();
        Ok(())
    }

    fn network(&self, iface: &str, id: NetworkId) -> Option<NetworkProfile> {
        self.state().ifaces.get(iface)?.networks.get(&id).cloned()
    }

    fn network_ids(&self, iface: &str) -> Vec<NetworkId> {
        self.state()
            .ifaces
            .get(iface)
            .map(|i| i.networks.keys().copied().collect())
            .unwrap_or_default()
    }

    fn save_config(&mut self, iface: &str) -> Result<(), EngineError> {
        let mut state = self.state();
        state.iface_mut(iface)?;
        if state.config_read_only {
            return Err(EngineError::rejected("configuration updates are disabled"));
        }
        Ok(())
    }

    fn set_ssid_postfix(&mut self, iface: &str, postfix: &[u8]) -> Result<(), EngineError> {
        self.state().iface_mut(iface)?.ssid_postfix = postfix.to_vec();
        Ok(())
    }

    fn set_group_idle(&mut self, group: &str, timeout_secs: u32) -> Result<(), EngineError> {
        self.state().group_mut(group)?.idle_secs = timeout_secs;
        Ok(())
    }

    fn set_power_save(&mut self, group: &str, enable: bool) -> Result<(), EngineError> {
        self.state().group_mut(group)?.power_save = enable;
        Ok(())
    }

    // ── Discovery ────────────────────────────────────────────────────

    fn find(&mut self, iface: &str, scan: ScanType, timeout_secs: u32) -> Result<(), EngineError> {
        self.state().iface_mut(iface)?.finding = Some((scan, timeout_secs));
        Ok(())
    }

    fn stop_find(&mut self, iface: &str) {
        let mut state = self.state();
        let was_finding = state
            .iface_mut(iface)
            .map(|i| i.finding.take().is_some())
            .unwrap_or(false);
        if was_finding {
            state.notify(iface, Event::FindStopped);
            drop(state);
            self.wake();
        }
    }

    fn flush(&mut self, iface: &str) {
        self.stop_find(iface);
        if let Ok(i) = self.state().iface_mut(iface) {
            i.peers.clear();
            i.connecting = None;
        }
    }

    fn configure_ext_listen(
        &mut self,
        iface: &str,
        period_ms: u32,
        interval_ms: u32,
    ) -> Result<(), EngineError> {
        if period_ms > interval_ms {
            return Err(EngineError::rejected("listen period exceeds interval"));
        }
        let value = (period_ms != 0).then_some((period_ms, interval_ms));
        self.state().iface_mut(iface)?.ext_listen = value;
        Ok(())
    }

    fn set_listen_channel(
        &mut self,
        iface: &str,
        channel: u32,
        operating_class: u32,
    ) -> Result<(), EngineError> {
        self.state().iface_mut(iface)?.listen_channel = Some((channel, operating_class));
        Ok(())
    }

    fn set_disallowed_frequencies(
        &mut self,
        iface: &str,
        ranges: &[FreqRange],
    ) -> Result<(), EngineError> {
        self.state().iface_mut(iface)?.disallowed = ranges.to_vec();
        Ok(())
    }

    // ── Group join ───────────────────────────────────────────────────

    fn start_join_scan(
        &mut self,
        iface: &str,
        target: &JoinTarget,
    ) -> Result<RadioWorkId, EngineError> {
        let mut state = self.state();
        state.iface_mut(iface)?;
        if let Some(err) = state.scan_error.clone() {
            return Err(err);
        }
        state.next_work += 1;
        let work = RadioWorkId(state.next_work);
        state.radio_work.insert(work);
        state.scans.push(ScanRecord {
            iface: iface.to_owned(),
            target: target.clone(),
            work,
        });
        trace!(iface, work = work.0, "sim: join scan issued");
        Ok(work)
    }

    fn release_radio_work(&mut self, _iface: &str, work: RadioWorkId) {
        self.state().radio_work.remove(&work);
    }

    fn join_group(
        &mut self,
        iface: &str,
        join: &GroupJoin,
        results: &[ScanEntry],
    ) -> Result<(), EngineError> {
        let mut state = self.state();
        state.joins.push(join.clone());
        let known = state
            .iface(iface)?
            .networks
            .contains_key(&join.network);
        if !known {
            return Err(EngineError::not_found(format!("network {}", join.network)));
        }
        let entry = results
            .iter()
            .find(|e| e.matches(&join.target.ssid, join.target.bssid))
            .cloned()
            .ok_or_else(|| EngineError::rejected("group owner not found in scan results"))?;
        state.start_group(iface, false, entry.ssid, entry.freq, false, entry.bssid)?;
        drop(state);
        self.wake();
        Ok(())
    }

    // ── Connection & groups ──────────────────────────────────────────

    fn connect(&mut self, iface: &str, params: &ConnectParams) -> Result<Option<u32>, EngineError> {
        self.state().iface_mut(iface)?.connecting = Some(params.peer);
        let generated = (params.method == WpsProvisionMethod::Display && params.pin.is_none())
            .then_some(SIM_GENERATED_PIN);
        Ok(generated)
    }

    fn cancel_connect(&mut self, iface: &str) -> Result<(), EngineError> {
        self.state()
            .iface_mut(iface)?
            .connecting
            .take()
            .map(|_| ())
            .ok_or_else(|| EngineError::rejected("no connection in progress"))
    }

    fn provision_discovery(
        &mut self,
        iface: &str,
        _peer: MacAddr,
        _method: WpsProvisionMethod,
    ) -> Result<(), EngineError> {
        self.state().iface_mut(iface)?;
        Ok(())
    }

    fn reject(&mut self, iface: &str, peer: MacAddr) -> Result<(), EngineError> {
        let mut state = self.state();
        let i = state.iface_mut(iface)?;
        if i.peers.remove(&peer).is_none() {
            return Err(EngineError::not_found(format!("peer {peer}")));
        }
        Ok(())
    }

    fn invite(
        &mut self,
        iface: &str,
        group: &str,
        _go_device: MacAddr,
        _peer: MacAddr,
    ) -> Result<(), EngineError> {
        let mut state = self.state();
        state.iface_mut(iface)?;
        if !state.groups.contains_key(group) {
            return Err(EngineError::not_found(format!("group {group}")));
        }
        Ok(())
    }

    fn reinvoke(
        &mut self,
        iface: &str,
        network: NetworkId,
        _peer: MacAddr,
    ) -> Result<(), EngineError> {
        let mut state = self.state();
        match state.iface_mut(iface)?.networks.get(&network) {
            Some(p) if p.kind == NetworkKind::PersistentGroup => Ok(()),
            _ => Err(EngineError::not_found(format!("persistent group {network}"))),
        }
    }

    fn group_add(
        &mut self,
        iface: &str,
        persistent: bool,
        freq: u32,
        _params: &GroupParams,
    ) -> Result<(), EngineError> {
        let mut state = self.state();
        let (ssid, address) = {
            let i = state.iface(iface)?;
            (default_group_ssid(i), i.address)
        };
        state.start_group(iface, true, ssid, freq, persistent, address)?;
        drop(state);
        self.wake();
        Ok(())
    }

    fn group_add_persistent(
        &mut self,
        iface: &str,
        network: NetworkId,
        freq: u32,
        _params: &GroupParams,
    ) -> Result<(), EngineError> {
        let mut state = self.state();
        let (ssid, address) = {
            let i = state.iface(iface)?;
            let profile = i
                .networks
                .get(&network)
                .filter(|p| p.kind == NetworkKind::PersistentGroup)
                .ok_or_else(|| EngineError::not_found(format!("persistent group {network}")))?;
            let ssid = profile
                .ssid
                .as_ref()
                .map_or_else(|| default_group_ssid(i), Ssid::to_text);
            (ssid, i.address)
        };
        state.start_group(iface, true, ssid, freq, true, address)?;
        drop(state);
        self.wake();
        Ok(())
    }

    fn set_group_credentials(
        &mut self,
        iface: &str,
        ssid: &Ssid,
        _passphrase: &Passphrase,
    ) -> Result<(), EngineError> {
        self.state().iface_mut(iface)?.group_ssid = Some(ssid.clone());
        Ok(())
    }

    fn remove_group(&mut self, group: &str) -> Result<(), EngineError> {
        let mut state = self.state();
        state.mutations += 1;
        if !remove_group_locked(&mut state, group, "requested") {
            return Err(EngineError::not_found(format!("group {group}")));
        }
        drop(state);
        self.wake();
        Ok(())
    }

    fn remove_client(&mut self, iface: &str, peer: MacAddr, _legacy: bool) -> Result<(), EngineError> {
        let mut state = self.state();
        state.iface_mut(iface)?;
        let owns_go = state.groups.values().any(|g| g.parent == iface && g.go);
        if !owns_go {
            return Err(EngineError::rejected("not a group owner"));
        }
        state.notify(
            iface,
            Event::StaDeauthorized {
                sta: peer,
                p2p_device: Some(peer),
            },
        );
        drop(state);
        self.wake();
        Ok(())
    }

    fn peer_ssid(&self, iface: &str, peer: MacAddr) -> Result<Vec<u8>, EngineError> {
        let state = self.state();
        state
            .iface(iface)?
            .peers
            .get(&peer)
            .map(|p| p.ssid.clone())
            .ok_or_else(|| EngineError::not_found(format!("peer {peer}")))
    }

    fn peer_group_capability(&self, iface: &str, peer: MacAddr) -> Result<u8, EngineError> {
        let state = self.state();
        state
            .iface(iface)?
            .peers
            .get(&peer)
            .map(|p| p.group_capability)
            .ok_or_else(|| EngineError::not_found(format!("peer {peer}")))
    }

    // ── Service discovery ────────────────────────────────────────────

    fn add_service(&mut self, iface: &str, service: ServiceRecord) -> Result<(), EngineError> {
        let mut state = self.state();
        let services = &mut state.iface_mut(iface)?.services;
        services.retain(|s| !s.same_service(&service));
        services.push(service);
        Ok(())
    }

    fn remove_service(&mut self, iface: &str, service: &ServiceRecord) -> Result<(), EngineError> {
        let mut state = self.state();
        let services = &mut state.iface_mut(iface)?.services;
        let before = services.len();
        services.retain(|s| !s.same_service(service));
        if services.len() == before {
            return Err(EngineError::not_found("service"));
        }
        Ok(())
    }

    fn flush_services(&mut self, iface: &str) {
        if let Ok(i) = self.state().iface_mut(iface) {
            i.services.clear();
        }
    }

    fn request_service_discovery(
        &mut self,
        iface: &str,
        _peer: Option<MacAddr>,
        query: &[u8],
    ) -> u64 {
        let mut state = self.state();
        if query.is_empty() {
            return 0;
        }
        state.next_sd_request += 1;
        let id = state.next_sd_request;
        match state.iface_mut(iface) {
            Ok(i) => {
                i.sd_requests.insert(id);
                id
            }
            Err(_) => 0,
        }
    }

    fn cancel_service_discovery(&mut self, iface: &str, id: u64) -> Result<(), EngineError> {
        if self.state().iface_mut(iface)?.sd_requests.remove(&id) {
            Ok(())
        } else {
            Err(EngineError::not_found(format!("service discovery request {id}")))
        }
    }

    // ── WPS ──────────────────────────────────────────────────────────

    fn wps_pbc(&mut self, group: &str, _bssid: Option<MacAddr>) -> Result<(), EngineError> {
        self.state().group_mut(group)?.wps_active = true;
        Ok(())
    }

    fn wps_pin_keypad(&mut self, group: &str, pin: &str) -> Result<(), EngineError> {
        if pin.is_empty() || !pin.bytes().all(|b| b.is_ascii_digit()) {
            return Err(EngineError::rejected("PIN must be decimal digits"));
        }
        self.state().group_mut(group)?.wps_active = true;
        Ok(())
    }

    fn wps_pin_display(&mut self, group: &str, _bssid: Option<MacAddr>) -> Result<u32, EngineError> {
        self.state().group_mut(group)?.wps_active = true;
        Ok(SIM_GENERATED_PIN)
    }

    fn wps_cancel(&mut self, group: &str) -> Result<(), EngineError> {
        self.state().group_mut(group)?.wps_active = false;
        Ok(())
    }

    fn set_device_info(&mut self, iface: &str, info: DeviceInfo) -> Result<(), EngineError> {
        self.state().iface_mut(iface)?.device_info.push(info);
        Ok(())
    }

    // ── Wi-Fi Display ────────────────────────────────────────────────

    fn set_wfd_enabled(&mut self, iface: &str, enable: bool) -> Result<(), EngineError> {
        self.state().iface_mut(iface)?.wfd_enabled = enable;
        Ok(())
    }

    fn set_wfd_subelement(&mut self, iface: &str, command: &str) -> Result<(), EngineError> {
        self.state()
            .iface_mut(iface)?
            .wfd_subelements
            .push(command.to_owned());
        Ok(())
    }

    fn driver_command(&mut self, iface: &str, command: &str) -> Result<(), EngineError> {
        self.state()
            .iface_mut(iface)?
            .driver_commands
            .push(command.to_owned());
        Ok(())
    }

    // ── NFC ──────────────────────────────────────────────────────────

    fn nfc_handover_request(&mut self, iface: &str) -> Result<Vec<u8>, EngineError> {
        let address = self.state().iface(iface)?.address;
        let mut message = vec![0xd1, 0x02, 0x0a, b'H', b'r'];
        message.extend_from_slice(&address.octets());
        Ok(message)
    }

    fn nfc_handover_select(&mut self, iface: &str) -> Result<Vec<u8>, EngineError> {
        let address = self.state().iface(iface)?.address;
        let mut message = vec![0xd1, 0x02, 0x0a, b'H', b's'];
        message.extend_from_slice(&address.octets());
        Ok(message)
    }

    fn nfc_report_handover(
        &mut self,
        iface: &str,
        _initiator: bool,
        message: &[u8],
    ) -> Result<(), EngineError> {
        self.state().iface_mut(iface)?;
        if message.is_empty() {
            return Err(EngineError::rejected("empty handover message"));
        }
        Ok(())
    }

    // ── Misc ─────────────────────────────────────────────────────────

    fn set_vendor_elements(&mut self, iface: &str, frame: FrameType, elements: Option<Bytes>) {
        if let Ok(i) = self.state().iface_mut(iface) {
            i.vendor.set(frame, elements);
        }
    }

    fn set_ip_allocation(&mut self, iface: &str, alloc: &IpAllocation) -> Result<(), EngineError> {
        self.state().iface_mut(iface)?.ip_allocation = Some(*alloc);
        Ok(())
    }

    fn mac_randomization(&self, iface: &str) -> bool {
        self.state()
            .ifaces
            .get(iface)
            .is_some_and(|i| i.mac_randomization)
    }

    fn set_mac_randomization(&mut self, iface: &str, enable: bool) {
        if let Ok(i) = self.state().iface_mut(iface) {
            i.mac_randomization = enable;
        }
    }

    fn apply_mac_address(&mut self, iface: &str) -> Result<(), EngineError> {
        let mut state = self.state();
        if let Some(err) = state.mac_setup_error.clone() {
            return Err(err);
        }
        let i = state.iface_mut(iface)?;
        if i.mac_randomization {
            let last = i.address.octets()[5];
            i.address = MacAddr::new([0x06, 0x5a, 0x1d, 0x00, 0x00, last]);
        }
        Ok(())
    }

    fn edmg(&self, iface: &str) -> bool {
        self.state().ifaces.get(iface).is_some_and(|i| i.edmg)
    }

    fn set_edmg(&mut self, iface: &str, enable: bool) {
        if let Ok(i) = self.state().iface_mut(iface) {
            i.edmg = enable;
        }
    }
}
