// ── Legacy message-bus observer ──
//
// Mirrors supplicant state as a tree of bus objects and emits one
// `BusSignal` per event. Objects are registered before the signal that
// announces them and torn down after the signal that retires them, so a
// listener can always resolve the path it was just told about.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use super::{Event, EventScope, Observer};
use crate::config::Feature;
use crate::error::ObserverError;
use crate::model::{IfaceContext, MacAddr, NetworkId};

pub const BUS_ROOT: &str = "/fi/w1/wpa_supplicant1";
pub const ROOT_INTERFACE: &str = "fi.w1.wpa_supplicant1";
pub const IFACE_INTERFACE: &str = "fi.w1.wpa_supplicant1.Interface";
pub const P2P_INTERFACE: &str = "fi.w1.wpa_supplicant1.Interface.P2PDevice";
pub const WPS_INTERFACE: &str = "fi.w1.wpa_supplicant1.Interface.WPS";

/// One emitted bus signal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusSignal {
    pub path: String,
    pub interface: &'static str,
    pub member: &'static str,
    pub args: serde_json::Value,
    pub emitted_at: DateTime<Utc>,
}

// ── Object bookkeeping ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ObjectKey {
    Network(NetworkId),
    PersistentGroup(NetworkId),
    Peer(MacAddr),
    Group(String),
    Station(MacAddr),
    Bss(u32),
}

impl ObjectKey {
    fn path(&self, iface_path: &str) -> String {
        match self {
            Self::Network(id) => format!("{iface_path}/Networks/{id}"),
            Self::PersistentGroup(id) => format!("{iface_path}/PersistentGroups/{id}"),
            Self::Peer(mac) => format!("{iface_path}/Peers/{}", mac.to_compact_hex()),
            Self::Group(name) => format!("{iface_path}/Groups/{name}"),
            Self::Station(mac) => format!("{iface_path}/Stations/{}", mac.to_compact_hex()),
            Self::Bss(id) => format!("{iface_path}/BSSs/{id}"),
        }
    }
}

/// Whether an event creates or retires an object, and which one.
enum Bookkeeping {
    Register(ObjectKey),
    Unregister(ObjectKey),
    Touch(ObjectKey),
    /// Not published on the bus at all.
    Skip,
    None,
}

fn bookkeeping(event: &Event, ctx: &IfaceContext) -> Bookkeeping {
    match event {
        Event::NetworkAdded {
            network,
            p2p_group: false,
        } => Bookkeeping::Register(ObjectKey::Network(*network)),
        Event::NetworkRemoved {
            network,
            p2p_group: false,
        } => Bookkeeping::Unregister(ObjectKey::Network(*network)),
        Event::NetworkAdded { .. } | Event::NetworkRemoved { .. } => Bookkeeping::Skip,
        Event::NetworkSelected { network } | Event::NetworkRequest { network, .. } => {
            Bookkeeping::Touch(ObjectKey::Network(*network))
        }
        Event::PersistentGroupAdded { network } => {
            Bookkeeping::Register(ObjectKey::PersistentGroup(*network))
        }
        Event::PersistentGroupRemoved { network } => {
            Bookkeeping::Unregister(ObjectKey::PersistentGroup(*network))
        }
        Event::DeviceFound {
            peer,
            new_peer: true,
            ..
        } => Bookkeeping::Register(ObjectKey::Peer(*peer)),
        Event::DeviceFound { peer, .. } => Bookkeeping::Touch(ObjectKey::Peer(*peer)),
        Event::DeviceLost { peer } => Bookkeeping::Unregister(ObjectKey::Peer(*peer)),
        Event::GroupStarted { group, .. } => {
            Bookkeeping::Register(ObjectKey::Group(group.clone()))
        }
        Event::GroupRemoved { group, .. } => {
            Bookkeeping::Unregister(ObjectKey::Group(group.clone()))
        }
        Event::StaAuthorized { sta, .. } => Bookkeeping::Register(ObjectKey::Station(*sta)),
        Event::StaDeauthorized { sta, .. } => Bookkeeping::Unregister(ObjectKey::Station(*sta)),
        Event::BssAdded { bss, .. } => Bookkeeping::Register(ObjectKey::Bss(*bss)),
        Event::BssRemoved { bss, .. } => Bookkeeping::Unregister(ObjectKey::Bss(*bss)),
        _ => {
            trace!(iface = %ctx.name, event = event.name(), "no object bookkeeping");
            Bookkeeping::None
        }
    }
}

#[derive(Debug)]
struct BusInterface {
    path: String,
    objects: IndexMap<ObjectKey, String>,
}

// ── LegacyBusObserver ───────────────────────────────────────────────

pub struct LegacyBusObserver {
    enabled: bool,
    tx: broadcast::Sender<Arc<BusSignal>>,
    next_index: u32,
    ifaces: IndexMap<String, BusInterface>,
}

impl LegacyBusObserver {
    pub fn new(enabled: bool, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            enabled,
            tx,
            next_index: 0,
            ifaces: IndexMap::new(),
        }
    }

    /// Sender handle; callers subscribe through it after the observer
    /// has been moved into a `Notifier`.
    pub fn sender(&self) -> broadcast::Sender<Arc<BusSignal>> {
        self.tx.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<BusSignal>> {
        self.tx.subscribe()
    }

    pub fn interface_path(&self, iface: &str) -> Option<&str> {
        self.ifaces.get(iface).map(|i| i.path.as_str())
    }

    /// Object paths currently registered under `iface`, in creation order.
    pub fn object_paths(&self, iface: &str) -> Vec<String> {
        self.ifaces
            .get(iface)
            .map(|i| i.objects.values().cloned().collect())
            .unwrap_or_default()
    }

    fn emit(
        &self,
        path: String,
        interface: &'static str,
        member: &'static str,
        args: serde_json::Value,
    ) {
        let signal = BusSignal {
            path,
            interface,
            member,
            args,
            emitted_at: Utc::now(),
        };
        trace!(path = %signal.path, member, "bus signal");
        // No subscribers is fine.
        let _ = self.tx.send(Arc::new(signal));
    }

    fn on_lifecycle(&mut self, event: &Event, ctx: &IfaceContext) {
        match event {
            Event::InterfaceAdded => {
                let path = format!("{BUS_ROOT}/Interfaces/{}", self.next_index);
                self.next_index += 1;
                debug!(iface = %ctx.name, %path, "bus object registered");
                self.ifaces.insert(
                    ctx.name.clone(),
                    BusInterface {
                        path: path.clone(),
                        objects: IndexMap::new(),
                    },
                );
                self.emit(
                    BUS_ROOT.to_owned(),
                    ROOT_INTERFACE,
                    "InterfaceAdded",
                    serde_json::json!({ "path": path, "ifname": ctx.name }),
                );
            }
            _ => {
                let Some(removed) = self.ifaces.get(&ctx.name).map(|i| i.path.clone()) else {
                    return;
                };
                self.emit(
                    BUS_ROOT.to_owned(),
                    ROOT_INTERFACE,
                    "InterfaceRemoved",
                    serde_json::json!({ "path": removed, "ifname": ctx.name }),
                );
                self.ifaces.shift_remove(&ctx.name);
                debug!(iface = %ctx.name, "bus object removed");
            }
        }
    }
}

fn signal_interface(event: &Event) -> &'static str {
    if event.feature() == Some(Feature::Wps) {
        return WPS_INTERFACE;
    }
    match event.scope() {
        EventScope::P2p => P2P_INTERFACE,
        _ => IFACE_INTERFACE,
    }
}

/// Event payload without the serde tag.
fn signal_args(event: &Event) -> Result<serde_json::Value, ObserverError> {
    let mut args = serde_json::to_value(event)?;
    if let Some(map) = args.as_object_mut() {
        map.remove("event");
    }
    Ok(args)
}

impl Observer for LegacyBusObserver {
    fn name(&self) -> &'static str {
        "legacy-bus"
    }

    fn is_active(&self) -> bool {
        self.enabled
    }

    fn interested(&self, event: &Event, ctx: &IfaceContext) -> bool {
        if event.scope() == EventScope::Lifecycle {
            return !ctx.management_only;
        }
        !matches!(
            event,
            Event::AuthTimeout { .. }
                | Event::EapError { .. }
                | Event::DppProgress { .. }
                | Event::FrequencyChanged { .. }
                | Event::NetworkNotFound { .. }
                | Event::Hs20IconQueryDone { .. }
                | Event::Hs20SubscriptionRemediation { .. }
                | Event::Hs20DeauthImminent { .. }
                | Event::NanDiscoveryResult { .. }
                | Event::NanReplied { .. }
                | Event::NanReceive { .. }
                | Event::NanPublishTerminated { .. }
                | Event::NanSubscribeTerminated { .. }
        )
    }

    fn on_event(&mut self, event: &Event, ctx: &IfaceContext) -> Result<(), ObserverError> {
        if event.scope() == EventScope::Lifecycle {
            self.on_lifecycle(event, ctx);
            return Ok(());
        }

        let owner = ctx.bus_owner().ok_or_else(|| ObserverError::MissingParent {
            iface: ctx.name.clone(),
        })?;
        let args = signal_args(event)?;
        let bus_iface = self
            .ifaces
            .get_mut(owner)
            .ok_or_else(|| ObserverError::UnknownInterface {
                iface: owner.to_owned(),
            })?;
        let iface_path = bus_iface.path.clone();
        let interface = signal_interface(event);

        match bookkeeping(event, ctx) {
            Bookkeeping::Register(key) => {
                let object = key.path(&iface_path);
                bus_iface.objects.insert(key, object.clone());
                self.emit(iface_path, interface, event.name(), with_object(args, object));
            }
            Bookkeeping::Unregister(key) => {
                let Some(object) = bus_iface.objects.get(&key).cloned() else {
                    debug!(iface = owner, event = event.name(), "retiring unknown object");
                    return Ok(());
                };
                self.emit(iface_path, interface, event.name(), with_object(args, object));
                if let Some(bus_iface) = self.ifaces.get_mut(owner) {
                    bus_iface.objects.shift_remove(&key);
                }
            }
            Bookkeeping::Touch(key) => {
                let object = bus_iface.objects.get(&key).cloned();
                let args = match object {
                    Some(object) => with_object(args, object),
                    None => args,
                };
                self.emit(iface_path, interface, event.name(), args);
            }
            Bookkeeping::Skip => {
                trace!(iface = owner, event = event.name(), "not published");
            }
            Bookkeeping::None => self.emit(iface_path, interface, event.name(), args),
        }
        Ok(())
    }
}

fn with_object(mut args: serde_json::Value, object: String) -> serde_json::Value {
    if let Some(map) = args.as_object_mut() {
        map.insert("object".to_owned(), serde_json::Value::String(object));
    }
    args
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn drain(rx: &mut broadcast::Receiver<Arc<BusSignal>>) -> Vec<Arc<BusSignal>> {
        let mut out = Vec::new();
        while let Ok(signal) = rx.try_recv() {
            out.push(signal);
        }
        out
    }

    fn peer() -> MacAddr {
        "00:11:22:33:44:55".parse().unwrap()
    }

    #[test]
    fn interface_paths_are_sequential() {
        let mut bus = LegacyBusObserver::new(true, 16);
        let mut rx = bus.subscribe();
        bus.on_event(&Event::InterfaceAdded, &IfaceContext::new("wlan0"))
            .unwrap();
        bus.on_event(&Event::InterfaceAdded, &IfaceContext::new("wlan1"))
            .unwrap();

        assert_eq!(
            bus.interface_path("wlan1"),
            Some("/fi/w1/wpa_supplicant1/Interfaces/1")
        );
        let signals = drain(&mut rx);
        assert_eq!(signals.len(), 2);
        assert_eq!(signals[0].member, "InterfaceAdded");
        assert_eq!(signals[0].path, BUS_ROOT);
    }

    #[test]
    fn peer_object_outlives_its_lost_signal() {
        let mut bus = LegacyBusObserver::new(true, 16);
        let ctx = IfaceContext::new("wlan0");
        bus.on_event(&Event::InterfaceAdded, &ctx).unwrap();
        let mut rx = bus.subscribe();

        let found = Event::DeviceFound {
            peer: peer(),
            device_name: "tv".into(),
            new_peer: true,
        };
        bus.on_event(&found, &ctx).unwrap();
        let expected = "/fi/w1/wpa_supplicant1/Interfaces/0/Peers/001122334455";
        assert_eq!(bus.object_paths("wlan0"), vec![expected.to_owned()]);

        bus.on_event(&Event::DeviceLost { peer: peer() }, &ctx)
            .unwrap();
        assert!(bus.object_paths("wlan0").is_empty());

        let signals = drain(&mut rx);
        assert_eq!(signals.len(), 2);
        assert_eq!(signals[1].member, "DeviceLost");
        assert_eq!(signals[1].interface, P2P_INTERFACE);
        assert_eq!(signals[1].args["object"], expected);
    }

    #[test]
    fn p2p_group_networks_are_not_published() {
        let mut bus = LegacyBusObserver::new(true, 16);
        let ctx = IfaceContext::new("wlan0");
        bus.on_event(&Event::InterfaceAdded, &ctx).unwrap();

        let temp = Event::NetworkAdded {
            network: NetworkId(4),
            p2p_group: true,
        };
        let mut rx = bus.subscribe();
        bus.on_event(&temp, &ctx).unwrap();
        assert!(bus.object_paths("wlan0").is_empty());
        assert!(drain(&mut rx).is_empty());

        let station = Event::NetworkAdded {
            network: NetworkId(5),
            p2p_group: false,
        };
        bus.on_event(&station, &ctx).unwrap();
        assert_eq!(
            bus.object_paths("wlan0"),
            vec!["/fi/w1/wpa_supplicant1/Interfaces/0/Networks/5".to_owned()]
        );
    }

    #[test]
    fn management_interfaces_signal_on_their_parent() {
        let mut bus = LegacyBusObserver::new(true, 16);
        bus.on_event(&Event::InterfaceAdded, &IfaceContext::new("wlan0"))
            .unwrap();
        let mgmt = IfaceContext::management("p2p-dev-wlan0", "wlan0");
        assert!(!bus.interested(&Event::InterfaceAdded, &mgmt));

        let mut rx = bus.subscribe();
        bus.on_event(&Event::FindStopped, &mgmt).unwrap();
        let signals = drain(&mut rx);
        assert_eq!(signals[0].path, "/fi/w1/wpa_supplicant1/Interfaces/0");
        assert_eq!(signals[0].member, "FindStopped");
    }

    #[test]
    fn unknown_owner_is_an_error() {
        let mut bus = LegacyBusObserver::new(true, 16);
        let err = bus
            .on_event(&Event::FindStopped, &IfaceContext::new("wlan9"))
            .unwrap_err();
        assert!(matches!(err, ObserverError::UnknownInterface { .. }));
    }

    #[test]
    fn binding_only_events_are_skipped() {
        let bus = LegacyBusObserver::new(true, 16);
        let ctx = IfaceContext::new("wlan0");
        assert!(!bus.interested(&Event::DppProgress { stage: "auth".into() }, &ctx));
        assert!(bus.interested(&Event::ScanDone { success: true }, &ctx));
    }

    #[test]
    fn wps_signals_use_the_wps_interface() {
        assert_eq!(signal_interface(&Event::WpsSuccess), WPS_INTERFACE);
        assert_eq!(
            signal_interface(&Event::ScanDone { success: false }),
            IFACE_INTERFACE
        );
    }
}
