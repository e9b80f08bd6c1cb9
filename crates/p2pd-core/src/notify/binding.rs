// ── Binding-layer observer ──
//
// Delivers events to callbacks that IPC clients registered per
// interface. P2P and AP events are routed to the owning P2P device so a
// client watching `p2p-dev-wlan0` also hears about its group
// interfaces. A callback that reports itself dead is dropped.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::{Event, EventScope, Observer};
use crate::error::{ObserverError, StatusError};
use crate::model::IfaceContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackStatus {
    Alive,
    Dead,
}

pub trait P2pIfaceCallback: Send + Sync {
    fn on_event(&mut self, iface: &str, event: &Event) -> CallbackStatus;
}

/// What a channel-backed callback forwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallbackMessage {
    pub iface: String,
    pub event: Event,
}

/// Callback forwarding into an unbounded channel; dead once the
/// receiver is dropped.
#[derive(Debug, Clone)]
pub struct ChannelCallback {
    tx: mpsc::UnboundedSender<CallbackMessage>,
}

impl ChannelCallback {
    pub fn new(tx: mpsc::UnboundedSender<CallbackMessage>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<CallbackMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl P2pIfaceCallback for ChannelCallback {
    fn on_event(&mut self, iface: &str, event: &Event) -> CallbackStatus {
        let message = CallbackMessage {
            iface: iface.to_owned(),
            event: event.clone(),
        };
        if self.tx.send(message).is_ok() {
            CallbackStatus::Alive
        } else {
            CallbackStatus::Dead
        }
    }
}

// ── CallbackRegistry ────────────────────────────────────────────────

/// Per-interface callback lists. A slot exists exactly while the
/// interface is alive.
#[derive(Clone, Default)]
pub struct CallbackRegistry {
    slots: Arc<DashMap<String, Vec<Box<dyn P2pIfaceCallback>>>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn open(&self, iface: &str) {
        self.slots.entry(iface.to_owned()).or_default();
    }

    pub(crate) fn close(&self, iface: &str) -> usize {
        self.slots.remove(iface).map_or(0, |(_, cbs)| cbs.len())
    }

    pub fn register(
        &self,
        iface: &str,
        callback: Box<dyn P2pIfaceCallback>,
    ) -> Result<(), StatusError> {
        let mut slot = self.slots.get_mut(iface).ok_or_else(|| StatusError::IfaceUnknown {
            iface: iface.to_owned(),
        })?;
        slot.push(callback);
        debug!(iface, callbacks = slot.len(), "callback registered");
        Ok(())
    }

    pub fn callback_count(&self, iface: &str) -> usize {
        self.slots.get(iface).map_or(0, |s| s.len())
    }

    fn deliver(&self, iface: &str, event: &Event) -> Result<usize, ObserverError> {
        let mut slot = self
            .slots
            .get_mut(iface)
            .ok_or_else(|| ObserverError::UnknownInterface {
                iface: iface.to_owned(),
            })?;
        let before = slot.len();
        slot.retain_mut(|cb| cb.on_event(iface, event) == CallbackStatus::Alive);
        let dropped = before - slot.len();
        if dropped > 0 {
            debug!(iface, dropped, "dropped dead callbacks");
        }
        Ok(slot.len())
    }
}

// ── BindingObserver ─────────────────────────────────────────────────

pub struct BindingObserver {
    enabled: bool,
    callbacks: CallbackRegistry,
}

impl BindingObserver {
    pub fn new(enabled: bool, callbacks: CallbackRegistry) -> Self {
        Self { enabled, callbacks }
    }
}

fn target_iface(event: &Event, ctx: &IfaceContext) -> String {
    match event.scope() {
        EventScope::P2p | EventScope::Ap => ctx.p2p_owner().to_owned(),
        EventScope::Lifecycle | EventScope::Station => ctx.name.clone(),
    }
}

impl Observer for BindingObserver {
    fn name(&self) -> &'static str {
        "binding"
    }

    fn is_active(&self) -> bool {
        self.enabled
    }

    fn interested(&self, event: &Event, _ctx: &IfaceContext) -> bool {
        !matches!(
            event,
            Event::BssAdded { .. }
                | Event::BssRemoved { .. }
                | Event::NetworkSelected { .. }
                | Event::ScanDone { .. }
                | Event::ServiceDiscoveryRequest { .. }
                | Event::P2pWpsFailed { .. }
                | Event::EapStatus { .. }
                | Event::MeshGroupStarted { .. }
                | Event::MeshGroupRemoved { .. }
                | Event::MeshPeerConnected { .. }
                | Event::MeshPeerDisconnected { .. }
        )
    }

    fn on_event(&mut self, event: &Event, ctx: &IfaceContext) -> Result<(), ObserverError> {
        match event {
            Event::InterfaceAdded => {
                self.callbacks.open(&ctx.name);
                Ok(())
            }
            Event::InterfaceRemoved => {
                let result = self.callbacks.deliver(&ctx.name, event).map(|_| ());
                let closed = self.callbacks.close(&ctx.name);
                trace!(iface = %ctx.name, closed, "callback slot closed");
                result
            }
            _ => {
                let target = target_iface(event, ctx);
                self.callbacks.deliver(&target, event).map(|_| ())
            }
        }
    }
}
