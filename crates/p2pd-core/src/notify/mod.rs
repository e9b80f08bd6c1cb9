// ── Notification fan-out ──
//
// Engine state transitions are turned into `Event`s and offered to every
// registered observer. Each observer decides for itself what it cares
// about; the notifier only applies the rules shared by all of them:
// compiled-out feature categories are dropped, and station-scoped events
// on management-only interfaces are suppressed.
//
// A failing observer is logged and skipped. It never affects the others
// or the engine.

#[cfg(feature = "binding")]
pub mod binding;
mod event;
#[cfg(feature = "legacy-bus")]
pub mod legacy_bus;

use std::collections::HashMap;

use tracing::{debug, trace, warn};

use crate::config::FeatureSet;
use crate::error::ObserverError;
use crate::model::IfaceContext;

pub use event::{Event, EventScope, SupplicantState};

// ── Observer ────────────────────────────────────────────────────────

pub trait Observer: Send {
    fn name(&self) -> &'static str;

    /// Inactive observers are skipped entirely.
    fn is_active(&self) -> bool {
        true
    }

    fn interested(&self, event: &Event, ctx: &IfaceContext) -> bool;

    fn on_event(&mut self, event: &Event, ctx: &IfaceContext) -> Result<(), ObserverError>;
}

/// Station-side state of a management-only interface belongs to the
/// station interface it piggybacks on, so nobody hears about it.
pub fn suppressed_on_management(event: &Event, ctx: &IfaceContext) -> bool {
    ctx.management_only && event.scope() == EventScope::Station
}

// ── Notifier ────────────────────────────────────────────────────────

pub struct Notifier {
    features: FeatureSet,
    observers: Vec<Box<dyn Observer>>,
    contexts: HashMap<String, IfaceContext>,
}

impl Notifier {
    pub fn new(features: FeatureSet) -> Self {
        Self {
            features,
            observers: Vec::new(),
            contexts: HashMap::new(),
        }
    }

    pub fn register(&mut self, observer: Box<dyn Observer>) {
        debug!(observer = observer.name(), active = observer.is_active(), "observer registered");
        self.observers.push(observer);
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    pub fn context(&self, iface: &str) -> Option<&IfaceContext> {
        self.contexts.get(iface)
    }

    /// Start tracking `ctx` and announce it.
    pub fn interface_added(&mut self, ctx: IfaceContext) -> usize {
        self.contexts.insert(ctx.name.clone(), ctx.clone());
        self.dispatch(&Event::InterfaceAdded, &ctx)
    }

    /// Announce the removal, then forget the interface.
    pub fn interface_removed(&mut self, iface: &str) -> usize {
        let Some(ctx) = self.contexts.get(iface).cloned() else {
            debug!(iface, "removal of untracked interface");
            return 0;
        };
        let delivered = self.dispatch(&Event::InterfaceRemoved, &ctx);
        self.contexts.remove(iface);
        delivered
    }

    /// Offer `event` from `iface` to every observer. Returns how many
    /// observers accepted it.
    pub fn notify(&mut self, iface: &str, event: &Event) -> usize {
        let Some(ctx) = self.contexts.get(iface).cloned() else {
            debug!(iface, event = event.name(), "dropping event for untracked interface");
            return 0;
        };
        self.dispatch(event, &ctx)
    }

    fn dispatch(&mut self, event: &Event, ctx: &IfaceContext) -> usize {
        if let Some(feature) = event.feature() {
            if !self.features.contains(feature) {
                trace!(event = event.name(), %feature, "feature not enabled");
                return 0;
            }
        }
        if suppressed_on_management(event, ctx) {
            trace!(iface = %ctx.name, event = event.name(), "suppressed on management interface");
            return 0;
        }

        let mut delivered = 0;
        for observer in &mut self.observers {
            if !observer.is_active() || !observer.interested(event, ctx) {
                continue;
            }
            match observer.on_event(event, ctx) {
                Ok(()) => delivered += 1,
                Err(e) => warn!(
                    observer = observer.name(),
                    iface = %ctx.name,
                    event = event.name(),
                    error = %e,
                    "observer failed"
                ),
            }
        }
        delivered
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::config::Feature;
    use crate::model::MacAddr;

    type Log = Arc<Mutex<Vec<(String, &'static str)>>>;

    struct Recorder {
        name: &'static str,
        log: Log,
        fail: bool,
        active: bool,
    }

    impl Recorder {
        fn boxed(name: &'static str, log: &Log) -> Box<Self> {
            Box::new(Self {
                name,
                log: Arc::clone(log),
                fail: false,
                active: true,
            })
        }
    }

    impl Observer for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        fn is_active(&self) -> bool {
            self.active
        }

        fn interested(&self, _event: &Event, _ctx: &IfaceContext) -> bool {
            true
        }

        fn on_event(&mut self, event: &Event, ctx: &IfaceContext) -> Result<(), ObserverError> {
            if self.fail {
                return Err(ObserverError::UnknownInterface {
                    iface: ctx.name.clone(),
                });
            }
            self.log
                .lock()
                .unwrap()
                .push((format!("{}:{}", self.name, ctx.name), event.name()));
            Ok(())
        }
    }

    fn peer_lost() -> Event {
        Event::DeviceLost {
            peer: MacAddr::new([0, 1, 2, 3, 4, 5]),
        }
    }

    #[test]
    fn failing_observer_does_not_block_the_rest() {
        let log = Log::default();
        let mut notifier = Notifier::new(FeatureSet::all());
        let mut broken = Recorder::boxed("broken", &log);
        broken.fail = true;
        notifier.register(broken);
        notifier.register(Recorder::boxed("ok", &log));

        notifier.interface_added(IfaceContext::new("wlan0"));
        assert_eq!(notifier.notify("wlan0", &peer_lost()), 1);
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[test]
    fn inactive_observers_are_skipped() {
        let log = Log::default();
        let mut notifier = Notifier::new(FeatureSet::all());
        let mut idle = Recorder::boxed("idle", &log);
        idle.active = false;
        notifier.register(idle);

        assert_eq!(notifier.interface_added(IfaceContext::new("wlan0")), 0);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn disabled_feature_drops_event() {
        let log = Log::default();
        let mut notifier = Notifier::new(FeatureSet::all().without(Feature::Wps));
        notifier.register(Recorder::boxed("rec", &log));
        notifier.interface_added(IfaceContext::new("wlan0"));

        assert_eq!(notifier.notify("wlan0", &Event::WpsSuccess), 0);
        assert_eq!(notifier.notify("wlan0", &Event::FindStopped), 1);
    }

    #[test]
    fn management_interfaces_hide_station_state() {
        let log = Log::default();
        let mut notifier = Notifier::new(FeatureSet::all());
        notifier.register(Recorder::boxed("rec", &log));
        notifier.interface_added(IfaceContext::management("p2p-dev-wlan0", "wlan0"));

        let scan = Event::ScanDone { success: true };
        assert_eq!(notifier.notify("p2p-dev-wlan0", &scan), 0);
        assert_eq!(notifier.notify("p2p-dev-wlan0", &peer_lost()), 1);
    }

    #[test]
    fn untracked_interfaces_are_ignored() {
        let log = Log::default();
        let mut notifier = Notifier::new(FeatureSet::all());
        notifier.register(Recorder::boxed("rec", &log));

        assert_eq!(notifier.notify("ghost", &Event::FindStopped), 0);
        assert_eq!(notifier.interface_removed("ghost"), 0);
    }

    #[test]
    fn removal_is_announced_before_forgetting() {
        let log = Log::default();
        let mut notifier = Notifier::new(FeatureSet::all());
        notifier.register(Recorder::boxed("rec", &log));
        notifier.interface_added(IfaceContext::new("wlan0"));

        assert_eq!(notifier.interface_removed("wlan0"), 1);
        assert!(notifier.context("wlan0").is_none());
        let names: Vec<_> = log.lock().unwrap().iter().map(|(_, e)| *e).collect();
        assert_eq!(names, vec!["InterfaceAdded", "InterfaceRemoved"]);
    }
}
