// ── Supervisor ──
//
// Owns the engine and runs the single event loop that serializes
// everything touching it: caller operations, engine events, join
// progress, and notification fan-out. Callers talk to the loop through
// a command channel and get answers over oneshot replies.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::command::{Command, CommandEnvelope, GroupConfigRequest, Operation, Reply};
use crate::config::{P2pSettings, SupervisorConfig};
use crate::dispatch::Dispatcher;
use crate::engine::{EngineEvent, P2pEngine};
#[cfg(feature = "binding")]
use crate::error::StatusCode;
use crate::error::StatusError;
use crate::guard::IfaceResolver;
#[cfg(feature = "binding")]
use crate::guard::validate_and_call;
use crate::iface::{InterfaceHandle, InterfaceRegistry};
use crate::join::{JoinCoordinator, JoinOutcome};
use crate::notify::Notifier;
#[cfg(feature = "binding")]
use crate::notify::binding::{
    BindingObserver, CallbackMessage, CallbackRegistry, ChannelCallback, P2pIfaceCallback,
};
#[cfg(feature = "legacy-bus")]
use crate::notify::legacy_bus::{BusSignal, LegacyBusObserver};

// ── Supervisor ──────────────────────────────────────────────────────

/// Handle to a running (or not yet started) P2P binding layer.
///
/// Cheaply cloneable. [`start()`](Self::start) spawns the event loop;
/// [`shutdown()`](Self::shutdown) stops it and abandons any pending
/// group join.
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<SupervisorInner>,
}

struct SupervisorInner {
    config: SupervisorConfig,
    registry: Arc<InterfaceRegistry>,
    #[cfg(feature = "binding")]
    callbacks: CallbackRegistry,
    #[cfg(feature = "legacy-bus")]
    bus_tx: tokio::sync::broadcast::Sender<Arc<BusSignal>>,
    command_tx: mpsc::Sender<CommandEnvelope>,
    /// Taken by `start`; `None` once the loop is running.
    pending_loop: Mutex<Option<(EventLoop, mpsc::Receiver<CommandEnvelope>)>>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Supervisor {
    /// Wire up observers and channels around `engine`. Does not start
    /// the loop.
    pub fn new(config: SupervisorConfig, engine: impl P2pEngine) -> Self {
        let registry = Arc::new(InterfaceRegistry::new());
        let (command_tx, command_rx) = mpsc::channel(config.command_channel_size.max(1));

        #[allow(unused_mut)]
        let mut notifier = Notifier::new(config.features);

        #[cfg(feature = "legacy-bus")]
        let bus_tx = {
            let bus = LegacyBusObserver::new(config.observers.legacy_bus, config.signal_channel_size);
            let tx = bus.sender();
            notifier.register(Box::new(bus));
            tx
        };

        #[cfg(feature = "binding")]
        let callbacks = {
            let callbacks = CallbackRegistry::new();
            notifier.register(Box::new(BindingObserver::new(
                config.observers.binding,
                callbacks.clone(),
            )));
            callbacks
        };

        let event_loop = EventLoop {
            engine: Box::new(engine),
            notifier,
            join: JoinCoordinator::new(),
            registry: Arc::clone(&registry),
            settings: config.p2p.clone(),
            #[cfg(feature = "binding")]
            callbacks: callbacks.clone(),
        };

        Self {
            inner: Arc::new(SupervisorInner {
                config,
                registry,
                #[cfg(feature = "binding")]
                callbacks,
                #[cfg(feature = "legacy-bus")]
                bus_tx,
                command_tx,
                pending_loop: Mutex::new(Some((event_loop, command_rx))),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.inner.config
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Spawn the event loop. Fails if it was already started.
    pub async fn start(&self) -> Result<(), StatusError> {
        let Some((event_loop, rx)) = self.inner.pending_loop.lock().await.take() else {
            return Err(StatusError::unknown("supervisor already started"));
        };
        let cancel = self.inner.cancel.child_token();
        let handle = tokio::spawn(event_loop_task(event_loop, rx, cancel));
        self.inner.task_handles.lock().await.push(handle);
        info!(
            legacy_bus = self.inner.config.observers.legacy_bus,
            binding = self.inner.config.observers.binding,
            "supervisor started"
        );
        Ok(())
    }

    /// Stop the event loop and wait for it to finish.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "event loop task ended abnormally");
            }
        }
        debug!("supervisor stopped");
    }

    // ── Interfaces ───────────────────────────────────────────────────

    /// Current handle for `name`, if the interface is live.
    pub fn interface(&self, name: &str) -> Option<Arc<InterfaceHandle>> {
        self.inner.registry.get(name)
    }

    pub fn interfaces(&self) -> Vec<String> {
        self.inner.registry.names()
    }

    // ── Operations ───────────────────────────────────────────────────

    /// Run `op` on the interface behind `handle`.
    pub async fn execute(
        &self,
        handle: &Arc<InterfaceHandle>,
        op: Operation,
    ) -> Result<Reply, StatusError> {
        self.send(Command::Execute {
            handle: Arc::clone(handle),
            op,
        })
        .await
    }

    /// Add a group with explicit credentials and, when joining, wait
    /// for the join to conclude. `None` means a group-owner group was
    /// started and there was nothing to wait for.
    pub async fn add_group_with_config(
        &self,
        handle: &Arc<InterfaceHandle>,
        request: GroupConfigRequest,
    ) -> Result<Option<JoinOutcome>, StatusError> {
        let reply = self
            .execute(handle, Operation::AddGroupWithConfig(request))
            .await?;
        match reply.into_ticket() {
            Some(ticket) => ticket.wait().await.map(Some),
            None => Ok(None),
        }
    }

    /// Wait until every command and engine event queued so far has been
    /// processed.
    pub async fn settle(&self) -> Result<(), StatusError> {
        self.send(Command::Settle).await.map(|_| ())
    }

    #[cfg(feature = "binding")]
    pub async fn register_callback(
        &self,
        handle: &Arc<InterfaceHandle>,
        callback: Box<dyn P2pIfaceCallback>,
    ) -> Result<(), StatusError> {
        self.send(Command::RegisterCallback {
            handle: Arc::clone(handle),
            callback,
        })
        .await
        .map(|_| ())
    }

    /// Register a channel-backed callback and hand back its receiver.
    #[cfg(feature = "binding")]
    pub async fn subscribe(
        &self,
        handle: &Arc<InterfaceHandle>,
    ) -> Result<mpsc::UnboundedReceiver<CallbackMessage>, StatusError> {
        let (callback, rx) = ChannelCallback::channel();
        self.register_callback(handle, Box::new(callback)).await?;
        Ok(rx)
    }

    #[cfg(feature = "binding")]
    pub fn callback_count(&self, iface: &str) -> usize {
        self.inner.callbacks.callback_count(iface)
    }

    /// Signals emitted on the legacy message bus from now on.
    #[cfg(feature = "legacy-bus")]
    pub fn bus_signals(&self) -> tokio::sync::broadcast::Receiver<Arc<BusSignal>> {
        self.inner.bus_tx.subscribe()
    }

    async fn send(&self, command: Command) -> Result<Reply, StatusError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.inner
            .command_tx
            .send(CommandEnvelope {
                command,
                response_tx: tx,
            })
            .await
            .map_err(|_| StatusError::unknown("supervisor is not running"))?;
        rx.await
            .map_err(|_| StatusError::unknown("supervisor stopped before replying"))?
    }
}

// ── Event loop ──────────────────────────────────────────────────────

struct EventLoop {
    engine: Box<dyn P2pEngine>,
    notifier: Notifier,
    join: JoinCoordinator,
    registry: Arc<InterfaceRegistry>,
    settings: P2pSettings,
    #[cfg(feature = "binding")]
    callbacks: CallbackRegistry,
}

impl IfaceResolver for EventLoop {
    fn interface_exists(&self, iface: &str) -> bool {
        self.engine.interface_exists(iface)
    }
}

impl EventLoop {
    /// Drain engine events until the engine has nothing more to say.
    /// Handling one event may queue others.
    fn pump(&mut self) {
        loop {
            let events = self.engine.drain_events();
            if events.is_empty() {
                break;
            }
            for event in events {
                self.on_engine_event(event);
            }
        }
    }

    fn on_engine_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::InterfaceAdded { iface } => {
                info!(iface = %iface.name, parent = ?iface.parent, "interface added");
                self.registry.register(&iface.name);
                self.notifier.interface_added(iface);
            }
            EngineEvent::InterfaceRemoved { iface } => {
                info!(iface = %iface, "interface removed");
                self.join
                    .abandon(self.engine.as_mut(), Some(&iface), "interface removed");
                self.registry.unregister(&iface);
                self.notifier.interface_removed(&iface);
            }
            EngineEvent::ScanResults {
                iface,
                work,
                results,
            } => {
                debug!(iface = %iface, work = work.0, bss = results.len(), "scan results");
                self.join.on_scan_results(
                    self.engine.as_mut(),
                    &self.settings,
                    &iface,
                    work,
                    &results,
                );
            }
            EngineEvent::Notification { iface, event } => {
                let delivered = self.notifier.notify(&iface, &event);
                debug!(iface = %iface, event = event.name(), delivered, "notification");
            }
        }
    }

    fn handle(&mut self, command: Command) -> Result<Reply, StatusError> {
        match command {
            Command::Execute { handle, op } => {
                let mut dispatcher = Dispatcher {
                    engine: self.engine.as_mut(),
                    join: &mut self.join,
                    settings: &self.settings,
                };
                dispatcher.dispatch(&handle, op)
            }
            #[cfg(feature = "binding")]
            Command::RegisterCallback { handle, callback } => validate_and_call(
                &handle,
                StatusCode::FailureIfaceInvalid,
                self,
                |state, iface| state.callbacks.register(iface, callback),
            )
            .map(|()| Reply::Ok),
            Command::Settle => Ok(Reply::Ok),
        }
    }
}

async fn join_cancelled(token: Option<CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

async fn event_loop_task(
    mut state: EventLoop,
    mut rx: mpsc::Receiver<CommandEnvelope>,
    cancel: CancellationToken,
) {
    let wake = state.engine.events_ready();
    state.pump();

    loop {
        let join_cancel = state.join.cancel_token();
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = join_cancelled(join_cancel) => {
                state.join.reap_cancelled(state.engine.as_mut());
            }
            envelope = rx.recv() => {
                let Some(envelope) = envelope else { break };
                state.pump();
                let result = state.handle(envelope.command);
                state.pump();
                let _ = envelope.response_tx.send(result);
            }
            () = wake.notified() => state.pump(),
        }
    }

    state
        .join
        .abandon(state.engine.as_mut(), None, "supervisor shutting down");
}
