//! Wi-Fi Direct (P2P) binding layer between a supplicant engine and its
//! IPC clients.
//!
//! The crate sits on top of a [`P2pEngine`] and owns the parts of a P2P
//! control surface that need more than a pass-through call:
//!
//! - **[`Supervisor`]**: owns the engine and runs a single event loop.
//!   Every caller [`Operation`] is routed through the interface guard,
//!   which rejects calls on interfaces that have gone away with a
//!   caller-chosen [`StatusCode`] before anything reaches the engine.
//!
//! - **[`JoinCoordinator`]**: joining an existing group is a scan
//!   followed by a join on a later loop iteration. The coordinator owns
//!   the single pending-join slot and guarantees the temporary network
//!   profile and radio work are released on every exit path.
//!
//! - **[`Notifier`]**: fans engine [`Event`]s out to the legacy message
//!   bus and to per-interface binding callbacks, each with its own
//!   filtering rules.
//!
//! [`SimEngine`](sim::SimEngine) is an in-memory engine used by the tests
//! and the `p2pd run` scenario harness.

pub mod command;
pub mod config;
mod dispatch;
pub mod engine;
pub mod error;
pub mod guard;
pub mod iface;
pub mod join;
pub mod model;
pub mod notify;
pub mod sim;
pub mod supervisor;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::requests::*;
pub use command::{Operation, Reply};
pub use config::{Feature, FeatureSet, ObserverSettings, P2pSettings, SupervisorConfig};
pub use engine::{EngineEvent, GroupParams, P2pEngine};
pub use error::{EngineError, StatusCode, StatusError};
pub use iface::{InterfaceHandle, InterfaceRegistry};
pub use join::{JoinCoordinator, JoinOutcome, JoinTicket};
pub use notify::{Event, EventScope, Notifier, Observer};
pub use supervisor::Supervisor;

#[cfg(feature = "binding")]
pub use notify::binding::{CallbackMessage, CallbackStatus, P2pIfaceCallback};
#[cfg(feature = "legacy-bus")]
pub use notify::legacy_bus::BusSignal;

pub use dispatch::{GO_INTENT_MAX, WPS_DEV_NAME_MAX_LEN};
