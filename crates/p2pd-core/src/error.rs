// ── Core error types ──
//
// The boundary vocabulary is closed: every failure an operation can
// report maps onto exactly one `StatusCode`. Engine-level errors are
// translated per operation; the blanket `From` impl covers the common
// case where a refusal simply means "unknown failure".

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use thiserror::Error;

use crate::model::NetworkId;

// ── StatusCode ──────────────────────────────────────────────────────

/// Wire-stable status names returned across the IPC boundary.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    Success,
    FailureUnknown,
    FailureArgsInvalid,
    FailureIfaceInvalid,
    FailureIfaceUnknown,
    FailureIfaceDisabled,
    FailureNetworkInvalid,
    FailureNetworkUnknown,
    FailureUnsupported,
}

impl StatusCode {
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

// ── StatusError ─────────────────────────────────────────────────────

/// A failed operation, carrying one of the closed failure codes plus a
/// human-readable detail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatusError {
    // ── Interface lifecycle ──────────────────────────────────────────
    #[error("interface {iface} is no longer valid")]
    IfaceInvalid { iface: String },

    #[error("interface {iface} does not exist")]
    IfaceUnknown { iface: String },

    #[error("P2P is disabled on {iface}")]
    IfaceDisabled { iface: String },

    // ── Networks ─────────────────────────────────────────────────────
    #[error("network {id} is invalid")]
    NetworkInvalid { id: NetworkId },

    #[error("network {id} does not exist")]
    NetworkUnknown { id: NetworkId },

    // ── Arguments ────────────────────────────────────────────────────
    #[error("invalid arguments: {message}")]
    ArgsInvalid { message: String },

    // ── Engine outcomes ──────────────────────────────────────────────
    #[error("operation not supported: {message}")]
    Unsupported { message: String },

    #[error("operation failed: {message}")]
    Unknown { message: String },
}

impl StatusError {
    pub fn args(message: impl Into<String>) -> Self {
        Self::ArgsInvalid {
            message: message.into(),
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown {
            message: message.into(),
        }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }

    /// Build the error a guard returns when it rejects a call.
    ///
    /// `subject` names the interface for interface-scoped codes and is
    /// used as the message otherwise. `Success` is not a failure and
    /// degrades to `FailureUnknown`.
    pub fn from_code(code: StatusCode, subject: &str) -> Self {
        let iface = subject.to_owned();
        match code {
            StatusCode::FailureIfaceInvalid => Self::IfaceInvalid { iface },
            StatusCode::FailureIfaceUnknown => Self::IfaceUnknown { iface },
            StatusCode::FailureIfaceDisabled => Self::IfaceDisabled { iface },
            StatusCode::FailureNetworkInvalid => Self::NetworkInvalid {
                id: NetworkId::INVALID,
            },
            StatusCode::FailureNetworkUnknown => Self::NetworkUnknown {
                id: NetworkId::INVALID,
            },
            StatusCode::FailureArgsInvalid => Self::args(iface),
            StatusCode::FailureUnsupported => Self::unsupported(iface),
            StatusCode::FailureUnknown | StatusCode::Success => Self::unknown(iface),
        }
    }

    /// The closed-vocabulary code for this failure.
    pub fn code(&self) -> StatusCode {
        match self {
            Self::IfaceInvalid { .. } => StatusCode::FailureIfaceInvalid,
            Self::IfaceUnknown { .. } => StatusCode::FailureIfaceUnknown,
            Self::IfaceDisabled { .. } => StatusCode::FailureIfaceDisabled,
            Self::NetworkInvalid { .. } => StatusCode::FailureNetworkInvalid,
            Self::NetworkUnknown { .. } => StatusCode::FailureNetworkUnknown,
            Self::ArgsInvalid { .. } => StatusCode::FailureArgsInvalid,
            Self::Unsupported { .. } => StatusCode::FailureUnsupported,
            Self::Unknown { .. } => StatusCode::FailureUnknown,
        }
    }
}

// ── EngineError ─────────────────────────────────────────────────────

/// What the underlying supplicant engine reports when it refuses work.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("{what} not found")]
    NotFound { what: String },

    #[error("engine rejected request: {reason}")]
    Rejected { reason: String },

    #[error("not supported by the driver")]
    NotSupported,
}

impl EngineError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }
}

impl From<EngineError> for StatusError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotSupported => Self::unsupported(err.to_string()),
            EngineError::NotFound { .. } | EngineError::Rejected { .. } => {
                Self::unknown(err.to_string())
            }
        }
    }
}

// ── ObserverError ───────────────────────────────────────────────────

/// Failure inside a single notification observer. Logged by the
/// notifier, never propagated back to the engine.
#[derive(Debug, Error)]
pub enum ObserverError {
    #[error("no object registered for interface {iface}")]
    UnknownInterface { iface: String },

    #[error("interface {iface} has no parent to signal on")]
    MissingParent { iface: String },

    #[cfg(feature = "legacy-bus")]
    #[error("failed to encode signal arguments: {0}")]
    Encode(#[from] serde_json::Error),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn status_code_wire_names() {
        insta::assert_snapshot!(StatusCode::FailureIfaceInvalid.to_string(), @"FAILURE_IFACE_INVALID");
        assert_eq!(
            "FAILURE_ARGS_INVALID".parse::<StatusCode>().unwrap(),
            StatusCode::FailureArgsInvalid
        );
    }

    #[test]
    fn from_code_round_trips_every_failure() {
        for code in StatusCode::iter().filter(|c| !c.is_success()) {
            assert_eq!(StatusError::from_code(code, "wlan0").code(), code);
        }
    }

    #[test]
    fn success_is_not_a_failure() {
        assert_eq!(
            StatusError::from_code(StatusCode::Success, "x").code(),
            StatusCode::FailureUnknown
        );
    }

    #[test]
    fn engine_errors_map_to_status() {
        let err: StatusError = EngineError::NotSupported.into();
        assert_eq!(err.code(), StatusCode::FailureUnsupported);
        let err: StatusError = EngineError::rejected("busy").into();
        assert_eq!(err.code(), StatusCode::FailureUnknown);
        assert!(err.to_string().contains("busy"));
    }

    #[cfg(feature = "legacy-bus")]
    #[test]
    fn bus_encoding_failures_become_observer_errors() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = ObserverError::from(err);
        assert!(matches!(err, ObserverError::Encode(_)));
        assert!(err.to_string().starts_with("failed to encode signal arguments"));
    }
}
