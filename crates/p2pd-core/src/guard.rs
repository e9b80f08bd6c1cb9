// ── Interface guard ──
//
// Every externally invocable operation runs through `validate_and_call`.
// The handle must still be valid and the engine must still know the
// interface; otherwise the caller's failure code comes back and the
// operation never runs.

use tracing::debug;

use crate::error::{StatusCode, StatusError};
use crate::iface::InterfaceHandle;

/// Resolves an interface name against live engine state. Never cached.
pub trait IfaceResolver {
    fn interface_exists(&self, iface: &str) -> bool;
}

/// Run `op` against the interface behind `handle`, or fail with
/// `failure` without running it.
pub fn validate_and_call<R, T, F>(
    handle: &InterfaceHandle,
    failure: StatusCode,
    resolver: &mut R,
    op: F,
) -> Result<T, StatusError>
where
    R: IfaceResolver + ?Sized,
    F: FnOnce(&mut R, &str) -> Result<T, StatusError>,
{
    let name = handle.name();
    if !handle.is_valid() || !resolver.interface_exists(name) {
        debug!(iface = name, code = %failure, "rejecting call on stale interface");
        return Err(StatusError::from_code(failure, name));
    }
    op(resolver, name)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::iface::InterfaceRegistry;

    #[derive(Default)]
    struct FakeEngine {
        live: HashSet<String>,
        calls: usize,
    }

    impl IfaceResolver for FakeEngine {
        fn interface_exists(&self, iface: &str) -> bool {
            self.live.contains(iface)
        }
    }

    fn bump(engine: &mut FakeEngine, _iface: &str) -> Result<usize, StatusError> {
        engine.calls += 1;
        Ok(engine.calls)
    }

    #[test]
    fn passes_through_when_live() {
        let registry = InterfaceRegistry::new();
        let handle = registry.register("wlan0");
        let mut engine = FakeEngine::default();
        engine.live.insert("wlan0".into());

        let out = validate_and_call(&handle, StatusCode::FailureIfaceInvalid, &mut engine, bump);
        assert_eq!(out.unwrap(), 1);
    }

    #[test]
    fn operation_errors_are_returned_verbatim() {
        let registry = InterfaceRegistry::new();
        let handle = registry.register("wlan0");
        let mut engine = FakeEngine::default();
        engine.live.insert("wlan0".into());

        let out: Result<(), _> =
            validate_and_call(&handle, StatusCode::FailureIfaceInvalid, &mut engine, |_, _| {
                Err(StatusError::args("bad"))
            });
        assert_eq!(out.unwrap_err(), StatusError::args("bad"));
    }

    #[test]
    fn invalid_handle_never_runs_operation() {
        let registry = InterfaceRegistry::new();
        let handle = registry.register("wlan0");
        registry.unregister("wlan0");
        let mut engine = FakeEngine::default();
        engine.live.insert("wlan0".into());

        for _ in 0..3 {
            let out = validate_and_call(&handle, StatusCode::FailureIfaceInvalid, &mut engine, bump);
            assert_eq!(out.unwrap_err().code(), StatusCode::FailureIfaceInvalid);
        }
        assert_eq!(engine.calls, 0);
    }

    #[test]
    fn engine_side_disappearance_is_observed_immediately() {
        let registry = InterfaceRegistry::new();
        let handle = registry.register("wlan0");
        let mut engine = FakeEngine::default();
        engine.live.insert("wlan0".into());
        validate_and_call(&handle, StatusCode::FailureIfaceInvalid, &mut engine, bump).unwrap();

        engine.live.clear();
        let out = validate_and_call(&handle, StatusCode::FailureIfaceUnknown, &mut engine, bump);
        assert_eq!(out.unwrap_err().code(), StatusCode::FailureIfaceUnknown);
        assert_eq!(engine.calls, 1);
    }
}
