//! End-to-end behavior of the supervisor event loop against the
//! simulated engine.

#![cfg(all(feature = "legacy-bus", feature = "binding"))]
#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use pretty_assertions::assert_eq;
use tokio::sync::mpsc;

use p2pd_core::model::{IfaceContext, MacAddr, RawAddr, ScanEntry};
use p2pd_core::notify::SupplicantState;
use p2pd_core::notify::legacy_bus::{BUS_ROOT, BusSignal, P2P_INTERFACE};
use p2pd_core::sim::SimEngine;
use p2pd_core::{
    CallbackMessage, Event, GroupConfigRequest, InterfaceHandle, JoinOutcome, Operation,
    StatusCode, Supervisor, SupervisorConfig,
};

const GO: &str = "00:11:22:33:44:55";

async fn started(engine: &SimEngine) -> Supervisor {
    let supervisor = Supervisor::new(SupervisorConfig::default(), engine.clone());
    supervisor.start().await.unwrap();
    supervisor.settle().await.unwrap();
    supervisor
}

async fn with_p2p0() -> (SimEngine, Supervisor, Arc<InterfaceHandle>) {
    let engine = SimEngine::new();
    engine.add_interface(IfaceContext::new("p2p0"));
    let supervisor = started(&engine).await;
    let handle = supervisor.interface("p2p0").unwrap();
    (engine, supervisor, handle)
}

fn join_request(passphrase: &str) -> GroupConfigRequest {
    GroupConfigRequest {
        ssid: Vec::new(),
        ssid_text: Some("MyNet".into()),
        passphrase: passphrase.into(),
        persistent: false,
        freq: 0,
        peer: GO.parse().unwrap(),
        join_existing_group: true,
    }
}

fn my_net() -> ScanEntry {
    ScanEntry {
        bssid: GO.parse().unwrap(),
        ssid: "MyNet".into(),
        freq: 2437,
    }
}

fn drain<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> Vec<T> {
    let mut out = Vec::new();
    while let Ok(item) = rx.try_recv() {
        out.push(item);
    }
    out
}

fn drain_bus(rx: &mut tokio::sync::broadcast::Receiver<Arc<BusSignal>>) -> Vec<Arc<BusSignal>> {
    let mut out = Vec::new();
    while let Ok(signal) = rx.try_recv() {
        out.push(signal);
    }
    out
}

// ── Interface guard ─────────────────────────────────────────────────

#[tokio::test]
async fn removed_interface_invalidates_handle() {
    let (engine, supervisor, handle) = with_p2p0().await;
    supervisor.execute(&handle, Operation::GetName).await.unwrap();

    engine.remove_interface("p2p0");
    supervisor.settle().await.unwrap();
    assert!(!handle.is_valid());
    assert!(supervisor.interface("p2p0").is_none());

    let before = engine.mutations();
    for _ in 0..3 {
        let err = supervisor
            .execute(&handle, Operation::AddNetwork)
            .await
            .unwrap_err();
        assert_eq!(err.code(), StatusCode::FailureIfaceInvalid);
    }
    assert_eq!(engine.mutations(), before);
    supervisor.shutdown().await;
}

#[tokio::test]
async fn re_added_interface_gets_a_fresh_handle() {
    let (engine, supervisor, old) = with_p2p0().await;
    engine.remove_interface("p2p0");
    engine.add_interface(IfaceContext::new("p2p0"));
    supervisor.settle().await.unwrap();

    let new = supervisor.interface("p2p0").unwrap();
    assert!(!old.is_valid());
    assert!(new.is_valid());
    assert!(supervisor.execute(&old, Operation::GetName).await.is_err());
    assert!(supervisor.execute(&new, Operation::GetName).await.is_ok());
    supervisor.shutdown().await;
}

#[tokio::test]
async fn callbacks_cannot_be_registered_on_stale_handles() {
    let (engine, supervisor, handle) = with_p2p0().await;
    engine.remove_interface("p2p0");
    supervisor.settle().await.unwrap();
    let err = supervisor.subscribe(&handle).await.unwrap_err();
    assert_eq!(err.code(), StatusCode::FailureIfaceInvalid);
    supervisor.shutdown().await;
}

// ── Group join ──────────────────────────────────────────────────────

#[tokio::test]
async fn join_scans_then_joins_and_cleans_up() {
    let (engine, supervisor, handle) = with_p2p0().await;
    let mut events = supervisor.subscribe(&handle).await.unwrap();
    supervisor
        .execute(&handle, Operation::Find { timeout_secs: 30 })
        .await
        .unwrap();
    assert!(engine.is_finding("p2p0"));

    let ticket = supervisor
        .execute(&handle, Operation::AddGroupWithConfig(join_request("12345678")))
        .await
        .unwrap()
        .into_ticket()
        .unwrap();
    assert!(!engine.is_finding("p2p0"));

    let scans = engine.scans();
    assert_eq!(scans.len(), 1);
    assert_eq!(scans[0].target.ssid.as_bytes(), b"MyNet");
    assert_eq!(scans[0].target.bssid, Some(GO.parse::<MacAddr>().unwrap()));
    assert_eq!(engine.networks("p2p0").len(), 1);

    engine.deliver_scan_results("p2p0", vec![my_net()]).unwrap();
    assert_eq!(ticket.wait().await.unwrap(), JoinOutcome::Joined);
    supervisor.settle().await.unwrap();

    assert!(engine.networks("p2p0").is_empty());
    assert_eq!(engine.outstanding_radio_work(), 0);
    assert_eq!(supervisor.interfaces(), vec!["p2p-p2p0-0", "p2p0"]);

    let messages: Vec<CallbackMessage> = drain(&mut events);
    let started = messages
        .iter()
        .find(|m| matches!(m.event, Event::GroupStarted { .. }))
        .unwrap();
    assert_eq!(started.iface, "p2p0");
    supervisor.shutdown().await;
}

#[tokio::test]
async fn short_passphrase_is_rejected_before_anything_happens() {
    let (engine, supervisor, handle) = with_p2p0().await;
    supervisor
        .execute(&handle, Operation::Find { timeout_secs: 30 })
        .await
        .unwrap();

    let err = supervisor
        .execute(&handle, Operation::AddGroupWithConfig(join_request("1234")))
        .await
        .unwrap_err();
    assert_eq!(err.code(), StatusCode::FailureArgsInvalid);
    assert!(engine.scans().is_empty());
    assert!(engine.networks("p2p0").is_empty());
    assert!(engine.is_finding("p2p0"));
    supervisor.shutdown().await;
}

#[tokio::test]
async fn invalid_group_owner_address_is_rejected() {
    let (engine, supervisor, handle) = with_p2p0().await;
    let request = GroupConfigRequest {
        peer: RawAddr::new(vec![0, 0x11, 0x22]),
        ..join_request("12345678")
    };
    let err = supervisor
        .execute(&handle, Operation::AddGroupWithConfig(request))
        .await
        .unwrap_err();
    assert_eq!(err.code(), StatusCode::FailureArgsInvalid);
    assert!(engine.scans().is_empty());
    supervisor.shutdown().await;
}

#[tokio::test]
async fn stop_find_abandons_join_and_late_results_are_ignored() {
    let (engine, supervisor, handle) = with_p2p0().await;
    let ticket = supervisor
        .execute(&handle, Operation::AddGroupWithConfig(join_request("12345678")))
        .await
        .unwrap()
        .into_ticket()
        .unwrap();

    supervisor.execute(&handle, Operation::StopFind).await.unwrap();
    assert_eq!(ticket.wait().await.unwrap(), JoinOutcome::Cancelled);
    assert!(engine.networks("p2p0").is_empty());
    assert_eq!(engine.outstanding_radio_work(), 0);

    engine.deliver_scan_results("p2p0", vec![my_net()]).unwrap();
    supervisor.settle().await.unwrap();
    assert!(engine.joins().is_empty());
    assert!(engine.groups().is_empty());
    supervisor.shutdown().await;
}

#[tokio::test]
async fn cancel_connect_abandons_pending_join() {
    let (engine, supervisor, handle) = with_p2p0().await;
    let ticket = supervisor
        .execute(&handle, Operation::AddGroupWithConfig(join_request("12345678")))
        .await
        .unwrap()
        .into_ticket()
        .unwrap();

    supervisor
        .execute(&handle, Operation::CancelConnect)
        .await
        .unwrap();
    assert_eq!(ticket.wait().await.unwrap(), JoinOutcome::Cancelled);
    assert!(engine.networks("p2p0").is_empty());

    let err = supervisor
        .execute(&handle, Operation::CancelConnect)
        .await
        .unwrap_err();
    assert_eq!(err.code(), StatusCode::FailureUnknown);
    supervisor.shutdown().await;
}

#[tokio::test]
async fn cancelling_the_ticket_abandons_the_join() {
    let (engine, supervisor, handle) = with_p2p0().await;
    let ticket = supervisor
        .execute(&handle, Operation::AddGroupWithConfig(join_request("12345678")))
        .await
        .unwrap()
        .into_ticket()
        .unwrap();

    ticket.cancel();
    assert_eq!(ticket.wait().await.unwrap(), JoinOutcome::Cancelled);
    supervisor.settle().await.unwrap();
    assert!(engine.networks("p2p0").is_empty());
    assert_eq!(engine.outstanding_radio_work(), 0);
    supervisor.shutdown().await;
}

#[tokio::test]
async fn only_one_join_may_be_pending() {
    let (engine, supervisor, handle) = with_p2p0().await;
    let first = supervisor
        .execute(&handle, Operation::AddGroupWithConfig(join_request("12345678")))
        .await
        .unwrap()
        .into_ticket()
        .unwrap();

    let err = supervisor
        .execute(&handle, Operation::AddGroupWithConfig(join_request("87654321")))
        .await
        .unwrap_err();
    assert_eq!(err.code(), StatusCode::FailureUnknown);
    assert_eq!(engine.scans().len(), 1);

    engine.deliver_scan_results("p2p0", vec![my_net()]).unwrap();
    assert_eq!(first.wait().await.unwrap(), JoinOutcome::Joined);
    supervisor.shutdown().await;
}

#[tokio::test]
async fn interface_removal_abandons_its_join() {
    let (engine, supervisor, handle) = with_p2p0().await;
    let ticket = supervisor
        .execute(&handle, Operation::AddGroupWithConfig(join_request("12345678")))
        .await
        .unwrap()
        .into_ticket()
        .unwrap();

    engine.remove_interface("p2p0");
    assert_eq!(ticket.wait().await.unwrap(), JoinOutcome::Cancelled);
    assert_eq!(engine.outstanding_radio_work(), 0);
    supervisor.shutdown().await;
}

#[tokio::test]
async fn shutdown_abandons_pending_join() {
    let (_engine, supervisor, handle) = with_p2p0().await;
    let ticket = supervisor
        .execute(&handle, Operation::AddGroupWithConfig(join_request("12345678")))
        .await
        .unwrap()
        .into_ticket()
        .unwrap();

    supervisor.shutdown().await;
    assert_eq!(ticket.wait().await.unwrap(), JoinOutcome::Cancelled);
    let err = supervisor
        .execute(&handle, Operation::GetName)
        .await
        .unwrap_err();
    assert_eq!(err.code(), StatusCode::FailureUnknown);
}

#[tokio::test]
async fn go_path_returns_without_waiting() {
    let (engine, supervisor, handle) = with_p2p0().await;
    let request = GroupConfigRequest {
        join_existing_group: false,
        peer: RawAddr::default(),
        freq: 5180,
        ..join_request("12345678")
    };
    let outcome = supervisor
        .add_group_with_config(&handle, request)
        .await
        .unwrap();
    assert_eq!(outcome, None);
    assert!(engine.scans().is_empty());
    let groups = engine.groups();
    assert_eq!(groups.len(), 1);
    assert!(groups[0].go);
    assert_eq!(groups[0].ssid, "MyNet");
    supervisor.shutdown().await;
}

// ── Notification fan-out ────────────────────────────────────────────

#[tokio::test]
async fn lifecycle_reaches_both_observers() {
    let engine = SimEngine::new();
    let supervisor = started(&engine).await;
    let mut bus = supervisor.bus_signals();

    engine.add_interface(IfaceContext::new("wlan0"));
    supervisor.settle().await.unwrap();

    let signals = drain_bus(&mut bus);
    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0].path, BUS_ROOT);
    assert_eq!(signals[0].member, "InterfaceAdded");
    assert_eq!(signals[0].args["ifname"], "wlan0");

    let handle = supervisor.interface("wlan0").unwrap();
    let mut events = supervisor.subscribe(&handle).await.unwrap();
    engine.remove_interface("wlan0");
    supervisor.settle().await.unwrap();

    let messages = drain(&mut events);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].event, Event::InterfaceRemoved);
    let signals = drain_bus(&mut bus);
    assert_eq!(signals[0].member, "InterfaceRemoved");
    supervisor.shutdown().await;
}

#[tokio::test]
async fn management_interface_rules() {
    let engine = SimEngine::new();
    let supervisor = started(&engine).await;
    let mut bus = supervisor.bus_signals();

    engine.add_interface(IfaceContext::new("wlan0"));
    engine.add_interface(IfaceContext::management("p2p-dev-wlan0", "wlan0"));
    supervisor.settle().await.unwrap();

    // Only the station interface gets a bus object.
    let added = drain_bus(&mut bus);
    assert_eq!(added.len(), 1);
    assert_eq!(added[0].args["ifname"], "wlan0");
    let wlan0_path = added[0].args["path"].as_str().unwrap().to_owned();

    // The binding layer still tracks the management interface.
    let handle = supervisor.interface("p2p-dev-wlan0").unwrap();
    let mut events = supervisor.subscribe(&handle).await.unwrap();

    engine.inject(
        "p2p-dev-wlan0",
        Event::StateChanged {
            state: SupplicantState::Scanning,
        },
    );
    let found = Event::DeviceFound {
        peer: GO.parse().unwrap(),
        device_name: "tv".into(),
        new_peer: true,
    };
    engine.inject("p2p-dev-wlan0", found.clone());
    supervisor.settle().await.unwrap();

    let messages = drain(&mut events);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].event, found);

    let signals = drain_bus(&mut bus);
    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0].path, wlan0_path);
    assert_eq!(signals[0].interface, P2P_INTERFACE);
    assert_eq!(signals[0].member, "DeviceFound");
    supervisor.shutdown().await;
}

#[tokio::test]
async fn disabled_observer_hears_nothing() {
    let engine = SimEngine::new();
    let mut config = SupervisorConfig::default();
    config.observers.legacy_bus = false;
    let supervisor = Supervisor::new(config, engine.clone());
    let mut bus = supervisor.bus_signals();
    supervisor.start().await.unwrap();

    engine.add_interface(IfaceContext::new("wlan0"));
    supervisor.settle().await.unwrap();
    assert!(drain_bus(&mut bus).is_empty());

    let handle = supervisor.interface("wlan0").unwrap();
    assert!(supervisor.subscribe(&handle).await.is_ok());
    supervisor.shutdown().await;
}

#[tokio::test]
async fn dropped_subscriber_is_pruned() {
    let (engine, supervisor, handle) = with_p2p0().await;
    let events = supervisor.subscribe(&handle).await.unwrap();
    assert_eq!(supervisor.callback_count("p2p0"), 1);
    drop(events);

    engine.inject("p2p0", Event::FindStopped);
    supervisor.settle().await.unwrap();
    assert_eq!(supervisor.callback_count("p2p0"), 0);
    supervisor.shutdown().await;
}

#[tokio::test]
async fn start_twice_fails() {
    let (_engine, supervisor, _handle) = with_p2p0().await;
    assert!(supervisor.start().await.is_err());
    supervisor.shutdown().await;
}
