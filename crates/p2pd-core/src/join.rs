// ── Group-join coordinator ──
//
// Joining an existing group is a two-step affair: a targeted scan is
// issued now, and the actual join happens on a later loop iteration
// once the scan results arrive. In between, the attempt is "pending".
//
//   IDLE ──begin──▶ SCAN_PENDING ──results──▶ JOINED | FAILED
//                        │
//                        └──stop-find / cancel-connect / ticket──▶ IGNORED
//
// Every exit removes the temporary network profile and releases the
// radio work, and resolves the caller's ticket exactly once.

use serde::Serialize;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::P2pSettings;
use crate::engine::{GroupJoin, GroupParams, P2pEngine};
use crate::error::StatusError;
use crate::model::{
    JoinTarget, MacAddr, NetworkId, NewNetwork, Passphrase, RadioWorkId, ScanEntry, Ssid,
};

/// How a join attempt that did not fail ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinOutcome {
    Joined,
    /// Abandoned before scan results arrived; no join was attempted.
    Cancelled,
}

type JoinReply = Result<JoinOutcome, StatusError>;

// ── JoinTicket ──────────────────────────────────────────────────────

/// Caller-side handle for a pending join.
///
/// `wait` resolves once the coordinator reaches a terminal state;
/// `cancel` asks the event loop to abandon the attempt.
#[derive(Debug)]
pub struct JoinTicket {
    id: Uuid,
    outcome: oneshot::Receiver<JoinReply>,
    cancel: CancellationToken,
}

impl JoinTicket {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub async fn wait(self) -> JoinReply {
        self.outcome
            .await
            .unwrap_or_else(|_| Err(StatusError::unknown("join coordinator shut down")))
    }
}

impl Serialize for JoinTicket {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("JoinTicket", 1)?;
        s.serialize_field("join_id", &self.id)?;
        s.end()
    }
}

// ── Coordinator ─────────────────────────────────────────────────────

/// Parameters of a join request that already passed validation.
#[derive(Debug, Clone)]
pub struct JoinRequest {
    pub ssid: Ssid,
    pub passphrase: Passphrase,
    pub group_owner: MacAddr,
    pub freq: u32,
}

#[derive(Debug)]
struct PendingJoin {
    id: Uuid,
    iface: String,
    network: NetworkId,
    work: RadioWorkId,
    target: JoinTarget,
    cancel: CancellationToken,
    reply: oneshot::Sender<JoinReply>,
}

/// Owner of the single pending-join slot.
#[derive(Debug, Default)]
pub struct JoinCoordinator {
    pending: Option<PendingJoin>,
}

impl JoinCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending_iface(&self) -> Option<&str> {
        self.pending.as_ref().map(|p| p.iface.as_str())
    }

    /// Token the event loop watches to notice ticket-side cancellation.
    pub fn cancel_token(&self) -> Option<CancellationToken> {
        self.pending.as_ref().map(|p| p.cancel.clone())
    }

    /// IDLE → SCAN_PENDING.
    ///
    /// Refuses while another join is pending; the slot is never
    /// overwritten. On any failure nothing is left behind.
    pub fn begin<E: P2pEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        iface: &str,
        request: JoinRequest,
    ) -> Result<JoinTicket, StatusError> {
        if let Some(pending) = &self.pending {
            return Err(StatusError::unknown(format!(
                "group join {} already pending on {}",
                pending.id, pending.iface
            )));
        }

        debug!(iface, "stopping discovery before group join");
        engine.stop_find(iface);

        let bssid = (!request.group_owner.is_any()).then_some(request.group_owner);
        let target = JoinTarget {
            ssid: request.ssid.clone(),
            bssid,
            freq: request.freq,
        };
        let network = engine
            .add_network(
                iface,
                NewNetwork::temporary_group(request.ssid, request.passphrase, bssid),
            )
            .map_err(|e| {
                warn!(iface, error = %e, "cannot construct a network for group join");
                StatusError::unknown("Failed to start scan.")
            })?;

        let work = match engine.start_join_scan(iface, &target) {
            Ok(work) => work,
            Err(e) => {
                warn!(iface, error = %e, "group join scan refused");
                remove_temporary(engine, iface, network);
                return Err(StatusError::unknown("Failed to start scan."));
            }
        };

        let (reply, outcome) = oneshot::channel();
        let cancel = CancellationToken::new();
        let id = Uuid::new_v4();
        info!(iface, %id, ssid = %target.ssid, network = %network, "group join scan pending");
        self.pending = Some(PendingJoin {
            id,
            iface: iface.to_owned(),
            network,
            work,
            target,
            cancel: cancel.clone(),
            reply,
        });

        Ok(JoinTicket {
            id,
            outcome,
            cancel,
        })
    }

    /// SCAN_PENDING → JOINED | FAILED when the matching scan completes.
    /// Results for anything else are ignored.
    pub fn on_scan_results<E: P2pEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        settings: &P2pSettings,
        iface: &str,
        work: RadioWorkId,
        results: &[ScanEntry],
    ) {
        let Some(pending) = self
            .pending
            .take_if(|p| p.iface == iface && p.work == work)
        else {
            debug!(iface, work = work.0, "ignoring scan results with no pending join");
            return;
        };

        engine.release_radio_work(iface, work);

        let join = GroupJoin {
            network: pending.network,
            target: pending.target.clone(),
            join_limit: settings.join_limit,
            // Client joins never request EDMG.
            params: GroupParams::from_settings(settings, false),
        };
        let result = engine.join_group(iface, &join, results);
        remove_temporary(engine, iface, pending.network);

        let reply = match result {
            Ok(()) => {
                info!(iface, id = %pending.id, "group join succeeded");
                Ok(JoinOutcome::Joined)
            }
            Err(e) => {
                warn!(iface, id = %pending.id, error = %e, "group join failed");
                Err(StatusError::unknown(format!("failed to join group: {e}")))
            }
        };
        let _ = pending.reply.send(reply);
    }

    /// SCAN_PENDING → IGNORED. Idempotent; returns whether anything was
    /// pending. `iface` restricts abandonment to joins on that interface.
    pub fn abandon<E: P2pEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        iface: Option<&str>,
        reason: &str,
    ) -> bool {
        let Some(pending) = self
            .pending
            .take_if(|p| iface.is_none_or(|name| name == p.iface))
        else {
            return false;
        };

        info!(iface = %pending.iface, id = %pending.id, reason, "abandoning pending group join");
        engine.release_radio_work(&pending.iface, pending.work);
        remove_temporary(engine, &pending.iface, pending.network);
        let _ = pending.reply.send(Ok(JoinOutcome::Cancelled));
        true
    }

    /// Abandon if the pending join's ticket was cancelled.
    pub fn reap_cancelled<E: P2pEngine + ?Sized>(&mut self, engine: &mut E) -> bool {
        let cancelled = self
            .pending
            .as_ref()
            .is_some_and(|p| p.cancel.is_cancelled());
        cancelled && self.abandon(engine, None, "join ticket cancelled")
    }
}

fn remove_temporary<E: P2pEngine + ?Sized>(engine: &mut E, iface: &str, network: NetworkId) {
    if let Err(e) = engine.remove_network(iface, network) {
        warn!(iface, network = %network, error = %e, "failed to remove temporary join network");
    }
}
