//! Local mirror of duty completion and progress-point state
//!
//! The mirror is the authoritative-as-far-as-known local view: the
//! remote service is the source of truth, the mirror serves synchronous
//! reads without ever touching the network and degrades to "not yet
//! done" when the service is unreachable. All remote-affecting writes
//! funnel through one async gate so two concurrent observations of the
//! same fact cannot both dispatch; combined with the local short-circuit
//! this gives at-most-once dispatch per (duty, point) per process.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cooldown::{CooldownGate, OpClass, Throttled};
use crate::domain::{ActionId, DutyDescriptor, DutyId, ProgPoint};
use crate::gateway::{ProgressClient, RemoteError};
use crate::lookup::DutyLookup;

/// Failure of a mirror write path
///
/// Display prefers the most specific reason the taxonomy offers: a
/// moderation rejection carries its reason, a server error its status,
/// and a throttle the remaining wait.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Throttled(#[from] Throttled),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Optional client-side ground truth for completion
///
/// When the running game client can itself observe that a duty was
/// cleared, refresh consults it so a fresh load does not report false
/// negatives the service has not caught up on.
pub trait LocalCompletion: Send + Sync {
    fn completed_in_client(&self, duty: DutyId) -> Option<bool>;
}

/// Allowed progress points and their friendly names for one duty
#[derive(Debug, Clone, Default)]
struct PointSet {
    allowed: HashSet<ActionId>,
    names: HashMap<ActionId, String>,
}

impl PointSet {
    fn from_points(points: &[ProgPoint]) -> Self {
        let mut set = Self::default();
        for point in points {
            set.allowed.insert(point.id);
            if !point.name.is_empty() {
                set.names.insert(point.id, point.name.clone());
            }
        }
        set
    }
}

#[derive(Default)]
struct MirrorState {
    completed: HashSet<DutyId>,
    seen: HashMap<DutyId, HashSet<ActionId>>,
    active: Option<(DutyId, PointSet)>,
    catalogs: HashMap<DutyId, PointSet>,
}

/// Result of a bulk completion pass
#[derive(Debug, Clone, Default)]
pub struct BulkReport {
    pub newly_completed: Vec<DutyId>,
    pub rejected: Vec<DutyId>,
    pub already_local: Vec<DutyId>,
}

/// Result of a full reconciliation against the remote service
#[derive(Debug, Clone, Default)]
pub struct RefreshStats {
    pub checked: usize,
    pub completed: usize,
    pub skipped_custom: usize,
    pub from_client: usize,
}

pub struct ProgressMirror {
    state: RwLock<MirrorState>,
    // Serializes every remote-affecting write; coarse on purpose,
    // write volume is player-paced.
    write_gate: tokio::sync::Mutex<()>,
    client: Arc<dyn ProgressClient>,
    gate: Arc<CooldownGate>,
    local_check: Option<Arc<dyn LocalCompletion>>,
}

impl ProgressMirror {
    pub fn new(client: Arc<dyn ProgressClient>, gate: Arc<CooldownGate>) -> Self {
        Self {
            state: RwLock::new(MirrorState::default()),
            write_gate: tokio::sync::Mutex::new(()),
            client,
            gate,
            local_check: None,
        }
    }

    pub fn with_local_check(mut self, check: Arc<dyn LocalCompletion>) -> Self {
        self.local_check = Some(check);
        self
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, MirrorState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, MirrorState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    // === Synchronous reads (mirror-only, never touch the network) ===

    /// Whether the duty is known locally to be completed
    ///
    /// May under-report until the mirror has learned the true state.
    pub fn is_duty_completed_local(&self, duty: DutyId) -> bool {
        self.read().completed.contains(&duty)
    }

    /// Whether the point is known locally to be recorded
    pub fn is_point_seen_local(&self, duty: DutyId, point: ActionId) -> bool {
        self.read()
            .seen
            .get(&duty)
            .map(|points| points.contains(&point))
            .unwrap_or(false)
    }

    /// Membership of a point in the active duty's allowed set
    ///
    /// `None` when no context is loaded for this duty - callers are
    /// expected to fail closed on that.
    pub fn point_allowed(&self, duty: DutyId, point: ActionId) -> Option<bool> {
        let state = self.read();
        match &state.active {
            Some((active, set)) if *active == duty => Some(set.allowed.contains(&point)),
            _ => None,
        }
    }

    /// Friendly name of a point, from the active context or catalog cache
    pub fn point_name(&self, duty: DutyId, point: ActionId) -> Option<String> {
        let state = self.read();
        if let Some((active, set)) = &state.active {
            if *active == duty {
                if let Some(name) = set.names.get(&point) {
                    return Some(name.clone());
                }
            }
        }
        state
            .catalogs
            .get(&duty)
            .and_then(|set| set.names.get(&point))
            .cloned()
    }

    pub fn active_duty(&self) -> Option<DutyId> {
        self.read().active.as_ref().map(|(duty, _)| *duty)
    }

    /// Snapshot of locally-known completed duties
    pub fn completed_duties(&self) -> Vec<DutyId> {
        let mut duties: Vec<DutyId> = self.read().completed.iter().copied().collect();
        duties.sort();
        duties
    }

    /// Snapshot of points recorded for a duty
    pub fn seen_points(&self, duty: DutyId) -> Vec<ActionId> {
        let mut points: Vec<ActionId> = self
            .read()
            .seen
            .get(&duty)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        points.sort();
        points
    }

    // === Context management ===

    /// Load the allowed-point context for the duty being entered
    ///
    /// No-op when the context is already active; re-entry into a duty
    /// visited this session is served from the per-duty cache without a
    /// network call.
    pub async fn load_active_duty(&self, duty: DutyId) -> Result<(), SyncError> {
        {
            let state = self.read();
            if matches!(&state.active, Some((active, _)) if *active == duty) {
                debug!(%duty, "load_active_duty: context already active");
                return Ok(());
            }
        }

        let cached = self.read().catalogs.get(&duty).cloned();
        if let Some(set) = cached {
            debug!(%duty, "load_active_duty: installing cached point set");
            self.write().active = Some((duty, set));
            return Ok(());
        }

        let points = self
            .gate
            .run_gated(OpClass::Read, || self.client.point_catalog(duty))
            .await??;

        let set = PointSet::from_points(&points);
        info!(%duty, points = set.allowed.len(), "loaded progress point catalog");

        let mut state = self.write();
        state.catalogs.insert(duty, set.clone());
        state.active = Some((duty, set));
        Ok(())
    }

    /// Drop the active context (instance leave); catalog cache survives
    pub fn clear_active_duty(&self) {
        let mut state = self.write();
        if state.active.take().is_some() {
            debug!("clear_active_duty: context cleared");
        }
    }

    // === Write paths (remote first, local on confirmed success) ===

    /// Record the duty as completed
    ///
    /// Returns `Ok(false)` when the mirror already holds the flag and no
    /// remote call was made. The local flag is set only after the service
    /// confirms, so a crash mid-write cannot leave the mirror claiming a
    /// success the server never recorded.
    pub async fn mark_duty_completed(&self, duty: DutyId) -> Result<bool, SyncError> {
        if self.is_duty_completed_local(duty) {
            debug!(%duty, "mark_duty_completed: already recorded locally");
            return Ok(false);
        }

        let _guard = self.write_gate.lock().await;
        if self.is_duty_completed_local(duty) {
            return Ok(false);
        }

        let newly = self
            .gate
            .run_gated(OpClass::Write, || self.client.mark_duty_completed(duty))
            .await??;

        self.write().completed.insert(duty);
        info!(%duty, newly, "duty marked completed");
        Ok(true)
    }

    /// Record a progress point observation
    ///
    /// Same contract as [`mark_duty_completed`](Self::mark_duty_completed);
    /// point writes use the quick-action cooldown class since they fire
    /// mid-combat.
    pub async fn mark_point_seen(&self, duty: DutyId, point: ActionId) -> Result<bool, SyncError> {
        if self.is_point_seen_local(duty, point) {
            debug!(%duty, %point, "mark_point_seen: already recorded locally");
            return Ok(false);
        }

        let _guard = self.write_gate.lock().await;
        if self.is_point_seen_local(duty, point) {
            return Ok(false);
        }

        let newly = self
            .gate
            .run_gated(OpClass::Quick, || self.client.mark_point_completed(duty, point))
            .await??;

        self.write().seen.entry(duty).or_default().insert(point);
        info!(%duty, %point, newly, "progress point recorded");
        Ok(true)
    }

    /// Record many duties as completed in one service call
    ///
    /// Duties the mirror already holds are skipped before dispatch. A
    /// partial acceptance is overall success: the accepted subset is
    /// recorded locally and the rejected ids are logged, not retried.
    pub async fn mark_duties_completed_bulk(&self, duties: &[DutyId]) -> Result<BulkReport, SyncError> {
        debug!(count = duties.len(), "mark_duties_completed_bulk: called");
        let mut report = BulkReport::default();
        let pending: Vec<DutyId> = duties
            .iter()
            .copied()
            .filter(|duty| {
                let known = self.is_duty_completed_local(*duty);
                if known {
                    report.already_local.push(*duty);
                }
                !known
            })
            .collect();

        if pending.is_empty() {
            debug!("mark_duties_completed_bulk: nothing to dispatch");
            return Ok(report);
        }

        let _guard = self.write_gate.lock().await;
        let outcome = self
            .gate
            .run_gated(OpClass::Write, || self.client.mark_duties_completed(&pending))
            .await??;

        {
            let mut state = self.write();
            for duty in outcome.accepted() {
                state.completed.insert(*duty);
            }
        }

        report.newly_completed = outcome.accepted().to_vec();
        report.rejected = outcome.rejected().to_vec();
        if !report.rejected.is_empty() {
            warn!(rejected = ?report.rejected, "bulk completion rejected some duties");
        }
        info!(
            newly = report.newly_completed.len(),
            rejected = report.rejected.len(),
            "bulk completion applied"
        );
        Ok(report)
    }

    // === Asynchronous reads (mirror first, gateway fallback) ===

    /// Completion check with remote fallback and backfill
    ///
    /// Read paths never surface errors: throttles and service failures
    /// degrade to "not completed" with a logged diagnostic.
    pub async fn is_duty_completed(&self, duty: DutyId) -> bool {
        if self.is_duty_completed_local(duty) {
            return true;
        }
        match self
            .gate
            .run_gated(OpClass::Read, || self.client.duty_completed(duty))
            .await
        {
            Err(throttled) => {
                debug!(%duty, error = %throttled, "is_duty_completed: read throttled");
                false
            }
            Ok(Err(error)) => {
                warn!(%duty, error = %error, "is_duty_completed: service check failed, assuming not completed");
                false
            }
            Ok(Ok(true)) => {
                self.write().completed.insert(duty);
                true
            }
            Ok(Ok(false)) => false,
        }
    }

    /// Point check with remote fallback and backfill
    pub async fn is_point_seen(&self, duty: DutyId, point: ActionId) -> bool {
        if self.is_point_seen_local(duty, point) {
            return true;
        }
        match self
            .gate
            .run_gated(OpClass::Read, || self.client.point_completed(duty, point))
            .await
        {
            Err(throttled) => {
                debug!(%duty, %point, error = %throttled, "is_point_seen: read throttled");
                false
            }
            Ok(Err(error)) => {
                warn!(%duty, %point, error = %error, "is_point_seen: service check failed, assuming not seen");
                false
            }
            Ok(Ok(true)) => {
                self.write().seen.entry(duty).or_default().insert(point);
                true
            }
            Ok(Ok(false)) => false,
        }
    }

    /// Fetch a duty's point catalog (through the cooldown gate)
    pub async fn point_catalog(&self, duty: DutyId) -> Result<Vec<ProgPoint>, SyncError> {
        let points = self
            .gate
            .run_gated(OpClass::Read, || self.client.point_catalog(duty))
            .await??;
        Ok(points)
    }

    // === Maintenance ===

    /// Clear and repopulate completion state from the remote service
    ///
    /// Custom duties have no server-side record and are skipped. Per-duty
    /// read failures degrade to "unknown" rather than failing the pass;
    /// only a throttle aborts it. The optional client-side check fills in
    /// duties the service does not know about yet.
    pub async fn refresh_from_remote(&self, lookup: &dyn DutyLookup) -> Result<RefreshStats, SyncError> {
        debug!("refresh_from_remote: called");
        let duties = lookup.all_duties();

        // One gated read covers the whole reconciliation pass
        let (completed, stats) = self
            .gate
            .run_gated(OpClass::Read, || self.reconcile_completion(&duties))
            .await?;

        self.write().completed = completed;
        info!(
            checked = stats.checked,
            completed = stats.completed,
            skipped_custom = stats.skipped_custom,
            from_client = stats.from_client,
            "mirror refreshed from remote"
        );
        Ok(stats)
    }

    /// Query the service (and the optional client-side check) for every
    /// registered duty, building the fresh completion set
    async fn reconcile_completion(&self, duties: &[DutyDescriptor]) -> (HashSet<DutyId>, RefreshStats) {
        let mut completed = HashSet::new();
        let mut stats = RefreshStats::default();
        for descriptor in duties {
            if descriptor.is_custom() {
                stats.skipped_custom += 1;
                continue;
            }
            stats.checked += 1;
            match self.client.duty_completed(descriptor.id).await {
                Ok(true) => {
                    completed.insert(descriptor.id);
                }
                Ok(false) => {}
                Err(error) => {
                    warn!(duty = %descriptor.id, %error, "refresh: completion check failed, leaving unknown");
                }
            }
            if let Some(check) = &self.local_check {
                if check.completed_in_client(descriptor.id) == Some(true) && completed.insert(descriptor.id) {
                    stats.from_client += 1;
                }
            }
        }
        stats.completed = completed.len();
        (completed, stats)
    }

    /// Clear all local state; makes no remote calls
    pub fn reset(&self) {
        *self.write() = MirrorState::default();
        info!("mirror reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cooldown::GateConfig;
    use crate::domain::{DutyDescriptor, DutyKind};
    use crate::gateway::client::mock::MockProgressClient;
    use crate::lookup::StaticDutyLookup;
    use std::time::Duration;

    fn open_gate() -> Arc<CooldownGate> {
        // Long grace period: gating behavior is covered by cooldown tests
        Arc::new(CooldownGate::new(GateConfig {
            grace: Duration::from_secs(3600),
            ..GateConfig::default()
        }))
    }

    fn mirror_with(mock: MockProgressClient) -> (Arc<ProgressMirror>, Arc<MockProgressClient>) {
        let client = Arc::new(mock);
        let mirror = Arc::new(ProgressMirror::new(
            Arc::clone(&client) as Arc<dyn ProgressClient>,
            open_gate(),
        ));
        (mirror, client)
    }

    fn point(id: u32, name: &str) -> ProgPoint {
        ProgPoint {
            id: ActionId(id),
            name: name.to_string(),
            completed: false,
        }
    }

    #[tokio::test]
    async fn test_mark_duty_completed_short_circuits() {
        let (mirror, client) = mirror_with(MockProgressClient::new());

        assert!(mirror.mark_duty_completed(DutyId(1)).await.unwrap());
        assert!(!mirror.mark_duty_completed(DutyId(1)).await.unwrap());
        assert_eq!(client.write_calls(), 1, "second call must not reach the service");
    }

    #[tokio::test]
    async fn test_failed_write_leaves_mirror_unset() {
        let (mirror, client) = mirror_with(MockProgressClient::new());
        client.set_fail_writes(true);

        assert!(mirror.mark_duty_completed(DutyId(1)).await.is_err());
        assert!(!mirror.is_duty_completed_local(DutyId(1)));

        // A later attempt retries and succeeds
        client.set_fail_writes(false);
        assert!(mirror.mark_duty_completed(DutyId(1)).await.unwrap());
        assert!(mirror.is_duty_completed_local(DutyId(1)));
    }

    #[tokio::test]
    async fn test_concurrent_point_writes_dispatch_once() {
        let (mirror, client) = mirror_with(MockProgressClient::new());

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let mirror = Arc::clone(&mirror);
                tokio::spawn(async move { mirror.mark_point_seen(DutyId(2), ActionId(77)).await })
            })
            .collect();
        for task in tasks {
            task.await.expect("task").expect("write should succeed");
        }

        assert_eq!(client.write_calls(), 1, "exactly one remote write");
        assert!(mirror.is_point_seen_local(DutyId(2), ActionId(77)));
    }

    #[tokio::test]
    async fn test_async_read_backfills_mirror() {
        let (mirror, client) = mirror_with(MockProgressClient::new());
        client.completed.lock().expect("mock lock").insert(DutyId(4));

        assert!(!mirror.is_duty_completed_local(DutyId(4)));
        assert!(mirror.is_duty_completed(DutyId(4)).await);
        assert!(mirror.is_duty_completed_local(DutyId(4)));

        // Backfilled: no further service reads
        assert!(mirror.is_duty_completed(DutyId(4)).await);
        assert_eq!(client.read_calls(), 1);
    }

    #[tokio::test]
    async fn test_read_errors_degrade_to_false() {
        let (mirror, client) = mirror_with(MockProgressClient::new());
        client.set_fail_reads(true);

        assert!(!mirror.is_duty_completed(DutyId(4)).await);
        assert!(!mirror.is_point_seen(DutyId(4), ActionId(1)).await);
    }

    #[tokio::test]
    async fn test_load_active_duty_uses_session_cache_on_reentry() {
        let mock = MockProgressClient::new()
            .with_catalog(DutyId(5), vec![point(100, "Garuda"), point(101, "Titan")]);
        let (mirror, client) = mirror_with(mock);

        mirror.load_active_duty(DutyId(5)).await.unwrap();
        assert_eq!(mirror.point_allowed(DutyId(5), ActionId(100)), Some(true));
        assert_eq!(mirror.point_allowed(DutyId(5), ActionId(999)), Some(false));
        assert_eq!(mirror.point_name(DutyId(5), ActionId(101)).as_deref(), Some("Titan"));

        // Leave and re-enter: catalog comes from the per-duty cache
        mirror.clear_active_duty();
        assert_eq!(mirror.point_allowed(DutyId(5), ActionId(100)), None);
        mirror.load_active_duty(DutyId(5)).await.unwrap();
        assert_eq!(mirror.point_allowed(DutyId(5), ActionId(100)), Some(true));
        assert_eq!(client.catalog_calls(), 1);
    }

    #[tokio::test]
    async fn test_bulk_partial_applies_accepted_only() {
        let mock = MockProgressClient::new();
        mock.bulk_invalid.lock().expect("mock lock").insert(DutyId(3));
        let (mirror, _client) = mirror_with(mock);

        let report = mirror
            .mark_duties_completed_bulk(&[DutyId(1), DutyId(2), DutyId(3)])
            .await
            .unwrap();

        assert_eq!(report.newly_completed, vec![DutyId(1), DutyId(2)]);
        assert_eq!(report.rejected, vec![DutyId(3)]);
        assert!(mirror.is_duty_completed_local(DutyId(1)));
        assert!(mirror.is_duty_completed_local(DutyId(2)));
        assert!(!mirror.is_duty_completed_local(DutyId(3)));
    }

    #[tokio::test]
    async fn test_bulk_skips_locally_known() {
        let (mirror, client) = mirror_with(MockProgressClient::new());
        mirror.mark_duty_completed(DutyId(1)).await.unwrap();

        let report = mirror.mark_duties_completed_bulk(&[DutyId(1)]).await.unwrap();
        assert_eq!(report.already_local, vec![DutyId(1)]);
        assert!(report.newly_completed.is_empty());
        assert_eq!(client.write_calls(), 1, "bulk with nothing pending makes no call");
    }

    #[tokio::test]
    async fn test_refresh_skips_custom_duties() {
        let mock = MockProgressClient::new();
        mock.completed.lock().expect("mock lock").insert(DutyId(1));
        let (mirror, client) = mirror_with(mock);

        let mut lookup = StaticDutyLookup::new();
        lookup.insert(
            DutyDescriptor {
                id: DutyId(1),
                name: "Registered".to_string(),
                kind: DutyKind::Registered,
            },
            &[],
        );
        lookup.insert(
            DutyDescriptor {
                id: DutyId(9),
                name: "Custom".to_string(),
                kind: DutyKind::Custom,
            },
            &[],
        );

        let stats = mirror.refresh_from_remote(&lookup).await.unwrap();
        assert_eq!(stats.checked, 1);
        assert_eq!(stats.skipped_custom, 1);
        assert_eq!(stats.completed, 1);
        assert!(mirror.is_duty_completed_local(DutyId(1)));
        assert_eq!(client.read_calls(), 1, "custom duty must not be queried");
    }

    #[tokio::test]
    async fn test_refresh_consults_client_side_check() {
        struct AlwaysCleared;
        impl LocalCompletion for AlwaysCleared {
            fn completed_in_client(&self, _duty: DutyId) -> Option<bool> {
                Some(true)
            }
        }

        let client = Arc::new(MockProgressClient::new());
        let mirror = ProgressMirror::new(Arc::clone(&client) as Arc<dyn ProgressClient>, open_gate())
            .with_local_check(Arc::new(AlwaysCleared));

        let mut lookup = StaticDutyLookup::new();
        lookup.insert(
            DutyDescriptor {
                id: DutyId(1),
                name: "Registered".to_string(),
                kind: DutyKind::Registered,
            },
            &[],
        );

        let stats = mirror.refresh_from_remote(&lookup).await.unwrap();
        assert_eq!(stats.from_client, 1);
        assert!(mirror.is_duty_completed_local(DutyId(1)));
    }

    #[tokio::test]
    async fn test_reset_clears_everything() {
        let mock = MockProgressClient::new().with_catalog(DutyId(5), vec![point(100, "Garuda")]);
        let (mirror, _client) = mirror_with(mock);

        mirror.mark_duty_completed(DutyId(1)).await.unwrap();
        mirror.mark_point_seen(DutyId(5), ActionId(100)).await.unwrap();
        mirror.load_active_duty(DutyId(5)).await.unwrap();

        mirror.reset();

        assert!(!mirror.is_duty_completed_local(DutyId(1)));
        assert!(!mirror.is_point_seen_local(DutyId(5), ActionId(100)));
        assert_eq!(mirror.active_duty(), None);
    }

    #[tokio::test]
    async fn test_throttled_write_surfaces_remaining_wait() {
        let gate = Arc::new(CooldownGate::new(GateConfig {
            grace: Duration::ZERO,
            ..GateConfig::default()
        }));
        let client = Arc::new(MockProgressClient::new());
        let mirror = ProgressMirror::new(Arc::clone(&client) as Arc<dyn ProgressClient>, gate);

        mirror.mark_duty_completed(DutyId(1)).await.unwrap();
        let error = mirror.mark_duty_completed(DutyId(2)).await.unwrap_err();
        assert!(matches!(error, SyncError::Throttled(_)));
    }
}
