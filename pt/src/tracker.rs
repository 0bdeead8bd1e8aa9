//! Event filtering pipeline
//!
//! Consumes the in-world event feed and decides which actions count as
//! progress. A session tracks at most one duty at a time (driven by zone
//! changes); accepted observations are handed to the mirror's write path
//! as fire-and-forget tasks so the event-delivery context is never
//! blocked on network I/O.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::domain::{ActionId, DutyId, LocationId};
use crate::events::{ActorInfo, GameEvent};
use crate::lookup::DutyLookup;
use crate::mirror::ProgressMirror;

/// Source-filtering and session policy
#[derive(Debug, Clone)]
pub struct TrackerPolicy {
    /// Drop actions cast by the local player
    pub ignore_local_player: bool,
    /// Drop actions cast by party members
    pub ignore_party: bool,
    /// Clear the session de-duplication set when leaving an instance
    pub reset_on_leave: bool,
    /// Accept boss-looking sources when no allowed set is loaded
    ///
    /// Lower-confidence fallback: classifies by hostility and health
    /// total instead of the curated catalog. Off by default.
    pub boss_heuristic: bool,
    /// Minimum max-HP for the heuristic to call a source a boss
    pub boss_hp_floor: u64,
}

impl Default for TrackerPolicy {
    fn default() -> Self {
        Self {
            ignore_local_player: true,
            ignore_party: false,
            reset_on_leave: true,
            boss_heuristic: false,
            boss_hp_floor: 5_000_000,
        }
    }
}

#[derive(Debug, Default)]
struct Session {
    duty: Option<DutyId>,
    accepted: HashSet<(DutyId, ActionId)>,
}

/// Filters inbound events down to new, trackable progress observations
pub struct ActionTracker {
    mirror: Arc<ProgressMirror>,
    lookup: Arc<dyn DutyLookup>,
    policy: TrackerPolicy,
    session: Arc<Mutex<Session>>,
}

impl ActionTracker {
    pub fn new(mirror: Arc<ProgressMirror>, lookup: Arc<dyn DutyLookup>, policy: TrackerPolicy) -> Self {
        debug!(?policy, "ActionTracker::new: called");
        Self {
            mirror,
            lookup,
            policy,
            session: Arc::new(Mutex::new(Session::default())),
        }
    }

    /// The duty the session is currently tracking
    pub fn current_duty(&self) -> Option<DutyId> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner).duty
    }

    /// Process one inbound event
    pub async fn handle_event(&self, event: GameEvent) {
        match event {
            GameEvent::ZoneChanged { location } => self.zone_changed(location).await,
            GameEvent::ActionCast { action, source, location } => {
                self.action_cast(action, source, location).await;
            }
        }
    }

    async fn zone_changed(&self, location: LocationId) {
        let mapped = self.lookup.duty_for_location(location);

        let previous = {
            let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
            let previous = session.duty;
            session.duty = mapped;
            if mapped.is_none() && self.policy.reset_on_leave && !session.accepted.is_empty() {
                let cleared = session.accepted.len();
                session.accepted.clear();
                debug!(cleared, "session de-duplication set cleared on instance leave");
            }
            previous
        };

        match mapped {
            Some(duty) if previous != Some(duty) => {
                info!(%duty, %location, "entered tracked duty");
                let mirror = Arc::clone(&self.mirror);
                tokio::spawn(async move {
                    if let Err(error) = mirror.load_active_duty(duty).await {
                        warn!(%duty, %error, "could not load progress point catalog");
                    }
                });
            }
            None if previous.is_some() => {
                info!(%location, "left tracked duty");
                self.mirror.clear_active_duty();
            }
            _ => {}
        }
    }

    async fn action_cast(&self, action: Option<ActionId>, source: Option<ActorInfo>, location: LocationId) {
        let Some(action) = action else {
            debug!("action_cast: no resolvable action id, dropping");
            return;
        };
        let Some(source) = source else {
            debug!(%action, "action_cast: no resolvable source, dropping");
            return;
        };

        if source.local_player && self.policy.ignore_local_player {
            debug!(%action, "action_cast: local player filtered");
            return;
        }
        if source.party_member && self.policy.ignore_party {
            debug!(%action, "action_cast: party member filtered");
            return;
        }

        let Some(duty) = self.lookup.duty_for_location(location) else {
            debug!(%action, %location, "action_cast: location maps to no duty, dropping");
            return;
        };

        match self.mirror.point_allowed(duty, action) {
            Some(true) => {}
            Some(false) => {
                debug!(%duty, %action, "action_cast: not in allowed set, dropping");
                return;
            }
            None => {
                // Fail closed unless the heuristic fallback is enabled
                if self.policy.boss_heuristic && self.looks_like_boss(&source) {
                    debug!(%duty, %action, source = %source.name, "action_cast: accepted via boss heuristic");
                } else {
                    debug!(%duty, %action, "action_cast: no allowed set loaded, dropping");
                    return;
                }
            }
        }

        {
            let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
            if !session.accepted.insert((duty, action)) {
                debug!(%duty, %action, "action_cast: duplicate this session, dropping");
                return;
            }
        }

        let mirror = Arc::clone(&self.mirror);
        let session = Arc::clone(&self.session);
        tokio::spawn(async move {
            match mirror.mark_point_seen(duty, action).await {
                Ok(true) => info!(%duty, %action, "progress point observation recorded"),
                Ok(false) => debug!(%duty, %action, "progress point already recorded"),
                Err(error) => {
                    warn!(%duty, %action, %error, "progress point write failed");
                    // Let a later observation retry
                    session
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .accepted
                        .remove(&(duty, action));
                }
            }
        });
    }

    /// Health-total classification of a source as a probable boss
    ///
    /// Proxy for the curated allowed set; only used when none is loaded.
    fn looks_like_boss(&self, actor: &ActorInfo) -> bool {
        actor.hostile
            && !actor.local_player
            && !actor.party_member
            && actor.max_hp >= self.policy.boss_hp_floor
    }

    /// Drive the tracker from a feed subscription until the feed closes
    pub async fn run(self: Arc<Self>, mut rx: broadcast::Receiver<GameEvent>) {
        info!("action tracker started");
        loop {
            match rx.recv().await {
                Ok(event) => self.handle_event(event).await,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "event feed lagged, observations may be lost");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    info!("event feed closed, action tracker stopping");
                    break;
                }
            }
        }
    }
}
