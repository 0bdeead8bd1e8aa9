//! Cooldown gating for outbound service calls
//!
//! Rate-limits classes of operations (read / write / quick-action)
//! independently of which entity they target. A denied call returns
//! immediately with the remaining wait instead of blocking. During a
//! short grace period after startup every class is allowed
//! unconditionally so initialization bursts are not throttled.

use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

/// Class of outbound operation, each with its own cooldown window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpClass {
    Read,
    Write,
    Quick,
}

impl std::fmt::Display for OpClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
            Self::Quick => write!(f, "quick"),
        }
    }
}

/// Error returned when a call is denied by an active cooldown
#[derive(Debug, Clone, Error)]
#[error("cooldown active, retry in {retry_after:?}")]
pub struct Throttled {
    pub retry_after: Duration,
}

/// Outcome of a cooldown check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allowed,
    Throttled { retry_after: Duration },
}

/// Cooldown windows per class plus the startup grace period
#[derive(Debug, Clone)]
pub struct GateConfig {
    pub grace: Duration,
    pub read: Duration,
    pub write: Duration,
    pub quick: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(10),
            read: Duration::from_secs(3),
            write: Duration::from_secs(5),
            quick: Duration::from_secs(2),
        }
    }
}

/// Minimum-interval gate over outbound operation classes
///
/// The last-dispatch map is updated on the calling side of a dispatch,
/// before the wrapped operation completes, so concurrent in-flight calls
/// of the same class count against each other.
pub struct CooldownGate {
    started_at: Instant,
    config: GateConfig,
    last_run: Mutex<HashMap<OpClass, Instant>>,
}

impl CooldownGate {
    pub fn new(config: GateConfig) -> Self {
        debug!(?config, "CooldownGate::new: called");
        Self {
            started_at: Instant::now(),
            config,
            last_run: Mutex::new(HashMap::new()),
        }
    }

    fn window(&self, class: OpClass) -> Duration {
        match class {
            OpClass::Read => self.config.read,
            OpClass::Write => self.config.write,
            OpClass::Quick => self.config.quick,
        }
    }

    fn decide(&self, class: OpClass, last: Option<Instant>, now: Instant) -> GateDecision {
        if now.duration_since(self.started_at) < self.config.grace {
            return GateDecision::Allowed;
        }
        match last {
            None => GateDecision::Allowed,
            Some(at) => {
                let window = self.window(class);
                let elapsed = now.duration_since(at);
                if elapsed >= window {
                    GateDecision::Allowed
                } else {
                    GateDecision::Throttled {
                        retry_after: window - elapsed,
                    }
                }
            }
        }
    }

    /// Check whether a call of this class would currently be allowed
    ///
    /// Read-only: does not consume the window.
    pub async fn check(&self, class: OpClass) -> GateDecision {
        self.check_at(class, Instant::now()).await
    }

    pub(crate) async fn check_at(&self, class: OpClass, now: Instant) -> GateDecision {
        let last = self.last_run.lock().await.get(&class).copied();
        self.decide(class, last, now)
    }

    /// Record a dispatch of this class at "now"
    pub async fn mark_ran(&self, class: OpClass) {
        self.mark_ran_at(class, Instant::now()).await;
    }

    pub(crate) async fn mark_ran_at(&self, class: OpClass, now: Instant) {
        self.last_run.lock().await.insert(class, now);
    }

    /// Atomically check the window and, if allowed, record the dispatch
    async fn try_begin(&self, class: OpClass) -> GateDecision {
        self.try_begin_at(class, Instant::now()).await
    }

    pub(crate) async fn try_begin_at(&self, class: OpClass, now: Instant) -> GateDecision {
        let mut last_run = self.last_run.lock().await;
        let decision = self.decide(class, last_run.get(&class).copied(), now);
        if decision == GateDecision::Allowed {
            last_run.insert(class, now);
        }
        decision
    }

    /// Run `op` if the class is off cooldown, marking the dispatch first
    ///
    /// Fails with [`Throttled`] before `op` is invoked when the window has
    /// not elapsed; `op`'s own failure is passed through untouched.
    pub async fn run_gated<T, F, Fut>(&self, class: OpClass, op: F) -> Result<T, Throttled>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        match self.try_begin(class).await {
            GateDecision::Allowed => {
                debug!(%class, "run_gated: dispatching");
                Ok(op().await)
            }
            GateDecision::Throttled { retry_after } => {
                debug!(%class, ?retry_after, "run_gated: throttled");
                Err(Throttled { retry_after })
            }
        }
    }
}
