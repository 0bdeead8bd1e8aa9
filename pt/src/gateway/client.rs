//! ProgressClient trait definition

use async_trait::async_trait;

use crate::domain::{ActionId, DutyId, ProgPoint};

use super::{BulkOutcome, RemoteError};

/// Client for the authoritative progress service
///
/// Completion state on the service is append-only from the client's point
/// of view: marks are recorded, never revoked. Write operations report
/// `Ok(true)` when the service newly recorded the mark and `Ok(false)`
/// when it was already on record; both count as success.
#[async_trait]
pub trait ProgressClient: Send + Sync {
    /// Whether the duty is recorded as completed
    async fn duty_completed(&self, duty: DutyId) -> Result<bool, RemoteError>;

    /// Whether the progress point is recorded for the duty
    async fn point_completed(&self, duty: DutyId, point: ActionId) -> Result<bool, RemoteError>;

    /// The duty's progress-point catalog, with per-point completion flags
    async fn point_catalog(&self, duty: DutyId) -> Result<Vec<ProgPoint>, RemoteError>;

    /// Record the duty as completed
    async fn mark_duty_completed(&self, duty: DutyId) -> Result<bool, RemoteError>;

    /// Record one progress point for the duty
    async fn mark_point_completed(&self, duty: DutyId, point: ActionId) -> Result<bool, RemoteError>;

    /// Record many duties as completed in one call
    ///
    /// Best-effort bulk: a partial acceptance is reported as a successful
    /// outcome carrying the rejected ids.
    async fn mark_duties_completed(&self, duties: &[DutyId]) -> Result<BulkOutcome, RemoteError>;
}

#[async_trait]
impl<T: ProgressClient + ?Sized> ProgressClient for std::sync::Arc<T> {
    async fn duty_completed(&self, duty: DutyId) -> Result<bool, RemoteError> {
        (**self).duty_completed(duty).await
    }

    async fn point_completed(&self, duty: DutyId, point: ActionId) -> Result<bool, RemoteError> {
        (**self).point_completed(duty, point).await
    }

    async fn point_catalog(&self, duty: DutyId) -> Result<Vec<ProgPoint>, RemoteError> {
        (**self).point_catalog(duty).await
    }

    async fn mark_duty_completed(&self, duty: DutyId) -> Result<bool, RemoteError> {
        (**self).mark_duty_completed(duty).await
    }

    async fn mark_point_completed(&self, duty: DutyId, point: ActionId) -> Result<bool, RemoteError> {
        (**self).mark_point_completed(duty, point).await
    }

    async fn mark_duties_completed(&self, duties: &[DutyId]) -> Result<BulkOutcome, RemoteError> {
        (**self).mark_duties_completed(duties).await
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// In-memory progress service for unit tests
    ///
    /// Tracks call counts per operation so tests can assert how often the
    /// network would have been touched.
    #[derive(Default)]
    pub struct MockProgressClient {
        pub completed: Mutex<HashSet<DutyId>>,
        pub points: Mutex<HashMap<DutyId, Vec<ProgPoint>>>,
        pub marked_points: Mutex<HashSet<(DutyId, ActionId)>>,
        pub bulk_invalid: Mutex<HashSet<DutyId>>,
        fail_reads: AtomicBool,
        fail_writes: AtomicBool,
        read_calls: AtomicUsize,
        catalog_calls: AtomicUsize,
        write_calls: AtomicUsize,
    }

    impl MockProgressClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_catalog(self, duty: DutyId, points: Vec<ProgPoint>) -> Self {
            self.points
                .lock()
                .expect("mock lock")
                .insert(duty, points);
            self
        }

        pub fn set_fail_reads(&self, fail: bool) {
            self.fail_reads.store(fail, Ordering::SeqCst);
        }

        pub fn set_fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }

        pub fn read_calls(&self) -> usize {
            self.read_calls.load(Ordering::SeqCst)
        }

        pub fn catalog_calls(&self) -> usize {
            self.catalog_calls.load(Ordering::SeqCst)
        }

        pub fn write_calls(&self) -> usize {
            self.write_calls.load(Ordering::SeqCst)
        }

        fn outage() -> RemoteError {
            RemoteError::Server {
                status: 503,
                message: "mock outage".to_string(),
            }
        }
    }

    #[async_trait]
    impl ProgressClient for MockProgressClient {
        async fn duty_completed(&self, duty: DutyId) -> Result<bool, RemoteError> {
            self.read_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(Self::outage());
            }
            Ok(self.completed.lock().expect("mock lock").contains(&duty))
        }

        async fn point_completed(&self, duty: DutyId, point: ActionId) -> Result<bool, RemoteError> {
            self.read_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(Self::outage());
            }
            Ok(self
                .marked_points
                .lock()
                .expect("mock lock")
                .contains(&(duty, point)))
        }

        async fn point_catalog(&self, duty: DutyId) -> Result<Vec<ProgPoint>, RemoteError> {
            self.catalog_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(Self::outage());
            }
            Ok(self
                .points
                .lock()
                .expect("mock lock")
                .get(&duty)
                .cloned()
                .unwrap_or_default())
        }

        async fn mark_duty_completed(&self, duty: DutyId) -> Result<bool, RemoteError> {
            self.write_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(Self::outage());
            }
            Ok(self.completed.lock().expect("mock lock").insert(duty))
        }

        async fn mark_point_completed(&self, duty: DutyId, point: ActionId) -> Result<bool, RemoteError> {
            self.write_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(Self::outage());
            }
            Ok(self
                .marked_points
                .lock()
                .expect("mock lock")
                .insert((duty, point)))
        }

        async fn mark_duties_completed(&self, duties: &[DutyId]) -> Result<BulkOutcome, RemoteError> {
            self.write_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(Self::outage());
            }
            let invalid = self.bulk_invalid.lock().expect("mock lock");
            let mut completed = self.completed.lock().expect("mock lock");
            let mut accepted = Vec::new();
            let mut rejected = Vec::new();
            for duty in duties {
                if invalid.contains(duty) {
                    rejected.push(*duty);
                } else {
                    completed.insert(*duty);
                    accepted.push(*duty);
                }
            }
            if rejected.is_empty() {
                Ok(BulkOutcome::AllAccepted { accepted })
            } else {
                Ok(BulkOutcome::Partial { accepted, rejected })
            }
        }
    }
}
