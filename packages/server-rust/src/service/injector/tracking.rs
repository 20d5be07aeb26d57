//! Registry of stoppable injection jobs.
//!
//! Maps each live tracking id to the one-shot signal that stops its job.
//! The whole table sits behind a single mutex that is held for exactly one
//! map operation at a time and never across an engine call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use pktinject_core::TrackingId;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

use super::error::TrackingError;

// ---------------------------------------------------------------------------
// CancellationSignal
// ---------------------------------------------------------------------------

/// Registry-side half of a job's stop channel.
///
/// Firing consumes the signal, so it can be delivered at most once.
#[derive(Debug)]
pub struct CancellationSignal {
    tx: oneshot::Sender<()>,
    generation: u64,
}

impl CancellationSignal {
    /// Asks the job to stop. Returns `false` if the job had already ended.
    pub fn cancel(self) -> bool {
        self.tx.send(()).is_ok()
    }

    /// Returns `true` once the job's [`JobTicket`] has been dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// ---------------------------------------------------------------------------
// JobTicket
// ---------------------------------------------------------------------------

/// Engine-side half of a job's stop channel.
///
/// Held by the running job. Dropping it closes the channel and then clears
/// the job's registry entry, so natural completion needs no extra call.
#[derive(Debug)]
pub struct JobTicket {
    tracking_id: TrackingId,
    rx: Option<oneshot::Receiver<()>>,
    generation: u64,
    registry: Weak<TrackingRegistry>,
}

impl JobTicket {
    #[must_use]
    pub fn tracking_id(&self) -> &TrackingId {
        &self.tracking_id
    }

    /// Resolves when the job is asked to stop.
    ///
    /// Also resolves if the signal is dropped unfired (the registry rejected
    /// it or was torn down), since nobody can stop the job after that.
    /// Cancel-safe, so it can sit in a `select!` arm.
    pub async fn cancelled(&mut self) {
        if let Some(rx) = self.rx.as_mut() {
            let _ = rx.await;
            self.rx = None;
        }
    }

    /// Non-blocking check with the same meaning as [`JobTicket::cancelled`].
    pub fn is_cancelled(&mut self) -> bool {
        let Some(rx) = self.rx.as_mut() else {
            return true;
        };
        match rx.try_recv() {
            Ok(()) | Err(TryRecvError::Closed) => {
                self.rx = None;
                true
            }
            Err(TryRecvError::Empty) => false,
        }
    }
}

impl Drop for JobTicket {
    fn drop(&mut self) {
        // Close first: a register() racing with this drop then sees the
        // signal as closed instead of inserting an entry nobody will remove.
        drop(self.rx.take());
        if let Some(registry) = self.registry.upgrade() {
            registry.remove_issued(self.tracking_id.as_str(), self.generation);
        }
    }
}

// ---------------------------------------------------------------------------
// TrackingRegistry
// ---------------------------------------------------------------------------

/// Concurrency-safe map from tracking id to cancellation signal.
///
/// Invariant: at most one entry per id, and an entry exists only while its
/// job can still be stopped through this service.
#[derive(Debug, Default)]
pub struct TrackingRegistry {
    jobs: Mutex<HashMap<TrackingId, CancellationSignal>>,
    next_generation: AtomicU64,
}

impl TrackingRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mints the signal/ticket pair for a new job.
    ///
    /// Nothing is inserted; the signal still has to be [`register`]ed.
    ///
    /// [`register`]: TrackingRegistry::register
    pub fn issue(self: &Arc<Self>, tracking_id: TrackingId) -> (CancellationSignal, JobTicket) {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        let signal = CancellationSignal { tx, generation };
        let ticket = JobTicket {
            tracking_id,
            rx: Some(rx),
            generation,
            registry: Arc::downgrade(self),
        };
        (signal, ticket)
    }

    /// Makes a job stoppable.
    ///
    /// # Errors
    ///
    /// `AlreadyRegistered` if the id is taken (the existing entry is kept and
    /// `signal` is dropped), `JobFinished` if the job ended before it could
    /// be registered.
    pub fn register(
        &self,
        tracking_id: TrackingId,
        signal: CancellationSignal,
    ) -> Result<(), TrackingError> {
        let mut jobs = self.jobs.lock();
        if signal.is_closed() {
            return Err(TrackingError::JobFinished(tracking_id));
        }
        if jobs.contains_key(&tracking_id) {
            return Err(TrackingError::AlreadyRegistered(tracking_id));
        }
        jobs.insert(tracking_id, signal);
        record_active(jobs.len());
        Ok(())
    }

    /// Atomically looks up and removes the entry for `tracking_id`.
    ///
    /// Of several concurrent calls for the same id, exactly one gets the signal.
    pub fn take(&self, tracking_id: &str) -> Option<CancellationSignal> {
        let mut jobs = self.jobs.lock();
        let signal = jobs.remove(tracking_id);
        record_active(jobs.len());
        signal
    }

    /// Removes the entry without firing it. Returns `true` if one existed.
    pub fn remove(&self, tracking_id: &str) -> bool {
        let mut jobs = self.jobs.lock();
        let removed = jobs.remove(tracking_id).is_some();
        record_active(jobs.len());
        removed
    }

    /// Removes the entry only if it still holds the signal minted with
    /// `generation`, so a finished job never clears someone else's entry.
    fn remove_issued(&self, tracking_id: &str, generation: u64) -> bool {
        let mut jobs = self.jobs.lock();
        let owned = jobs
            .get(tracking_id)
            .is_some_and(|signal| signal.generation == generation);
        if owned {
            jobs.remove(tracking_id);
            record_active(jobs.len());
        }
        owned
    }

    /// Fires and removes every entry. Returns how many jobs were signalled.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<CancellationSignal> = {
            let mut jobs = self.jobs.lock();
            let drained = jobs.drain().map(|(_, signal)| signal).collect();
            record_active(0);
            drained
        };
        let count = drained.len();
        for signal in drained {
            signal.cancel();
        }
        count
    }

    #[must_use]
    pub fn contains(&self, tracking_id: &str) -> bool {
        self.jobs.lock().contains_key(tracking_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }

    /// Snapshot of the registered ids, in no particular order.
    #[must_use]
    pub fn ids(&self) -> Vec<TrackingId> {
        self.jobs.lock().keys().cloned().collect()
    }
}

#[allow(clippy::cast_precision_loss)]
fn record_active(count: usize) {
    metrics::gauge!("pktinject_active_injections").set(count as f64);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use proptest::prelude::*;

    use super::*;

    fn registry() -> Arc<TrackingRegistry> {
        Arc::new(TrackingRegistry::new())
    }

    #[test]
    fn register_then_take_returns_signal_once() {
        let reg = registry();
        let (signal, _ticket) = reg.issue(TrackingId::new("job-1"));
        reg.register(TrackingId::new("job-1"), signal).unwrap();
        assert!(reg.contains("job-1"));

        assert!(reg.take("job-1").is_some());
        assert!(reg.take("job-1").is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn take_unknown_leaves_registry_unchanged() {
        let reg = registry();
        let (signal, _ticket) = reg.issue(TrackingId::new("job-1"));
        reg.register(TrackingId::new("job-1"), signal).unwrap();

        assert!(reg.take("never-issued").is_none());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn cancel_reaches_ticket() {
        let reg = registry();
        let (signal, mut ticket) = reg.issue(TrackingId::new("job-1"));
        assert!(!ticket.is_cancelled());

        assert!(signal.cancel());
        assert!(ticket.is_cancelled());
        // Stays cancelled on repeated checks.
        assert!(ticket.is_cancelled());
    }

    #[test]
    fn dropping_ticket_removes_entry() {
        let reg = registry();
        let (signal, ticket) = reg.issue(TrackingId::new("job-1"));
        reg.register(TrackingId::new("job-1"), signal).unwrap();

        drop(ticket);
        assert!(!reg.contains("job-1"));
    }

    #[test]
    fn register_after_job_finished_is_rejected() {
        let reg = registry();
        let (signal, ticket) = reg.issue(TrackingId::new("job-1"));
        drop(ticket);

        let err = reg.register(TrackingId::new("job-1"), signal).unwrap_err();
        assert_eq!(err, TrackingError::JobFinished(TrackingId::new("job-1")));
        assert!(reg.is_empty());
    }

    #[test]
    fn duplicate_registration_keeps_first_entry() {
        let reg = registry();
        let (first, _first_ticket) = reg.issue(TrackingId::new("dup"));
        let (second, mut second_ticket) = reg.issue(TrackingId::new("dup"));

        reg.register(TrackingId::new("dup"), first).unwrap();
        let err = reg.register(TrackingId::new("dup"), second).unwrap_err();
        assert_eq!(
            err,
            TrackingError::AlreadyRegistered(TrackingId::new("dup"))
        );

        // The rejected signal was dropped, so the duplicate job is told to stop...
        assert!(second_ticket.is_cancelled());
        // ...and its ticket must not clear the surviving entry.
        drop(second_ticket);
        assert!(reg.contains("dup"));
    }

    #[test]
    fn explicit_remove_reports_presence() {
        let reg = registry();
        let (signal, _ticket) = reg.issue(TrackingId::new("job-1"));
        reg.register(TrackingId::new("job-1"), signal).unwrap();

        assert!(reg.remove("job-1"));
        assert!(!reg.remove("job-1"));
    }

    #[test]
    fn cancel_all_signals_every_job() {
        let reg = registry();
        let mut tickets = Vec::new();
        for i in 0..3 {
            let id = TrackingId::new(format!("job-{i}"));
            let (signal, ticket) = reg.issue(id.clone());
            reg.register(id, signal).unwrap();
            tickets.push(ticket);
        }

        assert_eq!(reg.cancel_all(), 3);
        assert!(reg.is_empty());
        assert!(tickets.iter_mut().all(JobTicket::is_cancelled));
    }

    #[tokio::test]
    async fn cancelled_future_resolves_on_signal() {
        let reg = registry();
        let (signal, mut ticket) = reg.issue(TrackingId::new("job-1"));

        let waiter = tokio::spawn(async move {
            ticket.cancelled().await;
            ticket
        });
        signal.cancel();

        let mut ticket = waiter.await.unwrap();
        assert!(ticket.is_cancelled());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_takes_have_one_winner() {
        for round in 0..50 {
            let reg = registry();
            let id = TrackingId::new(format!("job-{round}"));
            let (signal, _ticket) = reg.issue(id.clone());
            reg.register(id.clone(), signal).unwrap();

            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let reg = Arc::clone(&reg);
                    let id = id.clone();
                    tokio::spawn(async move { reg.take(id.as_str()).is_some() })
                })
                .collect();

            let mut winners = 0;
            for handle in handles {
                if handle.await.unwrap() {
                    winners += 1;
                }
            }
            assert_eq!(winners, 1, "round {round}");
        }
    }

    proptest! {
        #[test]
        fn registered_ids_match_live_tickets(ids in proptest::collection::hash_set("[a-z0-9]{1,8}", 0..16)) {
            let reg = registry();
            let mut tickets = Vec::new();
            for id in &ids {
                let (signal, ticket) = reg.issue(TrackingId::new(id.clone()));
                reg.register(TrackingId::new(id.clone()), signal).unwrap();
                tickets.push(ticket);
            }

            let registered: HashSet<String> =
                reg.ids().into_iter().map(TrackingId::into_inner).collect();
            prop_assert_eq!(&registered, &ids);

            drop(tickets);
            prop_assert!(reg.is_empty());
        }
    }
}
