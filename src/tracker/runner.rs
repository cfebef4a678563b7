//! Tracker runner - owns the background tracking thread.
//!
//! The UI starts and stops tracking through a `TrackerHandle`. The worker
//! locks the tracker for one cycle at a time, so `reset` from the UI never
//! interleaves with a cycle in progress. None of the handle's methods wait on
//! a cycle: a capture can block for up to the capture timeout.

use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::tracker::cycle::{CycleReport, TrackerLoop};

/// Progress counters published by the worker for the status line.
#[derive(Debug, Default)]
pub struct TrackerStats {
    cycles: AtomicU64,
    last_cycle_ms: AtomicU64,
    gold_cells: AtomicU32,
    capture_failures: AtomicU32,
}

/// Point-in-time copy of `TrackerStats`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub cycles: u64,
    pub last_cycle_ms: u64,
    pub gold_cells: u32,
    pub capture_failures: u32,
}

impl TrackerStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cycles: self.cycles.load(Ordering::SeqCst),
            last_cycle_ms: self.last_cycle_ms.load(Ordering::SeqCst),
            gold_cells: self.gold_cells.load(Ordering::SeqCst),
            capture_failures: self.capture_failures.load(Ordering::SeqCst),
        }
    }

    fn record_cycle(&self, tracker: &TrackerLoop, report: &CycleReport, elapsed: Duration) {
        let cycle = self.cycles.fetch_add(1, Ordering::SeqCst) + 1;
        log::trace!(
            "Cycle {}: captured={} stable={} improved={} in {} ms",
            cycle,
            report.captured,
            report.stable_cells,
            report.improved.len(),
            elapsed.as_millis()
        );
        self.last_cycle_ms
            .store(elapsed.as_millis() as u64, Ordering::SeqCst);
        self.gold_cells
            .store(tracker.state().gold_cells() as u32, Ordering::SeqCst);
        self.capture_failures
            .store(tracker.capture_failures(), Ordering::SeqCst);
    }
}

/// Starts, stops and resets the tracking worker.
pub struct TrackerHandle {
    tracker: Arc<Mutex<TrackerLoop>>,
    /// Run flag of the current worker; each start gets a fresh one
    running: Arc<AtomicBool>,
    /// Set when a reset could not take the tracker lock right away
    reset_pending: Arc<AtomicBool>,
    stats: Arc<TrackerStats>,
    cycle_budget: Duration,
    /// The current worker, plus stopped ones that may still be finishing a cycle
    workers: Vec<JoinHandle<()>>,
}

impl TrackerHandle {
    pub fn new(tracker: TrackerLoop, cycle_budget: Duration) -> Self {
        Self {
            tracker: Arc::new(Mutex::new(tracker)),
            running: Arc::new(AtomicBool::new(false)),
            reset_pending: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(TrackerStats::default()),
            cycle_budget,
            workers: Vec::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// True once every worker thread has exited (or none was started).
    pub fn worker_finished(&self) -> bool {
        self.workers.iter().all(JoinHandle::is_finished)
    }

    /// Starts the worker thread. Does nothing if it is already running.
    ///
    /// A worker stopped mid-cycle is not waited for; the new one queues on the
    /// tracker lock behind it.
    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            log::debug!("Tracker already running");
            return Ok(());
        }
        self.join_finished_workers();

        self.running = Arc::new(AtomicBool::new(true));
        let tracker = self.tracker.clone();
        let running = self.running.clone();
        let reset_pending = self.reset_pending.clone();
        let stats = self.stats.clone();
        let budget = self.cycle_budget;

        let spawned = thread::Builder::new()
            .name("card-tracker".to_string())
            .spawn(move || {
                run_tracking_loop(&tracker, &running, &reset_pending, &stats, budget);
                log::info!("Tracker thread finished");
            });

        match spawned {
            Ok(handle) => {
                self.workers.push(handle);
                log::info!("Tracking started ({} ms per cycle)", budget.as_millis());
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                Err(anyhow!("Failed to spawn tracker thread: {}", e))
            }
        }
    }

    /// Tells the worker to stop after its current cycle. Does not wait for it;
    /// finished threads are joined on the next `start` or when the handle is dropped.
    pub fn stop(&mut self) {
        if self.running.swap(false, Ordering::SeqCst) {
            log::info!("Stopping tracker");
        }
    }

    fn join_finished_workers(&mut self) {
        let (finished, active): (Vec<_>, Vec<_>) =
            self.workers.drain(..).partition(JoinHandle::is_finished);
        self.workers = active;
        join_all(finished);
    }

    /// Clears all card memory and overlay annotations. Running state is unchanged.
    ///
    /// If a cycle holds the tracker, the reset is applied when it is released:
    /// by the worker before its next cycle, or by `apply_pending_reset`.
    pub fn reset(&self) {
        self.reset_pending.store(true, Ordering::SeqCst);
        self.stats.gold_cells.store(0, Ordering::SeqCst);
        if !self.apply_pending_reset() {
            log::debug!("Tracker busy, reset deferred to the end of the cycle");
        }
    }

    /// Applies a deferred reset if the tracker is free.
    /// Returns false while a reset is still waiting for the lock.
    pub fn apply_pending_reset(&self) -> bool {
        if !self.reset_pending.load(Ordering::SeqCst) {
            return true;
        }
        let mut tracker = match self.tracker.try_lock() {
            Ok(tracker) => tracker,
            Err(TryLockError::Poisoned(e)) => e.into_inner(),
            Err(TryLockError::WouldBlock) => return false,
        };
        take_pending_reset(&mut tracker, &self.reset_pending);
        true
    }

    /// Runs `f` against the tracker while holding its lock.
    #[cfg(test)]
    pub fn with_tracker<R>(&self, f: impl FnOnce(&TrackerLoop) -> R) -> R {
        let tracker = lock_tracker(&self.tracker);
        f(&tracker)
    }
}

impl Drop for TrackerHandle {
    fn drop(&mut self) {
        self.stop();
        join_all(self.workers.drain(..));
    }
}

fn join_all(workers: impl IntoIterator<Item = JoinHandle<()>>) {
    for handle in workers {
        if handle.join().is_err() {
            log::error!("Tracker thread panicked");
        }
    }
}

/// A panic inside a cycle poisons the lock; the tracker data is still usable.
fn lock_tracker(tracker: &Mutex<TrackerLoop>) -> MutexGuard<'_, TrackerLoop> {
    tracker.lock().unwrap_or_else(|e| e.into_inner())
}

/// Runs a reset requested while the lock was held. Must be called with the lock.
fn take_pending_reset(tracker: &mut TrackerLoop, reset_pending: &AtomicBool) {
    if reset_pending.swap(false, Ordering::SeqCst) {
        tracker.reset();
    }
}

/// Runs cycles until `running` is cleared (called from the tracker thread).
fn run_tracking_loop(
    tracker: &Mutex<TrackerLoop>,
    running: &AtomicBool,
    reset_pending: &AtomicBool,
    stats: &TrackerStats,
    budget: Duration,
) {
    while running.load(Ordering::SeqCst) {
        let started = Instant::now();
        {
            let mut tracker = lock_tracker(tracker);
            take_pending_reset(&mut tracker, reset_pending);
            let report = tracker.run_cycle();
            stats.record_cycle(&tracker, &report, started.elapsed());
        }

        if let Some(remaining) = budget.checked_sub(started.elapsed()) {
            thread::sleep(remaining);
        }
    }
}
