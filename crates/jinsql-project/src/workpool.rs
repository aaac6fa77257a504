//! Fixed-size worker pool with first-error semantics
//!
//! Items are queued up front on a channel sized to hold all of them. Each
//! worker takes one item at a time and, before running it, checks whether
//! any worker has already failed. Once an error is recorded no new item is
//! started; items still queued are drained and counted as skipped. Work that
//! is already running is never interrupted.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use crossbeam::channel;
use parking_lot::RwLock;

#[derive(Debug, Clone, Copy)]
pub struct WorkPool {
    threads: usize,
}

/// What happened to the items handed to [`WorkPool::run`]
#[derive(Debug)]
pub struct PoolOutcome<E> {
    /// Items the function was called on, including the one that failed
    pub executed: usize,
    /// Items never started because an error had been recorded
    pub skipped: usize,
    /// The first error returned by any worker
    pub error: Option<E>,
}

impl<E> PoolOutcome<E> {
    pub fn into_result(self) -> Result<usize, E> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.executed),
        }
    }
}

impl WorkPool {
    pub fn new(threads: usize) -> Self {
        Self {
            threads: threads.max(1),
        }
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Run `f` over every item and block until each one has been executed
    /// or skipped.
    pub fn run<T, E, F>(&self, items: Vec<T>, f: F) -> PoolOutcome<E>
    where
        T: Send,
        E: Send + Sync,
        F: Fn(&T) -> Result<(), E> + Sync,
    {
        let total = items.len();
        if total == 0 {
            return PoolOutcome {
                executed: 0,
                skipped: 0,
                error: None,
            };
        }

        let (sender, receiver) = channel::bounded(total);
        for item in items {
            // Cannot fail: the channel holds every item and the receiver is alive
            let _ = sender.send(item);
        }
        drop(sender);

        let first_error: RwLock<Option<E>> = RwLock::new(None);
        let executed = AtomicUsize::new(0);
        let skipped = AtomicUsize::new(0);
        let workers = self.threads.min(total);

        tracing::debug!(items = total, workers, "starting work pool");

        thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| {
                    for item in receiver.iter() {
                        if first_error.read().is_some() {
                            skipped.fetch_add(1, Ordering::Relaxed);
                            continue;
                        }

                        let result = f(&item);
                        executed.fetch_add(1, Ordering::Relaxed);

                        if let Err(err) = result {
                            let mut slot = first_error.write();
                            if slot.is_none() {
                                *slot = Some(err);
                            } else {
                                tracing::trace!("discarding error from another worker");
                            }
                            return;
                        }
                    }
                });
            }
        });

        // Left behind when every worker stopped on an error
        let stranded = receiver.len();

        let outcome = PoolOutcome {
            executed: executed.into_inner(),
            skipped: skipped.into_inner() + stranded,
            error: first_error.into_inner(),
        };
        tracing::debug!(
            executed = outcome.executed,
            skipped = outcome.skipped,
            failed = outcome.error.is_some(),
            "work pool finished"
        );
        outcome
    }
}

impl Default for WorkPool {
    fn default() -> Self {
        Self::new(thread::available_parallelism().map_or(1, |n| n.get()))
    }
}
