//! Verification fan-out: bounded task channel plus a fixed worker pool.
//!
//! Block mode dispatches signature/structural checks here instead of
//! running them inline: the checks are pure functions of the transaction
//! alone, so worker ordering does not matter and no shared state is
//! touched. The task channel is bounded: a full channel blocks the
//! sender, which is the backpressure the pipeline relies on. Failures
//! surface on the pool's result side and are drained by the caller's
//! block-processing loop via [`VerifierPool::finish`], outside the append
//! call itself.

use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::domain::verify::{check_transaction, VerifyTask};
use crate::error::{AppendError, Result};
use crate::ports::outbound::TxVerifier;

/// Task-channel capacity before senders block.
pub const DEFAULT_TASK_CAPACITY: usize = 256;

/// Default number of verification workers.
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// Sending side of the verification channel.
#[derive(Clone)]
pub struct VerifierHandle {
    tasks: SyncSender<VerifyTask>,
}

impl TxVerifier for VerifierHandle {
    fn submit(&self, task: VerifyTask) -> Result<()> {
        self.tasks
            .send(task)
            .map_err(|_| AppendError::Runtime("verification pool is closed".into()))
    }
}

/// A fixed pool of verification workers over one bounded task channel.
pub struct VerifierPool {
    handle: VerifierHandle,
    workers: Vec<JoinHandle<()>>,
    failures: Receiver<AppendError>,
}

impl VerifierPool {
    /// Spawns `worker_count` workers behind a channel of `capacity` tasks.
    pub fn spawn(worker_count: usize, capacity: usize) -> Result<Self> {
        let (task_tx, task_rx) = mpsc::sync_channel::<VerifyTask>(capacity);
        let task_rx = Arc::new(Mutex::new(task_rx));
        let (failure_tx, failure_rx) = mpsc::channel::<AppendError>();

        let mut workers = Vec::with_capacity(worker_count);
        for i in 0..worker_count {
            let task_rx = Arc::clone(&task_rx);
            let failure_tx = failure_tx.clone();
            let worker = std::thread::Builder::new()
                .name(format!("tx-verifier-{i}"))
                .spawn(move || loop {
                    let task = {
                        let Ok(guard) = task_rx.lock() else { break };
                        guard.recv()
                    };
                    match task {
                        Ok(task) => {
                            if let Err(err) = check_transaction(&task) {
                                // Receiver gone means nobody cares anymore.
                                let _ = failure_tx.send(err);
                            }
                        }
                        Err(_) => break,
                    }
                })
                .map_err(|e| AppendError::Runtime(format!("failed to spawn verifier: {e}")))?;
            workers.push(worker);
        }
        Ok(Self {
            handle: VerifierHandle { tasks: task_tx },
            workers,
            failures: failure_rx,
        })
    }

    /// Spawns a pool with default sizing.
    pub fn spawn_default() -> Result<Self> {
        Self::spawn(DEFAULT_WORKER_COUNT, DEFAULT_TASK_CAPACITY)
    }

    /// The submit handle threaded into block appends.
    pub fn handle(&self) -> &VerifierHandle {
        &self.handle
    }

    /// Closes the channel, waits for the workers to drain it, and returns
    /// the first verification failure, if any.
    pub fn finish(self) -> Result<()> {
        let VerifierPool {
            handle,
            workers,
            failures,
        } = self;
        drop(handle);
        for worker in workers {
            worker
                .join()
                .map_err(|_| AppendError::Runtime("verifier worker panicked".into()))?;
        }
        match failures.try_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Inline verifier: checks each task synchronously on submit. Useful for
/// deterministic single-threaded block application and in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncVerifier;

impl TxVerifier for SyncVerifier {
    fn submit(&self, task: VerifyTask) -> Result<()> {
        check_transaction(&task)
    }
}
