use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Mutex;
use std::sync::mpsc::{self, Sender};
use std::thread;

use serde::Serialize;
use tracing::{debug, error};

use crate::batch::{Batch, BatchTable, OperationId};
use crate::fetcher::{self, FetchOutcome};
use crate::progress::{ProgressEvent, ProgressSink};
use crate::sink::SinkMessage;

/// Work a pool runs for each batch. `RemoteFetcher` is the production
/// implementation.
pub trait BatchJob: Sync {
    fn run(&self, batch: &Batch) -> FetchOutcome;
}

impl<C: crate::ncbi::EutilsClient> BatchJob for fetcher::RemoteFetcher<C> {
    fn run(&self, batch: &Batch) -> FetchOutcome {
        self.fetch_batch(batch)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoolReport {
    pub submitted: usize,
    pub delivered: usize,
    pub crashed: Vec<OperationId>,
}

#[derive(Debug, Clone, Copy)]
pub struct DispatchPool {
    workers: usize,
}

impl DispatchPool {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Runs every batch and forwards each outcome to `sink` as soon as it
    /// completes. Progress is reported from the calling thread only.
    /// Returns once all workers have exited.
    pub fn run<J: BatchJob>(
        &self,
        batches: &BatchTable,
        job: &J,
        sink: &Sender<SinkMessage>,
        progress: &dyn ProgressSink,
    ) -> PoolReport {
        let total = batches.len();
        let mut report = PoolReport {
            submitted: total,
            ..PoolReport::default()
        };
        if total == 0 {
            return report;
        }

        let queue = Mutex::new(batches.iter());
        let (done_tx, done_rx) = mpsc::channel::<(OperationId, thread::Result<FetchOutcome>)>();
        let workers = self.workers.min(total);

        thread::scope(|scope| {
            for worker in 0..workers {
                let done_tx = done_tx.clone();
                let queue = &queue;
                scope.spawn(move || {
                    debug!(worker, "worker started");
                    loop {
                        let next = match queue.lock() {
                            Ok(mut guard) => guard.next(),
                            Err(poisoned) => poisoned.into_inner().next(),
                        };
                        let Some(batch) = next else {
                            break;
                        };
                        let result = panic::catch_unwind(AssertUnwindSafe(|| job.run(batch)));
                        if done_tx.send((batch.operation_id, result)).is_err() {
                            break;
                        }
                    }
                    debug!(worker, "worker exited");
                });
            }
            drop(done_tx);

            let mut completed = 0usize;
            for (op_id, result) in done_rx {
                completed += 1;
                match result {
                    Ok(outcome) => {
                        fetcher::log_delivered(&outcome);
                        progress.event(ProgressEvent::BatchFinished {
                            operation_id: op_id,
                            completed,
                            total,
                            success: Some(outcome.is_success()),
                        });
                        if sink.send(SinkMessage::Outcome(outcome)).is_err() {
                            error!(op_id, critical = true, "result writer is gone, outcome dropped");
                        } else {
                            report.delivered += 1;
                        }
                    }
                    Err(panic) => {
                        error!(
                            op_id,
                            critical = true,
                            kind = "unexpected_task_failure",
                            "operation failed with panic: {}",
                            panic_message(&*panic)
                        );
                        progress.event(ProgressEvent::BatchFinished {
                            operation_id: op_id,
                            completed,
                            total,
                            success: None,
                        });
                        report.crashed.push(op_id);
                    }
                }
            }
        });

        report.crashed.sort_unstable();
        report
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
