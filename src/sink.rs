use std::io::Write;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use serde::Serialize;
use tracing::{debug, error, info};

use crate::batch::BatchTable;
use crate::error::KiraError;
use crate::fasta;
use crate::fetcher::{FetchOutcome, FetchStatus};
use crate::store::OutputStore;

#[derive(Debug)]
pub enum SinkMessage {
    Outcome(FetchOutcome),
    /// Sent once after the pool has drained. Everything queued before it is
    /// still written.
    EndOfStream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    Running,
    Draining,
    Stopped,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SinkReport {
    pub success_files: usize,
    pub failure_files: usize,
    pub records_written: usize,
    pub write_errors: usize,
}

/// Single consumer that turns outcomes into files, one at a time.
pub struct ResultSink {
    store: OutputStore,
    batches: Arc<BatchTable>,
    max_symbols: usize,
    state: SinkState,
    report: SinkReport,
}

impl ResultSink {
    pub fn new(store: OutputStore, batches: Arc<BatchTable>, max_symbols: usize) -> Self {
        Self {
            store,
            batches,
            max_symbols,
            state: SinkState::Running,
            report: SinkReport::default(),
        }
    }

    /// Starts the consumer on its own thread and returns the producer side.
    pub fn spawn(self) -> Result<(Sender<SinkMessage>, JoinHandle<SinkReport>), KiraError> {
        let (tx, rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("kira-sink".to_string())
            .spawn(move || self.run(rx))
            .map_err(|err| KiraError::Filesystem(format!("failed to start writer: {err}")))?;
        Ok((tx, handle))
    }

    pub fn run(mut self, rx: Receiver<SinkMessage>) -> SinkReport {
        while self.state != SinkState::Stopped {
            match self.state {
                SinkState::Running => match rx.recv() {
                    Ok(SinkMessage::Outcome(outcome)) => self.handle(outcome),
                    Ok(SinkMessage::EndOfStream) => {
                        debug!("end of stream received, draining");
                        self.state = SinkState::Draining;
                    }
                    Err(_) => {
                        debug!("all producers gone, draining");
                        self.state = SinkState::Draining;
                    }
                },
                SinkState::Draining => {
                    while let Ok(message) = rx.try_recv() {
                        if let SinkMessage::Outcome(outcome) = message {
                            self.handle(outcome);
                        }
                    }
                    self.state = SinkState::Stopped;
                }
                SinkState::Stopped => {}
            }
        }
        info!(
            success_files = self.report.success_files,
            failure_files = self.report.failure_files,
            write_errors = self.report.write_errors,
            "writer finished"
        );
        self.report
    }

    fn handle(&mut self, outcome: FetchOutcome) {
        let op_id = outcome.operation_id;
        let result = match &outcome.status {
            FetchStatus::Success { payload } => self.write_success(op_id, payload),
            FetchStatus::Failed(_) => self.write_failure(op_id),
        };
        if let Err(err) = result {
            self.report.write_errors += 1;
            error!(op_id, "failed to write output: {err}");
        }
    }

    fn write_success(&mut self, op_id: usize, payload: &str) -> Result<(), KiraError> {
        let path = self.store.success_path(op_id);
        debug!(op_id, path = %path, "succeeded operation, writing sequences");
        let width = self.max_symbols;
        let mut records = 0;
        self.store.write_atomic(&path, |writer| {
            records = fasta::rewrap(writer, payload, width)?;
            Ok(())
        })?;
        self.report.success_files += 1;
        self.report.records_written += records;
        Ok(())
    }

    fn write_failure(&mut self, op_id: usize) -> Result<(), KiraError> {
        let path = self.store.failure_path(op_id);
        debug!(op_id, path = %path, "failed operation, writing accessions");
        let batch = self
            .batches
            .get(op_id)
            .ok_or_else(|| KiraError::Filesystem(format!("unknown operation id {op_id}")))?;
        self.store.write_atomic(&path, |writer| {
            for accession in &batch.accessions {
                writeln!(writer, "{accession}")?;
            }
            Ok(())
        })?;
        self.report.failure_files += 1;
        Ok(())
    }
}
