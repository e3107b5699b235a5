use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::batch::Batcher;
use crate::config::RunConfig;
use crate::domain::{ApiKey, RetType};
use crate::error::KiraError;
use crate::fetcher::RemoteFetcher;
use crate::input;
use crate::ncbi::{EutilsClient, EutilsSettings};
use crate::pool::{DispatchPool, PoolReport};
use crate::progress::{ProgressEvent, ProgressSink};
use crate::sink::{ResultSink, SinkMessage, SinkReport};
use crate::store::OutputStore;

/// API key (if any) and the worker limit it allows.
#[derive(Debug, Clone)]
pub struct Credential {
    pub api_key: Option<ApiKey>,
    pub workers: usize,
}

/// Loads the API key. Without a usable key NCBI only tolerates a few
/// requests per second, so the worker limit drops to 1.
pub fn resolve_credential(config: &RunConfig) -> Credential {
    let Some(path) = &config.api_key_path else {
        warn!("no API key configured, switching to 1 worker");
        return Credential {
            api_key: None,
            workers: 1,
        };
    };

    match input::read_api_key(path) {
        Ok(api_key) => {
            debug!(path = %path.display(), "API key loaded");
            Credential {
                api_key: Some(api_key),
                workers: config.max_workers,
            }
        }
        Err(err) => {
            warn!("{err}; continuing without API key on 1 worker");
            Credential {
                api_key: None,
                workers: 1,
            }
        }
    }
}

pub fn eutils_settings(config: &RunConfig, credential: &Credential) -> EutilsSettings {
    EutilsSettings {
        base_url: config.base_url.clone(),
        database: config.database.clone(),
        api_key: credential.api_key.clone(),
        email: config.email.clone(),
        timeout: config.timeout,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: String,
    pub finished_at: String,
    pub ret_type: RetType,
    pub accessions: usize,
    pub batches: usize,
    pub workers: usize,
    pub delivered: usize,
    pub crashed: Vec<usize>,
    pub success_files: usize,
    pub failure_files: usize,
    pub records_written: usize,
    pub write_errors: usize,
    pub log_path: String,
}

impl RunSummary {
    fn new(
        config: &RunConfig,
        started_at: String,
        accessions: usize,
        workers: usize,
        pool: PoolReport,
        sink: SinkReport,
        log_path: String,
    ) -> Self {
        Self {
            started_at,
            finished_at: iso_timestamp(),
            ret_type: config.ret_type,
            accessions,
            batches: pool.submitted,
            workers,
            delivered: pool.delivered,
            crashed: pool.crashed,
            success_files: sink.success_files,
            failure_files: sink.failure_files,
            records_written: sink.records_written,
            write_errors: sink.write_errors,
            log_path,
        }
    }
}

pub struct App<C: EutilsClient> {
    config: RunConfig,
    client: C,
    workers: usize,
}

impl<C: EutilsClient> App<C> {
    pub fn new(config: RunConfig, client: C, workers: usize) -> Self {
        Self {
            config,
            client,
            workers: workers.max(1),
        }
    }

    pub fn store(&self) -> OutputStore {
        OutputStore::new(
            self.config.out.clone(),
            self.config.ret_type.success_extension(),
        )
    }

    /// Fetches every batch and blocks until all files are written.
    pub fn run(self, progress: &dyn ProgressSink) -> Result<RunSummary, KiraError> {
        let started_at = iso_timestamp();
        let store = self.store();
        store.ensure_output_dir()?;

        let batcher = Batcher::new(self.config.chunk_size)?;
        let accessions = input::read_accessions(&self.config.input)?;
        let batches = Arc::new(batcher.split(&accessions));
        info!(
            accessions = accessions.len(),
            "found {} chunk(s) of accessions",
            batches.len()
        );
        progress.event(ProgressEvent::Started {
            total: batches.len(),
            workers: self.workers,
        });

        let log_path = store.log_path().to_string();
        let sink = ResultSink::new(store, Arc::clone(&batches), self.config.max_symbols);
        let (sender, writer) = sink.spawn()?;

        let fetcher = RemoteFetcher::new(self.client, self.config.ret_type, batcher.chunk_size());
        let pool_report = DispatchPool::new(self.workers).run(&batches, &fetcher, &sender, progress);
        info!(outcome = "success", "done requesting, waiting for files");
        progress.event(ProgressEvent::Message(
            "done requesting, waiting for files".to_string(),
        ));

        // The writer also stops on disconnect, so a failed send loses nothing.
        let _ = sender.send(SinkMessage::EndOfStream);
        drop(sender);
        let sink_report = writer.join().map_err(|_| KiraError::SinkCrashed)?;

        progress.event(ProgressEvent::Finished);
        info!("done");

        Ok(RunSummary::new(
            &self.config,
            started_at,
            accessions.len(),
            self.workers,
            pool_report,
            sink_report,
            log_path,
        ))
    }
}

fn iso_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
