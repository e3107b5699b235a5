use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::batch::{Batch, OperationId};
use crate::domain::RetType;
use crate::error::KiraError;
use crate::ncbi::{self, EutilsClient, HistorySession};

/// Why a batch did not produce sequences.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchFailure {
    #[error("search request failed: {0}")]
    SearchTransport(String),

    #[error("search matched zero records")]
    ZeroMatches,

    #[error("search reported error: {0}")]
    SearchRemote(String),

    #[error("search response not understood: {0}")]
    SearchMalformed(String),

    #[error("register request failed: {0}")]
    RegisterTransport(String),

    #[error("register response not understood: {0}")]
    RegisterMalformed(String),

    #[error("fetch request failed: {0}")]
    FetchTransport(String),
}

impl FetchFailure {
    pub fn kind(&self) -> &'static str {
        match self {
            FetchFailure::SearchTransport(_) => "search_transport_error",
            FetchFailure::ZeroMatches => "zero_matches",
            FetchFailure::SearchRemote(_) => "search_remote_error",
            FetchFailure::SearchMalformed(_) => "search_malformed_response",
            FetchFailure::RegisterTransport(_) => "register_transport_error",
            FetchFailure::RegisterMalformed(_) => "register_malformed_response",
            FetchFailure::FetchTransport(_) => "fetch_transport_error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStatus {
    Success { payload: String },
    Failed(FetchFailure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub operation_id: OperationId,
    pub status: FetchStatus,
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, FetchStatus::Success { .. })
    }

    /// Raw record text; empty for failed batches.
    pub fn payload(&self) -> &str {
        match &self.status {
            FetchStatus::Success { payload } => payload,
            FetchStatus::Failed(_) => "",
        }
    }

    pub fn failure(&self) -> Option<&FetchFailure> {
        match &self.status {
            FetchStatus::Success { .. } => None,
            FetchStatus::Failed(failure) => Some(failure),
        }
    }
}

/// Drives one batch through esearch, epost and efetch. Holds no state
/// between batches, so a single instance is shared by all workers.
pub struct RemoteFetcher<C: EutilsClient> {
    client: C,
    ret_type: RetType,
    retmax: usize,
}

impl<C: EutilsClient> RemoteFetcher<C> {
    pub fn new(client: C, ret_type: RetType, retmax: usize) -> Self {
        Self {
            client,
            ret_type,
            retmax,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn fetch_batch(&self, batch: &Batch) -> FetchOutcome {
        let op_id = batch.operation_id;
        debug!(op_id, target_ids = %batch.preview(), "current target");

        let status = match self.run_protocol(batch) {
            Ok(payload) => {
                debug!(op_id, target_ids = %batch.preview(), "fasta obtained");
                FetchStatus::Success { payload }
            }
            Err(failure) => {
                log_failure(op_id, &failure);
                FetchStatus::Failed(failure)
            }
        };

        FetchOutcome {
            operation_id: op_id,
            status,
        }
    }

    fn run_protocol(&self, batch: &Batch) -> Result<String, FetchFailure> {
        let ids = self.search(batch)?;
        let session = self.register(batch.operation_id, &ids)?;
        self.fetch(&session)
    }

    fn search(&self, batch: &Batch) -> Result<Vec<String>, FetchFailure> {
        let term = batch.accessions.join(",");
        let body = self
            .client
            .esearch(&term, self.retmax)
            .map_err(|err| FetchFailure::SearchTransport(describe(&err)))?;
        let response =
            ncbi::parse_search_response(&body).map_err(FetchFailure::SearchMalformed)?;

        match (response.count.as_deref(), response.error.as_deref()) {
            (Some(count), _) => {
                let count = count.trim().parse::<u64>().map_err(|_| {
                    FetchFailure::SearchMalformed(format!("non-numeric Count {count:?}"))
                })?;
                if count == 0 {
                    return Err(FetchFailure::ZeroMatches);
                }
                let ids = response.ids();
                if ids.is_empty() {
                    return Err(FetchFailure::SearchMalformed(format!(
                        "Count is {count} but IdList is empty"
                    )));
                }
                debug!(op_id = batch.operation_id, found = count, "found records");
                Ok(ids.to_vec())
            }
            (None, Some(message)) => Err(FetchFailure::SearchRemote(message.trim().to_string())),
            (None, None) => Err(FetchFailure::SearchMalformed(
                "no Count and no error description from NCBI".to_string(),
            )),
        }
    }

    fn register(&self, op_id: OperationId, ids: &[String]) -> Result<HistorySession, FetchFailure> {
        let body = self
            .client
            .epost(ids)
            .map_err(|err| FetchFailure::RegisterTransport(describe(&err)))?;
        let response =
            ncbi::parse_post_response(&body).map_err(FetchFailure::RegisterMalformed)?;
        let session = response.session().ok_or_else(|| {
            FetchFailure::RegisterMalformed(
                response
                    .error
                    .clone()
                    .unwrap_or_else(|| "missing QueryKey or WebEnv".to_string()),
            )
        })?;
        debug!(op_id, query_key = %session.query_key, "registered result set");
        Ok(session)
    }

    fn fetch(&self, session: &HistorySession) -> Result<String, FetchFailure> {
        self.client
            .efetch(session, self.ret_type)
            .map_err(|err| FetchFailure::FetchTransport(describe(&err)))
    }
}

fn describe(err: &KiraError) -> String {
    match err {
        KiraError::NcbiStatus { status, message } => format!("{status}: {}", message.trim()),
        other => other.to_string(),
    }
}

fn log_failure(op_id: OperationId, failure: &FetchFailure) {
    match failure {
        FetchFailure::ZeroMatches => {
            warn!(op_id, kind = failure.kind(), "search resulted in zero values for current target");
        }
        other => {
            error!(op_id, kind = other.kind(), "{other}");
        }
    }
}

/// Logs the terminal state of an outcome once it has been handed to the sink.
pub fn log_delivered(outcome: &FetchOutcome) {
    if outcome.is_success() {
        info!(op_id = outcome.operation_id, outcome = "success", "batch fetched");
    } else {
        debug!(op_id = outcome.operation_id, outcome = "failed", "batch failed");
    }
}
