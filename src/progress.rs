use crate::batch::OperationId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Started {
        total: usize,
        workers: usize,
    },
    /// `success` is `None` when the batch crashed and produced no outcome.
    BatchFinished {
        operation_id: OperationId,
        completed: usize,
        total: usize,
        success: Option<bool>,
    },
    Message(String),
    Finished,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}
