use std::ops::Index;

use crate::error::KiraError;

pub type OperationId = usize;

/// A contiguous slice of the accession list, numbered by its position in
/// the partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub operation_id: OperationId,
    pub accessions: Vec<String>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.accessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accessions.is_empty()
    }

    /// First few accessions joined for log lines.
    pub fn preview(&self) -> String {
        let head = self
            .accessions
            .iter()
            .take(3)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(",");
        if self.accessions.len() > 3 {
            format!("[{head}, ...]")
        } else {
            format!("[{head}]")
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Batcher {
    chunk_size: usize,
}

impl Batcher {
    pub fn new(chunk_size: usize) -> Result<Self, KiraError> {
        if chunk_size == 0 {
            return Err(KiraError::InvalidChunkSize(chunk_size));
        }
        Ok(Self { chunk_size })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn split(&self, accessions: &[String]) -> BatchTable {
        let batches = accessions
            .chunks(self.chunk_size)
            .enumerate()
            .map(|(operation_id, chunk)| Batch {
                operation_id,
                accessions: chunk.to_vec(),
            })
            .collect();
        BatchTable { batches }
    }
}

/// Read-only lookup from operation id to its batch. Built once before
/// dispatch; ids are the dense range `0..len()`.
#[derive(Debug, Clone, Default)]
pub struct BatchTable {
    batches: Vec<Batch>,
}

impl BatchTable {
    pub fn get(&self, operation_id: OperationId) -> Option<&Batch> {
        self.batches.get(operation_id)
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Batch> {
        self.batches.iter()
    }
}

impl Index<OperationId> for BatchTable {
    type Output = Batch;

    fn index(&self, operation_id: OperationId) -> &Self::Output {
        &self.batches[operation_id]
    }
}

impl<'a> IntoIterator for &'a BatchTable {
    type Item = &'a Batch;
    type IntoIter = std::slice::Iter<'a, Batch>;

    fn into_iter(self) -> Self::IntoIter {
        self.batches.iter()
    }
}
