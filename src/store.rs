use std::fs;
use std::io::{BufWriter, Write};

use camino::{Utf8Path, Utf8PathBuf};

use crate::batch::OperationId;
use crate::error::KiraError;

pub const FAILURE_EXTENSION: &str = "fail";

/// File layout derived from the `--out` pattern: every artifact of a run is
/// `<pattern>_<suffix>`.
#[derive(Debug, Clone)]
pub struct OutputStore {
    pattern: Utf8PathBuf,
    success_ext: &'static str,
}

impl OutputStore {
    pub fn new(pattern: impl Into<Utf8PathBuf>, success_ext: &'static str) -> Self {
        Self {
            pattern: pattern.into(),
            success_ext,
        }
    }

    pub fn pattern(&self) -> &Utf8Path {
        &self.pattern
    }

    pub fn success_path(&self, operation_id: OperationId) -> Utf8PathBuf {
        self.with_suffix(&format!("{operation_id}.{}", self.success_ext))
    }

    pub fn failure_path(&self, operation_id: OperationId) -> Utf8PathBuf {
        self.with_suffix(&format!("{operation_id}.{FAILURE_EXTENSION}"))
    }

    pub fn log_path(&self) -> Utf8PathBuf {
        self.with_suffix("records.log")
    }

    fn with_suffix(&self, suffix: &str) -> Utf8PathBuf {
        Utf8PathBuf::from(format!("{}_{suffix}", self.pattern))
    }

    fn output_dir(&self) -> &Utf8Path {
        match self.pattern.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent,
            _ => Utf8Path::new("."),
        }
    }

    pub fn ensure_output_dir(&self) -> Result<(), KiraError> {
        let dir = self.output_dir();
        fs::create_dir_all(dir.as_std_path())
            .map_err(|err| KiraError::OutputDir(format!("{dir}: {err}")))
    }

    /// Writes through a temp file in the destination directory and renames
    /// it into place, so readers never observe a half-written file.
    pub fn write_atomic<F>(&self, path: &Utf8Path, fill: F) -> Result<(), KiraError>
    where
        F: FnOnce(&mut dyn Write) -> std::io::Result<()>,
    {
        let parent = match path.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent,
            _ => Utf8Path::new("."),
        };
        let temp = tempfile::Builder::new()
            .prefix(".kira-seqfetch")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;

        let mut writer = BufWriter::new(temp);
        fill(&mut writer).map_err(|err| KiraError::Filesystem(format!("{path}: {err}")))?;
        writer
            .flush()
            .map_err(|err| KiraError::Filesystem(format!("{path}: {err}")))?;
        let temp = writer
            .into_inner()
            .map_err(|err| KiraError::Filesystem(format!("{path}: {err}")))?;
        temp.persist(path.as_std_path())
            .map_err(|err| KiraError::Filesystem(format!("{path}: {err}")))?;
        Ok(())
    }
}
