use std::io::{self, Write};

use serde::Serialize;
use tracing::info;

use crate::app::RunSummary;
use crate::progress::{ProgressEvent, ProgressSink};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

/// Plain mode: progress goes to the log, the summary to stdout as JSON.
pub struct JsonOutput;

impl JsonOutput {
    pub fn print_summary(result: &RunSummary) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, event: ProgressEvent) {
        if let ProgressEvent::BatchFinished {
            completed, total, ..
        } = event
        {
            info!(completed, total, "progress {completed}/{total}");
        }
    }
}
