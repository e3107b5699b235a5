use std::fs::OpenOptions;
use std::process::ExitCode;
use std::sync::Mutex;

use clap::Parser;
use miette::IntoDiagnostic;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use kira_seqfetch::app::{self, App, RunSummary};
use kira_seqfetch::config::{Config, ConfigLoader, RunConfig};
use kira_seqfetch::domain::RetType;
use kira_seqfetch::error::KiraError;
use kira_seqfetch::ncbi::NcbiHttpClient;
use kira_seqfetch::output::{JsonOutput, OutputMode};
use kira_seqfetch::store::OutputStore;
use kira_seqfetch::tui::Tui;

#[derive(Parser)]
#[command(name = "kira-seqfetch")]
#[command(about = "Download listed NCBI nucleotide records in batches")]
#[command(version, author)]
struct Cli {
    /// File with one accession per line (`.gz` accepted)
    #[arg(short = 'i', long)]
    input: Option<String>,

    /// Output pattern; results are written to <OUT>_<batch>.fasta / .fail
    #[arg(short = 'o', long)]
    out: Option<String>,

    /// Type of the returned records [default: fasta]
    #[arg(long, value_enum)]
    ret_type: Option<RetType>,

    /// Number of threads used for requests [default: 1]
    #[arg(long)]
    max_workers: Option<usize>,

    /// Maximum accessions per request [default: 100]
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Maximum symbols per sequence row in FASTA output [default: 60]
    #[arg(long)]
    max_symbols: Option<usize>,

    /// Path of a file holding an NCBI API key
    #[arg(long)]
    api_key: Option<String>,

    /// Contact e-mail sent with every request
    #[arg(long)]
    email: Option<String>,

    /// HTTP timeout per request in seconds [default: 60]
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// JSON config file (defaults to ./kira-seqfetch.json when present)
    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    non_interactive: bool,
}

impl Cli {
    fn overrides(&self) -> Config {
        Config {
            input: self.input.clone(),
            out: self.out.clone(),
            ret_type: self.ret_type,
            max_workers: self.max_workers,
            chunk_size: self.chunk_size,
            max_symbols: self.max_symbols,
            api_key: self.api_key.clone(),
            email: self.email.clone(),
            timeout_secs: self.timeout_secs,
            base_url: None,
            database: None,
        }
    }
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(kira) = report.downcast_ref::<KiraError>() {
            return ExitCode::from(map_exit_code(kira));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &KiraError) -> u8 {
    match error {
        KiraError::InvalidChunkSize(_)
        | KiraError::InvalidLineWidth(_)
        | KiraError::InvalidWorkerCount(_)
        | KiraError::MissingOption(_)
        | KiraError::ConfigRead(_)
        | KiraError::ConfigParse(_)
        | KiraError::InputRead { .. } => 2,
        KiraError::Interrupted => 130,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let file_config = ConfigLoader::load(cli.config.as_deref())?;
    let config = ConfigLoader::resolve(file_config.merge(cli.overrides()))?;

    let store = OutputStore::new(config.out.clone(), config.ret_type.success_extension());
    store.ensure_output_dir()?;
    init_tracing(&store, output_mode)?;
    log_settings(&config, &store);

    let credential = app::resolve_credential(&config);
    let client = NcbiHttpClient::new(app::eutils_settings(&config, &credential))?;
    let app = App::new(config, client, credential.workers);

    match output_mode {
        OutputMode::NonInteractive => {
            let summary = app.run(&JsonOutput)?;
            JsonOutput::print_summary(&summary).into_diagnostic()?;
        }
        OutputMode::Interactive => {
            let mut tui = Tui::new();
            let summary = tui.run(move |sink| app.run(sink))?;
            print_summary(&summary);
        }
    }
    Ok(())
}

/// Console output follows `RUST_LOG` (default `info`) and is muted under the
/// dashboard; `<out>_records.log` always gets debug events of this crate.
fn init_tracing(store: &OutputStore, output_mode: OutputMode) -> Result<(), KiraError> {
    let log_path = store.log_path();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path.as_std_path())
        .map_err(|err| KiraError::Logging(format!("{log_path}: {err}")))?;

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .with_filter(EnvFilter::new("info,kira_seqfetch=debug"));

    let console_layer = matches!(output_mode, OutputMode::NonInteractive).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
    });

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|err| KiraError::Logging(err.to_string()))
}

fn log_settings(config: &RunConfig, store: &OutputStore) {
    info!("requesting NCBI API for some accessions");
    info!("descriptive logs could be found at {}", store.log_path());
    debug!("max number of accessions per request set {}", config.chunk_size);
    debug!("return type of sequences set {}", config.ret_type);
    debug!("max workers for requests set {}", config.max_workers);
    debug!("max symbols per row in FASTA set {}", config.max_symbols);
}

fn print_summary(summary: &RunSummary) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let red = "\x1b[31m";
    let reset = "\x1b[0m";

    println!("{cyan}KIRA-SEQFETCH summary{reset}");
    println!(
        "{green}Batches fetched: {} ({} records){reset}",
        summary.success_files, summary.records_written
    );
    println!(
        "{yellow}Batches failed: {} (accessions in *.fail files){reset}",
        summary.failure_files
    );
    if !summary.crashed.is_empty() || summary.write_errors > 0 {
        println!(
            "{red}Crashed batches: {:?}, write errors: {}{reset}",
            summary.crashed, summary.write_errors
        );
    }
    println!("{cyan}Log: {}{reset}", summary.log_path);
}
