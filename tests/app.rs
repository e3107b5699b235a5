use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use camino::Utf8PathBuf;

use kira_seqfetch::app::{self, App, RunSummary};
use kira_seqfetch::config::{Config, ConfigLoader, RunConfig};
use kira_seqfetch::domain::RetType;
use kira_seqfetch::error::KiraError;
use kira_seqfetch::ncbi::{EutilsClient, HistorySession};
use kira_seqfetch::output::JsonOutput;
use kira_seqfetch::progress::{ProgressEvent, ProgressSink};

/// Answers searches with one uid per accession, except accessions starting
/// with `MISSING`, which make the whole search come back empty.
#[derive(Default)]
struct MockEutils {
    fail_register: bool,
    calls: Mutex<Vec<&'static str>>,
}

impl MockEutils {
    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }
}

impl EutilsClient for MockEutils {
    fn esearch(&self, term: &str, retmax: usize) -> Result<String, KiraError> {
        self.calls.lock().unwrap().push("esearch");
        let ids = term.split(',').collect::<Vec<_>>();
        assert!(ids.len() <= retmax);
        if ids.iter().any(|id| id.starts_with("MISSING")) {
            return Ok("<eSearchResult><Count>0</Count><IdList/></eSearchResult>".to_string());
        }
        let id_list = ids
            .iter()
            .map(|id| format!("<Id>{id}</Id>"))
            .collect::<String>();
        Ok(format!(
            "<eSearchResult><Count>{}</Count><IdList>{id_list}</IdList></eSearchResult>",
            ids.len()
        ))
    }

    fn epost(&self, ids: &[String]) -> Result<String, KiraError> {
        self.calls.lock().unwrap().push("epost");
        if self.fail_register {
            return Err(KiraError::NcbiStatus {
                status: 500,
                message: "internal error".to_string(),
            });
        }
        Ok(format!(
            "<ePostResult><QueryKey>1</QueryKey><WebEnv>{}</WebEnv></ePostResult>",
            ids.join("|")
        ))
    }

    fn efetch(&self, session: &HistorySession, ret_type: RetType) -> Result<String, KiraError> {
        self.calls.lock().unwrap().push("efetch");
        assert_eq!(ret_type, RetType::Fasta);
        let mut body = String::new();
        for id in session.web_env.split('|') {
            let sequence = "ACGT".repeat(33);
            body.push_str(&format!(">{id} test record\n"));
            for line in sequence.as_bytes().chunks(70) {
                body.push_str(std::str::from_utf8(line).unwrap());
                body.push('\n');
            }
        }
        Ok(body)
    }
}

#[derive(Default)]
struct Recorder(Mutex<Vec<ProgressEvent>>);

impl ProgressSink for Recorder {
    fn event(&self, event: ProgressEvent) {
        self.0.lock().unwrap().push(event);
    }
}

fn write_ids(dir: &Path, ids: &[String]) -> String {
    let path = dir.join("ids.txt");
    let mut file = fs::File::create(&path).unwrap();
    for id in ids {
        writeln!(file, "{id}").unwrap();
    }
    path.to_string_lossy().to_string()
}

fn run_config(dir: &Path, ids: &[String], chunk_size: usize) -> RunConfig {
    let input = write_ids(dir, ids);
    let out = dir.join("out").join("run");
    ConfigLoader::resolve(Config {
        input: Some(input),
        out: Some(out.to_string_lossy().to_string()),
        chunk_size: Some(chunk_size),
        max_workers: Some(4),
        ..Config::default()
    })
    .unwrap()
}

fn output_files(config: &RunConfig) -> Vec<String> {
    let dir = config.out.parent().unwrap();
    let mut names = fs::read_dir(dir.as_std_path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
        .filter(|name| !name.ends_with(".log"))
        .collect::<Vec<_>>();
    names.sort();
    names
}

fn read(path: Utf8PathBuf) -> String {
    fs::read_to_string(path.as_std_path()).unwrap()
}

fn accessions(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("NC_{i:06}.1")).collect()
}

#[test]
fn single_batch_writes_one_fasta() {
    let temp = tempfile::tempdir().unwrap();
    let ids = accessions(3);
    let config = run_config(temp.path(), &ids, 100);
    let client = MockEutils::default();
    let app = App::new(config.clone(), client, 1);
    let store = app.store();

    let summary = app.run(&JsonOutput).unwrap();

    assert_eq!(output_files(&config), vec!["run_0.fasta"]);
    assert_eq!(summary.batches, 1);
    assert_eq!(summary.success_files, 1);
    assert_eq!(summary.failure_files, 0);
    assert_eq!(summary.records_written, 3);

    let content = read(store.success_path(0));
    assert_eq!(content.matches('>').count(), 3);
    assert!(content.starts_with(">NC_000000.1 test record\n"));
    assert!(content.lines().all(|line| line.starts_with('>') || line.len() <= 60));
}

#[test]
fn zero_match_batch_is_reported_with_its_accessions() {
    let temp = tempfile::tempdir().unwrap();
    let mut ids = accessions(250);
    for id in ids.iter_mut().skip(100).take(100) {
        *id = format!("MISSING_{id}");
    }
    let config = run_config(temp.path(), &ids, 100);
    let app = App::new(config.clone(), MockEutils::default(), 4);
    let store = app.store();

    let summary = app.run(&JsonOutput).unwrap();

    assert_eq!(
        output_files(&config),
        vec!["run_0.fasta", "run_1.fail", "run_2.fasta"]
    );
    assert_eq!(summary.success_files + summary.failure_files, summary.batches);
    let failed = read(store.failure_path(1));
    assert_eq!(failed.lines().collect::<Vec<_>>(), ids[100..200].to_vec());
    assert_eq!(read(store.success_path(0)).matches('>').count(), 100);
    assert_eq!(read(store.success_path(2)).matches('>').count(), 50);
}

#[test]
fn register_failure_skips_fetch_and_marks_batch() {
    let temp = tempfile::tempdir().unwrap();
    let ids = accessions(2);
    let config = run_config(temp.path(), &ids, 100);
    let client = MockEutils {
        fail_register: true,
        ..MockEutils::default()
    };
    let app = App::new(config.clone(), client, 1);
    let store = app.store();

    let summary = app.run(&JsonOutput).unwrap();

    assert_eq!(summary.failure_files, 1);
    assert_eq!(read(store.failure_path(0)), "NC_000000.1\nNC_000001.1\n");
    assert_eq!(output_files(&config), vec!["run_0.fail"]);
}

#[test]
fn register_failure_never_calls_efetch() {
    let client = Arc::new(MockEutils {
        fail_register: true,
        ..MockEutils::default()
    });

    struct Shared(Arc<MockEutils>);
    impl EutilsClient for Shared {
        fn esearch(&self, term: &str, retmax: usize) -> Result<String, KiraError> {
            self.0.esearch(term, retmax)
        }
        fn epost(&self, ids: &[String]) -> Result<String, KiraError> {
            self.0.epost(ids)
        }
        fn efetch(&self, session: &HistorySession, ret_type: RetType) -> Result<String, KiraError> {
            self.0.efetch(session, ret_type)
        }
    }

    let temp = tempfile::tempdir().unwrap();
    let config = run_config(temp.path(), &accessions(5), 2);
    App::new(config, Shared(Arc::clone(&client)), 2)
        .run(&JsonOutput)
        .unwrap();

    let calls = client.calls();
    assert_eq!(calls.iter().filter(|call| **call == "esearch").count(), 3);
    assert_eq!(calls.iter().filter(|call| **call == "epost").count(), 3);
    assert!(!calls.contains(&"efetch"));
}

#[test]
fn rerun_produces_identical_files() {
    let temp = tempfile::tempdir().unwrap();
    let mut ids = accessions(7);
    ids[3] = "MISSING_1".to_string();
    let config = run_config(temp.path(), &ids, 3);

    let snapshot = |config: &RunConfig| -> Vec<(String, String)> {
        let dir = config.out.parent().unwrap().to_owned();
        output_files(config)
            .into_iter()
            .map(|name| {
                let content = read(dir.join(&name));
                (name, content)
            })
            .collect()
    };

    App::new(config.clone(), MockEutils::default(), 3)
        .run(&JsonOutput)
        .unwrap();
    let first = snapshot(&config);
    App::new(config.clone(), MockEutils::default(), 3)
        .run(&JsonOutput)
        .unwrap();
    let second = snapshot(&config);

    assert_eq!(first.len(), 3);
    assert_eq!(first, second);
}

#[test]
fn progress_reaches_total() {
    let temp = tempfile::tempdir().unwrap();
    let config = run_config(temp.path(), &accessions(10), 3);
    let recorder = Recorder::default();
    let summary: RunSummary = App::new(config, MockEutils::default(), 2)
        .run(&recorder)
        .unwrap();

    let events = recorder.0.into_inner().unwrap();
    assert_eq!(
        events.first(),
        Some(&ProgressEvent::Started {
            total: 4,
            workers: 2
        })
    );
    assert_eq!(events.last(), Some(&ProgressEvent::Finished));
    let finished = events
        .iter()
        .filter_map(|event| match event {
            ProgressEvent::BatchFinished { completed, .. } => Some(*completed),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(finished, vec![1, 2, 3, 4]);
    assert_eq!(summary.delivered, 4);
}

#[test]
fn empty_input_writes_nothing() {
    let temp = tempfile::tempdir().unwrap();
    let config = run_config(temp.path(), &[], 10);
    let summary = App::new(config.clone(), MockEutils::default(), 1)
        .run(&JsonOutput)
        .unwrap();
    assert_eq!(summary.batches, 0);
    assert!(output_files(&config).is_empty());
}

#[test]
fn unreadable_input_fails_before_fetching() {
    let temp = tempfile::tempdir().unwrap();
    let mut config = run_config(temp.path(), &accessions(1), 10);
    config.input = temp.path().join("missing.txt");
    let client = MockEutils::default();
    let err = App::new(config, client, 1).run(&JsonOutput).unwrap_err();
    assert!(matches!(err, KiraError::InputRead { .. }));
}

#[test]
fn missing_credential_forces_single_worker_with_one_warning() {
    let temp = tempfile::tempdir().unwrap();
    let config = run_config(temp.path(), &accessions(1), 10);
    assert_eq!(config.max_workers, 4);

    let buffer = Arc::new(Mutex::new(Vec::<u8>::new()));
    let writer = {
        let buffer = Arc::clone(&buffer);
        move || SharedBuffer(Arc::clone(&buffer))
    };
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(writer)
        .finish();

    let credential = tracing::subscriber::with_default(subscriber, || {
        app::resolve_credential(&config)
    });

    assert_eq!(credential.workers, 1);
    assert!(credential.api_key.is_none());
    let logs = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
    assert_eq!(logs.matches("WARN").count(), 1, "logs: {logs}");
}

#[test]
fn unreadable_credential_degrades_instead_of_failing() {
    let temp = tempfile::tempdir().unwrap();
    let mut config = run_config(temp.path(), &accessions(1), 10);
    config.api_key_path = Some(temp.path().join("no-such-key"));
    let credential = app::resolve_credential(&config);
    assert_eq!(credential.workers, 1);
    assert!(credential.api_key.is_none());
}

#[test]
fn readable_credential_keeps_requested_workers() {
    let temp = tempfile::tempdir().unwrap();
    let key_path = temp.path().join("api_key");
    fs::write(&key_path, "0123456789abcdef\n").unwrap();
    let mut config = run_config(temp.path(), &accessions(1), 10);
    config.api_key_path = Some(key_path);

    let credential = app::resolve_credential(&config);
    assert_eq!(credential.workers, 4);
    assert_eq!(
        credential.api_key.as_ref().map(|key| key.as_str()),
        Some("0123456789abcdef")
    );
    let settings = app::eutils_settings(&config, &credential);
    assert_eq!(settings.api_key, credential.api_key);
}

struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
