use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::domain::RetType;
use crate::error::KiraError;
use crate::ncbi::{DEFAULT_BASE_URL, DEFAULT_DATABASE};

pub const CONFIG_FILE_NAME: &str = "kira-seqfetch.json";
pub const DEFAULT_MAX_WORKERS: usize = 1;
pub const DEFAULT_CHUNK_SIZE: usize = 100;
pub const DEFAULT_MAX_SYMBOLS: usize = 60;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// On-disk JSON config. Every field is optional; command-line values win.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub out: Option<String>,
    #[serde(default)]
    pub ret_type: Option<RetType>,
    #[serde(default)]
    pub max_workers: Option<usize>,
    #[serde(default)]
    pub chunk_size: Option<usize>,
    #[serde(default)]
    pub max_symbols: Option<usize>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
}

impl Config {
    /// Fields set in `other` replace the ones in `self`.
    pub fn merge(self, other: Config) -> Config {
        Config {
            input: other.input.or(self.input),
            out: other.out.or(self.out),
            ret_type: other.ret_type.or(self.ret_type),
            max_workers: other.max_workers.or(self.max_workers),
            chunk_size: other.chunk_size.or(self.chunk_size),
            max_symbols: other.max_symbols.or(self.max_symbols),
            api_key: other.api_key.or(self.api_key),
            email: other.email.or(self.email),
            timeout_secs: other.timeout_secs.or(self.timeout_secs),
            base_url: other.base_url.or(self.base_url),
            database: other.database.or(self.database),
        }
    }
}

/// Validated, immutable settings for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input: PathBuf,
    pub out: Utf8PathBuf,
    pub ret_type: RetType,
    pub max_workers: usize,
    pub chunk_size: usize,
    pub max_symbols: usize,
    pub api_key_path: Option<PathBuf>,
    pub email: Option<String>,
    pub timeout: Duration,
    pub base_url: String,
    pub database: String,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads the config file: the explicit path if given, otherwise
    /// `./kira-seqfetch.json`, otherwise the user config directory. A
    /// missing implicit file is not an error.
    pub fn load(path: Option<&str>) -> Result<Config, KiraError> {
        if let Some(path) = path {
            return Self::read(PathBuf::from(path));
        }

        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            return Self::read(local);
        }

        if let Some(dirs) = ProjectDirs::from("", "", "kira-seqfetch") {
            let user = dirs.config_dir().join(CONFIG_FILE_NAME);
            if user.exists() {
                return Self::read(user);
            }
        }

        Ok(Config::default())
    }

    fn read(path: PathBuf) -> Result<Config, KiraError> {
        let content = fs::read_to_string(&path).map_err(|_| KiraError::ConfigRead(path.clone()))?;
        serde_json::from_str(&content).map_err(|err| KiraError::ConfigParse(err.to_string()))
    }

    pub fn resolve(config: Config) -> Result<RunConfig, KiraError> {
        let input = config.input.ok_or(KiraError::MissingOption("input"))?;
        let out = config.out.ok_or(KiraError::MissingOption("out"))?;

        let chunk_size = config.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE);
        if chunk_size == 0 {
            return Err(KiraError::InvalidChunkSize(chunk_size));
        }
        let max_symbols = config.max_symbols.unwrap_or(DEFAULT_MAX_SYMBOLS);
        if max_symbols == 0 {
            return Err(KiraError::InvalidLineWidth(max_symbols));
        }
        let max_workers = config.max_workers.unwrap_or(DEFAULT_MAX_WORKERS);
        if max_workers == 0 {
            return Err(KiraError::InvalidWorkerCount(max_workers));
        }

        Ok(RunConfig {
            input: PathBuf::from(input),
            out: Utf8PathBuf::from(out),
            ret_type: config.ret_type.unwrap_or(RetType::Fasta),
            max_workers,
            chunk_size,
            max_symbols,
            api_key_path: config
                .api_key
                .filter(|path| !path.trim().is_empty())
                .map(PathBuf::from),
            email: config.email.filter(|email| !email.trim().is_empty()),
            timeout: Duration::from_secs(config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            base_url: config
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            database: config
                .database
                .unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
        })
    }
}
