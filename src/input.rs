use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;

use crate::domain::ApiKey;
use crate::error::KiraError;

/// Reads one accession per line. Blank lines are kept; `.gz` files are
/// decompressed on the fly.
pub fn read_accessions(path: &Path) -> Result<Vec<String>, KiraError> {
    let read_err = |err: std::io::Error| KiraError::InputRead {
        path: path.to_path_buf(),
        message: err.to_string(),
    };

    let file = File::open(path).map_err(read_err)?;
    let mut content = String::new();
    let is_gzip = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false);
    if is_gzip {
        GzDecoder::new(BufReader::new(file))
            .read_to_string(&mut content)
            .map_err(read_err)?;
    } else {
        BufReader::new(file)
            .read_to_string(&mut content)
            .map_err(read_err)?;
    }

    Ok(content.lines().map(str::to_string).collect())
}

pub fn read_api_key(path: &Path) -> Result<ApiKey, KiraError> {
    let content = std::fs::read_to_string(path).map_err(|err| KiraError::ApiKeyRead {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    let first_line = content.lines().next().unwrap_or_default();
    ApiKey::new(first_line).ok_or_else(|| KiraError::ApiKeyRead {
        path: path.to_path_buf(),
        message: "file is empty".to_string(),
    })
}
