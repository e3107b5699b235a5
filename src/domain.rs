use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::KiraError;

/// Entrez `rettype` values accepted for nucleotide records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum RetType {
    Fasta,
    FastaCdsNa,
    FastaCdsAa,
}

impl RetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetType::Fasta => "fasta",
            RetType::FastaCdsNa => "fasta_cds_na",
            RetType::FastaCdsAa => "fasta_cds_aa",
        }
    }

    pub fn success_extension(&self) -> &'static str {
        "fasta"
    }
}

impl fmt::Display for RetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RetType {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "fasta" => Ok(RetType::Fasta),
            "fasta_cds_na" => Ok(RetType::FastaCdsNa),
            "fasta_cds_aa" => Ok(RetType::FastaCdsAa),
            other => Err(KiraError::ConfigParse(format!("unknown ret_type: {other}"))),
        }
    }
}

/// NCBI API key. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_ret_type() {
        assert_eq!("fasta_cds_aa".parse::<RetType>().unwrap(), RetType::FastaCdsAa);
        let err = "genbank".parse::<RetType>().unwrap_err();
        assert_matches!(err, KiraError::ConfigParse(_));
    }

    #[test]
    fn api_key_is_trimmed_and_hidden() {
        let key = ApiKey::new("  abc123\n").unwrap();
        assert_eq!(key.as_str(), "abc123");
        assert_eq!(format!("{key:?}"), "ApiKey(***)");
        assert!(ApiKey::new(" \n").is_none());
    }
}
