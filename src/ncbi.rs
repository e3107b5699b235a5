use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;

use crate::domain::{ApiKey, RetType};
use crate::error::KiraError;

pub const DEFAULT_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/";
pub const DEFAULT_DATABASE: &str = "nuccore";

/// History server handle returned by `epost`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistorySession {
    pub query_key: String,
    pub web_env: String,
}

/// The three E-utilities calls used per batch. Implementations return the
/// raw response body; non-2xx answers come back as `KiraError::NcbiStatus`.
pub trait EutilsClient: Send + Sync {
    fn esearch(&self, term: &str, retmax: usize) -> Result<String, KiraError>;
    fn epost(&self, ids: &[String]) -> Result<String, KiraError>;
    fn efetch(&self, session: &HistorySession, ret_type: RetType) -> Result<String, KiraError>;
}

#[derive(Debug, Clone)]
pub struct EutilsSettings {
    pub base_url: String,
    pub database: String,
    pub api_key: Option<ApiKey>,
    pub email: Option<String>,
    pub timeout: Duration,
}

impl Default for EutilsSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            api_key: None,
            email: None,
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Clone)]
pub struct NcbiHttpClient {
    client: Client,
    settings: EutilsSettings,
}

impl NcbiHttpClient {
    pub fn new(settings: EutilsSettings) -> Result<Self, KiraError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kira-seqfetch/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| KiraError::NcbiHttp(err.to_string()))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(settings.timeout)
            .build()
            .map_err(|err| KiraError::NcbiHttp(err.to_string()))?;

        Ok(Self { client, settings })
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{name}", self.settings.base_url.trim_end_matches('/'))
    }

    fn common_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("db", self.settings.database.clone()),
            ("tool", "kira-seqfetch".to_string()),
        ];
        if let Some(email) = &self.settings.email {
            params.push(("email", email.clone()));
        }
        if let Some(key) = &self.settings.api_key {
            params.push(("api_key", key.as_str().to_string()));
        }
        params
    }

    fn get_text(&self, name: &str, params: &[(&str, String)]) -> Result<String, KiraError> {
        let response = self
            .client
            .get(self.endpoint(name))
            .query(&self.common_params())
            .query(params)
            .send()
            .map_err(|err| KiraError::NcbiHttp(err.to_string()))?;
        let response = Self::handle_status(response)?;
        response
            .text()
            .map_err(|err| KiraError::NcbiHttp(err.to_string()))
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, KiraError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "NCBI request failed".to_string());
        Err(KiraError::NcbiStatus { status, message })
    }
}

impl EutilsClient for NcbiHttpClient {
    fn esearch(&self, term: &str, retmax: usize) -> Result<String, KiraError> {
        self.get_text(
            "esearch.fcgi",
            &[("term", term.to_string()), ("retmax", retmax.to_string())],
        )
    }

    fn epost(&self, ids: &[String]) -> Result<String, KiraError> {
        self.get_text("epost.fcgi", &[("id", ids.join(","))])
    }

    fn efetch(&self, session: &HistorySession, ret_type: RetType) -> Result<String, KiraError> {
        self.get_text(
            "efetch.fcgi",
            &[
                ("query_key", session.query_key.clone()),
                ("WebEnv", session.web_env.clone()),
                ("rettype", ret_type.as_str().to_string()),
                ("retmode", "text".to_string()),
            ],
        )
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename = "eSearchResult")]
pub struct SearchResponse {
    #[serde(rename = "Count", default)]
    pub count: Option<String>,
    #[serde(rename = "IdList", default)]
    pub id_list: Option<IdList>,
    #[serde(rename = "ERROR", default)]
    pub error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IdList {
    #[serde(rename = "Id", default)]
    pub ids: Vec<String>,
}

impl SearchResponse {
    pub fn ids(&self) -> &[String] {
        self.id_list
            .as_ref()
            .map(|list| list.ids.as_slice())
            .unwrap_or_default()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename = "ePostResult")]
pub struct PostResponse {
    #[serde(rename = "QueryKey", default)]
    pub query_key: Option<String>,
    #[serde(rename = "WebEnv", default)]
    pub web_env: Option<String>,
    #[serde(rename = "ERROR", default)]
    pub error: Option<String>,
}

impl PostResponse {
    pub fn session(&self) -> Option<HistorySession> {
        let query_key = self.query_key.as_deref()?.trim();
        let web_env = self.web_env.as_deref()?.trim();
        if query_key.is_empty() || web_env.is_empty() {
            return None;
        }
        Some(HistorySession {
            query_key: query_key.to_string(),
            web_env: web_env.to_string(),
        })
    }
}

pub fn parse_search_response(body: &str) -> Result<SearchResponse, String> {
    quick_xml::de::from_str(body).map_err(|err| err.to_string())
}

pub fn parse_post_response(body: &str) -> Result<PostResponse, String> {
    quick_xml::de::from_str(body).map_err(|err| err.to_string())
}
