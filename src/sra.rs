use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use tracing::debug;

use crate::domain::RawRecord;
use crate::error::ScoutError;
use crate::query::ArchiveQuery;
use crate::retry::{RetryError, RetryPolicy};

const EUTILS_BASE: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

pub trait SraClient: Send + Sync {
    fn search(&self, query: &ArchiveQuery, limit: u64) -> Result<Vec<RawRecord>, ScoutError>;
}

#[derive(Clone)]
pub struct SraHttpClient {
    client: Client,
    retry: RetryPolicy,
    base_url: String,
}

impl SraHttpClient {
    pub fn new() -> Result<Self, ScoutError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("seqscout/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| ScoutError::Filesystem(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| ScoutError::SraHttp(err.to_string()))?;
        Ok(Self {
            client,
            retry: RetryPolicy::default(),
            base_url: EUTILS_BASE.to_string(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn send_form(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<reqwest::blocking::Response, ScoutError> {
        let url = format!("{}/{endpoint}", self.base_url);
        let response = self
            .retry
            .send(|| self.client.post(&url).form(params))
            .map_err(|err| match err {
                RetryError::Exhausted { attempts, message } => ScoutError::ArchiveUnavailable {
                    archive: "SRA".to_string(),
                    attempts,
                    message,
                },
                RetryError::Fatal { message } => ScoutError::SraHttp(message),
            })?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "SRA request failed".to_string());
            return Err(ScoutError::SraStatus { status, message });
        }
        Ok(response)
    }

    fn esearch_ids(&self, term: &str, limit: u64) -> Result<Vec<String>, ScoutError> {
        let params = [
            ("db", "sra".to_string()),
            ("term", term.to_string()),
            ("retmax", limit.to_string()),
            ("retmode", "json".to_string()),
        ];
        let response = self.send_form("esearch.fcgi", &params)?;
        let payload: Value = response
            .json()
            .map_err(|err| ScoutError::SraHttp(err.to_string()))?;
        let ids = payload["esearchresult"]["idlist"]
            .as_array()
            .map(|list| {
                list.iter()
                    .filter_map(|value| value.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();
        Ok(ids)
    }

    fn efetch_runinfo(&self, ids: &[String]) -> Result<Vec<RawRecord>, ScoutError> {
        let params = [
            ("db", "sra".to_string()),
            ("rettype", "runinfo".to_string()),
            ("retmode", "text".to_string()),
            ("id", ids.join(",")),
        ];
        let response = self.send_form("efetch.fcgi", &params)?;
        let body = response
            .text()
            .map_err(|err| ScoutError::SraHttp(err.to_string()))?;
        parse_runinfo(&body)
    }
}

impl SraClient for SraHttpClient {
    fn search(&self, query: &ArchiveQuery, limit: u64) -> Result<Vec<RawRecord>, ScoutError> {
        let ids = self.esearch_ids(&query.sra_term, limit)?;
        if ids.is_empty() {
            debug!("SRA returned no ids for {}", query.label);
            return Ok(Vec::new());
        }
        let records = self.efetch_runinfo(&ids)?;
        debug!("SRA returned {} record(s) for {}", records.len(), query.label);
        Ok(records)
    }
}

/// Parse an E-utilities RunInfo body. Paged responses repeat the header
/// line, so rows whose first column is `Run` are skipped.
pub fn parse_runinfo(body: &str) -> Result<Vec<RawRecord>, ScoutError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(body.as_bytes());
    let headers = reader
        .headers()
        .map_err(|err| ScoutError::SraHttp(err.to_string()))?
        .clone();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|err| ScoutError::SraHttp(err.to_string()))?;
        if row.get(0) == Some("Run") {
            continue;
        }
        let mut record = RawRecord::new();
        for (name, value) in headers.iter().zip(row.iter()) {
            let value = value.trim();
            if !value.is_empty() {
                record.insert(name.to_string(), value.to_string());
            }
        }
        if !record.is_empty() {
            records.push(record);
        }
    }
    Ok(records)
}
