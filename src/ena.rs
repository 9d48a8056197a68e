use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;

use crate::domain::RawRecord;
use crate::error::ScoutError;
use crate::query::{ArchiveQuery, EnaQuery};
use crate::retry::{RetryError, RetryPolicy};

const ENA_PORTAL_URL: &str = "https://www.ebi.ac.uk/ena/portal/api/search";

/// Restricts expression queries to genomic sequencing runs, the way the
/// portal expects the clause to be spelled.
const LIBRARY_FILTER: &str = "library_source=GENOMIC AND \
    (library_strategy=OTHER OR library_strategy=WGS OR library_strategy=WGA) AND \
    (library_selection=MNase OR library_selection=RANDOM OR \
    library_selection=unspecified OR library_selection=\"size fractionation\")";

pub trait EnaClient: Send + Sync {
    fn search(&self, query: &ArchiveQuery, limit: u64) -> Result<Vec<RawRecord>, ScoutError>;
}

#[derive(Clone)]
pub struct EnaHttpClient {
    client: Client,
    retry: RetryPolicy,
    base_url: String,
}

impl EnaHttpClient {
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
            .map_err(|err| ScoutError::EnaHttp(err.to_string()))?;
        Ok(Self {
            client,
            retry: RetryPolicy::default(),
            base_url: ENA_PORTAL_URL.to_string(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn form_params(query: &ArchiveQuery, limit: u64) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("dataPortal", "ena".to_string()),
            ("dccDataOnly", "false".to_string()),
            ("download", "false".to_string()),
            ("result", "read_run".to_string()),
            ("format", "tsv".to_string()),
            ("limit", limit.to_string()),
            ("fields", "all".to_string()),
        ];
        match &query.ena_query {
            EnaQuery::IncludeAccessions(list) => {
                params.push(("includeAccessions", list.clone()));
            }
            EnaQuery::Expression(expression) => {
                params.push(("query", format!("\"{expression} AND {LIBRARY_FILTER}\"")));
            }
        }
        params
    }
}

impl EnaClient for EnaHttpClient {
    fn search(&self, query: &ArchiveQuery, limit: u64) -> Result<Vec<RawRecord>, ScoutError> {
        let params = Self::form_params(query, limit);
        let response = self
            .retry
            .send(|| self.client.post(&self.base_url).form(&params))
            .map_err(|err| match err {
                RetryError::Exhausted { attempts, message } => ScoutError::ArchiveUnavailable {
                    archive: "ENA".to_string(),
                    attempts,
                    message,
                },
                RetryError::Fatal { message } => ScoutError::EnaHttp(message),
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "ENA request failed".to_string());
            return Err(ScoutError::EnaStatus { status, message });
        }

        let body = response
            .text()
            .map_err(|err| ScoutError::EnaHttp(err.to_string()))?;
        let records = parse_tsv(&body);
        debug!("ENA returned {} record(s) for {}", records.len(), query.label);
        Ok(records)
    }
}

/// Parse the portal's TSV body: first non-empty line is the header, each
/// following line one record. Empty values are dropped so that a missing
/// field is represented by an absent key, never an empty string.
pub fn parse_tsv(body: &str) -> Vec<RawRecord> {
    let mut lines = body.lines().filter(|line| !line.trim().is_empty());
    let Some(header) = lines.next() else {
        return Vec::new();
    };
    let columns: Vec<&str> = header.split('\t').collect();

    lines
        .map(|line| {
            let mut record = RawRecord::new();
            for (name, value) in columns.iter().zip(line.split('\t')) {
                let value = value.trim();
                if !value.is_empty() {
                    record.insert((*name).to_string(), value.to_string());
                }
            }
            record
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryKind;
    use crate::domain::AccessionKind;

    #[test]
    fn parse_tsv_drops_empty_values() {
        let body = "run_accession\tbase_count\tscientific_name\n\
                    SRR000001\t1000\tEscherichia coli\n\
                    SRR000002\t\tEscherichia coli\n";
        let records = parse_tsv(body);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["base_count"], "1000");
        assert!(!records[1].contains_key("base_count"));
    }

    #[test]
    fn parse_tsv_empty_body() {
        assert!(parse_tsv("").is_empty());
        assert!(parse_tsv("run_accession\tbase_count\n").is_empty());
    }

    #[test]
    fn accession_batches_use_include_accessions() {
        let query = ArchiveQuery {
            kind: QueryKind::Accessions(AccessionKind::Run),
            label: "SRR000001,SRR000002".to_string(),
            ena_query: EnaQuery::IncludeAccessions("SRR000001,SRR000002".to_string()),
            sra_term: "SRR000001 OR SRR000002".to_string(),
            accessions: vec!["SRR000001".to_string(), "SRR000002".to_string()],
        };
        let params = EnaHttpClient::form_params(&query, 100);
        assert!(params
            .iter()
            .any(|(key, value)| *key == "includeAccessions" && value == "SRR000001,SRR000002"));
        assert!(!params.iter().any(|(key, _)| *key == "query"));
    }

    #[test]
    fn expression_batches_carry_library_filter() {
        let query = ArchiveQuery {
            kind: QueryKind::TaxonTree,
            label: "taxon 1280".to_string(),
            ena_query: EnaQuery::Expression("tax_tree(1280)".to_string()),
            sra_term: "txid1280[Organism:exp]".to_string(),
            accessions: Vec::new(),
        };
        let params = EnaHttpClient::form_params(&query, 100);
        let (_, value) = params
            .iter()
            .find(|(key, _)| *key == "query")
            .expect("query param");
        assert!(value.starts_with("\"tax_tree(1280) AND "));
        assert!(value.contains("library_source=GENOMIC"));
    }
}
