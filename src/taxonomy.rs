use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::time::Duration;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use flate2::read::GzDecoder;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::{debug, warn};

use crate::error::ScoutError;
use crate::retry::{RetryError, RetryPolicy};

const GENOME_SIZE_URL: &str =
    "https://ftp.ncbi.nlm.nih.gov/genomes/ASSEMBLY_REPORTS/species_genome_size.txt.gz";

/// Expected ungapped genome length per species-level taxon id, from NCBI's
/// assembly reports. Used to resolve coverage when the user gives no
/// genome size.
#[derive(Debug, Clone, Default)]
pub struct GenomeSizeTable {
    sizes: BTreeMap<u32, u64>,
}

impl GenomeSizeTable {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (u32, u64)>) -> Self {
        Self {
            sizes: entries.into_iter().collect(),
        }
    }

    /// Parse the decompressed `species_genome_size.txt` table. Comment
    /// lines and rows with unparsable ids or lengths are skipped.
    pub fn parse(text: &str) -> Self {
        let mut sizes = BTreeMap::new();
        for line in text.lines() {
            if line.starts_with('#') || line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 4 {
                continue;
            }
            let (Ok(tax_id), Ok(expected)) =
                (fields[0].trim().parse::<u32>(), fields[3].trim().parse::<u64>())
            else {
                continue;
            };
            sizes.insert(tax_id, expected);
        }
        Self { sizes }
    }

    pub fn get(&self, tax_id: u32) -> Option<u64> {
        self.sizes.get(&tax_id).copied()
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }
}

pub trait GenomeSizeClient: Send + Sync {
    fn genome_sizes(&self) -> Result<GenomeSizeTable, ScoutError>;
}

#[derive(Clone)]
pub struct NcbiGenomeSizeClient {
    client: Client,
    retry: RetryPolicy,
    url: String,
    cache_path: Option<Utf8PathBuf>,
}

impl NcbiGenomeSizeClient {
    pub fn new() -> Result<Self, ScoutError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("seqscout/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| ScoutError::Filesystem(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|err| ScoutError::GenomeSizeHttp(err.to_string()))?;

        let cache_path = BaseDirs::new().and_then(|dirs| {
            Utf8PathBuf::from_path_buf(
                dirs.home_dir()
                    .join(".cache")
                    .join("seqscout")
                    .join("species_genome_size.txt"),
            )
            .ok()
        });

        Ok(Self {
            client,
            retry: RetryPolicy::default(),
            url: GENOME_SIZE_URL.to_string(),
            cache_path,
        })
    }

    fn read_cache(&self) -> Option<GenomeSizeTable> {
        let path = self.cache_path.as_ref()?;
        if !path.as_std_path().exists() {
            return None;
        }
        let content = fs::read_to_string(path.as_std_path()).ok()?;
        let table = GenomeSizeTable::parse(&content);
        if table.is_empty() {
            return None;
        }
        debug!("using cached genome size table at {path}");
        Some(table)
    }

    fn write_cache(&self, content: &str) {
        let Some(path) = &self.cache_path else {
            return;
        };
        let result = (|| -> Result<(), ScoutError> {
            let parent = path
                .parent()
                .ok_or_else(|| ScoutError::Filesystem("invalid cache path".to_string()))?;
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| ScoutError::Filesystem(err.to_string()))?;
            let temp = tempfile::Builder::new()
                .prefix("seqscout-sizes")
                .tempfile_in(parent.as_std_path())
                .map_err(|err| ScoutError::Filesystem(err.to_string()))?;
            fs::write(temp.path(), content)
                .map_err(|err| ScoutError::Filesystem(err.to_string()))?;
            if path.as_std_path().exists() {
                fs::remove_file(path.as_std_path())
                    .map_err(|err| ScoutError::Filesystem(err.to_string()))?;
            }
            temp.persist(path.as_std_path())
                .map_err(|err| ScoutError::Filesystem(err.to_string()))?;
            Ok(())
        })();
        if let Err(err) = result {
            warn!("failed to cache genome size table: {err}");
        }
    }
}

impl GenomeSizeClient for NcbiGenomeSizeClient {
    fn genome_sizes(&self) -> Result<GenomeSizeTable, ScoutError> {
        if let Some(table) = self.read_cache() {
            return Ok(table);
        }

        let response = self
            .retry
            .send(|| self.client.get(&self.url))
            .map_err(|err| match err {
                RetryError::Exhausted { attempts, message } => ScoutError::ArchiveUnavailable {
                    archive: "NCBI genome size table".to_string(),
                    attempts,
                    message,
                },
                RetryError::Fatal { message } => ScoutError::GenomeSizeHttp(message),
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "genome size table request failed".to_string());
            return Err(ScoutError::GenomeSizeStatus { status, message });
        }

        let compressed = response
            .bytes()
            .map_err(|err| ScoutError::GenomeSizeHttp(err.to_string()))?;
        let mut decoder = GzDecoder::new(compressed.as_ref());
        let mut text = String::new();
        decoder
            .read_to_string(&mut text)
            .map_err(|err| ScoutError::GenomeSizeHttp(err.to_string()))?;

        let table = GenomeSizeTable::parse(&text);
        debug!("genome size table has {} species", table.len());
        self.write_cache(&text);
        Ok(table)
    }
}
