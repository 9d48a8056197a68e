use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ScoutError {
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("failed to read accession file at {0}")]
    QueryFileRead(PathBuf),

    #[error("accession file {0} contains no entries")]
    EmptyQueryFile(PathBuf),

    #[error("ENA request failed: {0}")]
    EnaHttp(String),

    #[error("ENA returned status {status}: {message}")]
    EnaStatus { status: u16, message: String },

    #[error("SRA request failed: {0}")]
    SraHttp(String),

    #[error("SRA returned status {status}: {message}")]
    SraStatus { status: u16, message: String },

    #[error("genome size table request failed: {0}")]
    GenomeSizeHttp(String),

    #[error("genome size table returned status {status}: {message}")]
    GenomeSizeStatus { status: u16, message: String },

    #[error("{archive} unavailable after {attempts} attempts: {message}")]
    ArchiveUnavailable {
        archive: String,
        attempts: usize,
        message: String,
    },

    #[error("output file already exists: {0} (use --force to overwrite)")]
    OutputExists(PathBuf),

    #[error("invalid filter settings: {0}")]
    InvalidFilter(String),

    #[error("failed to parse metrics table: {0}")]
    MetricsParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
