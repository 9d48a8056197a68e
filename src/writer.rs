use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info};

use crate::domain::RawRecord;
use crate::error::ScoutError;
use crate::filter::Exclusion;
use crate::normalize::{METADATA_COLUMNS, Record};

/// The four search artifacts. Every write goes through a temp file in the
/// destination directory followed by an atomic rename, so an interrupted
/// run never leaves a partial artifact.
#[derive(Debug, Clone)]
pub struct SearchWriter {
    pub metadata: Utf8PathBuf,
    pub accessions: Utf8PathBuf,
    pub filtered: Utf8PathBuf,
    pub summary: Utf8PathBuf,
    force: bool,
    include_empty: bool,
}

impl SearchWriter {
    pub fn new(outdir: &Utf8Path, prefix: &str, force: bool, include_empty: bool) -> Self {
        Self {
            metadata: outdir.join(format!("{prefix}-metadata.txt")),
            accessions: outdir.join(format!("{prefix}-accessions.txt")),
            filtered: outdir.join(format!("{prefix}-filtered.txt")),
            summary: outdir.join(format!("{prefix}-search.txt")),
            force,
            include_empty,
        }
    }

    /// Refuse up front when any artifact already exists and `--force` is
    /// not set, before any archive traffic happens.
    pub fn ensure_writable(&self) -> Result<(), ScoutError> {
        for path in [&self.metadata, &self.accessions, &self.filtered, &self.summary] {
            if path.as_std_path().exists() && !self.force {
                return Err(ScoutError::OutputExists(path.as_std_path().to_path_buf()));
            }
        }
        Ok(())
    }

    pub fn write_metadata(&self, records: &[Record]) -> Result<(), ScoutError> {
        let columns = active_columns(records, self.include_empty);
        let mut buffer = Vec::new();
        {
            let mut writer = csv::WriterBuilder::new()
                .delimiter(b'\t')
                .from_writer(&mut buffer);
            writer
                .write_record(&columns)
                .map_err(|err| ScoutError::Filesystem(err.to_string()))?;
            for record in records {
                let row: Vec<String> = columns.iter().map(|col| record.column(col)).collect();
                writer
                    .write_record(&row)
                    .map_err(|err| ScoutError::Filesystem(err.to_string()))?;
            }
            writer
                .flush()
                .map_err(|err| ScoutError::Filesystem(err.to_string()))?;
        }
        info!("writing metadata to {}", self.metadata);
        write_atomic(&self.metadata, &buffer, self.force)
    }

    pub fn write_accessions(&self, records: &[Record]) -> Result<(), ScoutError> {
        let mut content = String::new();
        for record in records {
            content.push_str(&record.accession);
            content.push('\n');
        }
        info!("writing accessions to {}", self.accessions);
        write_atomic(&self.accessions, content.as_bytes(), self.force)
    }

    pub fn write_filtered(&self, excluded: &[Exclusion]) -> Result<(), ScoutError> {
        let mut content = String::from("accession\treason\n");
        for exclusion in excluded {
            content.push_str(&format!("{}\t{}\n", exclusion.accession, exclusion.reason));
        }
        info!("writing filtered accessions to {}", self.filtered);
        write_atomic(&self.filtered, content.as_bytes(), self.force)
    }

    pub fn write_summary(&self, lines: &[String]) -> Result<(), ScoutError> {
        let mut content = lines.join("\n");
        content.push('\n');
        info!("writing summary to {}", self.summary);
        write_atomic(&self.summary, content.as_bytes(), self.force)
    }
}

/// Columns that appear in the metadata table: the fixed schema order,
/// minus columns empty for every row unless `include_empty` is set. With
/// no records the full header is kept.
pub fn active_columns(records: &[Record], include_empty: bool) -> Vec<&'static str> {
    if include_empty || records.is_empty() {
        return METADATA_COLUMNS.to_vec();
    }
    METADATA_COLUMNS
        .iter()
        .copied()
        .filter(|column| records.iter().any(|record| !record.column(column).is_empty()))
        .collect()
}

/// Write content to a temp file in the destination directory and move it
/// into place. Overwriting an existing file requires `force`.
pub fn write_atomic(path: &Utf8Path, content: &[u8], force: bool) -> Result<(), ScoutError> {
    if path.as_std_path().exists() && !force {
        return Err(ScoutError::OutputExists(path.as_std_path().to_path_buf()));
    }
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent.to_path_buf(),
        _ => Utf8PathBuf::from("."),
    };
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| ScoutError::Filesystem(err.to_string()))?;
    let temp = tempfile::Builder::new()
        .prefix(".seqscout")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| ScoutError::Filesystem(err.to_string()))?;
    fs::write(temp.path(), content).map_err(|err| ScoutError::Filesystem(err.to_string()))?;
    if path.as_std_path().exists() {
        fs::remove_file(path.as_std_path())
            .map_err(|err| ScoutError::Filesystem(err.to_string()))?;
    }
    temp.persist(path.as_std_path())
        .map_err(|err| ScoutError::Filesystem(err.to_string()))?;
    debug!("wrote {}", path);
    Ok(())
}

/// Read a tab-delimited table back into raw field maps; empty cells are
/// dropped, mirroring the archive parsers.
pub fn read_table(path: &Utf8Path) -> Result<Vec<RawRecord>, ScoutError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_path(path.as_std_path())
        .map_err(|err| ScoutError::Filesystem(err.to_string()))?;
    let headers = reader
        .headers()
        .map_err(|err| ScoutError::Filesystem(err.to_string()))?
        .clone();

    let mut rows = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|err| ScoutError::Filesystem(err.to_string()))?;
        let mut record = RawRecord::new();
        for (name, value) in headers.iter().zip(row.iter()) {
            if !value.is_empty() {
                record.insert(name.to_string(), value.to_string());
            }
        }
        rows.push(record);
    }
    Ok(rows)
}
