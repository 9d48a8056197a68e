use serde::Serialize;
use tracing::warn;

use crate::domain::{Archive, RawRecord, Technology};
use crate::taxonomy::GenomeSizeTable;

/// Fixed column order of the metadata table.
pub const METADATA_COLUMNS: &[&str] = &[
    "accession",
    "base_count",
    "read_count",
    "read_length",
    "quality",
    "genome_size",
    "coverage",
    "tax_id",
    "scientific_name",
    "platform",
    "technology",
    "study_accession",
    "sample_accession",
    "experiment_accession",
    "run_accession",
    "fastq_bytes",
    "source",
];

/// One archive record reconciled into the fixed target schema. Absent or
/// unparsable source fields stay `None`; filters treat them as missing,
/// never as zero.
#[derive(Debug, Clone, Serialize)]
pub struct Record {
    pub accession: String,
    pub base_count: Option<u64>,
    pub read_count: Option<u64>,
    pub read_length: Option<f64>,
    pub quality: Option<f64>,
    pub genome_size: Option<u64>,
    pub tax_id: Option<u32>,
    pub scientific_name: Option<String>,
    pub platform: Option<String>,
    pub technology: Option<Technology>,
    pub study_accession: Option<String>,
    pub sample_accession: Option<String>,
    pub experiment_accession: Option<String>,
    pub run_accession: Option<String>,
    pub fastq_bytes: Option<String>,
    pub source: Archive,
}

impl Record {
    pub fn coverage(&self) -> Option<f64> {
        match (self.base_count, self.genome_size) {
            (Some(bases), Some(size)) if size > 0 => Some(bases as f64 / size as f64),
            _ => None,
        }
    }

    /// Render one schema column for the metadata table; missing values
    /// render as the empty string.
    pub fn column(&self, name: &str) -> String {
        match name {
            "accession" => self.accession.clone(),
            "base_count" => render_u64(self.base_count),
            "read_count" => render_u64(self.read_count),
            "read_length" => render_f64(self.read_length),
            "quality" => render_f64(self.quality),
            "genome_size" => render_u64(self.genome_size),
            "coverage" => render_f64(self.coverage()),
            "tax_id" => self.tax_id.map(|v| v.to_string()).unwrap_or_default(),
            "scientific_name" => self.scientific_name.clone().unwrap_or_default(),
            "platform" => self.platform.clone().unwrap_or_default(),
            "technology" => self
                .technology
                .map(|t| t.as_str().to_string())
                .unwrap_or_default(),
            "study_accession" => self.study_accession.clone().unwrap_or_default(),
            "sample_accession" => self.sample_accession.clone().unwrap_or_default(),
            "experiment_accession" => self.experiment_accession.clone().unwrap_or_default(),
            "run_accession" => self.run_accession.clone().unwrap_or_default(),
            "fastq_bytes" => self.fastq_bytes.clone().unwrap_or_default(),
            "source" => self.source.as_str().to_string(),
            _ => String::new(),
        }
    }
}

fn render_u64(value: Option<u64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn render_f64(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.2}")).unwrap_or_default()
}

/// Reconciles the differing ENA and SRA column sets into the fixed schema.
/// Each target field has a source-priority list; the first present source
/// wins, and numeric parsing is fail-soft.
pub struct Normalizer<'a> {
    genome_sizes: &'a GenomeSizeTable,
    genome_size_override: Option<u64>,
}

impl<'a> Normalizer<'a> {
    pub fn new(genome_sizes: &'a GenomeSizeTable, genome_size_override: Option<u64>) -> Self {
        Self {
            genome_sizes,
            genome_size_override,
        }
    }

    pub fn normalize(&self, raw: &RawRecord, source: Archive) -> Record {
        let mut bad_fields: Vec<&'static str> = Vec::new();

        let run_accession = first_text(raw, &["run_accession", "Run"]);
        let experiment_accession = first_text(raw, &["experiment_accession", "Experiment"]);
        let sample_accession = first_text(
            raw,
            &["sample_accession", "secondary_sample_accession", "BioSample", "Sample"],
        );
        let study_accession = first_text(
            raw,
            &["study_accession", "secondary_study_accession", "BioProject", "SRAStudy"],
        );

        let accession = experiment_accession
            .clone()
            .or_else(|| run_accession.clone())
            .or_else(|| sample_accession.clone())
            .unwrap_or_default();

        let base_count = first_u64(raw, "base_count", &["base_count", "bases"], &mut bad_fields);
        let read_count = first_u64(raw, "read_count", &["read_count", "spots"], &mut bad_fields);
        let quality = first_f64(
            raw,
            "quality",
            &["base_quality_mean", "avgQuality"],
            &mut bad_fields,
        );
        let tax_id = first_u32(raw, "tax_id", &["tax_id", "TaxID"], &mut bad_fields);
        let scientific_name = first_text(raw, &["scientific_name", "ScientificName"]);
        let platform = first_text(
            raw,
            &["instrument_platform", "instrument_model_desc", "Platform"],
        );
        let fastq_bytes = first_text(raw, &["fastq_bytes"]);

        let read_length = derive_read_length(base_count, read_count, fastq_bytes.as_deref())
            .or_else(|| first_f64(raw, "read_length", &["avgLength"], &mut bad_fields));

        let genome_size = self
            .genome_size_override
            .or_else(|| tax_id.and_then(|id| self.genome_sizes.get(id)))
            .or_else(|| first_u64(raw, "genome_size", &["genome_size"], &mut bad_fields));

        let technology = platform.as_deref().and_then(Technology::from_platform);

        if !bad_fields.is_empty() {
            let subject = if accession.is_empty() {
                "<unknown>"
            } else {
                accession.as_str()
            };
            warn!(
                "{subject}: unparsable numeric field(s): {}",
                bad_fields.join(", ")
            );
        }

        Record {
            accession,
            base_count,
            read_count,
            read_length,
            quality,
            genome_size,
            tax_id,
            scientific_name,
            platform,
            technology,
            study_accession,
            sample_accession,
            experiment_accession,
            run_accession,
            fastq_bytes,
            source,
        }
    }
}

/// Mean read length per FASTQ file, the way the archive reports base and
/// read totals: base_count / (read_count * file count).
fn derive_read_length(
    base_count: Option<u64>,
    read_count: Option<u64>,
    fastq_bytes: Option<&str>,
) -> Option<f64> {
    let bases = base_count?;
    let reads = read_count?;
    if reads == 0 {
        return None;
    }
    let files = fastq_bytes
        .map(|value| value.trim_end_matches(';').split(';').count().max(1))
        .unwrap_or(1);
    Some(bases as f64 / (reads as f64 * files as f64))
}

fn first_source<'r>(raw: &'r RawRecord, sources: &[&str]) -> Option<&'r str> {
    sources
        .iter()
        .find_map(|source| raw.get(*source).map(String::as_str))
        .filter(|value| !value.is_empty())
}

fn first_text(raw: &RawRecord, sources: &[&str]) -> Option<String> {
    first_source(raw, sources).map(String::from)
}

fn first_u64(
    raw: &RawRecord,
    field: &'static str,
    sources: &[&str],
    bad_fields: &mut Vec<&'static str>,
) -> Option<u64> {
    let value = first_source(raw, sources)?;
    match value.parse::<f64>() {
        Ok(parsed) if parsed >= 0.0 => Some(parsed as u64),
        _ => {
            bad_fields.push(field);
            None
        }
    }
}

fn first_u32(
    raw: &RawRecord,
    field: &'static str,
    sources: &[&str],
    bad_fields: &mut Vec<&'static str>,
) -> Option<u32> {
    let value = first_source(raw, sources)?;
    match value.parse::<u32>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            bad_fields.push(field);
            None
        }
    }
}

fn first_f64(
    raw: &RawRecord,
    field: &'static str,
    sources: &[&str],
    bad_fields: &mut Vec<&'static str>,
) -> Option<f64> {
    let value = first_source(raw, sources)?;
    match value.parse::<f64>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            bad_fields.push(field);
            None
        }
    }
}
