use std::collections::BTreeMap;
use std::collections::BTreeSet;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::domain::{Archive, RawRecord};
use crate::ena::EnaClient;
use crate::error::ScoutError;
use crate::filter::{self, Exclusion, FilterCounts, FilterCriteria};
use crate::normalize::{Normalizer, Record};
use crate::query::{ArchiveQuery, QueryPlan};
use crate::rank::{AssemblyMetrics, RankCutoffs};
use crate::sra::SraClient;
use crate::taxonomy::{GenomeSizeClient, GenomeSizeTable};
use crate::writer::{self, SearchWriter};

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub limit: u64,
    pub accession_limit: usize,
    pub exact_taxon: bool,
    pub criteria: FilterCriteria,
    pub genome_size: Option<u64>,
    pub biosample_subset: usize,
    pub seed: Option<u64>,
    pub include_empty: bool,
    pub force: bool,
    pub outdir: Utf8PathBuf,
    pub prefix: String,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 1_000_000,
            accession_limit: 5000,
            exact_taxon: false,
            criteria: FilterCriteria::default(),
            genome_size: None,
            biosample_subset: 0,
            seed: None,
            include_empty: false,
            force: false,
            outdir: Utf8PathBuf::from("."),
            prefix: "seqscout".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QuerySummary {
    pub label: String,
    pub kind: String,
    pub source: Option<Archive>,
    pub retrieved: usize,
    pub passed: usize,
    pub warning: Option<String>,
    pub failed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchReport {
    pub queries: Vec<QuerySummary>,
    pub total_batches: usize,
    pub failed_batches: usize,
    pub requested_accessions: usize,
    pub unresolved_accessions: usize,
    pub retrieved_records: usize,
    pub passed: usize,
    pub excluded: usize,
    pub counts: FilterCounts,
    pub criteria: FilterCriteria,
    pub subset_removed: usize,
    pub limit: u64,
    pub generated_at: String,
    pub metadata_file: String,
    pub accessions_file: String,
    pub filtered_file: String,
    pub summary_file: String,
}

impl SearchReport {
    /// Human-readable summary, written to `<prefix>-search.txt` and echoed
    /// to stdout. Partial failure is always visible here: requested vs
    /// retrieved vs passed, and which queries were abandoned.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        let total = self.queries.len();
        for (position, query) in self.queries.iter().enumerate() {
            if total > 1 {
                lines.push(format!("QUERY ({} of {total}): {}", position + 1, query.label));
            } else {
                lines.push(format!("QUERY: {}", query.label));
            }
            lines.push(format!("TYPE: {}", query.kind));
            if query.failed {
                lines.push("\tERROR: abandoned after retries, accessions unresolved".to_string());
            } else {
                if let Some(source) = query.source {
                    lines.push(format!("SOURCE: {source}"));
                }
                lines.push(format!("RESULTS: {}", query.retrieved));
                lines.push(format!("PASSED: {}", query.passed));
            }
            if let Some(warning) = &query.warning {
                lines.push(format!("\tWARNING: {warning}"));
            }
            lines.push(String::new());
        }

        lines.push(format!("DATE: {}", self.generated_at));
        lines.push(format!("LIMIT: {}", self.limit));
        if self.requested_accessions > 0 {
            lines.push(format!(
                "REQUESTED ACCESSIONS: {}",
                self.requested_accessions
            ));
        }
        if self.unresolved_accessions > 0 || self.failed_batches > 0 {
            lines.push(format!(
                "UNRESOLVED ACCESSIONS: {} ({} of {} queries failed)",
                self.unresolved_accessions, self.failed_batches, self.total_batches
            ));
        }
        lines.push(format!(
            "RESULTS: {} ({})",
            self.retrieved_records, self.metadata_file
        ));
        lines.push(format!("PASSED ACCESSIONS: {} ({})", self.passed, self.accessions_file));

        if self.criteria.any_active() {
            lines.push(format!(
                "FILTERED ACCESSIONS: {} ({})",
                self.excluded, self.filtered_file
            ));
            if self.criteria.min_read_length > 0 {
                lines.push(format!(
                    "\tFAILED MIN READ LENGTH ({} bp): {}",
                    self.criteria.min_read_length, self.counts.min_read_length
                ));
            }
            if self.criteria.min_base_count > 0 {
                lines.push(format!(
                    "\tFAILED MIN BASE COUNT ({} bp): {}",
                    self.criteria.min_base_count, self.counts.min_base_count
                ));
            }
            if self.criteria.min_coverage > 0 {
                lines.push(format!(
                    "\tFAILED MIN COVERAGE ({}x): {}",
                    self.criteria.min_coverage, self.counts.min_coverage
                ));
            }
        } else {
            lines.push("FILTERED ACCESSIONS: no filters applied".to_string());
        }
        lines.push(format!("\tMISSING FASTQS OR UNSUPPORTED PLATFORM: {}", self.counts.technical));
        if self.subset_removed > 0 {
            lines.push(format!(
                "\tBIOSAMPLE SUBSET: removed {} experiment(s)",
                self.subset_removed
            ));
        }
        lines
    }
}

/// The whole pipeline behind `seqscout search`, generic over the archive
/// clients so tests can inject mocks.
#[derive(Clone)]
pub struct App<E: EnaClient, S: SraClient, G: GenomeSizeClient> {
    ena: E,
    sra: S,
    genome_sizes: G,
}

impl<E: EnaClient, S: SraClient, G: GenomeSizeClient> App<E, S, G> {
    pub fn new(ena: E, sra: S, genome_sizes: G) -> Self {
        Self {
            ena,
            sra,
            genome_sizes,
        }
    }

    pub fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<SearchReport, ScoutError> {
        let plan = QueryPlan::build(query, options.accession_limit, options.exact_taxon)?;
        if options.biosample_subset > 0 && !plan.all_biosamples() {
            return Err(ScoutError::InvalidFilter(
                "--biosample-subset requires a BioSample accession query".to_string(),
            ));
        }

        let search_writer = SearchWriter::new(
            &options.outdir,
            &options.prefix,
            options.force,
            options.include_empty,
        );
        search_writer.ensure_writable()?;

        let sizes = self.load_genome_sizes(options);
        let normalizer = Normalizer::new(&sizes, options.genome_size);

        let mut passed: Vec<Record> = Vec::new();
        let mut seen: BTreeSet<String> = BTreeSet::new();
        let mut excluded: Vec<Exclusion> = Vec::new();
        let mut counts = FilterCounts::default();
        let mut queries: Vec<QuerySummary> = Vec::new();
        let mut failed_batches = 0usize;
        let mut unresolved_accessions = 0usize;
        let mut retrieved_records = 0usize;

        for batch in &plan.batches {
            info!("submitting query (type - {})", batch.kind.as_str());
            match self.fetch_batch(batch, options.limit) {
                Ok((raw, source)) => {
                    retrieved_records += raw.len();
                    let mut summary = QuerySummary {
                        label: batch.label.clone(),
                        kind: batch.kind.as_str().to_string(),
                        source: (!raw.is_empty()).then_some(source),
                        retrieved: raw.len(),
                        passed: 0,
                        warning: None,
                        failed: false,
                    };
                    if raw.is_empty() {
                        warn!("{} did not return any records", batch.label);
                        summary.warning = Some("no records returned".to_string());
                    }

                    let records: Vec<Record> = raw
                        .iter()
                        .map(|record| normalizer.normalize(record, source))
                        .collect();
                    let outcome = filter::apply(records, &options.criteria);
                    for record in outcome.passed {
                        if seen.insert(record.accession.clone()) {
                            summary.passed += 1;
                            passed.push(record);
                        }
                    }
                    excluded.extend(outcome.excluded);
                    counts.merge(&outcome.counts);
                    queries.push(summary);
                }
                Err(err) => {
                    error!("unable to retrieve metadata for {}: {err}", batch.label);
                    failed_batches += 1;
                    unresolved_accessions += batch.accessions.len();
                    queries.push(QuerySummary {
                        label: batch.label.clone(),
                        kind: batch.kind.as_str().to_string(),
                        source: None,
                        retrieved: 0,
                        passed: 0,
                        warning: Some(err.to_string()),
                        failed: true,
                    });
                }
            }
        }

        let (passed, subset_removed) =
            filter::subset_biosamples(passed, options.biosample_subset, options.seed);

        search_writer.write_metadata(&passed)?;
        search_writer.write_accessions(&passed)?;
        search_writer.write_filtered(&excluded)?;

        let report = SearchReport {
            total_batches: plan.batches.len(),
            failed_batches,
            requested_accessions: plan.requested_accessions(),
            unresolved_accessions,
            retrieved_records,
            passed: passed.len(),
            excluded: excluded.len(),
            counts,
            criteria: options.criteria,
            subset_removed,
            limit: options.limit,
            generated_at: chrono::Local::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
            metadata_file: search_writer.metadata.to_string(),
            accessions_file: search_writer.accessions.to_string(),
            filtered_file: search_writer.filtered.to_string(),
            summary_file: search_writer.summary.to_string(),
            queries,
        };
        search_writer.write_summary(&report.summary_lines())?;
        Ok(report)
    }

    fn load_genome_sizes(&self, options: &SearchOptions) -> GenomeSizeTable {
        if options.genome_size.is_some() {
            return GenomeSizeTable::empty();
        }
        match self.genome_sizes.genome_sizes() {
            Ok(table) => table,
            Err(err) => {
                error!("genome size lookup unavailable: {err}");
                GenomeSizeTable::empty()
            }
        }
    }

    /// ENA first; SRA captures records not yet synced between the two, and
    /// also serves as the fallback when ENA is down.
    fn fetch_batch(
        &self,
        batch: &ArchiveQuery,
        limit: u64,
    ) -> Result<(Vec<RawRecord>, Archive), ScoutError> {
        match self.ena.search(batch, limit) {
            Ok(records) if !records.is_empty() => Ok((records, Archive::Ena)),
            Ok(_) => {
                debug!("ENA returned nothing for {}, trying SRA", batch.label);
                self.sra
                    .search(batch, limit)
                    .map(|records| (records, Archive::Sra))
            }
            Err(err) => {
                warn!("ENA query failed for {} ({err}), trying SRA", batch.label);
                self.sra
                    .search(batch, limit)
                    .map(|records| (records, Archive::Sra))
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RankReport {
    pub total: usize,
    pub tiers: BTreeMap<String, usize>,
    pub output_file: String,
}

/// The pipeline behind `seqscout rank`: read a metrics table, apply the
/// tier table, write `<prefix>-rank.txt`.
pub fn rank_metrics(
    input: &Utf8Path,
    cutoffs: &RankCutoffs,
    outdir: &Utf8Path,
    prefix: &str,
    force: bool,
) -> Result<RankReport, ScoutError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_path(input.as_std_path())
        .map_err(|err| ScoutError::MetricsParse(err.to_string()))?;

    let mut content = String::from("sample\trank\treason\n");
    let mut tiers: BTreeMap<String, usize> = BTreeMap::new();
    let mut total = 0usize;
    for row in reader.deserialize() {
        let metrics: AssemblyMetrics = row.map_err(|err| ScoutError::MetricsParse(err.to_string()))?;
        let ranking = cutoffs.rank(&metrics);
        debug!("{}: {}", metrics.sample, ranking.rank);
        content.push_str(&format!(
            "{}\t{}\t{}\n",
            metrics.sample, ranking.rank, ranking.reason
        ));
        *tiers.entry(ranking.rank).or_default() += 1;
        total += 1;
    }

    let output = outdir.join(format!("{prefix}-rank.txt"));
    info!("writing ranks to {output}");
    writer::write_atomic(&output, content.as_bytes(), force)?;
    Ok(RankReport {
        total,
        tiers,
        output_file: output.to_string(),
    })
}
