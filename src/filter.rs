use std::collections::{BTreeMap, BTreeSet};

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index;
use serde::Serialize;
use tracing::debug;

use crate::domain::Archive;
use crate::normalize::Record;

/// Numeric thresholds applied per record. A threshold of 0 disables the
/// criterion entirely, regardless of the record's value.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct FilterCriteria {
    pub min_base_count: u64,
    pub min_read_length: u64,
    pub min_coverage: u64,
}

impl FilterCriteria {
    pub fn any_active(&self) -> bool {
        self.min_base_count > 0 || self.min_read_length > 0 || self.min_coverage > 0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Exclusion {
    pub accession: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct FilterCounts {
    pub technical: usize,
    pub min_base_count: usize,
    pub min_read_length: usize,
    pub min_coverage: usize,
}

impl FilterCounts {
    pub fn merge(&mut self, other: &FilterCounts) {
        self.technical += other.technical;
        self.min_base_count += other.min_base_count;
        self.min_read_length += other.min_read_length;
        self.min_coverage += other.min_coverage;
    }
}

#[derive(Debug, Default)]
pub struct FilterOutcome {
    pub passed: Vec<Record>,
    pub excluded: Vec<Exclusion>,
    pub counts: FilterCounts,
}

/// Apply the criteria to each record independently. An active criterion
/// passes iff the value is present and >= the threshold; a record missing
/// a field required by an active criterion is excluded.
pub fn apply(records: Vec<Record>, criteria: &FilterCriteria) -> FilterOutcome {
    let mut outcome = FilterOutcome::default();

    for record in records {
        let Some(technology) = record.technology else {
            outcome.counts.technical += 1;
            outcome.excluded.push(Exclusion {
                accession: record.accession.clone(),
                reason: format!(
                    "unsupported platform ({})",
                    record.platform.as_deref().unwrap_or("unknown")
                ),
            });
            continue;
        };
        debug!("evaluating {} ({technology})", record.accession);

        if record.source == Archive::Ena && record.fastq_bytes.is_none() {
            outcome.counts.technical += 1;
            outcome.excluded.push(Exclusion {
                accession: record.accession.clone(),
                reason: "missing FASTQ files".to_string(),
            });
            continue;
        }

        let mut reasons = Vec::new();

        if criteria.min_read_length > 0 {
            match record.read_length {
                Some(length) if length >= criteria.min_read_length as f64 => {}
                Some(length) => {
                    outcome.counts.min_read_length += 1;
                    reasons.push(format!(
                        "failed mean read length ({length:.0} bp) filter, expected >= {} bp",
                        criteria.min_read_length
                    ));
                }
                None => {
                    outcome.counts.min_read_length += 1;
                    reasons.push("missing read length required by active filter".to_string());
                }
            }
        }

        if criteria.min_base_count > 0 {
            match record.base_count {
                Some(bases) if bases >= criteria.min_base_count => {}
                Some(bases) => {
                    outcome.counts.min_base_count += 1;
                    reasons.push(format!(
                        "failed base count ({bases} bp) filter, expected >= {} bp",
                        criteria.min_base_count
                    ));
                }
                None => {
                    outcome.counts.min_base_count += 1;
                    reasons.push("missing base count required by active filter".to_string());
                }
            }
        }

        if criteria.min_coverage > 0 {
            match record.coverage() {
                Some(coverage) if coverage >= criteria.min_coverage as f64 => {}
                Some(coverage) => {
                    outcome.counts.min_coverage += 1;
                    reasons.push(format!(
                        "failed coverage ({coverage:.2}x) filter, expected >= {}x",
                        criteria.min_coverage
                    ));
                }
                None => {
                    outcome.counts.min_coverage += 1;
                    reasons.push(
                        "coverage could not be evaluated (missing genome size or base count)"
                            .to_string(),
                    );
                }
            }
        }

        if reasons.is_empty() {
            outcome.passed.push(record);
        } else {
            outcome.excluded.push(Exclusion {
                accession: record.accession.clone(),
                reason: reasons.join(";"),
            });
        }
    }

    outcome
}

/// Downsample records per BioSample to at most `cap` experiments. The only
/// nondeterminism in the pipeline; the seed makes selections reproducible.
/// Survivors keep their original order. Returns the records and how many
/// were removed.
pub fn subset_biosamples(
    records: Vec<Record>,
    cap: usize,
    seed: Option<u64>,
) -> (Vec<Record>, usize) {
    if cap == 0 {
        return (records, 0);
    }

    let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (position, record) in records.iter().enumerate() {
        if let Some(sample) = &record.sample_accession {
            groups.entry(sample.clone()).or_default().push(position);
        }
    }

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut dropped: BTreeSet<usize> = BTreeSet::new();
    for (sample, positions) in &groups {
        if positions.len() <= cap {
            continue;
        }
        debug!(
            "subsetting {sample}: keeping {cap} of {} experiment(s)",
            positions.len()
        );
        let keep: BTreeSet<usize> = index::sample(&mut rng, positions.len(), cap)
            .into_iter()
            .map(|i| positions[i])
            .collect();
        for position in positions {
            if !keep.contains(position) {
                dropped.insert(*position);
            }
        }
    }

    let removed = dropped.len();
    let kept = records
        .into_iter()
        .enumerate()
        .filter(|(position, _)| !dropped.contains(position))
        .map(|(_, record)| record)
        .collect();
    (kept, removed)
}
