use serde::{Deserialize, Serialize};

/// Per-sample quality metrics, as produced by an assembly QC run.
#[derive(Debug, Clone, Deserialize)]
pub struct AssemblyMetrics {
    pub sample: String,
    pub coverage: f64,
    pub quality: f64,
    pub read_length: f64,
    pub contigs: u64,
    #[serde(default)]
    pub assembled_size: Option<u64>,
    pub is_paired: bool,
}

/// One named tier: a conjunction of inclusive bounds over the metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierCutoff {
    pub name: String,
    pub min_coverage: f64,
    pub min_quality: f64,
    pub min_read_length: f64,
    pub max_contigs: u64,
    pub require_paired: bool,
}

impl TierCutoff {
    pub fn matches(&self, metrics: &AssemblyMetrics) -> bool {
        metrics.coverage >= self.min_coverage
            && metrics.quality >= self.min_quality
            && metrics.read_length >= self.min_read_length
            && metrics.contigs <= self.max_contigs
            && (!self.require_paired || metrics.is_paired)
    }

    fn unmet(&self, metrics: &AssemblyMetrics) -> Vec<String> {
        let mut reasons = Vec::new();
        if metrics.coverage < self.min_coverage {
            reasons.push(format!(
                "Low coverage ({:.2}x, expect >= {}x)",
                metrics.coverage, self.min_coverage
            ));
        }
        if metrics.quality < self.min_quality {
            reasons.push(format!(
                "Poor read quality (Q{:.2}, expect >= Q{})",
                metrics.quality, self.min_quality
            ));
        }
        if metrics.read_length < self.min_read_length {
            reasons.push(format!(
                "Short read length ({:.0} bp, expect >= {} bp)",
                metrics.read_length, self.min_read_length
            ));
        }
        if metrics.contigs > self.max_contigs {
            reasons.push(format!(
                "Too many contigs ({}, expect <= {})",
                metrics.contigs, self.max_contigs
            ));
        }
        if self.require_paired && !metrics.is_paired {
            reasons.push("Single-end reads".to_string());
        }
        reasons
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ranking {
    pub rank: String,
    pub reason: String,
}

/// Ordered decision table, best tier first, evaluated top-down with the
/// first matching tier winning. A sample matching no tier is excluded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankCutoffs {
    pub tiers: Vec<TierCutoff>,
    pub min_assembled_size: Option<u64>,
    pub max_assembled_size: Option<u64>,
}

impl Default for RankCutoffs {
    fn default() -> Self {
        Self {
            tiers: vec![
                TierCutoff {
                    name: "gold".to_string(),
                    min_coverage: 100.0,
                    min_quality: 30.0,
                    min_read_length: 95.0,
                    max_contigs: 100,
                    require_paired: true,
                },
                TierCutoff {
                    name: "silver".to_string(),
                    min_coverage: 50.0,
                    min_quality: 20.0,
                    min_read_length: 75.0,
                    max_contigs: 200,
                    require_paired: true,
                },
                TierCutoff {
                    name: "bronze".to_string(),
                    min_coverage: 20.0,
                    min_quality: 12.0,
                    min_read_length: 49.0,
                    max_contigs: 500,
                    require_paired: false,
                },
            ],
            min_assembled_size: None,
            max_assembled_size: None,
        }
    }
}

impl RankCutoffs {
    /// Rank one sample. The reasons of a non-top tier name the next
    /// better tier's unmet cutoffs; an excluded sample reports the lowest
    /// tier's unmet cutoffs.
    pub fn rank(&self, metrics: &AssemblyMetrics) -> Ranking {
        for (position, tier) in self.tiers.iter().enumerate() {
            if tier.matches(metrics) {
                let mut reasons = if position == 0 {
                    vec!["passed all cutoffs".to_string()]
                } else {
                    self.tiers[position - 1].unmet(metrics)
                };
                self.annotate_assembled_size(metrics, &mut reasons);
                return Ranking {
                    rank: tier.name.clone(),
                    reason: reasons.join("; "),
                };
            }
        }

        let mut reasons = self
            .tiers
            .last()
            .map(|tier| tier.unmet(metrics))
            .unwrap_or_default();
        self.annotate_assembled_size(metrics, &mut reasons);
        Ranking {
            rank: "exclude".to_string(),
            reason: reasons.join("; "),
        }
    }

    fn annotate_assembled_size(&self, metrics: &AssemblyMetrics, reasons: &mut Vec<String>) {
        let Some(size) = metrics.assembled_size else {
            return;
        };
        if let Some(min) = self.min_assembled_size {
            if size < min {
                reasons.push(format!(
                    "Assembled size is too small ({size} bp, expect >= {min} bp)"
                ));
            }
        }
        if let Some(max) = self.max_assembled_size {
            if size > max {
                reasons.push(format!(
                    "Assembled size is too large ({size} bp, expect <= {max} bp)"
                ));
            }
        }
    }
}
