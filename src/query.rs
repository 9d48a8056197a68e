use std::fs;
use std::path::Path;

use crate::domain::{AccessionKind, QueryTerm};
use crate::error::ScoutError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Taxon,
    TaxonTree,
    ScientificName,
    Accessions(AccessionKind),
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Taxon => "taxon",
            QueryKind::TaxonTree => "taxon_tree",
            QueryKind::ScientificName => "taxon_name",
            QueryKind::Accessions(AccessionKind::Study) => "study_accession",
            QueryKind::Accessions(AccessionKind::BioSample) => "biosample_accession",
            QueryKind::Accessions(AccessionKind::Experiment) => "experiment_accession",
            QueryKind::Accessions(AccessionKind::Run) => "run_accession",
        }
    }

    pub fn is_accession(&self) -> bool {
        matches!(self, QueryKind::Accessions(_))
    }
}

/// How a batch is expressed against the ENA portal API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnaQuery {
    /// Sent as `includeAccessions=<comma list>`.
    IncludeAccessions(String),
    /// Sent as a search expression in the `query` parameter.
    Expression(String),
}

/// One batch of work against the archives: at most `accession-limit`
/// accessions, or a single taxon/name expression.
#[derive(Debug, Clone)]
pub struct ArchiveQuery {
    pub kind: QueryKind,
    pub label: String,
    pub ena_query: EnaQuery,
    pub sra_term: String,
    pub accessions: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub batches: Vec<ArchiveQuery>,
}

impl QueryPlan {
    /// Resolve user query input (literal, comma list, or file of one
    /// accession per line) into archive query batches.
    pub fn build(
        query: &str,
        accession_limit: usize,
        exact_taxon: bool,
    ) -> Result<Self, ScoutError> {
        if accession_limit == 0 {
            return Err(ScoutError::InvalidQuery(
                "accession limit must be positive".to_string(),
            ));
        }

        let terms = resolve_terms(query)?;
        let mut batches = Vec::new();
        let mut studies = Vec::new();
        let mut biosamples = Vec::new();
        let mut experiments = Vec::new();
        let mut runs = Vec::new();

        for term in &terms {
            match QueryTerm::parse(term) {
                QueryTerm::Taxon(taxon_id) => {
                    if exact_taxon {
                        batches.push(ArchiveQuery {
                            kind: QueryKind::Taxon,
                            label: format!("taxon {taxon_id}"),
                            ena_query: EnaQuery::Expression(format!("tax_eq({taxon_id})")),
                            sra_term: format!("txid{taxon_id}[Organism:noexp]"),
                            accessions: Vec::new(),
                        });
                    } else {
                        batches.push(ArchiveQuery {
                            kind: QueryKind::TaxonTree,
                            label: format!("taxon {taxon_id}"),
                            ena_query: EnaQuery::Expression(format!("tax_tree({taxon_id})")),
                            sra_term: format!("txid{taxon_id}[Organism:exp]"),
                            accessions: Vec::new(),
                        });
                    }
                }
                QueryTerm::ScientificName(name) => {
                    batches.push(ArchiveQuery {
                        kind: QueryKind::ScientificName,
                        label: name.clone(),
                        ena_query: EnaQuery::Expression(format!("tax_name(\"{name}\")")),
                        sra_term: format!("'{name}'"),
                        accessions: Vec::new(),
                    });
                }
                QueryTerm::Accession(accession) => {
                    let bucket = match accession.kind() {
                        AccessionKind::Study => &mut studies,
                        AccessionKind::BioSample => &mut biosamples,
                        AccessionKind::Experiment => &mut experiments,
                        AccessionKind::Run => &mut runs,
                    };
                    bucket.push(accession.as_str().to_string());
                }
            }
        }

        for (kind, accessions) in [
            (AccessionKind::Study, studies),
            (AccessionKind::BioSample, biosamples),
            (AccessionKind::Experiment, experiments),
            (AccessionKind::Run, runs),
        ] {
            for chunk in accessions.chunks(accession_limit) {
                batches.push(ArchiveQuery {
                    kind: QueryKind::Accessions(kind),
                    label: batch_label(kind, chunk),
                    ena_query: EnaQuery::IncludeAccessions(chunk.join(",")),
                    sra_term: chunk.join(" OR "),
                    accessions: chunk.to_vec(),
                });
            }
        }

        if batches.is_empty() {
            return Err(ScoutError::InvalidQuery(format!(
                "query '{query}' resolved to nothing"
            )));
        }

        Ok(Self { batches })
    }

    /// Total accessions named across accession batches. Taxon and name
    /// queries contribute none; their result size is unknown up front.
    pub fn requested_accessions(&self) -> usize {
        self.batches.iter().map(|batch| batch.accessions.len()).sum()
    }

    pub fn all_biosamples(&self) -> bool {
        self.batches
            .iter()
            .all(|batch| batch.kind == QueryKind::Accessions(AccessionKind::BioSample))
    }
}

fn batch_label(kind: AccessionKind, accessions: &[String]) -> String {
    if accessions.len() > 5 {
        format!("{} {} accessions", accessions.len(), kind.as_str())
    } else {
        accessions.join(",")
    }
}

fn resolve_terms(query: &str) -> Result<Vec<String>, ScoutError> {
    let path = Path::new(query);
    if path.exists() {
        let content = fs::read_to_string(path)
            .map_err(|_| ScoutError::QueryFileRead(path.to_path_buf()))?;
        let terms: Vec<String> = content
            .lines()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect();
        if terms.is_empty() {
            return Err(ScoutError::EmptyQueryFile(path.to_path_buf()));
        }
        return Ok(terms);
    }

    let terms: Vec<String> = query
        .split(',')
        .map(|term| term.trim())
        .filter(|term| !term.is_empty())
        .map(String::from)
        .collect();
    if terms.is_empty() {
        return Err(ScoutError::InvalidQuery(
            "query resolved to zero terms".to_string(),
        ));
    }
    Ok(terms)
}
