use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Raw per-record field mapping as returned by an archive, before
/// normalization. Empty values are never inserted.
pub type RawRecord = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Archive {
    Ena,
    Sra,
}

impl Archive {
    pub fn as_str(&self) -> &'static str {
        match self {
            Archive::Ena => "ena",
            Archive::Sra => "sra",
        }
    }
}

impl fmt::Display for Archive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessionKind {
    Study,
    BioSample,
    Experiment,
    Run,
}

impl AccessionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessionKind::Study => "study",
            AccessionKind::BioSample => "biosample",
            AccessionKind::Experiment => "experiment",
            AccessionKind::Run => "run",
        }
    }
}

impl fmt::Display for AccessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Accession {
    kind: AccessionKind,
    value: String,
}

impl Accession {
    /// Classify an identifier against the ENA accession number patterns.
    /// Returns `None` for anything that is not a recognized accession.
    pub fn classify(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        let patterns: [(AccessionKind, &str); 4] = [
            (AccessionKind::Study, r"^PRJ[EDN][A-Z][0-9]+$|^[EDS]RP[0-9]{6,}$"),
            (
                AccessionKind::BioSample,
                r"^SAM[EDN][A-Z]?[0-9]+$|^[EDS]RS[0-9]{6,}$",
            ),
            (AccessionKind::Experiment, r"^[EDS]RX[0-9]{6,}$"),
            (AccessionKind::Run, r"^[EDS]RR[0-9]{6,}$"),
        ];
        for (kind, pattern) in patterns {
            let re = Regex::new(pattern).unwrap();
            if re.is_match(trimmed) {
                return Some(Self {
                    kind,
                    value: trimmed.to_string(),
                });
            }
        }
        None
    }

    pub fn kind(&self) -> AccessionKind {
        self.kind
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Accession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryTerm {
    Taxon(u32),
    ScientificName(String),
    Accession(Accession),
}

impl QueryTerm {
    /// Classification never fails: an all-digit term is a taxon id, a term
    /// matching an accession pattern is an accession, anything else is
    /// assumed to be a scientific name.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Ok(taxon_id) = trimmed.parse::<u32>() {
            return QueryTerm::Taxon(taxon_id);
        }
        match Accession::classify(trimmed) {
            Some(accession) => QueryTerm::Accession(accession),
            None => QueryTerm::ScientificName(trimmed.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Technology {
    Illumina,
    Ont,
}

impl Technology {
    pub fn from_platform(platform: &str) -> Option<Self> {
        match platform {
            "ILLUMINA" => Some(Technology::Illumina),
            "OXFORD_NANOPORE" => Some(Technology::Ont),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Technology::Illumina => "illumina",
            Technology::Ont => "ont",
        }
    }
}

impl fmt::Display for Technology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_study_accessions() {
        let acc = Accession::classify("PRJNA248792").unwrap();
        assert_eq!(acc.kind(), AccessionKind::Study);
        let acc = Accession::classify("ERP001736").unwrap();
        assert_eq!(acc.kind(), AccessionKind::Study);
    }

    #[test]
    fn classify_biosample_accessions() {
        let acc = Accession::classify("SAMN02604064").unwrap();
        assert_eq!(acc.kind(), AccessionKind::BioSample);
        let acc = Accession::classify("SRS000123").unwrap();
        assert_eq!(acc.kind(), AccessionKind::BioSample);
    }

    #[test]
    fn classify_experiment_and_run() {
        assert_eq!(
            Accession::classify("SRX000001").unwrap().kind(),
            AccessionKind::Experiment
        );
        assert_eq!(
            Accession::classify("ERR123456").unwrap().kind(),
            AccessionKind::Run
        );
    }

    #[test]
    fn classify_rejects_non_accessions() {
        assert!(Accession::classify("Staphylococcus aureus").is_none());
        assert!(Accession::classify("GCF_000005845.2").is_none());
    }

    #[test]
    fn parse_query_terms() {
        assert_eq!(QueryTerm::parse("1280"), QueryTerm::Taxon(1280));
        assert_eq!(
            QueryTerm::parse("Staphylococcus aureus"),
            QueryTerm::ScientificName("Staphylococcus aureus".to_string())
        );
        assert!(matches!(
            QueryTerm::parse("SRR000001"),
            QueryTerm::Accession(_)
        ));
    }

    #[test]
    fn technology_from_platform() {
        assert_eq!(
            Technology::from_platform("ILLUMINA"),
            Some(Technology::Illumina)
        );
        assert_eq!(
            Technology::from_platform("OXFORD_NANOPORE"),
            Some(Technology::Ont)
        );
        assert_eq!(Technology::from_platform("PACBIO_SMRT"), None);
    }
}
