use seqscout::domain::{Archive, Technology};
use seqscout::filter::{FilterCriteria, apply, subset_biosamples};
use seqscout::normalize::Record;

fn record(accession: &str) -> Record {
    Record {
        accession: accession.to_string(),
        base_count: Some(60_000_000),
        read_count: Some(400_000),
        read_length: Some(150.0),
        quality: Some(35.0),
        genome_size: Some(5_000_000),
        tax_id: Some(1280),
        scientific_name: Some("Staphylococcus aureus".to_string()),
        platform: Some("ILLUMINA".to_string()),
        technology: Some(Technology::Illumina),
        study_accession: Some("PRJNA248792".to_string()),
        sample_accession: Some("SAMN02604064".to_string()),
        experiment_accession: Some(accession.to_string()),
        run_accession: Some("SRR000001".to_string()),
        fastq_bytes: Some("123456;123456".to_string()),
        source: Archive::Ena,
    }
}

#[test]
fn disabled_criterion_never_excludes() {
    let mut low = record("SRX000001");
    low.base_count = Some(0);
    low.read_length = None;
    low.genome_size = None;

    let outcome = apply(vec![low], &FilterCriteria::default());
    assert_eq!(outcome.passed.len(), 1);
    assert!(outcome.excluded.is_empty());
}

#[test]
fn missing_field_fails_closed_when_criterion_active() {
    let mut missing = record("SRX000001");
    missing.base_count = None;

    let criteria = FilterCriteria {
        min_base_count: 1,
        ..FilterCriteria::default()
    };
    let outcome = apply(vec![missing], &criteria);
    assert!(outcome.passed.is_empty());
    assert_eq!(outcome.counts.min_base_count, 1);
    assert!(outcome.excluded[0].reason.contains("missing base count"));
}

#[test]
fn thresholds_are_inclusive_lower_bounds() {
    let mut exact = record("SRX000001");
    exact.base_count = Some(1_000_000);

    let criteria = FilterCriteria {
        min_base_count: 1_000_000,
        ..FilterCriteria::default()
    };
    let outcome = apply(vec![exact], &criteria);
    assert_eq!(outcome.passed.len(), 1);
}

#[test]
fn coverage_filter_uses_genome_size() {
    // 40 Mbp over a 5 Mbp genome is 8x, 60 Mbp is 12x
    let mut shallow = record("SRX000001");
    shallow.base_count = Some(40_000_000);
    let mut deep = record("SRX000002");
    deep.base_count = Some(60_000_000);

    let criteria = FilterCriteria {
        min_coverage: 10,
        ..FilterCriteria::default()
    };
    let outcome = apply(vec![shallow, deep], &criteria);
    assert_eq!(outcome.passed.len(), 1);
    assert_eq!(outcome.passed[0].accession, "SRX000002");
    assert_eq!(outcome.counts.min_coverage, 1);
    assert!(outcome.excluded[0].reason.contains("8.00x"));
}

#[test]
fn unresolved_genome_size_fails_closed_for_coverage() {
    let mut unresolved = record("SRX000001");
    unresolved.genome_size = None;

    let criteria = FilterCriteria {
        min_coverage: 10,
        ..FilterCriteria::default()
    };
    let outcome = apply(vec![unresolved], &criteria);
    assert!(outcome.passed.is_empty());
    assert!(outcome.excluded[0].reason.contains("could not be evaluated"));
}

#[test]
fn unsupported_platform_is_technical() {
    let mut pacbio = record("SRX000001");
    pacbio.platform = Some("PACBIO_SMRT".to_string());
    pacbio.technology = None;

    let outcome = apply(vec![pacbio], &FilterCriteria::default());
    assert!(outcome.passed.is_empty());
    assert_eq!(outcome.counts.technical, 1);
    assert!(outcome.excluded[0].reason.contains("unsupported platform"));
}

#[test]
fn ena_record_without_fastqs_is_technical() {
    let mut no_fastqs = record("SRX000001");
    no_fastqs.fastq_bytes = None;

    let outcome = apply(vec![no_fastqs], &FilterCriteria::default());
    assert!(outcome.passed.is_empty());
    assert_eq!(outcome.counts.technical, 1);
}

#[test]
fn sra_records_have_no_fastq_listing_to_check() {
    let mut from_sra = record("SRX000001");
    from_sra.fastq_bytes = None;
    from_sra.source = Archive::Sra;

    let outcome = apply(vec![from_sra], &FilterCriteria::default());
    assert_eq!(outcome.passed.len(), 1);
}

#[test]
fn filtering_is_idempotent() {
    let records = vec![record("SRX000001"), record("SRX000002")];
    let criteria = FilterCriteria {
        min_base_count: 50_000_000,
        min_read_length: 100,
        min_coverage: 10,
    };

    let first = apply(records, &criteria);
    let first_accessions: Vec<String> = first
        .passed
        .iter()
        .map(|record| record.accession.clone())
        .collect();

    let second = apply(first.passed, &criteria);
    let second_accessions: Vec<String> = second
        .passed
        .iter()
        .map(|record| record.accession.clone())
        .collect();

    assert_eq!(first_accessions, second_accessions);
    assert!(second.excluded.is_empty());
}

#[test]
fn biosample_subset_is_seeded_and_order_preserving() {
    let records: Vec<_> = (1..=5)
        .map(|i| record(&format!("SRX00000{i}")))
        .collect();

    let (first, removed) = subset_biosamples(records.clone(), 2, Some(42));
    assert_eq!(first.len(), 2);
    assert_eq!(removed, 3);

    let (second, _) = subset_biosamples(records.clone(), 2, Some(42));
    let first_ids: Vec<&str> = first.iter().map(|r| r.accession.as_str()).collect();
    let second_ids: Vec<&str> = second.iter().map(|r| r.accession.as_str()).collect();
    assert_eq!(first_ids, second_ids);

    // survivors keep their original relative order
    let positions: Vec<usize> = first_ids
        .iter()
        .map(|id| records.iter().position(|r| r.accession == *id).unwrap())
        .collect();
    assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn biosample_subset_spares_small_groups_and_other_samples() {
    let mut records = vec![record("SRX000001"), record("SRX000002")];
    let mut other = record("SRX000003");
    other.sample_accession = Some("SAMN09999999".to_string());
    records.push(other);

    let (kept, removed) = subset_biosamples(records, 2, Some(7));
    assert_eq!(kept.len(), 3);
    assert_eq!(removed, 0);
}

#[test]
fn subset_cap_zero_is_disabled() {
    let records: Vec<_> = (1..=4)
        .map(|i| record(&format!("SRX00000{i}")))
        .collect();
    let (kept, removed) = subset_biosamples(records, 0, Some(1));
    assert_eq!(kept.len(), 4);
    assert_eq!(removed, 0);
}
