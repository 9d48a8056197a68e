use seqscout::rank::{AssemblyMetrics, RankCutoffs};

fn metrics(coverage: f64, quality: f64, read_length: f64, contigs: u64) -> AssemblyMetrics {
    AssemblyMetrics {
        sample: "sample01".to_string(),
        coverage,
        quality,
        read_length,
        contigs,
        assembled_size: None,
        is_paired: true,
    }
}

#[test]
fn exact_gold_boundaries_rank_gold() {
    let cutoffs = RankCutoffs::default();
    let ranking = cutoffs.rank(&metrics(100.0, 30.0, 95.0, 100));
    assert_eq!(ranking.rank, "gold");
    assert_eq!(ranking.reason, "passed all cutoffs");
}

#[test]
fn first_matching_tier_wins() {
    let cutoffs = RankCutoffs::default();
    // comfortably above every tier: still gold, never silver
    let ranking = cutoffs.rank(&metrics(500.0, 40.0, 150.0, 10));
    assert_eq!(ranking.rank, "gold");
}

#[test]
fn silver_reasons_name_the_gold_cutoffs() {
    let cutoffs = RankCutoffs::default();
    let ranking = cutoffs.rank(&metrics(60.0, 30.0, 95.0, 100));
    assert_eq!(ranking.rank, "silver");
    assert!(ranking.reason.contains("Low coverage (60.00x, expect >= 100x)"));
}

#[test]
fn single_end_reads_cap_at_bronze() {
    let cutoffs = RankCutoffs::default();
    let mut single_end = metrics(150.0, 35.0, 120.0, 50);
    single_end.is_paired = false;
    let ranking = cutoffs.rank(&single_end);
    assert_eq!(ranking.rank, "bronze");
    assert!(ranking.reason.contains("Single-end reads"));
}

#[test]
fn below_every_tier_is_excluded_with_reasons() {
    let cutoffs = RankCutoffs::default();
    let ranking = cutoffs.rank(&metrics(5.0, 8.0, 30.0, 900));
    assert_eq!(ranking.rank, "exclude");
    assert!(ranking.reason.contains("Low coverage"));
    assert!(ranking.reason.contains("Poor read quality"));
    assert!(ranking.reason.contains("Short read length"));
    assert!(ranking.reason.contains("Too many contigs"));
}

#[test]
fn assembled_size_bounds_annotate_the_reason() {
    let cutoffs = RankCutoffs {
        min_assembled_size: Some(2_000_000),
        max_assembled_size: Some(4_000_000),
        ..RankCutoffs::default()
    };

    let mut small = metrics(100.0, 30.0, 95.0, 100);
    small.assembled_size = Some(1_000_000);
    let ranking = cutoffs.rank(&small);
    assert_eq!(ranking.rank, "gold");
    assert!(ranking.reason.contains("Assembled size is too small"));

    let mut large = metrics(100.0, 30.0, 95.0, 100);
    large.assembled_size = Some(9_000_000);
    let ranking = cutoffs.rank(&large);
    assert!(ranking.reason.contains("Assembled size is too large"));
}

#[test]
fn just_below_a_boundary_drops_a_tier() {
    let cutoffs = RankCutoffs::default();
    let ranking = cutoffs.rank(&metrics(99.99, 30.0, 95.0, 100));
    assert_eq!(ranking.rank, "silver");
}

#[test]
fn rank_command_reads_a_metrics_table_and_writes_ranks() {
    use camino::Utf8PathBuf;
    use seqscout::app::rank_metrics;

    let temp = tempfile::tempdir().unwrap();
    let input = Utf8PathBuf::from_path_buf(temp.path().join("metrics.txt")).unwrap();
    std::fs::write(
        input.as_std_path(),
        "sample\tcoverage\tquality\tread_length\tcontigs\tassembled_size\tis_paired\n\
         s1\t120\t33\t100\t80\t2800000\ttrue\n\
         s2\t60\t25\t80\t150\t\ttrue\n\
         s3\t10\t10\t40\t600\t\tfalse\n",
    )
    .unwrap();

    let outdir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let report = rank_metrics(&input, &RankCutoffs::default(), &outdir, "test", false).unwrap();

    assert_eq!(report.total, 3);
    assert_eq!(report.tiers.get("gold"), Some(&1));
    assert_eq!(report.tiers.get("silver"), Some(&1));
    assert_eq!(report.tiers.get("exclude"), Some(&1));

    let content = std::fs::read_to_string(temp.path().join("test-rank.txt")).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], "sample\trank\treason");
    assert!(lines[1].starts_with("s1\tgold\t"));
    assert!(lines[2].starts_with("s2\tsilver\t"));
    assert!(lines[3].starts_with("s3\texclude\t"));
}
