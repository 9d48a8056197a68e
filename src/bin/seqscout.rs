use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use seqscout::app::{App, SearchOptions, SearchReport, rank_metrics};
use seqscout::ena::EnaHttpClient;
use seqscout::error::ScoutError;
use seqscout::filter::FilterCriteria;
use seqscout::rank::{RankCutoffs, TierCutoff};
use seqscout::sra::SraHttpClient;
use seqscout::taxonomy::NcbiGenomeSizeClient;

#[derive(Parser)]
#[command(name = "seqscout")]
#[command(about = "Search ENA and SRA for public sequencing accessions to process")]
#[command(version, author)]
struct Cli {
    /// Increase the verbosity of output
    #[arg(long, global = true)]
    verbose: bool,

    /// Only critical errors will be printed
    #[arg(long, global = true)]
    silent: bool,

    /// Print the run summary as JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Query ENA and SRA for accessions and filter the results")]
    Search(SearchArgs),
    #[command(about = "Rank sample metrics against gold/silver/bronze cutoffs")]
    Rank(RankArgs),
}

#[derive(Args)]
struct SearchArgs {
    /// Taxon ID or Study, BioSample, Experiment, or Run accession
    /// (comma separated, or a file of one accession per line)
    #[arg(long, short = 'q')]
    query: String,

    /// Exclude Taxon ID descendants
    #[arg(long)]
    exact_taxon: bool,

    /// Directory to write output
    #[arg(long, short = 'o', default_value = "./")]
    outdir: Utf8PathBuf,

    /// Prefix to use for output file names
    #[arg(long, short = 'p', default_value = "seqscout")]
    prefix: String,

    /// Maximum number of results (per query) to return
    #[arg(long, short = 'l', default_value_t = 1_000_000)]
    limit: u64,

    /// Maximum number of accessions to query at once
    #[arg(long, default_value_t = 5000)]
    accession_limit: usize,

    /// If a BioSample has multiple Experiments, maximum number to randomly
    /// select (0 = disabled)
    #[arg(long, default_value_t = 0)]
    biosample_subset: usize,

    /// Seed for the BioSample subset selection
    #[arg(long)]
    seed: Option<u64>,

    /// Filters samples based on minimum base pair count (0 = disabled)
    #[arg(long, default_value_t = 0)]
    min_base_count: u64,

    /// Filters samples based on minimum mean read length (0 = disabled)
    #[arg(long, default_value_t = 0)]
    min_read_length: u64,

    /// Filters samples based on minimum coverage (0 = disabled)
    #[arg(long, default_value_t = 0)]
    min_coverage: u64,

    /// Genome size to use for all samples instead of the per-taxon lookup
    #[arg(long, default_value_t = 0)]
    genome_size: u64,

    /// Include metadata columns that are empty for all rows
    #[arg(long)]
    include_empty: bool,

    /// Overwrite existing reports
    #[arg(long)]
    force: bool,
}

#[derive(Args)]
struct RankArgs {
    /// Tab-delimited metrics table (sample, coverage, quality, read_length,
    /// contigs, assembled_size, is_paired)
    #[arg(long, short = 'i')]
    input: Utf8PathBuf,

    /// Directory to write output
    #[arg(long, short = 'o', default_value = "./")]
    outdir: Utf8PathBuf,

    /// Prefix to use for output file names
    #[arg(long, short = 'p', default_value = "seqscout")]
    prefix: String,

    /// Overwrite existing reports
    #[arg(long)]
    force: bool,

    /// Minimum coverage to be ranked gold
    #[arg(long, default_value_t = 100.0)]
    gold_coverage: f64,

    /// Minimum per-read quality to be ranked gold
    #[arg(long, default_value_t = 30.0)]
    gold_quality: f64,

    /// Minimum mean read length to be ranked gold
    #[arg(long, default_value_t = 95.0)]
    gold_read_length: f64,

    /// Maximum contig count to be ranked gold
    #[arg(long, default_value_t = 100)]
    gold_contigs: u64,

    /// Minimum coverage to be ranked silver
    #[arg(long, default_value_t = 50.0)]
    silver_coverage: f64,

    /// Minimum per-read quality to be ranked silver
    #[arg(long, default_value_t = 20.0)]
    silver_quality: f64,

    /// Minimum mean read length to be ranked silver
    #[arg(long, default_value_t = 75.0)]
    silver_read_length: f64,

    /// Maximum contig count to be ranked silver
    #[arg(long, default_value_t = 200)]
    silver_contigs: u64,

    /// Minimum coverage to pass (bronze)
    #[arg(long, default_value_t = 20.0)]
    min_coverage: f64,

    /// Minimum per-read quality to pass (bronze)
    #[arg(long, default_value_t = 12.0)]
    min_quality: f64,

    /// Minimum mean read length to pass (bronze)
    #[arg(long, default_value_t = 49.0)]
    min_read_length: f64,

    /// Maximum contig count to pass (bronze)
    #[arg(long, default_value_t = 500)]
    max_contigs: u64,

    /// Minimum acceptable assembled size
    #[arg(long)]
    min_assembled_size: Option<u64>,

    /// Maximum acceptable assembled size
    #[arg(long)]
    max_assembled_size: Option<u64>,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(report) => {
            eprintln!("{report:?}");
            if let Some(scout) = report.downcast_ref::<ScoutError>() {
                return ExitCode::from(map_exit_code(scout));
            }
            ExitCode::from(1)
        }
    }
}

fn map_exit_code(error: &ScoutError) -> u8 {
    match error {
        ScoutError::InvalidQuery(_)
        | ScoutError::QueryFileRead(_)
        | ScoutError::EmptyQueryFile(_)
        | ScoutError::InvalidFilter(_)
        | ScoutError::MetricsParse(_) => 2,
        ScoutError::EnaHttp(_)
        | ScoutError::EnaStatus { .. }
        | ScoutError::SraHttp(_)
        | ScoutError::SraStatus { .. }
        | ScoutError::GenomeSizeHttp(_)
        | ScoutError::GenomeSizeStatus { .. }
        | ScoutError::ArchiveUnavailable { .. } => 3,
        ScoutError::OutputExists(_) => 4,
        ScoutError::Filesystem(_) => 1,
    }
}

fn run() -> miette::Result<ExitCode> {
    let cli = Cli::parse();

    let default_level = if cli.silent {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Search(args) => run_search(args, cli.json),
        Commands::Rank(args) => run_rank(args, cli.json),
    }
}

fn run_search(args: SearchArgs, json: bool) -> miette::Result<ExitCode> {
    let options = SearchOptions {
        limit: args.limit,
        accession_limit: args.accession_limit,
        exact_taxon: args.exact_taxon,
        criteria: FilterCriteria {
            min_base_count: args.min_base_count,
            min_read_length: args.min_read_length,
            min_coverage: args.min_coverage,
        },
        genome_size: (args.genome_size > 0).then_some(args.genome_size),
        biosample_subset: args.biosample_subset,
        seed: args.seed,
        include_empty: args.include_empty,
        force: args.force,
        outdir: args.outdir,
        prefix: args.prefix,
    };

    let ena = EnaHttpClient::new().into_diagnostic()?;
    let sra = SraHttpClient::new().into_diagnostic()?;
    let sizes = NcbiGenomeSizeClient::new().into_diagnostic()?;
    let app = App::new(ena, sra, sizes);

    let report = app.search(&args.query, &options).into_diagnostic()?;
    print_search_report(&report, json).into_diagnostic()?;

    if report.failed_batches > 0 {
        return Ok(ExitCode::from(3));
    }
    Ok(ExitCode::SUCCESS)
}

fn print_search_report(report: &SearchReport, json: bool) -> std::io::Result<()> {
    use std::io::Write;
    let mut stdout = std::io::stdout();
    if json {
        let rendered = serde_json::to_string_pretty(report)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err))?;
        writeln!(stdout, "{rendered}")
    } else {
        for line in report.summary_lines() {
            writeln!(stdout, "{line}")?;
        }
        Ok(())
    }
}

fn run_rank(args: RankArgs, json: bool) -> miette::Result<ExitCode> {
    let cutoffs = RankCutoffs {
        tiers: vec![
            TierCutoff {
                name: "gold".to_string(),
                min_coverage: args.gold_coverage,
                min_quality: args.gold_quality,
                min_read_length: args.gold_read_length,
                max_contigs: args.gold_contigs,
                require_paired: true,
            },
            TierCutoff {
                name: "silver".to_string(),
                min_coverage: args.silver_coverage,
                min_quality: args.silver_quality,
                min_read_length: args.silver_read_length,
                max_contigs: args.silver_contigs,
                require_paired: true,
            },
            TierCutoff {
                name: "bronze".to_string(),
                min_coverage: args.min_coverage,
                min_quality: args.min_quality,
                min_read_length: args.min_read_length,
                max_contigs: args.max_contigs,
                require_paired: false,
            },
        ],
        min_assembled_size: args.min_assembled_size,
        max_assembled_size: args.max_assembled_size,
    };

    let report = rank_metrics(&args.input, &cutoffs, &args.outdir, &args.prefix, args.force)
        .into_diagnostic()?;

    use std::io::Write;
    let mut stdout = std::io::stdout();
    if json {
        let rendered = serde_json::to_string_pretty(&report).into_diagnostic()?;
        writeln!(stdout, "{rendered}").into_diagnostic()?;
    } else {
        writeln!(stdout, "RANKED: {} ({})", report.total, report.output_file)
            .into_diagnostic()?;
        for (tier, count) in &report.tiers {
            writeln!(stdout, "\t{}: {count}", tier.to_uppercase()).into_diagnostic()?;
        }
    }
    Ok(ExitCode::SUCCESS)
}
