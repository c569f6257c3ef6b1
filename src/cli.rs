
//! Command-line interface definition for the mixrank application.
//!
//! This file defines the `Cli` struct using the `clap` crate to parse and validate command-line arguments.
//! It includes options for the evidence, known, candidate and population statistics files, the
//! output directory, the parameters of the prosecution and defense hypotheses, dropout estimation,
//! and reporting. Custom value parsers check probabilities, theta and thread counts.
//! The CLI output is styled using the `anstyle` crate for improved readability.

use std::path::PathBuf;

use clap::Parser;

use mixrank::analysis_parameters::{DEFAULT_LR_THRESHOLD, DEFAULT_REPORT_TOP};
use mixrank::dropout_estimation::{DEFAULT_ITERATIONS, DEFAULT_SEED};
use mixrank::population_statistics::DEFAULT_RARE_ALLELE_FREQUENCY;

const DEFAULT_DROPIN: f64 = 0.05;
const DEFAULT_DROPOUT: f64 = 0.1;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(styles=get_styles())]
#[command(disable_help_subcommand = true)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// TSV file of evidence replicates (replicate, locus, comma-separated alleles)
    #[arg(short = 'e', long, help_heading = "Inputs", value_parser = clap::value_parser!(PathBuf))]
    pub crime_scene: PathBuf,

    /// TSV file of known contributor genotypes present under both hypotheses
    #[arg(short = 'k', long, help_heading = "Inputs", value_parser = clap::value_parser!(PathBuf))]
    pub known: Option<PathBuf>,

    /// TSV file of candidate genotypes to rank
    #[arg(short = 'd', long, help_heading = "Inputs", value_parser = clap::value_parser!(PathBuf))]
    pub database: PathBuf,

    /// TSV file of allele frequencies (locus, allele, frequency)
    #[arg(short = 'p', long, help_heading = "Inputs", value_parser = clap::value_parser!(PathBuf))]
    pub population_statistics: PathBuf,

    /// Output directory
    #[arg(short = 'o', long, help_heading = "Output", value_parser = clap::value_parser!(PathBuf))]
    pub out_dir: PathBuf,

    /// Number of ranked candidates to report
    #[arg(long, help_heading = "Output", default_value_t = DEFAULT_REPORT_TOP)]
    pub top_n: usize,

    /// Minimum likelihood ratio for a candidate to be ranked
    #[arg(long, help_heading = "Output", default_value_t = DEFAULT_LR_THRESHOLD)]
    pub lr_threshold: f64,

    /// Population substructure correction (theta) in [0, 1)
    #[arg(long, help_heading = "Model parameters", default_value_t = 0.0, value_parser = validate_theta)]
    pub theta: f64,

    /// Drop-in probability
    #[arg(long, help_heading = "Model parameters", default_value_t = DEFAULT_DROPIN, value_parser = validate_probability)]
    pub dropin: f64,

    /// Frequency assigned to alleles missing from the population statistics
    #[arg(long, help_heading = "Model parameters", default_value_t = DEFAULT_RARE_ALLELE_FREQUENCY, value_parser = validate_probability)]
    pub rare_allele_frequency: f64,

    /// Dropout probability of the candidate under the prosecution hypothesis
    #[arg(long, help_heading = "Model parameters", default_value_t = DEFAULT_DROPOUT, value_parser = validate_probability)]
    pub candidate_dropout: f64,

    /// Dropout probability of the known contributors
    #[arg(long, help_heading = "Model parameters", default_value_t = DEFAULT_DROPOUT, value_parser = validate_probability)]
    pub known_dropout: f64,

    /// Number of unknown contributors under the prosecution hypothesis
    #[arg(short = 'u', long, help_heading = "Model parameters", default_value_t = 0)]
    pub unknowns: usize,

    /// Number of unknown contributors under the defense hypothesis [default: unknowns + 1]
    #[arg(long, help_heading = "Model parameters")]
    pub defense_unknowns: Option<usize>,

    /// Dropout probability of the unknown contributors
    #[arg(long, help_heading = "Model parameters", default_value_t = DEFAULT_DROPOUT, value_parser = validate_probability)]
    pub unknown_dropout: f64,

    /// Estimate a shared dropout probability instead of using fixed values
    #[arg(long, help_heading = "Dropout estimation", default_value_t = false)]
    pub estimate_dropout: bool,

    /// Simulations per dropout value when estimating dropout
    #[arg(long, help_heading = "Dropout estimation", default_value_t = DEFAULT_ITERATIONS)]
    pub estimation_iterations: usize,

    /// Seed of the dropout simulations
    #[arg(long, help_heading = "Dropout estimation", default_value_t = DEFAULT_SEED)]
    pub seed: u64,

    /// Candidates sharing fewer evaluated loci with the evidence are skipped
    #[arg(long, help_heading = "Search parameters", default_value_t = 1)]
    pub min_loci: usize,

    /// Comma-separated list of loci to evaluate [default: all]
    #[arg(long, help_heading = "Search parameters", value_delimiter = ',')]
    pub loci: Option<Vec<String>>,

    /// Number of threads to use
    #[arg(short, long, default_value_t = 1, value_parser = validate_threads)]
    pub threads: usize,

    /// Skip verification that input files exist before loading
    #[arg(long, default_value_t = false)]
    pub skip_file_check: bool,

    /// Write debug messages to the log
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Cli {
    /// Number of unknown contributors under the defense hypothesis.
    pub fn defense_unknowns(&self) -> usize {
        self.defense_unknowns.unwrap_or(self.unknowns + 1)
    }
}

/// Parse a value and check it against `accept`, naming the expected range in the error.
fn parse_bounded<T: std::str::FromStr>(value: &str, what: &str, range: &str, accept: impl Fn(&T) -> bool) -> Result<T, String> {
    match value.parse::<T>() {
        Ok(v) if accept(&v) => Ok(v),
        Ok(_) => Err(format!("{what} must be in the range {range}")),
        Err(_) => Err(format!("`{value}` isn't a valid {what}")),
    }
}

fn validate_probability(p: &str) -> Result<f64, String> {
    parse_bounded(p, "probability", "[0, 1]", |p| (0.0..=1.0).contains(p))
}

fn validate_theta(theta: &str) -> Result<f64, String> {
    parse_bounded(theta, "theta", "[0, 1)", |t| (0.0..1.0).contains(t))
}

fn validate_threads(threads: &str) -> Result<usize, String> {
    parse_bounded(threads, "thread count", "[1, 1024]", |t| (1..=1024).contains(t))
}

const fn ansi(color: anstyle::AnsiColor) -> Option<anstyle::Color> {
    Some(anstyle::Color::Ansi(color))
}

const HEADING: anstyle::Style = anstyle::Style::new().bold().fg_color(ansi(anstyle::AnsiColor::White));
const PLAIN: anstyle::Style = anstyle::Style::new().fg_color(ansi(anstyle::AnsiColor::White));
const OPTION: anstyle::Style = anstyle::Style::new().fg_color(ansi(anstyle::AnsiColor::Cyan));
const PROBLEM: anstyle::Style = anstyle::Style::new().bold().fg_color(ansi(anstyle::AnsiColor::Red));
const ACCEPTED: anstyle::Style = anstyle::Style::new().bold().fg_color(ansi(anstyle::AnsiColor::Green));

fn get_styles() -> clap::builder::Styles {
    clap::builder::Styles::styled()
        .header(HEADING)
        .usage(HEADING)
        .literal(OPTION)
        .placeholder(PLAIN)
        .error(PROBLEM)
        .invalid(PROBLEM)
        .valid(ACCEPTED)
}

#[test]
fn test_verify_cli() {
    use clap::CommandFactory;
    Cli::command().debug_assert()
}

#[test]
fn test_defense_unknowns_default() {
    let args = Cli::parse_from([
        "mixrank", "-e", "evidence.tsv", "-d", "db.tsv", "-p", "freqs.tsv", "-o", "out", "-u", "1",
    ]);
    assert_eq!(args.defense_unknowns(), 2);
    assert_eq!(args.dropin, DEFAULT_DROPIN);

    let args = Cli::parse_from([
        "mixrank", "-e", "evidence.tsv", "-d", "db.tsv", "-p", "freqs.tsv", "-o", "out",
        "--defense-unknowns", "3", "--loci", "TH01,FGA",
    ]);
    assert_eq!(args.defense_unknowns(), 3);
    assert_eq!(args.loci, Some(vec!["TH01".to_string(), "FGA".to_string()]));
}

#[test]
fn test_invalid_probability_rejected() {
    let result = Cli::try_parse_from([
        "mixrank", "-e", "evidence.tsv", "-d", "db.tsv", "-p", "freqs.tsv", "-o", "out", "--dropin", "1.5",
    ]);
    assert!(result.is_err());
}

#[test]
fn test_bounded_validators() {
    assert_eq!(validate_theta("0.01"), Ok(0.01));
    assert!(validate_theta("1").is_err());
    assert_eq!(validate_threads("8"), Ok(8));
    assert_eq!(validate_threads("0"), Err("thread count must be in the range [1, 1024]".to_string()));
    assert_eq!(validate_probability("x"), Err("`x` isn't a valid probability".to_string()));
}
