
//! Main entry point for the mixrank application.
//!
//! This file handles command-line parsing, logging setup and input validation, builds the
//! prosecution and defense hypotheses from the command-line options, and runs the database search.
//! Ranked candidates and summary statistics are written to the specified output directory.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Result, bail};
use clap::Parser;
use log::info;
use num_format::{Locale, ToFormattedString};

use mixrank::analysis_parameters::{AnalysisParameters, SearchSettings};
use mixrank::dropout_estimation::DropoutEstimator;
use mixrank::genetics::AlleleRegistry;
use mixrank::hypothesis::{Dropout, Hypothesis};
use mixrank::io_utils::{read_population_statistics, read_profiles};
use mixrank::logging::setup_logger;
use mixrank::report::write_report;
use mixrank::search::Search;

use crate::cli::Cli;

mod cli;

/// Common initialization required by all commands.
fn init(threads: usize) -> Result<()> {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    info!("{} v{}", env!("CARGO_PKG_NAME"), VERSION);
    info!("{}", env::args().collect::<Vec<String>>().join(" "));

    info!("Using {} threads.", threads);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()?;

    Ok(())
}

/// Dropout for a contributor, or `Estimated` when dropout estimation is requested.
fn dropout(args: &Cli, fixed: f64) -> Dropout {
    if args.estimate_dropout {
        Dropout::Estimated
    } else {
        Dropout::Fixed(fixed)
    }
}

/// Build the prosecution and defense hypotheses from the command-line options.
fn build_hypotheses(args: &Cli, parameters: &AnalysisParameters) -> (Hypothesis, Hypothesis) {
    let mut prosecution = Hypothesis::new("Hp", args.theta, args.dropin);
    let mut defense = Hypothesis::new("Hd", args.theta, args.dropin);

    for known in parameters.enabled_known_profiles() {
        prosecution.add_contributor(known.clone(), dropout(args, args.known_dropout));
        defense.add_contributor(known.clone(), dropout(args, args.known_dropout));
    }

    prosecution.set_candidate(dropout(args, args.candidate_dropout));
    prosecution.set_unknowns(args.unknowns, dropout(args, args.unknown_dropout));
    defense.set_unknowns(args.defense_unknowns(), dropout(args, args.unknown_dropout));

    (prosecution, defense)
}

fn main() -> Result<()> {
    let start = Instant::now();

    let args = Cli::parse();

    std::fs::create_dir_all(&args.out_dir)?;
    setup_logger(&args.out_dir, args.verbose)?;

    init(args.threads)?;

    // check that all input files exist
    if !args.skip_file_check {
        info!("Verifying all input files exist.");
        let mut inputs: Vec<&PathBuf> = vec![&args.crime_scene, &args.database, &args.population_statistics];
        inputs.extend(args.known.iter());
        for path in &inputs {
            if !path.exists() {
                bail!("Input file {} does not exist.", path.display());
            }
        }
    }

    let mut registry = AlleleRegistry::new();

    info!("Reading evidence profiles from {}", args.crime_scene.display());
    let crime_scene = read_profiles(&args.crime_scene, &mut registry, false)?;
    info!(" - {} replicates", crime_scene.len());

    let known = match &args.known {
        Some(path) => {
            info!("Reading known profiles from {}", path.display());
            read_profiles(path, &mut registry, true)?
        }
        None => Vec::new(),
    };

    info!("Reading candidate profiles from {}", args.database.display());
    let candidates: Vec<_> = read_profiles(&args.database, &mut registry, true)?
        .into_iter()
        .map(Arc::new)
        .collect();
    info!(
        " - {} candidates",
        candidates.len().to_formatted_string(&Locale::en)
    );

    info!("Reading population statistics from {}", args.population_statistics.display());
    let statistics = read_population_statistics(&args.population_statistics, args.rare_allele_frequency)?;
    info!(
        " - using '{}' with rare allele frequency {}",
        statistics.name(),
        statistics.rare_allele_frequency()
    );

    let settings = SearchSettings {
        lr_threshold: args.lr_threshold,
        report_top: args.top_n,
        min_loci: args.min_loci,
        enabled_loci: args.loci.clone(),
    };
    let parameters = AnalysisParameters::new(crime_scene, known.into_iter().map(Arc::new).collect(), settings);
    let (prosecution, defense) = build_hypotheses(&args, &parameters);

    let search = Search::new(&parameters, &statistics, &candidates)
        .with_estimator(DropoutEstimator::new(args.estimation_iterations, args.seed));
    let report = search.run(&prosecution, &defense)?;

    info!(
        "Evaluated {} candidates ({} skipped, {} excluded); {} with LR > 1.",
        report.results.number_of_lrs().to_formatted_string(&Locale::en),
        report.skipped.to_formatted_string(&Locale::en),
        report.results.number_of_zero_probability().to_formatted_string(&Locale::en),
        report.results.number_of_lrs_over_1().to_formatted_string(&Locale::en)
    );

    write_report(&args.out_dir, &report)?;
    info!("Results written to {}", args.out_dir.display());

    info!("Elapsed time (sec): {:.2}", start.elapsed().as_secs_f32());
    info!("Done.");

    Ok(())
}
