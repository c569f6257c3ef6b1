
//! Monte-Carlo estimation of a shared dropout probability.
//!
//! For each dropout value on a grid from 0.01 to 0.99 the contributors of a hypothesis are
//! simulated repeatedly: known contributors keep their genotypes, unknown contributors draw
//! alleles from the population frequencies, and every allele copy drops out with the grid
//! probability. A simulation is accepted when the number of distinct alleles surviving in all
//! replicates equals the number observed in the evidence. The estimate is the 95th percentile of
//! the accepted dropout values.

use log::{debug, info};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::analysis_parameters::AnalysisParameters;
use crate::error::{MixRankError, Result};
use crate::hypothesis::Hypothesis;
use crate::population_statistics::PopulationStatistics;

pub const DEFAULT_ITERATIONS: usize = 200;
pub const DEFAULT_SEED: u64 = 42;
const GRID_STEPS: usize = 99;
const ESTIMATE_PERCENTILE: f64 = 0.95;
const LOWER_PERCENTILE: f64 = 0.05;

#[derive(Clone, Debug, PartialEq)]
pub struct DropoutEstimate {
    /// Dropout used for every contributor with an estimated dropout.
    pub estimate: f64,
    /// 5th percentile of the accepted dropout values.
    pub lower: f64,
    pub accepted: usize,
    pub simulations: usize,
    pub observed_alleles: usize,
}

/// Contributor alleles and frequency table of one locus.
struct LocusSetup<'a> {
    known_alleles: Vec<&'a str>,
    population_alleles: Vec<&'a str>,
    distribution: Option<WeightedIndex<f64>>,
    replicates: usize,
}

#[derive(Clone, Debug)]
pub struct DropoutEstimator {
    iterations: usize,
    seed: u64,
}

impl Default for DropoutEstimator {
    fn default() -> Self {
        DropoutEstimator::new(DEFAULT_ITERATIONS, DEFAULT_SEED)
    }
}

impl DropoutEstimator {
    pub fn new(iterations: usize, seed: u64) -> Self {
        DropoutEstimator { iterations, seed }
    }

    /// Estimate the dropout of the contributors in `hypothesis`, which may not include the candidate.
    pub fn estimate(
        &self,
        hypothesis: &Hypothesis,
        parameters: &AnalysisParameters,
        statistics: &PopulationStatistics,
    ) -> Result<DropoutEstimate> {
        if hypothesis.has_candidate() {
            return Err(MixRankError::InvalidConfiguration(format!(
                "{}: dropout cannot be estimated for a hypothesis containing the candidate",
                hypothesis.id()
            )));
        }

        let mut setups = Vec::new();
        let mut observed_alleles = 0;
        for locus in parameters.evaluation_loci(None) {
            let population_alleles: Vec<(&str, f64)> = statistics.locus_frequencies(locus);
            let distribution = WeightedIndex::new(population_alleles.iter().map(|(_, f)| *f)).ok();
            if hypothesis.unknown_count() > 0 && distribution.is_none() {
                debug!("Skipping {} for dropout estimation: no allele frequencies.", locus);
                continue;
            }

            let known_alleles = hypothesis
                .contributors()
                .iter()
                .filter_map(|c| c.sample.locus(locus))
                .flat_map(|l| l.alleles().iter().map(|a| a.value()))
                .collect();

            let evidence = parameters.evidence_at(locus);
            observed_alleles += evidence.iter().map(|l| distinct(l.alleles().iter().map(|a| a.value()))).sum::<usize>();

            setups.push(LocusSetup {
                known_alleles,
                population_alleles: population_alleles.into_iter().map(|(a, _)| a).collect(),
                distribution,
                replicates: evidence.len(),
            });
        }

        if setups.is_empty() {
            return Err(MixRankError::DropoutEstimation("no loci available for simulation".to_string()));
        }

        let unknown_count = hypothesis.unknown_count();
        let mut accepted: Vec<f64> = (1..=GRID_STEPS)
            .into_par_iter()
            .flat_map_iter(|step| {
                let dropout = step as f64 / 100.0;
                let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(step as u64));
                let hits = (0..self.iterations)
                    .filter(|_| simulate(&setups, unknown_count, dropout, &mut rng) == observed_alleles)
                    .count();
                std::iter::repeat_n(dropout, hits)
            })
            .collect();

        if accepted.is_empty() {
            return Err(MixRankError::DropoutEstimation(format!(
                "no simulation reproduced the {observed_alleles} observed alleles"
            )));
        }
        accepted.sort_by(|a, b| a.total_cmp(b));

        let estimate = DropoutEstimate {
            estimate: percentile(&accepted, ESTIMATE_PERCENTILE),
            lower: percentile(&accepted, LOWER_PERCENTILE),
            accepted: accepted.len(),
            simulations: GRID_STEPS * self.iterations,
            observed_alleles,
        };

        info!(
            "Estimated dropout for {}: {:.2} (5th percentile {:.2}; {} of {} simulations accepted).",
            hypothesis.id(),
            estimate.estimate,
            estimate.lower,
            estimate.accepted,
            estimate.simulations
        );

        Ok(estimate)
    }
}

/// Total number of distinct alleles surviving dropout across all loci and replicates.
fn simulate(setups: &[LocusSetup<'_>], unknown_count: usize, dropout: f64, rng: &mut StdRng) -> usize {
    let mut total = 0;
    let mut contributed: Vec<&str> = Vec::new();
    let mut survivors: Vec<&str> = Vec::new();

    for setup in setups {
        contributed.clear();
        contributed.extend_from_slice(&setup.known_alleles);
        if let Some(distribution) = &setup.distribution {
            for _ in 0..2 * unknown_count {
                contributed.push(setup.population_alleles[distribution.sample(rng)]);
            }
        }

        for _ in 0..setup.replicates {
            survivors.clear();
            survivors.extend(contributed.iter().filter(|_| !rng.gen_bool(dropout)));
            total += distinct(survivors.iter().copied());
        }
    }

    total
}

fn distinct<'a>(alleles: impl Iterator<Item = &'a str>) -> usize {
    let mut alleles: Vec<&str> = alleles.collect();
    alleles.sort_unstable();
    alleles.dedup();
    alleles.len()
}

/// Value at quantile `q` of sorted values, nearest-rank method.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let rank = (q * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}
