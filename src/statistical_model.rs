
//! Semi-continuous drop-out/drop-in model for the probability of the evidence under a hypothesis.
//!
//! For every evaluated locus the model enumerates all genotype assignments of the unknown
//! contributors over the alleles seen at the locus plus a catch-all `Q` allele. Each assignment
//! is weighted by its genotype probability and by the probability of every evidence replicate
//! given the alleles carried by the known and unknown contributors:
//!
//! - a carried allele is observed with probability `1 - D`, where `D` is the product of the
//!   dropout probabilities of every carried copy (homozygous carriers contribute `d^2`),
//! - an observed allele not carried by anyone is a drop-in with probability `c * p(a)`,
//! - a replicate without drop-in alleles contributes `1 - c`.
//!
//! A model instance owns its allele-count buffer, so concurrent workers each need their own
//! instance. Interruption is cooperative and checked between loci.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;

use crate::analysis_parameters::AnalysisParameters;
use crate::error::{MixRankError, Result};
use crate::genetics::{Allele, Locus, Q_ALLELE, Sample};
use crate::genotype_probability::{AlleleCounts, GenotypeProbabilityCalculator};
use crate::hypothesis::{Dropout, Hypothesis};
use crate::likelihood_ratio::{LikelihoodRatio, LocusLikelihoods};
use crate::population_statistics::{PopulationStatistics, QDesignatedFrequencies};

/// Cancels running likelihood computations from another thread.
#[derive(Clone, Debug, Default)]
pub struct InterruptHandle {
    flag: Arc<AtomicBool>,
}

impl InterruptHandle {
    pub fn new() -> Self {
        InterruptHandle::default()
    }

    pub fn interrupt(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_interrupted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Contributor with a fixed genotype at the locus being evaluated.
struct KnownGenotype<'a> {
    genotype: &'a Locus,
    dropout: f64,
}

/// Everything needed to evaluate one locus, with alleles replaced by universe indices.
struct LocusModel<'a> {
    universe: Vec<Allele>,
    genotypes: Vec<Locus>,
    genotype_indices: Vec<[usize; 2]>,
    replicates: Vec<Vec<bool>>,
    dropin_probabilities: Vec<f64>,
    known_dropout: Vec<f64>,
    known_carried: Vec<bool>,
    unknown_count: usize,
    unknown_dropout: f64,
    dropin: f64,
    calculator: GenotypeProbabilityCalculator<'a>,
}

pub struct StatisticalModel<'a> {
    statistics: &'a PopulationStatistics,
    allele_counts: AlleleCounts,
    interrupt: InterruptHandle,
}

impl<'a> StatisticalModel<'a> {
    pub fn new(statistics: &'a PopulationStatistics) -> Self {
        StatisticalModel::with_interrupt(statistics, InterruptHandle::new())
    }

    /// Create a model sharing an interrupt handle, typically one per worker thread.
    pub fn with_interrupt(statistics: &'a PopulationStatistics, interrupt: InterruptHandle) -> Self {
        StatisticalModel {
            statistics,
            allele_counts: AlleleCounts::new(),
            interrupt,
        }
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    /// Clear per-run state so the instance can evaluate another candidate.
    pub fn reset(&mut self) {
        self.allele_counts.reset();
    }

    /// Probability of the evidence under `hypothesis` at every evaluated locus.
    ///
    /// `candidate` must be given when the hypothesis includes the candidate as a contributor.
    /// Returns `MixRankError::Interrupted` if the interrupt handle fires between loci.
    pub fn calculate_likelihood(
        &mut self,
        hypothesis: &Hypothesis,
        parameters: &AnalysisParameters,
        candidate: Option<&Sample>,
    ) -> Result<LocusLikelihoods> {
        if hypothesis.has_candidate() && candidate.is_none() {
            return Err(MixRankError::InvalidConfiguration(format!(
                "{} includes the candidate but no candidate was supplied",
                hypothesis.id()
            )));
        }

        let mut likelihoods = LocusLikelihoods::new();
        for locus in parameters.evaluation_loci(candidate) {
            if self.interrupt.is_interrupted() {
                return Err(MixRankError::Interrupted);
            }

            let evidence = parameters.evidence_at(locus);
            let knowns = known_genotypes(hypothesis, locus, candidate)?;
            let probability = self.locus_probability(hypothesis, locus, &evidence, &knowns)?;
            likelihoods.add_locus_probability(locus, probability);
        }

        self.reset();
        Ok(likelihoods)
    }

    /// Likelihood ratio of a candidate against previously computed defense likelihoods.
    ///
    /// The defense hypothesis does not involve the candidate, so its likelihoods can be computed
    /// once per search over all evaluation loci and shared between candidates.
    pub fn evaluate(
        &mut self,
        prosecution: &Hypothesis,
        defense: &LocusLikelihoods,
        parameters: &AnalysisParameters,
        candidate: Arc<Sample>,
    ) -> Result<LikelihoodRatio> {
        let likelihoods = self.calculate_likelihood(prosecution, parameters, Some(candidate.as_ref()))?;
        Ok(LikelihoodRatio::from_likelihoods(candidate, &likelihoods, defense))
    }

    fn locus_probability(
        &mut self,
        hypothesis: &Hypothesis,
        locus: &str,
        evidence: &[&Locus],
        knowns: &[KnownGenotype<'_>],
    ) -> Result<f64> {
        let unknown_dropout = match hypothesis.unknown_count() {
            0 => 0.0,
            _ => fixed_dropout(hypothesis, hypothesis.unknown_dropout())?,
        };

        // allele universe: evidence and known alleles, in order of first appearance
        let mut universe: Vec<Allele> = Vec::new();
        let observed = evidence.iter().flat_map(|l| l.alleles());
        let carried = knowns.iter().flat_map(|k| k.genotype.alleles());
        for allele in observed.chain(carried) {
            if !universe.contains(allele) {
                universe.push(allele.clone());
            }
        }

        let mut q = None;
        if hypothesis.unknown_count() > 0 {
            let listed: f64 = universe
                .iter()
                .map(|a| self.statistics.frequency(locus, a.value()))
                .sum();
            let q_probability = 1.0 - listed;
            if q_probability > 0.0 {
                let q_id = universe.iter().map(|a| a.id()).max().map_or(0, |id| id + 1);
                universe.push(Allele::with_id(Q_ALLELE, q_id));
                q = Some((q_id, q_probability));
            }
        }

        let frequencies = QDesignatedFrequencies::new(
            self.statistics,
            q.map(|(id, _)| id),
            q.map_or(0.0, |(_, p)| p),
        );
        let calculator = GenotypeProbabilityCalculator::for_unrelated(hypothesis, &frequencies);

        let model = LocusModel::new(
            locus,
            universe,
            evidence,
            knowns,
            hypothesis,
            unknown_dropout,
            self.statistics,
            calculator,
        );

        let probability = model.probability(&mut self.allele_counts);
        debug!("{} {}: {}", hypothesis.id(), locus, probability);
        Ok(probability)
    }
}

impl<'a> LocusModel<'a> {
    #[allow(clippy::too_many_arguments)]
    fn new(
        locus: &str,
        universe: Vec<Allele>,
        evidence: &[&Locus],
        knowns: &[KnownGenotype<'_>],
        hypothesis: &Hypothesis,
        unknown_dropout: f64,
        statistics: &PopulationStatistics,
        calculator: GenotypeProbabilityCalculator<'a>,
    ) -> Self {
        let index_of = |allele: &Allele| universe.iter().position(|a| a == allele);

        let replicates: Vec<Vec<bool>> = evidence
            .iter()
            .map(|replicate| universe.iter().map(|a| replicate.has_allele(a)).collect())
            .collect();

        let dropin_probabilities = universe
            .iter()
            .map(|a| hypothesis.dropin() * statistics.frequency(locus, a.value()))
            .collect();

        let mut known_dropout = vec![1.0; universe.len()];
        let mut known_carried = vec![false; universe.len()];
        for known in knowns {
            for allele in known.genotype.alleles() {
                if let Some(i) = index_of(allele) {
                    known_dropout[i] *= known.dropout;
                    known_carried[i] = true;
                }
            }
        }

        let mut genotypes = Vec::new();
        let mut genotype_indices = Vec::new();
        for i in 0..universe.len() {
            for j in i..universe.len() {
                genotypes.push(Locus::new(locus, vec![universe[i].clone(), universe[j].clone()]));
                genotype_indices.push([i, j]);
            }
        }

        LocusModel {
            universe,
            genotypes,
            genotype_indices,
            replicates,
            dropin_probabilities,
            known_dropout,
            known_carried,
            unknown_count: hypothesis.unknown_count(),
            unknown_dropout,
            dropin: hypothesis.dropin(),
            calculator,
        }
    }

    /// Sum over every assignment of genotypes to the unknown contributors.
    fn probability(&self, allele_counts: &mut AlleleCounts) -> f64 {
        if self.unknown_count == 0 {
            return self.evidence_probability(&[]);
        }

        if self.genotypes.is_empty() {
            return 0.0;
        }

        let mut assignment = vec![0usize; self.unknown_count];
        let mut total = 0.0;
        loop {
            allele_counts.reset();
            let prior: f64 = assignment
                .iter()
                .map(|&g| self.calculator.calculate(allele_counts, &self.genotypes[g]))
                .product();

            if prior > 0.0 {
                total += prior * self.evidence_probability(&assignment);
            }

            // advance the assignment like an odometer
            let mut position = 0;
            loop {
                assignment[position] += 1;
                if assignment[position] < self.genotypes.len() {
                    break;
                }
                assignment[position] = 0;
                position += 1;
                if position == self.unknown_count {
                    allele_counts.reset();
                    return total;
                }
            }
        }
    }

    /// Probability of all replicates given the known genotypes and an unknown assignment.
    fn evidence_probability(&self, assignment: &[usize]) -> f64 {
        let mut dropout = self.known_dropout.clone();
        let mut carried = self.known_carried.clone();
        for &g in assignment {
            for &i in &self.genotype_indices[g] {
                dropout[i] *= self.unknown_dropout;
                carried[i] = true;
            }
        }

        let mut probability = 1.0;
        for replicate in &self.replicates {
            let mut has_dropin = false;
            for i in 0..self.universe.len() {
                match (carried[i], replicate[i]) {
                    (true, true) => probability *= 1.0 - dropout[i],
                    (true, false) => probability *= dropout[i],
                    (false, true) => {
                        probability *= self.dropin_probabilities[i];
                        has_dropin = true;
                    }
                    (false, false) => {}
                }
            }

            if !has_dropin {
                probability *= 1.0 - self.dropin;
            }

            if probability == 0.0 {
                break;
            }
        }

        probability
    }
}

fn fixed_dropout(hypothesis: &Hypothesis, dropout: Dropout) -> Result<f64> {
    dropout.probability().ok_or_else(|| {
        MixRankError::InvalidConfiguration(format!(
            "{}: dropout must be estimated before computing likelihoods",
            hypothesis.id()
        ))
    })
}

/// Genotypes of the candidate (when contributing) and known contributors at a locus.
fn known_genotypes<'h>(
    hypothesis: &'h Hypothesis,
    locus: &str,
    candidate: Option<&'h Sample>,
) -> Result<Vec<KnownGenotype<'h>>> {
    let mut knowns = Vec::with_capacity(hypothesis.contributors().len() + 1);

    if let (Some(dropout), Some(candidate)) = (hypothesis.candidate_dropout(), candidate) {
        if let Some(genotype) = candidate.locus(locus) {
            knowns.push(KnownGenotype {
                genotype,
                dropout: fixed_dropout(hypothesis, dropout)?,
            });
        }
    }

    for contributor in hypothesis.contributors() {
        if let Some(genotype) = contributor.sample.locus(locus) {
            knowns.push(KnownGenotype {
                genotype,
                dropout: fixed_dropout(hypothesis, contributor.dropout)?,
            });
        }
    }

    Ok(knowns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis_parameters::SearchSettings;
    use crate::genetics::{AlleleRegistry, SampleSource};
    use approx::assert_relative_eq;

    struct Fixture {
        registry: AlleleRegistry,
        statistics: PopulationStatistics,
    }

    impl Fixture {
        fn new() -> Self {
            let mut statistics = PopulationStatistics::new("test");
            statistics.add_frequency("TH01", "6", 0.1);
            statistics.add_frequency("TH01", "7", 0.2);
            statistics.add_frequency("TH01", "8", 0.3);
            Fixture {
                registry: AlleleRegistry::new(),
                statistics,
            }
        }

        fn sample(&mut self, name: &str, alleles: &[&str]) -> Sample {
            let alleles = alleles.iter().map(|a| self.registry.intern(a)).collect();
            let mut sample = Sample::new(name, SampleSource::default());
            sample.add_locus(Locus::new("TH01", alleles));
            sample
        }

        fn parameters(&mut self, evidence: &[&str]) -> AnalysisParameters {
            let replicate = self.sample("evidence", evidence);
            AnalysisParameters::new(vec![replicate], Vec::new(), SearchSettings::default())
        }
    }

    fn prosecution(dropout: f64, dropin: f64) -> Hypothesis {
        let mut hp = Hypothesis::new("Hp", 0.0, dropin);
        hp.set_candidate(Dropout::Fixed(dropout));
        hp
    }

    fn defense(unknowns: usize, dropout: f64, dropin: f64, theta: f64) -> Hypothesis {
        let mut hd = Hypothesis::new("Hd", theta, dropin);
        hd.set_unknowns(unknowns, Dropout::Fixed(dropout));
        hd
    }

    #[test]
    fn test_single_source_without_dropout() {
        let mut fixture = Fixture::new();
        let params = fixture.parameters(&["6", "7"]);
        let candidate = Arc::new(fixture.sample("cand", &["6", "7"]));
        let mut model = StatisticalModel::new(&fixture.statistics);

        let hd = model
            .calculate_likelihood(&defense(1, 0.0, 0.0, 0.0), &params, None)
            .unwrap();
        assert_relative_eq!(hd.locus_probability("TH01").unwrap(), 2.0 * 0.1 * 0.2, max_relative = 1e-12);

        let lr = model
            .evaluate(&prosecution(0.0, 0.0), &hd, &params, candidate)
            .unwrap();
        assert_eq!(lr.number_of_loci(), 1);
        assert_relative_eq!(lr.ratios()[0].prosecution_probability, 1.0);
        assert_relative_eq!(lr.overall_ratio(), 1.0 / (2.0 * 0.1 * 0.2), max_relative = 1e-9);
    }

    #[test]
    fn test_non_matching_candidate_excluded() {
        let mut fixture = Fixture::new();
        let params = fixture.parameters(&["6", "7"]);
        let candidate = Arc::new(fixture.sample("cand", &["6", "8"]));
        let mut model = StatisticalModel::new(&fixture.statistics);

        let hd = model
            .calculate_likelihood(&defense(1, 0.0, 0.0, 0.0), &params, None)
            .unwrap();
        let lr = model
            .evaluate(&prosecution(0.0, 0.0), &hd, &params, candidate)
            .unwrap();

        assert!(lr.has_zero_probability());
        assert_eq!(lr.overall_ratio(), 0.0);
    }

    #[test]
    fn test_dropout_and_dropin() {
        let mut fixture = Fixture::new();
        let params = fixture.parameters(&["6"]);
        let candidate = fixture.sample("cand", &["6", "6"]);
        let mut model = StatisticalModel::new(&fixture.statistics);

        let hp = model
            .calculate_likelihood(&prosecution(0.5, 0.05), &params, Some(&candidate))
            .unwrap();
        assert_relative_eq!(hp.locus_probability("TH01").unwrap(), 0.75 * 0.95, max_relative = 1e-12);

        // universe {6, Q} with p(Q) = 0.9
        let hd = model
            .calculate_likelihood(&defense(1, 0.5, 0.05, 0.0), &params, None)
            .unwrap();
        let expected = 0.1 * 0.1 * 0.75 * 0.95
            + 2.0 * 0.1 * 0.9 * 0.5 * 0.5 * 0.95
            + 0.9 * 0.9 * 0.25 * (0.05 * 0.1);
        assert_relative_eq!(hd.locus_probability("TH01").unwrap(), expected, max_relative = 1e-12);
    }

    #[test]
    fn test_theta_single_unknown() {
        let mut fixture = Fixture::new();
        let params = fixture.parameters(&["6", "7"]);
        let mut model = StatisticalModel::new(&fixture.statistics);

        let hd = model
            .calculate_likelihood(&defense(1, 0.0, 0.0, 0.1), &params, None)
            .unwrap();
        assert_relative_eq!(
            hd.locus_probability("TH01").unwrap(),
            2.0 * (0.9 * 0.1) * (0.9 * 0.2),
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_theta_conditions_between_unknowns() {
        let mut fixture = Fixture::new();
        let params = fixture.parameters(&["6"]);
        let mut model = StatisticalModel::new(&fixture.statistics);

        // only 6/6 + 6/6 explains the evidence without dropout or drop-in
        let hw = model
            .calculate_likelihood(&defense(2, 0.0, 0.0, 0.0), &params, None)
            .unwrap();
        assert_relative_eq!(hw.locus_probability("TH01").unwrap(), 0.01 * 0.01, max_relative = 1e-12);

        let theta = model
            .calculate_likelihood(&defense(2, 0.0, 0.0, 0.1), &params, None)
            .unwrap();
        let first = (0.9 * 0.1) * (0.1 + 0.9 * 0.1);
        let second = (0.2 + 0.9 * 0.1) * (0.3 + 0.9 * 0.1);
        assert_relative_eq!(theta.locus_probability("TH01").unwrap(), first * second, max_relative = 1e-12);

        // state does not leak into the next evaluation
        let again = model
            .calculate_likelihood(&defense(2, 0.0, 0.0, 0.1), &params, None)
            .unwrap();
        assert_eq!(again, theta);
    }

    #[test]
    fn test_known_contributor() {
        let mut fixture = Fixture::new();
        let params = fixture.parameters(&["6", "7", "8"]);
        let victim = Arc::new(fixture.sample("victim", &["6", "8"]));
        let candidate = fixture.sample("cand", &["7", "7"]);
        let mut model = StatisticalModel::new(&fixture.statistics);

        let mut hp = prosecution(0.0, 0.0);
        hp.add_contributor(victim.clone(), Dropout::Fixed(0.0));
        let mut hd = defense(1, 0.0, 0.0, 0.0);
        hd.add_contributor(victim, Dropout::Fixed(0.0));

        let hp = model.calculate_likelihood(&hp, &params, Some(&candidate)).unwrap();
        assert_relative_eq!(hp.locus_probability("TH01").unwrap(), 1.0);

        // unknown must carry 7 and nothing unobserved: 7/7, 6/7, 7/8
        let hd = model.calculate_likelihood(&hd, &params, None).unwrap();
        let expected = 0.2 * 0.2 + 2.0 * 0.1 * 0.2 + 2.0 * 0.2 * 0.3;
        assert_relative_eq!(hd.locus_probability("TH01").unwrap(), expected, max_relative = 1e-12);
    }

    #[test]
    fn test_replicates_multiply_and_missing_locus_skipped() {
        let mut fixture = Fixture::new();
        let first = fixture.sample("rep1", &["6"]);
        let second = fixture.sample("rep2", &["6", "7"]);
        let mut third = Sample::new("rep3", SampleSource::default());
        third.add_locus(Locus::new("FGA", vec![fixture.registry.intern("20")]));
        let params = AnalysisParameters::new(vec![first, second, third], Vec::new(), SearchSettings::default());
        let candidate = fixture.sample("cand", &["6", "7"]);
        let mut model = StatisticalModel::new(&fixture.statistics);

        let hp = model
            .calculate_likelihood(&prosecution(0.5, 0.05), &params, Some(&candidate))
            .unwrap();

        // rep1: 6 seen, 7 dropped; rep2: both seen; no drop-in in either
        let replicate = 0.5 * 0.5 * 0.95;
        assert_eq!(hp.len(), 1);
        assert_relative_eq!(hp.locus_probability("TH01").unwrap(), replicate * replicate, max_relative = 1e-12);
        assert_relative_eq!(hp.locus_probability("TH01").unwrap(), 0.05640625, max_relative = 1e-12);
    }

    #[test]
    fn test_no_q_allele_without_leftover_frequency() {
        let mut fixture = Fixture::new();
        fixture.statistics = PopulationStatistics::new("saturated");
        fixture.statistics.add_frequency("TH01", "6", 0.6);
        fixture.statistics.add_frequency("TH01", "7", 0.6);
        let params = fixture.parameters(&["6", "7"]);
        let mut model = StatisticalModel::new(&fixture.statistics);

        let hd = model
            .calculate_likelihood(&defense(1, 0.5, 0.05, 0.0), &params, None)
            .unwrap();

        // only 6/6, 6/7 and 7/7 are enumerated
        let homozygote = 0.36 * 0.75 * (0.05 * 0.6);
        let heterozygote = 2.0 * 0.36 * 0.5 * 0.5 * 0.95;
        assert_relative_eq!(
            hd.locus_probability("TH01").unwrap(),
            2.0 * homozygote + heterozygote,
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_missing_candidate_and_unresolved_dropout() {
        let mut fixture = Fixture::new();
        let params = fixture.parameters(&["6"]);
        let mut model = StatisticalModel::new(&fixture.statistics);

        let result = model.calculate_likelihood(&prosecution(0.1, 0.05), &params, None);
        assert!(matches!(result, Err(MixRankError::InvalidConfiguration(_))));

        let mut hd = Hypothesis::new("Hd", 0.0, 0.05);
        hd.set_unknowns(1, Dropout::Estimated);
        let result = model.calculate_likelihood(&hd, &params, None);
        assert!(matches!(result, Err(MixRankError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_interrupt_from_other_thread() {
        let mut fixture = Fixture::new();
        let params = fixture.parameters(&["6", "7"]);
        let mut model = StatisticalModel::new(&fixture.statistics);

        let handle = model.interrupt_handle();
        std::thread::spawn(move || handle.interrupt()).join().unwrap();

        let result = model.calculate_likelihood(&defense(1, 0.1, 0.05, 0.0), &params, None);
        assert!(matches!(result, Err(MixRankError::Interrupted)));
    }
}
