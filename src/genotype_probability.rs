
//! Genotype probabilities for unknown contributors.
//!
//! Two models are provided: Hardy-Weinberg equilibrium, and the Balding-Nichols subpopulation
//! correction used when unknowns may share ancestry (theta > 0). The subpopulation model
//! conditions each allele draw on the alleles already drawn for earlier unknowns, tracked in a
//! caller-owned `AlleleCounts` buffer.

use crate::genetics::Locus;
use crate::hypothesis::Hypothesis;
use crate::population_statistics::AlleleFrequencies;

/// Number of copies of each allele drawn so far, indexed by allele identity.
///
/// The buffer must be reset before every new genotype assignment; counts left over from a
/// previous evaluation silently bias the subpopulation-corrected probabilities.
#[derive(Clone, Debug, Default)]
pub struct AlleleCounts {
    counts: Vec<u32>,
}

impl AlleleCounts {
    pub fn new() -> Self {
        AlleleCounts::default()
    }

    pub fn get(&self, id: usize) -> u32 {
        self.counts.get(id).copied().unwrap_or(0)
    }

    pub fn increment(&mut self, id: usize) {
        if id >= self.counts.len() {
            self.counts.resize(id + 1, 0);
        }
        self.counts[id] += 1;
    }

    /// Zero all counts, keeping the allocation.
    pub fn reset(&mut self) {
        self.counts.fill(0);
    }

    pub fn total(&self) -> u32 {
        self.counts.iter().sum()
    }
}

/// Probability of an unrelated individual's genotype at a locus.
#[derive(Clone, Copy)]
pub enum GenotypeProbabilityCalculator<'a> {
    HardyWeinberg {
        frequencies: &'a dyn AlleleFrequencies,
    },
    Theta {
        frequencies: &'a dyn AlleleFrequencies,
        theta: f64,
        one_minus_theta: f64,
    },
}

impl<'a> GenotypeProbabilityCalculator<'a> {
    pub fn hardy_weinberg(frequencies: &'a dyn AlleleFrequencies) -> Self {
        GenotypeProbabilityCalculator::HardyWeinberg { frequencies }
    }

    pub fn theta(frequencies: &'a dyn AlleleFrequencies, theta: f64) -> Self {
        GenotypeProbabilityCalculator::Theta {
            frequencies,
            theta,
            one_minus_theta: 1.0 - theta,
        }
    }

    /// Select the model for a hypothesis: Hardy-Weinberg when theta is zero.
    pub fn for_unrelated(hypothesis: &Hypothesis, frequencies: &'a dyn AlleleFrequencies) -> Self {
        if hypothesis.theta() == 0.0 {
            GenotypeProbabilityCalculator::hardy_weinberg(frequencies)
        } else {
            GenotypeProbabilityCalculator::theta(frequencies, hypothesis.theta())
        }
    }

    /// Probability of the two-allele genotype in `locus`.
    ///
    /// The Hardy-Weinberg model leaves `allele_counts` untouched. The theta model reads the
    /// count of each allele before multiplying and then records the draw.
    pub fn calculate(&self, allele_counts: &mut AlleleCounts, locus: &Locus) -> f64 {
        let mut probability = if locus.is_homozygote() { 1.0 } else { 2.0 };

        match *self {
            GenotypeProbabilityCalculator::HardyWeinberg { frequencies } => {
                for allele in locus.alleles() {
                    probability *= frequencies.probability(locus, allele);
                }
            }
            GenotypeProbabilityCalculator::Theta {
                frequencies,
                theta,
                one_minus_theta,
            } => {
                for allele in locus.alleles() {
                    probability *= allele_counts.get(allele.id()) as f64 * theta
                        + one_minus_theta * frequencies.probability(locus, allele);
                    allele_counts.increment(allele.id());
                }
            }
        }

        probability
    }

    pub fn is_theta_corrected(&self) -> bool {
        matches!(self, GenotypeProbabilityCalculator::Theta { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genetics::{AlleleRegistry, Locus};
    use crate::hypothesis::Hypothesis;
    use crate::population_statistics::PopulationStatistics;
    use approx::assert_relative_eq;

    fn statistics() -> PopulationStatistics {
        let mut stats = PopulationStatistics::new("test");
        stats.add_frequency("D8S1179", "12", 0.1);
        stats.add_frequency("D8S1179", "13", 0.3);
        stats.add_frequency("D8S1179", "14", 0.25);
        stats
    }

    #[test]
    fn test_hardy_weinberg() {
        let stats = statistics();
        let mut registry = AlleleRegistry::new();
        let calc = GenotypeProbabilityCalculator::hardy_weinberg(&stats);
        let mut counts = AlleleCounts::new();

        let hom = Locus::genotype("D8S1179", registry.intern("13"), None);
        let het = Locus::genotype("D8S1179", registry.intern("12"), Some(registry.intern("14")));
        let rare = Locus::genotype("D8S1179", registry.intern("12"), Some(registry.intern("99")));

        assert_relative_eq!(calc.calculate(&mut counts, &hom), 0.3 * 0.3, max_relative = 1e-12);
        assert_relative_eq!(calc.calculate(&mut counts, &het), 2.0 * 0.1 * 0.25, max_relative = 1e-12);
        assert_relative_eq!(calc.calculate(&mut counts, &rare), 2.0 * 0.1 * 0.001, max_relative = 1e-12);
        assert_eq!(counts.total(), 0);
    }

    #[test]
    fn test_theta_zero_matches_hardy_weinberg() {
        let stats = statistics();
        let mut registry = AlleleRegistry::new();
        let hw = GenotypeProbabilityCalculator::hardy_weinberg(&stats);
        let theta = GenotypeProbabilityCalculator::theta(&stats, 0.0);

        for locus in [
            Locus::genotype("D8S1179", registry.intern("13"), None),
            Locus::genotype("D8S1179", registry.intern("12"), Some(registry.intern("14"))),
        ] {
            let mut counts = AlleleCounts::new();
            assert_eq!(
                theta.calculate(&mut counts, &locus),
                hw.calculate(&mut AlleleCounts::new(), &locus)
            );
        }
    }

    #[test]
    fn test_theta_conditions_on_previous_draws() {
        let stats = statistics();
        let mut registry = AlleleRegistry::new();
        let calc = GenotypeProbabilityCalculator::theta(&stats, 0.03);
        let mut counts = AlleleCounts::new();

        let het = Locus::genotype("D8S1179", registry.intern("12"), Some(registry.intern("14")));

        let first = calc.calculate(&mut counts, &het);
        assert_relative_eq!(first, 2.0 * (0.97 * 0.1) * (0.97 * 0.25), max_relative = 1e-12);

        let second = calc.calculate(&mut counts, &het);
        assert_relative_eq!(second, 2.0 * (0.03 + 0.97 * 0.1) * (0.03 + 0.97 * 0.25), max_relative = 1e-12);
        assert!(second > first);
    }

    #[test]
    fn test_theta_homozygote_counts() {
        let stats = statistics();
        let mut registry = AlleleRegistry::new();
        let calc = GenotypeProbabilityCalculator::theta(&stats, 0.01);
        let mut counts = AlleleCounts::new();

        let hom = Locus::genotype("D8S1179", registry.intern("13"), None);
        let id = hom.alleles()[0].id();

        let first = calc.calculate(&mut counts, &hom);
        assert_eq!(counts.get(id), 2);
        assert_relative_eq!(first, (0.99 * 0.3) * (0.01 + 0.99 * 0.3), max_relative = 1e-12);

        calc.calculate(&mut counts, &hom);
        assert_eq!(counts.get(id), 4);

        counts.reset();
        assert_eq!(counts.total(), 0);
        assert_relative_eq!(calc.calculate(&mut counts, &hom), first, max_relative = 1e-12);
    }

    #[test]
    fn test_factory_dispatch() {
        let stats = statistics();
        let hw = Hypothesis::new("Hd", 0.0, 0.05);
        let theta = Hypothesis::new("Hd", 0.01, 0.05);

        assert!(!GenotypeProbabilityCalculator::for_unrelated(&hw, &stats).is_theta_corrected());
        assert!(GenotypeProbabilityCalculator::for_unrelated(&theta, &stats).is_theta_corrected());
    }
}
