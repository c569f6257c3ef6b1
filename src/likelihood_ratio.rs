
//! Per-locus evidence probabilities and the likelihood ratio of a candidate.
//!
//! Probabilities are multiplied across loci as sums of logarithms so long profiles do not
//! underflow. A locus whose probability is exactly zero is kept visible through
//! `LikelihoodRatio::has_zero_probability`, separating impossible profiles from those that merely
//! fall below the reporting threshold.

use std::sync::Arc;

use crate::genetics::Sample;

/// Probability of the evidence at each evaluated locus under one hypothesis.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LocusLikelihoods {
    probabilities: Vec<(String, f64)>,
}

impl LocusLikelihoods {
    pub fn new() -> Self {
        LocusLikelihoods::default()
    }

    pub fn add_locus_probability(&mut self, locus: &str, probability: f64) {
        match self.probabilities.iter_mut().find(|(l, _)| l == locus) {
            Some(entry) => entry.1 = probability,
            None => self.probabilities.push((locus.to_string(), probability)),
        }
    }

    pub fn locus_probability(&self, locus: &str) -> Option<f64> {
        self.probabilities
            .iter()
            .find(|(l, _)| l == locus)
            .map(|(_, p)| *p)
    }

    pub fn len(&self) -> usize {
        self.probabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probabilities.is_empty()
    }

    /// Natural log of the product of all locus probabilities.
    pub fn global_log_probability(&self) -> f64 {
        self.probabilities.iter().map(|(_, p)| p.ln()).sum()
    }

    pub fn global_probability(&self) -> f64 {
        self.global_log_probability().exp()
    }
}

/// Evidence probabilities for one locus under both hypotheses.
#[derive(Clone, Debug, PartialEq)]
pub struct Ratio {
    pub locus: String,
    pub prosecution_probability: f64,
    pub defense_probability: f64,
}

impl Ratio {
    pub fn new(locus: &str, prosecution_probability: f64, defense_probability: f64) -> Self {
        Ratio {
            locus: locus.to_string(),
            prosecution_probability,
            defense_probability,
        }
    }

    pub fn ratio(&self) -> f64 {
        if self.prosecution_probability == 0.0 {
            0.0
        } else {
            self.prosecution_probability / self.defense_probability
        }
    }

    fn log10_ratio(&self) -> f64 {
        if self.prosecution_probability == 0.0 {
            f64::NEG_INFINITY
        } else {
            self.prosecution_probability.log10() - self.defense_probability.log10()
        }
    }
}

/// Likelihood ratio of one candidate with its per-locus breakdown.
#[derive(Clone, Debug)]
pub struct LikelihoodRatio {
    profile: Arc<Sample>,
    ratios: Vec<Ratio>,
    log10_ratio: f64,
}

impl LikelihoodRatio {
    pub fn new(profile: Arc<Sample>, ratios: Vec<Ratio>) -> Self {
        // an impossible locus excludes the candidate whatever the other loci contribute
        let log10_ratio = if ratios.iter().any(|r| r.prosecution_probability == 0.0) {
            f64::NEG_INFINITY
        } else {
            ratios.iter().map(|r| r.log10_ratio()).sum()
        };
        LikelihoodRatio {
            profile,
            ratios,
            log10_ratio,
        }
    }

    /// Pair the prosecution probabilities with the defense probabilities of the same loci.
    ///
    /// Loci without a defense probability are left out.
    pub fn from_likelihoods(profile: Arc<Sample>, prosecution: &LocusLikelihoods, defense: &LocusLikelihoods) -> Self {
        let ratios = prosecution
            .probabilities
            .iter()
            .filter_map(|(locus, hp)| {
                defense
                    .locus_probability(locus)
                    .map(|hd| Ratio::new(locus, *hp, hd))
            })
            .collect();

        LikelihoodRatio::new(profile, ratios)
    }

    pub fn profile(&self) -> &Arc<Sample> {
        &self.profile
    }

    pub fn ratios(&self) -> &[Ratio] {
        &self.ratios
    }

    pub fn ratio_for(&self, locus: &str) -> Option<&Ratio> {
        self.ratios.iter().find(|r| r.locus == locus)
    }

    pub fn number_of_loci(&self) -> usize {
        self.ratios.len()
    }

    pub fn log10_ratio(&self) -> f64 {
        self.log10_ratio
    }

    pub fn overall_ratio(&self) -> f64 {
        10f64.powf(self.log10_ratio)
    }

    /// True when the evidence is impossible under the prosecution hypothesis at some locus.
    pub fn has_zero_probability(&self) -> bool {
        self.ratios.iter().any(|r| r.prosecution_probability == 0.0)
    }
}
