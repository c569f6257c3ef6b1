
//! Allele frequency table for a reference population.
//!
//! Lookups never fail: alleles missing from the table for a locus are assigned the configured
//! rare allele frequency.

use rustc_hash::FxHashMap;

use crate::genetics::{Allele, Locus};

pub const DEFAULT_RARE_ALLELE_FREQUENCY: f64 = 0.001;

/// Source of allele frequencies used by the genotype probability calculators.
pub trait AlleleFrequencies {
    fn probability(&self, locus: &Locus, allele: &Allele) -> f64;
}

#[derive(Clone, Debug)]
pub struct PopulationStatistics {
    name: String,
    frequencies: FxHashMap<String, FxHashMap<String, f64>>,
    rare_allele_frequency: f64,
}

impl PopulationStatistics {
    pub fn new(name: &str) -> Self {
        PopulationStatistics {
            name: name.to_string(),
            frequencies: FxHashMap::default(),
            rare_allele_frequency: DEFAULT_RARE_ALLELE_FREQUENCY,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_frequency(&mut self, locus: &str, allele: &str, frequency: f64) {
        self.frequencies
            .entry(locus.to_string())
            .or_default()
            .insert(allele.to_string(), frequency);
    }

    pub fn set_rare_allele_frequency(&mut self, frequency: f64) {
        self.rare_allele_frequency = frequency;
    }

    pub fn rare_allele_frequency(&self) -> f64 {
        self.rare_allele_frequency
    }

    /// Frequency of an allele value at a locus, falling back to the rare allele frequency.
    pub fn frequency(&self, locus: &str, allele: &str) -> f64 {
        self.frequencies
            .get(locus)
            .and_then(|alleles| alleles.get(allele))
            .copied()
            .unwrap_or(self.rare_allele_frequency)
    }

    /// All tabulated alleles and frequencies at a locus, ordered by allele value.
    pub fn locus_frequencies(&self, locus: &str) -> Vec<(&str, f64)> {
        let mut alleles: Vec<(&str, f64)> = self
            .frequencies
            .get(locus)
            .map(|alleles| alleles.iter().map(|(a, f)| (a.as_str(), *f)).collect())
            .unwrap_or_default();
        alleles.sort_by(|a, b| a.0.cmp(b.0));
        alleles
    }
}

impl AlleleFrequencies for PopulationStatistics {
    fn probability(&self, locus: &Locus, allele: &Allele) -> f64 {
        self.frequency(locus.name(), allele.value())
    }
}

/// Frequencies at a single locus, extended with the catch-all `Q` allele.
pub struct QDesignatedFrequencies<'a> {
    statistics: &'a PopulationStatistics,
    q_allele_id: Option<usize>,
    q_probability: f64,
}

impl<'a> QDesignatedFrequencies<'a> {
    pub fn new(statistics: &'a PopulationStatistics, q_allele_id: Option<usize>, q_probability: f64) -> Self {
        QDesignatedFrequencies {
            statistics,
            q_allele_id,
            q_probability,
        }
    }
}

impl AlleleFrequencies for QDesignatedFrequencies<'_> {
    fn probability(&self, locus: &Locus, allele: &Allele) -> f64 {
        if Some(allele.id()) == self.q_allele_id {
            self.q_probability
        } else {
            self.statistics.probability(locus, allele)
        }
    }
}
