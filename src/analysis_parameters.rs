
//! This module defines `AnalysisParameters`, which gathers the evidence profiles, the known
//! profiles referred to by the hypotheses, and the settings of a database search such as the
//! likelihood ratio threshold and the number of results to report. It also determines which
//! loci are evaluated for a candidate.

use std::sync::Arc;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::error::{MixRankError, Result};
use crate::genetics::{Locus, Sample};

pub const DEFAULT_LR_THRESHOLD: f64 = 1.0;
pub const DEFAULT_REPORT_TOP: usize = 250;

/// Settings that do not depend on the loaded profiles.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchSettings {
    /// Ratios below this value are counted but not ranked.
    pub lr_threshold: f64,
    /// Maximum number of ranked results retained.
    pub report_top: usize,
    /// Candidates sharing fewer evaluated loci with the evidence are skipped.
    pub min_loci: usize,
    /// Loci to evaluate; `None` enables every locus.
    pub enabled_loci: Option<Vec<String>>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        SearchSettings {
            lr_threshold: DEFAULT_LR_THRESHOLD,
            report_top: DEFAULT_REPORT_TOP,
            min_loci: 1,
            enabled_loci: None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AnalysisParameters {
    crime_scene_profiles: Vec<Sample>,
    known_profiles: Vec<Arc<Sample>>,
    settings: SearchSettings,
    enabled_loci: Option<FxHashSet<String>>,
}

impl AnalysisParameters {
    pub fn new(crime_scene_profiles: Vec<Sample>, known_profiles: Vec<Arc<Sample>>, settings: SearchSettings) -> Self {
        let enabled_loci = settings
            .enabled_loci
            .as_ref()
            .map(|loci| loci.iter().cloned().collect());

        AnalysisParameters {
            crime_scene_profiles,
            known_profiles,
            settings,
            enabled_loci,
        }
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    /// Crime-scene replicates taking part in the computation.
    pub fn enabled_crime_scene_profiles(&self) -> impl Iterator<Item = &Sample> {
        self.crime_scene_profiles.iter().filter(|s| s.is_enabled())
    }

    pub fn enabled_known_profiles(&self) -> impl Iterator<Item = &Arc<Sample>> {
        self.known_profiles.iter().filter(|s| s.is_enabled())
    }

    pub fn is_locus_enabled(&self, locus: &str) -> bool {
        self.enabled_loci
            .as_ref()
            .is_none_or(|loci| loci.contains(locus))
    }

    /// Evidence loci in first-appearance order across the enabled replicates.
    pub fn evidence_loci(&self) -> Vec<&str> {
        let mut seen = FxHashSet::default();
        let mut loci = Vec::new();
        for sample in self.enabled_crime_scene_profiles() {
            for locus in sample.loci() {
                if self.is_locus_enabled(locus.name()) && seen.insert(locus.name()) {
                    loci.push(locus.name());
                }
            }
        }
        loci
    }

    /// Loci evaluated for a candidate: evidence loci typed in every known profile and, when a
    /// candidate is given, in the candidate.
    pub fn evaluation_loci(&self, candidate: Option<&Sample>) -> Vec<&str> {
        self.evidence_loci()
            .into_iter()
            .filter(|locus| self.enabled_known_profiles().all(|k| k.has_locus(locus)))
            .filter(|locus| candidate.is_none_or(|c| c.has_locus(locus)))
            .collect()
    }

    /// Replicate observations of a locus; replicates without the locus are left out.
    pub fn evidence_at(&self, locus: &str) -> Vec<&Locus> {
        self.enabled_crime_scene_profiles()
            .filter_map(|s| s.locus(locus))
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.enabled_crime_scene_profiles().next().is_none() {
            return Err(MixRankError::InvalidConfiguration(
                "no enabled crime-scene profiles".to_string(),
            ));
        }

        if self.evidence_loci().is_empty() {
            return Err(MixRankError::InvalidConfiguration(
                "crime-scene profiles share no enabled loci".to_string(),
            ));
        }

        if self.settings.lr_threshold < 0.0 {
            return Err(MixRankError::InvalidConfiguration(format!(
                "LR threshold must be non-negative, got {}",
                self.settings.lr_threshold
            )));
        }

        Ok(())
    }
}
