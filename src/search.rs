//! This module runs a database search: every candidate profile is evaluated against the evidence
//! under the prosecution and defense hypotheses and the resulting likelihood ratios are collected
//! into `SearchResults`.
//!
//! It provides functionality to:
//! - Validate the hypotheses and resolve estimated dropout before any computation starts.
//! - Compute the defense likelihoods once, since the defense hypothesis never includes the candidate.
//! - Evaluate candidates in parallel, one `StatisticalModel` per worker thread.
//! - Share the `SearchResults` with reporting threads while the search runs.
//! - Stop promptly when interrupted, reporting the run as aborted rather than failed.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use log::{debug, info, warn};
use num_format::{Locale, ToFormattedString};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::analysis_parameters::AnalysisParameters;
use crate::dropout_estimation::{DropoutEstimate, DropoutEstimator};
use crate::error::{MixRankError, Result};
use crate::genetics::Sample;
use crate::hypothesis::{Hypothesis, validate_dropout_mode};
use crate::likelihood_ratio::LocusLikelihoods;
use crate::population_statistics::PopulationStatistics;
use crate::progress::progress_bar;
use crate::search_results::SearchResults;
use crate::statistical_model::{InterruptHandle, StatisticalModel};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchOutcome {
    Completed,
    Interrupted,
}

impl SearchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchOutcome::Completed => "completed",
            SearchOutcome::Interrupted => "interrupted",
        }
    }
}

/// Everything produced by a search run.
#[derive(Debug)]
pub struct SearchReport {
    pub results: Arc<SearchResults>,
    pub outcome: SearchOutcome,
    pub skipped: usize,
    /// Hypotheses as evaluated, with any estimated dropout resolved.
    pub prosecution: Hypothesis,
    pub defense: Hypothesis,
    pub dropout_estimate: Option<DropoutEstimate>,
}

/// A search of one set of candidate profiles. Results accumulate over calls to `run`.
pub struct Search<'a> {
    parameters: &'a AnalysisParameters,
    statistics: &'a PopulationStatistics,
    candidates: &'a [Arc<Sample>],
    estimator: DropoutEstimator,
    interrupt: InterruptHandle,
    results: Arc<SearchResults>,
}

impl<'a> Search<'a> {
    pub fn new(
        parameters: &'a AnalysisParameters,
        statistics: &'a PopulationStatistics,
        candidates: &'a [Arc<Sample>],
    ) -> Self {
        let settings = parameters.settings();
        Search {
            parameters,
            statistics,
            candidates,
            estimator: DropoutEstimator::default(),
            interrupt: InterruptHandle::new(),
            results: Arc::new(SearchResults::new(
                candidates.len(),
                settings.report_top,
                settings.lr_threshold,
            )),
        }
    }

    pub fn with_estimator(mut self, estimator: DropoutEstimator) -> Self {
        self.estimator = estimator;
        self
    }

    /// Handle that aborts the search from another thread.
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    /// Results of the search, readable from other threads while `run` is in progress.
    pub fn results(&self) -> Arc<SearchResults> {
        self.results.clone()
    }

    /// Check the configuration and resolve estimated dropout.
    pub fn prepare(
        &self,
        prosecution: &Hypothesis,
        defense: &Hypothesis,
    ) -> Result<(Hypothesis, Hypothesis, Option<DropoutEstimate>)> {
        self.parameters.validate()?;
        prosecution.validate()?;
        defense.validate()?;
        validate_dropout_mode(&[prosecution, defense])?;

        if !prosecution.has_candidate() {
            return Err(MixRankError::InvalidConfiguration(format!(
                "{} must include the candidate as a contributor",
                prosecution.id()
            )));
        }

        if defense.has_candidate() {
            return Err(MixRankError::InvalidConfiguration(format!(
                "{} may not include the candidate as a contributor",
                defense.id()
            )));
        }

        if !(prosecution.requires_dropout_estimation() || defense.requires_dropout_estimation()) {
            return Ok((prosecution.clone(), defense.clone(), None));
        }

        let estimate = self.estimator.estimate(defense, self.parameters, self.statistics)?;
        Ok((
            prosecution.with_estimated_dropout(estimate.estimate),
            defense.with_estimated_dropout(estimate.estimate),
            Some(estimate),
        ))
    }

    /// Evaluate all candidates and rank them by likelihood ratio.
    pub fn run(&self, prosecution: &Hypothesis, defense: &Hypothesis) -> Result<SearchReport> {
        let start = Instant::now();
        let (prosecution, defense, dropout_estimate) = self.prepare(prosecution, defense)?;
        info!("{}", prosecution);
        info!("{}", defense);

        let candidates = self.candidates;
        let results = self.results.clone();
        let skipped = AtomicUsize::new(0);

        let mut model = StatisticalModel::with_interrupt(self.statistics, self.interrupt.clone());
        let defense_likelihoods = match model.calculate_likelihood(&defense, self.parameters, None) {
            Ok(likelihoods) => likelihoods,
            Err(MixRankError::Interrupted) => {
                results.set_duration(start.elapsed());
                return Ok(SearchReport {
                    results,
                    outcome: SearchOutcome::Interrupted,
                    skipped: 0,
                    prosecution,
                    defense,
                    dropout_estimate,
                });
            }
            Err(e) => return Err(e),
        };
        debug!(
            "Pr(E|{}) over {} loci: {:e}",
            defense.id(),
            defense_likelihoods.len(),
            defense_likelihoods.global_probability()
        );

        info!(
            "Evaluating {} candidate profiles.",
            candidates.len().to_formatted_string(&Locale::en)
        );
        let progress_bar = progress_bar(candidates.len() as u64);

        let evaluation = candidates.par_iter().try_for_each_init(
            || StatisticalModel::with_interrupt(self.statistics, self.interrupt.clone()),
            |model, candidate| {
                let result = self.evaluate_candidate(model, candidate, &prosecution, &defense_likelihoods);
                if let Ok(false) = result {
                    skipped.fetch_add(1, Ordering::Relaxed);
                }
                progress_bar.inc(1);
                result.map(|_| ())
            },
        );

        progress_bar.finish();
        results.set_duration(start.elapsed());

        let outcome = match evaluation {
            Ok(()) => SearchOutcome::Completed,
            Err(MixRankError::Interrupted) => {
                warn!("Search interrupted after {} candidates.", results.number_of_lrs());
                SearchOutcome::Interrupted
            }
            Err(e) => return Err(e),
        };

        Ok(SearchReport {
            results,
            outcome,
            skipped: skipped.into_inner(),
            prosecution,
            defense,
            dropout_estimate,
        })
    }

    /// Add the likelihood ratio of one candidate. Returns false if the candidate was skipped.
    fn evaluate_candidate(
        &self,
        model: &mut StatisticalModel<'_>,
        candidate: &Arc<Sample>,
        prosecution: &Hypothesis,
        defense: &LocusLikelihoods,
    ) -> Result<bool> {
        if !candidate.is_enabled() {
            debug!("Skipping disabled profile {}.", candidate.name());
            return Ok(false);
        }

        let num_loci = self.parameters.evaluation_loci(Some(candidate.as_ref())).len();
        if num_loci < self.parameters.settings().min_loci {
            debug!(
                "Skipping {}: {} evaluated loci, {} required.",
                candidate.name(),
                num_loci,
                self.parameters.settings().min_loci
            );
            return Ok(false);
        }

        let lr = model.evaluate(prosecution, defense, self.parameters, candidate.clone())?;
        if lr.has_zero_probability() {
            debug!("{} is excluded by the evidence.", candidate.name());
        }
        self.results.add_lr(lr);
        model.reset();

        Ok(true)
    }
}
