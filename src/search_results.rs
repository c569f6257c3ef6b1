
//! Accumulator for the likelihood ratios produced by a database search.
//!
//! Every added ratio is counted and kept for the summary statistics (extrema, percentiles,
//! results per number of loci). Only ratios at or above the LR threshold enter the ranking,
//! which retains the best `report_top` results in a fixed-capacity min-heap.
//!
//! Evaluation threads add results while a reporting thread may read statistics, so all state
//! sits behind a single mutex.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::likelihood_ratio::LikelihoodRatio;

/// Number of specimens whose ratio was computed over a given number of loci.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LociCount {
    pub number_of_loci: usize,
    pub number_of_specimens: usize,
}

/// Heap entry ordered by ratio; among equal ratios the earlier arrival ranks higher.
#[derive(Clone, Debug)]
struct Ranked {
    ratio: f64,
    arrival: u64,
    lr: Arc<LikelihoodRatio>,
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ratio
            .total_cmp(&other.ratio)
            .then_with(|| other.arrival.cmp(&self.arrival))
    }
}

#[derive(Debug, Default)]
struct Inner {
    ranked: BinaryHeap<Reverse<Ranked>>,
    ratios: Vec<(f64, usize)>,
    over_one: usize,
    zero_probability: usize,
    min_ratio: Option<f64>,
    max_ratio: Option<f64>,
    duration: Option<Duration>,
    arrivals: u64,
}

#[derive(Debug)]
pub struct SearchResults {
    expected_count: usize,
    report_top: usize,
    lr_threshold: f64,
    inner: Mutex<Inner>,
}

impl SearchResults {
    pub fn new(expected_count: usize, report_top: usize, lr_threshold: f64) -> Self {
        SearchResults {
            expected_count,
            report_top,
            lr_threshold,
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // statistics stay consistent even if a writer panicked
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of candidates the search expects to evaluate.
    pub fn expected_count(&self) -> usize {
        self.expected_count
    }

    pub fn report_top(&self) -> usize {
        self.report_top
    }

    pub fn lr_threshold(&self) -> f64 {
        self.lr_threshold
    }

    pub fn add_lr(&self, lr: LikelihoodRatio) {
        let ratio = lr.overall_ratio();
        let excluded = lr.has_zero_probability();
        let mut inner = self.lock();

        inner.ratios.push((ratio, lr.number_of_loci()));
        if excluded {
            inner.zero_probability += 1;
        }
        if ratio > 1.0 {
            inner.over_one += 1;
        }
        if !ratio.is_nan() {
            inner.min_ratio = Some(inner.min_ratio.map_or(ratio, |m| m.min(ratio)));
            inner.max_ratio = Some(inner.max_ratio.map_or(ratio, |m| m.max(ratio)));
        }

        // excluded candidates never rank, even with a zero threshold
        if excluded || ratio.is_nan() || ratio < self.lr_threshold || self.report_top == 0 {
            return;
        }

        let arrival = inner.arrivals;
        inner.arrivals += 1;
        inner.ranked.push(Reverse(Ranked {
            ratio,
            arrival,
            lr: Arc::new(lr),
        }));
        if inner.ranked.len() > self.report_top {
            inner.ranked.pop();
        }
    }

    pub fn number_of_lrs(&self) -> usize {
        self.lock().ratios.len()
    }

    /// Number of ratios strictly greater than one.
    pub fn number_of_lrs_over_1(&self) -> usize {
        self.lock().over_one
    }

    /// Number of candidates the evidence excludes under the prosecution hypothesis.
    pub fn number_of_zero_probability(&self) -> usize {
        self.lock().zero_probability
    }

    pub fn max_ratio(&self) -> Option<f64> {
        self.lock().max_ratio
    }

    pub fn min_ratio(&self) -> Option<f64> {
        self.lock().min_ratio
    }

    /// Retained results, best first.
    pub fn ranked(&self) -> Vec<Arc<LikelihoodRatio>> {
        let inner = self.lock();
        let mut ranked: Vec<&Ranked> = inner.ranked.iter().map(|r| &r.0).collect();
        ranked.sort_by(|a, b| b.cmp(a));
        ranked.into_iter().map(|r| r.lr.clone()).collect()
    }

    pub fn number_of_ranked(&self) -> usize {
        self.lock().ranked.len()
    }

    /// Percentile of all added ratios, `p` in `[0, 100]`.
    ///
    /// Uses rank `p (n + 1) / 100` clamped to `[1, n]`, interpolating linearly between the
    /// neighbouring order statistics.
    pub fn percentile(&self, p: f64) -> Option<f64> {
        if p.is_nan() {
            return None;
        }

        let mut values: Vec<f64> = self.lock().ratios.iter().map(|(r, _)| *r).collect();
        if values.is_empty() {
            return None;
        }
        values.sort_by(|a, b| a.total_cmp(b));

        let n = values.len() as f64;
        let rank = (p / 100.0 * (n + 1.0)).clamp(1.0, n);
        let lo = rank.floor();
        let hi = rank.ceil();
        let low_value = values[lo as usize - 1];
        if lo == hi {
            return Some(low_value);
        }

        let high_value = values[hi as usize - 1];
        Some(low_value + (rank - lo) * (high_value - low_value))
    }

    /// Counts of ratios at or above `min_ratio`, grouped by number of evaluated loci.
    pub fn results_per_number_of_loci(&self, min_ratio: f64) -> Vec<LociCount> {
        let inner = self.lock();
        let mut counts: Vec<LociCount> = Vec::new();
        for (ratio, loci) in inner.ratios.iter() {
            if *ratio < min_ratio {
                continue;
            }
            match counts.iter_mut().find(|c| c.number_of_loci == *loci) {
                Some(count) => count.number_of_specimens += 1,
                None => counts.push(LociCount {
                    number_of_loci: *loci,
                    number_of_specimens: 1,
                }),
            }
        }
        counts.sort_by_key(|c| c.number_of_loci);
        counts
    }

    pub fn set_duration(&self, duration: Duration) {
        self.lock().duration = Some(duration);
    }

    pub fn duration(&self) -> Option<Duration> {
        self.lock().duration
    }
}
