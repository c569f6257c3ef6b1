
//! Contributor hypotheses for the numerator (prosecution) and denominator (defense) of the
//! likelihood ratio.
//!
//! A hypothesis lists the known contributors with their dropout probabilities, whether the
//! candidate under evaluation is a contributor, a number of unknown contributors sharing one
//! dropout probability, the drop-in probability, and the theta correction. Hypotheses are built
//! once per search and only read while candidates are evaluated.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{MixRankError, Result};
use crate::genetics::Sample;

/// Dropout probability of a contributor.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Dropout {
    Fixed(f64),
    Estimated,
}

impl Dropout {
    /// Probability of a fixed dropout, `None` while still to be estimated.
    pub fn probability(&self) -> Option<f64> {
        match self {
            Dropout::Fixed(p) => Some(*p),
            Dropout::Estimated => None,
        }
    }

    pub fn is_estimated(&self) -> bool {
        matches!(self, Dropout::Estimated)
    }

    fn resolve(self, estimate: f64) -> Self {
        match self {
            Dropout::Estimated => Dropout::Fixed(estimate),
            fixed => fixed,
        }
    }
}

impl fmt::Display for Dropout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dropout::Fixed(p) => write!(f, "{p}"),
            Dropout::Estimated => write!(f, "estimated"),
        }
    }
}

/// A known individual taking part in a hypothesis.
#[derive(Clone, Debug)]
pub struct Contributor {
    pub sample: Arc<Sample>,
    pub dropout: Dropout,
}

#[derive(Clone, Debug)]
pub struct Hypothesis {
    id: String,
    theta: f64,
    dropin: f64,
    contributors: Vec<Contributor>,
    candidate_dropout: Option<Dropout>,
    unknown_count: usize,
    unknown_dropout: Dropout,
}

impl Hypothesis {
    pub fn new(id: &str, theta: f64, dropin: f64) -> Self {
        Hypothesis {
            id: id.to_string(),
            theta,
            dropin,
            contributors: Vec::new(),
            candidate_dropout: None,
            unknown_count: 0,
            unknown_dropout: Dropout::Fixed(0.0),
        }
    }

    pub fn add_contributor(&mut self, sample: Arc<Sample>, dropout: Dropout) {
        self.contributors.push(Contributor { sample, dropout });
    }

    /// Mark the candidate under evaluation as a contributor.
    pub fn set_candidate(&mut self, dropout: Dropout) {
        self.candidate_dropout = Some(dropout);
    }

    pub fn set_unknowns(&mut self, count: usize, dropout: Dropout) {
        self.unknown_count = count;
        self.unknown_dropout = dropout;
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn theta(&self) -> f64 {
        self.theta
    }

    pub fn dropin(&self) -> f64 {
        self.dropin
    }

    pub fn contributors(&self) -> &[Contributor] {
        &self.contributors
    }

    pub fn candidate_dropout(&self) -> Option<Dropout> {
        self.candidate_dropout
    }

    pub fn has_candidate(&self) -> bool {
        self.candidate_dropout.is_some()
    }

    pub fn unknown_count(&self) -> usize {
        self.unknown_count
    }

    pub fn unknown_dropout(&self) -> Dropout {
        self.unknown_dropout
    }

    /// All dropout settings in the hypothesis. The unknown dropout only counts when there are unknowns.
    fn dropouts(&self) -> impl Iterator<Item = Dropout> + '_ {
        self.contributors
            .iter()
            .map(|c| c.dropout)
            .chain(self.candidate_dropout)
            .chain((self.unknown_count > 0).then_some(self.unknown_dropout))
    }

    pub fn requires_dropout_estimation(&self) -> bool {
        self.dropouts().any(|d| d.is_estimated())
    }

    /// Check parameter ranges and that fixed and estimated dropout are not mixed.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.theta) {
            return Err(MixRankError::InvalidConfiguration(format!(
                "{}: theta must be in [0, 1), got {}",
                self.id, self.theta
            )));
        }

        if !(0.0..=1.0).contains(&self.dropin) {
            return Err(MixRankError::InvalidConfiguration(format!(
                "{}: dropin must be in [0, 1], got {}",
                self.id, self.dropin
            )));
        }

        for dropout in self.dropouts() {
            if let Dropout::Fixed(p) = dropout {
                if !(0.0..=1.0).contains(&p) {
                    return Err(MixRankError::InvalidConfiguration(format!(
                        "{}: dropout must be in [0, 1], got {}",
                        self.id, p
                    )));
                }
            }
        }

        if self.contributors.is_empty() && !self.has_candidate() && self.unknown_count == 0 {
            return Err(MixRankError::InvalidConfiguration(format!(
                "{}: hypothesis has no contributors",
                self.id
            )));
        }

        validate_dropout_mode(&[self])
    }

    /// Copy of the hypothesis with every estimated dropout replaced by `estimate`.
    pub fn with_estimated_dropout(&self, estimate: f64) -> Hypothesis {
        let mut resolved = self.clone();
        for contributor in &mut resolved.contributors {
            contributor.dropout = contributor.dropout.resolve(estimate);
        }
        resolved.candidate_dropout = resolved.candidate_dropout.map(|d| d.resolve(estimate));
        resolved.unknown_dropout = resolved.unknown_dropout.resolve(estimate);
        resolved
    }
}

impl fmt::Display for Hypothesis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.id)?;
        if let Some(dropout) = self.candidate_dropout {
            write!(f, "candidate (dropout {dropout}), ")?;
        }
        for contributor in &self.contributors {
            write!(f, "{} (dropout {}), ", contributor.sample.name(), contributor.dropout)?;
        }
        write!(
            f,
            "{} unknown(s) (dropout {}); theta = {}, dropin = {}",
            self.unknown_count, self.unknown_dropout, self.theta, self.dropin
        )
    }
}

/// Fixed and estimated dropout may not be combined across the given hypotheses.
pub fn validate_dropout_mode(hypotheses: &[&Hypothesis]) -> Result<()> {
    let mut estimated = false;
    let mut fixed = false;
    for dropout in hypotheses.iter().flat_map(|h| h.dropouts()) {
        if dropout.is_estimated() {
            estimated = true;
        } else {
            fixed = true;
        }
    }

    if estimated && fixed {
        return Err(MixRankError::InvalidConfiguration(
            "fixed dropout values cannot be mixed with dropout estimation".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genetics::SampleSource;

    fn known() -> Arc<Sample> {
        Arc::new(Sample::new("victim", SampleSource::default()))
    }

    #[test]
    fn test_validate_ranges() {
        let mut hp = Hypothesis::new("Hp", 0.0, 0.05);
        hp.set_candidate(Dropout::Fixed(0.1));
        assert!(hp.validate().is_ok());

        let mut bad_theta = Hypothesis::new("Hp", 1.0, 0.05);
        bad_theta.set_candidate(Dropout::Fixed(0.1));
        assert!(matches!(bad_theta.validate(), Err(MixRankError::InvalidConfiguration(_))));

        let mut bad_dropout = Hypothesis::new("Hd", 0.0, 0.05);
        bad_dropout.set_unknowns(1, Dropout::Fixed(1.5));
        assert!(bad_dropout.validate().is_err());

        assert!(Hypothesis::new("Hd", 0.0, 0.05).validate().is_err());
    }

    #[test]
    fn test_mixed_dropout_rejected() {
        let mut hd = Hypothesis::new("Hd", 0.0, 0.05);
        hd.add_contributor(known(), Dropout::Fixed(0.1));
        hd.set_unknowns(1, Dropout::Estimated);
        assert!(hd.validate().is_err());

        let mut hp = Hypothesis::new("Hp", 0.0, 0.05);
        hp.set_candidate(Dropout::Estimated);
        let mut hd = Hypothesis::new("Hd", 0.0, 0.05);
        hd.set_unknowns(1, Dropout::Fixed(0.2));
        assert!(hp.validate().is_ok());
        assert!(hd.validate().is_ok());
        assert!(validate_dropout_mode(&[&hp, &hd]).is_err());
    }

    #[test]
    fn test_unused_unknown_dropout_ignored() {
        let mut hp = Hypothesis::new("Hp", 0.0, 0.05);
        hp.set_candidate(Dropout::Estimated);
        hp.set_unknowns(0, Dropout::Fixed(0.1));
        assert!(hp.validate().is_ok());
        assert!(hp.requires_dropout_estimation());
    }

    #[test]
    fn test_resolve_estimated_dropout() {
        let mut hd = Hypothesis::new("Hd", 0.01, 0.05);
        hd.add_contributor(known(), Dropout::Estimated);
        hd.set_unknowns(2, Dropout::Estimated);

        let resolved = hd.with_estimated_dropout(0.35);
        assert!(!resolved.requires_dropout_estimation());
        assert_eq!(resolved.contributors()[0].dropout, Dropout::Fixed(0.35));
        assert_eq!(resolved.unknown_dropout(), Dropout::Fixed(0.35));
        assert_eq!(resolved.unknown_count(), 2);
        assert!(hd.requires_dropout_estimation());
    }
}
