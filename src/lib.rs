//! Ranking of database candidates by the likelihood ratio that they contributed to a mixed,
//! possibly degraded, DNA evidence profile.
//!
//! The ratio compares a prosecution hypothesis, in which the candidate is a contributor, with a
//! defense hypothesis in which an unknown person takes their place. Likelihoods follow a
//! semi-continuous model with allele dropout and drop-in, enumerating the genotypes of unknown
//! contributors at each locus.

pub mod analysis_parameters;
pub mod dropout_estimation;
pub mod error;
pub mod genetics;
pub mod genotype_probability;
pub mod hypothesis;
pub mod io_utils;
pub mod likelihood_ratio;
pub mod logging;
pub mod population_statistics;
pub mod progress;
pub mod report;
pub mod search;
pub mod search_results;
pub mod statistical_model;
