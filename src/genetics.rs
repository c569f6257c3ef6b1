
//! Domain types for STR profiles: alleles, loci, and samples.
//!
//! Alleles are interned through an `AlleleRegistry` so every distinct allele value carries a
//! dense integer identity. These identities index the allele-count buffers used by the
//! subpopulation-corrected genotype calculator, so all profiles taking part in one search must
//! be created through the same registry.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use itertools::Itertools;
use rustc_hash::FxHashMap;

/// Value used for the catch-all allele standing in for every unobserved allele at a locus.
pub const Q_ALLELE: &str = "Q";

#[derive(Clone, Debug)]
pub struct Allele {
    value: Arc<str>,
    id: usize,
}

impl Allele {
    /// Create an allele with an explicit identity. Prefer `AlleleRegistry::intern`.
    pub fn with_id(value: &str, id: usize) -> Self {
        Allele {
            value: Arc::from(value),
            id,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn id(&self) -> usize {
        self.id
    }
}

// alleles are compared by value, the identity is only an index
impl PartialEq for Allele {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for Allele {}

impl fmt::Display for Allele {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// Assigns stable identities to allele values.
#[derive(Debug, Default)]
pub struct AlleleRegistry {
    ids: FxHashMap<Arc<str>, usize>,
}

impl AlleleRegistry {
    pub fn new() -> Self {
        AlleleRegistry::default()
    }

    /// Return the allele for `value`, allocating a new identity the first time it is seen.
    pub fn intern(&mut self, value: &str) -> Allele {
        if let Some((value, id)) = self.ids.get_key_value(value) {
            return Allele {
                value: value.clone(),
                id: *id,
            };
        }

        let id = self.ids.len();
        let value: Arc<str> = Arc::from(value);
        self.ids.insert(value.clone(), id);
        Allele { value, id }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Alleles observed at a named marker.
///
/// Reference profiles hold exactly two entries (equal entries for a homozygote). Evidence
/// profiles may hold any number of distinct alleles.
#[derive(Clone, Debug, PartialEq)]
pub struct Locus {
    name: String,
    alleles: Vec<Allele>,
}

impl Locus {
    pub fn new(name: &str, alleles: Vec<Allele>) -> Self {
        Locus {
            name: name.to_string(),
            alleles,
        }
    }

    /// Create a diploid genotype; a single allele is taken to be homozygous.
    pub fn genotype(name: &str, first: Allele, second: Option<Allele>) -> Self {
        let second = second.unwrap_or_else(|| first.clone());
        Locus::new(name, vec![first, second])
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn alleles(&self) -> &[Allele] {
        &self.alleles
    }

    pub fn is_homozygote(&self) -> bool {
        self.alleles.len() == 2 && self.alleles[0] == self.alleles[1]
    }

    pub fn has_allele(&self, allele: &Allele) -> bool {
        self.alleles.contains(allele)
    }

    /// Comma-separated allele values, as written in profile files.
    pub fn allele_string(&self) -> String {
        self.alleles.iter().map(|a| a.value()).join(",")
    }
}

/// Provenance of a sample, kept for audit.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct SampleSource {
    pub file: PathBuf,
    pub sha256: String,
}

/// A named DNA profile.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    name: String,
    source: SampleSource,
    loci: Vec<Locus>,
    enabled: bool,
}

impl Sample {
    pub fn new(name: &str, source: SampleSource) -> Self {
        Sample {
            name: name.to_string(),
            source,
            loci: Vec::new(),
            enabled: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &SampleSource {
        &self.source
    }

    pub fn loci(&self) -> &[Locus] {
        &self.loci
    }

    /// Add a locus, replacing any locus with the same name.
    pub fn add_locus(&mut self, locus: Locus) {
        match self.loci.iter_mut().find(|l| l.name == locus.name) {
            Some(existing) => *existing = locus,
            None => self.loci.push(locus),
        }
    }

    pub fn locus(&self, name: &str) -> Option<&Locus> {
        self.loci.iter().find(|l| l.name == name)
    }

    pub fn has_locus(&self, name: &str) -> bool {
        self.locus(name).is_some()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_reuses_ids() {
        let mut registry = AlleleRegistry::new();
        let a = registry.intern("12");
        let b = registry.intern("13.2");
        let c = registry.intern("12");

        assert_eq!(a.id(), 0);
        assert_eq!(b.id(), 1);
        assert_eq!(c.id(), a.id());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_homozygote() {
        let mut registry = AlleleRegistry::new();
        let hom = Locus::genotype("D3S1358", registry.intern("15"), None);
        let het = Locus::genotype("D3S1358", registry.intern("15"), Some(registry.intern("16")));

        assert!(hom.is_homozygote());
        assert_eq!(hom.alleles().len(), 2);
        assert!(!het.is_homozygote());
        assert_eq!(het.allele_string(), "15,16");
    }

    #[test]
    fn test_add_locus_replaces() {
        let mut registry = AlleleRegistry::new();
        let mut sample = Sample::new("S1", SampleSource::default());
        sample.add_locus(Locus::genotype("TH01", registry.intern("6"), None));
        sample.add_locus(Locus::genotype("TH01", registry.intern("7"), None));

        assert_eq!(sample.loci().len(), 1);
        assert_eq!(sample.locus("TH01").unwrap().alleles()[0].value(), "7");
        assert!(sample.is_enabled());
    }
}
