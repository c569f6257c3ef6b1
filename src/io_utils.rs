
//! Readers for the tab-separated profile and population statistics files used by the
//! command-line tool. Every loaded sample records the file it came from and the SHA-256 digest of
//! that file so results can be traced back to their inputs.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result, bail};
use sha2::{Digest, Sha256};

use crate::genetics::{AlleleRegistry, Locus, Sample, SampleSource};
use crate::population_statistics::PopulationStatistics;

/// SHA-256 digest of a file, hex encoded.
pub fn file_sha256(path: &Path) -> Result<String> {
    let file = File::open(path).context(format!("Failed to open {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();

    let mut buffer = [0u8; 8192];
    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Non-comment, non-empty lines of a TSV file split into fields, with 1-based line numbers.
fn tsv_records(path: &Path) -> Result<Vec<(usize, Vec<String>)>> {
    let file = File::open(path).context(format!("Failed to open {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;

        // skip comment lines starting with #
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }

        let fields = line.trim().split('\t').map(|f| f.trim().to_string()).collect();
        records.push((idx + 1, fields));
    }

    Ok(records)
}

/// Parse a TSV file of profiles (sample, locus, comma-separated alleles).
///
/// A single allele at a locus is read as a homozygote when `genotypes` is true, which is the
/// case for reference and candidate profiles. Evidence profiles keep alleles as listed.
pub fn read_profiles(path: &Path, registry: &mut AlleleRegistry, genotypes: bool) -> Result<Vec<Sample>> {
    let source = SampleSource {
        file: path.to_path_buf(),
        sha256: file_sha256(path)?,
    };

    let mut samples: Vec<Sample> = Vec::new();
    for (line_number, fields) in tsv_records(path)? {
        if fields.len() != 3 {
            bail!(
                "Invalid profile format in {} at line {}: each line must have exactly 3 columns (sample, locus, alleles)",
                path.display(),
                line_number
            );
        }

        let alleles: Vec<_> = fields[2]
            .split(',')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(|a| registry.intern(a))
            .collect();

        let locus = if genotypes {
            match alleles.as_slice() {
                [a] => Locus::genotype(&fields[1], a.clone(), None),
                [a, b] => Locus::genotype(&fields[1], a.clone(), Some(b.clone())),
                _ => bail!(
                    "Invalid genotype for {} at {} in {} (line {}): expected 1 or 2 alleles",
                    fields[0],
                    fields[1],
                    path.display(),
                    line_number
                ),
            }
        } else {
            let mut distinct = Vec::with_capacity(alleles.len());
            for allele in alleles {
                if !distinct.contains(&allele) {
                    distinct.push(allele);
                }
            }
            Locus::new(&fields[1], distinct)
        };

        let idx = match samples.iter().position(|s| s.name() == fields[0]) {
            Some(idx) => idx,
            None => {
                samples.push(Sample::new(&fields[0], source.clone()));
                samples.len() - 1
            }
        };
        samples[idx].add_locus(locus);
    }

    Ok(samples)
}

/// Parse a TSV file of allele frequencies (locus, allele, frequency).
pub fn read_population_statistics(path: &Path, rare_allele_frequency: f64) -> Result<PopulationStatistics> {
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let mut statistics = PopulationStatistics::new(&name);
    statistics.set_rare_allele_frequency(rare_allele_frequency);

    for (line_number, fields) in tsv_records(path)? {
        if fields.len() != 3 {
            bail!(
                "Invalid population statistics format in {} at line {}: each line must have exactly 3 columns (locus, allele, frequency)",
                path.display(),
                line_number
            );
        }

        let frequency: f64 = fields[2].parse().context(format!(
            "Invalid frequency '{}' in {} at line {}",
            fields[2],
            path.display(),
            line_number
        ))?;
        if !(frequency > 0.0 && frequency <= 1.0) {
            bail!(
                "Frequency {} in {} at line {} must be in (0, 1]",
                frequency,
                path.display(),
                line_number
            );
        }

        statistics.add_frequency(&fields[0], &fields[1], frequency);
    }

    Ok(statistics)
}
