
//! Writers for the result tables of a search: the ranked candidates, their per-locus breakdown,
//! and a summary of the statistics over all evaluated candidates.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::Result;

use crate::search::SearchReport;

pub const RANKED_FILE: &str = "ranked.tsv";
pub const RANKED_LOCI_FILE: &str = "ranked_loci.tsv";
pub const SUMMARY_FILE: &str = "summary.tsv";

const SUMMARY_PERCENTILES: [f64; 7] = [1.0, 5.0, 25.0, 50.0, 75.0, 95.0, 99.0];

/// Write all result tables into `out_dir`.
pub fn write_report(out_dir: &Path, report: &SearchReport) -> Result<()> {
    write_ranked(&mut BufWriter::new(File::create(out_dir.join(RANKED_FILE))?), report)?;
    write_ranked_loci(&mut BufWriter::new(File::create(out_dir.join(RANKED_LOCI_FILE))?), report)?;
    write_summary(&mut BufWriter::new(File::create(out_dir.join(SUMMARY_FILE))?), report)?;
    Ok(())
}

pub fn write_ranked<W: Write>(writer: &mut W, report: &SearchReport) -> Result<()> {
    writeln!(writer, "rank\tsample\tsource\tsha256\tnum_loci\tlr\tlog10_lr")?;
    for (rank, lr) in report.results.ranked().iter().enumerate() {
        let profile = lr.profile();
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t{}\t{:.4}",
            rank + 1,
            profile.name(),
            profile.source().file.display(),
            profile.source().sha256,
            lr.number_of_loci(),
            lr.overall_ratio(),
            lr.log10_ratio()
        )?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_ranked_loci<W: Write>(writer: &mut W, report: &SearchReport) -> Result<()> {
    writeln!(writer, "rank\tsample\tlocus\talleles\tpr_e_hp\tpr_e_hd\tlr")?;
    for (rank, lr) in report.results.ranked().iter().enumerate() {
        for ratio in lr.ratios() {
            let alleles = lr
                .profile()
                .locus(&ratio.locus)
                .map(|l| l.allele_string())
                .unwrap_or_default();
            writeln!(
                writer,
                "{}\t{}\t{}\t{}\t{:e}\t{:e}\t{}",
                rank + 1,
                lr.profile().name(),
                ratio.locus,
                alleles,
                ratio.prosecution_probability,
                ratio.defense_probability,
                ratio.ratio()
            )?;
        }
    }
    writer.flush()?;
    Ok(())
}

pub fn write_summary<W: Write>(writer: &mut W, report: &SearchReport) -> Result<()> {
    let results = &report.results;
    let optional = |value: Option<f64>| value.map(|v| v.to_string()).unwrap_or_else(|| "NA".to_string());

    writeln!(writer, "statistic\tvalue")?;
    writeln!(writer, "outcome\t{}", report.outcome.as_str())?;
    writeln!(writer, "prosecution\t{}", report.prosecution)?;
    writeln!(writer, "defense\t{}", report.defense)?;
    if let Some(estimate) = &report.dropout_estimate {
        writeln!(writer, "estimated_dropout\t{}", estimate.estimate)?;
    }
    writeln!(writer, "candidates\t{}", results.expected_count())?;
    writeln!(writer, "evaluated\t{}", results.number_of_lrs())?;
    writeln!(writer, "skipped\t{}", report.skipped)?;
    writeln!(writer, "lr_threshold\t{}", results.lr_threshold())?;
    writeln!(writer, "lrs_over_1\t{}", results.number_of_lrs_over_1())?;
    writeln!(writer, "zero_probability\t{}", results.number_of_zero_probability())?;
    writeln!(writer, "report_top\t{}", results.report_top())?;
    writeln!(writer, "reported\t{}", results.number_of_ranked())?;
    writeln!(writer, "min_lr\t{}", optional(results.min_ratio()))?;
    writeln!(writer, "max_lr\t{}", optional(results.max_ratio()))?;
    for p in SUMMARY_PERCENTILES {
        writeln!(writer, "percentile_{}\t{}", p, optional(results.percentile(p)))?;
    }
    for bucket in results.results_per_number_of_loci(results.lr_threshold()) {
        writeln!(writer, "loci_{}\t{}", bucket.number_of_loci, bucket.number_of_specimens)?;
    }
    if let Some(duration) = results.duration() {
        writeln!(writer, "duration_sec\t{:.3}", duration.as_secs_f64())?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::genetics::{AlleleRegistry, Locus, Sample, SampleSource};
    use crate::hypothesis::{Dropout, Hypothesis};
    use crate::likelihood_ratio::{LikelihoodRatio, Ratio};
    use crate::search::SearchOutcome;
    use crate::search_results::SearchResults;

    fn report() -> SearchReport {
        let mut registry = AlleleRegistry::new();
        let results = SearchResults::new(3, 10, 1.0);
        for (name, hp) in [("cand1", 0.5), ("cand2", 0.01), ("cand3", 0.0)] {
            let mut sample = Sample::new(name, SampleSource::default());
            sample.add_locus(Locus::genotype("TH01", registry.intern("6"), Some(registry.intern("7"))));
            let lr = LikelihoodRatio::new(Arc::new(sample), vec![Ratio::new("TH01", hp, 0.05)]);
            results.add_lr(lr);
        }
        results.set_duration(Duration::from_secs(2));

        let mut prosecution = Hypothesis::new("Hp", 0.0, 0.05);
        prosecution.set_candidate(Dropout::Fixed(0.1));
        let mut defense = Hypothesis::new("Hd", 0.0, 0.05);
        defense.set_unknowns(1, Dropout::Fixed(0.1));

        SearchReport {
            results: Arc::new(results),
            outcome: SearchOutcome::Completed,
            skipped: 0,
            prosecution,
            defense,
            dropout_estimate: None,
        }
    }

    #[test]
    fn test_write_ranked() -> Result<()> {
        let mut buffer = Vec::new();
        write_ranked(&mut buffer, &report())?;
        let text = String::from_utf8(buffer)?;
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("1\tcand1\t"));
        Ok(())
    }

    #[test]
    fn test_write_ranked_loci() -> Result<()> {
        let mut buffer = Vec::new();
        write_ranked_loci(&mut buffer, &report())?;
        let text = String::from_utf8(buffer)?;

        assert!(text.lines().nth(1).unwrap().starts_with("1\tcand1\tTH01\t6,7\t"));
        Ok(())
    }

    #[test]
    fn test_write_summary() -> Result<()> {
        let mut buffer = Vec::new();
        write_summary(&mut buffer, &report())?;
        let text = String::from_utf8(buffer)?;

        assert!(text.contains("outcome\tcompleted\n"));
        assert!(text.contains("evaluated\t3\n"));
        assert!(text.contains("lrs_over_1\t1\n"));
        assert!(text.contains("zero_probability\t1\n"));
        assert!(text.contains("report_top\t10\n"));
        assert!(text.contains("reported\t1\n"));
        assert!(text.contains("loci_1\t1\n"));
        assert!(text.contains("duration_sec\t2.000\n"));
        Ok(())
    }

    #[test]
    fn test_write_report_files() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_report(dir.path(), &report())?;

        for file in [RANKED_FILE, RANKED_LOCI_FILE, SUMMARY_FILE] {
            assert!(dir.path().join(file).exists());
        }
        Ok(())
    }
}
