//! Post-ALT genotyping remap stage
//!
//! Each primary contig is processed independently: the alt-contig table and the two
//! sample-level alignments are sliced down to the contig's local assemblies, the external
//! post-ALT remap tool reassigns reads that belong on an alternate contig, and the result
//! is MAPQ-filtered and sorted into a per-contig partial output. Unlike the assembly and
//! polishing stages there is no fallback here: any per-contig failure is fatal to the run.
//!

use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use simple_error::{SimpleResult, bail};

use crate::alt_contig_table::AltContigTable;
use crate::bam_utils::filter_alignments_by_mapq;
use crate::exec_utils::ToolCommand;
use crate::os_utils::ScratchDir;

pub struct RemapConfig {
    pub samtools: String,
    pub postalt: String,
    pub postalt_args: Vec<String>,
    pub min_mapq: u8,
}

#[derive(Clone, Default, Deserialize, Serialize)]
pub struct ContigRemapStats {
    pub contig: String,
    pub scoped_alt_contig_count: usize,
    pub remapped_record_count: usize,
    pub kept_record_count: usize,
}

/// Remap one primary contig's reads against its local-assembly alt contigs
///
/// Returns None when the contig has no alt contigs in scope, in which case no partial
/// output is produced.
///
pub fn remap_primary_contig(
    config: &RemapConfig,
    alt_table: &AltContigTable,
    primary_contig: &str,
    primary_bam: &str,
    alt_bam: &str,
    work_dir: &Utf8Path,
    partial_bam: &Utf8Path,
) -> SimpleResult<Option<ContigRemapStats>> {
    // Per-contig scratch path keeps concurrently processed contigs isolated
    let scratch = ScratchDir::create(work_dir.join(format!("remap_{primary_contig}")));

    let scoped_table = scratch.join("alt_info.tsv");
    let scoped_alt_contig_count = alt_table.write_scoped_table(primary_contig, &scoped_table)?;
    if scoped_alt_contig_count == 0 {
        debug!("Primary contig {primary_contig} has no local assemblies, skipping remap");
        return Ok(None);
    }
    let scoped_bed = scratch.join("scope.bed");
    alt_table.write_scoped_bed(primary_contig, &scoped_bed)?;

    // Primary-alignment records overlapping the contig's local-assembly placements
    let primary_slice = scratch.join("primary_slice.bam");
    ToolCommand::new("primary alignment slice", &config.samtools)
        .arg("view")
        .arg("-b")
        .arg("-L")
        .arg(scoped_bed.as_str())
        .arg("-o")
        .arg(primary_slice.as_str())
        .arg(primary_bam)
        .run_checked()?;

    // Alt-reference records restricted to the scoped alt contigs
    let alt_slice = scratch.join("alt_slice.bam");
    ToolCommand::new("alt alignment slice", &config.samtools)
        .arg("view")
        .arg("-b")
        .arg("-o")
        .arg(alt_slice.as_str())
        .arg(alt_bam)
        .args(
            alt_table
                .alts_for_primary(primary_contig)
                .iter()
                .map(|x| x.name.clone()),
        )
        .run_checked()?;

    let remapped_sam = scratch.join("remapped.sam");
    ToolCommand::new("post-alt remap", &config.postalt)
        .args(config.postalt_args.iter().cloned())
        .arg(scoped_table.as_str())
        .arg(primary_slice.as_str())
        .arg(alt_slice.as_str())
        .stdout_to(&remapped_sam)
        .run_checked()?;

    let filtered_bam = scratch.join("filtered.bam");
    let filter_stats = filter_alignments_by_mapq(&remapped_sam, &filtered_bam, config.min_mapq)?;

    ToolCommand::new("partial output sort", &config.samtools)
        .arg("sort")
        .arg("-o")
        .arg(partial_bam.as_str())
        .arg(filtered_bam.as_str())
        .run_checked()?;

    info!(
        "Remapped primary contig {primary_contig}: kept {} of {} records across {scoped_alt_contig_count} alt contigs",
        filter_stats.kept_record_count, filter_stats.total_record_count
    );
    Ok(Some(ContigRemapStats {
        contig: primary_contig.to_string(),
        scoped_alt_contig_count,
        remapped_record_count: filter_stats.total_record_count,
        kept_record_count: filter_stats.kept_record_count,
    }))
}

/// Merge all per-contig partial outputs into the sample-level alignment store and index it
///
pub fn merge_contig_partials(
    samtools: &str,
    thread_count: usize,
    partial_bams: &[Utf8PathBuf],
    output_bam: &Utf8Path,
) -> SimpleResult<()> {
    if partial_bams.is_empty() {
        bail!("No per-contig partial outputs available to merge");
    }

    ToolCommand::new("partial output merge", samtools)
        .arg("merge")
        .arg("-f")
        .arg("-@")
        .arg(thread_count.to_string())
        .arg(output_bam.as_str())
        .args(partial_bams.iter().map(|x| x.as_str().to_string()))
        .run_checked()?;

    // Downstream genotyping random-accesses the merged store, so it must be re-indexed
    ToolCommand::new("merged output indexing", samtools)
        .arg("index")
        .arg(output_bam.as_str())
        .run_checked()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_alt_table(dir: &Utf8Path) -> AltContigTable {
        let table_filename = dir.join("alt_info.tsv");
        std::fs::write(
            &table_filename,
            b"contig\tlength\tprimary\tparent\n\
              chr1\t248956422\t1\t.\n\
              chr2\t242193529\t1\t.\n\
              chr1-1000-2000\t1100\t0\tchr1\n",
        )
        .unwrap();
        AltContigTable::from_tsv(&table_filename).unwrap()
    }

    fn test_config(samtools: &str) -> RemapConfig {
        RemapConfig {
            samtools: samtools.to_string(),
            postalt: "postalt".to_string(),
            postalt_args: Vec::new(),
            min_mapq: 20,
        }
    }

    /// A primary contig with no alt contigs is skipped without producing a partial output
    #[test]
    fn test_contig_without_alts_is_skipped() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(tmp_dir.path()).unwrap();
        let alt_table = test_alt_table(dir);

        let partial_bam = dir.join("chr2.remap.bam");
        let result = remap_primary_contig(
            &test_config("true"),
            &alt_table,
            "chr2",
            "primary.bam",
            "alt.bam",
            dir,
            &partial_bam,
        )
        .unwrap();
        assert!(result.is_none());
        assert!(!partial_bam.exists());
        // The per-contig scratch dir must be cleaned up on this path too
        assert!(!dir.join("remap_chr2").exists());
    }

    /// A per-contig slicing failure is a hard error and still cleans up scratch space
    #[test]
    fn test_remap_failure_is_hard_error() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(tmp_dir.path()).unwrap();
        let alt_table = test_alt_table(dir);

        let result = remap_primary_contig(
            &test_config("false"),
            &alt_table,
            "chr1",
            "primary.bam",
            "alt.bam",
            dir,
            &dir.join("chr1.remap.bam"),
        );
        assert!(result.is_err());
        assert!(!dir.join("remap_chr1").exists());
    }

    #[test]
    fn test_merge_requires_partials() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(tmp_dir.path()).unwrap();
        assert!(merge_contig_partials("true", 1, &[], &dir.join("merged.bam")).is_err());
    }
}
