//! Read extraction stage
//!
//! Two modes are provided: single-region extraction from one indexed alignment store, and
//! group extraction that merges several independently MAPQ-filtered source batches into one
//! indexed store shared by every region in the group. All batch temporaries live in a
//! scratch directory that is removed on every exit path.
//!

use camino::Utf8Path;
use log::{debug, info};
use simple_error::{SimpleResult, bail};

use crate::exec_utils::ToolCommand;
use crate::os_utils::{ScratchDir, is_nonempty_file};

/// Extract reads overlapping `region` from an indexed alignment store into a fasta file
///
pub fn extract_region_reads_fasta(
    samtools: &str,
    bam_filename: &str,
    region: &str,
    work_dir: &Utf8Path,
    output_fasta: &Utf8Path,
) -> SimpleResult<()> {
    let scratch = ScratchDir::create(work_dir.join("extract_tmp"));
    let region_bam = scratch.join("region.bam");

    ToolCommand::new("read extraction", samtools)
        .arg("view")
        .arg("-b")
        .arg("-o")
        .arg(region_bam.as_str())
        .arg(bam_filename)
        .arg(region)
        .run_checked()?;

    ToolCommand::new("read conversion", samtools)
        .arg("fasta")
        .arg(region_bam.as_str())
        .stdout_to(output_fasta)
        .run_checked()?;

    if !is_nonempty_file(output_fasta) {
        debug!("No reads extracted for region {region}");
    }
    Ok(())
}

/// Build the merged, indexed read store for a candidate group
///
/// Each source batch is filtered to `region` at the mapping-quality threshold before the
/// merge. The scratch subdirectory holding per-batch files is removed whether the merge
/// succeeds or fails, so repeated runs never collide with stale batch output.
///
pub fn build_group_read_store(
    samtools: &str,
    bam_filenames: &[String],
    region: &str,
    min_mapq: u32,
    work_dir: &Utf8Path,
    output_bam: &Utf8Path,
) -> SimpleResult<()> {
    if bam_filenames.is_empty() {
        bail!("No source alignment batches provided for group read extraction");
    }

    let scratch = ScratchDir::create(work_dir.join("merge_tmp"));

    let mut batch_filenames = Vec::new();
    for (batch_index, bam_filename) in bam_filenames.iter().enumerate() {
        let batch_bam = scratch.join(&format!("batch_{batch_index}.bam"));
        ToolCommand::new("batch extraction", samtools)
            .arg("view")
            .arg("-b")
            .arg("-q")
            .arg(min_mapq.to_string())
            .arg("-o")
            .arg(batch_bam.as_str())
            .arg(bam_filename)
            .arg(region)
            .run_checked()?;
        batch_filenames.push(batch_bam);
    }

    ToolCommand::new("batch merge", samtools)
        .arg("merge")
        .arg("-f")
        .arg(output_bam.as_str())
        .args(batch_filenames.iter().map(|x| x.as_str().to_string()))
        .run_checked()?;

    // The merged store feeds downstream random-access extraction, so it must be re-indexed
    ToolCommand::new("read store indexing", samtools)
        .arg("index")
        .arg(output_bam.as_str())
        .run_checked()?;

    info!(
        "Built group read store from {} source batches at {output_bam}",
        bam_filenames.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A failed merge must still remove the per-batch scratch directory
    #[test]
    fn test_group_store_scratch_cleanup_on_failure() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let work_dir = Utf8Path::from_path(tmp_dir.path()).unwrap();

        let result = build_group_read_store(
            "false",
            &["batch0.bam".to_string(), "batch1.bam".to_string()],
            "chr1:1000-2000",
            20,
            work_dir,
            &work_dir.join("group.reads.bam"),
        );
        assert!(result.is_err());
        assert!(!work_dir.join("merge_tmp").exists());
    }

    #[test]
    fn test_group_store_requires_batches() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let work_dir = Utf8Path::from_path(tmp_dir.path()).unwrap();

        assert!(
            build_group_read_store(
                "true",
                &[],
                "chr1:1000-2000",
                20,
                work_dir,
                &work_dir.join("group.reads.bam"),
            )
            .is_err()
        );
    }
}
