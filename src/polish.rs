//! Consensus polishing stage
//!
//! Reads are mapped back onto the (possibly placeholder) assembly and the external
//! consensus caller is run over the result. Polishing failure is never fatal: the
//! unpolished assembly is copied through as the stage output so downstream stages always
//! receive a usable, if degraded, sequence set.
//!

use camino::{Utf8Path, Utf8PathBuf};
use log::{info, warn};
use simple_error::SimpleResult;

use crate::exec_utils::ToolCommand;
use crate::fasta_utils::prefix_fasta_headers;
use crate::run_log::{StatusToken, append_status};
use crate::stage::StageOutcome;
use crate::utils::copy_file;

pub struct PolishConfig {
    pub aligner: String,
    pub aligner_preset: String,
    pub aligner_args: Vec<String>,
    pub consensus: String,
    pub consensus_args: Vec<String>,
    pub samtools: String,
    pub thread_count: usize,
}

/// Polish one region's assembly with the external consensus caller
///
/// On success the polished sequence headers are rewritten with the region-label prefix.
/// Any failure downgrades to copying the unpolished assembly through, with an
/// `arrow_failed` entry in the run status log.
///
pub fn run_polish_stage(
    config: &PolishConfig,
    region_label: &str,
    reads_fasta: &Utf8Path,
    assembly_fasta: &Utf8Path,
    work_dir: &Utf8Path,
    output_fasta: &Utf8Path,
    status_log: &Utf8Path,
) -> SimpleResult<StageOutcome<Utf8PathBuf>> {
    match polish_assembly(
        config,
        region_label,
        reads_fasta,
        assembly_fasta,
        work_dir,
        output_fasta,
    ) {
        Ok(()) => {
            info!("Polished assembly for region {region_label}");
            Ok(StageOutcome::Success(output_fasta.to_owned()))
        }
        Err(err) => {
            warn!(
                "Consensus polishing failed for region {region_label}, passing unpolished assembly through: {err}"
            );
            append_status(status_log, region_label, StatusToken::ArrowFailed)?;
            copy_file(assembly_fasta, output_fasta, "unpolished assembly")?;
            Ok(StageOutcome::SoftFailure {
                output: output_fasta.to_owned(),
                reason: err.to_string(),
            })
        }
    }
}

fn polish_assembly(
    config: &PolishConfig,
    region_label: &str,
    reads_fasta: &Utf8Path,
    assembly_fasta: &Utf8Path,
    work_dir: &Utf8Path,
    output_fasta: &Utf8Path,
) -> SimpleResult<()> {
    // The consensus caller requires an indexed assembly
    ToolCommand::new("assembly indexing", &config.samtools)
        .arg("faidx")
        .arg(assembly_fasta.as_str())
        .run_checked()?;

    let polish_sam = work_dir.join("polish.sam");
    ToolCommand::new("polish alignment", &config.aligner)
        .arg("-a")
        .arg("-x")
        .arg(&config.aligner_preset)
        .arg("-t")
        .arg(config.thread_count.to_string())
        .args(config.aligner_args.iter().cloned())
        .arg("-o")
        .arg(polish_sam.as_str())
        .arg(assembly_fasta.as_str())
        .arg(reads_fasta.as_str())
        .run_checked()?;

    let polish_bam = work_dir.join("polish.bam");
    ToolCommand::new("polish alignment sort", &config.samtools)
        .arg("sort")
        .arg("-o")
        .arg(polish_bam.as_str())
        .arg(polish_sam.as_str())
        .run_checked()?;
    ToolCommand::new("polish alignment indexing", &config.samtools)
        .arg("index")
        .arg(polish_bam.as_str())
        .run_checked()?;

    let consensus_fasta = work_dir.join("consensus_raw.fasta");
    ToolCommand::new("consensus caller", &config.consensus)
        .args(config.consensus_args.iter().cloned())
        .arg("-r")
        .arg(assembly_fasta.as_str())
        .arg("-o")
        .arg(consensus_fasta.as_str())
        .arg(polish_bam.as_str())
        .run_checked()?;

    let record_count = prefix_fasta_headers(&consensus_fasta, output_fasta, region_label)?;
    info!("Consensus produced {record_count} polished sequences for region {region_label}");
    Ok(())
}
