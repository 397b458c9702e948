use camino::{Utf8Path, Utf8PathBuf};
use clap::Args;
use const_format::concatcp;
use serde::{Deserialize, Serialize};
use simple_error::{SimpleResult, bail};
use unwrap::unwrap;

use super::defaults::{
    ASSEMBLY_MIN_COVERAGE, ASSEMBLY_MIN_READ_LENGTH, ASSEMBLY_PARTITION_COUNT,
    ASSEMBLY_TIMEOUT_SECS, MIN_EXTRACT_MAPQ, MIN_REALIGN_MAPQ, REALIGN_WINDOW_FLANK,
};
use super::utils::{check_optional_filename, check_required_filename};
use crate::assemble::SETTINGS_FILENAME;

#[derive(Args, Default, Deserialize, Serialize)]
pub struct AssembleSettings {
    /// Directory for all assemble command output (must not already exist)
    #[arg(long, value_name = "DIR", default_value = concatcp!(env!("CARGO_PKG_NAME"), "_assemble_output"))]
    pub output_dir: Utf8PathBuf,

    /// Candidate region coordinate table, tab-separated with a header row
    #[arg(long = "candidates", value_name = "FILE")]
    pub candidates_filename: String,

    /// ID of the candidate region to assemble, from the candidates table
    #[arg(long = "region", value_name = "ID")]
    pub region_id: String,

    /// Candidate group coordinate table, tab-separated with a header row
    ///
    /// Required when --group is given.
    ///
    #[arg(long = "groups", value_name = "FILE")]
    pub groups_filename: Option<String>,

    /// ID of the candidate group sharing a reads cache with this region
    ///
    /// When given, reads are extracted from a merged group-level read store built from all
    /// --bam inputs instead of directly from a single alignment file.
    ///
    #[arg(long = "group", value_name = "ID")]
    pub group_id: Option<String>,

    /// Alignment file for the query sample in BAM or CRAM format
    ///
    /// May be repeated in group mode to merge several source batches.
    ///
    #[arg(long = "bam", value_name = "FILE")]
    pub bam_filenames: Vec<String>,

    /// Genome reference in FASTA format
    #[arg(long = "ref", value_name = "FILE")]
    pub ref_filename: String,

    /// Shared run-level status log file
    ///
    /// Appended to by every region in the run. Defaults to 'assembly.status.tsv' inside
    /// the output directory.
    ///
    #[arg(long = "status-log", value_name = "FILE")]
    pub status_log: Option<Utf8PathBuf>,

    /// Realignment window interval in BED format (single interval)
    ///
    /// By default the window is derived from the candidate region plus a fixed flank.
    ///
    #[arg(long = "window-bed", value_name = "FILE")]
    pub window_bed_filename: Option<String>,

    /// Minimum MAPQ for reads entering the group read store
    #[arg(hide = true, long, default_value_t = MIN_EXTRACT_MAPQ)]
    pub min_extract_mapq: u32,

    /// Minimum MAPQ for consensus records kept after window realignment
    #[arg(hide = true, long, default_value_t = MIN_REALIGN_MAPQ)]
    pub min_realign_mapq: u8,

    /// Flank added on each side of the candidate region to form the realignment window
    #[arg(hide = true, long, default_value_t = REALIGN_WINDOW_FLANK)]
    pub realign_window_flank: i64,

    /// Long-read assembler executable
    #[arg(long, value_name = "EXE", default_value = "canu")]
    pub assembler: String,

    /// Extra arguments appended to the assembler command line
    #[arg(long = "assembler-opts", value_name = "ARGS")]
    pub assembler_opts: Option<String>,

    /// Wall-clock limit on the assembler run, in seconds
    #[arg(hide = true, long, default_value_t = ASSEMBLY_TIMEOUT_SECS)]
    pub assembly_timeout_secs: u64,

    /// Minimum read length passed to the assembler
    #[arg(hide = true, long, default_value_t = ASSEMBLY_MIN_READ_LENGTH)]
    pub assembly_min_read_length: u32,

    /// Correction partition count passed to the assembler
    #[arg(hide = true, long, default_value_t = ASSEMBLY_PARTITION_COUNT)]
    pub assembly_partition_count: u32,

    /// Minimum coverage passed to the assembler
    #[arg(hide = true, long, default_value_t = ASSEMBLY_MIN_COVERAGE)]
    pub assembly_min_coverage: u32,

    /// Long-read aligner executable
    #[arg(long, value_name = "EXE", default_value = "minimap2")]
    pub aligner: String,

    /// Aligner preset passed via -x
    #[arg(hide = true, long, default_value = "map-hifi")]
    pub aligner_preset: String,

    /// Extra arguments appended to the aligner command line
    #[arg(long = "aligner-opts", value_name = "ARGS")]
    pub aligner_opts: Option<String>,

    /// Consensus/variant caller executable used for polishing
    #[arg(long, value_name = "EXE", default_value = "arrow")]
    pub consensus: String,

    /// Extra arguments appended to the consensus caller command line
    #[arg(long = "consensus-opts", value_name = "ARGS")]
    pub consensus_opts: Option<String>,

    /// Alignment toolkit executable
    #[arg(long, value_name = "EXE", default_value = "samtools")]
    pub samtools: String,
}

pub fn validate_and_fix_assemble_settings(
    settings: AssembleSettings,
) -> SimpleResult<AssembleSettings> {
    check_required_filename(&settings.candidates_filename, "candidates table")?;
    check_required_filename(&settings.ref_filename, "reference")?;
    check_optional_filename(settings.window_bed_filename.as_ref(), "realignment window")?;

    if settings.region_id.is_empty() {
        bail!("Must specify a candidate region ID with --region");
    }

    if settings.bam_filenames.is_empty() {
        bail!("Must specify at least one alignment file with --bam");
    }
    for bam_filename in settings.bam_filenames.iter() {
        check_required_filename(bam_filename, "alignment")?;
    }

    match (&settings.group_id, &settings.groups_filename) {
        (Some(_), None) => {
            bail!("--group requires a group coordinate table given with --groups");
        }
        (None, _) => {
            if settings.bam_filenames.len() > 1 {
                bail!("Multiple --bam inputs are only supported in group mode (--group)");
            }
        }
        _ => {}
    }
    if let Some(groups_filename) = &settings.groups_filename {
        check_required_filename(groups_filename, "groups table")?;
    }

    Ok(settings)
}

/// Write assemble settings out in json format
pub fn write_assemble_settings(output_dir: &Utf8Path, settings: &AssembleSettings) {
    use log::info;

    let filename = output_dir.join(SETTINGS_FILENAME);

    info!("Writing assemble settings to file: '{filename}'");

    let f = unwrap!(
        std::fs::File::create(&filename),
        "Unable to create assemble settings json file: '{filename}'"
    );

    serde_json::to_writer_pretty(&f, &settings).unwrap();
}
