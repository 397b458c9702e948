//! Region assembly pipeline driver
//!
//! Runs the per-region stage sequence: resolve the candidate coordinates, extract reads,
//! assemble under a timeout, polish with the consensus caller, then realign the consensus
//! back to a reference window with coordinates translated to the full reference. Stage
//! hand-off is file-based; each stage writes into the region's output directory and the
//! next stage reads from it.
//!

use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use log::info;
use simple_error::{SimpleResult, bail};

use crate::assembly::{AssemblyConfig, run_assembly_stage};
use crate::candidate_table::{CandidateRegion, CandidateTable};
use crate::chrom_list::ChromList;
use crate::cli;
use crate::exec_utils::ToolCommand;
use crate::os_utils::{create_dir_all, is_nonempty_file};
use crate::polish::{PolishConfig, run_polish_stage};
use crate::read_extract::{build_group_read_store, extract_region_reads_fasta};
use crate::realign::{RealignConfig, run_realign_stage};
use crate::run_stats::{AssembleRunStats, write_assemble_run_stats};
use crate::utils::open_text_reader;

pub const SETTINGS_FILENAME: &str = "assemble.settings.json";
pub const STATUS_LOG_FILENAME: &str = "assembly.status.tsv";
pub const READS_FASTA_FILENAME: &str = "reads.fasta";
pub const ASSEMBLY_FASTA_FILENAME: &str = "assembly.fasta";
pub const CONSENSUS_FASTA_FILENAME: &str = "consensus.fasta";
pub const REALIGN_BAM_FILENAME: &str = "contig.realign.bam";
pub const GROUP_READS_FILENAME: &str = "group.reads.bam";

pub fn run_assemble(
    shared_settings: &cli::SharedSettings,
    settings: &cli::AssembleSettings,
) -> SimpleResult<()> {
    let start = Instant::now();
    cli::write_assemble_settings(&settings.output_dir, settings);

    let fai_filename = ensure_fasta_index(&settings.samtools, &settings.ref_filename)?;
    let chrom_list = ChromList::from_fai_filename(&fai_filename)?;

    let candidates =
        CandidateTable::from_tsv(Utf8Path::new(&settings.candidates_filename), "region")?;
    let region = candidates.resolve(&settings.region_id)?.clone();
    let region_label = region.label();
    info!(
        "Assembling candidate region {} ({})",
        region.id,
        region.to_region_str()
    );

    let work_dir = settings.output_dir.join("wrk");
    create_dir_all(&work_dir, "working");
    let status_log = match &settings.status_log {
        Some(x) => x.clone(),
        None => settings.output_dir.join(STATUS_LOG_FILENAME),
    };

    let reads_fasta = settings.output_dir.join(READS_FASTA_FILENAME);
    let source_bam = get_read_source(settings, &region)?;
    extract_region_reads_fasta(
        &settings.samtools,
        &source_bam,
        &region.to_region_str(),
        &work_dir,
        &reads_fasta,
    )?;

    let assembly_config = AssemblyConfig {
        assembler: settings.assembler.clone(),
        assembler_args: cli::split_extra_args(settings.assembler_opts.as_ref()),
        timeout: Duration::from_secs(settings.assembly_timeout_secs),
        thread_count: shared_settings.thread_count,
        min_read_length: settings.assembly_min_read_length,
        partition_count: settings.assembly_partition_count,
        min_coverage: settings.assembly_min_coverage,
    };
    let assembly_fasta = settings.output_dir.join(ASSEMBLY_FASTA_FILENAME);
    let assembly_outcome = run_assembly_stage(
        &assembly_config,
        &region_label,
        &reads_fasta,
        &work_dir,
        &assembly_fasta,
        &status_log,
    )?;

    let polish_config = PolishConfig {
        aligner: settings.aligner.clone(),
        aligner_preset: settings.aligner_preset.clone(),
        aligner_args: cli::split_extra_args(settings.aligner_opts.as_ref()),
        consensus: settings.consensus.clone(),
        consensus_args: cli::split_extra_args(settings.consensus_opts.as_ref()),
        samtools: settings.samtools.clone(),
        thread_count: shared_settings.thread_count,
    };
    let consensus_fasta = settings.output_dir.join(CONSENSUS_FASTA_FILENAME);
    let polish_outcome = run_polish_stage(
        &polish_config,
        &region_label,
        &reads_fasta,
        &assembly_fasta,
        &work_dir,
        &consensus_fasta,
        &status_log,
    )?;

    let realign_config = RealignConfig {
        aligner: settings.aligner.clone(),
        aligner_preset: settings.aligner_preset.clone(),
        aligner_args: cli::split_extra_args(settings.aligner_opts.as_ref()),
        samtools: settings.samtools.clone(),
        min_mapq: settings.min_realign_mapq,
        thread_count: shared_settings.thread_count,
    };
    let window = get_realign_window(settings, &region, &chrom_list)?;
    let realign_bam = settings.output_dir.join(REALIGN_BAM_FILENAME);
    let realign_stats = run_realign_stage(
        &realign_config,
        &region_label,
        polish_outcome.output(),
        &window,
        &settings.ref_filename,
        &chrom_list,
        &work_dir,
        &realign_bam,
    )?;

    write_assemble_run_stats(
        &settings.output_dir,
        &AssembleRunStats {
            region_label,
            assembly_status: assembly_outcome.output().to_string(),
            assembly_crashed: assembly_outcome.is_soft_failure(),
            polish_soft_failed: polish_outcome.is_soft_failure(),
            consensus_aligned_record_count: realign_stats.aligned_record_count,
            realigned_record_count: realign_stats.kept_record_count,
            total_runtime_secs: start.elapsed().as_secs_f64(),
        },
    );
    Ok(())
}

/// Resolve the alignment store reads are extracted from
///
/// In group mode this is the merged group-level read store, built on first use and reused
/// by subsequent regions sharing the same cache.
///
fn get_read_source(
    settings: &cli::AssembleSettings,
    region: &CandidateRegion,
) -> SimpleResult<String> {
    let group_id = match &settings.group_id {
        Some(x) => x,
        None => {
            return Ok(settings.bam_filenames[0].clone());
        }
    };

    // Settings validation guarantees the groups table is present in group mode
    let groups_filename = settings.groups_filename.as_ref().unwrap();
    let groups = CandidateTable::from_tsv(Utf8Path::new(groups_filename), "group")?;
    let group = groups.resolve(group_id)?;
    if group.chrom != region.chrom {
        bail!(
            "Candidate region '{}' does not sit on group '{}' chromosome '{}'",
            region.id,
            group.id,
            group.chrom
        );
    }

    let group_store = settings.output_dir.join(GROUP_READS_FILENAME);
    if is_nonempty_file(&group_store) {
        info!("Reusing group read store at {group_store}");
    } else {
        build_group_read_store(
            &settings.samtools,
            &settings.bam_filenames,
            &group.to_region_str(),
            settings.min_extract_mapq,
            &settings.output_dir.join("wrk"),
            &group_store,
        )?;
    }
    Ok(group_store.to_string())
}

/// Derive the realignment window from the window BED when given, and from the candidate
/// region plus a fixed flank otherwise
///
fn get_realign_window(
    settings: &cli::AssembleSettings,
    region: &CandidateRegion,
    chrom_list: &ChromList,
) -> SimpleResult<CandidateRegion> {
    match &settings.window_bed_filename {
        Some(bed_filename) => read_window_bed(Utf8Path::new(bed_filename), &region.id),
        None => region.expanded(chrom_list, settings.realign_window_flank),
    }
}

/// Read the single realignment window interval from a BED file
///
fn read_window_bed(bed_filename: &Utf8Path, region_id: &str) -> SimpleResult<CandidateRegion> {
    use std::io::BufRead;

    let reader = open_text_reader(bed_filename)?;
    for line in reader.lines() {
        let line = match line {
            Ok(x) => x,
            Err(e) => {
                bail!("Can't read realignment window file '{bed_filename}': {e}");
            }
        };
        if line.is_empty() {
            continue;
        }
        let fields = line.split('\t').collect::<Vec<_>>();
        if fields.len() < 3 {
            bail!("Truncated interval line in realignment window file '{bed_filename}'");
        }
        let parse_coord = |value: &str| -> SimpleResult<i64> {
            match value.parse::<i64>() {
                Ok(x) => Ok(x),
                Err(_) => {
                    bail!(
                        "Unparsable coordinate '{value}' in realignment window file '{bed_filename}'"
                    );
                }
            }
        };
        return Ok(CandidateRegion {
            id: region_id.to_string(),
            chrom: fields[0].to_string(),
            start: parse_coord(fields[1])?,
            end: parse_coord(fields[2])?,
        });
    }
    bail!("No interval found in realignment window file '{bed_filename}'");
}

/// Create the reference fasta index if it is missing
///
fn ensure_fasta_index(samtools: &str, ref_filename: &str) -> SimpleResult<Utf8PathBuf> {
    let fai_filename = Utf8PathBuf::from(format!("{ref_filename}.fai"));
    if !fai_filename.is_file() {
        ToolCommand::new("reference indexing", samtools)
            .arg("faidx")
            .arg(ref_filename)
            .run_checked()?;
    }
    Ok(fai_filename)
}
