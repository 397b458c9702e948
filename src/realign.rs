//! Region realignment stage
//!
//! The polished consensus is aligned back to a small reference window, then each aligned
//! record is translated from window-local coordinates to absolute reference coordinates.
//! The window token carried in the record's reference name encodes the translation offset.
//!

use camino::Utf8Path;
use log::info;
use rust_htslib::bam::{self, Read};
use simple_error::{SimpleResult, bail};

use crate::bam_utils::get_alignment_output_header;
use crate::candidate_table::CandidateRegion;
use crate::chrom_list::ChromList;
use crate::exec_utils::ToolCommand;
use crate::fasta_utils::relabel_single_record_fasta;

pub struct RealignConfig {
    pub aligner: String,
    pub aligner_preset: String,
    pub aligner_args: Vec<String>,
    pub samtools: String,
    pub min_mapq: u8,
    pub thread_count: usize,
}

#[derive(Clone, Copy, Default)]
pub struct RealignStats {
    pub aligned_record_count: usize,
    pub kept_record_count: usize,
}

/// Realign the consensus to a reference window and translate back to full-reference
/// coordinates
///
/// The output is a sorted, indexed alignment file expressed against the full reference
/// sequence dictionary.
///
pub fn run_realign_stage(
    config: &RealignConfig,
    region_label: &str,
    consensus_fasta: &Utf8Path,
    window: &CandidateRegion,
    ref_filename: &str,
    chrom_list: &ChromList,
    work_dir: &Utf8Path,
    output_bam: &Utf8Path,
) -> SimpleResult<RealignStats> {
    // Extract the reference window and relabel it with the filesystem-safe window token,
    // so aligned records carry the token in their reference-name field
    let window_raw_fasta = work_dir.join("window_raw.fasta");
    ToolCommand::new("window extraction", &config.samtools)
        .arg("faidx")
        .arg(ref_filename)
        .arg(window.to_region_str())
        .stdout_to(&window_raw_fasta)
        .run_checked()?;
    let window_fasta = work_dir.join("window.fasta");
    relabel_single_record_fasta(&window_raw_fasta, &window_fasta, &window.label())?;

    let realign_sam = work_dir.join("realign.sam");
    ToolCommand::new("window realignment", &config.aligner)
        .arg("-a")
        .arg("-x")
        .arg(&config.aligner_preset)
        .arg("-t")
        .arg(config.thread_count.to_string())
        .args(config.aligner_args.iter().cloned())
        .arg("-o")
        .arg(realign_sam.as_str())
        .arg(window_fasta.as_str())
        .arg(consensus_fasta.as_str())
        .run_checked()?;

    let translated_bam = work_dir.join("realign.translated.bam");
    let stats =
        translate_window_alignments(&realign_sam, &translated_bam, chrom_list, config.min_mapq)?;

    ToolCommand::new("realignment sort", &config.samtools)
        .arg("sort")
        .arg("-o")
        .arg(output_bam.as_str())
        .arg(translated_bam.as_str())
        .run_checked()?;
    ToolCommand::new("realignment indexing", &config.samtools)
        .arg("index")
        .arg(output_bam.as_str())
        .run_checked()?;

    info!(
        "Realigned {} of {} consensus records for region {region_label}",
        stats.kept_record_count, stats.aligned_record_count
    );
    Ok(stats)
}

/// Split a window token into the source chromosome and translation offset
///
/// The token is normalized by rewriting the first `:` to `-`, then split on `-`: the first
/// element is the reference name and the second is the offset added to window-local
/// positions.
///
pub fn parse_window_token(token: &str) -> SimpleResult<(String, i64)> {
    let normalized = token.replacen(':', "-", 1);
    let mut fields = normalized.split('-');
    let chrom = match fields.next() {
        Some(x) if !x.is_empty() => x.to_string(),
        _ => {
            bail!("Can't parse window token '{token}'");
        }
    };
    let offset = match fields.next().map(|x| x.parse::<i64>()) {
        Some(Ok(x)) => x,
        _ => {
            bail!("Can't parse window offset from token '{token}'");
        }
    };
    Ok((chrom, offset))
}

/// Rewrite window-local alignment records onto absolute reference coordinates
///
/// Unmapped records and records below the mapping-quality threshold are dropped. The
/// output header is rebuilt from the full reference dictionary, with reference-name and
/// position fields translated via the window token.
///
fn translate_window_alignments(
    input_filename: &Utf8Path,
    output_filename: &Utf8Path,
    chrom_list: &ChromList,
    min_mapq: u8,
) -> SimpleResult<RealignStats> {
    let mut reader = match bam::Reader::from_path(input_filename) {
        Ok(x) => x,
        Err(e) => {
            bail!("Can't open realignment file '{input_filename}': {e}");
        }
    };
    let window_tokens = reader
        .header()
        .target_names()
        .iter()
        .map(|x| String::from_utf8_lossy(x).into_owned())
        .collect::<Vec<_>>();

    let header = get_alignment_output_header(chrom_list);
    let mut writer = match bam::Writer::from_path(output_filename, &header, bam::Format::Bam) {
        Ok(x) => x,
        Err(e) => {
            bail!("Can't create realignment file '{output_filename}': {e}");
        }
    };

    let mut stats = RealignStats::default();
    for record in reader.records() {
        let mut record = match record {
            Ok(x) => x,
            Err(e) => {
                bail!("Can't read realignment record from '{input_filename}': {e}");
            }
        };
        if record.is_unmapped() {
            continue;
        }
        stats.aligned_record_count += 1;
        if record.mapq() < min_mapq {
            continue;
        }

        let window_token = &window_tokens[record.tid() as usize];
        let (chrom, offset) = parse_window_token(window_token)?;
        let tid = match chrom_list.label_to_index.get(&chrom) {
            Some(&x) => x as i32,
            None => {
                bail!("Window token '{window_token}' names unknown reference sequence '{chrom}'");
            }
        };

        record.set_tid(tid);
        record.set_pos(offset + record.pos());
        record.set_mtid(-1);
        record.set_mpos(-1);
        if let Err(e) = writer.write(&record) {
            bail!("Can't write realignment record to '{output_filename}': {e}");
        }
        stats.kept_record_count += 1;
    }
    Ok(stats)
}
