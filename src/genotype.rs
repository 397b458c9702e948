//! Genotyping remap pipeline driver
//!
//! Fans out over the primary contigs, remapping each contig's reads against its
//! local-assembly alt contigs with the external post-ALT tool, then merges the per-contig
//! partial outputs into one indexed sample-level alignment store. Contigs are independent,
//! so the fan-out runs on the shared thread pool; any per-contig failure aborts the run.
//!

use std::time::Instant;

use camino::Utf8Path;
use itertools::Itertools;
use log::info;
use rayon::prelude::*;
use regex::Regex;
use simple_error::{SimpleResult, bail};
use unwrap::unwrap;

use crate::alt_contig_table::AltContigTable;
use crate::bam_utils::count_alignment_records;
use crate::cli;
use crate::os_utils::create_dir_all;
use crate::postalt::{RemapConfig, merge_contig_partials, remap_primary_contig};
use crate::run_stats::{GenotypeRunStats, write_genotype_run_stats};

pub const SETTINGS_FILENAME: &str = "genotype.settings.json";
pub const GENOTYPE_BAM_FILENAME: &str = "genotype.remap.bam";

pub fn run_genotype(
    shared_settings: &cli::SharedSettings,
    settings: &cli::GenotypeSettings,
) -> SimpleResult<()> {
    let start = Instant::now();
    cli::write_genotype_settings(&settings.output_dir, settings);

    let alt_table = AltContigTable::from_tsv(Utf8Path::new(&settings.alt_info_filename))?;

    // The expression was already validated during settings processing
    let contig_regex = unwrap!(
        Regex::new(&settings.contig_regex),
        "Invalid contig regex: '{}'",
        settings.contig_regex
    );
    let primary_contigs = alt_table
        .primary_contig_names()
        .into_iter()
        .filter(|x| contig_regex.is_match(x))
        .map(|x| x.to_string())
        .collect::<Vec<_>>();
    if primary_contigs.is_empty() {
        bail!(
            "No primary contigs in alt-contig table '{}' match --contig-regex '{}'",
            settings.alt_info_filename,
            settings.contig_regex
        );
    }
    info!(
        "Remapping {} primary contigs: {}",
        primary_contigs.len(),
        primary_contigs.iter().join(", ")
    );

    let work_dir = settings.output_dir.join("wrk");
    create_dir_all(&work_dir, "working");
    let partials_dir = settings.output_dir.join("partials");
    create_dir_all(&partials_dir, "partial output");

    let remap_config = RemapConfig {
        samtools: settings.samtools.clone(),
        postalt: settings.postalt.clone(),
        postalt_args: cli::split_extra_args(settings.postalt_opts.as_ref()),
        min_mapq: settings.min_remap_mapq,
    };

    let contig_results = primary_contigs
        .par_iter()
        .map(|primary_contig| {
            let partial_bam = partials_dir.join(format!("{primary_contig}.remap.bam"));
            match remap_primary_contig(
                &remap_config,
                &alt_table,
                primary_contig,
                &settings.primary_bam_filename,
                &settings.alt_bam_filename,
                &work_dir,
                &partial_bam,
            ) {
                Ok(x) => Ok(x.map(|stats| (partial_bam, stats))),
                Err(e) => {
                    bail!("Post-alt remap failed for primary contig '{primary_contig}': {e}");
                }
            }
        })
        .collect::<SimpleResult<Vec<_>>>()?;

    let mut partial_bams = Vec::new();
    let mut per_contig = Vec::new();
    for (partial_bam, stats) in contig_results.into_iter().flatten() {
        partial_bams.push(partial_bam);
        per_contig.push(stats);
    }
    if partial_bams.is_empty() {
        bail!("None of the selected primary contigs have local assemblies to remap");
    }
    let skipped_primary_contig_count = primary_contigs.len() - per_contig.len();

    let merged_bam = settings.output_dir.join(GENOTYPE_BAM_FILENAME);
    merge_contig_partials(
        &settings.samtools,
        shared_settings.thread_count,
        &partial_bams,
        &merged_bam,
    )?;
    let merged_record_count = count_alignment_records(&merged_bam)?;

    // Partial outputs are ephemeral once the merged store exists
    let _ = std::fs::remove_dir_all(&partials_dir);

    write_genotype_run_stats(
        &settings.output_dir,
        &GenotypeRunStats {
            remapped_primary_contig_count: per_contig.len(),
            skipped_primary_contig_count,
            per_contig,
            merged_record_count,
            total_runtime_secs: start.elapsed().as_secs_f64(),
        },
    );
    Ok(())
}
