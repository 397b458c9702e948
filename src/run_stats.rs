//! Track stats for the whole garfish run
//!

use std::fs::File;

use camino::Utf8Path;
use log::info;
use serde::{Deserialize, Serialize};
use thousands::Separable;
use unwrap::unwrap;

use crate::postalt::ContigRemapStats;

pub const RUN_STATS_FILENAME: &str = "run.stats.json";

#[derive(Default, Deserialize, Serialize)]
pub struct AssembleRunStats {
    pub region_label: String,

    /// Terminal status token recorded for the assembly stage
    pub assembly_status: String,

    pub assembly_crashed: bool,
    pub polish_soft_failed: bool,

    pub consensus_aligned_record_count: usize,
    pub realigned_record_count: usize,

    pub total_runtime_secs: f64,
}

#[derive(Default, Deserialize, Serialize)]
pub struct GenotypeRunStats {
    pub remapped_primary_contig_count: usize,
    pub skipped_primary_contig_count: usize,
    pub per_contig: Vec<ContigRemapStats>,
    pub merged_record_count: usize,
    pub total_runtime_secs: f64,
}

fn write_stats<T: Serialize>(output_dir: &Utf8Path, stats: &T) {
    let filename = output_dir.join(RUN_STATS_FILENAME);
    let file = unwrap!(
        File::create(&filename),
        "Unable to create run stats json file: '{}'",
        filename
    );
    unwrap!(
        serde_json::to_writer_pretty(&file, stats),
        "Unable to write run stats json file: '{}'",
        filename
    );
}

pub fn write_assemble_run_stats(output_dir: &Utf8Path, stats: &AssembleRunStats) {
    info!(
        "Region {} assembly status: {}",
        stats.region_label, stats.assembly_status
    );
    info!(
        "Realigned consensus records: {}",
        stats.realigned_record_count.separate_with_commas()
    );
    write_stats(output_dir, stats);
}

pub fn write_genotype_run_stats(output_dir: &Utf8Path, stats: &GenotypeRunStats) {
    info!(
        "Remapped {} primary contigs ({} skipped without local assemblies)",
        stats.remapped_primary_contig_count, stats.skipped_primary_contig_count
    );
    info!(
        "Merged sample-level record count: {}",
        stats.merged_record_count.separate_with_commas()
    );
    write_stats(output_dir, stats);
}
