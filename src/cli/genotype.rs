use camino::{Utf8Path, Utf8PathBuf};
use clap::Args;
use const_format::concatcp;
use serde::{Deserialize, Serialize};
use simple_error::{SimpleResult, bail};
use unwrap::unwrap;

use super::defaults::MIN_REMAP_MAPQ;
use super::utils::check_required_filename;
use crate::genotype::SETTINGS_FILENAME;

#[derive(Args, Default, Deserialize, Serialize)]
pub struct GenotypeSettings {
    /// Directory for all genotype command output (must not already exist)
    #[arg(long, value_name = "DIR", default_value = concatcp!(env!("CARGO_PKG_NAME"), "_genotype_output"))]
    pub output_dir: Utf8PathBuf,

    /// Sample alignment against the primary reference, in BAM format with an index
    #[arg(long = "primary-bam", value_name = "FILE")]
    pub primary_bam_filename: String,

    /// Sample alignment against the augmented (primary plus alt contig) reference, in BAM
    /// format with an index
    #[arg(long = "alt-bam", value_name = "FILE")]
    pub alt_bam_filename: String,

    /// Alt-contig info table, tab-separated with a header row
    #[arg(long = "alt-info", value_name = "FILE")]
    pub alt_info_filename: String,

    /// Minimum MAPQ for records kept after the post-alt remap
    #[arg(long = "min-mapq", default_value_t = MIN_REMAP_MAPQ)]
    pub min_remap_mapq: u8,

    /// Regex used to select the primary contigs processed by the remap fan-out
    #[arg(long = "contig-regex", value_name = "REGEX", default_value = ".*")]
    pub contig_regex: String,

    /// Post-alt remapping tool executable
    #[arg(long, value_name = "EXE", default_value = "postalt")]
    pub postalt: String,

    /// Extra arguments appended to the post-alt remapping tool command line
    #[arg(long = "postalt-opts", value_name = "ARGS")]
    pub postalt_opts: Option<String>,

    /// Alignment toolkit executable
    #[arg(long, value_name = "EXE", default_value = "samtools")]
    pub samtools: String,
}

pub fn validate_and_fix_genotype_settings(
    settings: GenotypeSettings,
) -> SimpleResult<GenotypeSettings> {
    check_required_filename(&settings.primary_bam_filename, "primary alignment")?;
    check_required_filename(&settings.alt_bam_filename, "alt alignment")?;
    check_required_filename(&settings.alt_info_filename, "alt-contig table")?;

    if let Err(e) = regex::Regex::new(&settings.contig_regex) {
        bail!("Invalid --contig-regex expression: {e}");
    }

    Ok(settings)
}

/// Write genotype settings out in json format
pub fn write_genotype_settings(output_dir: &Utf8Path, settings: &GenotypeSettings) {
    use log::info;

    let filename = output_dir.join(SETTINGS_FILENAME);

    info!("Writing genotype settings to file: '{filename}'");

    let f = unwrap!(
        std::fs::File::create(&filename),
        "Unable to create genotype settings json file: '{filename}'"
    );

    serde_json::to_writer_pretty(&f, &settings).unwrap();
}
