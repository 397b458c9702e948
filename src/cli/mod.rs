mod assemble;
pub mod defaults;
mod genotype;
mod shared;
mod utils;

use camino::Utf8Path;
use chrono::Datelike;
use clap::{Parser, Subcommand};
use simple_error::{SimpleResult, bail};

use self::assemble::validate_and_fix_assemble_settings;
pub use self::assemble::{AssembleSettings, write_assemble_settings};
use self::genotype::validate_and_fix_genotype_settings;
pub use self::genotype::{GenotypeSettings, write_genotype_settings};
use self::shared::validate_and_fix_shared_settings;
pub use self::shared::SharedSettings;
pub use self::utils::split_extra_args;

#[derive(Subcommand)]
pub enum Commands {
    /// Assemble and polish one SV candidate region, then realign the consensus to the reference
    Assemble(AssembleSettings),

    /// Remap one sample's reads onto its local-assembly alt contigs for genotyping
    Genotype(GenotypeSettings),
}

#[derive(Parser)]
#[command(
    author,
    version,
    about,
    after_help = format!("Copyright (C) 2004-{}     Pacific Biosciences of California, Inc.
This program comes with ABSOLUTELY NO WARRANTY; it is intended for
Research Use Only and not for use in diagnostic procedures.", chrono::Utc::now().year()),
    help_template = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}"
)]
#[clap(propagate_version = true, rename_all = "kebab_case")]
pub struct Settings {
    #[command(flatten)]
    pub shared: SharedSettings,

    #[command(subcommand)]
    pub command: Commands,
}

impl Settings {
    pub fn get_output_dir(&self) -> &Utf8Path {
        match &self.command {
            Commands::Assemble(x) => &x.output_dir,
            Commands::Genotype(x) => &x.output_dir,
        }
    }
}

/// Checks if a directory does not exist
///
pub fn check_novel_dirname(dirname: &Utf8Path, label: &str) -> SimpleResult<()> {
    if dirname.exists() {
        bail!("{} already exists: \"{}\"", label, dirname);
    }
    Ok(())
}

/// Validate settings and update parameters that can't be processed by clap
///
pub fn validate_and_fix_settings_impl(mut settings: Settings) -> SimpleResult<Settings> {
    settings.shared = validate_and_fix_shared_settings(settings.shared)?;

    settings.command = match settings.command {
        Commands::Assemble(x) => {
            let x = validate_and_fix_assemble_settings(x)?;
            Commands::Assemble(x)
        }
        Commands::Genotype(x) => {
            let x = validate_and_fix_genotype_settings(x)?;
            Commands::Genotype(x)
        }
    };

    Ok(settings)
}

/// Validate settings and update to parameters that can't be processed automatically by clap.
///
pub fn validate_and_fix_settings(settings: Settings) -> Settings {
    match validate_and_fix_settings_impl(settings) {
        Ok(x) => x,
        Err(msg) => {
            eprintln!("Invalid command-line setting: {}", msg);
            std::process::exit(exitcode::USAGE);
        }
    }
}

pub fn parse_settings() -> Settings {
    Settings::parse()
}
