mod alt_contig_table;
mod assemble;
mod assembly;
mod bam_utils;
mod candidate_table;
mod chrom_list;
mod cli;
mod exec_utils;
mod fasta_utils;
mod genotype;
mod globals;
mod logger;
mod os_utils;
mod polish;
mod postalt;
mod read_extract;
mod realign;
mod run_log;
mod run_stats;
mod stage;
mod utils;

use std::{error, process};

use hhmmss::Hhmmss;
use log::info;

use crate::assemble::run_assemble;
use crate::cli::Commands;
use crate::genotype::run_genotype;
use crate::globals::{PROGRAM_NAME, PROGRAM_VERSION};
use crate::logger::setup_output_dir_and_logger;

/// Run system configuration steps prior to starting any other program logic
///
fn system_configuration_prelude() {
    os_utils::attempt_max_open_file_limit();
}

fn run(settings: &cli::Settings) -> Result<(), Box<dyn error::Error>> {
    info!("Starting {PROGRAM_NAME} {PROGRAM_VERSION}");
    info!(
        "cmdline: {}",
        std::env::args().collect::<Vec<_>>().join(" ")
    );
    info!("Running on {} threads", settings.shared.thread_count);

    rayon::ThreadPoolBuilder::new()
        .num_threads(settings.shared.thread_count)
        .build_global()?;

    let start = std::time::Instant::now();

    match &settings.command {
        Commands::Assemble(x) => {
            run_assemble(&settings.shared, x)?;
        }
        Commands::Genotype(x) => {
            run_genotype(&settings.shared, x)?;
        }
    }

    info!(
        "{PROGRAM_NAME} completed. Total Runtime: {}",
        start.elapsed().hhmmssxxx()
    );
    Ok(())
}

fn main() {
    system_configuration_prelude();

    let settings = cli::validate_and_fix_settings(cli::parse_settings());

    // Setup logger, including creation of the output directory for the log file:
    setup_output_dir_and_logger(
        settings.get_output_dir(),
        settings.shared.clobber,
        settings.shared.debug,
    );

    if let Err(err) = run(&settings) {
        eprintln!("{err}");
        process::exit(2);
    }
}
