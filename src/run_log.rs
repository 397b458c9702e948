//! Append-only run-level status log
//!
//! The status log is an audit trail shared by all jobs in a run, recording the terminal
//! state of each region's assembly and polishing steps as tab-separated
//! `(region_label, status_token)` lines. It is not read back as control flow.
//!

use std::fs::OpenOptions;
use std::io::Write;

use camino::Utf8Path;
use simple_error::{SimpleResult, bail};

/// Status tokens recorded in the run status log
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum StatusToken {
    AssemblyCrashed,
    AssemblyExists,
    UnitigAssemblyExists,
    NoAssemblyExists,
    ArrowFailed,
}

/// Append one `(label, status)` line to the run status log
///
/// The full line is issued as a single append-mode write, so concurrently running jobs
/// interleave at line granularity.
///
pub fn append_status(log_filename: &Utf8Path, label: &str, status: StatusToken) -> SimpleResult<()> {
    let mut file = match OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_filename)
    {
        Ok(x) => x,
        Err(e) => {
            bail!("Can't open run status log '{log_filename}': {e}");
        }
    };
    let line = format!("{label}\t{status}\n");
    if let Err(e) = file.write_all(line.as_bytes()) {
        bail!("Can't append to run status log '{log_filename}': {e}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_token_labels() {
        assert_eq!(StatusToken::AssemblyCrashed.to_string(), "assembly_crashed");
        assert_eq!(StatusToken::AssemblyExists.to_string(), "assembly_exists");
        assert_eq!(
            StatusToken::UnitigAssemblyExists.to_string(),
            "unitig_assembly_exists"
        );
        assert_eq!(
            StatusToken::NoAssemblyExists.to_string(),
            "no_assembly_exists"
        );
        assert_eq!(StatusToken::ArrowFailed.to_string(), "arrow_failed");
    }

    #[test]
    fn test_append_status() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(tmp_dir.path()).unwrap();
        let log_filename = dir.join("assembly.status.tsv");

        append_status(&log_filename, "chr1-1000-2000", StatusToken::AssemblyCrashed).unwrap();
        append_status(
            &log_filename,
            "chr1-1000-2000",
            StatusToken::NoAssemblyExists,
        )
        .unwrap();

        let content = std::fs::read_to_string(&log_filename).unwrap();
        assert_eq!(
            content,
            "chr1-1000-2000\tassembly_crashed\nchr1-1000-2000\tno_assembly_exists\n"
        );
    }
}
