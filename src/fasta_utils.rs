//! Fasta record utilities for the assembly pipeline outputs
//!

use std::io::BufWriter;

use bio::io::fasta;
use camino::Utf8Path;
use simple_error::{SimpleResult, bail};

/// Write the single-record placeholder sequence used when a region has no assembly
///
/// The record header is the region label and the sequence is the literal base `N`, so
/// downstream stages always receive a well-formed non-empty fasta file.
///
pub fn write_placeholder_fasta(output_filename: &Utf8Path, region_label: &str) -> SimpleResult<()> {
    let mut writer = fasta::Writer::new(BufWriter::new(create_file(output_filename)?));
    if let Err(e) = writer.write(region_label, None, b"N") {
        bail!("Can't write placeholder record to '{output_filename}': {e}");
    }
    Ok(())
}

/// Copy a fasta file while prefixing every record header with `prefix`
///
/// This establishes the `<region_label>|<sequence_id>` naming convention downstream
/// stages key on. Returns the record count.
///
pub fn prefix_fasta_headers(
    input_filename: &Utf8Path,
    output_filename: &Utf8Path,
    prefix: &str,
) -> SimpleResult<usize> {
    let reader = open_reader(input_filename)?;
    let mut writer = fasta::Writer::new(BufWriter::new(create_file(output_filename)?));

    let mut record_count = 0;
    for record in reader.records() {
        let record = match record {
            Ok(x) => x,
            Err(e) => {
                bail!("Can't read fasta record from '{input_filename}': {e}");
            }
        };
        let id = format!("{prefix}|{}", record.id());
        if let Err(e) = writer.write(&id, record.desc(), record.seq()) {
            bail!("Can't write fasta record to '{output_filename}': {e}");
        }
        record_count += 1;
    }
    Ok(record_count)
}

/// Copy a single-record fasta file under a new record id
///
/// Used to relabel an extracted reference window with its filesystem-safe window token.
///
pub fn relabel_single_record_fasta(
    input_filename: &Utf8Path,
    output_filename: &Utf8Path,
    new_id: &str,
) -> SimpleResult<()> {
    let reader = open_reader(input_filename)?;
    let mut records = reader.records();
    let record = match records.next() {
        Some(Ok(x)) => x,
        Some(Err(e)) => {
            bail!("Can't read fasta record from '{input_filename}': {e}");
        }
        None => {
            bail!("No fasta records found in '{input_filename}'");
        }
    };
    if records.next().is_some() {
        bail!("Expected exactly one fasta record in '{input_filename}'");
    }

    let mut writer = fasta::Writer::new(BufWriter::new(create_file(output_filename)?));
    if let Err(e) = writer.write(new_id, None, record.seq()) {
        bail!("Can't write fasta record to '{output_filename}': {e}");
    }
    Ok(())
}

fn open_reader(
    filename: &Utf8Path,
) -> SimpleResult<fasta::Reader<std::io::BufReader<std::fs::File>>> {
    match fasta::Reader::from_file(filename) {
        Ok(x) => Ok(x),
        Err(e) => {
            bail!("Can't open fasta file '{filename}': {e}");
        }
    }
}

fn create_file(filename: &Utf8Path) -> SimpleResult<std::fs::File> {
    match std::fs::File::create(filename) {
        Ok(x) => Ok(x),
        Err(e) => {
            bail!("Can't create fasta file '{filename}': {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_placeholder_fasta() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(tmp_dir.path()).unwrap();
        let output_filename = dir.join("assembly.fasta");

        write_placeholder_fasta(&output_filename, "chr1-1000-2000").unwrap();
        let content = std::fs::read_to_string(&output_filename).unwrap();
        assert_eq!(content, ">chr1-1000-2000\nN\n");
    }

    #[test]
    fn test_prefix_fasta_headers() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(tmp_dir.path()).unwrap();
        let input_filename = dir.join("consensus_raw.fasta");
        let output_filename = dir.join("consensus.fasta");
        std::fs::write(&input_filename, b">tig00000001\nACGT\n>tig00000002\nTTAA\n").unwrap();

        let count =
            prefix_fasta_headers(&input_filename, &output_filename, "chr1-1000-2000").unwrap();
        assert_eq!(count, 2);
        let content = std::fs::read_to_string(&output_filename).unwrap();
        assert_eq!(
            content,
            ">chr1-1000-2000|tig00000001\nACGT\n>chr1-1000-2000|tig00000002\nTTAA\n"
        );
    }

    #[test]
    fn test_relabel_single_record_fasta() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(tmp_dir.path()).unwrap();
        let input_filename = dir.join("window_raw.fasta");
        let output_filename = dir.join("window.fasta");
        std::fs::write(&input_filename, b">chr1:1001-2000\nACGT\n").unwrap();

        relabel_single_record_fasta(&input_filename, &output_filename, "chr1-1000-2000").unwrap();
        let content = std::fs::read_to_string(&output_filename).unwrap();
        assert_eq!(content, ">chr1-1000-2000\nACGT\n");

        let multi = dir.join("multi.fasta");
        std::fs::write(&multi, b">a\nAC\n>b\nGT\n").unwrap();
        assert!(relabel_single_record_fasta(&multi, &output_filename, "x").is_err());
    }
}
