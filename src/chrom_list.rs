//! Reference sequence dictionary utilities
//!

use std::collections::HashMap;
use std::io::BufRead;

use camino::Utf8Path;
use simple_error::{SimpleResult, bail};

use crate::utils::open_text_reader;

pub struct ChromInfo {
    pub label: String,
    pub length: u64,
}

/// Ordered chromosome names and lengths for one reference
///
/// The ordering scheme matches the source index the list was built from, so tid values
/// derived from it are stable across the run.
///
#[derive(Default)]
pub struct ChromList {
    pub data: Vec<ChromInfo>,
    pub label_to_index: HashMap<String, usize>,
}

impl ChromList {
    /// Build the chromosome list from a samtools faidx index (`.fai`) file
    ///
    pub fn from_fai_filename(fai_filename: &Utf8Path) -> SimpleResult<Self> {
        let reader = open_text_reader(fai_filename)?;
        let mut chrom_list = ChromList::default();
        for (line_index, line) in reader.lines().enumerate() {
            let line = match line {
                Ok(x) => x,
                Err(e) => {
                    bail!("Can't read fasta index '{fai_filename}': {e}");
                }
            };
            let mut fields = line.split('\t');
            let label = match fields.next() {
                Some(x) if !x.is_empty() => x,
                _ => {
                    bail!(
                        "Missing sequence name on line {} of fasta index '{fai_filename}'",
                        line_index + 1
                    );
                }
            };
            let length = match fields.next().map(|x| x.parse::<u64>()) {
                Some(Ok(x)) => x,
                _ => {
                    bail!(
                        "Missing or unparsable sequence length on line {} of fasta index '{fai_filename}'",
                        line_index + 1
                    );
                }
            };
            chrom_list.add(label, length);
        }
        if chrom_list.data.is_empty() {
            bail!("No sequences found in fasta index '{fai_filename}'");
        }
        Ok(chrom_list)
    }

    fn add(&mut self, label: &str, length: u64) {
        self.label_to_index
            .insert(label.to_string(), self.data.len());
        self.data.push(ChromInfo {
            label: label.to_string(),
            length,
        });
    }

    pub fn chrom_length(&self, label: &str) -> Option<u64> {
        self.label_to_index
            .get(label)
            .map(|&index| self.data[index].length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chrom_list_from_fai() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(tmp_dir.path()).unwrap();
        let fai_filename = dir.join("ref.fasta.fai");
        std::fs::write(
            &fai_filename,
            b"chr1\t248956422\t112\t70\t71\nchr2\t242193529\t252513167\t70\t71\n",
        )
        .unwrap();

        let chrom_list = ChromList::from_fai_filename(&fai_filename).unwrap();
        assert_eq!(chrom_list.data.len(), 2);
        assert_eq!(chrom_list.data[0].label, "chr1");
        assert_eq!(chrom_list.data[1].length, 242193529);
        assert_eq!(chrom_list.label_to_index["chr2"], 1);
        assert_eq!(chrom_list.chrom_length("chr1"), Some(248956422));
        assert_eq!(chrom_list.chrom_length("chrX"), None);
    }

    #[test]
    fn test_chrom_list_rejects_malformed_fai() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(tmp_dir.path()).unwrap();
        let fai_filename = dir.join("ref.fasta.fai");
        std::fs::write(&fai_filename, b"chr1\tnot-a-length\t112\t70\t71\n").unwrap();
        assert!(ChromList::from_fai_filename(&fai_filename).is_err());
    }
}
