//! Alt-contig info table
//!
//! The table maps each contig in the augmented reference to its length, a primary flag,
//! and (for alt contigs) the primary contig the local assembly was placed on. Alt contig
//! names use the filesystem-safe region label encoding, so the placement interval can be
//! recovered from the name itself.
//!

use std::collections::HashMap;
use std::io::BufRead;

use camino::Utf8Path;
use itertools::Itertools;
use simple_error::{SimpleResult, bail};

use crate::candidate_table::parse_region_label;
use crate::utils::open_text_reader;

const CONTIG_COLUMN: &str = "contig";
const LENGTH_COLUMN: &str = "length";
const PRIMARY_COLUMN: &str = "primary";
const PARENT_COLUMN: &str = "parent";

/// Value used in the parent column for rows with no parent (ie. primary contigs)
const NO_PARENT: &str = ".";

#[derive(Clone, Debug)]
pub struct AltContigInfo {
    pub name: String,
    pub length: u64,
    pub is_primary: bool,

    /// Parent primary contig name, None for primary contigs
    pub parent: Option<String>,
}

/// In-memory copy of the alt-contig info table
///
pub struct AltContigTable {
    contigs: Vec<AltContigInfo>,
    name_to_index: HashMap<String, usize>,
}

impl AltContigTable {
    pub fn from_tsv(table_filename: &Utf8Path) -> SimpleResult<Self> {
        let reader = open_text_reader(table_filename)?;
        let mut lines = reader.lines();

        let header = match lines.next() {
            Some(Ok(x)) => x,
            _ => {
                bail!("Can't read header line from alt-contig table '{table_filename}'");
            }
        };
        let header_fields = header.split('\t').collect::<Vec<_>>();
        let column_index = |column: &str| -> SimpleResult<usize> {
            match header_fields.iter().position(|x| *x == column) {
                Some(x) => Ok(x),
                None => {
                    bail!(
                        "Can't find column '{column}' in header of alt-contig table '{table_filename}'"
                    );
                }
            }
        };
        let contig_index = column_index(CONTIG_COLUMN)?;
        let length_index = column_index(LENGTH_COLUMN)?;
        let primary_index = column_index(PRIMARY_COLUMN)?;
        let parent_index = column_index(PARENT_COLUMN)?;

        let mut contigs = Vec::new();
        let mut name_to_index = HashMap::new();
        for (line_index, line) in lines.enumerate() {
            let line = match line {
                Ok(x) => x,
                Err(e) => {
                    bail!("Can't read alt-contig table '{table_filename}': {e}");
                }
            };
            if line.is_empty() {
                continue;
            }
            let line_number = line_index + 2;
            let fields = line.split('\t').collect::<Vec<_>>();
            let max_index = [contig_index, length_index, primary_index, parent_index]
                .into_iter()
                .max()
                .unwrap();
            if fields.len() <= max_index {
                bail!("Truncated line {line_number} in alt-contig table '{table_filename}'");
            }

            let name = fields[contig_index].to_string();
            let length = match fields[length_index].parse::<u64>() {
                Ok(x) => x,
                Err(_) => {
                    bail!(
                        "Unparsable length value on line {line_number} of alt-contig table '{table_filename}'"
                    );
                }
            };
            let is_primary = match fields[primary_index] {
                "1" => true,
                "0" => false,
                other => {
                    bail!(
                        "Unexpected primary flag value '{other}' on line {line_number} of alt-contig table '{table_filename}'"
                    );
                }
            };
            let parent = match fields[parent_index] {
                NO_PARENT => None,
                other => Some(other.to_string()),
            };
            if is_primary && parent.is_some() {
                bail!(
                    "Primary contig '{name}' unexpectedly lists a parent contig in alt-contig table '{table_filename}'"
                );
            }

            if name_to_index
                .insert(name.clone(), contigs.len())
                .is_some()
            {
                bail!(
                    "Duplicated contig name '{name}' on line {line_number} of alt-contig table '{table_filename}'"
                );
            }
            contigs.push(AltContigInfo {
                name,
                length,
                is_primary,
                parent,
            });
        }

        let table = Self {
            contigs,
            name_to_index,
        };
        table.validate_parent_links(table_filename)?;
        Ok(table)
    }

    /// Every alt contig must reference exactly one parent that is itself flagged primary
    ///
    fn validate_parent_links(&self, table_filename: &Utf8Path) -> SimpleResult<()> {
        for contig in self.contigs.iter().filter(|x| !x.is_primary) {
            let parent_name = match &contig.parent {
                Some(x) => x,
                None => {
                    bail!(
                        "Alt contig '{}' has no parent primary contig in alt-contig table '{table_filename}'",
                        contig.name
                    );
                }
            };
            match self.name_to_index.get(parent_name) {
                Some(&parent_index) if self.contigs[parent_index].is_primary => {}
                Some(_) => {
                    bail!(
                        "Alt contig '{}' parent '{parent_name}' is not flagged primary in alt-contig table '{table_filename}'",
                        contig.name
                    );
                }
                None => {
                    bail!(
                        "Alt contig '{}' parent '{parent_name}' not found in alt-contig table '{table_filename}'",
                        contig.name
                    );
                }
            }
        }
        Ok(())
    }

    /// Sorted names of all primary contigs
    ///
    pub fn primary_contig_names(&self) -> Vec<&str> {
        self.contigs
            .iter()
            .filter(|x| x.is_primary)
            .map(|x| x.name.as_str())
            .sorted()
            .collect()
    }

    /// Alt contigs placed on the given primary contig
    ///
    pub fn alts_for_primary(&self, primary_contig: &str) -> Vec<&AltContigInfo> {
        self.contigs
            .iter()
            .filter(|x| x.parent.as_deref() == Some(primary_contig))
            .collect()
    }

    /// Write the rows scoped to one primary contig as a derived table, returning the row count
    ///
    pub fn write_scoped_table(
        &self,
        primary_contig: &str,
        table_filename: &Utf8Path,
    ) -> SimpleResult<usize> {
        use std::io::Write;

        let mut file = match std::fs::File::create(table_filename) {
            Ok(x) => x,
            Err(e) => {
                bail!("Can't create scoped alt-contig table '{table_filename}': {e}");
            }
        };
        let alts = self.alts_for_primary(primary_contig);
        let mut content = format!(
            "{CONTIG_COLUMN}\t{LENGTH_COLUMN}\t{PRIMARY_COLUMN}\t{PARENT_COLUMN}\n"
        );
        for alt in alts.iter() {
            content.push_str(&format!(
                "{}\t{}\t0\t{}\n",
                alt.name,
                alt.length,
                alt.parent.as_deref().unwrap_or(NO_PARENT)
            ));
        }
        if let Err(e) = file.write_all(content.as_bytes()) {
            bail!("Can't write scoped alt-contig table '{table_filename}': {e}");
        }
        Ok(alts.len())
    }

    /// Write the placement intervals of one primary contig's alt contigs in BED format
    ///
    /// The placement interval is recovered from each alt contig's region-label name, and is
    /// required to sit on the parent primary contig.
    ///
    pub fn write_scoped_bed(
        &self,
        primary_contig: &str,
        bed_filename: &Utf8Path,
    ) -> SimpleResult<usize> {
        use std::io::Write;

        let mut content = String::new();
        let alts = self.alts_for_primary(primary_contig);
        for alt in alts.iter() {
            let (chrom, start, end) = parse_region_label(&alt.name)?;
            if chrom != primary_contig {
                bail!(
                    "Alt contig '{}' is placed on '{chrom}' but lists parent '{primary_contig}'",
                    alt.name
                );
            }
            content.push_str(&format!("{chrom}\t{start}\t{end}\n"));
        }

        let mut file = match std::fs::File::create(bed_filename) {
            Ok(x) => x,
            Err(e) => {
                bail!("Can't create scoped interval file '{bed_filename}': {e}");
            }
        };
        if let Err(e) = file.write_all(content.as_bytes()) {
            bail!("Can't write scoped interval file '{bed_filename}': {e}");
        }
        Ok(alts.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_alt_table(dir: &Utf8Path, content: &[u8]) -> camino::Utf8PathBuf {
        let table_filename = dir.join("alt_info.tsv");
        std::fs::write(&table_filename, content).unwrap();
        table_filename
    }

    const GOOD_TABLE: &[u8] = b"contig\tlength\tprimary\tparent\n\
        chr1\t248956422\t1\t.\n\
        chr2\t242193529\t1\t.\n\
        chr1-1000-2000\t1100\t0\tchr1\n\
        chr1-5000-9000\t4200\t0\tchr1\n\
        chr2-100-900\t850\t0\tchr2\n";

    #[test]
    fn test_parse_and_primary_list() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(tmp_dir.path()).unwrap();
        let table = AltContigTable::from_tsv(&write_alt_table(dir, GOOD_TABLE)).unwrap();

        assert_eq!(table.primary_contig_names(), vec!["chr1", "chr2"]);
        let chr1_alts = table.alts_for_primary("chr1");
        assert_eq!(chr1_alts.len(), 2);
        assert_eq!(chr1_alts[0].name, "chr1-1000-2000");
        assert_eq!(chr1_alts[0].length, 1100);
    }

    #[test]
    fn test_parent_must_be_primary() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(tmp_dir.path()).unwrap();
        let bad = b"contig\tlength\tprimary\tparent\n\
            chr1\t248956422\t1\t.\n\
            chr1-1000-2000\t1100\t0\tchr1\n\
            chr1-5000-9000\t4200\t0\tchr1-1000-2000\n";
        let err = AltContigTable::from_tsv(&write_alt_table(dir, bad)).unwrap_err();
        assert!(err.to_string().contains("not flagged primary"));
    }

    #[test]
    fn test_missing_parent_fails() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(tmp_dir.path()).unwrap();
        let bad = b"contig\tlength\tprimary\tparent\n\
            chr1\t248956422\t1\t.\n\
            chr1-1000-2000\t1100\t0\tchr9\n";
        assert!(AltContigTable::from_tsv(&write_alt_table(dir, bad)).is_err());
    }

    #[test]
    fn test_scoped_table_and_bed() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(tmp_dir.path()).unwrap();
        let table = AltContigTable::from_tsv(&write_alt_table(dir, GOOD_TABLE)).unwrap();

        let scoped_table = dir.join("chr1.alt_info.tsv");
        assert_eq!(table.write_scoped_table("chr1", &scoped_table).unwrap(), 2);
        let content = std::fs::read_to_string(&scoped_table).unwrap();
        assert_eq!(
            content,
            "contig\tlength\tprimary\tparent\n\
             chr1-1000-2000\t1100\t0\tchr1\n\
             chr1-5000-9000\t4200\t0\tchr1\n"
        );

        let scoped_bed = dir.join("chr1.bed");
        assert_eq!(table.write_scoped_bed("chr1", &scoped_bed).unwrap(), 2);
        let content = std::fs::read_to_string(&scoped_bed).unwrap();
        assert_eq!(content, "chr1\t1000\t2000\nchr1\t5000\t9000\n");

        // A primary with no alt contigs produces empty derived files
        let empty_bed = dir.join("chrM.bed");
        assert_eq!(table.write_scoped_bed("chrM", &empty_bed).unwrap(), 0);
    }
}
