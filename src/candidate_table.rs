//! Candidate region and group coordinate tables
//!
//! Candidate tables are tab-separated with a header row, indexed by an ID column, with
//! chromosome, 0-based start, and end columns. A group row has the same shape as a region
//! row but denotes a batch of regions sharing one reads cache.
//!

use std::collections::HashMap;
use std::io::BufRead;

use camino::Utf8Path;
use simple_error::{SimpleResult, bail};

use crate::chrom_list::ChromList;
use crate::utils::open_text_reader;

/// One row of a candidate coordinate table
///
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandidateRegion {
    pub id: String,
    pub chrom: String,

    /// 0-based region start, following the input table convention
    pub start: i64,
    pub end: i64,
}

impl CandidateRegion {
    /// Region in 'samtools' format (e.g. chr20:100-200)
    ///
    /// The stored 0-based start is converted to the 1-based convention here.
    ///
    pub fn to_region_str(&self) -> String {
        format!("{}:{}-{}", self.chrom, self.start + 1, self.end)
    }

    /// Filesystem-safe region label (e.g. chr20-99-200)
    ///
    pub fn label(&self) -> String {
        format!("{}-{}-{}", self.chrom, self.start, self.end)
    }

    /// Expand the region by `flank` on each side, clipped to the chromosome bounds
    ///
    pub fn expanded(&self, chrom_list: &ChromList, flank: i64) -> SimpleResult<CandidateRegion> {
        let chrom_length = match chrom_list.chrom_length(&self.chrom) {
            Some(x) => x as i64,
            None => {
                bail!(
                    "Candidate region '{}' chromosome '{}' not found in the reference",
                    self.id,
                    self.chrom
                );
            }
        };
        Ok(CandidateRegion {
            id: self.id.clone(),
            chrom: self.chrom.clone(),
            start: std::cmp::max(self.start - flank, 0),
            end: std::cmp::min(self.end + flank, chrom_length),
        })
    }
}

/// Convert a filesystem-safe region label to 'samtools' region format
///
/// Only the first hyphen is rewritten, e.g. chr20-99-200 -> chr20:99-200.
///
#[allow(dead_code)]
pub fn region_label_to_samtools_str(label: &str) -> String {
    label.replacen('-', ":", 1)
}

/// Split a `chrom-start-end` region label into its parts
///
pub fn parse_region_label(label: &str) -> SimpleResult<(String, i64, i64)> {
    let mut fields = label.splitn(3, '-');
    let chrom = match fields.next() {
        Some(x) if !x.is_empty() => x.to_string(),
        _ => {
            bail!("Can't parse region label '{label}', expected chrom-start-end");
        }
    };
    let start = match fields.next().map(|x| x.parse::<i64>()) {
        Some(Ok(x)) => x,
        _ => {
            bail!("Can't parse region label '{label}', expected chrom-start-end");
        }
    };
    let end = match fields.next().map(|x| x.parse::<i64>()) {
        Some(Ok(x)) => x,
        _ => {
            bail!("Can't parse region label '{label}', expected chrom-start-end");
        }
    };
    Ok((chrom, start, end))
}

/// In-memory copy of one candidate coordinate table, indexed by ID
///
pub struct CandidateTable {
    table_filename: String,
    rows: HashMap<String, CandidateRegion>,
}

impl CandidateTable {
    /// Read a candidate table, using `id_column` as the index column name
    ///
    pub fn from_tsv(table_filename: &Utf8Path, id_column: &str) -> SimpleResult<Self> {
        let reader = open_text_reader(table_filename)?;
        let mut lines = reader.lines();

        let header = match lines.next() {
            Some(Ok(x)) => x,
            _ => {
                bail!("Can't read header line from candidate table '{table_filename}'");
            }
        };
        let column_index = get_column_index(&header, id_column, table_filename)?;
        let chrom_index = get_column_index(&header, "chrom", table_filename)?;
        let start_index = get_column_index(&header, "start", table_filename)?;
        let end_index = get_column_index(&header, "end", table_filename)?;

        let mut rows = HashMap::new();
        for (line_index, line) in lines.enumerate() {
            let line = match line {
                Ok(x) => x,
                Err(e) => {
                    bail!("Can't read candidate table '{table_filename}': {e}");
                }
            };
            if line.is_empty() {
                continue;
            }
            let fields = line.split('\t').collect::<Vec<_>>();
            let line_number = line_index + 2;
            let max_index = [column_index, chrom_index, start_index, end_index]
                .into_iter()
                .max()
                .unwrap();
            if fields.len() <= max_index {
                bail!("Truncated line {line_number} in candidate table '{table_filename}'");
            }
            let start = match fields[start_index].parse::<i64>() {
                Ok(x) => x,
                Err(_) => {
                    bail!(
                        "Unparsable start value on line {line_number} of candidate table '{table_filename}'"
                    );
                }
            };
            let end = match fields[end_index].parse::<i64>() {
                Ok(x) => x,
                Err(_) => {
                    bail!(
                        "Unparsable end value on line {line_number} of candidate table '{table_filename}'"
                    );
                }
            };

            let row = CandidateRegion {
                id: fields[column_index].to_string(),
                chrom: fields[chrom_index].to_string(),
                start,
                end,
            };
            if row.end <= row.start {
                bail!(
                    "Invalid coordinate range on line {line_number} of candidate table '{table_filename}'"
                );
            }
            if rows.insert(row.id.clone(), row).is_some() {
                bail!(
                    "Duplicated {id_column} ID on line {line_number} of candidate table '{table_filename}'"
                );
            }
        }
        Ok(Self {
            table_filename: table_filename.to_string(),
            rows,
        })
    }

    /// Look up a row by ID
    ///
    /// A missing ID is a configuration error, not a transient fault, so there is no retry
    /// or fallback here.
    ///
    pub fn resolve(&self, id: &str) -> SimpleResult<&CandidateRegion> {
        match self.rows.get(id) {
            Some(x) => Ok(x),
            None => {
                bail!(
                    "Can't find ID '{id}' in candidate table '{}'",
                    self.table_filename
                );
            }
        }
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

fn get_column_index(header: &str, column: &str, table_filename: &Utf8Path) -> SimpleResult<usize> {
    match header.split('\t').position(|x| x == column) {
        Some(x) => Ok(x),
        None => {
            bail!("Can't find column '{column}' in header of candidate table '{table_filename}'");
        }
    }
}
