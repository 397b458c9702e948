//! Alignment-record utilities for the pipeline's record-level transforms
//!
//! Container-level operations (view/sort/merge/index) are delegated to the external
//! alignment toolkit; the record-level filters and header synthesis used between those
//! steps are handled in-process here.
//!

use camino::Utf8Path;
use rust_htslib::bam::{self, Read};
use simple_error::{SimpleResult, bail};

use crate::chrom_list::ChromList;
use crate::globals::{PROGRAM_NAME, PROGRAM_VERSION};

#[derive(Clone, Copy, Default)]
pub struct MapqFilterStats {
    pub total_record_count: usize,
    pub kept_record_count: usize,
}

/// Create the header for alignment files written directly by this program
///
/// This is a simple header containing just the contig info, and the garfish command line
/// as a "PG" entry.
///
pub fn get_alignment_output_header(chrom_list: &ChromList) -> bam::header::Header {
    let mut new_header = bam::header::Header::new();

    let mut hd_record = bam::header::HeaderRecord::new(b"HD");
    hd_record.push_tag(b"VN", "1.6");
    hd_record.push_tag(b"SO", "unsorted");
    new_header.push_record(&hd_record);

    for chrom_info in chrom_list.data.iter() {
        let mut sq_record = bam::header::HeaderRecord::new(b"SQ");
        sq_record.push_tag(b"SN", &chrom_info.label);
        sq_record.push_tag(b"LN", chrom_info.length);
        new_header.push_record(&sq_record);
    }

    let cmdline = std::env::args().collect::<Vec<_>>().join(" ");
    let mut pg_record = bam::header::HeaderRecord::new(b"PG");
    pg_record.push_tag(b"PN", PROGRAM_NAME);
    pg_record.push_tag(b"ID", format!("{PROGRAM_NAME}-{PROGRAM_VERSION}"));
    pg_record.push_tag(b"VN", PROGRAM_VERSION);
    pg_record.push_tag(b"CL", &cmdline);
    new_header.push_record(&pg_record);

    new_header
}

/// Copy alignment records at or above the mapping-quality threshold
///
/// Input format (SAM/BAM) is auto-detected; output is BAM with the input header carried
/// through.
///
pub fn filter_alignments_by_mapq(
    input_filename: &Utf8Path,
    output_filename: &Utf8Path,
    min_mapq: u8,
) -> SimpleResult<MapqFilterStats> {
    let mut reader = open_alignment_reader(input_filename)?;
    let header = bam::Header::from_template(reader.header());
    let mut writer =
        match bam::Writer::from_path(output_filename, &header, bam::Format::Bam) {
            Ok(x) => x,
            Err(e) => {
                bail!("Can't create alignment file '{output_filename}': {e}");
            }
        };

    let mut stats = MapqFilterStats::default();
    for record in reader.records() {
        let record = match record {
            Ok(x) => x,
            Err(e) => {
                bail!("Can't read alignment record from '{input_filename}': {e}");
            }
        };
        stats.total_record_count += 1;
        if record.mapq() < min_mapq {
            continue;
        }
        if let Err(e) = writer.write(&record) {
            bail!("Can't write alignment record to '{output_filename}': {e}");
        }
        stats.kept_record_count += 1;
    }
    Ok(stats)
}

/// Count the alignment records in a SAM/BAM file
///
pub fn count_alignment_records(filename: &Utf8Path) -> SimpleResult<usize> {
    let mut reader = open_alignment_reader(filename)?;
    let mut count = 0;
    for record in reader.records() {
        if let Err(e) = record {
            bail!("Can't read alignment record from '{filename}': {e}");
        }
        count += 1;
    }
    Ok(count)
}

pub fn open_alignment_reader(filename: &Utf8Path) -> SimpleResult<bam::Reader> {
    match bam::Reader::from_path(filename) {
        Ok(x) => Ok(x),
        Err(e) => {
            bail!("Can't open alignment file '{filename}': {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chrom_list::ChromInfo;

    fn test_chrom_list() -> ChromList {
        let mut chrom_list = ChromList::default();
        for (label, length) in [("chr1", 10000000u64), ("chr2", 5000000u64)] {
            chrom_list
                .label_to_index
                .insert(label.to_string(), chrom_list.data.len());
            chrom_list.data.push(ChromInfo {
                label: label.to_string(),
                length,
            });
        }
        chrom_list
    }

    #[test]
    fn test_alignment_output_header_content() {
        let header = get_alignment_output_header(&test_chrom_list());
        let text = String::from_utf8(header.to_bytes()).unwrap();
        assert!(text.contains("@SQ\tSN:chr1\tLN:10000000"));
        assert!(text.contains("@SQ\tSN:chr2\tLN:5000000"));
        assert!(text.contains(&format!("PN:{PROGRAM_NAME}")));
    }

    #[test]
    fn test_mapq_filter_on_sam_input() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(tmp_dir.path()).unwrap();

        let input_filename = dir.join("input.sam");
        std::fs::write(
            &input_filename,
            b"@HD\tVN:1.6\tSO:unsorted\n\
              @SQ\tSN:chr1\tLN:10000000\n\
              read1\t0\tchr1\t100\t60\t4M\t*\t0\t0\tACGT\tFFFF\n\
              read2\t0\tchr1\t200\t10\t4M\t*\t0\t0\tACGT\tFFFF\n\
              read3\t0\tchr1\t300\t30\t4M\t*\t0\t0\tACGT\tFFFF\n",
        )
        .unwrap();

        let output_filename = dir.join("filtered.bam");
        let stats = filter_alignments_by_mapq(&input_filename, &output_filename, 20).unwrap();
        assert_eq!(stats.total_record_count, 3);
        assert_eq!(stats.kept_record_count, 2);
        assert_eq!(count_alignment_records(&output_filename).unwrap(), 2);

        let mut reader = open_alignment_reader(&output_filename).unwrap();
        let mapqs = reader
            .records()
            .map(|x| x.unwrap().mapq())
            .collect::<Vec<_>>();
        assert_eq!(mapqs, vec![60, 30]);
    }
}
