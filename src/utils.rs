use std::fs::File;
use std::io::{BufRead, BufReader};

use camino::Utf8Path;
use flate2::read::MultiGzDecoder;
use simple_error::{SimpleResult, bail};

/// Open a text file for buffered line reading, transparently handling gzip compression
///
/// Compression is detected from the `.gz` filename extension, matching the convention of the
/// upstream tools that produce these tables.
///
pub fn open_text_reader(filename: &Utf8Path) -> SimpleResult<Box<dyn BufRead>> {
    let file = match File::open(filename) {
        Ok(x) => x,
        Err(e) => {
            bail!("Can't open file '{filename}': {e}");
        }
    };
    let reader: Box<dyn BufRead> = if filename.extension() == Some("gz") {
        Box::new(BufReader::new(MultiGzDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };
    Ok(reader)
}

/// Copy `src` to `dst`, converting errors into a labeled message
///
pub fn copy_file(src: &Utf8Path, dst: &Utf8Path, label: &str) -> SimpleResult<()> {
    if let Err(e) = std::fs::copy(src, dst) {
        bail!("Can't copy {label} file from '{src}' to '{dst}': {e}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_text_reader_plain() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(tmp_dir.path()).unwrap();
        let filename = dir.join("table.tsv");
        std::fs::write(&filename, b"a\tb\nc\td\n").unwrap();

        let reader = open_text_reader(&filename).unwrap();
        let lines = reader.lines().collect::<Result<Vec<_>, _>>().unwrap();
        assert_eq!(lines, vec!["a\tb", "c\td"]);
    }

    #[test]
    fn test_open_text_reader_missing_file() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(tmp_dir.path()).unwrap();
        assert!(open_text_reader(&dir.join("absent.tsv")).is_err());
    }
}
