//! Input files: tab-separated rows, optionally gzipped.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;

pub type RowReader = csv::Reader<Box<dyn Read + Send>>;

fn is_gzip(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("gz"))
}

/// Open an input file as a row reader.
///
/// Fields are never quoted and rows may have any column count: the engine
/// rejects malformed rows itself so they get logged with their content.
pub fn open_rows(path: &Path) -> Result<RowReader> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let input: Box<dyn Read + Send> = if is_gzip(path) {
        Box::new(MultiGzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };

    Ok(csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .comment(Some(b'#'))
        .from_reader(input))
}
