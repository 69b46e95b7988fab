//! CSV manifest: one clip per line, `split,class_label,clip_id,frame_count[,...]`.
//!
//! There is no header row. Columns past the fourth are ignored and blank lines
//! are skipped. Fields are not quoted, so labels and clip ids cannot contain commas.

use std::path::Path;

use thiserror::Error;
use vidseq_core::types::{Sample, SampleError, Split, SplitParseError};

pub const MANIFEST_MIN_COLUMNS: usize = 4;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest not utf-8: {0}")]
    NotUtf8(#[from] std::str::Utf8Error),
    #[error("line {line}: expected at least {} columns, found {found}", MANIFEST_MIN_COLUMNS)]
    TooFewColumns { line: usize, found: usize },
    #[error("line {line}: {source}")]
    BadSplit {
        line: usize,
        #[source]
        source: SplitParseError,
    },
    #[error("line {line}: bad frame_count {value:?}")]
    BadFrameCount { line: usize, value: String },
    #[error("line {line}: {source}")]
    InvalidSample {
        line: usize,
        #[source]
        source: SampleError,
    },
    #[error("read manifest {path} failed: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub fn read_manifest_file(path: impl AsRef<Path>) -> Result<Vec<Sample>, ManifestError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| ManifestError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_manifest_bytes(&bytes)
}

pub fn parse_manifest_bytes(bytes: &[u8]) -> Result<Vec<Sample>, ManifestError> {
    let s = std::str::from_utf8(bytes)?;

    let mut samples = Vec::new();
    for (i, raw) in s.lines().enumerate() {
        let line = i + 1;
        let row = raw.trim();
        if row.is_empty() {
            continue;
        }

        let cols: Vec<&str> = row.split(',').map(str::trim).collect();
        if cols.len() < MANIFEST_MIN_COLUMNS {
            return Err(ManifestError::TooFewColumns {
                line,
                found: cols.len(),
            });
        }

        let split: Split = cols[0]
            .parse()
            .map_err(|source| ManifestError::BadSplit { line, source })?;
        let frame_count: u64 = cols[3]
            .parse()
            .map_err(|_| ManifestError::BadFrameCount {
                line,
                value: cols[3].to_string(),
            })?;

        let sample = Sample::new(split, cols[1], cols[2], frame_count);
        sample
            .validate()
            .map_err(|source| ManifestError::InvalidSample { line, source })?;
        samples.push(sample);
    }

    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rows_and_ignores_extra_columns() {
        let csv = "train,ApplyEyeMakeup,v_ApplyEyeMakeup_g08_c01,121\n\
                   \n\
                   test,Archery,v_Archery_g01_c02,87,extra,cols\n";
        let rows = parse_manifest_bytes(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0],
            Sample::new(Split::Train, "ApplyEyeMakeup", "v_ApplyEyeMakeup_g08_c01", 121)
        );
        assert_eq!(rows[1].split, Split::Test);
        assert_eq!(rows[1].frame_count, 87);
    }

    #[test]
    fn reports_short_rows_with_line_number() {
        let err = parse_manifest_bytes(b"train,A,c1,10\ntrain,B\n").unwrap_err();
        assert!(matches!(
            err,
            ManifestError::TooFewColumns { line: 2, found: 2 }
        ));
    }

    #[test]
    fn rejects_unknown_split() {
        let err = parse_manifest_bytes(b"val,A,c1,10\n").unwrap_err();
        assert!(matches!(err, ManifestError::BadSplit { line: 1, .. }));
        assert!(err.to_string().contains("val"));
    }

    #[test]
    fn rejects_non_numeric_frame_count() {
        let err = parse_manifest_bytes(b"train,A,c1,ten\n").unwrap_err();
        assert!(matches!(err, ManifestError::BadFrameCount { line: 1, .. }));
    }

    #[test]
    fn rejects_empty_clip_id() {
        let err = parse_manifest_bytes(b"train,A,,10\n").unwrap_err();
        assert!(matches!(
            err,
            ManifestError::InvalidSample {
                line: 1,
                source: SampleError::EmptyClipId
            }
        ));
    }

    #[test]
    fn empty_input_is_empty_manifest() {
        assert!(parse_manifest_bytes(b"").unwrap().is_empty());
    }
}
