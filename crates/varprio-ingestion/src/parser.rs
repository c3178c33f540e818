//! Line-oriented VCF parsing.
//!
//! Only the fixed columns the pipeline needs are consumed:
//! CHROM(0), POS(1), REF(3), ALT(4), QUAL(5), FILTER(6). INFO and sample
//! columns are ignored. Meta lines (`##`) and the `#CHROM` header are skipped.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use varprio_common::{IngestionError, ParseModeSetting};

use crate::models::VariantRecord;

const COL_CHROM: usize = 0;
const COL_POS: usize = 1;
const COL_REF: usize = 3;
const COL_ALT: usize = 4;
const COL_QUAL: usize = 5;
const COL_FILTER: usize = 6;
const MIN_COLUMNS: usize = COL_FILTER + 1;

/// Policy for malformed data lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParseMode {
    /// First malformed line aborts the parse.
    #[default]
    Strict,
    /// Malformed lines are logged, reported and skipped.
    Lenient,
}

impl From<ParseModeSetting> for ParseMode {
    fn from(setting: ParseModeSetting) -> Self {
        match setting {
            ParseModeSetting::Strict  => ParseMode::Strict,
            ParseModeSetting::Lenient => ParseMode::Lenient,
        }
    }
}

/// A data line dropped in lenient mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedLine {
    pub line: usize,
    pub reason: String,
}

/// Result of a parse: records in input order plus any lines skipped.
#[derive(Debug, Clone, Default)]
pub struct ParseReport {
    pub records: Vec<VariantRecord>,
    pub skipped: Vec<SkippedLine>,
}

/// Parse VCF text from any buffered reader.
#[instrument(skip(reader))]
pub fn parse_vcf_reader<R: BufRead>(reader: R, mode: ParseMode) -> Result<ParseReport, IngestionError> {
    let mut report = ParseReport::default();

    for (idx, bytes) in reader.split(b'\n').enumerate() {
        let line_no = idx + 1;
        let bytes = bytes?;
        let parsed = match std::str::from_utf8(&bytes) {
            Ok(line) => {
                let line = line.trim_end_matches(['\r', '\n']);
                if line.trim().is_empty() || line.starts_with("##") || line.starts_with("#CHROM") {
                    continue;
                }
                parse_data_line(line, line_no)
            }
            Err(_) => Err(IngestionError::malformed(line_no, "invalid UTF-8")),
        };

        match parsed {
            Ok(record) => report.records.push(record),
            Err(err) => match mode {
                ParseMode::Strict => return Err(err),
                ParseMode::Lenient => {
                    warn!(line = line_no, error = %err, "Skipping malformed VCF line");
                    let reason = match err {
                        IngestionError::MalformedRecord { reason, .. } => reason,
                        other => other.to_string(),
                    };
                    report.skipped.push(SkippedLine { line: line_no, reason });
                }
            },
        }
    }

    info!(
        records = report.records.len(),
        skipped = report.skipped.len(),
        "VCF parsed"
    );
    Ok(report)
}

pub fn parse_vcf_str(text: &str, mode: ParseMode) -> Result<ParseReport, IngestionError> {
    parse_vcf_reader(text.as_bytes(), mode)
}

pub fn parse_vcf_path<P: AsRef<Path>>(path: P, mode: ParseMode) -> Result<ParseReport, IngestionError> {
    let path = path.as_ref();
    debug!(path = %path.display(), "Opening VCF");
    let file = File::open(path)?;
    parse_vcf_reader(BufReader::new(file), mode)
}

/// Parse one tab-delimited data line. `line_no` is 1-based and only used
/// for error reporting.
pub fn parse_data_line(line: &str, line_no: usize) -> Result<VariantRecord, IngestionError> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < MIN_COLUMNS {
        return Err(IngestionError::malformed(
            line_no,
            format!("expected at least {MIN_COLUMNS} tab-separated columns, found {}", fields.len()),
        ));
    }

    let pos_text = fields[COL_POS].trim();
    let pos: u64 = pos_text
        .parse()
        .map_err(|_| IngestionError::malformed(line_no, format!("non-numeric POS {pos_text:?}")))?;

    VariantRecord::new(
        fields[COL_CHROM].trim(),
        pos,
        fields[COL_REF].trim(),
        fields[COL_ALT].trim(),
        fields[COL_QUAL].trim(),
        fields[COL_FILTER].trim(),
    )
    .map_err(|reason| IngestionError::malformed(line_no, reason))
}
