//! Flat table rows and CSV export/import.
//!
//! Three table shapes share one column prefix:
//!   variant_id, chrom, pos, ref, alt, qual, filter, variant_type
//!   + clinvar_significance, clinvar_condition, gnomad_af, cadd_score, consequence, gene_symbol
//!   + priority_score, priority_tier
//!
//! Failed lookups are written as sentinels (`-1`, `api_error`, `error`,
//! `unknown`); these rows are the only place sentinels exist.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use varprio_common::Result;
use varprio_ingestion::{AnnotatedRecord, VariantRecord, VariantType};

use crate::scorer::{PriorityTier, Scored};

/// A serializable row with a fixed column order.
pub trait TableRow: Serialize + DeserializeOwned {
    const COLUMNS: &'static [&'static str];
}

const VARIANT_COLUMNS: [&str; 8] = ["variant_id", "chrom", "pos", "ref", "alt", "qual", "filter", "variant_type"];

// ── Post-ingestion ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantRow {
    pub variant_id: String,
    pub chrom: String,
    pub pos: u64,
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(rename = "alt")]
    pub alternate: String,
    pub qual: String,
    pub filter: String,
    pub variant_type: VariantType,
}

impl TableRow for VariantRow {
    const COLUMNS: &'static [&'static str] = &VARIANT_COLUMNS;
}

impl From<&VariantRecord> for VariantRow {
    fn from(v: &VariantRecord) -> Self {
        Self {
            variant_id: v.variant_id().to_string(),
            chrom: v.chrom().to_string(),
            pos: v.pos(),
            reference: v.reference().to_string(),
            alternate: v.alternate().to_string(),
            qual: v.qual().to_string(),
            filter: v.filter().to_string(),
            variant_type: v.variant_type(),
        }
    }
}

// ── Post-annotation ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedRow {
    pub variant_id: String,
    pub chrom: String,
    pub pos: u64,
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(rename = "alt")]
    pub alternate: String,
    pub qual: String,
    pub filter: String,
    pub variant_type: VariantType,
    pub clinvar_significance: String,
    pub clinvar_condition: String,
    pub gnomad_af: f64,
    pub cadd_score: f64,
    pub consequence: String,
    pub gene_symbol: String,
}

impl TableRow for AnnotatedRow {
    const COLUMNS: &'static [&'static str] = &[
        "variant_id", "chrom", "pos", "ref", "alt", "qual", "filter", "variant_type",
        "clinvar_significance", "clinvar_condition", "gnomad_af", "cadd_score", "consequence", "gene_symbol",
    ];
}

impl From<&AnnotatedRecord> for AnnotatedRow {
    fn from(r: &AnnotatedRecord) -> Self {
        let v = VariantRow::from(&r.variant);
        Self {
            variant_id: v.variant_id,
            chrom: v.chrom,
            pos: v.pos,
            reference: v.reference,
            alternate: v.alternate,
            qual: v.qual,
            filter: v.filter,
            variant_type: v.variant_type,
            clinvar_significance: r.clinvar_significance().to_string(),
            clinvar_condition: r.clinvar_condition().to_string(),
            gnomad_af: r.gnomad_af_column(),
            cadd_score: r.cadd_score_column(),
            consequence: r.consequence_term().to_string(),
            gene_symbol: r.gene_symbol().to_string(),
        }
    }
}

// ── Post-scoring ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRow {
    pub variant_id: String,
    pub chrom: String,
    pub pos: u64,
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(rename = "alt")]
    pub alternate: String,
    pub qual: String,
    pub filter: String,
    pub variant_type: VariantType,
    pub clinvar_significance: String,
    pub clinvar_condition: String,
    pub gnomad_af: f64,
    pub cadd_score: f64,
    pub consequence: String,
    pub gene_symbol: String,
    pub priority_score: u32,
    pub priority_tier: PriorityTier,
}

impl TableRow for ScoredRow {
    const COLUMNS: &'static [&'static str] = &[
        "variant_id", "chrom", "pos", "ref", "alt", "qual", "filter", "variant_type",
        "clinvar_significance", "clinvar_condition", "gnomad_af", "cadd_score", "consequence", "gene_symbol",
        "priority_score", "priority_tier",
    ];
}

impl ScoredRow {
    fn from_row(row: AnnotatedRow, priority_score: u32, priority_tier: PriorityTier) -> Self {
        Self {
            variant_id: row.variant_id,
            chrom: row.chrom,
            pos: row.pos,
            reference: row.reference,
            alternate: row.alternate,
            qual: row.qual,
            filter: row.filter,
            variant_type: row.variant_type,
            clinvar_significance: row.clinvar_significance,
            clinvar_condition: row.clinvar_condition,
            gnomad_af: row.gnomad_af,
            cadd_score: row.cadd_score,
            consequence: row.consequence,
            gene_symbol: row.gene_symbol,
            priority_score,
            priority_tier,
        }
    }

    /// The annotated part of the row, without the score columns.
    pub fn annotated(&self) -> AnnotatedRow {
        AnnotatedRow {
            variant_id: self.variant_id.clone(),
            chrom: self.chrom.clone(),
            pos: self.pos,
            reference: self.reference.clone(),
            alternate: self.alternate.clone(),
            qual: self.qual.clone(),
            filter: self.filter.clone(),
            variant_type: self.variant_type,
            clinvar_significance: self.clinvar_significance.clone(),
            clinvar_condition: self.clinvar_condition.clone(),
            gnomad_af: self.gnomad_af,
            cadd_score: self.cadd_score,
            consequence: self.consequence.clone(),
            gene_symbol: self.gene_symbol.clone(),
        }
    }
}

impl From<&Scored<AnnotatedRecord>> for ScoredRow {
    fn from(s: &Scored<AnnotatedRecord>) -> Self {
        Self::from_row(AnnotatedRow::from(&s.record), s.priority_score, s.priority_tier)
    }
}

impl From<Scored<AnnotatedRow>> for ScoredRow {
    fn from(s: Scored<AnnotatedRow>) -> Self {
        Self::from_row(s.record, s.priority_score, s.priority_tier)
    }
}

// ── CSV I/O ───────────────────────────────────────────────────────────────────

/// Write a header row followed by one line per row. The header is written
/// even when there are no rows.
pub fn write_csv<R, W, I>(writer: W, rows: I) -> Result<usize>
where
    R: TableRow,
    W: Write,
    I: IntoIterator<Item = R>,
{
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
    wtr.write_record(R::COLUMNS)?;
    let mut n = 0;
    for row in rows {
        wtr.serialize(&row)?;
        n += 1;
    }
    wtr.flush()?;
    debug!(rows = n, "CSV written");
    Ok(n)
}

pub fn write_csv_path<R, I>(path: &Path, rows: I) -> Result<usize>
where
    R: TableRow,
    I: IntoIterator<Item = R>,
{
    let file = File::create(path)?;
    write_csv(file, rows)
}

/// Read a CSV with a header row into typed rows.
pub fn read_csv<R: TableRow, Rd: Read>(reader: Rd) -> Result<Vec<R>> {
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
    let mut rows = Vec::new();
    for row in rdr.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

pub fn read_csv_path<R: TableRow>(path: &Path) -> Result<Vec<R>> {
    let file = File::open(path)?;
    read_csv(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::ScoringRules;
    use crate::scorer::score_record;
    use varprio_ingestion::annotation::{ClinVarHit, ConsequenceCall, FailureKind, Lookup};

    fn record() -> AnnotatedRecord {
        AnnotatedRecord {
            variant: VariantRecord::new("chr17", 7_577_120, "C", "T", "99", "PASS").unwrap(),
            clinvar: Lookup::Found(ClinVarHit::Found { condition: "see_clinvar".into() }),
            gnomad_af: Lookup::Failed(FailureKind::Timeout),
            cadd_score: Lookup::Found(28.4),
            consequence: Lookup::Found(ConsequenceCall { term: "missense_variant".into(), gene_symbol: "TP53".into() }),
        }
    }

    fn to_string<R: TableRow>(rows: Vec<R>) -> String {
        let mut buf = Vec::new();
        write_csv(&mut buf, rows).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_variant_header_and_row() {
        let out = to_string(vec![VariantRow::from(&record().variant)]);
        let mut lines = out.lines();
        assert_eq!(lines.next(), Some("variant_id,chrom,pos,ref,alt,qual,filter,variant_type"));
        assert_eq!(lines.next(), Some("chr17-7577120-C-T,chr17,7577120,C,T,99,PASS,SNV"));
    }

    #[test]
    fn test_empty_table_still_has_header() {
        let out = to_string(Vec::<ScoredRow>::new());
        assert_eq!(out.trim_end(), ScoredRow::COLUMNS.join(","));
    }

    #[test]
    fn test_scored_row_renders_sentinels() {
        let scored = score_record(record(), &ScoringRules::default());
        let row = ScoredRow::from(&scored);
        assert_eq!(row.gnomad_af, -1.0);
        assert_eq!(row.clinvar_significance, "found_in_clinvar");
        // 30 clinvar + 0 failed af + 20 cadd + 20 missense
        assert_eq!(row.priority_score, 70);
        assert_eq!(row.priority_tier, PriorityTier::High);

        let out = to_string(vec![row]);
        let header = out.lines().next().unwrap();
        assert_eq!(header, ScoredRow::COLUMNS.join(","));
        assert!(out.lines().nth(1).unwrap().ends_with(",-1.0,28.4,missense_variant,TP53,70,High"));
    }

    #[test]
    fn test_annotated_round_trip() {
        let row = AnnotatedRow::from(&record());
        let out = to_string(vec![row.clone()]);
        let back: Vec<AnnotatedRow> = read_csv(out.as_bytes()).unwrap();
        assert_eq!(back, vec![row]);
    }

    #[test]
    fn test_path_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scored.csv");
        let row = ScoredRow::from(&score_record(record(), &ScoringRules::default()));
        assert_eq!(write_csv_path(&path, vec![row.clone()]).unwrap(), 1);
        let back: Vec<ScoredRow> = read_csv_path(&path).unwrap();
        assert_eq!(back[0], row);
        assert_eq!(back[0].annotated(), AnnotatedRow::from(&record()));
    }

    #[test]
    fn test_read_rejects_bad_rows() {
        let text = "variant_id,chrom,pos,ref,alt,qual,filter,variant_type\n1-1-A-T,1,notanumber,A,T,.,.,SNV\n";
        assert!(read_csv::<VariantRow, _>(text.as_bytes()).is_err());
    }
}
