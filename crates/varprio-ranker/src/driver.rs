//! Pipeline driver: parse → annotate → score → sort.

use std::io::BufRead;
use std::path::Path;

use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;
use varprio_common::{Config, Result, VarprioError};
use varprio_ingestion::parser::{self, ParseMode, ParseReport, SkippedLine};
use varprio_ingestion::{AnnotationReport, Annotator, CallOutcome};

use crate::export::{AnnotatedRow, ScoredRow};
use crate::rules::ScoringRules;
use crate::scorer::{prioritise, ScoredRecord};
use crate::summary::PipelineSummary;

/// Everything a full run produces.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutput {
    pub run_id: Uuid,
    /// Sorted by score descending, ties in input order.
    pub scored: Vec<ScoredRecord>,
    pub outcomes: Vec<CallOutcome>,
    pub skipped: Vec<SkippedLine>,
    pub summary: PipelineSummary,
    pub duration_ms: u64,
}

impl PipelineOutput {
    /// The scored table, sentinels rendered.
    pub fn rows(&self) -> Vec<ScoredRow> {
        self.scored.iter().map(ScoredRow::from).collect()
    }
}

/// Annotated table before scoring, for callers that stop after annotation.
#[derive(Debug, Clone)]
pub struct AnnotatedOutput {
    pub report: AnnotationReport,
    pub skipped: Vec<SkippedLine>,
}

impl AnnotatedOutput {
    pub fn rows(&self) -> Vec<AnnotatedRow> {
        self.report.records.iter().map(AnnotatedRow::from).collect()
    }
}

pub struct Pipeline {
    annotator: Annotator,
    parse_mode: ParseMode,
    rules: ScoringRules,
}

impl Pipeline {
    pub fn new(annotator: Annotator, parse_mode: ParseMode) -> Self {
        Self { annotator, parse_mode, rules: ScoringRules::default() }
    }

    /// Live providers, parse mode and execution settings from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let annotator = Annotator::from_config(config)?;
        Ok(Self::new(annotator, ParseMode::from(config.ingestion.mode)))
    }

    /// Replace the point table. Rules that reward a milder finding above a
    /// more severe one are rejected.
    pub fn with_rules(mut self, rules: ScoringRules) -> Result<Self> {
        if !rules.validate() {
            return Err(VarprioError::Config(
                "scoring rules must not rank a milder finding above a more severe one".into(),
            ));
        }
        self.rules = rules;
        Ok(self)
    }

    pub fn with_parse_mode(mut self, mode: ParseMode) -> Self {
        self.parse_mode = mode;
        self
    }

    pub fn rules(&self) -> &ScoringRules {
        &self.rules
    }

    /// Parse and annotate, without scoring.
    #[instrument(skip(self, reader))]
    pub async fn annotate_reader<R: BufRead>(&self, reader: R) -> Result<AnnotatedOutput> {
        let ParseReport { records, skipped } = parser::parse_vcf_reader(reader, self.parse_mode)?;
        let report = self.annotator.annotate(records).await;
        Ok(AnnotatedOutput { report, skipped })
    }

    pub async fn annotate_path(&self, path: &Path) -> Result<AnnotatedOutput> {
        let ParseReport { records, skipped } = parser::parse_vcf_path(path, self.parse_mode)?;
        let report = self.annotator.annotate(records).await;
        Ok(AnnotatedOutput { report, skipped })
    }

    /// Full pipeline over VCF text from a reader.
    #[instrument(skip(self, reader))]
    pub async fn run_reader<R: BufRead>(&self, reader: R) -> Result<PipelineOutput> {
        let annotated = self.annotate_reader(reader).await?;
        Ok(self.finish(annotated))
    }

    pub async fn run_str(&self, text: &str) -> Result<PipelineOutput> {
        self.run_reader(text.as_bytes()).await
    }

    pub async fn run_path(&self, path: &Path) -> Result<PipelineOutput> {
        let annotated = self.annotate_path(path).await?;
        Ok(self.finish(annotated))
    }

    fn finish(&self, annotated: AnnotatedOutput) -> PipelineOutput {
        let AnnotatedOutput { report, skipped } = annotated;
        let scored = prioritise(report.records, &self.rules);
        let summary = PipelineSummary::from_scored(&scored, skipped.len());

        info!(
            run_id = %report.run_id,
            variants = summary.total_variants,
            critical = summary.tier_count(crate::PriorityTier::Critical),
            failed_lookups = summary.failed_lookups_total(),
            skipped = summary.skipped_lines,
            "Pipeline complete"
        );

        PipelineOutput {
            run_id: report.run_id,
            scored,
            outcomes: report.outcomes,
            skipped,
            summary,
            duration_ms: report.duration_ms,
        }
    }
}

/// Score and rank a previously exported annotated table.
pub fn prioritize_rows(rows: Vec<AnnotatedRow>, rules: &ScoringRules) -> Vec<ScoredRow> {
    prioritise(rows, rules).into_iter().map(ScoredRow::from).collect()
}
