//! Subcommand implementations.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{info, warn};
use varprio_common::Config;
use varprio_ingestion::parser::{self, ParseMode};
use varprio_ingestion::Annotator;
use varprio_ranker::export::{read_csv_path, write_csv};
use varprio_ranker::{
    prioritize_rows, AnnotatedRow, Pipeline, PipelineSummary, PriorityTier, ScoringRules, TableRow,
    VariantRow,
};

/// `-o path`, or stdout when absent.
fn open_output(path: Option<&Path>) -> anyhow::Result<Box<dyn Write>> {
    Ok(match path {
        Some(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Cannot create {}", p.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    })
}

fn emit<R: TableRow>(output: Option<&Path>, rows: Vec<R>) -> anyhow::Result<usize> {
    let writer = open_output(output)?;
    let n = write_csv(writer, rows).context("Failed to write CSV")?;
    if let Some(p) = output {
        info!(rows = n, path = %p.display(), "Table written");
    }
    Ok(n)
}

/// Pipeline with live providers; Ctrl-C abandons pending lookups.
fn live_pipeline(config: &Config) -> anyhow::Result<Pipeline> {
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, abandoning pending lookups");
            let _ = cancel_tx.send(true);
        }
    });

    let annotator = Annotator::from_config(config)
        .context("Failed to set up annotation sources")?
        .with_cancel(cancel_rx);
    Ok(Pipeline::new(annotator, ParseMode::from(config.ingestion.mode)))
}

pub fn parse(config: &Config, vcf: &Path, lenient: bool, output: Option<&Path>) -> anyhow::Result<()> {
    let mode = if lenient { ParseMode::Lenient } else { ParseMode::from(config.ingestion.mode) };
    let report = parser::parse_vcf_path(vcf, mode)
        .with_context(|| format!("Failed to parse {}", vcf.display()))?;

    if !report.skipped.is_empty() {
        eprintln!("Skipped {} malformed line(s)", report.skipped.len());
    }
    emit(output, report.records.iter().map(VariantRow::from).collect())?;
    Ok(())
}

pub async fn annotate(config: &Config, vcf: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let pipeline = live_pipeline(config)?;
    let annotated = pipeline
        .annotate_path(vcf)
        .await
        .with_context(|| format!("Failed to annotate {}", vcf.display()))?;

    let failed = annotated.report.failed_calls();
    if failed > 0 {
        eprintln!("{failed} of {} lookups failed", annotated.report.outcomes.len());
    }
    emit(output, annotated.rows())?;
    Ok(())
}

pub fn prioritize(annotated: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let rows: Vec<AnnotatedRow> = read_csv_path(annotated)
        .with_context(|| format!("Failed to read annotated table {}", annotated.display()))?;
    let scored = prioritize_rows(rows, &ScoringRules::default());
    emit(output, scored)?;
    Ok(())
}

pub async fn run(config: &Config, vcf: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let pipeline = live_pipeline(config)?;
    let result = pipeline
        .run_path(vcf)
        .await
        .with_context(|| format!("Pipeline failed for {}", vcf.display()))?;

    emit(output, result.rows())?;
    eprint!("{}", render_summary(&result.summary));
    Ok(())
}

fn render_summary(summary: &PipelineSummary) -> String {
    if summary.is_empty() {
        return "No variants found in input\n".to_string();
    }

    let mut out = format!("Variants: {}\n", summary.total_variants);
    for tier in PriorityTier::ALL {
        out.push_str(&format!("  {:<9}{}\n", tier.as_str(), summary.tier_count(tier)));
    }
    out.push_str(&format!("In ClinVar: {}\n", summary.in_clinvar));
    for (variant_type, n) in &summary.by_variant_type {
        out.push_str(&format!("  {variant_type}: {n}\n"));
    }
    out.push_str(&format!(
        "Failed lookups: {} of {}\n",
        summary.failed_lookups_total(),
        summary.total_lookups
    ));
    for (source, n) in &summary.failed_lookups {
        out.push_str(&format!("  {source}: {n}\n"));
    }
    if summary.all_lookups_failed() {
        out.push_str("Every lookup failed; scores reflect no annotation data\n");
    }
    if summary.skipped_lines > 0 {
        out.push_str(&format!("Skipped lines: {}\n", summary.skipped_lines));
    }
    out
}
