//! Annotation orchestrator.
//!
//! Drives every configured provider over a parsed variant set:
//!   1. Deduplicate by `variant_id` so each distinct variant is looked up once
//!   2. Call each provider under a per-call timeout, the overall deadline
//!      and the cancellation signal
//!   3. Merge the four answers into one `AnnotatedRecord` per input row,
//!      in input order, even when every call failed
//!   4. Emit progress events via broadcast channel
//!
//! Provider failures never abort a run; they become `Lookup::Failed` fields
//! and `CallOutcome` entries in the returned report.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use varprio_common::{Config, ExecutionConfig, ExecutionModeSetting, VarprioError};

use crate::annotation::{
    AnnotatedRecord, Annotation, CallOutcome, ClinVarHit, ConsequenceCall, FailureKind, Lookup,
    SourceKind,
};
use crate::models::VariantRecord;
use crate::sources::{build_sources, AnnotationSource};

// ── Job config ────────────────────────────────────────────────────────────────

/// How variants are scheduled across providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// One call at a time, in input order.
    Sequential,
    /// Up to `max_in_flight` variants at once; the providers for one
    /// variant run concurrently.
    Concurrent { max_in_flight: usize },
}

/// Scheduling and time limits for one annotation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationJob {
    pub mode: ExecutionMode,
    /// Ceiling for a single provider call, retries included.
    pub call_timeout: Duration,
    /// Deadline for the whole run; calls still pending when it passes are
    /// marked `cancelled`.
    pub overall_timeout: Option<Duration>,
}

impl Default for AnnotationJob {
    fn default() -> Self {
        Self::from(&ExecutionConfig::default())
    }
}

impl From<&ExecutionConfig> for AnnotationJob {
    fn from(cfg: &ExecutionConfig) -> Self {
        let mode = match cfg.mode {
            ExecutionModeSetting::Sequential => ExecutionMode::Sequential,
            ExecutionModeSetting::Concurrent => ExecutionMode::Concurrent {
                max_in_flight: cfg.max_in_flight.max(1),
            },
        };
        Self {
            mode,
            call_timeout: Duration::from_secs(cfg.call_timeout_secs),
            overall_timeout: cfg.overall_timeout_secs.map(Duration::from_secs),
        }
    }
}

// ── Progress events ───────────────────────────────────────────────────────────

/// Emitted after each distinct variant has been fully annotated.
#[derive(Debug, Clone, Serialize)]
pub struct AnnotationProgress {
    pub run_id: Uuid,
    pub variant_id: String,
    pub completed: usize,
    pub total: usize,
    pub failed_calls: usize,
}

// ── Result ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct AnnotationReport {
    pub run_id: Uuid,
    /// One record per input variant, in input order.
    pub records: Vec<AnnotatedRecord>,
    /// One entry per provider call actually attempted or abandoned.
    pub outcomes: Vec<CallOutcome>,
    pub duration_ms: u64,
}

impl AnnotationReport {
    /// Failed calls per source.
    pub fn failures_by_source(&self) -> BTreeMap<SourceKind, usize> {
        let mut counts = BTreeMap::new();
        for outcome in self.outcomes.iter().filter(|o| !o.succeeded()) {
            *counts.entry(outcome.source).or_insert(0) += 1;
        }
        counts
    }

    pub fn failed_calls(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.succeeded()).count()
    }
}

// ── Orchestrator ──────────────────────────────────────────────────────────────

/// Answers for one distinct variant, before they are copied onto rows.
#[derive(Debug, Clone)]
struct Fields {
    clinvar: Lookup<ClinVarHit>,
    gnomad_af: Lookup<f64>,
    cadd_score: Lookup<f64>,
    consequence: Lookup<ConsequenceCall>,
}

impl Fields {
    fn unavailable() -> Self {
        Self {
            clinvar: Lookup::Failed(FailureKind::Unavailable),
            gnomad_af: Lookup::Failed(FailureKind::Unavailable),
            cadd_score: Lookup::Failed(FailureKind::Unavailable),
            consequence: Lookup::Failed(FailureKind::Unavailable),
        }
    }

    fn set(&mut self, source: SourceKind, result: Result<Annotation, FailureKind>) {
        match (source, result) {
            (_, Ok(Annotation::ClinVar(hit))) => self.clinvar = Lookup::Found(hit),
            (_, Ok(Annotation::AlleleFrequency(af))) => self.gnomad_af = Lookup::Found(af),
            (_, Ok(Annotation::Pathogenicity(score))) => self.cadd_score = Lookup::Found(score),
            (_, Ok(Annotation::Consequence(call))) => self.consequence = Lookup::Found(call),
            (SourceKind::ClinVar, Err(kind)) => self.clinvar = Lookup::Failed(kind),
            (SourceKind::Gnomad, Err(kind)) => self.gnomad_af = Lookup::Failed(kind),
            (SourceKind::Cadd, Err(kind)) => self.cadd_score = Lookup::Failed(kind),
            (SourceKind::Vep, Err(kind)) => self.consequence = Lookup::Failed(kind),
        }
    }

    fn into_record(self, variant: VariantRecord) -> AnnotatedRecord {
        AnnotatedRecord {
            variant,
            clinvar: self.clinvar,
            gnomad_af: self.gnomad_af,
            cadd_score: self.cadd_score,
            consequence: self.consequence,
        }
    }
}

/// Applies a set of annotation sources to variants.
pub struct Annotator {
    sources: Vec<Arc<dyn AnnotationSource>>,
    job: AnnotationJob,
    cancel: Option<watch::Receiver<bool>>,
    progress_tx: Option<broadcast::Sender<AnnotationProgress>>,
}

impl Annotator {
    /// At most one source per kind is kept; later duplicates are ignored.
    pub fn new(sources: Vec<Arc<dyn AnnotationSource>>, job: AnnotationJob) -> Self {
        let mut unique: Vec<Arc<dyn AnnotationSource>> = Vec::with_capacity(sources.len());
        for source in sources {
            if unique.iter().any(|s| s.kind() == source.kind()) {
                warn!(source = %source.kind(), "Duplicate annotation source ignored");
                continue;
            }
            unique.push(source);
        }
        Self { sources: unique, job, cancel: None, progress_tx: None }
    }

    /// Live providers from configuration.
    pub fn from_config(config: &Config) -> Result<Self, VarprioError> {
        let sources = build_sources(config)?;
        Ok(Self::new(sources, AnnotationJob::from(&config.execution)))
    }

    /// Abandon pending calls once `true` is sent on this channel.
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn with_progress(mut self, tx: broadcast::Sender<AnnotationProgress>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    pub fn job(&self) -> &AnnotationJob {
        &self.job
    }

    /// Annotate every variant. Always returns one record per input row.
    #[instrument(skip(self, variants), fields(n = variants.len()))]
    pub async fn annotate(&self, variants: Vec<VariantRecord>) -> AnnotationReport {
        let run_id = Uuid::new_v4();
        let t0 = Instant::now();
        let deadline = self.job.overall_timeout.map(|d| t0 + d);

        // Rows point into the distinct-variant list
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut distinct: Vec<&VariantRecord> = Vec::new();
        let mut slots: Vec<usize> = Vec::with_capacity(variants.len());
        for variant in &variants {
            let slot = *index.entry(variant.variant_id()).or_insert_with(|| {
                distinct.push(variant);
                distinct.len() - 1
            });
            slots.push(slot);
        }

        info!(
            run_id = %run_id,
            variants = variants.len(),
            distinct = distinct.len(),
            sources = self.sources.len(),
            mode = ?self.job.mode,
            "Starting annotation"
        );

        let total = distinct.len();
        let max_in_flight = match self.job.mode {
            ExecutionMode::Sequential => 1,
            ExecutionMode::Concurrent { max_in_flight } => max_in_flight.max(1),
        };

        let mut results = stream::iter(distinct.iter().copied())
            .map(|variant| self.annotate_one(variant, deadline))
            .buffered(max_in_flight);

        let mut annotated: Vec<Fields> = Vec::with_capacity(total);
        let mut outcomes: Vec<CallOutcome> = Vec::new();
        while let Some((fields, calls)) = results.next().await {
            let completed = annotated.len() + 1;
            if let Some(ref tx) = self.progress_tx {
                let _ = tx.send(AnnotationProgress {
                    run_id,
                    variant_id: distinct[completed - 1].variant_id().to_string(),
                    completed,
                    total,
                    failed_calls: calls.iter().filter(|c| !c.succeeded()).count(),
                });
            }
            annotated.push(fields);
            outcomes.extend(calls);
        }
        drop(results);

        let records: Vec<AnnotatedRecord> = variants
            .iter()
            .zip(&slots)
            .map(|(variant, &slot)| annotated[slot].clone().into_record(variant.clone()))
            .collect();

        let report = AnnotationReport {
            run_id,
            records,
            outcomes,
            duration_ms: t0.elapsed().as_millis() as u64,
        };
        info!(
            run_id = %run_id,
            records = report.records.len(),
            calls = report.outcomes.len(),
            failed = report.failed_calls(),
            duration_ms = report.duration_ms,
            "Annotation complete"
        );
        report
    }

    /// All providers for one variant. Concurrent mode overlaps the calls.
    async fn annotate_one(
        &self,
        variant: &VariantRecord,
        deadline: Option<Instant>,
    ) -> (Fields, Vec<CallOutcome>) {
        let results: Vec<(Result<Annotation, FailureKind>, CallOutcome)> = match self.job.mode {
            ExecutionMode::Sequential => {
                let mut results = Vec::with_capacity(self.sources.len());
                for source in &self.sources {
                    results.push(self.call(source.as_ref(), variant, deadline).await);
                }
                results
            }
            ExecutionMode::Concurrent { .. } => {
                futures::future::join_all(
                    self.sources.iter().map(|s| self.call(s.as_ref(), variant, deadline)),
                )
                .await
            }
        };

        let mut fields = Fields::unavailable();
        let mut outcomes = Vec::with_capacity(results.len());
        for (result, outcome) in results {
            fields.set(outcome.source, result);
            outcomes.push(outcome);
        }
        (fields, outcomes)
    }

    /// One provider call under the per-call timeout, the deadline and the
    /// cancel signal.
    async fn call(
        &self,
        source: &dyn AnnotationSource,
        variant: &VariantRecord,
        deadline: Option<Instant>,
    ) -> (Result<Annotation, FailureKind>, CallOutcome) {
        let kind = source.kind();
        let started = Instant::now();

        let (budget, bounded_by_deadline) = match deadline {
            Some(d) => {
                let remaining = d.saturating_duration_since(started);
                if remaining < self.job.call_timeout {
                    (remaining, true)
                } else {
                    (self.job.call_timeout, false)
                }
            }
            None => (self.job.call_timeout, false),
        };

        let result = if self.is_cancelled() || (bounded_by_deadline && budget.is_zero()) {
            Err(FailureKind::Cancelled)
        } else {
            let mut cancel = self.cancel.clone();
            tokio::select! {
                biased;
                _ = cancelled(&mut cancel) => Err(FailureKind::Cancelled),
                res = tokio::time::timeout(budget, source.lookup(variant)) => match res {
                    Ok(Ok(annotation)) if annotation.kind() == kind && annotation.in_range() => Ok(annotation),
                    Ok(Ok(annotation)) if annotation.kind() == kind => {
                        warn!(source = %kind, value = ?annotation, "Source answered with an out-of-range value");
                        Err(FailureKind::MalformedResponse)
                    }
                    Ok(Ok(annotation)) => {
                        warn!(source = %kind, got = %annotation.kind(), "Source answered with the wrong annotation kind");
                        Err(FailureKind::MalformedResponse)
                    }
                    Ok(Err(failure)) => {
                        debug!(source = %kind, error = %failure, "Lookup failed");
                        Err(failure.kind)
                    }
                    Err(_) if bounded_by_deadline => Err(FailureKind::Cancelled),
                    Err(_) => Err(FailureKind::Timeout),
                },
            }
        };

        let outcome = CallOutcome {
            variant_id: variant.variant_id().to_string(),
            source: kind,
            failure: result.as_ref().err().copied(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        match outcome.failure {
            None => debug!(variant_id = %outcome.variant_id, source = %kind, elapsed_ms = outcome.elapsed_ms, "Lookup ok"),
            Some(FailureKind::NotFound) => debug!(variant_id = %outcome.variant_id, source = %kind, "No data"),
            Some(failure) => warn!(variant_id = %outcome.variant_id, source = %kind, %failure, "Lookup failed"),
        }
        (result, outcome)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }
}

/// Resolves once cancellation is signalled. A dropped sender never cancels.
async fn cancelled(rx: &mut Option<watch::Receiver<bool>>) {
    if let Some(rx) = rx {
        if rx.wait_for(|c| *c).await.is_ok() {
            return;
        }
    }
    std::future::pending::<()>().await
}
