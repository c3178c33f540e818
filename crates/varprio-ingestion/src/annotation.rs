//! Annotation results and the record shape produced by the orchestrator.
//!
//! Every annotation field is a [`Lookup`]: either the provider's answer or
//! the reason the lookup failed. Failures are only flattened into the
//! legacy sentinel values (`-1`, `api_error`, `error`, `unknown`) when a
//! record is rendered as a table row.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::models::VariantRecord;

/// Sentinel written to numeric columns when a lookup failed.
pub const NUMERIC_SENTINEL: f64 = -1.0;

/// Which external knowledge source an annotation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    ClinVar,
    Gnomad,
    Cadd,
    Vep,
}

impl SourceKind {
    pub const ALL: [SourceKind; 4] = [SourceKind::ClinVar, SourceKind::Gnomad, SourceKind::Cadd, SourceKind::Vep];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::ClinVar => "clinvar",
            SourceKind::Gnomad  => "gnomad",
            SourceKind::Cadd    => "cadd",
            SourceKind::Vep     => "vep",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a provider lookup did not produce an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The call exceeded its time budget.
    Timeout,
    /// Connection-level failure; no HTTP status was received.
    Transport,
    /// Non-success HTTP status.
    HttpError(u16),
    /// The body could not be decoded into the expected shape.
    MalformedResponse,
    /// The provider has no data for this variant.
    NotFound,
    /// Abandoned by the orchestrator (deadline or cancellation).
    Cancelled,
    /// No provider of this kind is configured.
    Unavailable,
}

impl FailureKind {
    pub fn tag(&self) -> &'static str {
        match self {
            FailureKind::Timeout           => "timeout",
            FailureKind::Transport         => "transport",
            FailureKind::HttpError(_)      => "http_error",
            FailureKind::MalformedResponse => "malformed_response",
            FailureKind::NotFound          => "not_found",
            FailureKind::Cancelled         => "cancelled",
            FailureKind::Unavailable       => "unavailable",
        }
    }

    /// Transient failures are worth retrying; semantic ones are not.
    pub fn is_transient(&self) -> bool {
        match self {
            FailureKind::Timeout | FailureKind::Transport => true,
            FailureKind::HttpError(status) => *status == 429 || (500..=599).contains(status),
            _ => false,
        }
    }

    /// `api_error` for an HTTP status failure, `error` for anything else.
    pub fn status_sentinel(&self) -> &'static str {
        match self {
            FailureKind::HttpError(_) => "api_error",
            _ => "error",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::HttpError(status) => write!(f, "http_error({status})"),
            other => f.write_str(other.tag()),
        }
    }
}

/// Failure returned by a provider lookup.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}: {message}")]
pub struct ProviderFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl ProviderFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn timeout(message: impl Into<String>) -> Self { Self::new(FailureKind::Timeout, message) }
    pub fn malformed(message: impl Into<String>) -> Self { Self::new(FailureKind::MalformedResponse, message) }
    pub fn not_found(message: impl Into<String>) -> Self { Self::new(FailureKind::NotFound, message) }
}

/// A lookup answer or the reason there is none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lookup<T> {
    Found(T),
    Failed(FailureKind),
}

impl<T> Lookup<T> {
    pub fn found(&self) -> Option<&T> {
        match self {
            Lookup::Found(v) => Some(v),
            Lookup::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<FailureKind> {
        match self {
            Lookup::Found(_) => None,
            Lookup::Failed(kind) => Some(*kind),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Lookup::Failed(_))
    }
}

/// ClinVar answer. Absence from ClinVar is an answer, not a failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClinVarHit {
    Found { condition: String },
    NotFound,
}

/// Predicted functional consequence and the gene it lands in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsequenceCall {
    pub term: String,
    pub gene_symbol: String,
}

/// Successful provider answer, one variant per provider kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Annotation {
    ClinVar(ClinVarHit),
    AlleleFrequency(f64),
    Pathogenicity(f64),
    Consequence(ConsequenceCall),
}

impl Annotation {
    pub fn kind(&self) -> SourceKind {
        match self {
            Annotation::ClinVar(_)         => SourceKind::ClinVar,
            Annotation::AlleleFrequency(_) => SourceKind::Gnomad,
            Annotation::Pathogenicity(_)   => SourceKind::Cadd,
            Annotation::Consequence(_)     => SourceKind::Vep,
        }
    }

    /// Frequencies lie in [0, 1]; PHRED scores are finite and non-negative.
    pub fn in_range(&self) -> bool {
        match self {
            Annotation::AlleleFrequency(af) => (0.0..=1.0).contains(af),
            Annotation::Pathogenicity(phred) => phred.is_finite() && *phred >= 0.0,
            Annotation::ClinVar(_) | Annotation::Consequence(_) => true,
        }
    }
}

/// Structured outcome of one provider call, returned to callers for reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallOutcome {
    pub variant_id: String,
    pub source: SourceKind,
    /// `None` on success.
    pub failure: Option<FailureKind>,
    pub elapsed_ms: u64,
}

impl CallOutcome {
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }
}

/// A variant widened with all four annotation fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotatedRecord {
    pub variant: VariantRecord,
    pub clinvar: Lookup<ClinVarHit>,
    pub gnomad_af: Lookup<f64>,
    pub cadd_score: Lookup<f64>,
    pub consequence: Lookup<ConsequenceCall>,
}

impl AnnotatedRecord {
    /// Record with every field failed as `kind`.
    pub fn all_failed(variant: VariantRecord, kind: FailureKind) -> Self {
        Self {
            variant,
            clinvar: Lookup::Failed(kind),
            gnomad_af: Lookup::Failed(kind),
            cadd_score: Lookup::Failed(kind),
            consequence: Lookup::Failed(kind),
        }
    }

    pub fn variant_id(&self) -> &str {
        self.variant.variant_id()
    }

    pub fn clinvar_significance(&self) -> &'static str {
        match &self.clinvar {
            Lookup::Found(ClinVarHit::Found { .. }) => "found_in_clinvar",
            Lookup::Found(ClinVarHit::NotFound) => "not_in_clinvar",
            Lookup::Failed(kind) => kind.status_sentinel(),
        }
    }

    pub fn clinvar_condition(&self) -> &str {
        match &self.clinvar {
            Lookup::Found(ClinVarHit::Found { condition }) => condition,
            Lookup::Found(ClinVarHit::NotFound) => "none",
            Lookup::Failed(kind) => kind.status_sentinel(),
        }
    }

    pub fn is_in_clinvar(&self) -> bool {
        matches!(self.clinvar, Lookup::Found(ClinVarHit::Found { .. }))
    }

    /// Allele frequency with failures rendered as `-1`.
    pub fn gnomad_af_column(&self) -> f64 {
        self.gnomad_af.found().copied().unwrap_or(NUMERIC_SENTINEL)
    }

    /// CADD PHRED score with failures rendered as `-1`.
    pub fn cadd_score_column(&self) -> f64 {
        self.cadd_score.found().copied().unwrap_or(NUMERIC_SENTINEL)
    }

    pub fn consequence_term(&self) -> &str {
        match &self.consequence {
            Lookup::Found(call) => &call.term,
            Lookup::Failed(kind) => consequence_sentinel(*kind),
        }
    }

    pub fn gene_symbol(&self) -> &str {
        match &self.consequence {
            Lookup::Found(call) => &call.gene_symbol,
            Lookup::Failed(kind) => consequence_sentinel(*kind),
        }
    }

    /// Names of the table columns holding sentinel values for this record.
    pub fn sentinel_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.clinvar.is_failed() {
            fields.extend(["clinvar_significance", "clinvar_condition"]);
        }
        if self.gnomad_af.is_failed() {
            fields.push("gnomad_af");
        }
        if self.cadd_score.is_failed() {
            fields.push("cadd_score");
        }
        if self.consequence.is_failed() {
            fields.extend(["consequence", "gene_symbol"]);
        }
        fields
    }

    /// Failed lookups on this row, keyed by source.
    pub fn failures(&self) -> Vec<(SourceKind, FailureKind)> {
        [
            (SourceKind::ClinVar, self.clinvar.failure()),
            (SourceKind::Gnomad, self.gnomad_af.failure()),
            (SourceKind::Cadd, self.cadd_score.failure()),
            (SourceKind::Vep, self.consequence.failure()),
        ]
        .into_iter()
        .filter_map(|(source, failure)| failure.map(|kind| (source, kind)))
        .collect()
    }
}

/// VEP sentinels: `unknown` when there is no prediction, otherwise the
/// status sentinel.
fn consequence_sentinel(kind: FailureKind) -> &'static str {
    match kind {
        FailureKind::NotFound => "unknown",
        other => other.status_sentinel(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant() -> VariantRecord {
        VariantRecord::new("chr7", 140_453_136, "A", "T", "60", "PASS").unwrap()
    }

    #[test]
    fn test_transient_classification() {
        assert!(FailureKind::Timeout.is_transient());
        assert!(FailureKind::Transport.is_transient());
        assert!(FailureKind::HttpError(503).is_transient());
        assert!(FailureKind::HttpError(429).is_transient());
        assert!(!FailureKind::HttpError(400).is_transient());
        assert!(!FailureKind::NotFound.is_transient());
        assert!(!FailureKind::MalformedResponse.is_transient());
    }

    #[test]
    fn test_all_failed_renders_sentinels() {
        let rec = AnnotatedRecord::all_failed(variant(), FailureKind::Transport);
        assert_eq!(rec.clinvar_significance(), "error");
        assert_eq!(rec.clinvar_condition(), "error");
        assert_eq!(rec.gnomad_af_column(), -1.0);
        assert_eq!(rec.cadd_score_column(), -1.0);
        assert_eq!(rec.consequence_term(), "error");
        assert_eq!(rec.gene_symbol(), "error");
        assert_eq!(rec.sentinel_fields().len(), 6);
        assert_eq!(rec.failures().len(), 4);
    }

    #[test]
    fn test_http_failures_render_api_error() {
        let rec = AnnotatedRecord::all_failed(variant(), FailureKind::HttpError(502));
        assert_eq!(rec.clinvar_significance(), "api_error");
        assert_eq!(rec.consequence_term(), "api_error");
    }

    #[test]
    fn test_found_values_are_not_sentinels() {
        let rec = AnnotatedRecord {
            variant: variant(),
            clinvar: Lookup::Found(ClinVarHit::NotFound),
            gnomad_af: Lookup::Found(0.0),
            cadd_score: Lookup::Failed(FailureKind::NotFound),
            consequence: Lookup::Failed(FailureKind::NotFound),
        };
        assert_eq!(rec.clinvar_significance(), "not_in_clinvar");
        assert_eq!(rec.clinvar_condition(), "none");
        assert_eq!(rec.gnomad_af_column(), 0.0);
        assert_eq!(rec.consequence_term(), "unknown");
        assert_eq!(rec.gene_symbol(), "unknown");
        assert_eq!(rec.sentinel_fields(), vec!["cadd_score", "consequence", "gene_symbol"]);
    }

    #[test]
    fn test_failure_display() {
        let f = ProviderFailure::new(FailureKind::HttpError(404), "no such route");
        assert_eq!(f.to_string(), "http_error(404): no such route");
        assert_eq!(f.kind.tag(), "http_error");
    }
}
