//! Priority score computation.
//!
//! Score = ClinVar + frequency + pathogenicity + consequence points, each
//! from [`ScoringRules`]. A failed lookup contributes nothing; in particular
//! a failed frequency lookup never earns the "absent from the population"
//! bonus.

use std::fmt;

use serde::{Deserialize, Serialize};
use varprio_ingestion::annotation::{AnnotatedRecord, ClinVarHit, Lookup};

use crate::export::AnnotatedRow;
use crate::rules::ScoringRules;

/// The inputs the scorer reads from one annotated variant.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScoringSignals<'a> {
    pub clinvar_found: bool,
    /// `None` when the frequency lookup failed.
    pub allele_frequency: Option<f64>,
    /// `None` when the pathogenicity lookup failed.
    pub pathogenicity: Option<f64>,
    /// `None` when there is no prediction.
    pub consequence: Option<&'a str>,
}

/// Anything that can be scored.
pub trait HasSignals {
    fn signals(&self) -> ScoringSignals<'_>;
}

impl HasSignals for AnnotatedRecord {
    fn signals(&self) -> ScoringSignals<'_> {
        ScoringSignals {
            clinvar_found: matches!(self.clinvar, Lookup::Found(ClinVarHit::Found { .. })),
            allele_frequency: self.gnomad_af.found().copied(),
            pathogenicity: self.cadd_score.found().copied(),
            consequence: self.consequence.found().map(|c| c.term.as_str()),
        }
    }
}

/// Rows re-read from a CSV only carry sentinels: a negative number is a
/// failed lookup and `error` / `api_error` / `unknown` mean no consequence.
impl HasSignals for AnnotatedRow {
    fn signals(&self) -> ScoringSignals<'_> {
        let consequence = match self.consequence.as_str() {
            "error" | "api_error" | "unknown" | "" => None,
            term => Some(term),
        };
        ScoringSignals {
            clinvar_found: self.clinvar_significance == "found_in_clinvar",
            allele_frequency: (self.gnomad_af >= 0.0).then_some(self.gnomad_af),
            pathogenicity: (self.cadd_score >= 0.0).then_some(self.cadd_score),
            consequence,
        }
    }
}

impl<T: HasSignals> HasSignals for &T {
    fn signals(&self) -> ScoringSignals<'_> {
        (**self).signals()
    }
}

/// Clinical-urgency bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PriorityTier {
    Critical,
    High,
    Medium,
    Low,
}

impl PriorityTier {
    pub const ALL: [PriorityTier; 4] =
        [PriorityTier::Critical, PriorityTier::High, PriorityTier::Medium, PriorityTier::Low];

    pub fn from_score(score: u32) -> Self {
        if score >= 80 {
            PriorityTier::Critical
        } else if score >= 50 {
            PriorityTier::High
        } else if score >= 30 {
            PriorityTier::Medium
        } else {
            PriorityTier::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityTier::Critical => "Critical",
            PriorityTier::High     => "High",
            PriorityTier::Medium   => "Medium",
            PriorityTier::Low      => "Low",
        }
    }
}

impl fmt::Display for PriorityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sum of the four signal contributions.
pub fn compute_score(signals: &ScoringSignals<'_>, rules: &ScoringRules) -> u32 {
    let clinvar = if signals.clinvar_found { rules.clinvar_found } else { 0 };
    let frequency = signals.allele_frequency.map(|af| rules.frequency_points(af)).unwrap_or(0);
    let pathogenicity = signals.pathogenicity.map(|s| rules.pathogenicity_points(s)).unwrap_or(0);
    let consequence = signals.consequence.map(|t| rules.consequence_points(t)).unwrap_or(0);
    clinvar + frequency + pathogenicity + consequence
}

/// A record with its score and tier attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scored<T> {
    pub record: T,
    pub priority_score: u32,
    pub priority_tier: PriorityTier,
}

pub type ScoredRecord = Scored<AnnotatedRecord>;

/// Score one record.
pub fn score_record<T: HasSignals>(record: T, rules: &ScoringRules) -> Scored<T> {
    let priority_score = compute_score(&record.signals(), rules);
    Scored { record, priority_score, priority_tier: PriorityTier::from_score(priority_score) }
}

/// Score every record and sort by score descending. Ties keep input order.
pub fn prioritise<T: HasSignals>(records: Vec<T>, rules: &ScoringRules) -> Vec<Scored<T>> {
    let mut scored: Vec<Scored<T>> = records.into_iter().map(|r| score_record(r, rules)).collect();
    // sort_by is stable
    scored.sort_by(|a, b| b.priority_score.cmp(&a.priority_score));
    scored
}
