//! Run-level counts over a scored variant set.

use std::collections::BTreeMap;

use serde::Serialize;
use varprio_ingestion::{AnnotatedRecord, SourceKind, VariantType};

use crate::scorer::{PriorityTier, Scored};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineSummary {
    pub total_variants: usize,
    pub by_tier: BTreeMap<PriorityTier, usize>,
    pub in_clinvar: usize,
    pub by_variant_type: BTreeMap<VariantType, usize>,
    /// Failed lookups per source, counted per output row.
    pub failed_lookups: BTreeMap<SourceKind, usize>,
    pub total_lookups: usize,
    /// Data lines dropped by a lenient parse.
    pub skipped_lines: usize,
}

impl PipelineSummary {
    pub fn from_scored(scored: &[Scored<AnnotatedRecord>], skipped_lines: usize) -> Self {
        let mut summary = Self {
            total_variants: scored.len(),
            skipped_lines,
            total_lookups: scored.len() * SourceKind::ALL.len(),
            ..Self::default()
        };
        for tier in PriorityTier::ALL {
            summary.by_tier.insert(tier, 0);
        }

        for s in scored {
            *summary.by_tier.entry(s.priority_tier).or_insert(0) += 1;
            *summary.by_variant_type.entry(s.record.variant.variant_type()).or_insert(0) += 1;
            if s.record.is_in_clinvar() {
                summary.in_clinvar += 1;
            }
            for (source, _) in s.record.failures() {
                *summary.failed_lookups.entry(source).or_insert(0) += 1;
            }
        }
        summary
    }

    pub fn failed_lookups_total(&self) -> usize {
        self.failed_lookups.values().sum()
    }

    /// No variants were processed at all.
    pub fn is_empty(&self) -> bool {
        self.total_variants == 0
    }

    /// Variants were processed but not a single lookup succeeded.
    pub fn all_lookups_failed(&self) -> bool {
        !self.is_empty() && self.failed_lookups_total() == self.total_lookups
    }

    pub fn tier_count(&self, tier: PriorityTier) -> usize {
        self.by_tier.get(&tier).copied().unwrap_or(0)
    }
}
