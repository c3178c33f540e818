//! Point table for variant prioritization.

use serde::{Deserialize, Serialize};

/// Allele-frequency bucket upper bounds (exclusive).
pub const AF_ULTRA_RARE: f64 = 0.001;
pub const AF_RARE: f64 = 0.01;
pub const AF_LOW: f64 = 0.05;

/// CADD PHRED bucket lower bounds (inclusive).
pub const CADD_HIGH: f64 = 30.0;
pub const CADD_MODERATE: f64 = 20.0;
pub const CADD_LOW: f64 = 10.0;

/// Points awarded per signal bucket.
///
/// Buckets within one signal are mutually exclusive and evaluated from the
/// most severe down; only the first match counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringRules {
    /// Variant has a ClinVar record
    pub clinvar_found: u32,

    /// af == 0, observed zero times (never a failed lookup)
    pub af_absent: u32,
    /// 0 < af < 0.001
    pub af_ultra_rare: u32,
    /// 0.001 <= af < 0.01
    pub af_rare: u32,
    /// 0.01 <= af < 0.05
    pub af_low: u32,

    /// PHRED >= 30
    pub cadd_high: u32,
    /// 20 <= PHRED < 30
    pub cadd_moderate: u32,
    /// 10 <= PHRED < 20
    pub cadd_low: u32,

    pub high_impact: u32,
    pub moderate_impact: u32,
    /// Term mentions a regulatory region
    pub regulatory: u32,

    pub high_impact_terms: Vec<String>,
    pub moderate_impact_terms: Vec<String>,
    /// Substrings, not exact terms
    pub regulatory_markers: Vec<String>,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            clinvar_found:   30,
            af_absent:       30,
            af_ultra_rare:   25,
            af_rare:         15,
            af_low:          5,
            cadd_high:       30,
            cadd_moderate:   20,
            cadd_low:        10,
            high_impact:     30,
            moderate_impact: 20,
            regulatory:      5,
            high_impact_terms: to_strings(&[
                "frameshift_variant",
                "stop_gained",
                "splice_donor_variant",
                "splice_acceptor_variant",
                "stop_lost",
                "start_lost",
            ]),
            moderate_impact_terms: to_strings(&["missense_variant", "inframe_deletion", "inframe_insertion"]),
            regulatory_markers: to_strings(&["upstream", "downstream"]),
        }
    }
}

impl ScoringRules {
    /// More severe buckets must never be worth fewer points than milder ones.
    pub fn validate(&self) -> bool {
        self.af_absent >= self.af_ultra_rare
            && self.af_ultra_rare >= self.af_rare
            && self.af_rare >= self.af_low
            && self.cadd_high >= self.cadd_moderate
            && self.cadd_moderate >= self.cadd_low
            && self.high_impact >= self.moderate_impact
            && self.moderate_impact >= self.regulatory
    }

    /// Highest score these rules can award.
    pub fn max_score(&self) -> u32 {
        self.clinvar_found + self.af_absent + self.cadd_high + self.high_impact
    }

    pub fn frequency_points(&self, af: f64) -> u32 {
        if !(0.0..=1.0).contains(&af) {
            0
        } else if af == 0.0 {
            self.af_absent
        } else if af < AF_ULTRA_RARE {
            self.af_ultra_rare
        } else if af < AF_RARE {
            self.af_rare
        } else if af < AF_LOW {
            self.af_low
        } else {
            0
        }
    }

    pub fn pathogenicity_points(&self, phred: f64) -> u32 {
        if phred >= CADD_HIGH {
            self.cadd_high
        } else if phred >= CADD_MODERATE {
            self.cadd_moderate
        } else if phred >= CADD_LOW {
            self.cadd_low
        } else {
            0
        }
    }

    pub fn consequence_points(&self, term: &str) -> u32 {
        if self.high_impact_terms.iter().any(|t| t == term) {
            self.high_impact
        } else if self.moderate_impact_terms.iter().any(|t| t == term) {
            self.moderate_impact
        } else if self.regulatory_markers.iter().any(|m| term.contains(m.as_str())) {
            self.regulatory
        } else {
            0
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules_are_monotonic() {
        let rules = ScoringRules::default();
        assert!(rules.validate(), "Default rules must reward severity monotonically");
        assert_eq!(rules.max_score(), 120);
    }

    #[test]
    fn test_inverted_rules_fail_validation() {
        let mut rules = ScoringRules::default();
        rules.af_rare = 40;
        assert!(!rules.validate());
    }

    #[test]
    fn test_frequency_bucket_edges() {
        let r = ScoringRules::default();
        assert_eq!(r.frequency_points(0.0), 30);
        assert_eq!(r.frequency_points(0.0009), 25);
        assert_eq!(r.frequency_points(0.001), 15);
        assert_eq!(r.frequency_points(0.0099), 15);
        assert_eq!(r.frequency_points(0.01), 5);
        assert_eq!(r.frequency_points(0.05), 0);
        assert_eq!(r.frequency_points(0.3), 0);
    }

    #[test]
    fn test_out_of_range_frequency_earns_nothing() {
        let r = ScoringRules::default();
        assert_eq!(r.frequency_points(-1.0), 0);
        assert_eq!(r.frequency_points(1.5), 0);
        assert_eq!(r.frequency_points(f64::NAN), 0);
    }

    #[test]
    fn test_pathogenicity_bucket_edges() {
        let r = ScoringRules::default();
        assert_eq!(r.pathogenicity_points(35.0), 30);
        assert_eq!(r.pathogenicity_points(30.0), 30);
        assert_eq!(r.pathogenicity_points(29.9), 20);
        assert_eq!(r.pathogenicity_points(20.0), 20);
        assert_eq!(r.pathogenicity_points(10.0), 10);
        assert_eq!(r.pathogenicity_points(9.99), 0);
    }

    #[test]
    fn test_consequence_terms() {
        let r = ScoringRules::default();
        assert_eq!(r.consequence_points("stop_gained"), 30);
        assert_eq!(r.consequence_points("splice_acceptor_variant"), 30);
        assert_eq!(r.consequence_points("inframe_insertion"), 20);
        assert_eq!(r.consequence_points("upstream_gene_variant"), 5);
        assert_eq!(r.consequence_points("downstream_gene_variant"), 5);
        assert_eq!(r.consequence_points("synonymous_variant"), 0);
        // Exact match only for impact classes
        assert_eq!(r.consequence_points("stop_gained&splice_region_variant"), 0);
    }
}
