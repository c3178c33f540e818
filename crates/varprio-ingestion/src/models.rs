//! Data models for the ingestion stage.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Structural class of a variant, fixed when the record is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VariantType {
    #[serde(rename = "SNV")]
    Snv,
    #[serde(rename = "insertion")]
    Insertion,
    #[serde(rename = "deletion")]
    Deletion,
}

impl VariantType {
    /// SNV when both alleles are single bases, deletion when the reference is
    /// longer, insertion otherwise (including same-length multi-base changes).
    pub fn classify(reference: &str, alternate: &str) -> Self {
        if reference.len() == 1 && alternate.len() == 1 {
            VariantType::Snv
        } else if reference.len() > alternate.len() {
            VariantType::Deletion
        } else {
            VariantType::Insertion
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VariantType::Snv       => "SNV",
            VariantType::Insertion => "insertion",
            VariantType::Deletion  => "deletion",
        }
    }
}

impl fmt::Display for VariantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One genomic variant as read from a VCF data line.
///
/// Core fields are private: a record is created once by [`VariantRecord::new`]
/// and never changes afterwards. Later pipeline stages wrap it rather than
/// editing it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantRecord {
    variant_id: String,
    chrom: String,
    pos: u64,
    reference: String,
    alternate: String,
    qual: String,
    filter: String,
    variant_type: VariantType,
}

impl VariantRecord {
    /// Build a record, validating position and alleles.
    ///
    /// `qual` and `filter` are opaque and kept verbatim.
    pub fn new(
        chrom: impl Into<String>,
        pos: u64,
        reference: impl Into<String>,
        alternate: impl Into<String>,
        qual: impl Into<String>,
        filter: impl Into<String>,
    ) -> Result<Self, String> {
        let chrom = chrom.into();
        let reference = reference.into();
        let alternate = alternate.into();

        if chrom.is_empty() {
            return Err("empty CHROM".to_string());
        }
        if pos == 0 {
            return Err("POS must be a positive 1-based coordinate".to_string());
        }
        validate_allele("REF", &reference)?;
        validate_allele("ALT", &alternate)?;

        let variant_id = make_variant_id(&chrom, pos, &reference, &alternate);
        let variant_type = VariantType::classify(&reference, &alternate);

        Ok(Self {
            variant_id,
            chrom,
            pos,
            reference,
            alternate,
            qual: qual.into(),
            filter: filter.into(),
            variant_type,
        })
    }

    pub fn variant_id(&self) -> &str { &self.variant_id }
    pub fn chrom(&self) -> &str { &self.chrom }
    pub fn pos(&self) -> u64 { self.pos }
    pub fn reference(&self) -> &str { &self.reference }
    pub fn alternate(&self) -> &str { &self.alternate }
    pub fn qual(&self) -> &str { &self.qual }
    pub fn filter(&self) -> &str { &self.filter }
    pub fn variant_type(&self) -> VariantType { self.variant_type }

    /// Chromosome without a leading `chr`, as most REST APIs expect.
    pub fn bare_chrom(&self) -> &str {
        self.chrom.strip_prefix("chr").unwrap_or(&self.chrom)
    }
}

/// `chrom-pos-ref-alt`, the dedup and lookup key used throughout.
pub fn make_variant_id(chrom: &str, pos: u64, reference: &str, alternate: &str) -> String {
    format!("{chrom}-{pos}-{reference}-{alternate}")
}

fn validate_allele(column: &str, allele: &str) -> Result<(), String> {
    if allele.is_empty() {
        return Err(format!("empty {column} allele"));
    }
    if let Some(bad) = allele
        .chars()
        .find(|c| !matches!(c.to_ascii_uppercase(), 'A' | 'C' | 'G' | 'T' | 'N'))
    {
        return Err(format!("{column} allele {allele:?} contains invalid base {bad:?}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(reference: &str, alternate: &str) -> VariantRecord {
        VariantRecord::new("chr17", 7_674_220, reference, alternate, "50", "PASS").unwrap()
    }

    #[test]
    fn test_variant_id_is_chrom_pos_ref_alt() {
        let v = record("C", "T");
        assert_eq!(v.variant_id(), "chr17-7674220-C-T");
        assert_eq!(v.variant_id(), make_variant_id("chr17", 7_674_220, "C", "T"));
        // same inputs, same id
        assert_eq!(record("C", "T").variant_id(), v.variant_id());
    }

    #[test]
    fn test_variant_type_classification() {
        assert_eq!(record("A", "T").variant_type(), VariantType::Snv);
        assert_eq!(record("ATG", "A").variant_type(), VariantType::Deletion);
        assert_eq!(record("A", "ATG").variant_type(), VariantType::Insertion);
        // equal-length MNV falls through to insertion
        assert_eq!(record("AC", "GT").variant_type(), VariantType::Insertion);
    }

    #[test]
    fn test_rejects_bad_alleles_and_position() {
        assert!(VariantRecord::new("1", 10, "", "A", ".", ".").is_err());
        assert!(VariantRecord::new("1", 10, "A", "<DEL>", ".", ".").is_err());
        assert!(VariantRecord::new("1", 10, "A", "T,G", ".", ".").is_err());
        assert!(VariantRecord::new("1", 0, "A", "T", ".", ".").is_err());
        assert!(VariantRecord::new("", 10, "A", "T", ".", ".").is_err());
    }

    #[test]
    fn test_lowercase_bases_accepted_verbatim() {
        let v = VariantRecord::new("1", 10, "a", "n", ".", ".").unwrap();
        assert_eq!(v.variant_id(), "1-10-a-n");
    }

    #[test]
    fn test_bare_chrom() {
        assert_eq!(record("A", "T").bare_chrom(), "17");
        let v = VariantRecord::new("X", 5, "A", "T", ".", ".").unwrap();
        assert_eq!(v.bare_chrom(), "X");
    }

    #[test]
    fn test_variant_type_serialises_to_table_labels() {
        assert_eq!(serde_json::to_string(&VariantType::Snv).unwrap(), "\"SNV\"");
        assert_eq!(serde_json::to_string(&VariantType::Deletion).unwrap(), "\"deletion\"");
        assert_eq!(VariantType::Insertion.to_string(), "insertion");
    }
}
