//! Shared fixtures for varprio tests: VCF text, scripted providers and
//! record builders. Nothing here touches the network.

use std::io::Write;
use std::sync::Arc;

use tempfile::NamedTempFile;
use varprio_ingestion::annotation::{
    AnnotatedRecord, Annotation, ClinVarHit, ConsequenceCall, FailureKind, Lookup, SourceKind,
};
use varprio_ingestion::sources::{AnnotationSource, MockSource};
use varprio_ingestion::VariantRecord;

pub use pretty_assertions;

/// Five variants covering SNVs, an insertion and a deletion.
///
/// With [`sample_sources`] they score, in file order: 120, 75, 5, 65, 0.
pub const SAMPLE_VCF: &str = "\
##fileformat=VCFv4.2
##reference=GRCh37
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO
chr17\t7577120\trs28934576\tC\tT\t99\tPASS\t.
chr13\t32914438\t.\tT\tTG\t50\tPASS\t.
chr1\t55516888\t.\tGA\tG\t.\tLowQual\t.
chr7\t140453136\trs113488022\tA\tT\t80\tPASS\t.
chr2\t47641560\t.\tA\tG\t30\tPASS\tDP=12
";

/// Variant ids of [`SAMPLE_VCF`], in file order.
pub const SAMPLE_IDS: [&str; 5] = [
    "chr17-7577120-C-T",
    "chr13-32914438-T-TG",
    "chr1-55516888-GA-G",
    "chr7-140453136-A-T",
    "chr2-47641560-A-G",
];

/// [`SAMPLE_IDS`] sorted by expected priority.
pub const SAMPLE_RANKED: [&str; 5] = [
    "chr17-7577120-C-T",
    "chr13-32914438-T-TG",
    "chr7-140453136-A-T",
    "chr1-55516888-GA-G",
    "chr2-47641560-A-G",
];

/// Two good lines around a line with a non-numeric position (line 4).
pub const MALFORMED_VCF: &str = "\
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO
1\t100\t.\tA\tT\t.\tPASS\t.
1\t200\t.\tC\tG\t.\tPASS\t.
1\tabc\t.\tG\tA\t.\tPASS\t.
";

pub fn variant(chrom: &str, pos: u64, reference: &str, alternate: &str) -> VariantRecord {
    VariantRecord::new(chrom, pos, reference, alternate, ".", "PASS")
        .unwrap_or_else(|e| panic!("invalid fixture variant: {e}"))
}

/// Write `text` to a temporary `.vcf` file.
pub fn temp_vcf(text: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".vcf")
        .tempfile()
        .expect("create temp VCF");
    file.write_all(text.as_bytes()).expect("write temp VCF");
    file
}

fn consequence(term: &str, gene: &str) -> Annotation {
    Annotation::Consequence(ConsequenceCall { term: term.to_string(), gene_symbol: gene.to_string() })
}

fn clinvar_found() -> Annotation {
    Annotation::ClinVar(ClinVarHit::Found { condition: "see_clinvar".to_string() })
}

/// Scripted providers answering for every [`SAMPLE_VCF`] variant.
pub fn sample_sources() -> Vec<Arc<dyn AnnotationSource>> {
    let [tp53, brca2, dab1, braf, msh2] = SAMPLE_IDS;
    vec![
        Arc::new(
            MockSource::new(SourceKind::ClinVar)
                .with_default(Annotation::ClinVar(ClinVarHit::NotFound))
                .with(tp53, clinvar_found())
                .with(braf, clinvar_found()),
        ),
        Arc::new(
            MockSource::new(SourceKind::Gnomad)
                .with_default(Annotation::AlleleFrequency(0.3))
                .with(tp53, Annotation::AlleleFrequency(0.0))
                .with(brca2, Annotation::AlleleFrequency(0.0005))
                .with(braf, Annotation::AlleleFrequency(0.02)),
        ),
        Arc::new(
            MockSource::new(SourceKind::Cadd)
                .with_default(Annotation::Pathogenicity(5.0))
                .with(tp53, Annotation::Pathogenicity(35.0))
                .with(brca2, Annotation::Pathogenicity(22.0))
                .with(braf, Annotation::Pathogenicity(15.0)),
        ),
        Arc::new(
            MockSource::new(SourceKind::Vep)
                .with(tp53, consequence("stop_gained", "TP53"))
                .with(brca2, consequence("frameshift_variant", "BRCA2"))
                .with(dab1, consequence("upstream_gene_variant", "DAB1"))
                .with(braf, consequence("missense_variant", "BRAF"))
                .with(msh2, consequence("synonymous_variant", "MSH2")),
        ),
    ]
}

/// One provider per kind, all failing with `kind`.
pub fn failing_sources(kind: FailureKind) -> Vec<Arc<dyn AnnotationSource>> {
    SourceKind::ALL
        .iter()
        .map(|&source| Arc::new(MockSource::new(source).failing(kind)) as Arc<dyn AnnotationSource>)
        .collect()
}

/// Builder for annotated records with chosen signal values.
pub struct AnnotatedBuilder {
    record: AnnotatedRecord,
}

impl AnnotatedBuilder {
    /// Starts with every lookup failed as `not_found`.
    pub fn new(variant: VariantRecord) -> Self {
        Self { record: AnnotatedRecord::all_failed(variant, FailureKind::NotFound) }
    }

    pub fn clinvar(mut self, found: bool) -> Self {
        self.record.clinvar = Lookup::Found(if found {
            ClinVarHit::Found { condition: "see_clinvar".to_string() }
        } else {
            ClinVarHit::NotFound
        });
        self
    }

    pub fn af(mut self, af: f64) -> Self {
        self.record.gnomad_af = Lookup::Found(af);
        self
    }

    pub fn cadd(mut self, score: f64) -> Self {
        self.record.cadd_score = Lookup::Found(score);
        self
    }

    pub fn consequence(mut self, term: &str, gene: &str) -> Self {
        self.record.consequence = Lookup::Found(ConsequenceCall {
            term: term.to_string(),
            gene_symbol: gene.to_string(),
        });
        self
    }

    pub fn failed(mut self, source: SourceKind, kind: FailureKind) -> Self {
        match source {
            SourceKind::ClinVar => self.record.clinvar = Lookup::Failed(kind),
            SourceKind::Gnomad => self.record.gnomad_af = Lookup::Failed(kind),
            SourceKind::Cadd => self.record.cadd_score = Lookup::Failed(kind),
            SourceKind::Vep => self.record.consequence = Lookup::Failed(kind),
        }
        self
    }

    pub fn build(self) -> AnnotatedRecord {
        self.record
    }
}
