//! varprio-ingestion: Variant ingestion and annotation.
//! - VCF line parsing into immutable variant records
//! - Annotation providers (ClinVar, gnomAD, CADD, VEP) behind one trait
//! - Provider-level retry with exponential backoff
//! - Orchestration of all providers over a variant set

pub mod models;
pub mod parser;
pub mod annotation;
pub mod sources;
pub mod pipeline;

pub use annotation::{AnnotatedRecord, Annotation, CallOutcome, FailureKind, Lookup, ProviderFailure, SourceKind};
pub use models::{VariantRecord, VariantType};
pub use parser::{ParseMode, ParseReport};
pub use pipeline::{AnnotationJob, AnnotationProgress, AnnotationReport, Annotator, ExecutionMode};
