//! varprio-ranker: Variant prioritization.
//! - Exact point table and tiering over annotated variants
//! - Stable ranking, CSV table export/import and run summaries
//! - The end-to-end pipeline driver

pub mod rules;
pub mod scorer;
pub mod export;
pub mod summary;
pub mod driver;

pub use driver::{prioritize_rows, AnnotatedOutput, Pipeline, PipelineOutput};
pub use export::{AnnotatedRow, ScoredRow, TableRow, VariantRow};
pub use rules::ScoringRules;
pub use scorer::{compute_score, prioritise, score_record, HasSignals, PriorityTier, Scored, ScoredRecord, ScoringSignals};
pub use summary::PipelineSummary;
