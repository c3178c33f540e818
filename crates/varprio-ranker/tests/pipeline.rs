//! End-to-end runs over scripted providers.

use std::time::Duration;

use varprio_ingestion::{AnnotationJob, Annotator, ExecutionMode, FailureKind, ParseMode, SourceKind};
use varprio_ranker::export::{read_csv, write_csv};
use varprio_ranker::{
    prioritise, prioritize_rows, score_record, AnnotatedRow, Pipeline, PriorityTier, ScoredRow, ScoringRules,
};
use varprio_test_utils::pretty_assertions::assert_eq;
use varprio_test_utils::{
    failing_sources, sample_sources, temp_vcf, variant, AnnotatedBuilder, MALFORMED_VCF, SAMPLE_IDS,
    SAMPLE_RANKED, SAMPLE_VCF,
};

fn job(mode: ExecutionMode) -> AnnotationJob {
    AnnotationJob { mode, call_timeout: Duration::from_secs(5), overall_timeout: None }
}

fn sample_pipeline(mode: ExecutionMode) -> Pipeline {
    Pipeline::new(Annotator::new(sample_sources(), job(mode)), ParseMode::Strict)
}

#[tokio::test]
async fn test_full_run_ranks_sample() {
    let output = sample_pipeline(ExecutionMode::Sequential).run_str(SAMPLE_VCF).await.unwrap();

    let ids: Vec<&str> = output.scored.iter().map(|s| s.record.variant_id()).collect();
    assert_eq!(ids, SAMPLE_RANKED.to_vec());

    let scores: Vec<u32> = output.scored.iter().map(|s| s.priority_score).collect();
    assert_eq!(scores, vec![120, 75, 65, 5, 0]);

    let tiers: Vec<PriorityTier> = output.scored.iter().map(|s| s.priority_tier).collect();
    assert_eq!(
        tiers,
        vec![PriorityTier::Critical, PriorityTier::High, PriorityTier::High, PriorityTier::Low, PriorityTier::Low]
    );

    assert_eq!(output.summary.total_variants, 5);
    assert_eq!(output.summary.in_clinvar, 2);
    assert_eq!(output.summary.failed_lookups_total(), 0);
    assert_eq!(output.outcomes.len(), 20);
    assert!(output.skipped.is_empty());
}

#[tokio::test]
async fn test_concurrent_run_matches_sequential() {
    let sequential = sample_pipeline(ExecutionMode::Sequential).run_str(SAMPLE_VCF).await.unwrap();
    let concurrent = sample_pipeline(ExecutionMode::Concurrent { max_in_flight: 3 })
        .run_str(SAMPLE_VCF)
        .await
        .unwrap();
    assert_eq!(sequential.rows(), concurrent.rows());
}

#[tokio::test]
async fn test_every_provider_failing() {
    let pipeline = Pipeline::new(
        Annotator::new(failing_sources(FailureKind::HttpError(503)), job(ExecutionMode::Sequential)),
        ParseMode::Strict,
    );
    let output = pipeline.run_str(SAMPLE_VCF).await.unwrap();

    // Every score is 0, so the sort keeps file order
    let ids: Vec<&str> = output.scored.iter().map(|s| s.record.variant_id()).collect();
    assert_eq!(ids, SAMPLE_IDS.to_vec());
    assert!(output.scored.iter().all(|s| s.priority_tier == PriorityTier::Low));
    assert!(output.summary.all_lookups_failed());
    assert!(!output.summary.is_empty());
    assert_eq!(output.summary.failed_lookups.get(&SourceKind::Cadd), Some(&5));

    let row = &output.rows()[0];
    assert_eq!(row.clinvar_significance, "api_error");
    assert_eq!(row.gnomad_af, -1.0);
    assert_eq!(row.cadd_score, -1.0);
    assert_eq!(row.consequence, "api_error");
}

#[tokio::test]
async fn test_empty_input_is_not_a_failure() {
    let header_only = "##fileformat=VCFv4.2\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n";
    let output = sample_pipeline(ExecutionMode::Sequential).run_str(header_only).await.unwrap();
    assert!(output.scored.is_empty());
    assert!(output.summary.is_empty());
    assert!(!output.summary.all_lookups_failed());
}

#[tokio::test]
async fn test_strict_and_lenient_parsing() {
    let strict = sample_pipeline(ExecutionMode::Sequential);
    assert!(strict.run_str(MALFORMED_VCF).await.is_err());

    let lenient = sample_pipeline(ExecutionMode::Sequential).with_parse_mode(ParseMode::Lenient);
    let output = lenient.run_str(MALFORMED_VCF).await.unwrap();
    assert_eq!(output.scored.len(), 2);
    assert_eq!(output.skipped.len(), 1);
    assert_eq!(output.skipped[0].line, 4);
    assert_eq!(output.summary.skipped_lines, 1);
}

#[tokio::test]
async fn test_run_from_path() {
    let file = temp_vcf(SAMPLE_VCF);
    let output = sample_pipeline(ExecutionMode::Sequential).run_path(file.path()).await.unwrap();
    assert_eq!(output.scored.len(), 5);
}

#[tokio::test]
async fn test_scored_csv_round_trip() {
    let output = sample_pipeline(ExecutionMode::Sequential).run_str(SAMPLE_VCF).await.unwrap();
    let rows = output.rows();

    let mut buf = Vec::new();
    write_csv(&mut buf, rows.clone()).unwrap();
    let back: Vec<ScoredRow> = read_csv(buf.as_slice()).unwrap();
    assert_eq!(back, rows);
}

#[tokio::test]
async fn test_prioritize_saved_annotated_table() {
    let pipeline = sample_pipeline(ExecutionMode::Sequential);
    let annotated = pipeline.annotate_reader(SAMPLE_VCF.as_bytes()).await.unwrap();

    let mut buf = Vec::new();
    write_csv(&mut buf, annotated.rows()).unwrap();
    let rows: Vec<AnnotatedRow> = read_csv(buf.as_slice()).unwrap();

    let from_csv = prioritize_rows(rows, &ScoringRules::default());
    let direct = pipeline.run_str(SAMPLE_VCF).await.unwrap().rows();
    assert_eq!(from_csv, direct);
}

#[test]
fn test_saved_sentinels_score_like_failures() {
    let record = AnnotatedBuilder::new(variant("1", 10, "A", "T"))
        .clinvar(true)
        .failed(SourceKind::Gnomad, FailureKind::Timeout)
        .cadd(31.0)
        .build();
    let in_memory = score_record(&record, &ScoringRules::default()).priority_score;
    let from_row = score_record(AnnotatedRow::from(&record), &ScoringRules::default()).priority_score;
    assert_eq!(in_memory, 60);
    assert_eq!(from_row, in_memory);
}

#[test]
fn test_negative_frequency_earns_no_rarity_points() {
    let record = AnnotatedBuilder::new(variant("1", 10, "A", "T")).clinvar(true).af(-1.0).cadd(31.0).build();
    let in_memory = score_record(&record, &ScoringRules::default()).priority_score;
    let from_row = score_record(AnnotatedRow::from(&record), &ScoringRules::default()).priority_score;
    assert_eq!(in_memory, 60);
    assert_eq!(from_row, in_memory);
}

#[test]
fn test_scoring_is_idempotent() {
    let record = AnnotatedBuilder::new(variant("3", 33, "G", "C"))
        .clinvar(false)
        .af(0.004)
        .cadd(21.0)
        .consequence("missense_variant", "X")
        .build();
    let rules = ScoringRules::default();
    let first = score_record(&record, &rules);
    let second = score_record(&record, &rules);
    assert_eq!(first.priority_score, second.priority_score);
    assert_eq!(first.priority_tier, second.priority_tier);
    assert_eq!(first.priority_score, 55);
}

#[test]
fn test_ties_keep_input_order() {
    let records: Vec<_> = (1..=6)
        .map(|pos| {
            let b = AnnotatedBuilder::new(variant("1", pos, "A", "T"));
            if pos % 2 == 0 { b.cadd(25.0).build() } else { b.build() }
        })
        .collect();
    let ranked = prioritise(records, &ScoringRules::default());
    let positions: Vec<u64> = ranked.iter().map(|s| s.record.variant.pos()).collect();
    assert_eq!(positions, vec![2, 4, 6, 1, 3, 5]);
}

#[tokio::test]
async fn test_custom_rules_are_validated() {
    let mut inverted = ScoringRules::default();
    inverted.cadd_low = 40;
    assert!(sample_pipeline(ExecutionMode::Sequential).with_rules(inverted).is_err());

    let mut boosted = ScoringRules::default();
    boosted.clinvar_found = 50;
    let pipeline = sample_pipeline(ExecutionMode::Sequential).with_rules(boosted).unwrap();
    let output = pipeline.run_str(SAMPLE_VCF).await.unwrap();
    assert_eq!(output.scored[0].priority_score, 140);
}
