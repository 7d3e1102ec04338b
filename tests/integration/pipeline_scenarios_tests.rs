/*!
 * End-to-end pipeline scenarios driven by scripted providers.
 */

use std::sync::Arc;

use docufluent::errors::Stage;
use docufluent::providers::mock::MockProvider;
use docufluent::providers::Provider;
use docufluent::translation::cache::{CacheKey, TranslationCache};
use docufluent::translation::client::ModelClients;
use docufluent::translation::concurrency::StagePools;
use docufluent::translation::document::{Segment, SegmentDocument};
use docufluent::translation::pipeline::{
    CancellationFlag, FinalRole, PipelineConfig, PipelineSession, TranslationPipeline,
};

use crate::common::mock_providers::{
    cancelling_translator, echoing_translator, malformed_evaluator, unauthorized, Script,
    StageConcurrency,
};
use crate::common::{fast_settings, init_logging, pipeline_with, pipeline_with_config, pipeline_with_roles};

const BRIDGE: &str = "The bridge is 500 meters long.";

fn single(text: &str) -> SegmentDocument {
    SegmentDocument::new("doc", vec![Segment::new("s1", text)]).unwrap()
}

#[tokio::test]
async fn test_run_alphanumericCode_shouldSkipWithoutModelCalls() {
    let provider = MockProvider::working();
    let report = pipeline_with(&provider)
        .run(&single("STR-1650"), &PipelineSession::default(), &CancellationFlag::new())
        .await;

    let outcome = report.outcome("s1").unwrap();
    assert_eq!(outcome.final_text, "STR-1650");
    assert_eq!(outcome.final_role, FinalRole::Skipped);
    assert_eq!(provider.total_calls(), 0);
    assert_eq!(report.summary.skipped, 1);
}

#[tokio::test]
async fn test_run_highScore_shouldKeepInitialWithoutOptimization() {
    let provider = Script::accepted("桥长500米。", 9.7).provider();
    let report = pipeline_with(&provider)
        .run(&single(BRIDGE), &PipelineSession::default(), &CancellationFlag::new())
        .await;

    let outcome = report.outcome("s1").unwrap();
    assert_eq!(outcome.final_text, "桥长500米。");
    assert_eq!(outcome.final_role, FinalRole::Initial);
    assert!((outcome.evaluation_scores.first.unwrap() - 9.7).abs() < 1e-4);
    assert!(outcome.evaluation_scores.second.is_none());
    assert_eq!(provider.calls(Stage::Translation), 1);
    assert_eq!(provider.calls(Stage::Evaluation1), 1);
    assert_eq!(provider.calls(Stage::Optimization), 0);
    assert_eq!(provider.calls(Stage::Evaluation2), 0);
}

#[tokio::test]
async fn test_run_lowScore_shouldSelectBetterOptimization() {
    let provider = Script::optimized("桥长500米。", 7.0, "大桥全长500米。", (7.0, 8.5)).provider();
    let report = pipeline_with(&provider)
        .run(&single(BRIDGE), &PipelineSession::default(), &CancellationFlag::new())
        .await;

    let outcome = report.outcome("s1").unwrap();
    assert_eq!(outcome.final_text, "大桥全长500米。");
    assert_eq!(outcome.final_role, FinalRole::Optimized);
    assert_eq!(outcome.initial_text.as_deref(), Some("桥长500米。"));
    let second = outcome.evaluation_scores.second.unwrap();
    assert_eq!(second.initial, 7.0);
    assert_eq!(second.optimized, 8.5);
    assert_eq!(report.summary.optimized, 1);
}

#[tokio::test]
async fn test_run_optimizationTie_shouldKeepInitial() {
    let provider = Script::optimized("桥长500米。", 7.0, "大桥全长500米。", (8.0, 8.0)).provider();
    let report = pipeline_with(&provider)
        .run(&single(BRIDGE), &PipelineSession::default(), &CancellationFlag::new())
        .await;

    let outcome = report.outcome("s1").unwrap();
    assert_eq!(outcome.final_text, "桥长500米。");
    assert_eq!(outcome.final_role, FinalRole::Initial);
    assert_eq!(outcome.optimized_text.as_deref(), Some("大桥全长500米。"));
}

#[tokio::test]
async fn test_run_unchangedOptimization_shouldSkipComparison() {
    let provider = Script::optimized("桥长500米。", 7.0, "桥长500米。", (1.0, 10.0)).provider();
    let report = pipeline_with(&provider)
        .run(&single(BRIDGE), &PipelineSession::default(), &CancellationFlag::new())
        .await;

    let outcome = report.outcome("s1").unwrap();
    assert_eq!(outcome.final_role, FinalRole::Initial);
    assert_eq!(provider.calls(Stage::Optimization), 1);
    assert_eq!(provider.calls(Stage::Evaluation2), 0);
}

#[tokio::test]
async fn test_run_persistentNoOp_shouldExhaustRepairAndFlagFailure() {
    let provider = echoing_translator(usize::MAX, "unused", 9.0);
    let session = PipelineSession::default();
    let config = PipelineConfig::new("English", "Chinese").with_repair_retry_limit(2);
    let report = pipeline_with_config(&provider, config)
        .run(&single(BRIDGE), &session, &CancellationFlag::new())
        .await;

    let outcome = report.outcome("s1").unwrap();
    assert_eq!(provider.calls(Stage::Translation), 3);
    assert_eq!(outcome.attempt_count, 3);
    assert_eq!(outcome.final_text, BRIDGE);
    assert!(outcome.failed);
    assert!(outcome.repaired);
    assert_eq!(provider.calls(Stage::Evaluation1), 0);
    assert!(session.cache().is_empty());
}

#[tokio::test]
async fn test_run_noOpThenTranslation_shouldRecoverThroughRepair() {
    let provider = echoing_translator(1, "桥长500米。", 9.8);
    let report = pipeline_with(&provider)
        .run(&single(BRIDGE), &PipelineSession::default(), &CancellationFlag::new())
        .await;

    let outcome = report.outcome("s1").unwrap();
    assert_eq!(outcome.final_text, "桥长500米。");
    assert_eq!(outcome.attempt_count, 2);
    assert!(outcome.repaired);
    assert!(!outcome.failed);
    assert_eq!(report.summary.repaired, 1);
}

#[tokio::test]
async fn test_run_cacheHit_shouldMakeNoTranslationCall() {
    let cache = TranslationCache::new(true);
    cache.store(CacheKey::new(BRIDGE, "English", "Chinese"), "桥长500米。");
    let session = PipelineSession::new(cache);

    let provider = Script::accepted("不应使用", 9.6).provider();
    let report = pipeline_with(&provider)
        .run(&single(BRIDGE), &session, &CancellationFlag::new())
        .await;

    let outcome = report.outcome("s1").unwrap();
    assert_eq!(provider.calls(Stage::Translation), 0);
    assert!(outcome.cache_hit);
    assert_eq!(outcome.final_role, FinalRole::Cache);
    assert_eq!(outcome.final_text, "桥长500米。");
    assert_eq!(report.cache.hits, 1);
}

#[tokio::test]
async fn test_run_warmCache_shouldBeIdempotent() {
    let session = PipelineSession::default();
    let document = SegmentDocument::new(
        "doc",
        vec![
            Segment::new("s1", BRIDGE),
            Segment::new("s2", "RS8-500"),
            Segment::new("s3", "The river is wide."),
        ],
    )
    .unwrap();

    let first_provider = Script::accepted("桥长500米。", 9.6).provider();
    let first = pipeline_with(&first_provider)
        .run(&document, &session, &CancellationFlag::new())
        .await;

    let second_provider = Script::accepted("桥长500米。", 9.6).provider();
    let second = pipeline_with(&second_provider)
        .run(&document, &session, &CancellationFlag::new())
        .await;

    assert_eq!(first.final_texts(), second.final_texts());
    assert_eq!(second_provider.calls(Stage::Translation), 0);
    assert_eq!(second.summary.cache_hits, 2);
}

#[tokio::test]
async fn test_run_translationFailure_shouldDegradeToOriginal() {
    let provider = unauthorized();
    let report = pipeline_with(&provider)
        .run(&single(BRIDGE), &PipelineSession::default(), &CancellationFlag::new())
        .await;

    let outcome = report.outcome("s1").unwrap();
    assert_eq!(outcome.final_text, BRIDGE);
    assert_eq!(outcome.final_role, FinalRole::Degraded);
    assert_eq!(outcome.failed_stage, Some(Stage::Translation));
    // Authentication errors are not retried
    assert_eq!(provider.total_calls(), 1);
}

#[tokio::test]
async fn test_run_evaluationFailure_shouldKeepInitialAndFlag() {
    let translator = Script::accepted("桥长500米。", 9.0).provider();
    let evaluator = unauthorized();
    let report = pipeline_with_roles(&translator, &evaluator, &translator)
        .run(&single(BRIDGE), &PipelineSession::default(), &CancellationFlag::new())
        .await;

    let outcome = report.outcome("s1").unwrap();
    assert_eq!(outcome.final_text, "桥长500米。");
    assert_eq!(outcome.final_role, FinalRole::Initial);
    assert!(outcome.failed);
    assert_eq!(outcome.failed_stage, Some(Stage::Evaluation1));
}

#[tokio::test]
async fn test_run_malformedEvaluation_shouldRetryOnceThenFlag() {
    let provider = malformed_evaluator("桥长500米。");
    let report = pipeline_with(&provider)
        .run(&single(BRIDGE), &PipelineSession::default(), &CancellationFlag::new())
        .await;

    let outcome = report.outcome("s1").unwrap();
    assert_eq!(provider.calls(Stage::Evaluation1), 2);
    assert_eq!(outcome.final_text, "桥长500米。");
    assert!(outcome.failed);
    assert_eq!(outcome.failed_stage, Some(Stage::Evaluation1));
}

#[tokio::test]
async fn test_run_sameLanguage_shouldBypassEvaluation() {
    let provider = echoing_translator(usize::MAX, "unused", 1.0);
    let config = PipelineConfig::new("English", "English");
    let report = pipeline_with_config(&provider, config)
        .run(&single(BRIDGE), &PipelineSession::default(), &CancellationFlag::new())
        .await;

    let outcome = report.outcome("s1").unwrap();
    assert_eq!(outcome.final_text, BRIDGE);
    assert!(!outcome.failed);
    assert_eq!(outcome.evaluation_scores.first, Some(10.0));
    assert_eq!(provider.calls(Stage::Translation), 1);
    assert_eq!(provider.calls(Stage::Evaluation1), 0);
}

#[tokio::test]
async fn test_run_hallucinatedPlaceholder_shouldBeUnwrapped() {
    let provider = Script::accepted("比例为{{MATH_3}}。", 9.9).provider();
    let report = pipeline_with(&provider)
        .run(&single("The ratio is three."), &PipelineSession::default(), &CancellationFlag::new())
        .await;

    assert_eq!(report.outcome("s1").unwrap().final_text, "比例为3。");
}

#[tokio::test]
async fn test_run_cancelledBeforeStart_shouldReturnOriginalTexts() {
    let provider = MockProvider::working();
    let cancel = CancellationFlag::new();
    cancel.cancel();

    let document = SegmentDocument::new(
        "doc",
        vec![Segment::new("s1", BRIDGE), Segment::new("s2", "Hello there.")],
    )
    .unwrap();
    let report = pipeline_with(&provider)
        .run(&document, &PipelineSession::default(), &cancel)
        .await;

    assert_eq!(report.final_texts(), vec![BRIDGE, "Hello there."]);
    assert_eq!(report.summary.cancelled, 2);
    assert_eq!(report.summary.failed, 0);
    assert_eq!(provider.total_calls(), 0);
}

#[tokio::test]
async fn test_run_cancelledDuringTranslation_shouldKeepInitialWithoutCaching() {
    let cancel = CancellationFlag::new();
    let provider = cancelling_translator(cancel.clone(), "译文");
    let session = PipelineSession::default();
    let report = pipeline_with(&provider)
        .run(&single(BRIDGE), &session, &cancel)
        .await;

    let outcome = report.outcome("s1").unwrap();
    assert_eq!(outcome.final_text, "译文");
    assert_eq!(outcome.final_role, FinalRole::Initial);
    assert!(outcome.cancelled);
    assert!(!outcome.failed);
    assert_eq!(provider.calls(Stage::Translation), 1);
    assert_eq!(provider.calls(Stage::Evaluation1), 0);
    assert!(session.cache().is_empty());
}

#[tokio::test]
async fn test_run_narrowTranslationPool_shouldNeverExceedPoolSize() {
    init_logging();
    let provider = StageConcurrency::new(Stage::Translation, 10);
    let shared: Arc<dyn Provider> = Arc::new(provider.clone());
    let clients = ModelClients::from_providers(shared.clone(), shared.clone(), shared, &fast_settings());
    let pipeline = TranslationPipeline::new(
        PipelineConfig::new("English", "Chinese"),
        clients,
        StagePools::new([2, 8, 8, 8]),
    )
    .unwrap();

    let segments: Vec<Segment> = (0..30)
        .map(|i| Segment::new(format!("s{}", i), format!("Inspection note {} for the east pier.", i)))
        .collect();
    let document = SegmentDocument::new("inspection", segments).unwrap();
    let report = pipeline
        .run(&document, &PipelineSession::default(), &CancellationFlag::new())
        .await;

    assert_eq!(report.outcomes.len(), 30);
    assert_eq!(provider.calls(Stage::Translation), 30);
    assert!(provider.peak() <= 2, "peak translation concurrency was {}", provider.peak());
    assert!(provider.peak() >= 1);
}

#[tokio::test]
async fn test_run_twiceOnOnePipeline_shouldReportUsagePerRun() {
    let provider = MockProvider::working();
    let pipeline = pipeline_with(&provider);
    let document = single(BRIDGE);

    let first = pipeline
        .run(&document, &PipelineSession::new(TranslationCache::new(false)), &CancellationFlag::new())
        .await;
    let second = pipeline
        .run(&document, &PipelineSession::new(TranslationCache::new(false)), &CancellationFlag::new())
        .await;

    assert_eq!(first.usage.stage(Stage::Translation).requests, 1);
    assert_eq!(second.usage.stage(Stage::Translation).requests, 1);
    assert_eq!(provider.calls(Stage::Translation), 2);
}

#[tokio::test]
async fn test_run_manySegments_shouldPreserveDocumentOrder() {
    let provider = MockProvider::slow(5);
    let segments: Vec<Segment> = (0..20)
        .map(|i| Segment::new(format!("s{}", i), format!("Sentence number {} of the manual.", i)))
        .collect();
    let document = SegmentDocument::new("manual", segments).unwrap();

    let report = pipeline_with(&provider)
        .run(&document, &PipelineSession::default(), &CancellationFlag::new())
        .await;

    assert_eq!(report.outcomes.len(), 20);
    for (i, outcome) in report.outcomes.iter().enumerate() {
        assert_eq!(outcome.segment_id, format!("s{}", i));
    }
    assert_eq!(report.usage.stage(Stage::Translation).requests, 20);
    assert_eq!(report.model_mapping.len(), 3);
}
