/*!
 * End-to-end controller runs against the mock provider.
 */

use docufluent::app_config::{CacheConfig, Config, ModelConfig, RoleConfigs};
use docufluent::app_controller::{Controller, OutputFiles};
use docufluent::translation::pipeline::{CancellationFlag, FinalRole};
use std::path::Path;

use crate::common::{create_temp_dir, create_test_file, init_logging};

fn mock_config(cache_dir: &Path) -> Config {
    init_logging();
    let mut config = Config {
        source_language: "English".to_string(),
        target_language: "Chinese".to_string(),
        roles: RoleConfigs::uniform(ModelConfig::Mock),
        cache: CacheConfig {
            enabled: true,
            path: Some(cache_dir.join("cache.json")),
        },
        ..Config::default()
    };
    config.pipeline.retry_backoff_ms = 0;
    config
}

const SEGMENTS: &str = r#"{"name": "spec_sheet", "segments": [
    {"id": "t1", "text": "Load Capacity"},
    {"id": "c1", "text": "MTENTU-JKBG-2505"},
    {"id": "p1", "text": "The deck is supported by twelve cables."}
]}"#;

#[tokio::test]
async fn test_run_mockProviders_shouldWriteAllOutputFiles() {
    let dir = create_temp_dir().unwrap();
    let input = create_test_file(dir.path(), "input.json", SEGMENTS).unwrap();
    let controller = Controller::with_config(mock_config(dir.path())).unwrap();

    let report = controller
        .run(input, dir.path().to_path_buf(), false, CancellationFlag::new())
        .await
        .unwrap()
        .unwrap();

    let outputs = OutputFiles::for_document(dir.path(), "spec_sheet");
    assert!(outputs.results.exists());
    assert!(outputs.usage.exists());
    assert!(outputs.model_mapping.exists());
    assert!(dir.path().join("cache.json").exists());

    assert_eq!(report.outcome("c1").unwrap().final_role, FinalRole::Skipped);
    assert_eq!(report.outcome("p1").unwrap().final_role, FinalRole::Optimized);

    let mapping: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&outputs.model_mapping).unwrap()).unwrap();
    assert_eq!(mapping[0]["alias"], "A");
    assert_eq!(mapping[2]["role"], "optimization");

    let results: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&outputs.results).unwrap()).unwrap();
    assert_eq!(results.as_array().unwrap().len(), 3);
    assert_eq!(results[1]["final_text"], "MTENTU-JKBG-2505");
}

#[tokio::test]
async fn test_run_existingResults_shouldSkipWithoutForce() {
    let dir = create_temp_dir().unwrap();
    let input = create_test_file(dir.path(), "input.json", SEGMENTS).unwrap();
    create_test_file(dir.path(), "spec_sheet_results.json", "[]").unwrap();
    let controller = Controller::with_config(mock_config(dir.path())).unwrap();

    let report = controller
        .run(input, dir.path().to_path_buf(), false, CancellationFlag::new())
        .await
        .unwrap();
    assert!(report.is_none());
}

#[tokio::test]
async fn test_run_secondRun_shouldServeFromPersistedCache() {
    let dir = create_temp_dir().unwrap();
    let input = create_test_file(dir.path(), "input.json", SEGMENTS).unwrap();
    let controller = Controller::with_config(mock_config(dir.path())).unwrap();

    controller
        .run(input.clone(), dir.path().to_path_buf(), true, CancellationFlag::new())
        .await
        .unwrap();
    let second = controller
        .run(input, dir.path().to_path_buf(), true, CancellationFlag::new())
        .await
        .unwrap()
        .unwrap();

    assert!(second.outcome("p1").unwrap().cache_hit);
    assert_eq!(second.summary.cache_hits, 2);
}

#[test]
fn test_run_invalidDocument_shouldFailBeforeTranslation() {
    let dir = create_temp_dir().unwrap();
    let input = create_test_file(dir.path(), "input.json", "{\"segments\": 3}").unwrap();
    let controller = Controller::with_config(mock_config(dir.path())).unwrap();

    let result = tokio_test::block_on(async {
        controller
            .run(input, dir.path().to_path_buf(), false, CancellationFlag::new())
            .await
    });
    assert!(result.is_err());
    assert!(!OutputFiles::for_document(dir.path(), "input").results.exists());
}

#[test]
fn test_withConfig_invalidThreshold_shouldFail() {
    let dir = create_temp_dir().unwrap();
    let mut config = mock_config(dir.path());
    config.pipeline.optimization_threshold = 12.0;
    assert!(Controller::with_config(config).is_err());
}
