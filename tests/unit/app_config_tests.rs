/*!
 * Tests for configuration files
 */

use docufluent::app_config::{Config, ModelConfig, ProviderKind, Role, RoleConfigs};

use crate::common::{create_temp_dir, create_test_file};

#[test]
fn test_config_saveThenLoad_shouldPreserveRoles() {
    let dir = create_temp_dir().unwrap();
    let path = dir.path().join("conf.json");

    let mut config = Config {
        roles: RoleConfigs::uniform(ModelConfig::Mock),
        ..Config::default()
    };
    config.roles.evaluation = ModelConfig::for_provider(ProviderKind::Ollama);
    config.pipeline.optimization_threshold = 8.0;
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded, config);
    assert_eq!(loaded.roles.get(Role::Evaluation).kind(), ProviderKind::Ollama);
    assert_eq!(loaded.roles.get(Role::Translation).kind(), ProviderKind::Mock);
}

#[test]
fn test_config_load_independentRoles_shouldValidate() {
    let dir = create_temp_dir().unwrap();
    let path = create_test_file(
        dir.path(),
        "conf.json",
        r#"{
            "source_language": "en",
            "target_language": "zh",
            "roles": {
                "translation": {"provider": "ollama", "model": "qwen2.5:7b"},
                "evaluation": {"provider": "lmstudio"},
                "optimization": {"provider": "mock"}
            },
            "concurrency": {"translation": 4},
            "pipeline": {"optimization_threshold": 9.0, "exclusion_patterns": ["^Fig\\.\\s*\\d+$"]}
        }"#,
    )
    .unwrap();

    let config = Config::load(&path).unwrap();
    config.validate().unwrap();
    assert_eq!(config.roles.get(Role::Translation).model(), "qwen2.5:7b");
    assert_eq!(config.concurrency.translation, Some(4));
    assert_eq!(config.concurrency.evaluation_1, None);
    assert_eq!(config.pipeline.repair_retry_limit, 2);
    assert!(config.cache.enabled);
}

#[test]
fn test_config_load_unknownProvider_shouldFail() {
    let dir = create_temp_dir().unwrap();
    let path = create_test_file(
        dir.path(),
        "conf.json",
        r#"{"roles": {"translation": {"provider": "carrier-pigeon"}}}"#,
    )
    .unwrap();
    assert!(Config::load(&path).is_err());
}
