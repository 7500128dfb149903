use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::*;

fn docs(texts: &[&str]) -> Vec<String> {
    texts.iter().map(|t| t.to_string()).collect()
}

#[test]
fn test_lexical_prefers_overlapping_document() {
    let encoder = LexicalCrossEncoder::new();
    let scores = encoder
        .score(
            "who founded fastapi",
            &docs(&[
                "FastAPI was created by Sebastian Ramirez.",
                "Flask is a Python microframework released in 2010.",
            ]),
        )
        .unwrap();

    assert_eq!(scores.len(), 2);
    assert!(scores[0] > scores[1], "scores: {:?}", scores);
}

#[test]
fn test_lexical_scores_are_bounded() {
    let encoder = LexicalCrossEncoder::new();
    let scores = encoder
        .score(
            "rust memory safety",
            &docs(&["rust memory safety", "", "unrelated text", "Rust!"]),
        )
        .unwrap();

    for score in scores {
        assert!(score.is_finite());
        assert!((0.0..=1.0).contains(&score), "score {score} out of range");
    }
}

#[test]
fn test_lexical_stop_word_query_falls_back_to_length_ratio() {
    let encoder = LexicalCrossEncoder::new();
    let scores = encoder.score("what is it", &docs(&["what is it"])).unwrap();
    assert!((scores[0] - 0.3).abs() < 1e-6);
}

#[test]
fn test_lexical_empty_batch() {
    let encoder = LexicalCrossEncoder::new();
    assert!(encoder.score("query", &[]).unwrap().is_empty());
}

#[test]
fn test_stub_loader_builds_lexical_encoder() {
    let loader = StubLoader::new("cross-encoder/test");
    assert_eq!(loader.model_id(), "cross-encoder/test");

    let encoder = loader.load().unwrap();
    assert_eq!(encoder.name(), "lexical");
    assert!(encoder.is_stub());
}

#[test]
fn test_instance_loader_returns_same_encoder() {
    let mock = MockCrossEncoder::new();
    let loader = InstanceLoader::new("instance", Arc::new(mock.clone()));

    let encoder = loader.load().unwrap();
    encoder.score("q", &docs(&["a"])).unwrap();

    assert_eq!(loader.model_id(), "instance");
    assert_eq!(mock.call_count(), 1);
}

#[test]
fn test_loader_from_config_without_path_uses_stub() {
    let config = Config::default();
    let loader = loader_from_config(&config);

    assert_eq!(loader.model_id(), config.model_name);
    assert!(loader.load().is_ok());
}

#[test]
fn test_loader_from_config_with_empty_dir_reports_missing_files() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        model_path: Some(dir.path().to_path_buf()),
        ..Config::default()
    };

    let err = loader_from_config(&config).load().unwrap_err();
    match err {
        ModelError::ModelNotFound { path } => {
            assert_eq!(path, dir.path().join("config.json"));
        }
        other => panic!("expected ModelNotFound, got {other:?}"),
    }
}

#[test]
fn test_bert_load_missing_dir() {
    let missing = PathBuf::from("/nonexistent/crossrank/model");
    let err = BertCrossEncoder::load("m", &missing, 512).unwrap_err();
    assert!(matches!(err, ModelError::ModelNotFound { .. }));
}

#[test]
fn test_mock_encoder_scripts() {
    let mock = MockCrossEncoder::new().with_scores(vec![0.1, 0.9]);
    assert_eq!(mock.score("q", &docs(&["a", "b"])).unwrap(), vec![0.1, 0.9]);

    let default = MockCrossEncoder::new();
    assert_eq!(
        default.score("q", &docs(&["a", "b"])).unwrap(),
        vec![1.0, 0.5]
    );

    let failing = MockCrossEncoder::new().failing(ModelError::InferenceFailed {
        reason: "boom".into(),
    });
    assert!(failing.score("q", &docs(&["a"])).is_err());
    assert_eq!(failing.call_count(), 1);
}

#[test]
fn test_model_state_serializes_snake_case() {
    assert_eq!(
        serde_json::to_string(&ModelState::Uninitialized).unwrap(),
        "\"uninitialized\""
    );
    assert_eq!(ModelState::Ready.to_string(), "ready");
}

#[tokio::test]
async fn test_lifecycle_loads_lazily_and_warms_up() {
    let mock = MockCrossEncoder::new();
    let loader = MockLoader::new(mock.clone());
    let lifecycle = ModelLifecycle::new(Arc::new(loader.clone()));

    assert_eq!(lifecycle.state(), ModelState::Uninitialized);
    assert!(lifecycle.encoder().is_none());
    assert_eq!(loader.load_count(), 0);

    let encoder = lifecycle.ensure_loaded().await.unwrap();
    assert_eq!(encoder.name(), "mock");
    assert_eq!(lifecycle.state(), ModelState::Ready);
    assert!(lifecycle.is_ready());
    assert_eq!(loader.load_count(), 1);
    assert_eq!(mock.call_count(), 1, "warm-up should score once");

    lifecycle.ensure_loaded().await.unwrap();
    assert_eq!(loader.load_count(), 1);
}

#[tokio::test]
async fn test_lifecycle_concurrent_callers_share_one_load() {
    let loader = MockLoader::new(MockCrossEncoder::new()).with_delay(Duration::from_millis(50));
    let lifecycle = ModelLifecycle::new(Arc::new(loader.clone()));

    let calls = (0..8).map(|_| {
        let lifecycle = lifecycle.clone();
        async move { lifecycle.ensure_loaded().await }
    });
    let results = futures::future::join_all(calls).await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(loader.load_count(), 1);
}

#[tokio::test]
async fn test_lifecycle_failed_load_is_retried() {
    let loader = MockLoader::new(MockCrossEncoder::new()).failing(ModelError::LoadFailed {
        reason: "weights corrupt".into(),
    });
    let lifecycle = ModelLifecycle::new(Arc::new(loader.clone()));

    assert!(lifecycle.ensure_loaded().await.is_err());
    assert_eq!(lifecycle.state(), ModelState::Failed);
    assert!(lifecycle.last_error().unwrap().contains("weights corrupt"));

    assert!(lifecycle.ensure_loaded().await.is_err());
    assert_eq!(loader.load_count(), 2);
}

#[tokio::test]
async fn test_lifecycle_concurrent_callers_share_one_failed_load() {
    let loader = MockLoader::new(MockCrossEncoder::new())
        .with_delay(Duration::from_millis(50))
        .failing(ModelError::LoadFailed {
            reason: "weights corrupt".into(),
        });
    let lifecycle = ModelLifecycle::new(Arc::new(loader.clone()));

    let calls = (0..8).map(|_| {
        let lifecycle = lifecycle.clone();
        async move { lifecycle.ensure_loaded().await }
    });
    let results = futures::future::join_all(calls).await;

    for result in &results {
        match result {
            Err(ModelError::LoadFailed { reason }) => assert_eq!(reason, "weights corrupt"),
            other => panic!("expected LoadFailed, got {other:?}"),
        }
    }
    assert_eq!(loader.load_count(), 1);
    assert_eq!(lifecycle.state(), ModelState::Failed);

    // A call made after the failure starts a fresh attempt.
    assert!(lifecycle.ensure_loaded().await.is_err());
    assert_eq!(loader.load_count(), 2);
}

#[tokio::test]
async fn test_lifecycle_preload_in_background() {
    let loader = MockLoader::new(MockCrossEncoder::new()).with_delay(Duration::from_millis(20));
    let lifecycle = ModelLifecycle::new(Arc::new(loader));

    let handle = lifecycle.spawn_preload();
    handle.await.unwrap();

    assert!(lifecycle.is_ready());
    assert!(lifecycle.last_error().is_none());
}

#[tokio::test]
async fn test_lifecycle_abandoned_caller_does_not_cancel_load() {
    let loader = MockLoader::new(MockCrossEncoder::new()).with_delay(Duration::from_millis(80));
    let lifecycle = ModelLifecycle::new(Arc::new(loader.clone()));

    let gave_up =
        tokio::time::timeout(Duration::from_millis(10), lifecycle.ensure_loaded()).await;
    assert!(gave_up.is_err());

    lifecycle.ensure_loaded().await.unwrap();
    assert_eq!(loader.load_count(), 1);
}
