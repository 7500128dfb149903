//! Router-level tests for the gateway handlers.

use std::sync::Arc;
use std::time::Duration;

use axum::{Router, body::Body, http::Request, http::StatusCode, response::IntoResponse};
use http_body_util::BodyExt;
use tower::ServiceExt;

use crossrank::model::MockLoader;
use crossrank::{
    CROSSRANK_CACHE_HEADER, Config, MockCrossEncoder, ModelError, RerankError, RerankService,
};

use crate::gateway::create_router_with_state;
use crate::gateway::error::GatewayError;
use crate::gateway::handler::REQUEST_ID_HEADER;
use crate::gateway::state::HandlerState;

fn test_config() -> Config {
    Config {
        cache_size: 16,
        request_timeout: Duration::from_secs(5),
        workers: 2,
        max_queue: 4,
        ..Config::default()
    }
}

fn mock_service(config: &Config, encoder: MockCrossEncoder) -> RerankService {
    RerankService::with_encoder(config, Arc::new(encoder)).unwrap()
}

fn router_for(service: &RerankService) -> Router {
    create_router_with_state(HandlerState::new(service.clone()))
}

fn rerank_body() -> serde_json::Value {
    serde_json::json!({
        "query": "who founded fastapi",
        "documents": [
            {"text": "FastAPI was created by Sebastian Ramirez."},
            {"text": "Flask is a Python microframework released in 2010."}
        ],
        "top_k": 1
    })
}

async fn post_rerank(router: &Router, body: String) -> axum::response::Response {
    let request = Request::builder()
        .method("POST")
        .uri("/rerank")
        .header("Content-Type", "application/json")
        .body(Body::from(body))
        .unwrap();

    router.clone().oneshot(request).await.unwrap()
}

async fn post_json(router: &Router, body: serde_json::Value) -> axum::response::Response {
    post_rerank(router, serde_json::to_string(&body).unwrap()).await
}

async fn get(router: &Router, uri: &str) -> axum::response::Response {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    router.clone().oneshot(request).await.unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn cache_header(response: &axum::response::Response) -> &str {
    response
        .headers()
        .get(CROSSRANK_CACHE_HEADER)
        .unwrap()
        .to_str()
        .unwrap()
}

mod rerank_handler_tests {
    use super::*;

    #[tokio::test]
    async fn test_rerank_with_lexical_backend() {
        let service = RerankService::from_config(&test_config()).unwrap();
        let router = router_for(&service);

        let response = post_json(&router, rerank_body()).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(cache_header(&response), "MISS");
        assert!(response.headers().get(REQUEST_ID_HEADER).is_some());

        let body = body_json(response).await;
        assert_eq!(body["top_k_applied"], true);
        let rankings = body["rankings"].as_array().unwrap();
        assert_eq!(rankings.len(), 1);
        assert_eq!(rankings[0]["index"], 0);
        assert!(rankings[0]["score"].as_f64().unwrap() > 0.0);

        let ready = body_json(get(&router, "/ready").await).await;
        assert_eq!(ready["backend"], "lexical");
        assert_eq!(ready["mode"], "stub");
    }

    #[tokio::test]
    async fn test_repeat_request_hits_cache() {
        let service = mock_service(&test_config(), MockCrossEncoder::new());
        let router = router_for(&service);

        let first = post_json(&router, rerank_body()).await;
        let second = post_json(&router, rerank_body()).await;

        assert_eq!(cache_header(&first), "MISS");
        assert_eq!(cache_header(&second), "HIT");
        assert_eq!(body_json(first).await, body_json(second).await);
    }

    #[tokio::test]
    async fn test_rankings_are_sorted_with_index_tiebreak() {
        let encoder = MockCrossEncoder::new().with_scores(vec![0.2, 0.9, 0.9]);
        let router = router_for(&mock_service(&test_config(), encoder));

        let response = post_json(
            &router,
            serde_json::json!({"query": "q", "documents": [{"text": "a"}, {"text": "b"}, {"text": "c"}]}),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        let indices: Vec<u64> = body["rankings"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["index"].as_u64().unwrap())
            .collect();
        assert_eq!(indices, vec![1, 2, 0]);
        assert_eq!(body["top_k_applied"], false);
    }

    #[tokio::test]
    async fn test_document_aliases_are_accepted() {
        let router = router_for(&mock_service(&test_config(), MockCrossEncoder::new()));

        let response = post_json(
            &router,
            serde_json::json!({
                "query": "q",
                "documents": [{"content": "a"}, {"answer": "b", "metadata": {"id": 1}}]
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_top_k_larger_than_documents_is_clamped() {
        let router = router_for(&mock_service(&test_config(), MockCrossEncoder::new()));

        let response = post_json(
            &router,
            serde_json::json!({"query": "q", "documents": [{"text": "a"}], "top_k": 5}),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["rankings"].as_array().unwrap().len(), 1);
        assert_eq!(body["top_k_applied"], false);
    }
}

mod validation_tests {
    use super::*;

    async fn assert_bad_request(response: axum::response::Response) {
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["code"], 400);
        assert_eq!(body["kind"], "validation");
        assert!(body["error"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_malformed_json() {
        let router = router_for(&mock_service(&test_config(), MockCrossEncoder::new()));
        assert_bad_request(post_rerank(&router, "{not json".to_string()).await).await;
    }

    #[tokio::test]
    async fn test_missing_query() {
        let router = router_for(&mock_service(&test_config(), MockCrossEncoder::new()));
        let response = post_json(&router, serde_json::json!({"documents": [{"text": "a"}]})).await;
        assert_bad_request(response).await;
    }

    #[tokio::test]
    async fn test_empty_query() {
        let router = router_for(&mock_service(&test_config(), MockCrossEncoder::new()));
        let response = post_json(
            &router,
            serde_json::json!({"query": "", "documents": [{"text": "a"}]}),
        )
        .await;
        assert_bad_request(response).await;
    }

    #[tokio::test]
    async fn test_empty_documents() {
        let router = router_for(&mock_service(&test_config(), MockCrossEncoder::new()));
        let response = post_json(&router, serde_json::json!({"query": "q", "documents": []})).await;
        assert_bad_request(response).await;
    }

    #[tokio::test]
    async fn test_zero_and_negative_top_k() {
        let router = router_for(&mock_service(&test_config(), MockCrossEncoder::new()));

        let zero = post_json(
            &router,
            serde_json::json!({"query": "q", "documents": [{"text": "a"}], "top_k": 0}),
        )
        .await;
        assert_bad_request(zero).await;

        let negative = post_json(
            &router,
            serde_json::json!({"query": "q", "documents": [{"text": "a"}], "top_k": -1}),
        )
        .await;
        assert_bad_request(negative).await;
    }

    #[tokio::test]
    async fn test_unparseable_requests_are_counted() {
        let router = router_for(&mock_service(&test_config(), MockCrossEncoder::new()));

        assert_bad_request(post_rerank(&router, "{not json".to_string()).await).await;
        assert_bad_request(post_json(&router, serde_json::json!({"documents": "nope"})).await).await;
        assert_bad_request(
            post_json(&router, serde_json::json!({"query": "q", "documents": []})).await,
        )
        .await;

        let metrics = body_json(get(&router, "/metrics").await).await;
        assert_eq!(metrics["requests"]["total"], 3);
        assert_eq!(metrics["requests"]["failures"]["validation"], 3);
    }

    #[tokio::test]
    async fn test_validation_failure_does_not_load_model() {
        let service = mock_service(&test_config(), MockCrossEncoder::new());
        let router = router_for(&service);

        post_json(&router, serde_json::json!({"query": "", "documents": [{"text": "a"}]})).await;

        assert!(!service.lifecycle().is_ready());
    }
}

mod failure_mapping_tests {
    use super::*;

    #[tokio::test]
    async fn test_model_unavailable_is_503_with_retry_after() {
        let loader = MockLoader::new(MockCrossEncoder::new()).failing(ModelError::LoadFailed {
            reason: "no weights".into(),
        });
        let service = RerankService::new(&test_config(), Arc::new(loader)).unwrap();
        let router = router_for(&service);

        let response = post_json(&router, rerank_body()).await;

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers().get("retry-after").unwrap(), "1");
        let body = body_json(response).await;
        assert_eq!(body["kind"], "model_unavailable");
        assert_eq!(body["code"], 503);
    }

    #[tokio::test]
    async fn test_timeout_is_504() {
        let config = Config {
            request_timeout: Duration::from_millis(50),
            ..test_config()
        };
        let service = mock_service(
            &config,
            MockCrossEncoder::new().with_delay(Duration::from_millis(300)),
        );
        service.lifecycle().ensure_loaded().await.unwrap();
        let router = router_for(&service);

        let response = post_json(&router, rerank_body()).await;

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body_json(response).await["kind"], "timeout");
    }

    #[tokio::test]
    async fn test_inference_failure_is_500() {
        let encoder = MockCrossEncoder::new().failing(ModelError::InferenceFailed {
            reason: "bad tensor".into(),
        });
        let router = router_for(&mock_service(&test_config(), encoder));

        let response = post_json(&router, rerank_body()).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["kind"], "internal");
    }

    #[tokio::test]
    async fn test_backpressure_is_503() {
        let config = Config {
            workers: 1,
            max_queue: 0,
            ..test_config()
        };
        let service = mock_service(
            &config,
            MockCrossEncoder::new().with_delay(Duration::from_millis(200)),
        );
        service.lifecycle().ensure_loaded().await.unwrap();
        let router = router_for(&service);

        let busy = {
            let router = router.clone();
            tokio::spawn(async move { post_json(&router, rerank_body()).await.status() })
        };
        for _ in 0..100 {
            if service.gateway().busy() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let response = post_json(
            &router,
            serde_json::json!({"query": "other", "documents": [{"text": "a"}]}),
        )
        .await;

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers().get("retry-after").unwrap(), "1");
        assert_eq!(body_json(response).await["kind"], "backpressure");

        assert_eq!(busy.await.unwrap(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_gateway_error_responses() {
        let invalid = GatewayError::InvalidRequest("bad body".to_string()).into_response();
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
        let body = body_json(invalid).await;
        assert!(body["error"].as_str().unwrap().contains("bad body"));

        let internal = GatewayError::from(RerankError::internal("boom")).into_response();
        assert_eq!(internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(internal.headers().get("retry-after").is_none());

        let timeout = GatewayError::from(RerankError::Timeout {
            after: Duration::from_secs(1),
        });
        assert_eq!(timeout.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(timeout.kind(), "timeout");
    }
}

mod probe_tests {
    use super::*;

    #[tokio::test]
    async fn test_health_is_ok_without_loading_model() {
        let service = mock_service(&test_config(), MockCrossEncoder::new());
        let router = router_for(&service);

        let response = get(&router, "/health").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
        assert!(!service.lifecycle().is_ready());
    }

    #[tokio::test]
    async fn test_ready_is_informational_in_lazy_mode() {
        let router = router_for(&mock_service(&test_config(), MockCrossEncoder::new()));

        let response = get(&router, "/ready").await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "pending");
        assert_eq!(body["model_state"], "uninitialized");
        assert_eq!(body["preload"], false);
    }

    #[tokio::test]
    async fn test_ready_gates_in_preload_mode() {
        let config = Config {
            preload: true,
            ..test_config()
        };
        let service = mock_service(&config, MockCrossEncoder::new());
        let router = router_for(&service);

        assert_eq!(
            get(&router, "/ready").await.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );

        service.start_preload().unwrap().await.unwrap();

        let response = get(&router, "/ready").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["model_state"], "ready");
        assert_eq!(body["model"], config.model_name);
    }

    #[tokio::test]
    async fn test_metrics_json() {
        let service = mock_service(&test_config(), MockCrossEncoder::new());
        let router = router_for(&service);
        post_json(&router, rerank_body()).await;
        post_json(&router, rerank_body()).await;

        let response = get(&router, "/metrics").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert!(body["memory"]["rss_mb"].is_number());
        assert!(body["cpu_percent"].is_number());
        assert!(body["num_threads"].is_number());
        assert_eq!(body["cache"]["hits"], 1);
        assert_eq!(body["cache"]["misses"], 1);
        assert_eq!(body["cache"]["size"], 1);
        assert_eq!(body["requests"]["total"], 2);
        assert_eq!(body["scoring"]["calls"], 1);
    }

    #[tokio::test]
    async fn test_prometheus_text() {
        let router = router_for(&mock_service(&test_config(), MockCrossEncoder::new()));
        post_json(&router, rerank_body()).await;

        let response = get(&router, "/metrics/prometheus").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            response
                .headers()
                .get("content-type")
                .unwrap()
                .to_str()
                .unwrap()
                .starts_with("text/plain")
        );

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("crossrank_requests_total 1"));
        assert!(text.contains("crossrank_cache_misses_total 1"));
    }
}
