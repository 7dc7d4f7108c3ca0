//! API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::types::ApiContext;
use crate::pipeline::processor::PipelineProcessor;

/// Build the API router around a shared processor.
pub fn api_router(processor: Arc<PipelineProcessor>) -> Router {
    build_router(ApiContext::new(processor))
}

fn build_router(ctx: ApiContext) -> Router {
    Router::new()
        .route("/process", post(endpoints::process::run))
        .route("/api/health", get(endpoints::health::check))
        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        // Any origin, any method, any header
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::pipeline::acquisition::{
        EvidenceAcquirer, MockBarcodeDecoder, MockImageFetcher, MockOcrEngine, MockProductLookup,
    };
    use crate::pipeline::enrichment::{MockWorkflowClient, ProductEnricher};
    use crate::pipeline::structuring::{MockLlmClient, ProductStructurer};

    fn test_processor(llm: MockLlmClient, workflow: MockWorkflowClient) -> Arc<PipelineProcessor> {
        Arc::new(PipelineProcessor::new(
            EvidenceAcquirer::new(
                Box::new(MockImageFetcher::new(b"\xff\xd8\xff")),
                Box::new(MockOcrEngine::new("Oat Drink Barista 1L")),
                Box::new(MockBarcodeDecoder::new(&[("EAN13", "7394376616037")])),
                Box::new(MockProductLookup::new().with_product(
                    "7394376616037",
                    "Oat Drink Barista",
                    "Oatly",
                    "1 l",
                )),
            ),
            ProductStructurer::new(Box::new(llm), "test-model"),
            ProductEnricher::new(Box::new(workflow)),
        ))
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json")
            .header("Origin", "http://localhost:3000")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn process_returns_record() {
        let enriched = "```json\n{\"product_name\": \"Oat Drink Barista\", \"brand\": \"Oatly\", \"item_weight\": 1, \"weight_unit\": \"l\"}\n```";
        let app = api_router(test_processor(
            MockLlmClient::new("{\"product_name\": \"Oat Drink\"}"),
            MockWorkflowClient::replying(enriched),
        ));

        let response = app
            .oneshot(post_json(
                "/process",
                r#"{"product": {"product_image": "https://img.test/oat.jpg", "barcode": "n/a"}}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("access-control-allow-origin"));
        let json = body_json(response).await;
        assert_eq!(json["product_name"], "Oat Drink Barista");
        assert_eq!(json["brand"], "Oatly");
        assert!(json["barcode"].is_null());
        assert_eq!(json.as_object().unwrap().len(), 17);
    }

    #[tokio::test]
    async fn pipeline_failure_is_200_with_error_object() {
        let app = api_router(test_processor(
            MockLlmClient::failing(401),
            MockWorkflowClient::replying("{}"),
        ));

        let response = app
            .oneshot(post_json("/process", r#"{"product": {"barcode": "7394376616037"}}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().starts_with("Structuring failed"));
        assert!(json["raw"]
            .as_str()
            .unwrap()
            .contains("Product Info for 7394376616037:"));
    }

    #[tokio::test]
    async fn malformed_body_is_400() {
        let app = api_router(test_processor(
            MockLlmClient::new("{}"),
            MockWorkflowClient::replying("{}"),
        ));

        let response = app
            .oneshot(post_json("/process", r#"{"item": {}}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let app = api_router(test_processor(
            MockLlmClient::new("{}"),
            MockWorkflowClient::replying("{}"),
        ));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], crate::config::APP_VERSION);
    }

    #[tokio::test]
    async fn cors_preflight_allowed() {
        let app = api_router(test_processor(
            MockLlmClient::new("{}"),
            MockWorkflowClient::replying("{}"),
        ));

        let response = app
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/process")
                    .header("Origin", "http://localhost:3000")
                    .header("Access-Control-Request-Method", "POST")
                    .header("Access-Control-Request-Headers", "content-type")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "*"
        );
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let app = api_router(test_processor(
            MockLlmClient::new("{}"),
            MockWorkflowClient::replying("{}"),
        ));

        let response = app
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
