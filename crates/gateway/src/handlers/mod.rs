//! API handlers module

pub mod ask;
pub mod health;
pub mod knowledge;
pub mod stats;

#[cfg(test)]
mod tests {
    use crate::{build_state, create_router, AppState};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use pestwise_common::config::AppConfig;
    use serde_json::Value;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use tower::ServiceExt;

    const KB: &str = r#"
pest(fall_armyworm, [type: insect, controls: [hand_picking, push_pull, neem_oil]]).
crop(maize, [pests: [fall_armyworm, stemborer], soil_ph: "5.8-7.0"]).
"#;

    fn source_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pestwise-gateway-{}-{}", std::process::id(), name));
        let _ = std::fs::remove_dir_all(&dir);
        tokio_test::assert_ok!(std::fs::create_dir_all(&dir));
        tokio_test::assert_ok!(std::fs::write(dir.join("pests.kb"), KB));
        dir
    }

    fn state(dir: &Path) -> AppState {
        let mut config = AppConfig::default();
        config.knowledge.source_dir = dir.display().to_string();
        // Nothing listens here, so every generated answer is a fallback
        config.generation.base_url = "http://127.0.0.1:9".to_string();
        config.generation.probe_timeout_secs = 1;
        config.generation.probe_wait_ms = 1500;
        build_state(Arc::new(config)).unwrap()
    }

    async fn send(state: &AppState, request: Request<Body>) -> (StatusCode, Value) {
        let response = create_router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let state = state(&source_dir("health"));
        let (status, body) = send(&state, Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_ask_answers_from_knowledge() {
        let state = state(&source_dir("ask-kb"));
        let (status, body) = send(
            &state,
            post_json("/v1/ask", serde_json::json!({"query": "How can I control fall armyworm?"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["source"], "kb");
        assert_eq!(body["intent"], "pest_management");
        assert_eq!(body["metadata"]["matched_frame_id"], "pest:fall_armyworm");
    }

    #[tokio::test]
    async fn test_ask_falls_back_when_backend_is_down() {
        let state = state(&source_dir("ask-fallback"));
        let (status, body) = send(
            &state,
            post_json("/v1/ask", serde_json::json!({"query": "What is crop rotation?", "context": "Kisumu"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["source"], "fallback");
        assert!(!body["answer"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ask_rejects_empty_and_oversized_queries() {
        let state = state(&source_dir("ask-invalid"));

        let (status, body) = send(&state, post_json("/v1/ask", serde_json::json!({"query": ""}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let long = "a".repeat(2001);
        let (status, _) = send(&state, post_json("/v1/ask", serde_json::json!({"query": long}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_ready_reports_degraded_generation() {
        let state = state(&source_dir("ready"));
        let (status, body) = send(&state, Request::get("/ready").body(Body::empty()).unwrap()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["checks"]["knowledge_frames"], 2);
        assert!(body["checks"]["corpus_size"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_stats_filtered_by_component() {
        let state = state(&source_dir("stats"));
        send(
            &state,
            post_json("/v1/ask", serde_json::json!({"query": "How can I control fall armyworm?"})),
        )
        .await;

        let (status, body) = send(
            &state,
            Request::get("/v1/stats?component=orchestrator").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let components = body["monitor"]["components"].as_object().unwrap();
        assert_eq!(components.len(), 1);
        assert_eq!(components["orchestrator"]["overall"]["count"], 1);
        assert_eq!(body["knowledge"]["total_frames"], 2);
    }

    #[tokio::test]
    async fn test_reload_swaps_knowledge() {
        let dir = source_dir("reload");
        let state = state(&dir);
        std::fs::write(
            dir.join("practices.kb"),
            "practice(wood_ash, [description: \"Dust ash on leaves\"]).\n",
        )
        .unwrap();

        let (status, body) = send(
            &state,
            Request::post("/v1/knowledge/reload").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["version"], 2);
        assert_eq!(body["report"]["frames"], 3);

        // An empty directory is rejected and the old store keeps serving
        std::fs::remove_file(dir.join("pests.kb")).unwrap();
        std::fs::remove_file(dir.join("practices.kb")).unwrap();
        let (status, _) = send(
            &state,
            Request::post("/v1/knowledge/reload").body(Body::empty()).unwrap(),
        )
        .await;
        assert!(status.is_server_error());
        assert_eq!(state.orchestrator.knowledge().len(), 3);
    }
}
