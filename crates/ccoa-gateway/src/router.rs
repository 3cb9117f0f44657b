use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{chat_handler, health_handler, onboard_handler, root_handler};
use super::server::AppState;

const MAX_RATE_LIMIT_ENTRIES: usize = 10_000;
const RATE_WINDOW: Duration = Duration::from_secs(60);

#[derive(Clone)]
struct RateLimitState {
    limit: u32,
    counters: Arc<Mutex<HashMap<IpAddr, (u32, Instant)>>>,
}

/// Build the HTTP router. `rate_limit` is requests per minute per client IP
/// on the `/api/v1` routes; `0` disables limiting.
pub fn build_router(state: AppState, rate_limit: u32, max_body_size: usize) -> Router {
    let rate_state = RateLimitState {
        limit: rate_limit,
        counters: Arc::new(Mutex::new(HashMap::new())),
    };

    let api = Router::new()
        .route("/api/v1/onboard", post(onboard_handler))
        .route("/api/v1/chat", post(chat_handler))
        .layer(middleware::from_fn_with_state(
            rate_state,
            rate_limit_middleware,
        ))
        .layer(RequestBodyLimitLayer::new(max_body_size));

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn rate_limit_middleware(
    axum::extract::State(state): axum::extract::State<RateLimitState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if state.limit == 0 {
        return next.run(req).await;
    }

    let ip = req
        .extensions()
        .get::<ConnectInfo<std::net::SocketAddr>>()
        .map_or(IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED), |ci| ci.0.ip());

    let now = Instant::now();
    let mut counters = state.counters.lock().await;

    if counters.len() >= MAX_RATE_LIMIT_ENTRIES && !counters.contains_key(&ip) {
        counters.retain(|_, (_, ts)| now.duration_since(*ts) < RATE_WINDOW);
    }

    let entry = counters.entry(ip).or_insert((0, now));
    if now.duration_since(entry.1) >= RATE_WINDOW {
        *entry = (1, now);
    } else {
        entry.0 += 1;
        if entry.0 > state.limit {
            tracing::warn!(%ip, "rate limit exceeded");
            return StatusCode::TOO_MANY_REQUESTS.into_response();
        }
    }
    drop(counters);

    next.run(req).await
}

#[cfg(test)]
pub(crate) mod tests {
    use std::path::Path;

    use axum::body::Body;
    use ccoa_core::prompts::NO_MATCH_ANSWER;
    use ccoa_core::repo::{CloneError, FetchFuture, RepoFetcher};
    use ccoa_core::session::collection_name;
    use ccoa_core::{Assistant, AssistantSettings};
    use ccoa_llm::any::AnyProvider;
    use ccoa_llm::mock::MockProvider;
    use ccoa_memory::document::{IngestionPipeline, SelectorConfig, SplitterConfig, TextSplitter};
    use ccoa_memory::{GatewayConfig, InMemoryVectorStore, VectorStoreGateway};
    use http_body_util::BodyExt;
    use tower::ServiceExt;
    use url::Url;

    use super::*;

    const PLAN: &str = r#"{"learning_path": [{"step": 1, "title": "Entry point",
        "description": "Read main.py", "files_to_review": ["main.py"], "external_resources": []}],
        "starter_tasks": [{"title": "Add docs", "description": "Document foo",
        "suggested_files": ["main.py"]}]}"#;

    struct FixtureFetcher(Vec<(&'static str, &'static str)>);

    impl RepoFetcher for FixtureFetcher {
        fn fetch<'a>(&'a self, _url: &'a Url, dest: &'a Path) -> FetchFuture<'a> {
            Box::pin(async move {
                std::fs::create_dir_all(dest).map_err(CloneError::Spawn)?;
                for (path, content) in &self.0 {
                    std::fs::write(dest.join(path), content).map_err(CloneError::Spawn)?;
                }
                Ok(())
            })
        }
    }

    fn assistant(provider: MockProvider, files: Vec<(&'static str, &'static str)>) -> Arc<Assistant> {
        let provider = AnyProvider::Mock(provider);
        let gateway = VectorStoreGateway::new(
            Arc::new(InMemoryVectorStore::new()),
            provider.embed_fn(),
            GatewayConfig::default(),
        );
        let pipeline = IngestionPipeline::new(
            SelectorConfig::default(),
            TextSplitter::new(SplitterConfig::default()),
        );
        Arc::new(Assistant::new(
            provider,
            gateway,
            pipeline,
            Arc::new(FixtureFetcher(files)),
            AssistantSettings::default(),
        ))
    }

    pub(crate) fn test_assistant() -> Arc<Assistant> {
        assistant(MockProvider::default(), Vec::new())
    }

    fn make_router(assistant: Arc<Assistant>, rate_limit: u32) -> Router {
        build_router(AppState::new(assistant), rate_limit, 65_536)
    }

    fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap()
    }

    async fn json_body(resp: Response) -> serde_json::Value {
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn root_reports_running() {
        let app = make_router(test_assistant(), 0);
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(
            json_body(resp).await,
            serde_json::json!({"message": "CCOA Backend is running!"})
        );
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let app = make_router(test_assistant(), 0);
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), 200);
        let json = json_body(resp).await;
        assert_eq!(json["status"], "ok");
        assert!(json["uptime_secs"].is_u64());
    }

    #[tokio::test]
    async fn onboard_then_chat() {
        let url = "https://github.com/acme/demo";
        let a = assistant(
            MockProvider::with_responses(vec![PLAN.into(), "foo is defined in main.py".into()]),
            vec![("main.py", "def foo(): pass")],
        );

        let resp = make_router(Arc::clone(&a), 0)
            .oneshot(post_json("/api/v1/onboard", &serde_json::json!({"repo_url": url})))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let plan = json_body(resp).await;
        assert_eq!(plan["learning_path"][0]["title"], "Entry point");
        assert_eq!(plan["starter_tasks"][0]["suggested_files"][0], "main.py");
        assert!(plan["message"].as_str().unwrap().contains(url));

        let resp = make_router(a, 0)
            .oneshot(post_json(
                "/api/v1/chat",
                &serde_json::json!({"session_id": collection_name(url), "query": "where is foo"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let chat = json_body(resp).await;
        assert_eq!(chat["answer"], "foo is defined in main.py");
        assert_eq!(chat["provenance"][0]["file_path"], "main.py");
        assert_eq!(chat["provenance"][0]["content_chunk"], "def foo(): pass");
    }

    #[tokio::test]
    async fn chat_unknown_session_returns_no_match() {
        let app = make_router(test_assistant(), 0);
        let resp = app
            .oneshot(post_json(
                "/api/v1/chat",
                &serde_json::json!({"session_id": "never_onboarded", "query": "hi"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let json = json_body(resp).await;
        assert_eq!(json["answer"], NO_MATCH_ANSWER);
        assert_eq!(json["provenance"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn onboard_invalid_url_is_bad_request() {
        let app = make_router(test_assistant(), 0);
        let resp = app
            .oneshot(post_json("/api/v1/onboard", &serde_json::json!({"repo_url": ""})))
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        assert_eq!(json_body(resp).await["kind"], "invalid_request");
    }

    #[tokio::test]
    async fn onboard_without_supported_files_is_no_content() {
        let app = make_router(assistant(MockProvider::default(), vec![("logo.png", "x")]), 0);
        let resp = app
            .oneshot(post_json(
                "/api/v1/onboard",
                &serde_json::json!({"repo_url": "https://github.com/acme/images"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let json = json_body(resp).await;
        assert_eq!(json["kind"], "no_content");
        assert_eq!(json["detail"], "No supported files found in the repository.");
    }

    #[tokio::test]
    async fn onboard_generation_failure_is_server_error() {
        let app = make_router(assistant(MockProvider::failing(), vec![("main.py", "x = 1")]), 0);
        let resp = app
            .oneshot(post_json(
                "/api/v1/onboard",
                &serde_json::json!({"repo_url": "https://github.com/acme/demo"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), 500);
        assert_eq!(json_body(resp).await["kind"], "generation");
    }

    #[tokio::test]
    async fn blank_query_is_bad_request() {
        let app = make_router(test_assistant(), 0);
        let resp = app
            .oneshot(post_json(
                "/api/v1/chat",
                &serde_json::json!({"session_id": "s", "query": "   "}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        assert_eq!(json_body(resp).await["kind"], "invalid_request");
    }

    #[tokio::test]
    async fn malformed_json_is_invalid_request() {
        let app = make_router(test_assistant(), 0);
        let req = Request::builder()
            .method("POST")
            .uri("/api/v1/chat")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), 400);
        assert_eq!(json_body(resp).await["kind"], "invalid_request");
    }

    #[tokio::test]
    async fn missing_field_is_invalid_request() {
        let app = make_router(test_assistant(), 0);
        let resp = app
            .oneshot(post_json("/api/v1/chat", &serde_json::json!({"query": "hi"})))
            .await
            .unwrap();
        assert!(resp.status().is_client_error());
        assert_eq!(json_body(resp).await["kind"], "invalid_request");
    }

    #[tokio::test]
    async fn rate_limit_enforced() {
        use tower::Service;

        let mut app = make_router(test_assistant(), 2);
        let make_req = || {
            post_json(
                "/api/v1/chat",
                &serde_json::json!({"session_id": "s", "query": "q"}),
            )
        };

        let resp = app.call(make_req()).await.unwrap();
        assert_eq!(resp.status(), 200);
        let resp = app.call(make_req()).await.unwrap();
        assert_eq!(resp.status(), 200);
        let resp = app.call(make_req()).await.unwrap();
        assert_eq!(resp.status(), 429);
    }

    #[tokio::test]
    async fn health_is_not_rate_limited() {
        use tower::Service;

        let mut app = make_router(test_assistant(), 1);
        for _ in 0..3 {
            let req = Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap();
            assert_eq!(app.call(req).await.unwrap().status(), 200);
        }
    }

    #[tokio::test]
    async fn body_size_limit() {
        let app = build_router(AppState::new(test_assistant()), 0, 64);
        let oversized = vec![b'a'; 128];
        let req = Request::builder()
            .method("POST")
            .uri("/api/v1/chat")
            .header("content-type", "application/json")
            .body(Body::from(oversized))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), 413);
    }

    #[tokio::test]
    async fn cors_allows_any_origin() {
        let app = make_router(test_assistant(), 0);
        let req = Request::builder()
            .method("OPTIONS")
            .uri("/api/v1/chat")
            .header("origin", "http://localhost:3000")
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert!(resp.status().is_success());
        assert_eq!(
            resp.headers()
                .get("access-control-allow-origin")
                .and_then(|v| v.to_str().ok()),
            Some("*")
        );
    }
}
