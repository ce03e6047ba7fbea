//! Integration tests for semantic tool discovery.
//!
//! A deterministic bag-of-words embedder stands in for the ONNX model so the
//! ranked path, the threshold and index persistence can be checked end to end.
//! The last test uses the real model:
//! cargo test --test test_semantic_routing -- --ignored --test-threads=1

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use ndarray::Array2;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use toolgate::{
    ingestion::{load_manifest, register_builtins, register_manifest},
    router, AppState, Config, Embedder, SearchOptions, SearchService, TargetInfo, ToolRegistry,
    Transport,
};
use tower::ServiceExt;

const MANIFEST: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data/tools.json");

const VOCABULARY: [&str; 10] = [
    "wall", "column", "slab", "door", "window", "create", "delete", "list", "property", "layer",
];

/// One dimension per vocabulary word plus a small constant bias, L2-normalized.
#[derive(Default)]
struct BagOfWords {
    batches: AtomicUsize,
}

impl Embedder for BagOfWords {
    fn model_id(&self) -> &str {
        "bag-of-words"
    }

    fn embed_batch(&self, texts: &[String]) -> toolgate::Result<Array2<f32>> {
        self.batches.fetch_add(1, Ordering::SeqCst);

        let dim = VOCABULARY.len() + 1;
        let mut data = Vec::with_capacity(texts.len() * dim);
        for text in texts {
            let text = text.to_lowercase();
            let mut row: Vec<f32> = VOCABULARY
                .iter()
                .map(|word| if text.contains(word) { 1.0 } else { 0.0 })
                .collect();
            row.push(0.1);
            let norm = row.iter().map(|v| v * v).sum::<f32>().sqrt();
            data.extend(row.into_iter().map(|v| v / norm));
        }

        Ok(Array2::from_shape_vec((texts.len(), dim), data).unwrap())
    }
}

struct NoTargets;

#[async_trait]
impl Transport for NoTargets {
    async fn list_targets(&self) -> toolgate::Result<Vec<TargetInfo>> {
        Ok(vec![])
    }

    async fn describe(&self, target: u16) -> anyhow::Result<TargetInfo> {
        anyhow::bail!("no target on port {target}")
    }

    async fn execute(&self, _: u16, _: &str, _: Option<Value>) -> anyhow::Result<Value> {
        anyhow::bail!("no targets")
    }
}

fn registry() -> Arc<ToolRegistry> {
    let transport: Arc<dyn Transport> = Arc::new(NoTargets);
    let mut registry = ToolRegistry::new();
    register_builtins(&mut registry, transport.clone()).unwrap();
    register_manifest(
        &mut registry,
        load_manifest(Path::new(MANIFEST)).unwrap(),
        transport,
    );
    Arc::new(registry)
}

/// Helper to create a router whose search index is built with `embedder`.
fn create_test_app(embedder: Arc<BagOfWords>, index_path: &Path) -> Router {
    let registry = registry();
    let search = SearchService::build_or_load(
        registry.clone(),
        Some(embedder as Arc<dyn Embedder>),
        index_path,
        SearchOptions::default(),
    );
    assert!(search.is_ready());

    let state = AppState::from_parts(Config::default(), registry, search, Arc::new(NoTargets), 2);
    router(Arc::new(state))
}

/// Helper to make JSON POST request.
async fn json_post(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(req).await.unwrap();
    let status = response.status();

    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&body_bytes).unwrap_or(json!({}));

    (status, body)
}

fn scores(response: &Value) -> Vec<f64> {
    response["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["score"].as_f64().unwrap())
        .collect()
}

// ============================================================================
// Ranked Discovery Tests
// ============================================================================

#[tokio::test]
async fn test_closest_tool_ranks_first() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_test_app(Arc::default(), &dir.path().join("index.bin"));

    let (status, response) = json_post(app, "/tools/discover", json!({ "query": "create a wall" })).await;

    assert_eq!(status, StatusCode::OK);
    let tools = response["tools"].as_array().unwrap();
    assert_eq!(tools[0]["name"], "create_wall");

    let score = tools[0]["score"].as_f64().unwrap();
    assert!(score > 0.99 && score <= 1.0, "score {score} out of range");
}

#[tokio::test]
async fn test_default_threshold_filters_weak_matches() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_test_app(Arc::default(), &dir.path().join("index.bin"));

    let (_, response) = json_post(app, "/tools/discover", json!({ "query": "create a wall" })).await;

    // create_column shares only "create" and falls below 0.55
    let names: Vec<&str> = response["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["create_wall"]);
}

#[tokio::test]
async fn test_lower_threshold_returns_sorted_results() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_test_app(Arc::default(), &dir.path().join("index.bin"));

    let (status, response) = json_post(
        app,
        "/tools/discover",
        json!({ "query": "create a wall", "threshold": 0.3 }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let scores = scores(&response);
    assert!(scores.len() > 1);
    assert!(scores.iter().all(|s| *s >= 0.3));
    for pair in scores.windows(2) {
        assert!(pair[0] >= pair[1], "results should be sorted by score descending");
    }
    assert_eq!(response["tools"][1]["name"], "create_column");
}

#[tokio::test]
async fn test_huge_limit_is_served() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_test_app(Arc::default(), &dir.path().join("index.bin"));

    let (status, response) = json_post(
        app,
        "/tools/discover",
        json!({ "query": "create a wall", "limit": u64::MAX, "threshold": 0.3 }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    // Four manifest tools plus the built-in
    assert!(response["tools"].as_array().unwrap().len() <= 5);
    assert_eq!(response["tools"][0]["name"], "create_wall");
}

#[tokio::test]
async fn test_unrelated_query_returns_empty() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_test_app(Arc::default(), &dir.path().join("index.bin"));

    let (status, response) = json_post(app, "/tools/discover", json!({ "query": "open a door" })).await;

    assert_eq!(status, StatusCode::OK);
    assert!(response["tools"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_threshold_returns_400() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_test_app(Arc::default(), &dir.path().join("index.bin"));

    let (status, response) = json_post(
        app,
        "/tools/discover",
        json!({ "query": "wall", "threshold": 1.5 }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(response["error"].as_str().unwrap().contains("threshold"));
}

// ============================================================================
// Persistence Tests
// ============================================================================

#[tokio::test]
async fn test_persisted_index_is_reused() {
    let dir = tempfile::tempdir().unwrap();
    let index_path = dir.path().join("index.bin");

    let first = Arc::new(BagOfWords::default());
    create_test_app(first.clone(), &index_path);
    assert_eq!(first.batches.load(Ordering::SeqCst), 1);
    assert!(index_path.exists());

    // Same catalog and model: only the query gets embedded
    let second = Arc::new(BagOfWords::default());
    let app = create_test_app(second.clone(), &index_path);
    assert_eq!(second.batches.load(Ordering::SeqCst), 0);

    let (_, response) = json_post(app, "/tools/discover", json!({ "query": "delete" })).await;
    assert_eq!(response["tools"][0]["name"], "delete_elements");
    assert_eq!(second.batches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_corrupt_index_is_rebuilt() {
    let dir = tempfile::tempdir().unwrap();
    let index_path = dir.path().join("index.bin");
    std::fs::write(&index_path, b"definitely not an index").unwrap();

    let embedder = Arc::new(BagOfWords::default());
    let app = create_test_app(embedder.clone(), &index_path);
    assert_eq!(embedder.batches.load(Ordering::SeqCst), 1);

    let (status, response) = json_post(app, "/tools/discover", json!({ "query": "create a wall" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["tools"][0]["name"], "create_wall");
}

// ============================================================================
// Real Model Tests
// ============================================================================

#[tokio::test]
#[ignore = "Requires embedding model files - run with --ignored"]
async fn test_real_model_finds_wall_tool() {
    std::env::set_var("TOOLS_PATH", MANIFEST);
    let dir = tempfile::tempdir().unwrap();
    std::env::set_var("INDEX_PATH", dir.path().join("index.bin"));

    let config = Config::from_env().expect("Failed to load config");
    let state = Arc::new(AppState::new(config).expect("Failed to create AppState"));
    assert!(state.search.is_ready(), "embedding model did not load");

    let (status, response) = json_post(
        router(state),
        "/tools/discover",
        json!({ "query": "build a new wall on the ground floor", "threshold": 0.3 }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["tools"][0]["name"], "create_wall");
}
