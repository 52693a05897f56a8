use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use std::sync::{Arc, RwLock};
use tempfile::TempDir;
use tower::ServiceExt;
use vectormatch::{create_app, Store};

const DIM: usize = 4;

fn create_test_app(dir: &TempDir) -> axum::Router {
    let store = Store::open(DIM, dir.path()).unwrap();
    create_app(Arc::new(RwLock::new(store)))
}

fn padded(head: &[f32]) -> Vec<f32> {
    let mut v = head.to_vec();
    v.resize(DIM, 0.0);
    v
}

fn post_json(uri: &str, payload: &Value) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method("POST")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(payload).unwrap()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method("GET")
        .body(Body::empty())
        .unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method("DELETE")
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn add_vector(app: &axum::Router, id: &str, head: &[f32]) -> Value {
    let payload = json!({"id": id, "vector": padded(head)});
    let response = app.clone().oneshot(post_json("/add", &payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

#[tokio::test]
async fn test_health_check() {
    let dir = TempDir::new().unwrap();
    let app = create_test_app(&dir);

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "vectormatch");
}

#[tokio::test]
async fn test_add_returns_action_and_count() {
    let dir = TempDir::new().unwrap();
    let app = create_test_app(&dir);

    let json = add_vector(&app, "pos-1", &[1.0, 0.0]).await;
    assert_eq!(json["stored"], true);
    assert_eq!(json["ntotal"], 1);
    assert_eq!(json["internal_id"], 0);
    assert_eq!(json["action"], "added");

    let json = add_vector(&app, "pos-2", &[0.0, 1.0]).await;
    assert_eq!(json["ntotal"], 2);
    assert_eq!(json["internal_id"], 1);
    assert_eq!(json["action"], "added");
}

#[tokio::test]
async fn test_add_twice_same_id_is_update() {
    let dir = TempDir::new().unwrap();
    let app = create_test_app(&dir);

    add_vector(&app, "pos-1", &[1.0, 0.0]).await;
    let json = add_vector(&app, "pos-1", &[1.0, 0.0]).await;

    assert_eq!(json["action"], "updated");
    assert_eq!(json["ntotal"], 1);
    assert_eq!(json["internal_id"], 0);
}

#[tokio::test]
async fn test_add_with_metadata_round_trips_through_get() {
    let dir = TempDir::new().unwrap();
    let app = create_test_app(&dir);

    let payload = json!({
        "id": "pos-9",
        "vector": padded(&[0.5, 0.5]),
        "metadata": {"university": "ETH", "country": "CH"}
    });
    let response = app.clone().oneshot(post_json("/add", &payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/get/pos-9")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["id"], "pos-9");
    assert_eq!(json["internal_id"], 0);
    assert_eq!(json["metadata"]["university"], "ETH");
    let vector = json["vector"].as_array().unwrap();
    assert_eq!(vector.len(), DIM);
    assert!((vector[0].as_f64().unwrap() - 0.5).abs() < 1e-6);
}

#[tokio::test]
async fn test_add_dimension_mismatch() {
    let dir = TempDir::new().unwrap();
    let app = create_test_app(&dir);

    let payload = json!({"id": "pos-1", "vector": [1.0, 2.0]});
    let response = app.clone().oneshot(post_json("/add", &payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // The failed add must not have changed the store.
    let response = app.oneshot(get("/list")).await.unwrap();
    let json = body_json(response).await;
    assert_eq!(json["count"], 0);
}

#[tokio::test]
async fn test_add_non_finite_value() {
    let dir = TempDir::new().unwrap();
    let app = create_test_app(&dir);

    // NaN is not representable in JSON, but a value beyond f32 range
    // overflows to infinity during deserialization and must be rejected.
    let payload = json!({"id": "pos-1", "vector": [1.0e300, 0.0, 0.0, 0.0]});
    let response = app.clone().oneshot(post_json("/add", &payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert!(json["message"].as_str().unwrap().contains("non-finite"));

    let response = app.oneshot(get("/list")).await.unwrap();
    let json = body_json(response).await;
    assert_eq!(json["count"], 0);
}

#[tokio::test]
async fn test_search_ranked_inner_product() {
    let dir = TempDir::new().unwrap();
    let app = create_test_app(&dir);

    add_vector(&app, "A", &[1.0, 0.0]).await;
    add_vector(&app, "B", &[0.0, 1.0]).await;
    add_vector(&app, "C", &[0.9, 0.1]).await;

    let payload = json!({"vector": padded(&[1.0, 0.0]), "k": 2});
    let response = app.oneshot(post_json("/search", &payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["total_found"], 2);
    let results = json["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["original_id"], "A");
    assert_eq!(results[1]["original_id"], "C");
    assert!(results[0]["distance"].as_f64().unwrap() >= results[1]["distance"].as_f64().unwrap());
}

#[tokio::test]
async fn test_search_defaults_k_to_five() {
    let dir = TempDir::new().unwrap();
    let app = create_test_app(&dir);

    for i in 0..7 {
        add_vector(&app, &format!("pos-{i}"), &[1.0 / (i as f32 + 1.0)]).await;
    }

    let payload = json!({"vector": padded(&[1.0])});
    let response = app.oneshot(post_json("/search", &payload)).await.unwrap();
    let json = body_json(response).await;
    assert_eq!(json["results"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_search_empty_store_is_client_error() {
    let dir = TempDir::new().unwrap();
    let app = create_test_app(&dir);

    let payload = json!({"vector": padded(&[1.0]), "k": 3});
    let response = app.oneshot(post_json("/search", &payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert!(json["message"].as_str().unwrap().contains("empty"));
}

#[tokio::test]
async fn test_search_excludes_deleted_entries() {
    let dir = TempDir::new().unwrap();
    let app = create_test_app(&dir);

    add_vector(&app, "A", &[1.0, 0.0]).await;
    add_vector(&app, "B", &[0.0, 1.0]).await;
    add_vector(&app, "C", &[0.9, 0.1]).await;

    let response = app.clone().oneshot(delete("/delete/A")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["deleted"], true);
    assert_eq!(json["vector_id"], "A");
    assert_eq!(json["internal_id"], 0);

    let payload = json!({"vector": padded(&[1.0, 0.0]), "k": 3});
    let response = app.oneshot(post_json("/search", &payload)).await.unwrap();
    let json = body_json(response).await;

    let results = json["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["original_id"], "C");
    assert!(results.iter().all(|r| r["original_id"] != "A"));
}

#[tokio::test]
async fn test_get_unknown_id_is_not_found() {
    let dir = TempDir::new().unwrap();
    let app = create_test_app(&dir);

    let response = app.oneshot(get("/get/ghost")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reconstruct_by_slot() {
    let dir = TempDir::new().unwrap();
    let app = create_test_app(&dir);

    add_vector(&app, "pos-1", &[1.0, 0.0]).await;

    let response = app.clone().oneshot(get("/reconstruct/0")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["id"], "pos-1");

    let response = app.oneshot(get("/reconstruct/5")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_unknown_id_is_not_found() {
    let dir = TempDir::new().unwrap();
    let app = create_test_app(&dir);

    let response = app.oneshot(delete("/delete/ghost")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_and_all_enumerate_live_entries() {
    let dir = TempDir::new().unwrap();
    let app = create_test_app(&dir);

    add_vector(&app, "A", &[1.0]).await;
    let payload = json!({
        "id": "B",
        "vector": padded(&[0.0, 1.0]),
        "metadata": {"deadline": "2026-09-01"}
    });
    app.clone().oneshot(post_json("/add", &payload)).await.unwrap();

    let response = app.clone().oneshot(get("/list")).await.unwrap();
    let json = body_json(response).await;
    assert_eq!(json["count"], 2);
    assert_eq!(json["ids"][0]["original_id"], "A");
    assert_eq!(json["ids"][1]["internal_id"], 1);

    let response = app.clone().oneshot(get("/all")).await.unwrap();
    let json = body_json(response).await;
    assert_eq!(json["count"], 2);
    assert_eq!(json["entries"][1]["metadata"]["deadline"], "2026-09-01");
    assert!(json["entries"][1].get("vector").is_none());

    let response = app.oneshot(get("/all_with_vectors")).await.unwrap();
    let json = body_json(response).await;
    assert_eq!(json["entries"][0]["vector"].as_array().unwrap().len(), DIM);
}

#[tokio::test]
async fn test_clear_resets_store() {
    let dir = TempDir::new().unwrap();
    let app = create_test_app(&dir);

    add_vector(&app, "A", &[1.0]).await;
    add_vector(&app, "B", &[0.0, 1.0]).await;

    let response = app.clone().oneshot(delete("/clear")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["cleared"], true);
    assert_eq!(json["ntotal"], 0);

    let response = app.clone().oneshot(get("/list")).await.unwrap();
    let json = body_json(response).await;
    assert_eq!(json["count"], 0);

    let payload = json!({"vector": padded(&[1.0])});
    let response = app.oneshot(post_json("/search", &payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_info_stats_debug_snapshots() {
    let dir = TempDir::new().unwrap();
    let app = create_test_app(&dir);

    add_vector(&app, "A", &[1.0]).await;
    add_vector(&app, "B", &[0.0, 1.0]).await;
    app.clone().oneshot(delete("/delete/A")).await.unwrap();

    let response = app.clone().oneshot(get("/info")).await.unwrap();
    let json = body_json(response).await;
    assert_eq!(json["service"], "vectormatch");
    assert_eq!(json["dimension"], DIM as i64);
    assert_eq!(json["live_count"], 1);
    assert!(json["files"]["vectors"]
        .as_str()
        .unwrap()
        .ends_with("vectors.bin"));

    let response = app.clone().oneshot(get("/stats")).await.unwrap();
    let json = body_json(response).await;
    assert_eq!(json["stats"]["live_count"], 1);
    assert_eq!(json["stats"]["total_slots"], 2);
    assert_eq!(json["stats"]["deleted_slots"], 1);
    assert_eq!(json["stats"]["index_items"], 2);

    let response = app.oneshot(get("/debug")).await.unwrap();
    let json = body_json(response).await;
    assert_eq!(json["id_to_internal"]["B"], 1);
    assert_eq!(json["internal_to_id"]["1"], "B");
}
