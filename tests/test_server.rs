//! Integration test: Server API endpoints

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use learning_rate::server::{create_router, AppState, ServerConfig};
use learning_rate::storage::ObjectStorage;

fn test_app() -> Router {
    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        max_upload_size: 10 * 1024 * 1024,
    };
    let state = Arc::new(AppState::new(ObjectStorage::in_memory()));
    create_router(state, &config)
}

async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn upload_csv(app: &Router, file_name: &str, content: &str) -> StatusCode {
    let boundary = "test-boundary";
    let body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: text/csv\r\n\r\n{content}\r\n--{boundary}--\r\n"
    );
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/store_data")
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    response.status()
}

/// 100 rows with y = 2*f1 + 3*f2 + 1.
fn lin_reg_dataset() -> Vec<Value> {
    (0..100)
        .map(|i| {
            let f1 = (i % 10) as f64;
            let f2 = (i / 10) as f64;
            json!({ "f1": f1, "f2": f2, "y": 2.0 * f1 + 3.0 * f2 + 1.0 })
        })
        .collect()
}

/// Three well-separated blobs of 100 rows each.
fn cluster_dataset() -> Vec<Value> {
    let centers = [(0.0, 0.0), (10.0, 10.0), (20.0, 0.0)];
    let mut rows = Vec::new();
    for &(cx, cy) in &centers {
        for i in 0..100 {
            let jitter = (i % 7) as f64 * 0.1;
            rows.push(json!({ "a": cx + jitter, "b": cy - jitter }));
        }
    }
    rows
}

fn binary_class_dataset() -> Vec<Value> {
    (0..40)
        .map(|i| {
            let x = if i < 20 {
                i as f64 * 0.1
            } else {
                10.0 + (i - 20) as f64 * 0.1
            };
            json!({ "x": x, "label": if i < 20 { 0.0 } else { 1.0 } })
        })
        .collect()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = test_app();
    let (status, body) = get_json(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = test_app();
    let (status, _) = get_json(&app, "/no_such_route").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_lin_reg_end_to_end() {
    let app = test_app();

    let (status, body) = post_json(
        &app,
        "/train_lin_reg",
        json!({ "features": ["f1", "f2"], "target": "y", "dataset": lin_reg_dataset() }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let coefficients = body["coefficients"].as_object().unwrap();
    assert!((coefficients["f1"].as_f64().unwrap() - 2.0).abs() < 1e-6);
    assert!((coefficients["f2"].as_f64().unwrap() - 3.0).abs() < 1e-6);

    let (status, body) = post_json(
        &app,
        "/infer_lin_reg",
        json!({ "features": { "f1": 1.0, "f2": 2.0 } }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let prediction = body["prediction"].as_array().unwrap();
    assert_eq!(prediction.len(), 1);
    assert!((prediction[0].as_f64().unwrap() - 9.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_train_missing_fields_is_400() {
    let app = test_app();
    let (status, body) = post_json(
        &app,
        "/train_lin_reg",
        json!({ "features": ["f1"], "dataset": lin_reg_dataset() }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("target"));
}

#[tokio::test]
async fn test_infer_before_train_is_400() {
    let app = test_app();
    let (status, body) = post_json(
        &app,
        "/infer_lin_reg",
        json!({ "features": { "f1": 1.0, "f2": 2.0 } }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("not trained"));
}

#[tokio::test]
async fn test_load_lin_reg_reads_latest_registered() {
    let app = test_app();

    post_json(
        &app,
        "/train_lin_reg",
        json!({ "features": ["f1", "f2"], "target": "y", "dataset": lin_reg_dataset() }),
    )
    .await;

    // Second training run with a scaled target overwrites the slot
    let doubled: Vec<Value> = lin_reg_dataset()
        .into_iter()
        .map(|row| {
            json!({
                "f1": row["f1"], "f2": row["f2"],
                "y": row["y"].as_f64().unwrap() * 2.0
            })
        })
        .collect();
    post_json(
        &app,
        "/train_lin_reg",
        json!({ "features": ["f1", "f2"], "target": "y", "dataset": doubled }),
    )
    .await;

    let (status, body) =
        post_json(&app, "/load_lin_reg", json!({ "features": ["f1", "f2"] })).await;
    assert_eq!(status, StatusCode::OK);
    assert!((body["coefficients"]["f1"].as_f64().unwrap() - 4.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_log_reg_binary_keys_first_class_only() {
    let app = test_app();
    let (status, body) = post_json(
        &app,
        "/train_log_reg",
        json!({ "features": ["x"], "target": "label", "dataset": binary_class_dataset() }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    // One coefficient row in the binary variant, keyed by the first class
    let coefficients = body["coefficients"].as_object().unwrap();
    assert_eq!(coefficients.len(), 1);
    assert!(coefficients.contains_key("0"));
    assert_eq!(body["classes"], json!([0, 1]));

    let (status, body) = post_json(
        &app,
        "/infer_log_reg",
        json!({ "features": { "x": 11.0 } }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["prediction"], json!([1]));
}

#[tokio::test]
async fn test_log_reg_multinomial_keys_every_class() {
    let app = test_app();
    let dataset: Vec<Value> = (0..60)
        .map(|i| {
            let class = i / 20;
            json!({ "x": class as f64 * 10.0 + (i % 20) as f64 * 0.1, "label": class as f64 })
        })
        .collect();

    let (status, body) = post_json(
        &app,
        "/train_log_reg",
        json!({ "features": ["x"], "target": "label", "dataset": dataset }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["coefficients"].as_object().unwrap().len(), 3);
    assert_eq!(body["intercepts"].as_object().unwrap().len(), 3);
    assert_eq!(body["classes"], json!([0, 1, 2]));
}

#[tokio::test]
async fn test_log_reg_single_class_is_400() {
    let app = test_app();
    let dataset: Vec<Value> = (0..20)
        .map(|i| json!({ "x": i as f64, "label": 1.0 }))
        .collect();

    let (status, body) = post_json(
        &app,
        "/train_log_reg",
        json!({ "features": ["x"], "target": "label", "dataset": dataset }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("distinct classes"));
}

#[tokio::test]
async fn test_k_means_cluster_ceiling() {
    let app = test_app();
    let (status, body) = post_json(
        &app,
        "/train_k_means",
        json!({ "features": ["a", "b"], "dataset": cluster_dataset(), "n_clusters": 9 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("n_clusters"));
}

#[tokio::test]
async fn test_k_means_accepts_ceiling_cluster_count() {
    let app = test_app();
    let (status, body) = post_json(
        &app,
        "/train_k_means",
        json!({ "features": ["a", "b"], "dataset": cluster_dataset(), "n_clusters": 8 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["class_labels"].as_array().unwrap().len(), 8);
    assert_eq!(body["cluster_inertias"].as_object().unwrap().len(), 8);
    assert_eq!(body["cluster_sizes"].as_object().unwrap().len(), 8);
}

#[tokio::test]
async fn test_k_means_train_and_load() {
    let app = test_app();
    let (status, body) = post_json(
        &app,
        "/train_k_means",
        json!({ "features": ["a", "b"], "dataset": cluster_dataset(), "n_clusters": 3 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    assert_eq!(body["class_labels"], json!([0, 1, 2]));
    assert_eq!(body["centers"].as_object().unwrap().len(), 3);
    assert_eq!(body["new_dataset"].as_array().unwrap().len(), 300);

    let sizes: u64 = body["cluster_sizes"]
        .as_object()
        .unwrap()
        .values()
        .map(|v| v.as_u64().unwrap())
        .sum();
    assert_eq!(sizes, 300);

    let (status, loaded) =
        post_json(&app, "/load_k_means", json!({ "features": ["a", "b"] })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(loaded["cluster_sizes"], body["cluster_sizes"]);
    assert_eq!(loaded["cluster_inertias"], body["cluster_inertias"]);

    let (status, body) = post_json(
        &app,
        "/infer_k_means",
        json!({ "features": { "a": 10.0, "b": 10.0 } }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["prediction"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_random_forest_train_and_graph() {
    let app = test_app();
    let (status, body) = post_json(
        &app,
        "/train_random_forest",
        json!({
            "features": ["x"], "target": "label",
            "dataset": binary_class_dataset(), "n_trees": 5
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["estimators"], json!(5));
    assert_eq!(body["classes"], json!([0, 1]));
    assert!(body["feature_importance"]["x"].as_f64().is_some());

    let (status, body) =
        post_json(&app, "/graph_random_forest", json!({ "tree_index": 1 })).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(!body["image_base64"].as_str().unwrap().is_empty());

    // Index validation
    let (status, _) = post_json(&app, "/graph_random_forest", json!({ "tree_index": 0 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) =
        post_json(&app, "/graph_random_forest", json!({ "tree_index": "2" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) =
        post_json(&app, "/graph_random_forest", json!({ "tree_index": 999 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = post_json(&app, "/graph_random_forest", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_graph_before_train_is_400() {
    let app = test_app();
    let (status, body) =
        post_json(&app, "/graph_grad_boost_reg", json!({ "tree_index": 1 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("not trained"));
}

#[tokio::test]
async fn test_grad_boost_requires_hyperparameters() {
    let app = test_app();
    let (status, body) = post_json(
        &app,
        "/train_grad_boost_reg",
        json!({ "features": ["f1", "f2"], "target": "y", "dataset": lin_reg_dataset() }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("n_trees"));
}

#[tokio::test]
async fn test_grad_boost_train_scores_per_stage() {
    let app = test_app();
    let (status, body) = post_json(
        &app,
        "/train_grad_boost_reg",
        json!({
            "features": ["f1", "f2"], "target": "y", "dataset": lin_reg_dataset(),
            "n_trees": 20, "learning_rate": 0.1, "max_depth": 3
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["estimators"], json!(20));
    assert_eq!(body["train_scores"].as_array().unwrap().len(), 20);
    assert_eq!(body["learning_rate"], json!(0.1));
    assert_eq!(body["max_depth"], json!(3));
}

#[tokio::test]
async fn test_dataset_store_flow() {
    let app = test_app();

    let status = upload_csv(&app, "demo.csv", "f1,f2\n1.0,2.0\n3.0,4.0\n").await;
    assert_eq!(status, StatusCode::OK);

    let (status, names) = get_json(&app, "/fetch_data_names").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(names, json!(["demo.csv"]));

    let (status, rows) = get_json(&app, "/fetch_dataset?file_name=demo.csv").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rows.as_array().unwrap().len(), 2);
    assert_eq!(rows[0]["f1"], json!(1.0));

    let (status, _) = post_json(&app, "/delete_data", json!({ "data_name": "demo.csv" })).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = post_json(&app, "/delete_data", json!({ "data_name": "demo.csv" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_fetch_dataset_rejects_non_csv() {
    let app = test_app();
    let (status, body) = get_json(&app, "/fetch_dataset?file_name=model.bin").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("not supported"));
}

#[tokio::test]
async fn test_fetch_dataset_missing_is_404() {
    let app = test_app();
    let (status, _) = get_json(&app, "/fetch_dataset?file_name=absent.csv").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_store_data_without_file_is_400() {
    let app = test_app();
    let boundary = "test-boundary";
    let body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"other\"\r\n\r\nhello\r\n--{boundary}--\r\n"
    );
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/store_data")
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_save_and_load_model_round_trip() {
    let app = test_app();

    post_json(
        &app,
        "/train_lin_reg",
        json!({ "features": ["f1", "f2"], "target": "y", "dataset": lin_reg_dataset() }),
    )
    .await;

    let (status, body) = post_json(
        &app,
        "/save_model",
        json!({
            "algo_name": "lin_reg", "model_name": "house-prices",
            "features": ["f1", "f2"], "target": "y", "dataset": lin_reg_dataset()
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, names) = get_json(&app, "/fetch_model_names").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(names, json!(["house-prices.zip"]));

    let (status, body) =
        post_json(&app, "/load_model", json!({ "model_name": "absent.zip" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND, "{body}");

    let (status, body) =
        post_json(&app, "/load_model", json!({ "model_name": "house-prices.zip" })).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["metadata"]["algo_name"], json!("lin_reg"));
    assert_eq!(body["metadata"]["features"], json!(["f1", "f2"]));
    assert_eq!(body["dataset"].as_array().unwrap().len(), 100);

    let (status, body) =
        post_json(&app, "/load_lin_reg", json!({ "features": ["f1", "f2"] })).await;
    assert_eq!(status, StatusCode::OK);
    assert!((body["coefficients"]["f1"].as_f64().unwrap() - 2.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_save_model_rejects_clustering() {
    let app = test_app();
    post_json(
        &app,
        "/train_k_means",
        json!({ "features": ["a", "b"], "dataset": cluster_dataset(), "n_clusters": 2 }),
    )
    .await;

    let (status, body) = post_json(
        &app,
        "/save_model",
        json!({
            "algo_name": "k_means", "model_name": "clusters",
            "features": ["a", "b"], "target": "cluster", "dataset": cluster_dataset()
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("save_unsupervised"));
}

#[tokio::test]
async fn test_save_unsupervised_round_trip() {
    let app = test_app();
    post_json(
        &app,
        "/train_k_means",
        json!({ "features": ["a", "b"], "dataset": cluster_dataset(), "n_clusters": 3 }),
    )
    .await;

    let (status, body) = post_json(
        &app,
        "/save_unsupervised",
        json!({
            "algo_name": "k_means", "model_name": "blobs",
            "features": ["a", "b"], "dataset": cluster_dataset()
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, body) = post_json(&app, "/load_model", json!({ "model_name": "blobs.zip" })).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["metadata"]["algo_name"], json!("k_means"));
    assert!(body["metadata"].get("target").is_none());

    let (status, body) =
        post_json(&app, "/load_k_means", json!({ "features": ["a", "b"] })).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["new_dataset"].as_array().unwrap().len(), 300);
}

#[tokio::test]
async fn test_delete_model_absent_is_404() {
    let app = test_app();
    let (status, body) =
        post_json(&app, "/delete_model", json!({ "model_name": "nope.zip" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], json!("Model not found"));
}

#[tokio::test]
async fn test_save_model_unknown_algorithm_rejected() {
    let app = test_app();
    let (status, _) = post_json(
        &app,
        "/save_model",
        json!({
            "algo_name": "neural_net", "model_name": "m",
            "features": ["f1"], "target": "y", "dataset": lin_reg_dataset()
        }),
    )
    .await;
    // Closed algorithm set: unknown identifiers fail JSON deserialization
    assert!(status.is_client_error());
}
