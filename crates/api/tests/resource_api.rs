//! Projects, machines and experiment records over HTTP.

mod common;

use axum::http::{Method, StatusCode};
use common::{body_bytes, body_json, delete, get, post_json, put_json, send_multipart, trials_schema, Part};
use serde_json::json;

// ---------------------------------------------------------------------------
// Projects
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_and_read_project() {
    let app = common::build_test_app();
    let id = app.create_project(trials_schema()).await;

    let response = get(&app, &format!("/api/v1/projects/{id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["name"], "tuning");
    assert_eq!(json["data"]["schema"], trials_schema());

    let list = body_json(get(&app, "/api/v1/projects").await).await;
    assert_eq!(list["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn enum_without_values_is_rejected() {
    let app = common::build_test_app();

    let response = post_json(
        &app,
        "/api/v1/projects",
        json!({ "name": "bad", "schema": { "optim": { "type": "enum" } } }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn set_project_category() {
    let app = common::build_test_app();
    let id = app.create_project(json!({})).await;

    let response = put_json(
        &app,
        &format!("/api/v1/projects/{id}/category"),
        json!({ "category": "vision" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["category"], "vision");

    let response = put_json(&app, "/api/v1/projects/999/category", json!({ "category": "x" })).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_project_experiments() {
    let app = common::build_test_app();
    let project = app.create_project(json!({})).await;
    let other = app.create_project(json!({})).await;
    app.register_machine("http://m1.local").await;
    app.fleet.set_capacity("http://m1.local", true);

    for target in [project, project, other] {
        let response = post_json(&app, &format!("/api/v1/projects/{target}/experiment"), json!({})).await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let json = body_json(get(&app, &format!("/api/v1/projects/{project}/experiments")).await).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 2);

    let response = get(&app, "/api/v1/projects/999/experiments").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Machines
// ---------------------------------------------------------------------------

#[tokio::test]
async fn register_and_update_machine() {
    let app = common::build_test_app();
    let id = app.register_machine("http://gpu-1.local:8080").await;

    let json = body_json(get(&app, &format!("/api/v1/machines/{id}")).await).await;
    assert_eq!(json["data"]["address"], "http://gpu-1.local:8080");

    let response = post_json(
        &app,
        &format!("/api/v1/machines/{id}/projects"),
        json!({ "projects": { "1": { "slots": 4 } } }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["projects"]["1"]["slots"], 4);

    let list = body_json(get(&app, "/api/v1/machines").await).await;
    assert_eq!(list["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn machine_address_must_be_http() {
    let app = common::build_test_app();

    let response = post_json(&app, "/api/v1/machines", json!({ "address": "gpu-1.local" })).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_machine_returns_404() {
    let app = common::build_test_app();

    assert_eq!(get(&app, "/api/v1/machines/5").await.status(), StatusCode::NOT_FOUND);
    let response = post_json(&app, "/api/v1/machines/5/projects", json!({ "projects": {} })).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Experiments
// ---------------------------------------------------------------------------

/// Dispatch one option-less experiment and return its id.
async fn dispatched(app: &common::TestApp) -> i64 {
    let project = app.create_project(json!({})).await;
    app.register_machine("http://m1.local").await;
    app.fleet.set_capacity("http://m1.local", true);
    let response = post_json(app, &format!("/api/v1/projects/{project}/experiment"), json!({})).await;
    body_json(response).await["data"]["experiment_id"].as_i64().unwrap()
}

#[tokio::test]
async fn worker_reports_status_and_scores() {
    let app = common::build_test_app();
    let id = dispatched(&app).await;

    let response = put_json(
        &app,
        &format!("/api/v1/experiments/{id}"),
        json!({ "status": "failure", "notes": "diverged", "scores": [0.1, 0.2] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["notes"], "diverged");
    assert_eq!(json["data"]["scores"], json!([0.1, 0.2]));

    let status = body_json(get(&app, &format!("/api/v1/experiments/{id}/status")).await).await;
    assert_eq!(status["data"], json!({ "id": id, "status": "failure" }));
}

#[tokio::test]
async fn empty_update_is_rejected() {
    let app = common::build_test_app();
    let id = dispatched(&app).await;

    let response = put_json(&app, &format!("/api/v1/experiments/{id}"), json!({})).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn lifecycle_callbacks_record_timestamps() {
    let app = common::build_test_app();
    let id = dispatched(&app).await;

    let response = put_json(&app, &format!("/api/v1/experiments/{id}/started"), json!({})).await;
    assert_eq!(response.status(), StatusCode::OK);
    put_json(&app, &format!("/api/v1/experiments/{id}/finished"), json!({})).await;

    let json = body_json(get(&app, &format!("/api/v1/experiments/{id}")).await).await;
    assert!(json["data"]["started_at"].is_string());
    assert!(json["data"]["finished_at"].is_string());
}

#[tokio::test]
async fn reuploading_a_name_keeps_file_identity() {
    let app = common::build_test_app();
    let id = dispatched(&app).await;
    let uri = format!("/api/v1/experiments/{id}/files");

    let response = send_multipart(
        &app,
        Method::PUT,
        &uri,
        &[
            Part::File { name: "out", filename: "weights.bin", content_type: "application/octet-stream", data: b"v1" },
            Part::File { name: "out", filename: "log.txt", content_type: "text/plain", data: b"epoch 1" },
        ],
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let files = body_json(response).await["data"]["files"].clone();
    let files = files.as_array().unwrap();
    assert_eq!(files.len(), 2);
    let weights_id = files.iter().find(|f| f["filename"] == "weights.bin").unwrap()["id"].clone();

    let response = send_multipart(
        &app,
        Method::PUT,
        &uri,
        &[Part::File { name: "out", filename: "weights.bin", content_type: "application/octet-stream", data: b"v2" }],
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let files = body_json(response).await["data"]["files"].clone();
    let files = files.as_array().unwrap();
    assert_eq!(files.len(), 2);
    let weights = files.iter().find(|f| f["filename"] == "weights.bin").unwrap();
    assert_eq!(weights["id"], weights_id);

    let download = get(&app, &format!("/api/v1/files/{}", weights_id.as_i64().unwrap())).await;
    assert_eq!(body_bytes(download).await, b"v2");
    assert_eq!(app.blobs.len().await, 2);
}

#[tokio::test]
async fn upload_without_files_is_rejected() {
    let app = common::build_test_app();
    let id = dispatched(&app).await;

    let response = send_multipart(
        &app,
        Method::PUT,
        &format!("/api/v1/experiments/{id}/files"),
        &[Part::Text { name: "note", value: "nothing attached" }],
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delete_files_unlinks_blobs() {
    let app = common::build_test_app();
    let id = dispatched(&app).await;
    let uri = format!("/api/v1/experiments/{id}/files");
    send_multipart(
        &app,
        Method::PUT,
        &uri,
        &[Part::File { name: "out", filename: "a.txt", content_type: "text/plain", data: b"a" }],
    )
    .await;

    let response = delete(&app, &uri).await;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(app.blobs.is_empty().await);
    let json = body_json(get(&app, &format!("/api/v1/experiments/{id}")).await).await;
    assert_eq!(json["data"]["files"], json!([]));
}

#[tokio::test]
async fn download_sets_attachment_headers() {
    let app = common::build_test_app();
    let id = dispatched(&app).await;
    let response = send_multipart(
        &app,
        Method::PUT,
        &format!("/api/v1/experiments/{id}/files"),
        &[Part::File { name: "out", filename: "report.csv", content_type: "text/csv", data: b"x,y" }],
    )
    .await;
    let file_id = body_json(response).await["data"]["files"][0]["id"].as_i64().unwrap();

    let response = get(&app, &format!("/api/v1/files/{file_id}")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/csv");
    assert_eq!(
        response.headers()["content-disposition"],
        "attachment; filename=\"report.csv\""
    );
}

#[tokio::test]
async fn unknown_experiment_and_file_return_404() {
    let app = common::build_test_app();

    assert_eq!(get(&app, "/api/v1/experiments/31").await.status(), StatusCode::NOT_FOUND);
    assert_eq!(get(&app, "/api/v1/files/31").await.status(), StatusCode::NOT_FOUND);
}

/// Upload one text file to an experiment.
async fn upload(app: &common::TestApp, experiment_id: i64, filename: &str, data: &[u8]) {
    let response = send_multipart(
        app,
        Method::PUT,
        &format!("/api/v1/experiments/{experiment_id}/files"),
        &[Part::File { name: "out", filename, content_type: "text/plain", data }],
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn concurrent_uploads_of_one_name_keep_one_attachment() {
    let app = common::build_test_app();
    let id = dispatched(&app).await;
    let uri = format!("/api/v1/experiments/{id}/files");
    let first = [Part::File { name: "out", filename: "log.txt", content_type: "text/plain", data: b"one" }];
    let second = [Part::File { name: "out", filename: "log.txt", content_type: "text/plain", data: b"two" }];

    let (a, b) = tokio::join!(
        send_multipart(&app, Method::PUT, &uri, &first),
        send_multipart(&app, Method::PUT, &uri, &second),
    );
    assert_eq!(a.status(), StatusCode::OK);
    assert_eq!(b.status(), StatusCode::OK);

    let json = body_json(get(&app, &format!("/api/v1/experiments/{id}")).await).await;
    let files = json["data"]["files"].as_array().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(app.blobs.len().await, 1);

    let file_id = files[0]["id"].as_i64().unwrap();
    let content = body_bytes(get(&app, &format!("/api/v1/files/{file_id}")).await).await;
    assert!(content == b"one" || content == b"two");
}

#[tokio::test]
async fn delete_files_clears_list_when_unlink_fails() {
    let app = common::build_test_app();
    let id = dispatched(&app).await;
    upload(&app, id, "a.txt", b"a").await;
    app.blobs.fail_unlinks(true);

    let response = delete(&app, &format!("/api/v1/experiments/{id}/files")).await;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let json = body_json(get(&app, &format!("/api/v1/experiments/{id}")).await).await;
    assert_eq!(json["data"]["files"], json!([]));
}

#[tokio::test]
async fn delete_experiment_unlinks_its_files() {
    let app = common::build_test_app();
    let id = dispatched(&app).await;
    upload(&app, id, "a.txt", b"a").await;

    let response = delete(&app, &format!("/api/v1/experiments/{id}")).await;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(app.blobs.is_empty().await);
    assert_eq!(get(&app, &format!("/api/v1/experiments/{id}")).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(delete(&app, &format!("/api/v1/experiments/{id}")).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deregistered_machine_is_no_longer_probed() {
    let app = common::build_test_app();
    let project = app.create_project(json!({})).await;
    let machine = app.register_machine("http://m1.local").await;
    app.fleet.set_capacity("http://m1.local", true);

    let response = delete(&app, &format!("/api/v1/machines/{machine}")).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(get(&app, &format!("/api/v1/machines/{machine}")).await.status(), StatusCode::NOT_FOUND);

    let response = post_json(&app, &format!("/api/v1/projects/{project}/experiment"), json!({})).await;
    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    assert_eq!(delete(&app, &format!("/api/v1/machines/{machine}")).await.status(), StatusCode::NOT_FOUND);
}

/// Dispatch `count` option-less experiments for `project`, each with one file.
async fn dispatch_with_files(app: &common::TestApp, project: i64, count: usize) -> Vec<i64> {
    let mut ids = Vec::new();
    for n in 0..count {
        let response = post_json(app, &format!("/api/v1/projects/{project}/experiment"), json!({})).await;
        let id = body_json(response).await["data"]["experiment_id"].as_i64().unwrap();
        upload(app, id, &format!("out-{n}.txt"), b"x").await;
        ids.push(id);
    }
    ids
}

#[tokio::test]
async fn delete_project_experiments_removes_records_and_files() {
    let app = common::build_test_app();
    let project = app.create_project(json!({})).await;
    let other = app.create_project(json!({})).await;
    app.register_machine("http://m1.local").await;
    app.fleet.set_capacity("http://m1.local", true);
    dispatch_with_files(&app, project, 2).await;
    let kept = dispatch_with_files(&app, other, 1).await;

    let response = delete(&app, &format!("/api/v1/projects/{project}/experiments")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["deleted"], 2);
    let list = body_json(get(&app, &format!("/api/v1/projects/{project}/experiments")).await).await;
    assert_eq!(list["data"], json!([]));
    assert_eq!(app.store.experiment_count().await, 1);
    assert_eq!(app.blobs.len().await, 1);
    assert_eq!(get(&app, &format!("/api/v1/experiments/{}", kept[0])).await.status(), StatusCode::OK);

    let response = delete(&app, "/api/v1/projects/999/experiments").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_project_files_keeps_experiments() {
    let app = common::build_test_app();
    let project = app.create_project(json!({})).await;
    app.register_machine("http://m1.local").await;
    app.fleet.set_capacity("http://m1.local", true);
    let ids = dispatch_with_files(&app, project, 2).await;

    let response = delete(&app, &format!("/api/v1/projects/{project}/experiments/files")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["deleted"], 2);
    assert!(app.blobs.is_empty().await);
    for id in ids {
        let json = body_json(get(&app, &format!("/api/v1/experiments/{id}")).await).await;
        assert_eq!(json["data"]["files"], json!([]));
    }
}

#[tokio::test]
async fn project_from_schema_file_keeps_field_order() {
    let app = common::build_test_app();
    let schema = br#"{"trials": {"type": "int"}, "optim": {"type": "enum", "values": ["adam"]}}"#;

    let response = send_multipart(
        &app,
        Method::POST,
        "/api/v1/projects/schema",
        &[Part::File { name: "schema", filename: "resnet.json", content_type: "application/json", data: schema }],
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["name"], "resnet");
    assert_eq!(json["data"]["category"], "");
    let keys: Vec<&String> = json["data"]["schema"].as_object().unwrap().keys().collect();
    assert_eq!(keys, ["trials", "optim"]);

    let project = json["data"]["id"].as_i64().unwrap();
    let response = post_json(
        &app,
        &format!("/api/v1/projects/{project}/experiment"),
        json!({ "optim": "nope", "trials": "x" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Field trials of type int is invalid");
}

#[tokio::test]
async fn schema_upload_requires_a_valid_file() {
    let app = common::build_test_app();

    let response = send_multipart(
        &app,
        Method::POST,
        "/api/v1/projects/schema",
        &[Part::File { name: "schema", filename: "bad.json", content_type: "application/json", data: b"{\"trials\":" }],
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send_multipart(
        &app,
        Method::POST,
        "/api/v1/projects/schema",
        &[Part::Text { name: "schema", value: "not a file" }],
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "No schema file received");
}
