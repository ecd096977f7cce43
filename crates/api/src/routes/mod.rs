pub mod batch;
pub mod experiment;
pub mod file;
pub mod health;
pub mod machine;
pub mod project;
pub mod webhook;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /webhooks                                 register one-shot webhook (POST)
///
/// /projects                                 list, create
/// /projects/{id}                            get
/// /projects/{id}/category                   set category (PUT)
/// /projects/{id}/experiments                list experiments
/// /projects/{id}/experiment                 submit job (POST)
/// /projects/{id}/batch                      submit batch (POST, ?retry=secs)
///
/// /experiments/{id}                         get, worker status report (PUT)
/// /experiments/{id}/status                  status projection
/// /experiments/{id}/started                 lifecycle callback (PUT)
/// /experiments/{id}/finished                lifecycle callback (PUT)
/// /experiments/{id}/files                   upload (PUT), delete all (DELETE)
///
/// /machines                                 list, register
/// /machines/{id}                            get
/// /machines/{id}/projects                   replace project map (POST)
///
/// /batches/{id}                             get with derived progress
///
/// /files/{id}                               download
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/webhooks", webhook::router())
        .nest("/projects", project::router())
        .nest("/experiments", experiment::router())
        .nest("/machines", machine::router())
        .nest("/batches", batch::router())
        .nest("/files", file::router())
}
