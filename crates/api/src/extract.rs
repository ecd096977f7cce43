//! Request extractors shared by several handlers.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use labcoord_core::options::OptionMap;
use serde_json::Value;

use crate::engine::attachments::{Upload, DEFAULT_CONTENT_TYPE};
use crate::error::AppError;

/// Multipart part name carrying input files.
pub const FILES_FIELD: &str = "_files";

/// Multipart part name carrying a project schema file.
pub const SCHEMA_FIELD: &str = "schema";

/// Options and input files of a job submission.
///
/// Accepts either a JSON object body or `multipart/form-data`, where text
/// parts become string options and `_files` parts become uploads. An empty
/// body yields no options.
#[derive(Debug, Default)]
pub struct JobSubmission {
    pub options: OptionMap,
    pub files: Vec<Upload>,
}

impl JobSubmission {
    /// Add query parameters as string options; body values take precedence.
    pub fn merge_query(&mut self, query: HashMap<String, String>) {
        for (key, value) in query {
            self.options.entry(key).or_insert(Value::String(value));
        }
    }
}

impl<S> FromRequest<S> for JobSubmission
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.to_ascii_lowercase().starts_with("multipart/form-data"));

        if is_multipart {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            return read_multipart(multipart).await;
        }

        let body = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }

        match serde_json::from_slice::<Value>(&body) {
            Ok(Value::Object(options)) => Ok(Self {
                options,
                files: Vec::new(),
            }),
            Ok(_) => Err(AppError::BadRequest(
                "Experiment options must be a JSON object".to_string(),
            )),
            Err(e) => Err(AppError::BadRequest(format!("Invalid JSON body: {e}"))),
        }
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<JobSubmission, AppError> {
    let mut submission = JobSubmission::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == FILES_FIELD {
            submission.files.push(read_upload(field).await?);
        } else if !name.is_empty() {
            let text = field
                .text()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            submission.options.insert(name, Value::String(text));
        }
    }

    Ok(submission)
}

/// Read every file part of a multipart body, whatever its part name.
pub async fn read_uploads(mut multipart: Multipart) -> Result<Vec<Upload>, AppError> {
    let mut uploads = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.file_name().is_some() {
            uploads.push(read_upload(field).await?);
        }
    }
    Ok(uploads)
}

/// Read the first file part called `name`, skipping every other part.
pub async fn read_named_upload(mut multipart: Multipart, name: &str) -> Result<Option<Upload>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() == Some(name) && field.file_name().is_some() {
            return read_upload(field).await.map(Some);
        }
    }
    Ok(None)
}

async fn read_upload(field: axum::extract::multipart::Field<'_>) -> Result<Upload, AppError> {
    let filename = field.file_name().unwrap_or("unknown").to_string();
    let content_type = field
        .content_type()
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();
    let data = field
        .bytes()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    Ok(Upload {
        filename,
        content_type,
        data: data.to_vec(),
    })
}
