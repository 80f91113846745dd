//! Extension upload endpoint.

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;
use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use bytes::Bytes;
use cask_core::Manifest;
use tracing::{instrument, warn};

/// Multipart field carrying the application name.
pub const NAME_FIELD: &str = "name";

/// Multipart field carrying the zipped extension.
pub const ARCHIVE_FIELD: &str = "zippedExtension";

/// POST /upload
///
/// Accepts a multipart form with the application name and its zipped
/// extension, and responds with the manifest as published.
#[instrument(skip(state, multipart))]
pub async fn upload_extension(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<Manifest>> {
    let limit = state.config.server.max_upload_size;
    let result = async {
        let (name, archive) = read_upload(multipart, limit).await?;
        state.publisher.publish(&name, archive).await
    }
    .await;

    match result {
        Ok(outcome) => Ok(Json(outcome.manifest)),
        Err(err) => {
            metrics::record_publish_rejection(err.code());
            warn!(code = err.code(), error = %err, "upload rejected");
            Err(err)
        }
    }
}

async fn read_upload(mut multipart: Multipart, limit: usize) -> ApiResult<(String, Bytes)> {
    let mut name = None;
    let mut archive = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            NAME_FIELD => {
                name = Some(field.text().await.map_err(|e| multipart_error(e, limit))?);
            }
            ARCHIVE_FIELD => {
                archive = Some(field.bytes().await.map_err(|e| multipart_error(e, limit))?);
            }
            _ => {}
        }
    }

    let name = name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("missing form field '{NAME_FIELD}'")))?;
    let archive = archive
        .filter(|a| !a.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("missing form field '{ARCHIVE_FIELD}'")))?;
    Ok((name, archive))
}

fn multipart_error(err: MultipartError, limit: usize) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge { limit }
    } else {
        ApiError::BadRequest(format!("invalid multipart body: {}", err.body_text()))
    }
}
