//! Package download endpoint.

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use cask_core::{AppName, PackageVersion};
use tracing::instrument;

/// Media type of CRX packages.
pub const CRX_CONTENT_TYPE: &str = "application/x-chrome-extension";

/// GET /repo/{app}/{version}/{file}
///
/// Only the canonical package file of a published version is served.
#[instrument(skip(state))]
pub async fn get_package(
    State(state): State<AppState>,
    Path((app, version, file)): Path<(String, String, String)>,
) -> ApiResult<impl IntoResponse> {
    let not_found = || ApiError::NotFound(format!("repo/{app}/{version}/{file}"));

    let app_name = AppName::parse(&app).map_err(|_| not_found())?;
    let package_version = PackageVersion::parse(&version).map_err(|_| not_found())?;
    if file != state.repository.package_file_name(&app_name) {
        return Err(not_found());
    }

    let bytes = state
        .repository
        .read_package(&app_name, &package_version)
        .await?;
    metrics::PACKAGE_DOWNLOADS.inc();

    let content_type = if state.config.storage.package_extension == "crx" {
        CRX_CONTENT_TYPE
    } else {
        "application/octet-stream"
    };
    Ok(([(header::CONTENT_TYPE, content_type)], bytes))
}
