//! Update feed endpoint.

use crate::error::ApiResult;
use crate::state::AppState;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use cask_core::feed::FEED_CONTENT_TYPE;

/// GET /updates.xml
pub async fn get_update_feed(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let xml = state.feed.render().await?;
    Ok(([(header::CONTENT_TYPE, FEED_CONTENT_TYPE)], xml))
}
