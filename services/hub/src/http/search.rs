// `GET /{base}/lt/{sessionId}/search?q=...` (spec.md 6): delegates to the
// media library collaborator. Requires a live session only so an unrelated
// caller can't probe the library through a session ID that was never
// created.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use lt_protocol::MediaSearchResult;

use crate::http::response::{not_found, HttpResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

pub async fn search(
    Path(session_id): Path<String>,
    Query(query): Query<SearchQuery>,
    State(state): State<AppState>,
) -> HttpResult<Json<Vec<MediaSearchResult>>> {
    let session = state
        .hub
        .get_or_create(&session_id)
        .await
        .ok_or_else(|| not_found(format!("no such session: {session_id}")))?;

    Ok(Json(session.search_library(&query.q).await))
}
