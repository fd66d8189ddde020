// `GET /{base}/lt/stream/{token}` (spec.md 6): verifies a bearer token
// minted by C1 and hands back the claims the actual media-serving layer
// needs to locate and transcode the file. Serving bytes is out of scope
// for the hub (spec.md 1 Non-goals) -- this endpoint only answers "is this
// token valid, and what does it authorize".

use axum::extract::{Path, State};
use axum::Json;

use lt_protocol::StreamTokenClaims;

use crate::http::response::HttpResult;
use crate::http::response::not_found;
use crate::AppState;

pub async fn stream_claims(
    Path(token): Path<String>,
    State(state): State<AppState>,
) -> HttpResult<Json<StreamTokenClaims>> {
    state
        .minter
        .verify(&token)
        .map(Json)
        .ok_or_else(|| not_found("stream token is invalid or expired"))
}
