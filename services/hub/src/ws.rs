// WebSocket upgrade entry point (spec.md 6: `GET /{base}/lt/{sessionId}/ws`).
// Joining is unauthenticated: anyone who reaches the URL with a display
// name may connect. `host=true` only matters on the very first join for a
// given participant -- it decides initial remote-holder priority, it is
// not a standing credential.

use axum::{
    extract::{
        ws::WebSocketUpgrade,
        Path, Query, State,
    },
    response::IntoResponse,
};
use serde::Deserialize;

use crate::connection::handle_connection;
use crate::http::response::{not_found, HttpResponse};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct JoinQuery {
    pub name: String,
    #[serde(default)]
    pub host: bool,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(session_id): Path<String>,
    Query(query): Query<JoinQuery>,
    State(state): State<AppState>,
) -> axum::response::Response {
    let session = match state.hub.get_or_create(&session_id).await {
        Some(s) => s,
        None => return not_found_response(&session_id),
    };

    ws.on_upgrade(move |socket| handle_connection(socket, session, query.name, query.host))
        .into_response()
}

fn not_found_response(session_id: &str) -> HttpResponse {
    not_found(format!("no such session: {session_id}"))
}
