use axum::Router;
use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};

use crate::error::ApiError;
use crate::state::AppState;

/// Upper bound on request bodies handed to the collection handler.
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Every path goes to the collection handler, which does its own routing.
pub fn router() -> Router<AppState> {
    Router::new().fallback(forward)
}

async fn forward(State(state): State<AppState>, req: Request) -> Response {
    match dispatch(state, req).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn dispatch(state: AppState, req: Request) -> Result<Response, ApiError> {
    let (parts, body) = req.into_parts();
    tracing::debug!(method = %parts.method, uri = %parts.uri, "request");

    let body = to_bytes(body, MAX_BODY_BYTES).await?;
    let req = axum::http::Request::from_parts(parts, body.to_vec());

    let response = tokio::task::spawn_blocking(move || state.http.handle(req)).await?;
    Ok(response.map(Body::from))
}
