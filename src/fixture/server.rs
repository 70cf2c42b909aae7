//! HTTP handler for the fixture corpus
//!
//! The bound port is injected as router state when the router is built, so
//! every request renders templates from an immutable value.

use axum::{
    extract::State,
    http::{header, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};

use super::corpus;

/// Immutable per-server state
#[derive(Debug, Clone, Copy)]
pub struct FixtureState {
    pub port: u16,
}

/// Build the router serving the corpus for a server bound to `port`
pub fn router(port: u16) -> Router {
    Router::new()
        .fallback(serve_document)
        .with_state(FixtureState { port })
}

async fn serve_document(State(state): State<FixtureState>, method: Method, uri: Uri) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    match corpus::lookup(uri.path()) {
        Some(page) => {
            tracing::debug!(path = uri.path(), "Serving fixture document");
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, page.content_type())],
                page.render(state.port),
            )
                .into_response()
        }
        None => {
            tracing::debug!(path = uri.path(), "Fixture path not found");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}
