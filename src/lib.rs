//! Relay for website form submissions: quote requests (with attachments) and
//! contact messages are rendered to HTML and mailed to the company mailbox.

pub mod config;
pub mod email;
pub mod extract;
pub mod logger;
pub mod mailer;
pub mod routes;
pub mod templates;

use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, routing::post, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::email::AppState;

/// Build the router: both form endpoints, open to any origin.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/quote", post(routes::quote))
        .route("/api/send-email", post(routes::contact))
        .layer(DefaultBodyLimit::max(state.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
