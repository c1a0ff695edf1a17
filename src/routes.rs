//! Route handlers: `/api/quote` and `/api/send-email`.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use tracing::{error, info, info_span, Instrument};

use crate::{
    email::{AppState, ContactMessage, QuoteRequest, RelayError},
    extract::{ExtractError, Submission},
};

pub const SENT: &str = "Email sent successfully!";
pub const FAILED: &str = "Failed to send email";

/// JSON body of every response.
#[derive(Debug, Serialize)]
pub struct Reply {
    pub success: bool,
    pub message: &'static str,
}

impl Reply {
    pub fn sent() -> Self {
        Reply { success: true, message: SENT }
    }

    pub fn failed() -> Self {
        Reply { success: false, message: FAILED }
    }
}

/// POST `/api/quote`
/// - multipart form: `company`, `email`, `project`, `quantity`, `deadline`,
///   files under `attachment`
/// - Returns 200 `{"success":true,..}` or 500 `{"success":false,..}`
pub async fn quote(
    State(state): State<Arc<AppState>>,
    submission: Result<Submission, ExtractError>,
) -> (StatusCode, Json<Reply>) {
    let span = info_span!("quote", submission = %submission_id());
    async move {
        let outcome = match submission {
            Ok(s) => state.relay_quote(QuoteRequest::from(s)).await,
            Err(e) => Err(e.into()),
        };
        respond(outcome, "Quote email send error")
    }
    .instrument(span)
    .await
}

/// POST `/api/send-email`
/// - JSON or form: `name`, `email`, `message`
pub async fn contact(
    State(state): State<Arc<AppState>>,
    submission: Result<Submission, ExtractError>,
) -> (StatusCode, Json<Reply>) {
    let span = info_span!("contact", submission = %submission_id());
    async move {
        let outcome = match submission {
            Ok(s) => state.relay_contact(ContactMessage::from(s)).await,
            Err(e) => Err(e.into()),
        };
        respond(outcome, "Email send error")
    }
    .instrument(span)
    .await
}

/// Every failure collapses into the same 500; the detail only goes to the log.
fn respond(outcome: Result<(), RelayError>, context: &str) -> (StatusCode, Json<Reply>) {
    match outcome {
        Ok(()) => {
            info!("Email relayed");
            (StatusCode::OK, Json(Reply::sent()))
        }
        Err(e) => {
            error!(error = %e, "{context}");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(Reply::failed()))
        }
    }
}

/// Compact id (12 chars, alphanumeric) tying together the log lines of one submission.
fn submission_id() -> String {
    use rand::{distr::Alphanumeric, rng, Rng};
    rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect()
}
