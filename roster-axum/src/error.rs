use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use roster_core::errors::RosterError;

#[derive(Debug)]
pub struct RosterAxumError(pub anyhow::Error);

impl From<anyhow::Error> for RosterAxumError {
    fn from(e: anyhow::Error) -> Self {
        Self(e)
    }
}

impl From<RosterError> for RosterAxumError {
    fn from(e: RosterError) -> Self {
        Self(e.into_anyhow())
    }
}

fn respond(err: &RosterError) -> Response {
    let safe = err.sanitize_for_client();
    let status = StatusCode::from_u16(safe.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(safe.to_json())).into_response()
}

impl IntoResponse for RosterAxumError {
    fn into_response(self) -> Response {
        // A RosterError anywhere in the chain keeps its kind and message
        if let Some(roster) = RosterError::from_anyhow(&self.0) {
            if roster.code() >= 500 {
                tracing::error!(error = ?self.0, "request failed");
            }
            return respond(roster);
        }

        // Anything else is internal; its text stays in the log
        tracing::error!(error = ?self.0, "unhandled error");
        respond(&RosterError::general_error("Internal server error"))
    }
}
