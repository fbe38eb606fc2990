use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};

use crate::flow::FlowError;

/// Authentication errors for the middleware layer.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A flow attempt ended in one of the terminal states.
    #[error(transparent)]
    Flow(#[from] FlowError),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            Self::Flow(ref e) => {
                let encoded = urlencoding::encode(e.code());
                Redirect::to(&format!("/?error={encoded}")).into_response()
            }
            Self::Config(_) => {
                tracing::error!(error = %self, "Auth internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
            }
        }
    }
}
