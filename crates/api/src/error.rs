use std::error::Error as _;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use minijinja::ErrorKind;
use serde_json::json;
use vitrine_core::error::CoreError;
use vitrine_datamanager::DatamanagerError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and template failures.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `vitrine_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Template lookup or rendering failed. Failures caused by the content
    /// API are answered like the content API error itself.
    #[error("Render error: {0}")]
    Render(#[from] minijinja::Error),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
            },

            // --- Rendering ---
            AppError::Render(err) if err.kind() == ErrorKind::TemplateNotFound => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                "Page not found".to_string(),
            ),
            AppError::Render(err) => match datamanager_cause(err) {
                Some(cause) => classify_datamanager_error(cause),
                None => {
                    tracing::error!(error = %err, detail = %err.display_debug_info(), "Render error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "RENDER_ERROR",
                        "The page could not be rendered".to_string(),
                    )
                }
            },
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// The content API error a render failure was caused by, if any.
fn datamanager_cause<'a>(err: &'a minijinja::Error) -> Option<&'a DatamanagerError> {
    std::iter::successors(err.source(), |&cause: &&'a (dyn std::error::Error + 'static)| cause.source())
        .find_map(|cause| cause.downcast_ref::<DatamanagerError>())
}

/// Classify a content API error into an HTTP status, error code, and message.
///
/// - `NotFound` maps to 404.
/// - Malformed load requests map to 400.
/// - Everything else maps to 502 with a sanitized message.
fn classify_datamanager_error(err: &DatamanagerError) -> (StatusCode, &'static str, String) {
    match err {
        DatamanagerError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
        DatamanagerError::MissingModel(_) | DatamanagerError::Core(CoreError::Validation(_)) => {
            (StatusCode::BAD_REQUEST, "BAD_REQUEST", err.to_string())
        }
        other => {
            tracing::error!(error = %other, "Content API error");
            (
                StatusCode::BAD_GATEWAY,
                "UPSTREAM_ERROR",
                "The content API request failed".to_string(),
            )
        }
    }
}
