use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rollcall_registry::{JoinRejection, LeaveRejection, RegistrationError};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(&'static str),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(&'static str),

    /// A request the extractors could not parse.
    #[error("rejected request: {1}")]
    Rejected(StatusCode, String),

    #[error("join rejected: {}", .0.code())]
    Join(JoinRejection),

    #[error("leave rejected: {}", .0.code())]
    Leave(LeaveRejection),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<RegistrationError> for ApiError {
    fn from(e: RegistrationError) -> Self {
        match e {
            RegistrationError::Storage(e) => Self::Internal(e),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        Self::Rejected(e.status(), e.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(e: PathRejection) -> Self {
        Self::Rejected(e.status(), e.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        Self::Rejected(e.status(), e.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "message": msg })),
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, json!({ "message": "Unauthenticated" })),
            Self::Forbidden => (StatusCode::FORBIDDEN, json!({ "message": "This action is unauthorized" })),
            Self::NotFound => (StatusCode::NOT_FOUND, json!({ "message": "Not found" })),
            Self::Conflict(msg) => (StatusCode::CONFLICT, json!({ "message": msg })),
            Self::Rejected(status, msg) => (status, json!({ "message": msg })),
            Self::Join(rejection) => join_rejection_body(&rejection),
            Self::Leave(rejection) => (
                StatusCode::BAD_REQUEST,
                json!({ "message": rejection.message(), "code": rejection.code() }),
            ),
            Self::Internal(e) => {
                // Handlers log with request context; this is the catch-all.
                error!("Internal error: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "message": "Something went wrong. Please try again." }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

fn join_rejection_body(rejection: &JoinRejection) -> (StatusCode, serde_json::Value) {
    let message = rejection.message();
    let code = rejection.code();
    match rejection {
        JoinRejection::AdminForbidden => (StatusCode::FORBIDDEN, json!({ "message": message, "code": code })),
        JoinRejection::EventNotFound | JoinRejection::NotPublished => {
            (StatusCode::NOT_FOUND, json!({ "message": message, "code": code }))
        }
        JoinRejection::AlreadyRegistered { status } => (
            StatusCode::CONFLICT,
            json!({ "message": message, "code": code, "registration_status": status }),
        ),
        JoinRejection::Conflict { conflicting_events } => (
            StatusCode::CONFLICT,
            json!({ "message": message, "code": code, "conflicting_events": conflicting_events }),
        ),
        JoinRejection::EventFull { available_spots, available_waitlist_spots } => (
            StatusCode::BAD_REQUEST,
            json!({
                "message": message,
                "code": code,
                "available_spots": available_spots,
                "available_waitlist_spots": available_waitlist_spots,
            }),
        ),
    }
}

/// Run blocking DB work off the async runtime.
pub async fn blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(anyhow::anyhow!("blocking task failed"))
    })?
}
