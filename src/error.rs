use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    InvalidFormat(String),

    #[error("Please log in as a reviewer first")]
    Unauthenticated,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotAssigned(String),

    #[error("{0}")]
    Locked(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Upstream failure: {0}")]
    UpstreamFailure(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidFormat(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotAssigned(_) => StatusCode::FORBIDDEN,
            AppError::Locked(_) | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::UpstreamFailure(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => AppError::NotFound("Record".to_string()),
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::Conflict(db.message().to_string())
            }
            other => AppError::UpstreamFailure(format!("database: {}", other)),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::UpstreamFailure(format!("storage: {}", e))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Validation(e.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            // Well-formed JSON of the wrong shape, e.g. a missing field.
            JsonRejection::JsonDataError(e) => AppError::Validation(e.body_text()),
            other => AppError::InvalidFormat(other.body_text()),
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::InvalidFormat(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if let AppError::UpstreamFailure(ref detail) = self {
            tracing::error!("Upstream failure: {}", detail);
        }
        let message = match self {
            // Details stay in the log.
            AppError::UpstreamFailure(_) => "The request could not be completed. Please try again.".to_string(),
            other => other.to_string(),
        };
        (
            status,
            axum::Json(serde_json::json!({
                "status": "error",
                "message": message
            })),
        )
            .into_response()
    }
}
