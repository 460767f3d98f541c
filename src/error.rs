use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::DbErr;
use thiserror::Error;

use crate::api::types::ApiResponse;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Permission denied")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Failed to aggregate promotion data: {0}")]
    AggregationFailure(#[source] DbErr),

    #[error("Failed to commit promotions: {0}")]
    CommitFailed(#[source] DbErr),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Connection-level commit failures; only these are retried
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ServerError::CommitFailed(DbErr::Conn(_) | DbErr::ConnectionAcquire(_))
        )
    }

    fn status(&self) -> StatusCode {
        match self {
            ServerError::Unauthorized => StatusCode::UNAUTHORIZED,
            ServerError::Forbidden => StatusCode::FORBIDDEN,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Validation(_) => StatusCode::BAD_REQUEST,
            ServerError::AggregationFailure(_)
            | ServerError::CommitFailed(_)
            | ServerError::Database(_)
            | ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!("Request failed: {:?}", self);
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(ApiResponse::<()>::error(message))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
