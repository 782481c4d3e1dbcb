use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    response::{IntoResponse, Response},
    Json,
};
use http::StatusCode;
use mcat_types::FieldErrors;
use serde_json::json;

pub type ApiResult<T, E = ApiError> = std::result::Result<T, E>;

const EDIT_CONFLICT_MESSAGE: &str = "edit conflict, re-read the record and try again";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Edit conflict on record {id}, version {version}")]
    EditConflict { id: i64, version: i64 },

    #[error("Invalid fields: {0}")]
    InvalidFields(FieldErrors),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Backend error: {0}")]
    Backend(#[source] mcat_dal::Error),
}

impl From<mcat_dal::Error> for ApiError {
    fn from(e: mcat_dal::Error) -> Self {
        match e {
            mcat_dal::Error::RecordNotFound(r) => ApiError::ResourceNotFound(r),
            mcat_dal::Error::EditConflict { id, version } => ApiError::EditConflict { id, version },
            mcat_dal::Error::ValidationFailed(errors) => ApiError::InvalidFields(errors),
            other => ApiError::Backend(other),
        }
    }
}

impl From<FieldErrors> for ApiError {
    fn from(errors: FieldErrors) -> Self {
        ApiError::InvalidFields(errors)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::InvalidRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::InvalidRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::ResourceNotFound(r) => (
                StatusCode::NOT_FOUND,
                Json(json!({"error": format!("{r} not found")})),
            )
                .into_response(),
            ApiError::EditConflict { .. } => (
                StatusCode::CONFLICT,
                Json(json!({"error": EDIT_CONFLICT_MESSAGE})),
            )
                .into_response(),
            ApiError::InvalidFields(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({"errors": errors})),
            )
                .into_response(),
            ApiError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, Json(json!({"error": msg}))).into_response()
            }
            ApiError::Backend(e) => {
                tracing::error!(error = %e, "Request failed on backend error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": "the server encountered a problem and could not process your request"})),
                )
                    .into_response()
            }
        }
    }
}
