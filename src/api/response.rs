use crate::error::AppError;
use crate::service::OutputFile;
use crate::storage::StorageError;
use axum::{
    extract::Json,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;

/// 统一响应体
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
            data: Some(data),
        })
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
            data: None,
        })
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::HeaderNotFound { .. }
            | AppError::EmptyInput(_)
            | AppError::Spreadsheet(_)
            | AppError::IncompleteMapping { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NoTemplate | AppError::InvalidState(_) | AppError::Busy => StatusCode::CONFLICT,
            AppError::NotFound(_) | AppError::Storage(StorageError::NotFound { .. }) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Storage(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Output(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        let data = match &self {
            AppError::HeaderNotFound { missing } => Some(json!({ "missing": missing })),
            AppError::IncompleteMapping { agents } => Some(json!({ "agents": agents })),
            _ => None,
        };
        let body = ApiResponse {
            success: false,
            message: self.to_string(),
            data,
        };
        (status, Json(body)).into_response()
    }
}

impl IntoResponse for OutputFile {
    fn into_response(self) -> Response {
        let disposition = format!("attachment; filename=\"{}\"", self.file_name.replace('"', ""));
        (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (header::CONTENT_DISPOSITION, disposition),
            ],
            self.bytes,
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_errors_map_to_client_statuses() {
        assert_eq!(AppError::Busy.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::IncompleteMapping { agents: vec!["A".into()] }.status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(AppError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::Storage(StorageError::NotFound { bucket: "b".into(), path: "p".into() }).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Storage(StorageError::Rejected { status: 500, body: String::new() }).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }
}
