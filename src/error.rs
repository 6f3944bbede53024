use crate::storage::StorageError;
use thiserror::Error;

/// 统一错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 扫描窗口内未找到包含全部必需列的表头行
    #[error("Could not find header row. Missing columns: {}", missing.join(", "))]
    HeaderNotFound { missing: Vec<String> },

    #[error("{0}")]
    EmptyInput(String),

    /// 完成前仍有业务员未分配 SURVEYOR
    #[error("Please map all DS Names to SURVEYOR (unassigned: {})", agents.join(", "))]
    IncompleteMapping { agents: Vec<String> },

    #[error("Failed to read spreadsheet: {0}")]
    Spreadsheet(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Please upload a template first")]
    NoTemplate,

    #[error("Another upload is already being processed")]
    Busy,

    #[error("{0}")]
    InvalidState(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Missing or unknown operator")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Failed to write output: {0}")]
    Output(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl From<csv::Error> for AppError {
    fn from(e: csv::Error) -> Self {
        AppError::Output(e.to_string())
    }
}
