use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 用户当前模板 (user_templates)
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct UserTemplate {
    pub id: Uuid,
    pub user_id: Uuid,
    pub file_name: String,
    pub file_path: String,
    pub upload_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Processing,
    Completed,
    Failed,
}

/// 上传历史 (upload_history)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub sales_file_name: String,
    pub template_file_name: String,
    pub output_file_name: String,
    pub output_file_path: Option<String>,
    pub upload_date: DateTime<Utc>,
    pub status: UploadStatus,
    pub error_message: Option<String>,
}

impl UploadRecord {
    pub fn new(user_id: Uuid, sales_file_name: &str, template_file_name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            sales_file_name: sales_file_name.to_string(),
            template_file_name: template_file_name.to_string(),
            output_file_name: output_file_name_for(template_file_name),
            output_file_path: None,
            upload_date: Utc::now(),
            status: UploadStatus::Processing,
            error_message: None,
        }
    }
}

/// 输出文件名: 模板名去扩展名 + .csv
pub fn output_file_name_for(template_file_name: &str) -> String {
    let stem = match template_file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => template_file_name,
    };
    format!("{stem}.csv")
}

/// 数据库行 (status 为文本列)
#[derive(Debug, Clone, FromRow)]
pub struct UploadRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub sales_file_name: String,
    pub template_file_name: String,
    pub output_file_name: String,
    pub output_file_path: Option<String>,
    pub upload_date: DateTime<Utc>,
    pub status: String,
    pub error_message: Option<String>,
}

impl TryFrom<UploadRow> for UploadRecord {
    type Error = String;

    fn try_from(row: UploadRow) -> Result<Self, Self::Error> {
        Ok(UploadRecord {
            id: row.id,
            user_id: row.user_id,
            sales_file_name: row.sales_file_name,
            template_file_name: row.template_file_name,
            output_file_name: row.output_file_name,
            output_file_path: row.output_file_path,
            upload_date: row.upload_date,
            status: row.status.parse()?,
            error_message: row.error_message,
        })
    }
}

impl FromStr for UploadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(UploadStatus::Processing),
            "completed" => Ok(UploadStatus::Completed),
            "failed" => Ok(UploadStatus::Failed),
            other => Err(format!("unknown upload status '{other}'")),
        }
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UploadStatus::Processing => "processing",
            UploadStatus::Completed => "completed",
            UploadStatus::Failed => "failed",
        })
    }
}
