//! 对象存储 (模板文件、输出文件)

pub mod memory;
pub mod supabase;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryStorage;
pub use supabase::SupabaseStorage;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object {bucket}/{path} not found")]
    NotFound { bucket: String, path: String },

    #[error("storage rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// 对象存储接口: 启动时选定实现 (内存 / Supabase Storage)
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(&self, bucket: &str, path: &str, bytes: Vec<u8>) -> Result<(), StorageError>;

    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>, StorageError>;

    /// 批量删除, 不存在的路径忽略
    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<(), StorageError>;
}
