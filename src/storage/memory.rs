use super::{ObjectStorage, StorageError};
use async_trait::async_trait;
use dashmap::DashMap;

/// 进程内对象存储
#[derive(Debug, Default)]
pub struct MemoryStorage {
    objects: DashMap<(String, String), Vec<u8>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn upload(&self, bucket: &str, path: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        self.objects.insert((bucket.to_string(), path.to_string()), bytes);
        Ok(())
    }

    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>, StorageError> {
        self.objects
            .get(&(bucket.to_string(), path.to_string()))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StorageError::NotFound {
                bucket: bucket.to_string(),
                path: path.to_string(),
            })
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<(), StorageError> {
        for path in paths {
            self.objects.remove(&(bucket.to_string(), path.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upload_download_remove() {
        let storage = MemoryStorage::new();
        storage.upload("templates", "u/t.xlsx", b"abc".to_vec()).await.unwrap();
        assert_eq!(storage.download("templates", "u/t.xlsx").await.unwrap(), b"abc");
        assert!(matches!(
            storage.download("output-files", "u/t.xlsx").await,
            Err(StorageError::NotFound { .. })
        ));

        storage.remove("templates", &["u/t.xlsx".to_string(), "missing".to_string()]).await.unwrap();
        assert!(storage.is_empty());
    }
}
