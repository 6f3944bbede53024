use super::queries;
use super::store::Store;
use crate::error::{AppError, AppResult};
use crate::models::{
    AgentMappingRecord, NewSkuMapping, SalesSummaryRow, SkuMapping, UploadRecord, UploadRow,
    User, UserRow, UserStatus, UserTemplate,
};
use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

/// PostgreSQL 实现
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn decode_user(row: UserRow) -> AppResult<User> {
    User::try_from(row).map_err(|e| AppError::Database(sqlx::Error::Decode(e.into())))
}

fn decode_upload(row: UploadRow) -> AppResult<UploadRecord> {
    UploadRecord::try_from(row).map_err(|e| AppError::Database(sqlx::Error::Decode(e.into())))
}

#[async_trait]
impl Store for PgStore {
    async fn list_sku_mappings(&self) -> AppResult<Vec<SkuMapping>> {
        Ok(queries::list_sku_mappings(&self.pool).await?)
    }

    async fn insert_sku_mapping(&self, new: NewSkuMapping, created_by: Option<Uuid>) -> AppResult<SkuMapping> {
        Ok(queries::insert_sku_mapping(&self.pool, &new, created_by).await?)
    }

    async fn update_sku_mapping(&self, id: Uuid, patch: NewSkuMapping) -> AppResult<Option<SkuMapping>> {
        Ok(queries::update_sku_mapping(&self.pool, id, &patch).await?)
    }

    async fn delete_sku_mapping(&self, id: Uuid) -> AppResult<bool> {
        Ok(queries::delete_sku_mapping(&self.pool, id).await?)
    }

    async fn replace_sku_mappings(&self, rows: Vec<NewSkuMapping>, created_by: Option<Uuid>) -> AppResult<usize> {
        Ok(queries::replace_sku_mappings(&self.pool, &rows, created_by).await?)
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        queries::list_users(&self.pool)
            .await?
            .into_iter()
            .map(decode_user)
            .collect()
    }

    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>> {
        queries::get_user(&self.pool, id).await?.map(decode_user).transpose()
    }

    async fn insert_user(&self, user: User) -> AppResult<User> {
        decode_user(queries::insert_user(&self.pool, &user).await?)
    }

    async fn set_user_status(&self, id: Uuid, status: UserStatus) -> AppResult<Option<User>> {
        queries::set_user_status(&self.pool, id, status)
            .await?
            .map(decode_user)
            .transpose()
    }

    async fn latest_template(&self, user_id: Uuid) -> AppResult<Option<UserTemplate>> {
        Ok(queries::latest_template(&self.pool, user_id).await?)
    }

    async fn insert_template(&self, template: UserTemplate) -> AppResult<UserTemplate> {
        Ok(queries::insert_template(&self.pool, &template).await?)
    }

    async fn create_upload(&self, record: UploadRecord) -> AppResult<UploadRecord> {
        decode_upload(queries::create_upload(&self.pool, &record).await?)
    }

    async fn complete_upload(&self, id: Uuid, output_file_path: &str) -> AppResult<()> {
        Ok(queries::complete_upload(&self.pool, id, output_file_path).await?)
    }

    async fn fail_upload(&self, id: Uuid, message: &str) -> AppResult<()> {
        Ok(queries::fail_upload(&self.pool, id, message).await?)
    }

    async fn get_upload(&self, id: Uuid) -> AppResult<Option<UploadRecord>> {
        queries::get_upload(&self.pool, id).await?.map(decode_upload).transpose()
    }

    async fn list_uploads(&self, user_id: Uuid) -> AppResult<Vec<UploadRecord>> {
        queries::list_uploads(&self.pool, user_id)
            .await?
            .into_iter()
            .map(decode_upload)
            .collect()
    }

    async fn delete_uploads(&self, ids: &[Uuid]) -> AppResult<u64> {
        Ok(queries::delete_uploads(&self.pool, ids).await?)
    }

    async fn insert_sales_summary(&self, rows: &[SalesSummaryRow]) -> AppResult<()> {
        Ok(queries::insert_sales_summary(&self.pool, rows).await?)
    }

    async fn list_sales_summary(&self, upload_id: Uuid) -> AppResult<Vec<SalesSummaryRow>> {
        Ok(queries::list_sales_summary(&self.pool, upload_id).await?)
    }

    async fn insert_agent_mappings(&self, rows: &[AgentMappingRecord]) -> AppResult<()> {
        Ok(queries::insert_agent_mappings(&self.pool, rows).await?)
    }

    async fn list_agent_mappings(&self, upload_id: Uuid) -> AppResult<Vec<AgentMappingRecord>> {
        Ok(queries::list_agent_mappings(&self.pool, upload_id).await?)
    }

    async fn agent_history(&self, agent_names: &[String]) -> AppResult<HashMap<String, String>> {
        if agent_names.is_empty() {
            return Ok(HashMap::new());
        }
        Ok(queries::agent_history(&self.pool, agent_names)
            .await?
            .into_iter()
            .collect())
    }
}
