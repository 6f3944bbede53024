use super::render::{render_mapped_summary, render_raw_summary};
use super::workflow::OutputFile;
use crate::db::Store;
use crate::error::{AppError, AppResult};
use crate::models::{NewSkuMapping, SkuIndex, SkuMapping, UploadRecord, User, UserStatus};
use crate::sheet::{parse_sku_mappings, read_grid};
use std::sync::Arc;
use uuid::Uuid;

/// SKU 映射维护、用户管理与报表
pub struct AdminService {
    store: Arc<dyn Store>,
    header_scan_rows: usize,
}

impl AdminService {
    pub fn new(store: Arc<dyn Store>, header_scan_rows: usize) -> Self {
        Self {
            store,
            header_scan_rows,
        }
    }

    // ================= SKU 映射 =================

    pub async fn list_sku_mappings(&self) -> AppResult<Vec<SkuMapping>> {
        self.store.list_sku_mappings().await
    }

    pub async fn create_sku_mapping(&self, operator: &User, input: NewSkuMapping) -> AppResult<SkuMapping> {
        let input = validated(input)?;
        let created = self.store.insert_sku_mapping(input, Some(operator.id)).await?;
        tracing::info!(
            "{} added SKU mapping {} -> {}",
            operator.username,
            created.market_sku,
            created.variant_description
        );
        Ok(created)
    }

    pub async fn update_sku_mapping(&self, id: Uuid, input: NewSkuMapping) -> AppResult<SkuMapping> {
        let input = validated(input)?;
        self.store
            .update_sku_mapping(id, input)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("SKU mapping {id}")))
    }

    pub async fn delete_sku_mapping(&self, id: Uuid) -> AppResult<()> {
        if !self.store.delete_sku_mapping(id).await? {
            return Err(AppError::NotFound(format!("SKU mapping {id}")));
        }
        Ok(())
    }

    /// 批量导入: 用文件内容替换整张映射表
    pub async fn import_sku_mappings(&self, operator: &User, file_name: &str, bytes: &[u8]) -> AppResult<usize> {
        let grid = read_grid(file_name, bytes)?;
        let rows = parse_sku_mappings(&grid, self.header_scan_rows)?;
        let count = self.store.replace_sku_mappings(rows, Some(operator.id)).await?;
        tracing::info!("{} imported {} SKU mappings from {}", operator.username, count, file_name);
        Ok(count)
    }

    // ================= 用户 =================

    pub async fn list_users(&self) -> AppResult<Vec<User>> {
        self.store.list_users().await
    }

    pub async fn set_user_status(&self, operator: &User, user_id: Uuid, status: UserStatus) -> AppResult<User> {
        if operator.id == user_id && status == UserStatus::Disabled {
            return Err(AppError::Forbidden("You cannot disable your own account".to_string()));
        }
        let user = self
            .store
            .set_user_status(user_id, status)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {user_id}")))?;
        tracing::info!("{} set user {} to {}", operator.username, user.username, status);
        Ok(user)
    }

    pub async fn user_uploads(&self, user_id: Uuid) -> AppResult<Vec<UploadRecord>> {
        if self.store.get_user(user_id).await?.is_none() {
            return Err(AppError::NotFound(format!("User {user_id}")));
        }
        self.store.list_uploads(user_id).await
    }

    // ================= 报表 =================

    async fn upload(&self, upload_id: Uuid) -> AppResult<UploadRecord> {
        self.store
            .get_upload(upload_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Upload {upload_id}")))
    }

    /// 原始汇总: 业务员 × SKU 数量
    pub async fn raw_summary(&self, upload_id: Uuid) -> AppResult<OutputFile> {
        let upload = self.upload(upload_id).await?;
        let rows = self.store.list_sales_summary(upload_id).await?;
        Ok(OutputFile {
            file_name: report_name(&upload, "raw_summary"),
            bytes: render_raw_summary(&rows)?,
        })
    }

    /// 映射后汇总: 用当时的业务员分配和当前的 SKU 映射展开
    pub async fn mapped_summary(&self, upload_id: Uuid) -> AppResult<OutputFile> {
        let upload = self.upload(upload_id).await?;
        let (rows, agent_mappings, sku_mappings) = futures::try_join!(
            self.store.list_sales_summary(upload_id),
            self.store.list_agent_mappings(upload_id),
            self.store.list_sku_mappings(),
        )?;
        let index = SkuIndex::from_mappings(&sku_mappings);
        Ok(OutputFile {
            file_name: report_name(&upload, "mapped_summary"),
            bytes: render_mapped_summary(&rows, &agent_mappings, &index)?,
        })
    }
}

fn validated(input: NewSkuMapping) -> AppResult<NewSkuMapping> {
    let input = NewSkuMapping::new(&input.market_sku, &input.variant_description);
    if !input.is_complete() {
        return Err(AppError::BadRequest(
            "Market SKU and variant description are required".to_string(),
        ));
    }
    Ok(input)
}

fn report_name(upload: &UploadRecord, kind: &str) -> String {
    let stem = upload
        .sales_file_name
        .rsplit_once('.')
        .map_or(upload.sales_file_name.as_str(), |(stem, _)| stem);
    format!("{stem}_{kind}.csv")
}
