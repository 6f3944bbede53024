use crate::error::AppResult;
use crate::models::{
    AgentMappingRecord, NewSkuMapping, SalesSummaryRow, SkuMapping, UploadRecord, User,
    UserStatus, UserTemplate,
};
use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;

/// 持久化接口
///
/// 启动时选定一个实现 (MemoryStore / PgStore), 业务代码只依赖该 trait。
/// 共享表 (SKU 映射、用户) 为最后写入者胜出, 不做乐观锁。
#[async_trait]
pub trait Store: Send + Sync {
    // ---- SKU 映射 ----

    /// 按 market_sku 升序
    async fn list_sku_mappings(&self) -> AppResult<Vec<SkuMapping>>;

    async fn insert_sku_mapping(&self, new: NewSkuMapping, created_by: Option<Uuid>) -> AppResult<SkuMapping>;

    async fn update_sku_mapping(&self, id: Uuid, patch: NewSkuMapping) -> AppResult<Option<SkuMapping>>;

    async fn delete_sku_mapping(&self, id: Uuid) -> AppResult<bool>;

    /// 用批量导入结果替换整张映射表, 返回写入条数
    async fn replace_sku_mappings(&self, rows: Vec<NewSkuMapping>, created_by: Option<Uuid>) -> AppResult<usize>;

    // ---- 用户 ----

    /// 按 created_at 降序
    async fn list_users(&self) -> AppResult<Vec<User>>;

    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>>;

    async fn insert_user(&self, user: User) -> AppResult<User>;

    async fn set_user_status(&self, id: Uuid, status: UserStatus) -> AppResult<Option<User>>;

    // ---- 模板 ----

    async fn latest_template(&self, user_id: Uuid) -> AppResult<Option<UserTemplate>>;

    async fn insert_template(&self, template: UserTemplate) -> AppResult<UserTemplate>;

    // ---- 上传历史 ----

    async fn create_upload(&self, record: UploadRecord) -> AppResult<UploadRecord>;

    async fn complete_upload(&self, id: Uuid, output_file_path: &str) -> AppResult<()>;

    async fn fail_upload(&self, id: Uuid, message: &str) -> AppResult<()>;

    async fn get_upload(&self, id: Uuid) -> AppResult<Option<UploadRecord>>;

    /// 按 upload_date 降序
    async fn list_uploads(&self, user_id: Uuid) -> AppResult<Vec<UploadRecord>>;

    /// 删除上传记录及其汇总、业务员映射
    async fn delete_uploads(&self, ids: &[Uuid]) -> AppResult<u64>;

    async fn insert_sales_summary(&self, rows: &[SalesSummaryRow]) -> AppResult<()>;

    async fn list_sales_summary(&self, upload_id: Uuid) -> AppResult<Vec<SalesSummaryRow>>;

    async fn insert_agent_mappings(&self, rows: &[AgentMappingRecord]) -> AppResult<()>;

    async fn list_agent_mappings(&self, upload_id: Uuid) -> AppResult<Vec<AgentMappingRecord>>;

    /// 每个业务员最近一次分配的 SURVEYOR (仅作默认值)
    async fn agent_history(&self, agent_names: &[String]) -> AppResult<HashMap<String, String>>;
}
