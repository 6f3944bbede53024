use super::store::Store;
use crate::error::AppResult;
use crate::models::{
    AgentMappingRecord, NewSkuMapping, Role, SalesSummaryRow, SkuMapping, UploadRecord,
    UploadStatus, User, UserStatus, UserTemplate,
};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// 演示账号 (固定 ID, 便于在请求头中使用)
pub const DEMO_ADMIN_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_4000_8000_0000_0000_0001);
pub const DEMO_USER_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_4000_8000_0000_0000_0002);

const DEMO_SKU_MAPPINGS: [(&str, &str); 10] = [
    ("BNC CHOC TWST RS10", "Classic RT"),
    ("BNC ORNG MST MRP10", "Classic Double Burst"),
    ("MAGICMASALARS10", "Uni Klov Sleeks"),
    ("SFFNTSTKALMONDRS10", "AC L.I.T."),
    ("SF DF CHO&NUTFL 75", "Classic Clove"),
    ("JELLY 05HNGRASSRTD", "GFK Social Red"),
    ("MAGICMASALA90", "GF Spl Mint"),
    ("AS BESAN 500G", "GFP Blue Mint Switch"),
    ("SF MOM MAGIC CA 05", "Players Mint"),
    ("SFDFCHOCOFILLS90", "GFK SOCIAL 2POD"),
];

/// 进程内实现 (演示模式与测试)
#[derive(Default)]
pub struct MemoryStore {
    // 整表替换需要原子可见, 用读写锁而不是 DashMap
    sku_mappings: RwLock<Vec<SkuMapping>>,
    users: DashMap<Uuid, User>,
    templates: DashMap<Uuid, UserTemplate>,
    uploads: DashMap<Uuid, UploadRecord>,
    summaries: DashMap<Uuid, Vec<SalesSummaryRow>>,
    agent_mappings: DashMap<Uuid, Vec<AgentMappingRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置演示账号与 SKU 映射
    pub fn with_demo_data() -> Self {
        let store = Self::new();

        let mut admin = User::new("admin", Role::Admin);
        admin.id = DEMO_ADMIN_ID;
        let mut user = User::new("user", Role::User);
        user.id = DEMO_USER_ID;
        store.users.insert(admin.id, admin);
        store.users.insert(user.id, user);

        let now = Utc::now();
        let mappings = DEMO_SKU_MAPPINGS
            .iter()
            .map(|(sku, variant)| SkuMapping {
                id: Uuid::new_v4(),
                market_sku: sku.to_string(),
                variant_description: variant.to_string(),
                created_at: now,
                created_by: None,
            })
            .collect();
        *store.write_sku() = mappings;

        store
    }

    fn read_sku(&self) -> std::sync::RwLockReadGuard<'_, Vec<SkuMapping>> {
        self.sku_mappings.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_sku(&self) -> std::sync::RwLockWriteGuard<'_, Vec<SkuMapping>> {
        self.sku_mappings.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_sku_mappings(&self) -> AppResult<Vec<SkuMapping>> {
        let mut mappings = self.read_sku().clone();
        mappings.sort_by(|a, b| a.market_sku.cmp(&b.market_sku));
        Ok(mappings)
    }

    async fn insert_sku_mapping(&self, new: NewSkuMapping, created_by: Option<Uuid>) -> AppResult<SkuMapping> {
        let mapping = SkuMapping {
            id: Uuid::new_v4(),
            market_sku: new.market_sku,
            variant_description: new.variant_description,
            created_at: Utc::now(),
            created_by,
        };
        self.write_sku().push(mapping.clone());
        Ok(mapping)
    }

    async fn update_sku_mapping(&self, id: Uuid, patch: NewSkuMapping) -> AppResult<Option<SkuMapping>> {
        let mut mappings = self.write_sku();
        Ok(mappings.iter_mut().find(|m| m.id == id).map(|m| {
            m.market_sku = patch.market_sku;
            m.variant_description = patch.variant_description;
            m.clone()
        }))
    }

    async fn delete_sku_mapping(&self, id: Uuid) -> AppResult<bool> {
        let mut mappings = self.write_sku();
        let before = mappings.len();
        mappings.retain(|m| m.id != id);
        Ok(mappings.len() < before)
    }

    async fn replace_sku_mappings(&self, rows: Vec<NewSkuMapping>, created_by: Option<Uuid>) -> AppResult<usize> {
        let now = Utc::now();
        let replacement: Vec<SkuMapping> = rows
            .into_iter()
            .map(|row| SkuMapping {
                id: Uuid::new_v4(),
                market_sku: row.market_sku,
                variant_description: row.variant_description,
                created_at: now,
                created_by,
            })
            .collect();
        let count = replacement.len();
        *self.write_sku() = replacement;
        Ok(count)
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        let mut users: Vec<User> = self.users.iter().map(|e| e.value().clone()).collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.users.get(&id).map(|e| e.value().clone()))
    }

    async fn insert_user(&self, user: User) -> AppResult<User> {
        self.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn set_user_status(&self, id: Uuid, status: UserStatus) -> AppResult<Option<User>> {
        Ok(self.users.get_mut(&id).map(|mut entry| {
            entry.status = status;
            entry.updated_at = Utc::now();
            entry.clone()
        }))
    }

    async fn latest_template(&self, user_id: Uuid) -> AppResult<Option<UserTemplate>> {
        Ok(self
            .templates
            .iter()
            .filter(|e| e.user_id == user_id)
            .max_by_key(|e| e.upload_date)
            .map(|e| e.value().clone()))
    }

    async fn insert_template(&self, template: UserTemplate) -> AppResult<UserTemplate> {
        self.templates.insert(template.id, template.clone());
        Ok(template)
    }

    async fn create_upload(&self, record: UploadRecord) -> AppResult<UploadRecord> {
        self.uploads.insert(record.id, record.clone());
        Ok(record)
    }

    async fn complete_upload(&self, id: Uuid, output_file_path: &str) -> AppResult<()> {
        if let Some(mut record) = self.uploads.get_mut(&id) {
            record.status = UploadStatus::Completed;
            record.output_file_path = Some(output_file_path.to_string());
            record.error_message = None;
        }
        Ok(())
    }

    async fn fail_upload(&self, id: Uuid, message: &str) -> AppResult<()> {
        if let Some(mut record) = self.uploads.get_mut(&id) {
            record.status = UploadStatus::Failed;
            record.error_message = Some(message.to_string());
        }
        Ok(())
    }

    async fn get_upload(&self, id: Uuid) -> AppResult<Option<UploadRecord>> {
        Ok(self.uploads.get(&id).map(|e| e.value().clone()))
    }

    async fn list_uploads(&self, user_id: Uuid) -> AppResult<Vec<UploadRecord>> {
        let mut uploads: Vec<UploadRecord> = self
            .uploads
            .iter()
            .filter(|e| e.user_id == user_id)
            .map(|e| e.value().clone())
            .collect();
        uploads.sort_by(|a, b| b.upload_date.cmp(&a.upload_date));
        Ok(uploads)
    }

    async fn delete_uploads(&self, ids: &[Uuid]) -> AppResult<u64> {
        let mut deleted = 0;
        for id in ids {
            if self.uploads.remove(id).is_some() {
                deleted += 1;
            }
            self.summaries.remove(id);
            self.agent_mappings.remove(id);
        }
        Ok(deleted)
    }

    async fn insert_sales_summary(&self, rows: &[SalesSummaryRow]) -> AppResult<()> {
        for row in rows {
            self.summaries.entry(row.upload_id).or_default().push(row.clone());
        }
        Ok(())
    }

    async fn list_sales_summary(&self, upload_id: Uuid) -> AppResult<Vec<SalesSummaryRow>> {
        let mut rows = self
            .summaries
            .get(&upload_id)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        rows.sort_by(|a, b| (&a.agent_name, &a.market_sku).cmp(&(&b.agent_name, &b.market_sku)));
        Ok(rows)
    }

    async fn insert_agent_mappings(&self, rows: &[AgentMappingRecord]) -> AppResult<()> {
        for row in rows {
            self.agent_mappings.entry(row.upload_id).or_default().push(row.clone());
        }
        Ok(())
    }

    async fn list_agent_mappings(&self, upload_id: Uuid) -> AppResult<Vec<AgentMappingRecord>> {
        let mut rows = self
            .agent_mappings
            .get(&upload_id)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        rows.sort_by(|a, b| a.agent_name.cmp(&b.agent_name));
        Ok(rows)
    }

    async fn agent_history(&self, agent_names: &[String]) -> AppResult<HashMap<String, String>> {
        let mut latest: HashMap<String, AgentMappingRecord> = HashMap::new();
        for entry in self.agent_mappings.iter() {
            for record in entry.value() {
                if !agent_names.contains(&record.agent_name) {
                    continue;
                }
                let newer = latest
                    .get(&record.agent_name)
                    .map_or(true, |seen| record.created_at > seen.created_at);
                if newer {
                    latest.insert(record.agent_name.clone(), record.clone());
                }
            }
        }
        Ok(latest
            .into_iter()
            .map(|(agent, record)| (agent, record.surveyor_name))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn replace_swaps_the_whole_table() {
        let store = MemoryStore::with_demo_data();
        assert_eq!(store.list_sku_mappings().await.unwrap().len(), 10);

        let count = store
            .replace_sku_mappings(vec![NewSkuMapping::new("Z", "V"), NewSkuMapping::new("A", "V")], None)
            .await
            .unwrap();
        assert_eq!(count, 2);

        let skus: Vec<String> = store
            .list_sku_mappings()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.market_sku)
            .collect();
        assert_eq!(skus, vec!["A", "Z"]);
    }

    #[tokio::test]
    async fn crud_on_single_mapping() {
        let store = MemoryStore::new();
        let created = store.insert_sku_mapping(NewSkuMapping::new("SKU1", "V1"), None).await.unwrap();

        let updated = store
            .update_sku_mapping(created.id, NewSkuMapping::new("SKU1", "V2"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.variant_description, "V2");
        assert!(store.update_sku_mapping(Uuid::new_v4(), NewSkuMapping::new("x", "y")).await.unwrap().is_none());

        assert!(store.delete_sku_mapping(created.id).await.unwrap());
        assert!(!store.delete_sku_mapping(created.id).await.unwrap());
    }

    #[tokio::test]
    async fn agent_history_returns_most_recent_choice() {
        let store = MemoryStore::new();
        let old = Utc::now() - Duration::days(2);
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        store
            .insert_agent_mappings(&[AgentMappingRecord {
                upload_id: first,
                agent_name: "A".into(),
                surveyor_name: "OLD".into(),
                created_at: old,
            }])
            .await
            .unwrap();
        store
            .insert_agent_mappings(&[
                AgentMappingRecord { upload_id: second, agent_name: "A".into(), surveyor_name: "NEW".into(), created_at: Utc::now() },
                AgentMappingRecord { upload_id: second, agent_name: "B".into(), surveyor_name: "S".into(), created_at: Utc::now() },
            ])
            .await
            .unwrap();

        let history = store.agent_history(&["A".to_string()]).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history.get("A").map(String::as_str), Some("NEW"));
    }

    #[tokio::test]
    async fn deleting_upload_drops_children() {
        let store = MemoryStore::new();
        let record = store
            .create_upload(UploadRecord::new(DEMO_USER_ID, "s.csv", "t.xlsx"))
            .await
            .unwrap();
        store
            .insert_sales_summary(&[SalesSummaryRow {
                upload_id: record.id,
                agent_name: "A".into(),
                market_sku: "S".into(),
                total_qty: 1.into(),
            }])
            .await
            .unwrap();

        assert_eq!(store.delete_uploads(&[record.id]).await.unwrap(), 1);
        assert!(store.list_sales_summary(record.id).await.unwrap().is_empty());
        assert!(store.get_upload(record.id).await.unwrap().is_none());
    }
}
