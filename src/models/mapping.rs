use chrono::{DateTime, Utc};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashMap;
use uuid::Uuid;

/// SKU 映射表 (sku_mapping)
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct SkuMapping {
    pub id: Uuid,
    pub market_sku: String,
    pub variant_description: String,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
}

/// 新增 / 修改 SKU 映射的输入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSkuMapping {
    pub market_sku: String,
    pub variant_description: String,
}

impl NewSkuMapping {
    pub fn new(market_sku: &str, variant_description: &str) -> Self {
        Self {
            market_sku: market_sku.trim().to_string(),
            variant_description: variant_description.trim().to_string(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.market_sku.is_empty() && !self.variant_description.is_empty()
    }
}

/// SKU 比较键: 去空白 + 大写
pub fn sku_key(market_sku: &str) -> String {
    market_sku.trim().to_uppercase()
}

/// SKU -> 变体描述 索引 (一个 SKU 可展开为多个变体)
#[derive(Debug, Clone, Default)]
pub struct SkuIndex {
    variants: HashMap<String, IndexSet<String>>,
}

impl SkuIndex {
    pub fn from_mappings(mappings: &[SkuMapping]) -> Self {
        let mut variants: HashMap<String, IndexSet<String>> = HashMap::new();
        for mapping in mappings {
            variants
                .entry(sku_key(&mapping.market_sku))
                .or_default()
                .insert(mapping.variant_description.trim().to_string());
        }
        Self { variants }
    }

    pub fn variants_for(&self, market_sku: &str) -> Option<&IndexSet<String>> {
        self.variants.get(&sku_key(market_sku))
    }

    pub fn contains(&self, market_sku: &str) -> bool {
        self.variants.contains_key(&sku_key(market_sku))
    }
}

/// 业务员 -> SURVEYOR 分配 (单次上传范围内)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentAssignments(IndexMap<String, String>);

impl AgentAssignments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(&mut self, agent_name: &str, surveyor: &str) {
        self.0.insert(agent_name.to_string(), surveyor.trim().to_string());
    }

    /// 未分配或分配为空串时返回 None
    pub fn surveyor_for(&self, agent_name: &str) -> Option<&str> {
        self.0
            .get(agent_name)
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }

    /// 列出尚未分配 (或为空) 的业务员
    pub fn unassigned<'a>(&self, agents: &'a [String]) -> Vec<&'a String> {
        agents
            .iter()
            .filter(|agent| self.surveyor_for(agent).is_none())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    pub fn to_records(&self, upload_id: Uuid) -> Vec<AgentMappingRecord> {
        self.0
            .iter()
            .map(|(agent, surveyor)| AgentMappingRecord {
                upload_id,
                agent_name: agent.clone(),
                surveyor_name: surveyor.clone(),
                created_at: Utc::now(),
            })
            .collect()
    }
}

impl FromIterator<(String, String)> for AgentAssignments {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut assignments = Self::new();
        for (agent, surveyor) in iter {
            assignments.assign(&agent, &surveyor);
        }
        assignments
    }
}

/// 单次上传的业务员映射记录 (salesman_mapping)
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct AgentMappingRecord {
    pub upload_id: Uuid,
    pub agent_name: String,
    pub surveyor_name: String,
    pub created_at: DateTime<Utc>,
}
