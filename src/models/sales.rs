use bigdecimal::BigDecimal;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// 销售明细 (解析后, 仅在单次处理中存在)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesRecord {
    pub agent_name: String,
    pub market_sku: String,
    pub invoice_qty: BigDecimal,
}

/// 汇总键: (业务员, 市场SKU)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SalesKey {
    pub agent_name: String,
    pub market_sku: String,
}

/// 按 (业务员, SKU) 汇总的销量, 构建后不可变
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregatedSales {
    totals: IndexMap<SalesKey, BigDecimal>,
}

impl AggregatedSales {
    /// 从销售明细构建汇总 (顺序保持首次出现顺序)
    pub fn from_records(records: &[SalesRecord]) -> Self {
        let mut totals: IndexMap<SalesKey, BigDecimal> = IndexMap::new();
        for record in records {
            let key = SalesKey {
                agent_name: record.agent_name.clone(),
                market_sku: record.market_sku.clone(),
            };
            *totals.entry(key).or_insert_with(|| BigDecimal::from(0)) += &record.invoice_qty;
        }
        Self { totals }
    }

    pub fn get(&self, agent_name: &str, market_sku: &str) -> Option<&BigDecimal> {
        self.totals.get(&SalesKey {
            agent_name: agent_name.to_string(),
            market_sku: market_sku.to_string(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SalesKey, &BigDecimal)> {
        self.totals.iter()
    }

    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    /// 去重后的业务员名单 (已排序)
    pub fn agent_names(&self) -> Vec<String> {
        let mut agents: Vec<String> = self.totals.keys().map(|k| k.agent_name.clone()).collect();
        agents.sort();
        agents.dedup();
        agents
    }

    /// 转为待持久化的汇总行
    pub fn to_summary_rows(&self, upload_id: Uuid) -> Vec<SalesSummaryRow> {
        self.totals
            .iter()
            .map(|(key, qty)| SalesSummaryRow {
                upload_id,
                agent_name: key.agent_name.clone(),
                market_sku: key.market_sku.clone(),
                total_qty: qty.clone(),
            })
            .collect()
    }
}

/// 汇总表 (sales_summary)
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct SalesSummaryRow {
    pub upload_id: Uuid,
    pub agent_name: String,
    pub market_sku: String,
    pub total_qty: BigDecimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::str::FromStr;

    fn record(agent: &str, sku: &str, qty: &str) -> SalesRecord {
        SalesRecord {
            agent_name: agent.to_string(),
            market_sku: sku.to_string(),
            invoice_qty: BigDecimal::from_str(qty).unwrap(),
        }
    }

    fn as_sorted(sales: &AggregatedSales) -> BTreeMap<SalesKey, BigDecimal> {
        sales.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    #[test]
    fn sums_per_agent_and_sku() {
        let sales = AggregatedSales::from_records(&[
            record("A", "SKU1", "2"),
            record("A", "SKU1", "3"),
            record("B", "SKU2", "5"),
        ]);

        assert_eq!(sales.len(), 2);
        assert_eq!(sales.get("A", "SKU1"), Some(&BigDecimal::from(5)));
        assert_eq!(sales.get("B", "SKU2"), Some(&BigDecimal::from(5)));
    }

    #[test]
    fn order_of_records_does_not_change_sums() {
        let rows = vec![
            record("RUSHIKESH", "BNC CHOC TWST RS10", "2.232"),
            record("DHIRAJ", "MD603IN1", "0.092"),
            record("RUSHIKESH", "MAGICMASALARS10", "0.6"),
            record("RUSHIKESH", "BNC CHOC TWST RS10", "0.6"),
            record("DHIRAJ", "MD603IN1", "1"),
        ];
        let mut reversed = rows.clone();
        reversed.reverse();
        let mut rotated = rows.clone();
        rotated.rotate_left(2);

        let base = as_sorted(&AggregatedSales::from_records(&rows));
        assert_eq!(base, as_sorted(&AggregatedSales::from_records(&reversed)));
        assert_eq!(base, as_sorted(&AggregatedSales::from_records(&rotated)));
        assert_eq!(
            AggregatedSales::from_records(&rows).get("RUSHIKESH", "BNC CHOC TWST RS10"),
            Some(&BigDecimal::from_str("2.832").unwrap())
        );
    }

    #[test]
    fn agent_names_are_distinct_and_sorted() {
        let sales = AggregatedSales::from_records(&[
            record("Zed", "S1", "1"),
            record("Amy", "S1", "1"),
            record("Zed", "S2", "1"),
        ]);
        assert_eq!(sales.agent_names(), vec!["Amy", "Zed"]);
    }

}
