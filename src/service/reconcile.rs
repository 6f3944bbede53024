use crate::models::{AgentAssignments, AggregatedSales, SkuIndex, SkuMapping, Template, TemplateRow};
use bigdecimal::BigDecimal;
use std::collections::{BTreeSet, HashMap};

/// 输出查找表: (SURVEYOR, VARIANT DESCRIPTION) -> 数量
pub type QuantityLookup = HashMap<(String, String), BigDecimal>;

/// 统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct JoinStats {
    /// 参与展开的汇总行数
    pub joined_facts: usize,
    /// 因业务员未分配而跳过的汇总行数
    pub skipped_unassigned: usize,
    /// 因 SKU 未映射而跳过的汇总行数
    pub skipped_unmapped: usize,
}

/// 销售中出现但映射表里没有的 SKU (去空白、忽略大小写比较)
pub fn find_unmapped_skus(sales: &AggregatedSales, mappings: &[SkuMapping]) -> Vec<String> {
    let index = SkuIndex::from_mappings(mappings);
    sales
        .iter()
        .map(|(key, _)| &key.market_sku)
        .filter(|sku| !index.contains(sku))
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// 汇总 × 业务员映射 × SKU 映射 -> 查找表
///
/// 一个 SKU 映射到多个变体时, 同一笔销量会计入每个变体 (扇出)。
pub fn build_lookup(
    sales: &AggregatedSales,
    index: &SkuIndex,
    assignments: &AgentAssignments,
) -> (QuantityLookup, JoinStats) {
    let mut lookup: QuantityLookup = HashMap::new();
    let mut stats = JoinStats::default();

    for (key, qty) in sales.iter() {
        let Some(surveyor) = assignments.surveyor_for(&key.agent_name) else {
            stats.skipped_unassigned += 1;
            continue;
        };
        let Some(variants) = index.variants_for(&key.market_sku) else {
            stats.skipped_unmapped += 1;
            continue;
        };

        stats.joined_facts += 1;
        for variant in variants {
            *lookup
                .entry((surveyor.to_string(), variant.clone()))
                .or_insert_with(|| BigDecimal::from(0)) += qty;
        }
    }

    (lookup, stats)
}

/// 用查找表重写模板的数量列; 未命中的行写 0, 其他列原样保留
pub fn apply_lookup(template: &Template, lookup: &QuantityLookup) -> Vec<(TemplateRow, BigDecimal)> {
    template
        .rows
        .iter()
        .map(|row| {
            let key = (
                template.surveyor_of(row).to_string(),
                template.variant_of(row).to_string(),
            );
            let qty = lookup.get(&key).cloned().unwrap_or_else(|| BigDecimal::from(0));
            (row.clone(), qty)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SalesRecord;
    use chrono::Utc;
    use std::str::FromStr;
    use uuid::Uuid;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn sales(rows: &[(&str, &str, &str)]) -> AggregatedSales {
        let records: Vec<SalesRecord> = rows
            .iter()
            .map(|(a, s, q)| SalesRecord {
                agent_name: a.to_string(),
                market_sku: s.to_string(),
                invoice_qty: dec(q),
            })
            .collect();
        AggregatedSales::from_records(&records)
    }

    fn mappings(rows: &[(&str, &str)]) -> Vec<SkuMapping> {
        rows.iter()
            .map(|(sku, variant)| SkuMapping {
                id: Uuid::new_v4(),
                market_sku: sku.to_string(),
                variant_description: variant.to_string(),
                created_at: Utc::now(),
                created_by: None,
            })
            .collect()
    }

    fn assignments(rows: &[(&str, &str)]) -> AgentAssignments {
        rows.iter().map(|(a, s)| (a.to_string(), s.to_string())).collect()
    }

    fn key(s: &str, v: &str) -> (String, String) {
        (s.to_string(), v.to_string())
    }

    #[test]
    fn one_sku_fans_out_to_every_variant() {
        let index = SkuIndex::from_mappings(&mappings(&[("SKU1", "V1"), ("SKU1", "V2")]));
        let (lookup, stats) = build_lookup(
            &sales(&[("A", "SKU1", "10")]),
            &index,
            &assignments(&[("A", "S1")]),
        );

        let expected: QuantityLookup = [(key("S1", "V1"), dec("10")), (key("S1", "V2"), dec("10"))]
            .into_iter()
            .collect();
        assert_eq!(lookup, expected);
        assert_eq!(stats.joined_facts, 1);
    }

    #[test]
    fn agents_sharing_a_surveyor_accumulate() {
        let index = SkuIndex::from_mappings(&mappings(&[("SKU1", "V1"), ("sku2", "V1")]));
        let (lookup, _) = build_lookup(
            &sales(&[("A", "SKU1", "1.5"), ("B", "SKU2", "2.25"), ("A", "SKU1", "1")]),
            &index,
            &assignments(&[("A", "S1"), ("B", "S1")]),
        );
        assert_eq!(lookup.get(&key("S1", "V1")), Some(&dec("4.75")));
    }

    #[test]
    fn unassigned_agent_contributes_nothing() {
        let index = SkuIndex::from_mappings(&mappings(&[("SKU1", "V1")]));
        let (lookup, stats) = build_lookup(
            &sales(&[("A", "SKU1", "3"), ("GHOST", "SKU1", "7")]),
            &index,
            &assignments(&[("A", "S1")]),
        );
        assert_eq!(lookup.len(), 1);
        assert_eq!(lookup.get(&key("S1", "V1")), Some(&dec("3")));
        assert_eq!(stats.skipped_unassigned, 1);
    }

    #[test]
    fn unmapped_sku_is_reported_and_skipped() {
        let maps = mappings(&[("BNC CHOC TWST RS10", "Classic RT")]);
        let sold = sales(&[
            ("A", "bnc choc twst rs10 ", "1"),
            ("A", "MD603IN1", "1"),
            ("B", "MD603IN1", "1"),
            ("B", "ENGMANPKTMV18", "1"),
        ]);

        assert_eq!(find_unmapped_skus(&sold, &maps), vec!["ENGMANPKTMV18", "MD603IN1"]);

        let (lookup, stats) = build_lookup(
            &sold,
            &SkuIndex::from_mappings(&maps),
            &assignments(&[("A", "S1"), ("B", "S2")]),
        );
        assert_eq!(lookup.len(), 1);
        assert_eq!(stats.skipped_unmapped, 3);
    }

    #[test]
    fn template_rows_without_sales_become_zero() {
        let template = Template {
            headers: vec!["SURVEYOR".into(), "VARIANT DESCRIPTION".into(), "QUANTITY (in M)".into(), "NOTE".into()],
            surveyor_col: 0,
            variant_col: 1,
            quantity_col: 2,
            rows: vec![
                TemplateRow { cells: vec![" S1 ".into(), "V1".into(), "42".into(), "keep".into()] },
                TemplateRow { cells: vec!["S2".into(), "V1".into(), "42".into(), "".into()] },
            ],
        };
        let lookup: QuantityLookup = [(key("S1", "V1"), dec("10"))].into_iter().collect();

        let rows = apply_lookup(&template, &lookup);
        assert_eq!(rows[0].1, dec("10"));
        assert_eq!(rows[0].0.cells[3], "keep");
        assert_eq!(rows[1].1, dec("0"));
    }
}
