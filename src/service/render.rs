use crate::error::AppResult;
use crate::models::{AgentMappingRecord, SalesSummaryRow, SkuIndex, Template, TemplateRow};
use bigdecimal::BigDecimal;
use csv::Writer;
use std::collections::HashMap;

/// 数量输出为普通十进制 (无指数, 无多余的尾随 0)
pub fn format_quantity(qty: &BigDecimal) -> String {
    let normalized = qty.normalized();
    let (_, scale) = normalized.as_bigint_and_exponent();
    if scale < 0 {
        normalized.with_scale(0).to_string()
    } else {
        normalized.to_string()
    }
}

/// 生成输出 CSV: 表头按模板原顺序, 仅数量列被替换
pub fn render_output(template: &Template, rows: &[(TemplateRow, BigDecimal)]) -> AppResult<Vec<u8>> {
    let mut writer = Writer::from_writer(Vec::new());
    writer.write_record(&template.headers)?;

    for (row, qty) in rows {
        let mut cells = row.cells.clone();
        if let Some(cell) = cells.get_mut(template.quantity_col) {
            *cell = format_quantity(qty);
        }
        writer.write_record(&cells)?;
    }

    finish(writer)
}

/// 原始汇总报表
pub fn render_raw_summary(rows: &[SalesSummaryRow]) -> AppResult<Vec<u8>> {
    let mut writer = Writer::from_writer(Vec::new());
    writer.write_record(["DS Name", "Market SKU", "Total Invoice Qty"])?;
    for row in rows {
        writer.write_record([
            row.agent_name.as_str(),
            row.market_sku.as_str(),
            format_quantity(&row.total_qty).as_str(),
        ])?;
    }
    finish(writer)
}

/// 映射后汇总报表: 每条汇总按 SKU 映射展开, 业务员无 SURVEYOR 的不输出
pub fn render_mapped_summary(
    rows: &[SalesSummaryRow],
    agent_mappings: &[AgentMappingRecord],
    index: &SkuIndex,
) -> AppResult<Vec<u8>> {
    let surveyors: HashMap<&str, &str> = agent_mappings
        .iter()
        .map(|m| (m.agent_name.as_str(), m.surveyor_name.as_str()))
        .collect();

    let mut writer = Writer::from_writer(Vec::new());
    writer.write_record(["SURVEYOR", "VARIANT DESCRIPTION", "Total Invoice Qty"])?;
    for row in rows {
        let Some(surveyor) = surveyors.get(row.agent_name.as_str()) else {
            continue;
        };
        let Some(variants) = index.variants_for(&row.market_sku) else {
            continue;
        };
        let qty = format_quantity(&row.total_qty);
        for variant in variants {
            writer.write_record([*surveyor, variant.as_str(), qty.as_str()])?;
        }
    }
    finish(writer)
}

fn finish(writer: Writer<Vec<u8>>) -> AppResult<Vec<u8>> {
    writer
        .into_inner()
        .map_err(|e| crate::error::AppError::Output(e.to_string()))
}
