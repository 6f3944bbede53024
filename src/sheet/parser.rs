use super::grid::{Cell, Grid};
use super::header::{find_header, ColumnSpec};
use crate::error::{AppError, AppResult};
use crate::models::{NewSkuMapping, SalesRecord, Template, TemplateRow};
use bigdecimal::{BigDecimal, Zero};

pub const DS_NAME: &str = "DS Name";
pub const MARKET_SKU: &str = "Market SKU";
pub const INVOICE_QTY: &str = "Invoice Qty";

pub const SURVEYOR: &str = "SURVEYOR";
pub const VARIANT_DESCRIPTION: &str = "VARIANT DESCRIPTION";
pub const QUANTITY: &str = "QUANTITY (in M)";

const SALES_COLUMNS: [ColumnSpec; 3] = [
    ColumnSpec::named(DS_NAME),
    ColumnSpec::named(MARKET_SKU),
    ColumnSpec::named(INVOICE_QTY),
];

const TEMPLATE_COLUMNS: [ColumnSpec; 3] = [
    ColumnSpec::named(SURVEYOR),
    ColumnSpec::named(VARIANT_DESCRIPTION),
    ColumnSpec::named(QUANTITY),
];

const SKU_MAPPING_COLUMNS: [ColumnSpec; 2] = [
    ColumnSpec::with_aliases(MARKET_SKU, &["market_sku", "MSKU", "sku"]),
    ColumnSpec::with_aliases("Variant Description", &["variant_description", "Description", "desc"]),
];

fn cell_text(row: &[Cell], col: usize) -> String {
    row.get(col).map(|c| c.as_text().trim().to_string()).unwrap_or_default()
}

/// 解析销售文件
///
/// 跳过缺少业务员 / SKU 的行以及数量为 0 的行。
pub fn parse_sales(grid: &Grid, scan_rows: usize) -> AppResult<Vec<SalesRecord>> {
    let header = find_header(grid, &SALES_COLUMNS, scan_rows)?;
    let (agent_col, sku_col, qty_col) = (header.columns[0], header.columns[1], header.columns[2]);

    let data_rows = header.data_rows(grid);
    let mut records = Vec::with_capacity(data_rows.len());
    let mut skipped = 0usize;

    for row in data_rows {
        let agent_name = cell_text(row, agent_col);
        let market_sku = cell_text(row, sku_col);
        if agent_name.is_empty() || market_sku.is_empty() {
            skipped += 1;
            continue;
        }

        let invoice_qty = row
            .get(qty_col)
            .map(Cell::to_quantity)
            .unwrap_or_else(BigDecimal::zero);
        if invoice_qty.is_zero() {
            skipped += 1;
            continue;
        }

        records.push(SalesRecord {
            agent_name,
            market_sku,
            invoice_qty,
        });
    }

    if skipped > 0 {
        tracing::debug!("Sales file: {} rows kept, {} rows skipped", records.len(), skipped);
    }
    if records.is_empty() {
        if !data_rows.is_empty() {
            tracing::warn!("Parsed {} rows but filtered all out", data_rows.len());
        }
        return Err(AppError::EmptyInput("Sales file is empty or invalid".to_string()));
    }

    Ok(records)
}

/// 解析输出模板, 保留表头顺序与其余列的原值
pub fn parse_template(grid: &Grid, scan_rows: usize) -> AppResult<Template> {
    let header = find_header(grid, &TEMPLATE_COLUMNS, scan_rows)?;

    let mut headers = header.headers.clone();
    while headers.last().is_some_and(|h| h.is_empty()) {
        headers.pop();
    }
    let width = headers.len();

    let rows: Vec<TemplateRow> = header
        .data_rows(grid)
        .iter()
        .filter(|row| !row.iter().all(Cell::is_blank))
        .map(|row| TemplateRow {
            cells: (0..width)
                .map(|col| row.get(col).map(Cell::as_text).unwrap_or_default())
                .collect(),
        })
        .collect();

    if rows.is_empty() {
        return Err(AppError::EmptyInput("Template file is empty or invalid".to_string()));
    }

    Ok(Template {
        headers,
        surveyor_col: header.columns[0],
        variant_col: header.columns[1],
        quantity_col: header.columns[2],
        rows,
    })
}

/// 解析 SKU 映射批量导入文件
pub fn parse_sku_mappings(grid: &Grid, scan_rows: usize) -> AppResult<Vec<NewSkuMapping>> {
    let header = find_header(grid, &SKU_MAPPING_COLUMNS, scan_rows)?;
    let (sku_col, variant_col) = (header.columns[0], header.columns[1]);

    let mappings: Vec<NewSkuMapping> = header
        .data_rows(grid)
        .iter()
        .map(|row| NewSkuMapping::new(&cell_text(row, sku_col), &cell_text(row, variant_col)))
        .filter(NewSkuMapping::is_complete)
        .collect();

    if mappings.is_empty() {
        return Err(AppError::EmptyInput(
            "No valid mappings found. Please check columns \"Market SKU\" and \"Variant Description\"."
                .to_string(),
        ));
    }

    Ok(mappings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::read_grid;
    use std::str::FromStr;

    fn grid(csv: &str) -> Grid {
        read_grid("input.csv", csv.as_bytes()).unwrap()
    }

    #[test]
    fn sales_rows_are_cleaned() {
        let grid = grid(
            "ACME Distributors,,,\n\
             Period: March,,,\n\
             Invoice,DS Name,Market SKU,Invoice Qty\n\
             1, RUSHIKESH-9321844072-KASHIWALE ,BNC CHOC TWST RS10,2.232\n\
             2,,BNC CHOC TWST RS10,4\n\
             3,DHIRAJ,,4\n\
             4,DHIRAJ,MD603IN1,0\n\
             5,DHIRAJ,MD603IN1,abc\n\
             6,DHIRAJ,MD603IN1,0.092\n",
        );

        let records = parse_sales(&grid, 20).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].agent_name, "RUSHIKESH-9321844072-KASHIWALE");
        assert_eq!(records[0].invoice_qty, BigDecimal::from_str("2.232").unwrap());
        assert_eq!(records[1].market_sku, "MD603IN1");
    }

    #[test]
    fn sales_with_only_zero_rows_is_empty_input() {
        let grid = grid("DS Name,Market SKU,Invoice Qty\nA,S1,0\n");
        assert!(matches!(parse_sales(&grid, 20), Err(AppError::EmptyInput(_))));
    }

    #[test]
    fn sales_without_header_reports_missing_columns() {
        let grid = grid("DS Name,SKU,Invoice Qty\nA,S1,1\n");
        match parse_sales(&grid, 20) {
            Err(AppError::HeaderNotFound { missing }) => assert_eq!(missing, vec!["Market SKU"]),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn template_keeps_columns_and_drops_blank_rows() {
        let grid = grid(
            "Stock Issue,,,,\n\
             S.No,SURVEYOR,VARIANT  DESCRIPTION,QUANTITY (in M),\n\
             1,VIVEK (VMC),Classic RT,99,\n\
             ,,,,\n\
             2,ZAHEER,Players Mint,,\n",
        );

        let template = parse_template(&grid, 20).unwrap();
        assert_eq!(template.headers, vec!["S.No", "SURVEYOR", "VARIANT DESCRIPTION", "QUANTITY (in M)"]);
        assert_eq!((template.surveyor_col, template.variant_col, template.quantity_col), (1, 2, 3));
        assert_eq!(template.rows.len(), 2);
        assert_eq!(template.rows[0].cells, vec!["1", "VIVEK (VMC)", "Classic RT", "99"]);
        assert_eq!(template.surveyors(), vec!["VIVEK (VMC)", "ZAHEER"]);
        assert_eq!(template.variant_descriptions(), vec!["Classic RT", "Players Mint"]);
    }

    #[test]
    fn template_without_rows_is_empty_input() {
        let grid = grid("SURVEYOR,VARIANT DESCRIPTION,QUANTITY (in M)\n");
        assert!(matches!(parse_template(&grid, 20), Err(AppError::EmptyInput(_))));
    }

    #[test]
    fn sku_mapping_sheet_accepts_alias_headers() {
        let grid = grid("market_sku,variant_description\n BNC CHOC TWST RS10 ,Classic RT\nMAGICMASALA90,\n,Orphan\n");
        let mappings = parse_sku_mappings(&grid, 20).unwrap();
        assert_eq!(mappings, vec![NewSkuMapping::new("BNC CHOC TWST RS10", "Classic RT")]);
    }
}
