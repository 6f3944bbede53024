use super::grid::{Cell, Grid};
use crate::error::{AppError, AppResult};

/// 折叠连续空白并去除首尾空白
pub fn normalize(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 表头比较键: normalize 后转大写
pub fn header_key(value: &str) -> String {
    normalize(value).to_uppercase()
}

/// 必需列: 规范名 + 可接受的别名
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
}

impl ColumnSpec {
    pub const fn named(name: &'static str) -> Self {
        Self { name, aliases: &[] }
    }

    pub const fn with_aliases(name: &'static str, aliases: &'static [&'static str]) -> Self {
        Self { name, aliases }
    }

    fn position_in(&self, keys: &[String]) -> Option<usize> {
        std::iter::once(self.name)
            .chain(self.aliases.iter().copied())
            .map(header_key)
            .find_map(|wanted| keys.iter().position(|k| *k == wanted))
    }
}

/// 表头探测结果
#[derive(Debug, Clone)]
pub struct HeaderMatch {
    /// 表头所在行 (网格内下标)
    pub row_index: usize,
    /// 与必需列顺序对应的列下标
    pub columns: Vec<usize>,
    /// 表头行各单元格 (normalize 后), 保留原始顺序
    pub headers: Vec<String>,
}

impl HeaderMatch {
    pub fn data_rows<'a>(&self, grid: &'a Grid) -> &'a [Vec<Cell>] {
        grid.rows.get(self.row_index + 1..).unwrap_or(&[])
    }
}

/// 在前 scan_rows 行中寻找第一条包含全部必需列的行
pub fn find_header(grid: &Grid, required: &[ColumnSpec], scan_rows: usize) -> AppResult<HeaderMatch> {
    let mut closest: Option<Vec<String>> = None;

    for (row_index, row) in grid.rows.iter().take(scan_rows).enumerate() {
        let keys: Vec<String> = row.iter().map(|cell| header_key(&cell.as_text())).collect();

        let mut columns = Vec::with_capacity(required.len());
        let mut missing = Vec::new();
        for column in required {
            match column.position_in(&keys) {
                Some(idx) => columns.push(idx),
                None => missing.push(column.name.to_string()),
            }
        }

        if missing.is_empty() {
            tracing::debug!("Header row detected at row {}", row_index + 1);
            return Ok(HeaderMatch {
                row_index,
                columns,
                headers: row.iter().map(|cell| normalize(&cell.as_text())).collect(),
            });
        }

        let better = closest
            .as_ref()
            .map_or(missing.len() < required.len(), |best| missing.len() < best.len());
        if better {
            closest = Some(missing);
        }
    }

    Err(AppError::HeaderNotFound {
        missing: closest.unwrap_or_else(|| required.iter().map(|s| s.name.to_string()).collect()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPECS: [ColumnSpec; 3] = [
        ColumnSpec::named("DS Name"),
        ColumnSpec::named("Market SKU"),
        ColumnSpec::named("Invoice Qty"),
    ];

    fn text_row(values: &[&str]) -> Vec<Cell> {
        values
            .iter()
            .map(|v| if v.is_empty() { Cell::Empty } else { Cell::Text(v.to_string()) })
            .collect()
    }

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(normalize("  QUANTITY   (in\tM) "), "QUANTITY (in M)");
        assert_eq!(header_key("ds  name"), "DS NAME");
    }

    #[test]
    fn skips_banner_rows() {
        let grid = Grid::from_rows(vec![
            text_row(&["Daily Sales Report"]),
            text_row(&["Distributor:", "ACME"]),
            text_row(&[]),
            text_row(&["Invoice No", " DS  Name ", "market sku", "Invoice Qty"]),
            text_row(&["1", "A", "SKU1", "2"]),
        ]);

        let header = find_header(&grid, &SPECS, 20).unwrap();
        assert_eq!(header.row_index, 3);
        assert_eq!(header.columns, vec![1, 2, 3]);
        assert_eq!(header.headers, vec!["Invoice No", "DS Name", "market sku", "Invoice Qty"]);
        assert_eq!(header.data_rows(&grid).len(), 1);
    }

    #[test]
    fn earliest_complete_row_wins() {
        let grid = Grid::from_rows(vec![
            text_row(&["DS Name", "Market SKU"]),
            text_row(&["DS Name", "Market SKU", "Invoice Qty"]),
            text_row(&["DS Name", "Market SKU", "Invoice Qty", "Extra"]),
        ]);

        assert_eq!(find_header(&grid, &SPECS, 20).unwrap().row_index, 1);
    }

    #[test]
    fn header_beyond_scan_window_is_not_found() {
        let mut rows: Vec<Vec<Cell>> = (0..20).map(|i| text_row(&[&format!("banner {i}")])).collect();
        rows.push(text_row(&["DS Name", "Market SKU", "Invoice Qty"]));
        let grid = Grid::from_rows(rows);

        let err = find_header(&grid, &SPECS, 20).unwrap_err();
        match err {
            AppError::HeaderNotFound { missing } => assert_eq!(missing.len(), 3),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn header_on_last_scanned_row_is_found() {
        let mut rows: Vec<Vec<Cell>> = (0..19).map(|i| text_row(&[&format!("banner {i}")])).collect();
        rows.push(text_row(&["DS Name", "Market SKU", "Invoice Qty"]));
        rows.push(text_row(&["A", "SKU1", "1"]));
        let grid = Grid::from_rows(rows);

        let header = find_header(&grid, &SPECS, 20).unwrap();
        assert_eq!(header.row_index, 19);
        assert_eq!(header.data_rows(&grid).len(), 1);
    }

    #[test]
    fn missing_columns_come_from_closest_row() {
        let grid = Grid::from_rows(vec![
            text_row(&["Title"]),
            text_row(&["DS Name", "Market SKU", "Qty"]),
        ]);

        match find_header(&grid, &SPECS, 20).unwrap_err() {
            AppError::HeaderNotFound { missing } => assert_eq!(missing, vec!["Invoice Qty"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn aliases_are_accepted() {
        const MAPPING: [ColumnSpec; 2] = [
            ColumnSpec::with_aliases("Market SKU", &["market_sku", "MSKU", "sku"]),
            ColumnSpec::with_aliases("Variant Description", &["variant_description", "Description", "desc"]),
        ];
        let grid = Grid::from_rows(vec![text_row(&["msku", "description"])]);

        let header = find_header(&grid, &MAPPING, 20).unwrap();
        assert_eq!(header.columns, vec![0, 1]);
    }
}
