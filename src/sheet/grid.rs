use crate::error::{AppError, AppResult};
use bigdecimal::{BigDecimal, Zero};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::io::Cursor;
use std::str::FromStr;

/// 单元格 (与具体表格格式无关)
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Cell {
    /// 单元格的文本形式; 数字按最短十进制形式输出 (12.0 -> "12")
    pub fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => n.to_string(),
            Cell::Bool(b) => b.to_string(),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// 尽力转换为数量, 无法解析时为 0
    pub fn to_quantity(&self) -> BigDecimal {
        match self {
            Cell::Number(n) if n.is_finite() => {
                BigDecimal::from_str(&n.to_string()).unwrap_or_else(|_| BigDecimal::zero())
            }
            Cell::Text(s) => {
                let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
                BigDecimal::from_str(&cleaned).unwrap_or_else(|_| BigDecimal::zero())
            }
            _ => BigDecimal::zero(),
        }
    }
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => Cell::Empty,
            Data::String(s) => Cell::Text(s.clone()),
            Data::Float(f) => Cell::Number(*f),
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Bool(b) => Cell::Bool(*b),
            Data::Error(_) => Cell::Empty,
            other => Cell::Text(other.to_string()),
        }
    }
}

/// 表格的行列网格 (第一个工作表)
#[derive(Debug, Clone, Default)]
pub struct Grid {
    pub rows: Vec<Vec<Cell>>,
}

impl Grid {
    pub fn from_rows(rows: Vec<Vec<Cell>>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// 按文件名选择解析方式: csv/txt 走 CSV, 其余交给 calamine 自动识别
pub fn read_grid(file_name: &str, bytes: &[u8]) -> AppResult<Grid> {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "csv" | "txt" => read_csv_grid(bytes),
        _ => read_workbook_grid(bytes),
    }
}

fn read_csv_grid(bytes: &[u8]) -> AppResult<Grid> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| AppError::Spreadsheet(format!("CSV parse error: {e}")))?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    if field.is_empty() {
                        Cell::Empty
                    } else {
                        Cell::Text(field.to_string())
                    }
                })
                .collect(),
        );
    }

    Ok(Grid { rows })
}

fn read_workbook_grid(bytes: &[u8]) -> AppResult<Grid> {
    let cursor = Cursor::new(bytes.to_vec());
    let mut workbook = open_workbook_auto_from_rs(cursor)
        .map_err(|e| AppError::Spreadsheet(format!("Unsupported or corrupt workbook: {e}")))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| AppError::Spreadsheet("Workbook has no sheets".to_string()))?
        .map_err(|e| AppError::Spreadsheet(format!("Failed to read first sheet: {e}")))?;

    let rows = range
        .rows()
        .map(|row| row.iter().map(Cell::from).collect())
        .collect();

    Ok(Grid { rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_csv_without_assuming_header() {
        let grid = read_grid("sales.CSV", b"\xEF\xBB\xBFReport,,\nDS Name,Market SKU,Invoice Qty\nA,SKU1,2\n").unwrap();
        assert_eq!(grid.len(), 3);
        assert_eq!(grid.rows[0], vec![Cell::Text("Report".into()), Cell::Empty, Cell::Empty]);
        assert_eq!(grid.rows[2][2], Cell::Text("2".into()));
    }

    #[test]
    fn csv_rows_may_have_different_lengths() {
        let grid = read_grid("x.csv", b"title\na,b,c\n").unwrap();
        assert_eq!(grid.rows[0].len(), 1);
        assert_eq!(grid.rows[1].len(), 3);
    }

    #[test]
    fn garbage_workbook_is_a_spreadsheet_error() {
        let err = read_grid("sales.xlsx", b"definitely not a zip").unwrap_err();
        assert!(matches!(err, AppError::Spreadsheet(_)));
    }

    #[test]
    fn quantity_coercion_is_best_effort() {
        assert_eq!(Cell::Number(2.232).to_quantity(), BigDecimal::from_str("2.232").unwrap());
        assert_eq!(Cell::Text(" 1,250.5 ".into()).to_quantity(), BigDecimal::from_str("1250.5").unwrap());
        assert!(Cell::Text("n/a".into()).to_quantity().is_zero());
        assert!(Cell::Empty.to_quantity().is_zero());
        assert!(Cell::Number(f64::NAN).to_quantity().is_zero());
    }

    #[test]
    fn whole_numbers_render_without_fraction() {
        assert_eq!(Cell::Number(12.0).as_text(), "12");
        assert_eq!(Cell::Number(0.6).as_text(), "0.6");
    }
}
