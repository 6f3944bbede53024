use serde::Serialize;

/// 模板的一行, 单元格与表头一一对应
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateRow {
    pub cells: Vec<String>,
}

/// 输出模板
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Template {
    /// 表头 (探测到的原始顺序)
    pub headers: Vec<String>,
    pub surveyor_col: usize,
    pub variant_col: usize,
    pub quantity_col: usize,
    pub rows: Vec<TemplateRow>,
}

impl Template {
    pub fn surveyor_of<'a>(&self, row: &'a TemplateRow) -> &'a str {
        row.cells.get(self.surveyor_col).map_or("", |s| s.trim())
    }

    pub fn variant_of<'a>(&self, row: &'a TemplateRow) -> &'a str {
        row.cells.get(self.variant_col).map_or("", |s| s.trim())
    }

    /// 模板中的 SURVEYOR 去重排序 (供业务员分配选择)
    pub fn surveyors(&self) -> Vec<String> {
        self.distinct_sorted(self.surveyor_col)
    }

    /// 模板中的 VARIANT DESCRIPTION 去重排序
    pub fn variant_descriptions(&self) -> Vec<String> {
        self.distinct_sorted(self.variant_col)
    }

    fn distinct_sorted(&self, col: usize) -> Vec<String> {
        let mut values: Vec<String> = self
            .rows
            .iter()
            .filter_map(|row| row.cells.get(col))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();
        values.sort();
        values.dedup();
        values
    }
}
