//! 表格读取与表头探测

pub mod grid;
pub mod header;
pub mod parser;

pub use grid::{read_grid, Cell, Grid};
pub use header::{find_header, header_key, normalize, ColumnSpec, HeaderMatch};
pub use parser::{parse_sales, parse_sku_mappings, parse_template};
