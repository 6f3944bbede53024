pub mod admin;
pub mod reconcile;
pub mod render;
pub mod workflow;

pub use admin::AdminService;
pub use reconcile::{apply_lookup, build_lookup, find_unmapped_skus, JoinStats, QuantityLookup};
pub use render::{format_quantity, render_mapped_summary, render_output, render_raw_summary};
pub use workflow::{
    CompletionOutcome, OutputFile, ReconcileService, SalesReview, TemplateSummary, WorkflowSnapshot,
};
