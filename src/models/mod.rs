pub mod mapping;
pub mod sales;
pub mod template;
pub mod upload;
pub mod user;
pub mod workflow;

pub use mapping::{sku_key, AgentAssignments, AgentMappingRecord, NewSkuMapping, SkuIndex, SkuMapping};
pub use sales::{AggregatedSales, SalesKey, SalesRecord, SalesSummaryRow};
pub use template::{Template, TemplateRow};
pub use upload::{output_file_name_for, UploadRecord, UploadRow, UploadStatus, UserTemplate};
pub use user::{Role, User, UserRow, UserStatus};
pub use workflow::{PendingUpload, UploadWorkflow, WorkflowState};
