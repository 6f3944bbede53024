pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod service;
pub mod sheet;
pub mod storage;

pub use api::{router, AppState};
pub use config::AppConfig;
pub use db::{create_pool, MemoryStore, PgStore, Store};
pub use error::{AppError, AppResult};
pub use service::{AdminService, ReconcileService};
pub use storage::{MemoryStorage, ObjectStorage, SupabaseStorage};
