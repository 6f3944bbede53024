pub mod handlers;
pub mod response;
pub mod session;

pub use handlers::health_check;
pub use response::ApiResponse;
pub use session::{AdminSession, Session, OPERATOR_HEADER};

use crate::config::AppConfig;
use crate::db::Store;
use crate::service::{AdminService, ReconcileService};
use crate::storage::ObjectStorage;
use axum::{
    extract::{DefaultBodyLimit, FromRef},
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;

/// 上传文件大小上限
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// 共享状态
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub reconcile: Arc<ReconcileService>,
    pub admin: Arc<AdminService>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, storage: Arc<dyn ObjectStorage>, config: &AppConfig) -> Self {
        Self {
            reconcile: Arc::new(ReconcileService::new(store.clone(), storage, config)),
            admin: Arc::new(AdminService::new(store.clone(), config.pipeline.header_scan_rows)),
            store,
        }
    }
}

impl FromRef<AppState> for Arc<dyn Store> {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}

impl FromRef<AppState> for Arc<ReconcileService> {
    fn from_ref(state: &AppState) -> Self {
        state.reconcile.clone()
    }
}

impl FromRef<AppState> for Arc<AdminService> {
    fn from_ref(state: &AppState) -> Self {
        state.admin.clone()
    }
}

/// 构建路由
pub fn router(state: AppState) -> Router {
    let workflow_routes = Router::new()
        .route("/workflow", get(handlers::workflow_status))
        .route("/template", post(handlers::upload_template))
        .route("/uploads", get(handlers::list_uploads))
        .route("/uploads/sales", post(handlers::submit_sales))
        .route("/uploads/agents", put(handlers::assign_agents))
        .route("/uploads/complete", post(handlers::complete_upload))
        .route("/uploads/:id/output", get(handlers::download_output));

    let sku_routes = Router::new()
        .route(
            "/sku-mappings",
            get(handlers::list_sku_mappings).post(handlers::create_sku_mapping),
        )
        .route("/sku-mappings/bulk", post(handlers::import_sku_mappings))
        .route(
            "/sku-mappings/:id",
            put(handlers::update_sku_mapping).delete(handlers::delete_sku_mapping),
        );

    let admin_routes = Router::new()
        .route("/users", get(handlers::list_users))
        .route("/users/:id/status", put(handlers::set_user_status))
        .route("/users/:id/uploads", get(handlers::user_uploads))
        .route("/uploads/:id/raw-summary", get(handlers::raw_summary))
        .route("/uploads/:id/mapped-summary", get(handlers::mapped_summary));

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest(
            "/api",
            workflow_routes.merge(sku_routes).nest("/admin", admin_routes),
        )
        .layer(ServiceBuilder::new().layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)))
        .with_state(state)
}
