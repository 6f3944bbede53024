use sales_reconciler::config::{StorageBackend, StoreBackend};
use sales_reconciler::db::{DEMO_ADMIN_ID, DEMO_USER_ID};
use sales_reconciler::{
    create_pool, router, AppConfig, AppState, MemoryStorage, MemoryStore, ObjectStorage, PgStore,
    Store, SupabaseStorage,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志 - 本地时间格式, 默认 info, 可用 RUST_LOG 覆盖
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .with_level(true)
        .init();

    // 加载配置
    let config = AppConfig::load()?;
    info!("Starting server with config: {:?}", config);

    // 持久化后端
    let store: Arc<dyn Store> = match config.database.backend {
        StoreBackend::Postgres => {
            let pool = create_pool(&config.database).await?;
            Arc::new(PgStore::new(pool))
        }
        StoreBackend::Memory => {
            info!("Using in-memory store with demo data");
            info!("  admin operator id: {}", DEMO_ADMIN_ID);
            info!("  user operator id:  {}", DEMO_USER_ID);
            Arc::new(MemoryStore::with_demo_data())
        }
    };

    // 对象存储
    let storage: Arc<dyn ObjectStorage> = match config.storage.backend {
        StorageBackend::Supabase => {
            info!("Using Supabase storage at {}", config.storage.url);
            Arc::new(SupabaseStorage::new(&config.storage.url, &config.storage.service_key)?)
        }
        StorageBackend::Memory => {
            info!("Using in-memory object storage");
            Arc::new(MemoryStorage::new())
        }
    };

    let app = router(AppState::new(store, storage, &config));

    // 启动服务器
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server listening on {}", addr);
    info!("API Endpoints:");
    info!("  POST /api/template           - upload output template");
    info!("  POST /api/uploads/sales      - submit sales file");
    info!("  PUT  /api/uploads/agents     - map DS Names to SURVEYOR");
    info!("  POST /api/uploads/complete   - generate output file");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
