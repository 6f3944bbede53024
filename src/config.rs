use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// 映射表 / 用户 / 上传历史的持久化后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// 进程内存 (演示模式, 启动时写入演示数据)
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: StoreBackend,
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Supabase,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Supabase 项目地址, 例如 https://xyz.supabase.co
    pub url: String,
    #[serde(skip_serializing)]
    pub service_key: String,
    pub template_bucket: String,
    pub output_bucket: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// 表头探测扫描的最大行数
    pub header_scan_rows: usize,
    /// 每个用户保留的最近上传记录数
    pub history_retention: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            header_scan_rows: 20,
            history_retention: 3,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                backend: StoreBackend::Memory,
                url: "postgres://localhost/sales_reconciler".to_string(),
                max_connections: 10,
            },
            storage: StorageConfig {
                backend: StorageBackend::Memory,
                url: String::new(),
                service_key: String::new(),
                template_bucket: "templates".to_string(),
                output_bucket: "output-files".to_string(),
            },
            pipeline: PipelineConfig::default(),
        }
    }
}

impl AppConfig {
    /// 加载配置: 默认值 < reconciler.toml < RECONCILER__* 环境变量 < 旧版环境变量
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Config::builder()
            .set_default("server.host", defaults.server.host)?
            .set_default("server.port", i64::from(defaults.server.port))?
            .set_default("database.backend", "memory")?
            .set_default("database.url", defaults.database.url)?
            .set_default("database.max_connections", i64::from(defaults.database.max_connections))?
            .set_default("storage.backend", "memory")?
            .set_default("storage.url", defaults.storage.url)?
            .set_default("storage.service_key", defaults.storage.service_key)?
            .set_default("storage.template_bucket", defaults.storage.template_bucket)?
            .set_default("storage.output_bucket", defaults.storage.output_bucket)?
            .set_default("pipeline.header_scan_rows", defaults.pipeline.header_scan_rows as i64)?
            .set_default("pipeline.history_retention", defaults.pipeline.history_retention as i64)?
            .add_source(File::with_name("reconciler").required(false))
            .add_source(Environment::with_prefix("RECONCILER").separator("__"))
            .set_override_option("server.host", std::env::var("SERVER_HOST").ok())?
            .set_override_option(
                "server.port",
                std::env::var("SERVER_PORT")
                    .ok()
                    .and_then(|p| p.parse::<i64>().ok()),
            )?
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_select_in_memory_backends() {
        let config = AppConfig::default();
        assert_eq!(config.database.backend, StoreBackend::Memory);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.pipeline.header_scan_rows, 20);
        assert_eq!(config.pipeline.history_retention, 3);
    }

    #[test]
    fn backend_names_are_lowercase() {
        let backend: StoreBackend = serde_json::from_str("\"postgres\"").unwrap();
        assert_eq!(backend, StoreBackend::Postgres);
        let storage: StorageBackend = serde_json::from_str("\"supabase\"").unwrap();
        assert_eq!(storage, StorageBackend::Supabase);
    }
}
