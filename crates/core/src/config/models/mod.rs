pub mod api_observability;
pub mod app_config;
pub mod storage_executor;

pub use api_observability::{ApiConfig, AuthConfig, ObservabilityConfig};
pub use app_config::AppConfig;
pub use storage_executor::{ExecutorConfig, StorageConfig};
