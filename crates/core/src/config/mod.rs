//! 配置管理
//!
//! 配置来源按优先级从低到高：内置默认值、TOML 配置文件、`SCRIPTD_` 前缀的环境变量。

pub mod models;

pub use models::*;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.executor.default_timeout_ms, 30_000);
        assert_eq!(config.storage.scripts_dir, "data/scripts");
        assert!(!config.api.auth.enabled);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [executor]
            interpreter = "bash"

            [api]
            bind_address = "127.0.0.1:9000"
            "#,
        )
        .unwrap();

        assert_eq!(config.executor.interpreter, "bash");
        assert_eq!(config.executor.default_timeout_ms, 30_000);
        assert_eq!(config.api.bind_address, "127.0.0.1:9000");
        assert!(config.api.cors_enabled);
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = AppConfig::default();
        let text = config.to_toml().unwrap();
        assert_eq!(AppConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn test_validation_failures() {
        let mut config = AppConfig::default();
        config.executor.default_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.api.auth.enabled = true;
        assert!(config.validate().is_err());
        config.api.auth.username = "admin".to_string();
        config.api.auth.password = "secret".to_string();
        assert!(config.validate().is_ok());

        let mut config = AppConfig::default();
        config.observability.log_format = "xml".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.api.bind_address = "8080".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[storage]\nscripts_dir = \"/tmp/scriptd-test\"\n[observability]\nlog_format = \"json\""
        )
        .unwrap();

        let config = AppConfig::load(file.path().to_str()).unwrap();
        assert_eq!(config.storage.scripts_dir, "/tmp/scriptd-test");
        assert_eq!(config.observability.log_format, "json");
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(AppConfig::load(Some("/nonexistent/scriptd.toml")).is_err());
    }
}
