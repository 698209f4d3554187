// 配置管理模块

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

use crate::uploader::DEFAULT_MULTIPART_THRESHOLD;

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploaderConfig {
    /// 后端配置
    #[serde(default)]
    pub backend: BackendConfig,
    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 后端配置
///
/// 上传子系统仅有的三个可调参数：后端地址、连接超时、分片上传阈值。
/// 配置在构造引擎时显式注入，不使用任何进程级全局状态。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// 后端基础 URL（预签名接口所在服务）
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// 连接超时（秒）
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// 简单上传/分片上传的文件大小阈值（字节，默认 80MB）
    #[serde(default = "default_multipart_threshold")]
    pub multipart_threshold_bytes: u64,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_multipart_threshold() -> u64 {
    DEFAULT_MULTIPART_THRESHOLD
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            connect_timeout_secs: default_connect_timeout_secs(),
            multipart_threshold_bytes: default_multipart_threshold(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 是否启用日志文件持久化
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,
    /// 日志文件保存目录
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// 日志保留天数（默认 7 天）
    #[serde(default = "default_log_retention_days")]
    pub retention_days: u32,
    /// 日志级别（默认 info）
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_enabled() -> bool {
    true
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_retention_days() -> u32 {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_log_enabled(),
            log_dir: default_log_dir(),
            retention_days: default_log_retention_days(),
            level: default_log_level(),
        }
    }
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl UploaderConfig {
    /// 从文件加载配置
    pub async fn load_from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;

        let config: UploaderConfig =
            toml::from_str(&content).context("Failed to parse config file")?;

        Ok(config)
    }

    /// 保存配置到文件
    pub async fn save_to_file(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        // 确保父目录存在
        if let Some(parent) = std::path::Path::new(path).parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }

        fs::write(path, content)
            .await
            .context("Failed to write config file")?;

        tracing::info!("配置已保存: {}", path);
        Ok(())
    }

    /// 加载或创建默认配置
    pub async fn load_or_default(path: &str) -> Self {
        match Self::load_from_file(path).await {
            Ok(config) => {
                tracing::info!("配置文件加载成功: {}", path);
                config
            }
            Err(e) => {
                tracing::warn!("配置文件加载失败，使用默认配置: {}", e);
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_backend_config() {
        let config = BackendConfig::default();
        assert_eq!(config.base_url, "http://127.0.0.1:8080");
        assert_eq!(config.connect_timeout_secs, 10);
        assert_eq!(config.multipart_threshold_bytes, 80 * 1024 * 1024);
    }

    #[test]
    fn test_default_log_config() {
        let config = LogConfig::default();
        assert!(config.enabled);
        assert_eq!(config.log_dir, PathBuf::from("logs"));
        assert_eq!(config.retention_days, 7);
        assert_eq!(config.level, "info");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: UploaderConfig = toml::from_str(
            r#"
            [backend]
            base_url = "https://api.example.com"
            "#,
        )
        .unwrap();

        assert_eq!(config.backend.base_url, "https://api.example.com");
        // 未指定的字段回落到默认值
        assert_eq!(config.backend.connect_timeout_secs, 10);
        assert_eq!(config.backend.multipart_threshold_bytes, 80 * 1024 * 1024);
        assert!(config.log.enabled);
    }

    #[test]
    fn test_roundtrip_serialization() {
        let config = UploaderConfig::default();
        let content = toml::to_string_pretty(&config).unwrap();
        let parsed: UploaderConfig = toml::from_str(&content).unwrap();
        assert_eq!(parsed.backend.base_url, config.backend.base_url);
        assert_eq!(
            parsed.backend.multipart_threshold_bytes,
            config.backend.multipart_threshold_bytes
        );
    }
}
