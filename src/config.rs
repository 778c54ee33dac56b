//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `MEGAVERSE__*` 覆盖（双下划线表示嵌套，如 `MEGAVERSE__API__CANDIDATE_ID=...`）。
//! 配置值在构造时显式传给重试处理器与编排器，没有进程级全局默认。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::core::RetryPolicy;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiSection,
    #[serde(default)]
    pub retry: RetrySection,
    #[serde(default)]
    pub pacing: PacingSection,
    #[serde(default)]
    pub logging: LoggingSection,
    #[serde(default)]
    pub pattern: PatternSection,
}

/// [api] 段：服务地址、候选人 ID、请求超时
#[derive(Debug, Clone, Deserialize)]
pub struct ApiSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// 为空时退回 Mock 后端
    #[serde(default)]
    pub candidate_id: String,
    /// 单次 HTTP 请求超时（秒）
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://challenge.crossmint.io/api".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            candidate_id: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ApiSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// [retry] 段：指数退避参数
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySection {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    2000
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl From<&RetrySection> for RetryPolicy {
    fn from(section: &RetrySection) -> Self {
        RetryPolicy::new(section.max_retries, Duration::from_millis(section.base_delay_ms))
    }
}

/// [pacing] 段：两次变更之间的固定间隔（限流）
#[derive(Debug, Clone, Deserialize)]
pub struct PacingSection {
    #[serde(default = "default_operation_delay_ms")]
    pub operation_delay_ms: u64,
}

fn default_operation_delay_ms() -> u64 {
    1000
}

impl Default for PacingSection {
    fn default() -> Self {
        Self {
            operation_delay_ms: default_operation_delay_ms(),
        }
    }
}

impl PacingSection {
    pub fn operation_delay(&self) -> Duration {
        Duration::from_millis(self.operation_delay_ms)
    }
}

/// [logging] 段：默认日志级别（RUST_LOG 优先）
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

/// [pattern] 段：第一阶段 X 形的默认边长
#[derive(Debug, Clone, Deserialize)]
pub struct PatternSection {
    #[serde(default = "default_size")]
    pub default_size: usize,
}

fn default_size() -> usize {
    11
}

impl Default for PatternSection {
    fn default() -> Self {
        Self {
            default_size: default_size(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 MEGAVERSE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 MEGAVERSE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    for name in ["config/default", "../config/default"] {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        } else {
            tracing::warn!(path = %path.display(), "config file not found, ignored");
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("MEGAVERSE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
