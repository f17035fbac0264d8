use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::validation::ConfigValidator;
use crate::{ConfigError, ConfigResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub services: ServicesConfig,
    pub dispatcher: DispatcherConfig,
    pub templates: TemplatesConfig,
    /// Filesystem root for worker artefacts. The orchestrator only carries
    /// this value; workers interpret it.
    pub output_dir: String,
    pub logging: LogConfig,
}

/// 共享 KV 存储连接配置。`memory://` 选择内嵌存储，用于测试与单机部署。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub url: String,
    pub connection_timeout_seconds: u64,
    pub max_retry_attempts: u32,
    pub retry_delay_seconds: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            connection_timeout_seconds: 30,
            max_retry_attempts: 3,
            retry_delay_seconds: 5,
        }
    }
}

/// 已注册的 worker 服务名。模板校验与队列键预声明都以此为准。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    pub names: Vec<String>,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            names: vec![
                "text-service".to_string(),
                "voice-service".to_string(),
                "image-service".to_string(),
                "video-service".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// claim 长轮询的默认超时。
    pub claim_timeout_seconds: u64,
    /// 失败级联开关。默认关闭：失败不向下游传播。
    pub cascade_fail: bool,
    /// 清道夫判定 `PROCESSING` 任务滞留的时间窗。
    pub processing_horizon_seconds: u64,
    /// 清道夫扫描间隔。
    pub recovery_interval_seconds: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            claim_timeout_seconds: 5,
            cascade_fail: false,
            processing_horizon_seconds: 3600,
            recovery_interval_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplatesConfig {
    /// 场景模板目录（*.yml / *.yaml）。空字符串表示仅用代码注册的模板。
    pub path: String,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            services: ServicesConfig::default(),
            dispatcher: DispatcherConfig::default(),
            templates: TemplatesConfig::default(),
            output_dir: "./output".to_string(),
            logging: LogConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from an optional TOML file plus environment
    /// overrides (`ORCHESTRATOR__*` for nested keys, and the flat
    /// `STORE_URL` / `OUTPUT_DIR` / `SERVICE_NAMES` variables).
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(ConfigError::File(format!("config file not found: {path}")));
            }
        } else {
            let default_paths = ["config/orchestrator.toml", "orchestrator.toml"];
            for path in &default_paths {
                if Path::new(path).exists() {
                    builder = builder.add_source(File::new(path, FileFormat::Toml));
                    break;
                }
            }
        }

        let defaults = AppConfig::default();
        builder = builder
            .set_default("store.url", defaults.store.url.clone())?
            .set_default(
                "store.connection_timeout_seconds",
                defaults.store.connection_timeout_seconds as i64,
            )?
            .set_default(
                "store.max_retry_attempts",
                defaults.store.max_retry_attempts as i64,
            )?
            .set_default(
                "store.retry_delay_seconds",
                defaults.store.retry_delay_seconds as i64,
            )?
            .set_default("services.names", defaults.services.names.clone())?
            .set_default(
                "dispatcher.claim_timeout_seconds",
                defaults.dispatcher.claim_timeout_seconds as i64,
            )?
            .set_default("dispatcher.cascade_fail", defaults.dispatcher.cascade_fail)?
            .set_default(
                "dispatcher.processing_horizon_seconds",
                defaults.dispatcher.processing_horizon_seconds as i64,
            )?
            .set_default(
                "dispatcher.recovery_interval_seconds",
                defaults.dispatcher.recovery_interval_seconds as i64,
            )?
            .set_default("templates.path", defaults.templates.path.clone())?
            .set_default("output_dir", defaults.output_dir.clone())?
            .set_default("logging.level", defaults.logging.level.clone())?
            .set_default("logging.format", defaults.logging.format.clone())?;

        builder = builder.add_source(
            Environment::with_prefix("ORCHESTRATOR")
                .separator("__")
                .try_parsing(true),
        );

        let mut app_config: AppConfig = builder.build()?.try_deserialize()?;
        app_config.apply_flat_env_overrides();
        app_config.validate()?;
        Ok(app_config)
    }

    /// 规范要求的三个扁平环境变量，优先级高于文件与前缀变量。
    fn apply_flat_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("STORE_URL") {
            if !url.is_empty() {
                self.store.url = url;
            }
        }
        if let Ok(dir) = std::env::var("OUTPUT_DIR") {
            if !dir.is_empty() {
                self.output_dir = dir;
            }
        }
        if let Ok(names) = std::env::var("SERVICE_NAMES") {
            let parsed: Vec<String> = names
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !parsed.is_empty() {
                self.services.names = parsed;
            }
        }
    }
}

impl ConfigValidator for AppConfig {
    fn validate(&self) -> ConfigResult<()> {
        self.store.validate()?;
        self.services.validate()?;
        self.dispatcher.validate()?;
        Ok(())
    }
}

impl ConfigValidator for StoreConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.url.is_empty() {
            return Err(ConfigError::Validation(
                "store.url must not be empty".to_string(),
            ));
        }
        if !self.url.starts_with("redis://")
            && !self.url.starts_with("rediss://")
            && !self.url.starts_with("memory://")
        {
            return Err(ConfigError::Validation(format!(
                "store.url must be redis://, rediss:// or memory:// (got {})",
                self.url
            )));
        }
        if self.max_retry_attempts == 0 {
            return Err(ConfigError::Validation(
                "store.max_retry_attempts must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl ConfigValidator for ServicesConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.names.is_empty() {
            return Err(ConfigError::Validation(
                "services.names must not be empty".to_string(),
            ));
        }
        for name in &self.names {
            if name.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "services.names contains an empty name".to_string(),
                ));
            }
        }
        Ok(())
    }
}

impl ConfigValidator for DispatcherConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.claim_timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "dispatcher.claim_timeout_seconds must be greater than 0".to_string(),
            ));
        }
        if self.processing_horizon_seconds == 0 {
            return Err(ConfigError::Validation(
                "dispatcher.processing_horizon_seconds must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
