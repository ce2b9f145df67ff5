use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;
use strata_crate_tools::resource::StrataPath;
use strata_render_graph::frame_graph::RgQueueConfig;

/// 默认配置文件名，位于工作区根目录
pub const DEFAULT_CONFIG_FILE: &str = "frame-graph.toml";

/// `frame-graph.toml` 的内容，所有字段都有默认值
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlanAppConfig {
    pub log: LogSection,
    /// 直接反序列化为编译器使用的队列配置
    pub queues: RgQueueConfig,
    pub frame: FrameSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// `error` / `warn` / `info` / `debug` / `trace` / `off`
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FrameSection {
    pub width: u32,
    pub height: u32,
    /// SSAO 是否请求异步 compute 队列
    pub async_compute: bool,
}

impl Default for FrameSection {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            async_compute: true,
        }
    }
}

impl PlanAppConfig {
    pub fn default_path() -> PathBuf {
        StrataPath::config_path(DEFAULT_CONFIG_FILE)
    }

    /// 从 TOML 文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content =
            fs::read_to_string(path.as_ref()).with_context(|| format!("读取配置文件失败: {:?}", path.as_ref()))?;
        Self::from_toml(&content).with_context(|| format!("解析 TOML 配置失败: {:?}", path.as_ref()))
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: PlanAppConfig = toml::from_str(content)?;
        anyhow::ensure!(config.frame.width > 0 && config.frame.height > 0, "帧尺寸不能为 0: {:?}", config.frame);
        anyhow::ensure!(config.queues.graphics_queues > 0, "至少需要一个 graphics 队列");
        Ok(config)
    }

    pub fn log_level(&self) -> anyhow::Result<log::LevelFilter> {
        self.log.level.parse::<log::LevelFilter>().with_context(|| format!("无效的日志级别: {}", self.log.level))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config() {
        let config = PlanAppConfig::from_toml(
            r#"
            [log]
            level = "debug"

            [queues]
            graphics_queues = 1
            compute_queues = 2
            transfer_queues = 1

            [frame]
            width = 1280
            height = 720
            async_compute = false
            "#,
        )
        .unwrap();

        assert_eq!(config.log_level().unwrap(), log::LevelFilter::Debug);
        assert_eq!(config.queues, RgQueueConfig::new(1, 2, 1));
        assert_eq!((config.frame.width, config.frame.height), (1280, 720));
        assert!(!config.frame.async_compute);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config = PlanAppConfig::from_toml("[queues]\ncompute_queues = 1\n").unwrap();

        assert_eq!(config.queues, RgQueueConfig::new(1, 1, 0));
        assert_eq!(config.log_level().unwrap(), log::LevelFilter::Info);
        assert!(config.frame.async_compute);
    }

    #[test]
    fn test_invalid_values() {
        assert!(PlanAppConfig::from_toml("[queues]\ngraphics_queues = 0\n").is_err());
        assert!(PlanAppConfig::from_toml("[frame]\nwidth = 0\n").is_err());

        let config = PlanAppConfig::from_toml("[log]\nlevel = \"loud\"\n").unwrap();
        assert!(config.log_level().is_err());
    }

    #[test]
    fn test_default_config_file_parses() {
        let config = PlanAppConfig::from_file(PlanAppConfig::default_path()).unwrap();
        assert!(config.queues.graphics_queues > 0);
    }
}
