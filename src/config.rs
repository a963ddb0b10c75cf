use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::guide_source::DEFAULT_GUIDE_URL;
use crate::reconcile::DuplicatePolicy;

pub const APP_DIR_NAME: &str = "M3uTuner";
pub const CONFIG_FILENAME: &str = "config.json";

fn default_timeout_seconds() -> u64 {
    5
}

fn default_start_channel_number() -> u32 {
    1
}

fn default_guide_url() -> Option<String> {
    Some(DEFAULT_GUIDE_URL.to_string())
}

fn default_guide_timeout_seconds() -> u64 {
    10
}

fn default_concurrency() -> usize {
    16
}

/// 处理配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// 输入播放列表
    #[serde(default)]
    pub input_path: Option<PathBuf>,
    /// 单个频道检测超时（秒）
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// 输出文件；为空时覆盖输入文件
    #[serde(default)]
    pub output_path: Option<PathBuf>,
    /// 顺序编号起始值
    #[serde(default = "default_start_channel_number")]
    pub start_channel_number: u32,
    /// 覆盖输入文件时不再询问，直接删除失败频道并写回
    #[serde(default)]
    pub auto_delete_failed: bool,
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,
    /// EPG 地址或本地路径；null 表示不匹配 EPG
    #[serde(default = "default_guide_url")]
    pub guide_url: Option<String>,
    #[serde(default = "default_guide_timeout_seconds")]
    pub guide_timeout_seconds: u64,
    /// 同时进行的检测数
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// 自定义优先表（JSON），为空时使用内置西班牙频道表
    #[serde(default)]
    pub priority_table_path: Option<PathBuf>,
    /// 保留号码，不参与分配
    #[serde(default)]
    pub reserved_numbers: Vec<u32>,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            input_path: None,
            timeout_seconds: default_timeout_seconds(),
            output_path: None,
            start_channel_number: default_start_channel_number(),
            auto_delete_failed: false,
            duplicate_policy: DuplicatePolicy::default(),
            guide_url: default_guide_url(),
            guide_timeout_seconds: default_guide_timeout_seconds(),
            concurrency: default_concurrency(),
            priority_table_path: None,
            reserved_numbers: Vec::new(),
        }
    }
}

impl ProcessorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("无法获取配置目录"))?;
        let app_dir = config_dir.join(APP_DIR_NAME);
        std::fs::create_dir_all(&app_dir)?;
        Ok(app_dir.join(CONFIG_FILENAME))
    }

    /// 从默认位置加载
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// 文件不存在时返回默认配置；存在但无法解析时报错
    pub fn load_from(path: &Path) -> Result<Self> {
        tracing::debug!("尝试从以下路径加载配置: {:?}", path);

        if !path.exists() {
            tracing::debug!("配置文件不存在，使用默认配置");
            return Ok(Self::new());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("无法读取配置文件: {}", path.display()))?;
        let config: ProcessorConfig = serde_json::from_str(&content)
            .with_context(|| format!("配置文件格式不合法: {}", path.display()))?;

        tracing::info!("配置加载成功: {:?}", path);
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tracing::info!("保存配置到: {:?}", path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        // 原子替换：写临时文件 → 旧文件改名为 .bak → 临时文件改名为目标 → 删除 .bak
        let temp_path = path.with_extension("json.tmp");
        let backup_path = path.with_extension("json.bak");

        std::fs::write(&temp_path, &content).map_err(|e| {
            tracing::error!("写入临时文件失败: {}", e);
            e
        })?;

        if path.exists() {
            if backup_path.exists() {
                let _ = std::fs::remove_file(&backup_path);
            }
            std::fs::rename(path, &backup_path).map_err(|e| {
                tracing::error!("备份旧配置文件失败: {}", e);
                e
            })?;
        }

        match std::fs::rename(&temp_path, path) {
            Ok(_) => {
                let _ = std::fs::remove_file(&backup_path);
                tracing::info!("配置保存成功");
                Ok(())
            }
            Err(e) => {
                tracing::error!("重命名临时文件失败: {}", e);
                if backup_path.exists() {
                    if let Err(restore_err) = std::fs::rename(&backup_path, path) {
                        tracing::error!("恢复备份失败: {}", restore_err);
                    } else {
                        tracing::info!("已从备份恢复配置");
                    }
                }
                Err(e.into())
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.input_path.is_none() {
            anyhow::bail!("未指定输入播放列表");
        }
        if self.timeout_seconds == 0 {
            anyhow::bail!("检测超时必须为正整数");
        }
        if self.guide_timeout_seconds == 0 {
            anyhow::bail!("EPG 下载超时必须为正整数");
        }
        if self.concurrency == 0 {
            anyhow::bail!("并发数必须为正整数");
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn guide_timeout(&self) -> Duration {
        Duration::from_secs(self.guide_timeout_seconds)
    }

    /// 实际写入的目标文件
    pub fn target_path(&self) -> Option<&Path> {
        self.output_path.as_deref().or(self.input_path.as_deref())
    }

    /// 是否覆盖输入文件
    pub fn overwrites_input(&self) -> bool {
        self.output_path.is_none()
    }
}

/// 输出文件名规范化：空名表示覆盖输入；缺少 .m3u/.m3u8 扩展名时追加 .m3u
pub fn normalize_output_path(path: &Path) -> Option<PathBuf> {
    let raw = path.to_string_lossy();
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let lower = trimmed.to_lowercase();
    if lower.ends_with(".m3u") || lower.ends_with(".m3u8") {
        Some(PathBuf::from(trimmed))
    } else {
        Some(PathBuf::from(format!("{}.m3u", trimmed)))
    }
}
