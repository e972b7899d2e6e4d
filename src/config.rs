use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    /// 每发射多少次迁移上报一次 `Progress`，0 表示不上报。
    ///
    /// 事件中的 `steps` 统计的是迁移发射次数而非出队展开的节点数，
    /// 一个有 k 条使能迁移的节点展开时计 k 步，死锁节点计 0 步。
    #[serde(default = "default_progress_interval")]
    pub progress_interval: usize,
    /// 单次运行最多记录的不同标识数，超出即按取消处理。
    #[serde(default)]
    pub state_limit: Option<usize>,
    #[serde(default = "default_heuristic")]
    pub best_first_heuristic: String,
    #[serde(default = "default_heuristic")]
    pub astar_heuristic: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            progress_interval: default_progress_interval(),
            state_limit: None,
            best_first_heuristic: default_heuristic(),
            astar_heuristic: default_heuristic(),
        }
    }
}

impl SearchConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: SearchConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        Ok(config)
    }
}

fn default_progress_interval() -> usize {
    100
}

fn default_heuristic() -> String {
    "Default".to_string()
}
