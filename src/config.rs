//! 负责处理应用的持久化配置。

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::{error::Result, playlist::PlaybackMode};

/// 默认的控制协议端口。
pub const DEFAULT_RPC_PORT: u16 = 23333;
/// 默认的发布/订阅端口。
pub const DEFAULT_PUBSUB_PORT: u16 = 23334;

const CONFIG_FILENAME: &str = "config.json";

/// 播放器守护进程的配置项。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// 控制协议监听的端口。
    pub rpc_port: u16,
    /// 发布/订阅网关监听的端口。
    pub pubsub_port: u16,
    /// 为 `true` 时监听所有网卡，否则只监听 `127.0.0.1`。
    pub allow_lan_connect: bool,
    /// 是否允许使用 `exec` 命令。
    pub enable_exec_command: bool,
    /// 音频的音质排序策略，例如 `hq<>`。
    pub audio_select_policy: String,
    /// 视频的画质排序策略，例如 `hd<>`。
    pub video_select_policy: String,
    /// 启动时的播放模式。
    pub playback_mode: PlaybackMode,
    /// 寻找备用歌曲时最多返回的数量。
    pub standby_limit: usize,
    /// 并发搜索的总超时（毫秒），为 0 表示不限制。
    pub search_timeout_ms: u64,
    /// 本地音乐目录。
    pub local_music_dirs: Vec<PathBuf>,
    /// 存放 `.fuo` 收藏文件的目录，`None` 时不加载收藏。
    pub collections_dir: Option<PathBuf>,
    /// 启动时的音量。
    pub default_volume: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_port: DEFAULT_RPC_PORT,
            pubsub_port: DEFAULT_PUBSUB_PORT,
            allow_lan_connect: false,
            enable_exec_command: false,
            audio_select_policy: "hq<>".to_string(),
            video_select_policy: "hd<>".to_string(),
            playback_mode: PlaybackMode::Loop,
            standby_limit: 2,
            search_timeout_ms: 5000,
            local_music_dirs: Vec::new(),
            collections_dir: None,
            default_volume: 100,
        }
    }
}

impl Config {
    /// 返回服务应当绑定的地址。
    pub fn bind_host(&self) -> &'static str {
        if self.allow_lan_connect {
            "0.0.0.0"
        } else {
            "127.0.0.1"
        }
    }

    /// 并发搜索的超时，`None` 表示不限制。
    pub fn search_timeout(&self) -> Option<std::time::Duration> {
        (self.search_timeout_ms > 0).then(|| std::time::Duration::from_millis(self.search_timeout_ms))
    }

    /// 从指定文件加载配置。文件不存在时返回默认配置并写回磁盘。
    pub fn load_from(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => {
                let config: Config = serde_json::from_str(&content)?;
                info!("已从 {} 加载配置。", path.display());
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("配置文件 {} 不存在，将使用默认配置。", path.display());
                let config = Config::default();
                if let Err(e) = config.save_to(path) {
                    warn!("无法写入默认配置: {e}");
                }
                Ok(config)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// 从默认位置加载配置。
    pub fn load() -> Result<Self> {
        let path = get_config_file_path(CONFIG_FILENAME)?;
        Self::load_from(&path)
    }

    /// 将配置序列化为 JSON 并保存到文件。
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        info!("配置已保存到 {}。", path.display());
        Ok(())
    }
}

/// 获取应用配置目录下指定文件的完整路径。
///
/// # 参数
/// * `filename` - 目标配置文件的名称，例如 "config.json"。
pub fn get_config_file_path(filename: &str) -> std::result::Result<PathBuf, std::io::Error> {
    if let Some(mut config_dir) = dirs::config_dir() {
        config_dir.push("feeluown-rs");
        fs::create_dir_all(&config_dir)?;
        config_dir.push(filename);
        Ok(config_dir)
    } else {
        Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "无法找到用户配置目录",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"rpc_port": 4000, "allow_lan_connect": true}"#).unwrap();
        assert_eq!(config.rpc_port, 4000);
        assert_eq!(config.pubsub_port, DEFAULT_PUBSUB_PORT);
        assert_eq!(config.audio_select_policy, "hq<>");
        assert_eq!(config.collections_dir, None);
        assert_eq!(config.bind_host(), "0.0.0.0");
        assert_eq!(Config::default().bind_host(), "127.0.0.1");
    }

    #[test]
    fn test_load_writes_back_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists(), "默认配置应被写回磁盘");

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded, config);
    }
}
