#![warn(missing_docs)]

//! # FeelUOwn RS
//!
//! 一个聚合多个音乐平台的播放器核心，可以作为守护进程运行并通过文本协议远程控制。
//!
//! ## 主要功能
//!
//! - **曲库**: 把多个提供商聚合在一起，并发搜索，为无法播放的歌曲寻找其它平台上的备用歌曲。
//! - **播放列表**: 单曲循环、顺序、列表循环和随机四种模式，自动跳过无法播放的歌曲。
//! - **播放器**: 驱动一个可替换的媒体后端，跟踪进度、音量与当前歌词。
//! - **远程控制**: 行式的控制协议 (`play`、`status`、`search`、`show` 等)，以及推送播放器
//!   状态与实时歌词的订阅服务。
//!
//! ## 启动守护进程
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use feeluown_rs::{App, Config, player::backend::NullBackend, providers::local::LocalProvider};
//!
//! async {
//!     let config = Config::default();
//!     let (backend, events) = NullBackend::new();
//!     let app = App::new(config, backend);
//!
//!     let local = Arc::new(LocalProvider::new(vec!["/music".into()]));
//!     local.scan().await.unwrap();
//!     app.library.register(local).unwrap();
//!
//!     let running = app.serve(events).await.unwrap();
//!     println!("控制协议监听于 {}", running.rpc_addr);
//! };
//! ```
//!
//! ## 解析一条控制协议请求
//!
//! ```rust
//! use feeluown_rs::protocol::parse;
//!
//! let request = parse("search 周杰伦 [type=so,al] #: format=json").unwrap();
//! assert_eq!(request.cmd, "search");
//! assert_eq!(request.cmd_args.len(), 1);
//! ```
pub mod config;
pub mod error;
pub mod library;
pub mod media;
pub mod model;
pub mod player;
pub mod playlist;
pub mod protocol;
pub mod providers;
pub mod server;
pub mod signal;

#[cfg(test)]
pub(crate) mod test_utils;

pub use crate::{
    config::Config,
    error::{FuoError, Result},
    library::Library,
    player::Player,
    playlist::{PlaybackMode, Playlist},
    server::App,
};

/// 在协议欢迎语中报告的版本号。
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
