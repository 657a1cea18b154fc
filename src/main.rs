//! `fuod`: 播放器守护进程。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use feeluown_rs::{
    App, Config, PlaybackMode, player::backend::NullBackend, providers::local::LocalProvider,
};

/// 命令行参数，优先级高于配置文件。
#[derive(Parser, Debug)]
#[command(name = "fuod")]
#[command(about = "FeelUOwn 风格的播放器守护进程")]
#[command(version)]
struct Args {
    /// 配置文件路径，默认使用用户配置目录下的 config.json
    #[arg(short, long, env = "FUOD_CONFIG")]
    config: Option<PathBuf>,

    /// 控制协议端口
    #[arg(long, env = "FUOD_RPC_PORT")]
    rpc_port: Option<u16>,

    /// 订阅服务端口
    #[arg(long, env = "FUOD_PUBSUB_PORT")]
    pubsub_port: Option<u16>,

    /// 监听所有网卡
    #[arg(long)]
    allow_lan_connect: bool,

    /// 允许使用 exec 命令
    #[arg(long)]
    enable_exec: bool,

    /// 启动时的播放模式
    #[arg(long)]
    mode: Option<PlaybackMode>,

    /// 额外的本地音乐目录，可以多次指定
    #[arg(long = "music-dir")]
    music_dirs: Vec<PathBuf>,

    /// 存放 .fuo 收藏文件的目录
    #[arg(long)]
    collections_dir: Option<PathBuf>,

    /// 输出更多日志，-vv 输出全部日志
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// 只输出警告和错误
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Args {
    fn log_filter(&self) -> EnvFilter {
        let directive = match (self.quiet, self.verbose) {
            (true, _) => "warn",
            (false, 0) => {
                return EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info,feeluown_rs=info"));
            }
            (false, 1) => "info,feeluown_rs=debug,fuod=debug",
            (false, _) => "info,feeluown_rs=trace,fuod=trace",
        };
        EnvFilter::new(directive)
    }

    fn apply(&self, config: &mut Config) {
        if let Some(port) = self.rpc_port {
            config.rpc_port = port;
        }
        if let Some(port) = self.pubsub_port {
            config.pubsub_port = port;
        }
        if self.allow_lan_connect {
            config.allow_lan_connect = true;
        }
        if self.enable_exec {
            config.enable_exec_command = true;
        }
        if let Some(mode) = self.mode {
            config.playback_mode = mode;
        }
        config.local_music_dirs.extend(self.music_dirs.iter().cloned());
        if let Some(dir) = &self.collections_dir {
            config.collections_dir = Some(dir.clone());
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(args.log_filter())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("无法加载配置")?;
    args.apply(&mut config);

    let (backend, events) = NullBackend::new();
    let app = App::new(config, backend);

    if !app.config.local_music_dirs.is_empty() {
        let local = Arc::new(LocalProvider::new(app.config.local_music_dirs.clone()));
        match local.scan().await {
            Ok(count) => info!("本地提供商共有 {count} 首歌曲"),
            Err(e) => warn!("扫描本地音乐失败: {e}"),
        }
        app.library.register(local).context("无法注册本地提供商")?;
    }

    let running = app.serve(events).await.context("无法启动服务")?;
    info!(
        "fuod {} 已启动，控制端口 {}，订阅端口 {}",
        feeluown_rs::VERSION,
        running.rpc_addr.port(),
        running.pubsub_addr.port()
    );

    shutdown_signal().await;
    running.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("无法监听 Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("无法监听 SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("收到 Ctrl+C，正在退出"),
        _ = terminate => info!("收到终止信号，正在退出"),
    }
}
