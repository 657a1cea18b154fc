//! 应用的装配：创建曲库、播放列表和播放器，启动两个服务器，
//! 并把播放器的信号转发到发布/订阅网关。

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::{
    handlers::Dispatcher,
    pubsub::{self, Gateway, TOPIC_LIVE_LYRIC, TOPIC_PLAYER_SONG, TOPIC_PLAYER_STATE},
    rpc,
};
use crate::{
    config::Config,
    error::Result,
    library::Library,
    model::{BriefModel, uri},
    player::{
        Player,
        backend::{BackendEvent, MediaBackend},
    },
    playlist::Playlist,
};

/// 组装好的应用。
#[allow(missing_docs)]
pub struct App {
    pub config: Arc<Config>,
    pub library: Arc<Library>,
    pub playlist: Arc<Playlist>,
    pub player: Arc<Player>,
    pub gateway: Arc<Gateway>,
    pub dispatcher: Arc<Dispatcher>,
}

/// 正在运行的服务。被丢弃时所有后台任务都会被中止。
#[derive(Debug)]
pub struct Running {
    /// 控制服务器实际监听的地址
    pub rpc_addr: SocketAddr,
    /// 订阅服务器实际监听的地址
    pub pubsub_addr: SocketAddr,
    tasks: Vec<JoinHandle<()>>,
}

impl Running {
    /// 中止所有后台任务。
    pub fn shutdown(self) {
        info!("正在停止服务...");
        drop(self);
    }
}

impl Drop for Running {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl App {
    /// 按配置创建应用。提供商需要在之后注册到 `library` 上。
    pub fn new(config: Config, backend: Arc<dyn MediaBackend>) -> Self {
        let config = Arc::new(config);
        let library = Arc::new(Library::from_config(&config));
        let playlist = Arc::new(Playlist::from_config(Arc::clone(&library), &config));
        let player = Player::new(
            backend,
            Arc::clone(&playlist),
            Arc::clone(&library),
            i64::from(config.default_volume),
        );
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&library),
            Arc::clone(&player),
            Arc::clone(&config),
        ));
        Self {
            config,
            library,
            playlist,
            player,
            gateway: Arc::new(Gateway::new()),
            dispatcher,
        }
    }

    ///
    /// 绑定端口并启动所有后台任务。
    ///
    /// 端口为 0 时由系统分配，实际地址见返回的 [`Running`]。
    ///
    /// # 参数
    /// * `backend_events` - 媒体后端的事件流，驱动播放器的进度与切歌。
    ///
    pub async fn serve(&self, backend_events: UnboundedReceiver<BackendEvent>) -> Result<Running> {
        let host = self.config.bind_host();
        let rpc_listener = TcpListener::bind((host, self.config.rpc_port)).await?;
        let pubsub_listener = TcpListener::bind((host, self.config.pubsub_port)).await?;
        let rpc_addr = rpc_listener.local_addr()?;
        let pubsub_addr = pubsub_listener.local_addr()?;

        let mut tasks = vec![
            tokio::spawn(rpc::serve(rpc_listener, Arc::clone(&self.dispatcher))),
            tokio::spawn(pubsub::serve(pubsub_listener, Arc::clone(&self.gateway))),
            tokio::spawn(drive_player(Arc::clone(&self.player), backend_events)),
        ];
        tasks.extend(self.forward_signals());

        info!("服务已启动: 控制 {rpc_addr}，订阅 {pubsub_addr}");
        Ok(Running {
            rpc_addr,
            pubsub_addr,
            tasks,
        })
    }

    fn forward_signals(&self) -> Vec<JoinHandle<()>> {
        let mut tasks = Vec::new();

        let mut states = self.player.state_changed.connect_queued();
        let gateway = Arc::clone(&self.gateway);
        tasks.push(tokio::spawn(async move {
            while let Some(state) = states.recv().await {
                gateway.publish(TOPIC_PLAYER_STATE, &state.to_string());
            }
        }));

        let mut songs = self.playlist.song_changed.connect_queued();
        let gateway = Arc::clone(&self.gateway);
        let player = Arc::clone(&self.player);
        tasks.push(tokio::spawn(async move {
            while let Some(song) = songs.recv().await {
                let line = song
                    .as_ref()
                    .map(|s| uri::model_to_line(&BriefModel::Song(s.brief())))
                    .unwrap_or_default();
                gateway.publish(TOPIC_PLAYER_SONG, &line);
                if song.is_some() {
                    player.refresh_lyric().await;
                }
            }
        }));

        let mut positions = self.player.position_changed.connect_queued();
        let gateway = Arc::clone(&self.gateway);
        let player = Arc::clone(&self.player);
        tasks.push(tokio::spawn(async move {
            let mut last: Option<String> = None;
            while positions.recv().await.is_some() {
                let sentence = player.lyric_sentence();
                if sentence != last {
                    if let Some(text) = &sentence {
                        gateway.publish(TOPIC_LIVE_LYRIC, text);
                    }
                    last = sentence;
                }
            }
        }));

        tasks
    }
}

async fn drive_player(player: Arc<Player>, mut events: UnboundedReceiver<BackendEvent>) {
    while let Some(event) = events.recv().await {
        player.handle_backend_event(event).await;
    }
    debug!("媒体后端的事件流已关闭");
}
