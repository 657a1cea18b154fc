//! 发布/订阅网关。
//!
//! 客户端连接后发送 `SUB <topic>`，之后该话题的每条消息都会被推送过来，
//! 不需要回复。写入失败的订阅者会被移除。

use std::sync::Arc;

use dashmap::DashMap;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::{VERSION, error::Result};

/// 当前的一句歌词
pub const TOPIC_LIVE_LYRIC: &str = "topic.live_lyric";
/// 播放状态
pub const TOPIC_PLAYER_STATE: &str = "topic.player.state";
/// 当前歌曲
pub const TOPIC_PLAYER_SONG: &str = "topic.player.song";

type Subscriber = (Uuid, mpsc::UnboundedSender<String>);

/// 话题与订阅者的注册表。
#[derive(Debug, Default)]
pub struct Gateway {
    topics: DashMap<String, Vec<Subscriber>>,
}

impl Gateway {
    /// 创建一个带有内置话题的网关。
    pub fn new() -> Self {
        let gateway = Self::default();
        for topic in [TOPIC_LIVE_LYRIC, TOPIC_PLAYER_STATE, TOPIC_PLAYER_SONG] {
            gateway.register_topic(topic);
        }
        gateway
    }

    /// 注册一个话题，已存在时什么也不做。
    pub fn register_topic(&self, topic: &str) {
        self.topics.entry(topic.to_string()).or_default();
    }

    /// 话题是否已注册。
    pub fn has_topic(&self, topic: &str) -> bool {
        self.topics.contains_key(topic)
    }

    /// 订阅一个已注册的话题。
    pub fn subscribe(&self, topic: &str) -> Option<(Uuid, mpsc::UnboundedReceiver<String>)> {
        let mut subscribers = self.topics.get_mut(topic)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        subscribers.push((id, tx));
        debug!("订阅者 {id} 订阅了 {topic}");
        Some((id, rx))
    }

    /// 取消订阅。
    pub fn unsubscribe(&self, topic: &str, id: Uuid) {
        if let Some(mut subscribers) = self.topics.get_mut(topic) {
            subscribers.retain(|(sid, _)| *sid != id);
        }
    }

    /// 话题当前的订阅者数量。
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.get(topic).map_or(0, |s| s.len())
    }

    ///
    /// 向话题的所有订阅者发布一条消息。
    ///
    /// 遍历的是订阅者的快照，已断开的订阅者会在之后被移除。
    ///
    /// # 返回
    /// 成功投递的订阅者数量。
    ///
    pub fn publish(&self, topic: &str, message: &str) -> usize {
        let snapshot: Vec<Subscriber> = match self.topics.get(topic) {
            Some(subscribers) => subscribers.clone(),
            None => return 0,
        };
        let mut message = message.to_string();
        if !message.ends_with('\n') {
            message.push('\n');
        }

        let mut dead = Vec::new();
        for (id, tx) in &snapshot {
            if tx.send(message.clone()).is_err() {
                dead.push(*id);
            }
        }
        if !dead.is_empty()
            && let Some(mut subscribers) = self.topics.get_mut(topic)
        {
            subscribers.retain(|(id, _)| !dead.contains(id));
        }
        trace!("话题 {topic} 投递给 {} 个订阅者", snapshot.len() - dead.len());
        snapshot.len() - dead.len()
    }
}

/// 接受订阅连接直到监听器出错。
pub async fn serve(listener: TcpListener, gateway: Arc<Gateway>) {
    if let Ok(addr) = listener.local_addr() {
        info!("订阅服务器监听于 {addr}");
    }
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                debug!("订阅连接: {peer}");
                let gateway = Arc::clone(&gateway);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, gateway).await {
                        debug!("订阅连接 {peer} 异常断开: {e}");
                    }
                });
            }
            Err(e) => warn!("接受订阅连接失败: {e}"),
        }
    }
}

async fn handle_connection(stream: TcpStream, gateway: Arc<Gateway>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    writer
        .write_all(format!("OK pubsub {VERSION}\n").as_bytes())
        .await?;

    let Some(line) = lines.next_line().await? else {
        return Ok(());
    };
    let line = line.trim();
    let Some(topic) = line.strip_prefix("SUB ").map(str::trim) else {
        writer
            .write_all(format!("Oops unknown command {line}\n").as_bytes())
            .await?;
        return Ok(());
    };
    let Some((id, mut rx)) = gateway.subscribe(topic) else {
        writer
            .write_all(format!("Oops unknown topic {topic}\n").as_bytes())
            .await?;
        return Ok(());
    };
    let topic = topic.to_string();

    let result: Result<()> = async {
        loop {
            tokio::select! {
                message = rx.recv() => {
                    let Some(message) = message else { break };
                    writer.write_all(message.as_bytes()).await?;
                }
                line = lines.next_line() => {
                    // 推送不需要回复，客户端的输入只用于检测断开
                    if line?.is_none() {
                        break;
                    }
                }
            }
        }
        Ok(())
    }
    .await;

    gateway.unsubscribe(&topic, id);
    debug!("订阅者 {id} 离开了 {topic}");
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_removes_closed_subscribers() {
        let gateway = Gateway::new();
        let (_, mut alive) = gateway.subscribe(TOPIC_PLAYER_STATE).unwrap();
        let (_, closed) = gateway.subscribe(TOPIC_PLAYER_STATE).unwrap();
        drop(closed);

        assert_eq!(gateway.publish(TOPIC_PLAYER_STATE, "playing"), 1);
        assert_eq!(gateway.subscriber_count(TOPIC_PLAYER_STATE), 1);
        assert_eq!(alive.try_recv().unwrap(), "playing\n");
    }

    #[test]
    fn test_unknown_topic() {
        let gateway = Gateway::new();
        assert!(gateway.subscribe("topic.nope").is_none());
        assert_eq!(gateway.publish("topic.nope", "x"), 0);

        gateway.register_topic("topic.nope");
        let (id, _rx) = gateway.subscribe("topic.nope").unwrap();
        gateway.unsubscribe("topic.nope", id);
        assert_eq!(gateway.subscriber_count("topic.nope"), 0);
    }
}
