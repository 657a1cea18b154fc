mod common;

use std::time::Duration;

use common::{Client, MemoryProvider, start};
use feeluown_rs::{
    player::backend::BackendEvent,
    server::pubsub::{TOPIC_LIVE_LYRIC, TOPIC_PLAYER_SONG, TOPIC_PLAYER_STATE},
};

async fn wait_for_subscriber(gateway: &feeluown_rs::server::Gateway, topic: &str) {
    for _ in 0..100 {
        if gateway.subscriber_count(topic) > 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("没有等到 {topic} 的订阅者");
}

#[tokio::test]
async fn test_unknown_topic_is_rejected() {
    let h = start(MemoryProvider::new(&[]), false).await;
    let (mut client, greeting) = Client::connect(h.running.pubsub_addr).await;
    assert_eq!(greeting, format!("OK pubsub {}", feeluown_rs::VERSION));

    client.send("SUB topic.nope").await;
    assert_eq!(
        client.read_line().await.as_deref(),
        Some("Oops unknown topic topic.nope")
    );
    assert_eq!(client.read_line().await, None);
}

#[tokio::test]
async fn test_state_and_song_are_pushed() {
    let h = start(MemoryProvider::new(&[("晴天", "周杰伦")]), false).await;

    let (mut state_sub, _) = Client::connect(h.running.pubsub_addr).await;
    state_sub.send(&format!("SUB {TOPIC_PLAYER_STATE}")).await;
    let (mut song_sub, _) = Client::connect(h.running.pubsub_addr).await;
    song_sub.send(&format!("SUB {TOPIC_PLAYER_SONG}")).await;
    wait_for_subscriber(&h.app.gateway, TOPIC_PLAYER_STATE).await;
    wait_for_subscriber(&h.app.gateway, TOPIC_PLAYER_SONG).await;

    let (mut rpc, _) = Client::connect(h.running.rpc_addr).await;
    rpc.request("play fuo://mem/songs/1").await;
    rpc.request("pause").await;

    assert_eq!(state_sub.read_line().await.as_deref(), Some("playing"));
    assert_eq!(state_sub.read_line().await.as_deref(), Some("paused"));

    let song_line = song_sub.read_line().await.unwrap();
    assert!(song_line.starts_with("fuo://mem/songs/1"), "{song_line}");
}

#[tokio::test]
async fn test_live_lyric_follows_position() {
    let provider = MemoryProvider::new(&[("晴天", "周杰伦")])
        .with_lyric("1", "[00:01.00]故事的小黄花\n[00:05.00]从出生那年就飘着");
    let h = start(provider, false).await;

    let (mut lyric_sub, _) = Client::connect(h.running.pubsub_addr).await;
    lyric_sub.send(&format!("SUB {TOPIC_LIVE_LYRIC}")).await;
    wait_for_subscriber(&h.app.gateway, TOPIC_LIVE_LYRIC).await;

    let (mut rpc, _) = Client::connect(h.running.rpc_addr).await;
    rpc.request("play fuo://mem/songs/1").await;

    // 歌词在后台加载，在它就绪之前进度不会产生推送
    let mut first = None;
    for _ in 0..50 {
        h.backend.inject(BackendEvent::Position(1.5));
        if let Ok(Ok(Some(line))) =
            tokio::time::timeout(Duration::from_millis(40), lyric_sub.lines.next_line()).await
        {
            first = Some(line);
            break;
        }
    }
    assert_eq!(first.as_deref(), Some("故事的小黄花"));

    h.backend.inject(BackendEvent::Position(2.0));
    h.backend.inject(BackendEvent::Position(6.0));
    assert_eq!(lyric_sub.read_line().await.as_deref(), Some("从出生那年就飘着"));
}

#[tokio::test]
async fn test_disconnected_subscriber_is_removed() {
    let h = start(MemoryProvider::new(&[]), false).await;
    let (mut client, _) = Client::connect(h.running.pubsub_addr).await;
    client.send(&format!("SUB {TOPIC_PLAYER_STATE}")).await;
    wait_for_subscriber(&h.app.gateway, TOPIC_PLAYER_STATE).await;

    drop(client);
    for _ in 0..100 {
        if h.app.gateway.subscriber_count(TOPIC_PLAYER_STATE) == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("断开的订阅者没有被移除");
}
