//! 控制协议的 TCP 服务器。
//!
//! 每个连接在一个独立的任务中按行读取请求，带 heredoc 的请求会继续读取
//! 到结束标记为止。客户端断开时正在执行的命令不会被取消，只是响应被丢弃。

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use super::handlers::Dispatcher;
use crate::{
    VERSION,
    error::Result,
    protocol::{frame, parse},
};

/// 接受连接直到监听器出错。
pub async fn serve(listener: TcpListener, dispatcher: Arc<Dispatcher>) {
    if let Ok(addr) = listener.local_addr() {
        info!("控制服务器监听于 {addr}");
    }
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                debug!("控制连接: {peer}");
                let dispatcher = Arc::clone(&dispatcher);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, dispatcher).await {
                        debug!("控制连接 {peer} 异常断开: {e}");
                    }
                    debug!("控制连接断开: {peer}");
                });
            }
            Err(e) => warn!("接受控制连接失败: {e}"),
        }
    }
}

async fn handle_connection(stream: TcpStream, dispatcher: Arc<Dispatcher>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    writer
        .write_all(format!("OK fuo {VERSION}\n").as_bytes())
        .await?;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }

        let mut request = match parse(line) {
            Ok(request) => request,
            Err(e) => {
                debug!("无法解析请求 '{line}': {e}");
                writer
                    .write_all(frame("", &e.to_string(), false).as_bytes())
                    .await?;
                continue;
            }
        };

        if request.cmd == "quit" {
            writer.write_all(frame("quit", "", true).as_bytes()).await?;
            break;
        }

        if let Some(word) = request.heredoc_word.clone() {
            let mut body = Vec::new();
            loop {
                match lines.next_line().await? {
                    Some(l) if l.trim_end_matches('\r') == word => break,
                    Some(l) => body.push(l.trim_end_matches('\r').to_string()),
                    None => return Ok(()),
                }
            }
            request.set_heredoc_body(body.join("\n"));
        }

        let response = dispatcher.respond(&request).await;
        if let Err(e) = writer.write_all(response.as_bytes()).await {
            debug!("客户端已断开，丢弃 '{}' 的响应: {e}", request.cmd);
            break;
        }
    }
    Ok(())
}
