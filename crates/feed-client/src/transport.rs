//! WebSocket 전송 계층.
//!
//! `Connector`는 URL을 받아 송신/수신 채널 쌍을 돌려주는 경계입니다.
//! 실제 연결은 `WsConnector`가 tokio-tungstenite로 수행하고, 테스트는
//! 인메모리 구현을 주입해 네트워크 없이 세션을 구동합니다.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::error::{FeedError, FeedResult};

/// 소켓으로 보내는 프레임 송신자.
pub type FrameSender = mpsc::UnboundedSender<Message>;

/// 소켓에서 받은 프레임 수신자. 에러는 문자열로 평탄화됩니다.
pub type FrameReceiver = mpsc::UnboundedReceiver<Result<Message, String>>;

/// WebSocket 연결 수립 경계.
#[async_trait]
pub trait Connector: Send + Sync {
    /// 주어진 URL로 연결을 수립하고 프레임 채널 쌍을 반환합니다.
    async fn connect(&self, url: &str) -> FeedResult<(FrameSender, FrameReceiver)>;
}

/// tokio-tungstenite 기반 기본 커넥터.
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> FeedResult<(FrameSender, FrameReceiver)> {
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| FeedError::WebSocket(format!("Failed to connect: {}", e)))?;

        debug!("WebSocket connection established");

        let (mut write, mut read) = ws_stream.split();

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<Result<Message, String>>();

        // 송신 펌프: 채널이 닫히면 소켓도 닫음
        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                if let Err(e) = write.send(msg).await {
                    warn!("Failed to send WebSocket frame: {}", e);
                    break;
                }
            }
            let _ = write.close().await;
        });

        // 수신 펌프: 스트림 종료 시 채널 drop으로 전파
        tokio::spawn(async move {
            while let Some(result) = read.next().await {
                let forwarded = result.map_err(|e| e.to_string());
                if in_tx.send(forwarded).is_err() {
                    break;
                }
            }
        });

        Ok((out_tx, in_rx))
    }
}
