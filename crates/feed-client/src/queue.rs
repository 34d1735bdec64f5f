//! 아웃바운드 커맨드 큐.
//!
//! 구독/해지/핑 커맨드는 세션당 하나의 FIFO 큐를 거쳐 소켓으로
//! 나갑니다. 워커는 커맨드마다 전역 단조 증가 id를 부여해 와이어
//! 프레임으로 직렬화하고, 전송 사이에 최소 간격을 둡니다. 소켓이
//! 끊긴 뒤 남은 커맨드는 조용히 버려집니다.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

use crate::transport::FrameSender;

/// 서버로 보낼 수 있는 커맨드.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// 토픽 구독 요청
    Subscribe {
        /// 와이어 토픽 (예: "/market/ticker:BTC-USDT")
        topic: String,
    },
    /// 토픽 구독 해지 요청
    Unsubscribe {
        /// 와이어 토픽
        topic: String,
    },
    /// keepalive 핑
    Ping,
}

/// 커맨드 큐 송신자.
pub type CommandSender = mpsc::UnboundedSender<Command>;

/// 구독/해지 와이어 프레임.
#[derive(Serialize)]
struct TopicFrame<'a> {
    id: u64,
    #[serde(rename = "type")]
    frame_type: &'static str,
    topic: &'a str,
    #[serde(rename = "privateChannel")]
    private_channel: bool,
    response: bool,
}

/// 핑 와이어 프레임.
#[derive(Serialize)]
struct PingFrame {
    id: u64,
    #[serde(rename = "type")]
    frame_type: &'static str,
}

/// 커맨드를 지정한 id로 와이어 프레임 JSON으로 직렬화합니다.
pub fn encode_command(command: &Command, id: u64) -> String {
    match command {
        Command::Subscribe { topic } => serde_json::to_string(&TopicFrame {
            id,
            frame_type: "subscribe",
            topic,
            private_channel: false,
            response: true,
        }),
        Command::Unsubscribe { topic } => serde_json::to_string(&TopicFrame {
            id,
            frame_type: "unsubscribe",
            topic,
            private_channel: false,
            response: true,
        }),
        Command::Ping => serde_json::to_string(&PingFrame {
            id,
            frame_type: "ping",
        }),
    }
    // 필드가 고정된 구조체 직렬화는 실패하지 않음
    .unwrap_or_default()
}

/// 세션용 큐 워커를 기동합니다.
///
/// 커맨드 채널이 닫히면 워커도 종료됩니다. 프레임 전송 실패는
/// 소켓이 이미 내려간 경우이므로 해당 커맨드만 버리고 계속합니다.
pub fn spawn_queue_worker(
    mut commands: mpsc::UnboundedReceiver<Command>,
    frames: FrameSender,
    id_counter: Arc<AtomicU64>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(command) = commands.recv().await {
            let id = id_counter.fetch_add(1, Ordering::SeqCst) + 1;
            let payload = encode_command(&command, id);

            if frames.send(Message::Text(payload)).is_err() {
                debug!("Socket closed, dropping queued command: {:?}", command);
                continue;
            }

            tokio::time::sleep(interval).await;
        }
        debug!("Command queue worker stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_encode_subscribe_frame() {
        let command = Command::Subscribe {
            topic: "/market/ticker:BTC-USDT".to_string(),
        };
        let frame: Value = serde_json::from_str(&encode_command(&command, 7)).unwrap();

        assert_eq!(frame["id"], 7);
        assert_eq!(frame["type"], "subscribe");
        assert_eq!(frame["topic"], "/market/ticker:BTC-USDT");
        assert_eq!(frame["privateChannel"], false);
        assert_eq!(frame["response"], true);
    }

    #[test]
    fn test_encode_unsubscribe_frame() {
        let command = Command::Unsubscribe {
            topic: "/market/candles:ETH-USDT_5min".to_string(),
        };
        let frame: Value = serde_json::from_str(&encode_command(&command, 8)).unwrap();

        assert_eq!(frame["type"], "unsubscribe");
        assert_eq!(frame["topic"], "/market/candles:ETH-USDT_5min");
    }

    #[test]
    fn test_encode_ping_frame() {
        let frame: Value = serde_json::from_str(&encode_command(&Command::Ping, 42)).unwrap();

        assert_eq!(frame["id"], 42);
        assert_eq!(frame["type"], "ping");
        assert!(frame.get("topic").is_none());
    }

    #[tokio::test]
    async fn test_worker_assigns_monotonic_ids() {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (frame_tx, mut frame_rx) = mpsc::unbounded_channel();
        let counter = Arc::new(AtomicU64::new(0));

        let worker = spawn_queue_worker(cmd_rx, frame_tx, counter, Duration::from_millis(1));

        cmd_tx.send(Command::Ping).unwrap();
        cmd_tx
            .send(Command::Subscribe {
                topic: "/market/ticker:BTC-USDT".to_string(),
            })
            .unwrap();
        drop(cmd_tx);

        let first: Value = match frame_rx.recv().await.unwrap() {
            Message::Text(text) => serde_json::from_str(&text).unwrap(),
            other => panic!("unexpected frame: {:?}", other),
        };
        let second: Value = match frame_rx.recv().await.unwrap() {
            Message::Text(text) => serde_json::from_str(&text).unwrap(),
            other => panic!("unexpected frame: {:?}", other),
        };

        assert_eq!(first["id"], 1);
        assert_eq!(second["id"], 2);
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn test_worker_drops_after_socket_close() {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let counter = Arc::new(AtomicU64::new(0));

        let worker = spawn_queue_worker(cmd_rx, frame_tx, counter.clone(), Duration::ZERO);

        // 소켓 쪽 수신자를 먼저 닫음
        drop(frame_rx);
        cmd_tx.send(Command::Ping).unwrap();
        drop(cmd_tx);

        // 워커는 에러 없이 종료하고 id는 소비됨
        worker.await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
