//! 통합 테스트 공용 도구.
//!
//! 실제 네트워크 없이 세션을 구동하는 인메모리 커넥터와 mockito
//! 기반 토큰 엔드포인트 헬퍼를 제공합니다.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use feed_client::transport::{Connector, FrameReceiver, FrameSender};
use feed_client::{FeedConfig, FeedResult};

/// 인메모리 서버가 관찰한 내용.
#[derive(Default)]
pub struct ServerLog {
    /// 세션별 접속 URL (접속 순서대로)
    pub connect_urls: Vec<String>,
    /// (세션 번호, 수신 프레임) 쌍
    pub frames: Vec<(usize, Value)>,
    sessions: Vec<mpsc::UnboundedSender<Result<Message, String>>>,
}

impl ServerLog {
    /// 지정한 타입의 수신 프레임만 반환합니다.
    pub fn frames_of_type(&self, frame_type: &str) -> Vec<&Value> {
        self.frames
            .iter()
            .map(|(_, frame)| frame)
            .filter(|frame| frame["type"] == frame_type)
            .collect()
    }

    /// 특정 세션에서 받은 지정 타입 프레임의 토픽 목록을 반환합니다.
    pub fn topics_of(&self, session: usize, frame_type: &str) -> Vec<String> {
        self.frames
            .iter()
            .filter(|(s, frame)| *s == session && frame["type"] == frame_type)
            .filter_map(|(_, frame)| frame["topic"].as_str().map(str::to_string))
            .collect()
    }

    /// 세션 수를 반환합니다.
    pub fn session_count(&self) -> usize {
        self.connect_urls.len()
    }

    /// 특정 세션을 서버 쪽에서 닫습니다.
    pub fn close_session(&self, session: usize) {
        if let Some(tx) = self.sessions.get(session) {
            let _ = tx.send(Ok(Message::Close(None)));
        }
    }

    /// 모든 세션을 서버 쪽에서 닫습니다.
    pub fn close_all(&self) {
        for tx in &self.sessions {
            let _ = tx.send(Ok(Message::Close(None)));
        }
    }

    /// 특정 세션으로 텍스트 프레임을 주입합니다.
    pub fn inject(&self, session: usize, text: &str) {
        if let Some(tx) = self.sessions.get(session) {
            let _ = tx.send(Ok(Message::Text(text.to_string())));
        }
    }
}

/// 채널 쌍으로 동작하는 인메모리 커넥터.
///
/// 접속 URL에서 connect id를 파싱해 welcome 프레임을 돌려주고,
/// 클라이언트가 보낸 프레임을 모두 기록합니다.
pub struct MemoryConnector {
    log: Arc<Mutex<ServerLog>>,
    send_welcome: bool,
}

impl MemoryConnector {
    /// 정상 핸드셰이크를 수행하는 커넥터를 생성합니다.
    pub fn new() -> (Arc<Self>, Arc<Mutex<ServerLog>>) {
        let log = Arc::new(Mutex::new(ServerLog::default()));
        (
            Arc::new(Self {
                log: log.clone(),
                send_welcome: true,
            }),
            log,
        )
    }

    /// welcome을 절대 보내지 않는 커넥터를 생성합니다 (핸드셰이크 타임아웃 테스트용).
    pub fn silent() -> (Arc<Self>, Arc<Mutex<ServerLog>>) {
        let log = Arc::new(Mutex::new(ServerLog::default()));
        (
            Arc::new(Self {
                log: log.clone(),
                send_welcome: false,
            }),
            log,
        )
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, url: &str) -> FeedResult<(FrameSender, FrameReceiver)> {
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();

        let session = {
            let mut log = self.log.lock().unwrap();
            log.connect_urls.push(url.to_string());
            log.sessions.push(in_tx.clone());
            log.connect_urls.len() - 1
        };

        if self.send_welcome {
            let connect_id = url.split("connectId=").nth(1).unwrap_or("");
            let welcome = format!(r#"{{"id":"{}","type":"welcome"}}"#, connect_id);
            let _ = in_tx.send(Ok(Message::Text(welcome)));
        }

        let log = self.log.clone();
        tokio::spawn(async move {
            while let Some(message) = out_rx.recv().await {
                if let Message::Text(text) = message {
                    if let Ok(frame) = serde_json::from_str::<Value>(&text) {
                        log.lock().unwrap().frames.push((session, frame));
                    }
                }
            }
            // 클라이언트가 송신 측을 닫으면 수신 측도 닫힘
            drop(in_tx);
        });

        Ok((out_tx, in_rx))
    }
}

/// mockito 토큰 서버와 테스트용 설정 한 벌.
pub struct TestEnv {
    pub config: FeedConfig,
    _server: mockito::ServerGuard,
    _mock: mockito::Mock,
}

/// 토큰 엔드포인트 mock을 띄우고 짧은 타이머를 쓰는 설정을 만듭니다.
pub async fn token_env() -> TestEnv {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/bullet")
        .with_status(200)
        .with_body(
            r#"{"code":"200000","data":{"token":"test-token","instanceServers":[{"endpoint":"wss://memory.test/ws","pingInterval":60000,"pingTimeout":10000,"protocol":"websocket"}]}}"#,
        )
        .create_async()
        .await;

    let mut config = FeedConfig::new(format!("{}/bullet", server.url()));
    config.command_interval = Duration::from_millis(1);
    config.reconnect_delay = Duration::from_millis(50);
    config.connect_timeout = Duration::from_secs(2);

    TestEnv {
        config,
        _server: server,
        _mock: mock,
    }
}

/// 조건이 참이 될 때까지 폴링합니다. 2초 안에 안 되면 실패합니다.
pub async fn wait_until<F, Fut>(what: &str, mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if condition().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {}", what);
}
