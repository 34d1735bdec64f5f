//! 단일 WebSocket 연결의 수명주기 관리.
//!
//! 연결 하나가 토큰 발급, 핸드셰이크, keepalive, 장애 감지, 구독
//! 재생까지 책임집니다. 상태는 `Disconnected → Connecting → Open →
//! Closing` 순으로 전이하며, 호출자가 요청하지 않은 연결 종료는
//! 고정 지연 후 자동 재연결로 복구됩니다.

use feed_core::{CandleInterval, Feed};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::config::FeedConfig;
use crate::error::{FeedError, FeedResult};
use crate::events::{FeedNotification, MarketEventSender, NotificationSender};
use crate::handler::{ControlFrame, EventHandler};
use crate::queue::{spawn_queue_worker, Command, CommandSender};
use crate::token::{ConnectTicket, TokenProvider};
use crate::transport::{Connector, FrameReceiver};

/// 연결 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// 연결 없음
    Disconnected,
    /// 토큰 발급, 소켓 수립, 핸드셰이크 대기 중
    Connecting,
    /// 커맨드 전송 가능
    Open,
    /// 호출자 요청으로 종료 중
    Closing,
}

/// 단일 WebSocket 연결.
///
/// 복제 가능한 핸들이며 내부 상태는 공유됩니다.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

struct ConnectionInner {
    /// 라우터 집계용 안정 식별자
    id: usize,
    config: FeedConfig,
    token_provider: TokenProvider,
    connector: Arc<dyn Connector>,
    handler: Arc<EventHandler>,
    state: RwLock<ConnectionState>,
    subscriptions: RwLock<Vec<Feed>>,
    /// 현재 세션의 커맨드 큐. 소켓이 없으면 `None`.
    command_tx: Mutex<Option<CommandSender>>,
    session_tasks: Mutex<Vec<JoinHandle<()>>>,
    command_ids: Arc<AtomicU64>,
    ever_connected: AtomicBool,
    close_requested: AtomicBool,
    notifications: NotificationSender,
}

impl Connection {
    /// 새 연결을 생성합니다. 생성 시점에는 아무것도 연결하지 않습니다.
    pub fn new(
        id: usize,
        config: FeedConfig,
        connector: Arc<dyn Connector>,
        events: MarketEventSender,
        notifications: NotificationSender,
    ) -> FeedResult<Self> {
        let token_provider = TokenProvider::new(&config)?;

        Ok(Self {
            inner: Arc::new(ConnectionInner {
                id,
                config,
                token_provider,
                connector,
                handler: Arc::new(EventHandler::new(events)),
                state: RwLock::new(ConnectionState::Disconnected),
                subscriptions: RwLock::new(Vec::new()),
                command_tx: Mutex::new(None),
                session_tasks: Mutex::new(Vec::new()),
                command_ids: Arc::new(AtomicU64::new(0)),
                ever_connected: AtomicBool::new(false),
                close_requested: AtomicBool::new(false),
                notifications,
            }),
        })
    }

    /// 연결 식별자를 반환합니다.
    pub fn id(&self) -> usize {
        self.inner.id
    }

    /// 연결을 수립합니다. 이미 열려 있거나 수립 중이면 아무것도 하지 않습니다.
    pub async fn connect(&self) -> FeedResult<()> {
        self.inner.close_requested.store(false, Ordering::SeqCst);
        self.inner.clone().establish().await
    }

    /// 심볼 시세 피드를 구독합니다.
    pub async fn subscribe_ticker(&self, symbol: &str) -> FeedResult<()> {
        self.subscribe_feed(Feed::ticker(symbol)).await
    }

    /// 심볼 시세 피드 구독을 해지합니다.
    pub async fn unsubscribe_ticker(&self, symbol: &str) -> FeedResult<()> {
        self.unsubscribe_feed(&Feed::ticker(symbol)).await
    }

    /// 심볼 캔들 피드를 구독합니다.
    ///
    /// # Errors
    /// 지원하지 않는 간격 레이블이면 `FeedError::InvalidInterval`.
    pub async fn subscribe_candle(&self, symbol: &str, interval: &str) -> FeedResult<()> {
        let interval = parse_interval(interval)?;
        self.subscribe_feed(Feed::candle(symbol, interval)).await
    }

    /// 심볼 캔들 피드 구독을 해지합니다.
    pub async fn unsubscribe_candle(&self, symbol: &str, interval: &str) -> FeedResult<()> {
        let interval = parse_interval(interval)?;
        self.unsubscribe_feed(&Feed::candle(symbol, interval)).await
    }

    /// 피드를 구독합니다. 이미 구독 중이면 아무것도 하지 않습니다.
    pub async fn subscribe_feed(&self, feed: Feed) -> FeedResult<()> {
        self.ensure_connected()?;

        let keys = {
            let mut subscriptions = self.inner.subscriptions.write().await;
            if subscriptions.iter().any(|f| f.key() == feed.key()) {
                return Ok(());
            }
            subscriptions.push(feed.clone());
            snapshot_keys(&subscriptions)
        };

        // 네트워크 왕복 전에 집합 변경을 먼저 알림
        self.inner.notify(FeedNotification::Subscriptions(keys));
        self.inner
            .dispatch(Command::Subscribe {
                topic: feed.topic(),
            })
            .await;
        Ok(())
    }

    /// 피드 구독을 해지합니다. 구독 중이 아니면 아무것도 하지 않습니다.
    pub async fn unsubscribe_feed(&self, feed: &Feed) -> FeedResult<()> {
        self.ensure_connected()?;

        let key = feed.key();
        let keys = {
            let mut subscriptions = self.inner.subscriptions.write().await;
            let before = subscriptions.len();
            subscriptions.retain(|f| f.key() != key);
            if subscriptions.len() == before {
                return Ok(());
            }
            snapshot_keys(&subscriptions)
        };

        if feed.is_candle() {
            self.inner.handler.discard(&key);
        }

        self.inner.notify(FeedNotification::Subscriptions(keys));
        self.inner
            .dispatch(Command::Unsubscribe {
                topic: feed.topic(),
            })
            .await;
        Ok(())
    }

    /// 연결을 종료합니다.
    ///
    /// # Errors
    /// 활성 구독이 남아 있으면 `FeedError::ActiveSubscriptions`.
    pub async fn close_connection(&self) -> FeedResult<()> {
        let count = self.inner.subscriptions.read().await.len();
        if count > 0 {
            return Err(FeedError::ActiveSubscriptions(count));
        }

        self.inner.close_requested.store(true, Ordering::SeqCst);
        *self.inner.state.write().await = ConnectionState::Closing;
        self.inner.teardown_session().await;
        *self.inner.state.write().await = ConnectionState::Disconnected;

        info!("Connection {} closed", self.inner.id);
        Ok(())
    }

    /// 연결이 열려 있는지 여부.
    pub async fn is_socket_open(&self) -> bool {
        *self.inner.state.read().await == ConnectionState::Open
    }

    /// 연결 수립 중인지 여부.
    pub async fn is_socket_connecting(&self) -> bool {
        *self.inner.state.read().await == ConnectionState::Connecting
    }

    /// 현재 상태를 반환합니다.
    pub async fn state(&self) -> ConnectionState {
        *self.inner.state.read().await
    }

    /// 활성 구독 수를 반환합니다.
    pub async fn subscription_number(&self) -> usize {
        self.inner.subscriptions.read().await.len()
    }

    /// 활성 구독 키 목록을 삽입 순서대로 반환합니다.
    pub async fn feed_keys(&self) -> Vec<String> {
        snapshot_keys(&self.inner.subscriptions.read().await)
    }

    /// 주어진 키를 구독 중인지 여부.
    pub async fn contains(&self, key: &str) -> bool {
        self.inner
            .subscriptions
            .read()
            .await
            .iter()
            .any(|f| f.key() == key)
    }

    fn ensure_connected(&self) -> FeedResult<()> {
        if self.inner.ever_connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(FeedError::NotConnected)
        }
    }
}

impl ConnectionInner {
    /// 토큰 발급부터 핸드셰이크까지 한 번의 연결 수립을 수행합니다.
    ///
    /// 상태 확인과 `Connecting` 전이를 한 락 안에서 수행하므로 호출자
    /// 재연결과 타이머 재연결이 겹쳐도 세션은 하나만 만들어집니다.
    async fn establish(self: Arc<Self>) -> FeedResult<()> {
        {
            let mut state = self.state.write().await;
            if *state == ConnectionState::Open || *state == ConnectionState::Connecting {
                return Ok(());
            }
            *state = ConnectionState::Connecting;
        }

        let result = self.clone().establish_inner().await;
        if result.is_err() {
            *self.state.write().await = ConnectionState::Disconnected;
        }
        result
    }

    async fn establish_inner(self: Arc<Self>) -> FeedResult<()> {
        let ticket = timeout(self.config.connect_timeout, self.token_provider.issue())
            .await
            .map_err(|_| FeedError::Timeout("Token request timed out".to_string()))??;

        self.handler.clear_cache();

        let connect_id = generate_connect_id();
        let url = ticket.connect_url(&connect_id);

        let (frame_tx, mut frame_rx) = timeout(self.config.connect_timeout, self.connector.connect(&url))
            .await
            .map_err(|_| FeedError::Timeout("Socket establishment timed out".to_string()))??;

        // connect id가 반향될 때까지 핸드셰이크 응답 대기
        timeout(
            self.config.connect_timeout,
            self.await_welcome(&mut frame_rx, &connect_id),
        )
        .await
        .map_err(|_| FeedError::Timeout("Handshake timed out".to_string()))??;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let worker = spawn_queue_worker(
            command_rx,
            frame_tx,
            self.command_ids.clone(),
            self.config.command_interval,
        );
        let keepalive = self.spawn_keepalive(command_tx.clone(), &ticket);

        {
            let mut tasks = self.session_tasks.lock().await;
            tasks.push(worker);
            tasks.push(keepalive);
        }
        *self.command_tx.lock().await = Some(command_tx);
        *self.state.write().await = ConnectionState::Open;
        self.ever_connected.store(true, Ordering::SeqCst);

        info!("Connection {} open (connect id: {})", self.id, connect_id);

        self.clone().spawn_reader(frame_rx);

        if !self.subscriptions.read().await.is_empty() {
            tokio::spawn(self.clone().replay_subscriptions());
        }

        Ok(())
    }

    async fn await_welcome(
        &self,
        frame_rx: &mut FrameReceiver,
        connect_id: &str,
    ) -> FeedResult<()> {
        while let Some(result) = frame_rx.recv().await {
            let message = result.map_err(FeedError::WebSocket)?;
            if let Message::Text(text) = message {
                if let Some(ControlFrame::Welcome { id }) = self.handler.handle_frame(&text).await {
                    if id == connect_id {
                        return Ok(());
                    }
                    warn!("Welcome frame with unexpected connect id: {}", id);
                }
            }
        }
        Err(FeedError::WebSocket(
            "Connection closed during handshake".to_string(),
        ))
    }

    /// 수신 루프. 스트림이 끝나면 연결 종료 처리로 넘어갑니다.
    fn spawn_reader(self: Arc<Self>, mut frame_rx: FrameReceiver) {
        tokio::spawn(async move {
            while let Some(result) = frame_rx.recv().await {
                match result {
                    Ok(Message::Text(text)) => {
                        self.handler.handle_frame(&text).await;
                    }
                    Ok(Message::Close(_)) => {
                        debug!("Connection {} received close frame", self.id);
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        // 전송 계층 에러는 상태를 바꾸지 않고 그대로 재발행
                        self.notify(FeedNotification::Error(e));
                    }
                }
            }
            self.handle_disconnect().await;
        });
    }

    /// 연결 종료 처리. 호출자가 요청하지 않은 종료면 재연결을 예약합니다.
    async fn handle_disconnect(self: &Arc<Self>) {
        let was_closing = *self.state.read().await == ConnectionState::Closing;
        self.teardown_session().await;
        *self.state.write().await = ConnectionState::Disconnected;

        if was_closing || self.close_requested.load(Ordering::SeqCst) {
            return;
        }

        let count = self.subscriptions.read().await.len();
        warn!(
            "Connection {} lost ({} active subscriptions), reconnecting in {:?}",
            self.id, count, self.config.reconnect_delay
        );
        self.notify(FeedNotification::Reconnect(count));

        let inner = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(inner.config.reconnect_delay).await;
                if inner.close_requested.load(Ordering::SeqCst) {
                    return;
                }
                match inner.clone().establish().await {
                    Ok(()) => return,
                    Err(e) => {
                        error!("Connection {} reconnect failed: {}", inner.id, e);
                        inner.notify(FeedNotification::Error(e.to_string()));
                    }
                }
            }
        });
    }

    /// 세션 태스크와 커맨드 큐를 정리합니다.
    async fn teardown_session(&self) {
        *self.command_tx.lock().await = None;
        let mut tasks = self.session_tasks.lock().await;
        for task in tasks.drain(..) {
            task.abort();
        }
    }

    /// 재연결 후 구독 집합을 다시 전송합니다.
    ///
    /// 집합 자체는 그대로 두고 커맨드만 재발행하므로 관찰자는 빈
    /// 집합을 절대 보지 않습니다. 큐가 아직 준비되지 않았으면 고정
    /// 지연 후 다시 시도합니다.
    async fn replay_subscriptions(self: Arc<Self>) {
        loop {
            if self.close_requested.load(Ordering::SeqCst) {
                return;
            }

            let command_tx = self.command_tx.lock().await.clone();
            match command_tx {
                Some(tx) => {
                    let feeds = self.subscriptions.read().await.clone();
                    info!(
                        "Connection {} replaying {} subscriptions",
                        self.id,
                        feeds.len()
                    );
                    for feed in feeds {
                        if tx
                            .send(Command::Subscribe {
                                topic: feed.topic(),
                            })
                            .is_err()
                        {
                            debug!("Queue gone during replay, will retry on next reconnect");
                            return;
                        }
                    }
                    return;
                }
                None => {
                    debug!("Connection {} replay deferred, socket not ready", self.id);
                    tokio::time::sleep(self.config.reconnect_delay).await;
                }
            }
        }
    }

    fn spawn_keepalive(&self, command_tx: CommandSender, ticket: &ConnectTicket) -> JoinHandle<()> {
        let interval = ticket.ping_interval;
        let id = self.id;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if command_tx.send(Command::Ping).is_err() {
                    debug!("Connection {} keepalive stopped", id);
                    return;
                }
            }
        })
    }

    /// 커맨드를 큐에 넣습니다. 소켓이 없으면 유예 알림만 보냅니다.
    async fn dispatch(&self, command: Command) {
        let command_tx = self.command_tx.lock().await;
        match command_tx.as_ref() {
            Some(tx) => {
                // 전송 실패는 소켓이 동시에 내려간 경우, 재생이 복구함
                if tx.send(command).is_err() {
                    debug!("Connection {} queue gone, command deferred", self.id);
                }
            }
            None => {
                self.notify(FeedNotification::SocketNotReady);
            }
        }
    }

    fn notify(&self, notification: FeedNotification) {
        // 수신자가 없어도 에러 아님
        let _ = self.notifications.send(notification);
    }
}

fn snapshot_keys(feeds: &[Feed]) -> Vec<String> {
    feeds.iter().map(Feed::key).collect()
}

pub(crate) fn parse_interval(label: &str) -> FeedResult<CandleInterval> {
    CandleInterval::from_label(label).ok_or_else(|| FeedError::InvalidInterval(label.to_string()))
}

/// 핸드셰이크 상관용 연결 식별자를 생성합니다 (128비트 hex).
fn generate_connect_id() -> String {
    format!("{:032x}", rand::random::<u128>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::notification_channel;
    use crate::transport::WsConnector;

    fn test_connection() -> Connection {
        let (events, _event_rx) = mpsc::channel(16);
        let (notifications, _notification_rx) = notification_channel(16);
        Connection::new(
            0,
            FeedConfig::default(),
            Arc::new(WsConnector),
            events,
            notifications,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_subscribe_before_connect_fails() {
        let connection = test_connection();
        let err = connection.subscribe_ticker("BTC-USDT").await.unwrap_err();
        assert!(matches!(err, FeedError::NotConnected));
        assert_eq!(connection.subscription_number().await, 0);
    }

    #[tokio::test]
    async fn test_invalid_interval_rejected() {
        let connection = test_connection();
        let err = connection
            .subscribe_candle("BTC-USDT", "7m")
            .await
            .unwrap_err();
        assert!(matches!(err, FeedError::InvalidInterval(_)));
        assert_eq!(connection.subscription_number().await, 0);
    }

    #[tokio::test]
    async fn test_close_when_never_connected() {
        let connection = test_connection();
        assert!(connection.close_connection().await.is_ok());
        assert_eq!(connection.state().await, ConnectionState::Disconnected);
    }

    #[test]
    fn test_connect_id_format() {
        let id = generate_connect_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
