//! 다중 연결 라우터.
//!
//! 연결당 구독 수 상한에 도달하면 새 연결을 만들어 구독을 샤딩하는
//! 상위 파사드입니다. 전역 멱등성(한 피드 키는 전체에서 단 하나의
//! 연결에만 존재)을 보장하고, 집계 질의와 병합된 구독 알림을
//! 제공합니다.

use feed_core::Feed;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};

use crate::config::FeedConfig;
use crate::connection::Connection;
use crate::error::FeedResult;
use crate::events::{
    notification_channel, FeedNotification, MarketEventSender, NotificationReceiver,
    NotificationSender,
};
use crate::transport::{Connector, WsConnector};

/// 다중 연결 구독 라우터.
#[derive(Clone)]
pub struct FeedRouter {
    inner: Arc<RouterInner>,
}

struct RouterInner {
    config: FeedConfig,
    connector: Arc<dyn Connector>,
    events: MarketEventSender,
    /// 병합된 알림 채널
    notifications: NotificationSender,
    connections: RwLock<Vec<Connection>>,
    next_id: AtomicUsize,
}

impl FeedRouter {
    /// 기본 WebSocket 커넥터로 라우터를 생성합니다.
    pub fn new(config: FeedConfig, events: MarketEventSender) -> Self {
        Self::with_connector(config, Arc::new(WsConnector), events)
    }

    /// 커넥터를 직접 지정해 라우터를 생성합니다.
    pub fn with_connector(
        config: FeedConfig,
        connector: Arc<dyn Connector>,
        events: MarketEventSender,
    ) -> Self {
        let (notifications, _) = notification_channel(config.event_buffer);
        Self {
            inner: Arc::new(RouterInner {
                config,
                connector,
                events,
                notifications,
                connections: RwLock::new(Vec::new()),
                next_id: AtomicUsize::new(0),
            }),
        }
    }

    /// 병합된 알림 채널을 구독합니다.
    pub fn notifications(&self) -> NotificationReceiver {
        self.inner.notifications.subscribe()
    }

    /// 연결을 수립합니다. 연결이 하나도 없으면 첫 연결을 생성합니다.
    pub async fn connect(&self) -> FeedResult<()> {
        let mut connections = self.inner.connections.write().await;
        if connections.is_empty() {
            let connection = self.inner.clone().create_connection().await?;
            connections.push(connection);
            return Ok(());
        }
        for connection in connections.iter() {
            connection.connect().await?;
        }
        Ok(())
    }

    /// 심볼 시세 피드를 구독합니다.
    pub async fn subscribe_ticker(&self, symbol: &str) -> FeedResult<()> {
        self.subscribe_feed(Feed::ticker(symbol)).await
    }

    /// 여러 심볼의 시세 피드를 구독합니다.
    pub async fn subscribe_tickers(&self, symbols: &[&str]) -> FeedResult<()> {
        for symbol in symbols {
            self.subscribe_ticker(symbol).await?;
        }
        Ok(())
    }

    /// 심볼 시세 피드 구독을 해지합니다.
    pub async fn unsubscribe_ticker(&self, symbol: &str) -> FeedResult<()> {
        self.unsubscribe_feed(&Feed::ticker(symbol)).await
    }

    /// 여러 심볼의 시세 피드 구독을 해지합니다.
    pub async fn unsubscribe_tickers(&self, symbols: &[&str]) -> FeedResult<()> {
        for symbol in symbols {
            self.unsubscribe_ticker(symbol).await?;
        }
        Ok(())
    }

    /// 심볼 캔들 피드를 구독합니다.
    pub async fn subscribe_candle(&self, symbol: &str, interval: &str) -> FeedResult<()> {
        let interval = crate::connection::parse_interval(interval)?;
        self.subscribe_feed(Feed::candle(symbol, interval)).await
    }

    /// 심볼 캔들 피드 구독을 해지합니다.
    pub async fn unsubscribe_candle(&self, symbol: &str, interval: &str) -> FeedResult<()> {
        let interval = crate::connection::parse_interval(interval)?;
        self.unsubscribe_feed(&Feed::candle(symbol, interval)).await
    }

    /// 피드를 담당 연결에 배정해 구독합니다.
    ///
    /// 이미 어느 연결이든 해당 키를 들고 있으면 아무것도 하지
    /// 않습니다. 마지막 연결이 상한 미만이면 거기에, 아니면 새
    /// 연결을 만들어 배정합니다. 멱등성/상한 검사와 집합 변경이
    /// 원자적이도록 위임이 끝날 때까지 연결 목록 락을 유지합니다.
    pub async fn subscribe_feed(&self, feed: Feed) -> FeedResult<()> {
        let key = feed.key();
        let mut connections = self.inner.connections.write().await;

        for connection in connections.iter() {
            if connection.contains(&key).await {
                debug!("Feed {} already subscribed, skipping", key);
                return Ok(());
            }
        }

        let mut reusable = None;
        if let Some(last) = connections.last() {
            if last.subscription_number().await < self.inner.config.max_subscriptions {
                reusable = Some(last.clone());
            }
        }

        let target = match reusable {
            Some(connection) => connection,
            None => {
                let connection = self.inner.clone().create_connection().await?;
                connections.push(connection.clone());
                connection
            }
        };

        target.subscribe_feed(feed).await
    }

    /// 피드 구독을 해지합니다. 키를 들고 있는 연결이 없으면 아무것도 하지 않습니다.
    pub async fn unsubscribe_feed(&self, feed: &Feed) -> FeedResult<()> {
        let key = feed.key();
        let holder = {
            let connections = self.inner.connections.read().await;
            let mut found = None;
            for connection in connections.iter() {
                if connection.contains(&key).await {
                    found = Some(connection.clone());
                    break;
                }
            }
            found
        };

        match holder {
            Some(connection) => connection.unsubscribe_feed(feed).await,
            None => Ok(()),
        }
    }

    /// 모든 연결을 종료합니다. 각 연결의 전제 조건 위반은 그대로 전파됩니다.
    pub async fn close_connection(&self) -> FeedResult<()> {
        let connections = self.inner.connections.read().await.clone();
        for connection in connections {
            connection.close_connection().await?;
        }
        Ok(())
    }

    /// 모든 연결이 열려 있는지 여부. 연결이 없으면 참입니다.
    pub async fn is_socket_open(&self) -> bool {
        let connections = self.inner.connections.read().await;
        for connection in connections.iter() {
            if !connection.is_socket_open().await {
                return false;
            }
        }
        true
    }

    /// 수립 중인 연결이 하나라도 있는지 여부.
    pub async fn is_socket_connecting(&self) -> bool {
        let connections = self.inner.connections.read().await;
        for connection in connections.iter() {
            if connection.is_socket_connecting().await {
                return true;
            }
        }
        false
    }

    /// 전체 활성 구독 수를 반환합니다.
    pub async fn subscription_number(&self) -> usize {
        let connections = self.inner.connections.read().await;
        let mut total = 0;
        for connection in connections.iter() {
            total += connection.subscription_number().await;
        }
        total
    }

    /// 연결 식별자별 구독 수 분포를 반환합니다.
    pub async fn subscription_breakdown(&self) -> BTreeMap<usize, usize> {
        let connections = self.inner.connections.read().await;
        let mut breakdown = BTreeMap::new();
        for connection in connections.iter() {
            breakdown.insert(connection.id(), connection.subscription_number().await);
        }
        breakdown
    }

    /// 현재 연결 수를 반환합니다.
    pub async fn connection_count(&self) -> usize {
        self.inner.connections.read().await.len()
    }
}

impl RouterInner {
    /// 새 연결을 만들고 수립한 뒤 알림 전달자를 붙입니다.
    async fn create_connection(self: Arc<Self>) -> FeedResult<Connection> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (child_tx, child_rx) = notification_channel(self.config.event_buffer);

        let connection = Connection::new(
            id,
            self.config.clone(),
            self.connector.clone(),
            self.events.clone(),
            child_tx,
        )?;

        self.clone().spawn_forwarder(child_rx);
        connection.connect().await?;

        info!("Router created connection {}", id);
        Ok(connection)
    }

    /// 자식 연결의 알림을 병합 채널로 전달합니다.
    ///
    /// 구독 변경 알림은 모든 연결의 키를 이어붙인 스냅샷으로 바꿔
    /// 발행하고, 나머지 알림은 그대로 전달합니다.
    fn spawn_forwarder(self: Arc<Self>, mut child_rx: NotificationReceiver) {
        tokio::spawn(async move {
            loop {
                match child_rx.recv().await {
                    Ok(FeedNotification::Subscriptions(_)) => {
                        let merged = self.merged_keys().await;
                        let _ = self.notifications.send(FeedNotification::Subscriptions(merged));
                    }
                    Ok(other) => {
                        let _ = self.notifications.send(other);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("Notification forwarder lagged, skipped {}", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        });
    }

    async fn merged_keys(&self) -> Vec<String> {
        let connections = self.connections.read().await;
        let mut keys = Vec::new();
        for connection in connections.iter() {
            keys.extend(connection.feed_keys().await);
        }
        keys
    }
}
