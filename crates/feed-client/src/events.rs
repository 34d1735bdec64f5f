//! 이벤트 버스 타입.
//!
//! 시장 데이터는 호출자가 주입한 mpsc 채널로, 구독 상태 알림은
//! broadcast 채널로 분리해 내보냅니다. 데이터 소비자와 상태 관찰자가
//! 서로를 막지 않습니다.

use feed_core::{CandleUpdate, TickerUpdate};
use tokio::sync::{broadcast, mpsc};

/// 수신된 시장 데이터 이벤트.
#[derive(Debug, Clone)]
pub enum MarketEvent {
    /// 시세 업데이트
    Ticker(TickerUpdate),
    /// 캔들 업데이트 (확정 봉)
    Candle(CandleUpdate),
}

/// 구독 상태 알림.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedNotification {
    /// 활성 구독 키 집합의 스냅샷 (구독/해지 확인 시점마다 발행)
    Subscriptions(Vec<String>),
    /// 재연결 시작 (해당 시점의 활성 구독 수 포함)
    Reconnect(usize),
    /// 소켓 미준비 상태에서 커맨드가 유예됨
    SocketNotReady,
    /// 복구 불가능한 세션 에러
    Error(String),
}

/// 시장 데이터 이벤트 송신자.
pub type MarketEventSender = mpsc::Sender<MarketEvent>;

/// 구독 상태 알림 송신자.
pub type NotificationSender = broadcast::Sender<FeedNotification>;

/// 구독 상태 알림 수신자.
pub type NotificationReceiver = broadcast::Receiver<FeedNotification>;

/// 알림 브로드캐스트 채널을 생성합니다.
pub fn notification_channel(capacity: usize) -> (NotificationSender, NotificationReceiver) {
    broadcast::channel(capacity)
}
