//! 인바운드 프레임 파싱 및 이벤트 변환.
//!
//! 수신 프레임을 제어 프레임(welcome/pong/ack)과 시장 데이터로
//! 분류합니다. 시장 데이터는 타입 있는 이벤트로 변환해 이벤트
//! 채널로 내보내며, 캔들은 피드 키별로 마지막 스냅샷과 비교해
//! 중복 발행을 걸러냅니다.

use chrono::{DateTime, Utc};
use feed_core::{CandleInterval, CandleUpdate, Feed, TickerUpdate};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::events::{MarketEvent, MarketEventSender};

const TICKER_TOPIC_PREFIX: &str = "/market/ticker:";
const CANDLE_TOPIC_PREFIX: &str = "/market/candles:";

/// 세션 제어 프레임.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlFrame {
    /// 핸드셰이크 응답 (connect id 포함)
    Welcome {
        /// 서버가 반향한 연결 식별자
        id: String,
    },
    /// keepalive 응답
    Pong,
    /// 구독/해지 확인
    Ack,
}

#[derive(Debug, Deserialize)]
struct InboundFrame {
    #[serde(rename = "type")]
    frame_type: String,
    id: Option<Value>,
    topic: Option<String>,
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct TickerData {
    price: Decimal,
    size: Decimal,
    #[serde(rename = "bestBid")]
    best_bid: Decimal,
    #[serde(rename = "bestAsk")]
    best_ask: Decimal,
    /// 나노초 단위 서버 타임스탬프
    time: i64,
}

#[derive(Debug, Deserialize)]
struct CandleData {
    symbol: String,
    /// [시작시각(초), 시가, 종가, 고가, 저가, 거래량, 거래대금]
    candles: Vec<String>,
}

/// 인바운드 이벤트 핸들러.
pub struct EventHandler {
    events: MarketEventSender,
    last_candles: Mutex<HashMap<String, CandleUpdate>>,
}

impl EventHandler {
    /// 주어진 이벤트 채널로 내보내는 핸들러를 생성합니다.
    pub fn new(events: MarketEventSender) -> Self {
        Self {
            events,
            last_candles: Mutex::new(HashMap::new()),
        }
    }

    /// 캔들 중복 제거 캐시 전체를 비웁니다. 새 연결 수립 시 호출됩니다.
    pub fn clear_cache(&self) {
        self.last_candles.lock().unwrap().clear();
    }

    /// 특정 피드 키의 중복 제거 캐시를 버립니다. 캔들 구독 해지 시 호출됩니다.
    pub fn discard(&self, feed_key: &str) {
        self.last_candles.lock().unwrap().remove(feed_key);
    }

    /// 수신 프레임 하나를 처리합니다.
    ///
    /// 제어 프레임이면 분류 결과를 반환하고, 시장 데이터 프레임이면
    /// 이벤트 채널로 내보낸 뒤 `None`을 반환합니다. 해석할 수 없는
    /// 프레임은 경고 로그 후 무시합니다.
    pub async fn handle_frame(&self, text: &str) -> Option<ControlFrame> {
        let frame: InboundFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Failed to parse inbound frame: {} ({})", e, text);
                return None;
            }
        };

        match frame.frame_type.as_str() {
            "welcome" => {
                let id = frame
                    .id
                    .as_ref()
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                Some(ControlFrame::Welcome { id })
            }
            "pong" => Some(ControlFrame::Pong),
            "ack" => Some(ControlFrame::Ack),
            "message" => {
                self.handle_message(frame).await;
                None
            }
            other => {
                debug!("Ignoring frame type: {}", other);
                None
            }
        }
    }

    async fn handle_message(&self, frame: InboundFrame) {
        let (topic, data) = match (frame.topic, frame.data) {
            (Some(topic), Some(data)) => (topic, data),
            _ => {
                warn!("Message frame missing topic or data");
                return;
            }
        };

        if let Some(symbol) = topic.strip_prefix(TICKER_TOPIC_PREFIX) {
            self.handle_ticker(symbol, data).await;
        } else if let Some(rest) = topic.strip_prefix(CANDLE_TOPIC_PREFIX) {
            self.handle_candle(rest, data).await;
        } else {
            debug!("Ignoring message for topic: {}", topic);
        }
    }

    async fn handle_ticker(&self, symbol: &str, data: Value) {
        let ticker: TickerData = match serde_json::from_value(data) {
            Ok(ticker) => ticker,
            Err(e) => {
                warn!("Failed to parse ticker data for {}: {}", symbol, e);
                return;
            }
        };

        let update = TickerUpdate {
            symbol: symbol.to_string(),
            price: ticker.price,
            size: ticker.size,
            best_bid: ticker.best_bid,
            best_ask: ticker.best_ask,
            time: DateTime::from_timestamp_nanos(ticker.time),
        };

        if self.events.send(MarketEvent::Ticker(update)).await.is_err() {
            debug!("Event channel closed, dropping ticker update");
        }
    }

    async fn handle_candle(&self, topic_rest: &str, data: Value) {
        // 토픽 꼬리는 "<SYM>_<wire-code>" 형식
        let interval = match topic_rest
            .rsplit_once('_')
            .and_then(|(_, code)| CandleInterval::from_wire_code(code))
        {
            Some(interval) => interval,
            None => {
                warn!("Unknown candle topic format: {}", topic_rest);
                return;
            }
        };

        let candle_data: CandleData = match serde_json::from_value(data) {
            Ok(candle_data) => candle_data,
            Err(e) => {
                warn!("Failed to parse candle data: {}", e);
                return;
            }
        };

        let update = match parse_candle(&candle_data, interval) {
            Some(update) => update,
            None => {
                warn!(
                    "Malformed candle payload for {}: {:?}",
                    candle_data.symbol, candle_data.candles
                );
                return;
            }
        };

        let key = Feed::candle(&update.symbol, interval).key();

        // 동일 스냅샷 반복 수신은 한 번만 내보냄
        {
            let mut cache = self.last_candles.lock().unwrap();
            if cache.get(&key) == Some(&update) {
                return;
            }
            cache.insert(key, update.clone());
        }

        if self.events.send(MarketEvent::Candle(update)).await.is_err() {
            debug!("Event channel closed, dropping candle update");
        }
    }
}

fn parse_candle(data: &CandleData, interval: CandleInterval) -> Option<CandleUpdate> {
    if data.candles.len() < 7 {
        return None;
    }

    let start_secs: i64 = data.candles[0].parse().ok()?;
    let decimal = |index: usize| Decimal::from_str(&data.candles[index]).ok();

    Some(CandleUpdate {
        symbol: data.symbol.clone(),
        interval,
        start_time: DateTime::<Utc>::from_timestamp(start_secs, 0)?,
        open: decimal(1)?,
        close: decimal(2)?,
        high: decimal(3)?,
        low: decimal(4)?,
        volume: decimal(5)?,
        turnover: decimal(6)?,
    })
}
