//! 시장 데이터 이벤트 구조체.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::CandleInterval;

/// 실시간 시세 업데이트.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerUpdate {
    /// 와이어 포맷 심볼 (예: "BTC-USDT")
    pub symbol: String,
    /// 최근 체결가
    pub price: Decimal,
    /// 최근 체결량
    pub size: Decimal,
    /// 최우선 매수호가
    pub best_bid: Decimal,
    /// 최우선 매도호가
    pub best_ask: Decimal,
    /// 서버 타임스탬프
    pub time: DateTime<Utc>,
}

/// 실시간 캔들 업데이트.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandleUpdate {
    /// 와이어 포맷 심볼 (예: "BTC-USDT")
    pub symbol: String,
    /// 캔들 간격
    pub interval: CandleInterval,
    /// 캔들 시작 시각
    pub start_time: DateTime<Utc>,
    /// 시가
    pub open: Decimal,
    /// 고가
    pub high: Decimal,
    /// 저가
    pub low: Decimal,
    /// 종가
    pub close: Decimal,
    /// 거래량
    pub volume: Decimal,
    /// 거래대금
    pub turnover: Decimal,
}
