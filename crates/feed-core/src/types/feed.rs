//! 구독 피드 식별 타입.
//!
//! `Feed`는 구독 시점에 한 번 생성되는 태그드 유니언으로, 피드 키와
//! 와이어 토픽 문자열을 모두 이 타입에서 파생합니다. 동일한 키로
//! 정규화되는 두 호출은 같은 구독입니다.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::CandleInterval;

/// 구독 가능한 피드.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Feed {
    /// 심볼 시세 피드
    Ticker {
        /// 와이어 포맷 심볼 (예: "BTC-USDT")
        symbol: String,
    },
    /// 심볼 캔들 피드
    Candle {
        /// 와이어 포맷 심볼 (예: "BTC-USDT")
        symbol: String,
        /// 캔들 간격
        interval: CandleInterval,
    },
}

impl Feed {
    /// 시세 피드를 생성합니다. 심볼은 와이어 포맷으로 정규화됩니다.
    pub fn ticker(symbol: &str) -> Self {
        Feed::Ticker {
            symbol: normalize_symbol(symbol),
        }
    }

    /// 캔들 피드를 생성합니다. 심볼은 와이어 포맷으로 정규화됩니다.
    pub fn candle(symbol: &str, interval: CandleInterval) -> Self {
        Feed::Candle {
            symbol: normalize_symbol(symbol),
            interval,
        }
    }

    /// 시스템 전역에서 유일한 피드 키를 반환합니다.
    ///
    /// 예: `ticker-BTC-USDT`, `candle-BTC-USDT-1m`
    pub fn key(&self) -> String {
        match self {
            Feed::Ticker { symbol } => format!("ticker-{}", symbol),
            Feed::Candle { symbol, interval } => {
                format!("candle-{}-{}", symbol, interval.label())
            }
        }
    }

    /// 와이어 토픽 문자열을 반환합니다.
    ///
    /// 예: `/market/ticker:BTC-USDT`, `/market/candles:BTC-USDT_1min`
    pub fn topic(&self) -> String {
        match self {
            Feed::Ticker { symbol } => format!("/market/ticker:{}", symbol),
            Feed::Candle { symbol, interval } => {
                format!("/market/candles:{}_{}", symbol, interval.wire_code())
            }
        }
    }

    /// 피드의 심볼을 반환합니다.
    pub fn symbol(&self) -> &str {
        match self {
            Feed::Ticker { symbol } => symbol,
            Feed::Candle { symbol, .. } => symbol,
        }
    }

    /// 캔들 피드 여부를 반환합니다.
    pub fn is_candle(&self) -> bool {
        matches!(self, Feed::Candle { .. })
    }
}

impl fmt::Display for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// 심볼을 와이어 포맷으로 정규화합니다 ("/"를 "-"로 치환, 대문자).
fn normalize_symbol(symbol: &str) -> String {
    symbol.replace('/', "-").to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticker_key_and_topic() {
        let feed = Feed::ticker("BTC-USDT");
        assert_eq!(feed.key(), "ticker-BTC-USDT");
        assert_eq!(feed.topic(), "/market/ticker:BTC-USDT");
    }

    #[test]
    fn test_candle_key_and_topic() {
        let feed = Feed::candle("ETH-USDT", CandleInterval::M5);
        assert_eq!(feed.key(), "candle-ETH-USDT-5m");
        assert_eq!(feed.topic(), "/market/candles:ETH-USDT_5min");
    }

    #[test]
    fn test_symbol_normalization() {
        // 슬래시 표기와 소문자 입력도 동일한 키로 정규화됨
        let a = Feed::ticker("btc/usdt");
        let b = Feed::ticker("BTC-USDT");
        assert_eq!(a, b);
        assert_eq!(a.key(), "ticker-BTC-USDT");
    }

    #[test]
    fn test_display_is_key() {
        let feed = Feed::candle("BTC-USDT", CandleInterval::H1);
        assert_eq!(feed.to_string(), "candle-BTC-USDT-1h");
    }
}
