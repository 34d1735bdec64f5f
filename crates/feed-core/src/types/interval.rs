//! 캔들스틱 데이터를 위한 간격 정의.
//!
//! 지원되는 간격은 고정된 열거형 집합입니다. 각 간격은 사람이 읽는
//! 레이블("1m")과 와이어 포맷 코드("1min")를 가지며, 레이블에 없는
//! 간격 요청은 호출자 오류로 처리됩니다.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// 캔들 구독 간격.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandleInterval {
    /// 1분봉
    M1,
    /// 3분봉
    M3,
    /// 5분봉
    M5,
    /// 15분봉
    M15,
    /// 30분봉
    M30,
    /// 1시간봉
    H1,
    /// 2시간봉
    H2,
    /// 4시간봉
    H4,
    /// 6시간봉
    H6,
    /// 8시간봉
    H8,
    /// 12시간봉
    H12,
    /// 일봉
    D1,
    /// 주봉
    W1,
}

impl CandleInterval {
    /// 이 간격의 기간을 반환합니다.
    pub fn duration(&self) -> Duration {
        match self {
            CandleInterval::M1 => Duration::from_secs(60),
            CandleInterval::M3 => Duration::from_secs(3 * 60),
            CandleInterval::M5 => Duration::from_secs(5 * 60),
            CandleInterval::M15 => Duration::from_secs(15 * 60),
            CandleInterval::M30 => Duration::from_secs(30 * 60),
            CandleInterval::H1 => Duration::from_secs(60 * 60),
            CandleInterval::H2 => Duration::from_secs(2 * 60 * 60),
            CandleInterval::H4 => Duration::from_secs(4 * 60 * 60),
            CandleInterval::H6 => Duration::from_secs(6 * 60 * 60),
            CandleInterval::H8 => Duration::from_secs(8 * 60 * 60),
            CandleInterval::H12 => Duration::from_secs(12 * 60 * 60),
            CandleInterval::D1 => Duration::from_secs(24 * 60 * 60),
            CandleInterval::W1 => Duration::from_secs(7 * 24 * 60 * 60),
        }
    }

    /// 이 간격의 초 단위 값을 반환합니다.
    pub fn as_secs(&self) -> u64 {
        self.duration().as_secs()
    }

    /// 사람이 읽는 레이블을 반환합니다 (예: "1m", "1h").
    pub fn label(&self) -> &'static str {
        match self {
            CandleInterval::M1 => "1m",
            CandleInterval::M3 => "3m",
            CandleInterval::M5 => "5m",
            CandleInterval::M15 => "15m",
            CandleInterval::M30 => "30m",
            CandleInterval::H1 => "1h",
            CandleInterval::H2 => "2h",
            CandleInterval::H4 => "4h",
            CandleInterval::H6 => "6h",
            CandleInterval::H8 => "8h",
            CandleInterval::H12 => "12h",
            CandleInterval::D1 => "1d",
            CandleInterval::W1 => "1w",
        }
    }

    /// 와이어 포맷 코드로 변환합니다 (예: "1min", "1hour").
    pub fn wire_code(&self) -> &'static str {
        match self {
            CandleInterval::M1 => "1min",
            CandleInterval::M3 => "3min",
            CandleInterval::M5 => "5min",
            CandleInterval::M15 => "15min",
            CandleInterval::M30 => "30min",
            CandleInterval::H1 => "1hour",
            CandleInterval::H2 => "2hour",
            CandleInterval::H4 => "4hour",
            CandleInterval::H6 => "6hour",
            CandleInterval::H8 => "8hour",
            CandleInterval::H12 => "12hour",
            CandleInterval::D1 => "1day",
            CandleInterval::W1 => "1week",
        }
    }

    /// 레이블에서 파싱합니다.
    pub fn from_label(s: &str) -> Option<Self> {
        match s {
            "1m" => Some(CandleInterval::M1),
            "3m" => Some(CandleInterval::M3),
            "5m" => Some(CandleInterval::M5),
            "15m" => Some(CandleInterval::M15),
            "30m" => Some(CandleInterval::M30),
            "1h" => Some(CandleInterval::H1),
            "2h" => Some(CandleInterval::H2),
            "4h" => Some(CandleInterval::H4),
            "6h" => Some(CandleInterval::H6),
            "8h" => Some(CandleInterval::H8),
            "12h" => Some(CandleInterval::H12),
            "1d" => Some(CandleInterval::D1),
            "1w" => Some(CandleInterval::W1),
            _ => None,
        }
    }

    /// 와이어 포맷 코드에서 파싱합니다.
    pub fn from_wire_code(s: &str) -> Option<Self> {
        match s {
            "1min" => Some(CandleInterval::M1),
            "3min" => Some(CandleInterval::M3),
            "5min" => Some(CandleInterval::M5),
            "15min" => Some(CandleInterval::M15),
            "30min" => Some(CandleInterval::M30),
            "1hour" => Some(CandleInterval::H1),
            "2hour" => Some(CandleInterval::H2),
            "4hour" => Some(CandleInterval::H4),
            "6hour" => Some(CandleInterval::H6),
            "8hour" => Some(CandleInterval::H8),
            "12hour" => Some(CandleInterval::H12),
            "1day" => Some(CandleInterval::D1),
            "1week" => Some(CandleInterval::W1),
            _ => None,
        }
    }
}

impl fmt::Display for CandleInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for CandleInterval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_label(s).ok_or_else(|| format!("Invalid interval: {}", s))
    }
}
