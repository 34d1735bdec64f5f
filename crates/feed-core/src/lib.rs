//! # Feed Core
//!
//! 시장 데이터 피드 클라이언트의 핵심 도메인 타입을 제공합니다.
//!
//! 이 크레이트는 피드 시스템 전반에서 사용되는 기본 타입을 제공합니다:
//! - 캔들 간격 정의 (`CandleInterval`)
//! - 구독 피드 식별 (`Feed` - 피드 키와 와이어 토픽 생성)
//! - 시장 데이터 이벤트 구조체 (`TickerUpdate`, `CandleUpdate`)

pub mod types;

pub use types::*;
