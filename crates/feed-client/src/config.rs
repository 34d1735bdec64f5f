//! 피드 클라이언트 설정.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 기본 토큰 엔드포인트 (공개 채널).
pub const DEFAULT_TOKEN_ENDPOINT: &str = "https://api.kucoin.com/api/v1/bullet-public";

/// 연결당 최대 구독 수.
pub const DEFAULT_MAX_SUBSCRIPTIONS: usize = 98;

/// 아웃바운드 커맨드 최소 간격 (밀리초).
pub const DEFAULT_COMMAND_INTERVAL_MS: u64 = 100;

/// 재연결 대기 시간 (밀리초).
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 5_000;

/// 연결 타임아웃 (밀리초) - 토큰 발급, 소켓 수립, 핸드셰이크 대기에 각각 적용.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

/// 시장 이벤트 채널 버퍼 크기.
pub const DEFAULT_EVENT_BUFFER: usize = 1_000;

/// 피드 클라이언트 설정.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// 토큰 발급 엔드포인트 URL
    pub token_endpoint: String,
    /// 연결당 최대 구독 수 (라우터 샤딩 기준)
    pub max_subscriptions: usize,
    /// 아웃바운드 커맨드 최소 간격
    pub command_interval: Duration,
    /// 재연결 대기 시간
    pub reconnect_delay: Duration,
    /// 연결 타임아웃
    pub connect_timeout: Duration,
    /// 시장 이벤트 채널 버퍼 크기
    pub event_buffer: usize,
}

impl FeedConfig {
    /// 지정한 토큰 엔드포인트로 설정을 생성합니다.
    pub fn new(token_endpoint: impl Into<String>) -> Self {
        Self {
            token_endpoint: token_endpoint.into(),
            ..Self::default()
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            token_endpoint: DEFAULT_TOKEN_ENDPOINT.to_string(),
            max_subscriptions: DEFAULT_MAX_SUBSCRIPTIONS,
            command_interval: Duration::from_millis(DEFAULT_COMMAND_INTERVAL_MS),
            reconnect_delay: Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}
