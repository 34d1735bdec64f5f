//! 피드 클라이언트 에러 타입.

use thiserror::Error;

/// 피드 클라이언트 관련 에러.
#[derive(Debug, Error)]
pub enum FeedError {
    /// 토큰 발급 실패 (엔드포인트 접근 불가 또는 응답 형식 오류)
    #[error("Token acquisition failed: {0}")]
    TokenAcquisition(String),

    /// 연결 전 구독 시도 (connect()가 한 번도 성공하지 않음)
    #[error("Not connected: call connect() before subscribing")]
    NotConnected,

    /// 지원되지 않는 캔들 간격
    #[error("Invalid candle interval: {0}")]
    InvalidInterval(String),

    /// 활성 구독이 남은 상태에서 연결 종료 시도
    #[error("Cannot close connection with {0} active subscriptions")]
    ActiveSubscriptions(usize),

    /// 네트워크/연결 에러
    #[error("Network error: {0}")]
    Network(String),

    /// WebSocket 에러
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// 파싱/역직렬화 에러
    #[error("Parse error: {0}")]
    Parse(String),

    /// 타임아웃
    #[error("Timeout: {0}")]
    Timeout(String),
}

/// 피드 작업을 위한 Result 타입.
pub type FeedResult<T> = Result<T, FeedError>;

impl FeedError {
    /// 재시도 가능한 에러인지 확인.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FeedError::TokenAcquisition(_)
                | FeedError::Network(_)
                | FeedError::WebSocket(_)
                | FeedError::Timeout(_)
        )
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FeedError::Timeout(err.to_string())
        } else {
            FeedError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::Parse(err.to_string())
    }
}
