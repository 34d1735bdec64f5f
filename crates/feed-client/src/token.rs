//! WebSocket 접속 토큰 발급.
//!
//! 토큰 엔드포인트에 POST 요청을 보내 연결용 토큰과 후보 엔드포인트
//! 목록(각각 keepalive 간격 포함)을 받아옵니다. 토큰이 누락되거나
//! 응답 형식이 잘못된 경우 `FeedError::TokenAcquisition`으로 실패합니다.

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::config::FeedConfig;
use crate::error::{FeedError, FeedResult};

/// 토큰 엔드포인트 응답.
#[derive(Debug, Deserialize)]
struct BulletResponse {
    #[allow(dead_code)]
    code: Option<String>,
    data: Option<BulletData>,
}

#[derive(Debug, Deserialize)]
struct BulletData {
    token: Option<String>,
    #[serde(rename = "instanceServers", default)]
    instance_servers: Vec<InstanceServer>,
}

#[derive(Debug, Deserialize)]
struct InstanceServer {
    endpoint: String,
    #[serde(rename = "pingInterval")]
    ping_interval: u64,
}

/// 발급된 접속 티켓.
#[derive(Debug, Clone)]
pub struct ConnectTicket {
    /// 연결용 토큰
    pub token: String,
    /// WebSocket 엔드포인트 URL
    pub endpoint: String,
    /// 서버가 제안한 keepalive 간격
    pub ping_interval: Duration,
}

impl ConnectTicket {
    /// 연결 식별자를 포함한 최종 접속 URL을 생성합니다.
    pub fn connect_url(&self, connect_id: &str) -> String {
        format!(
            "{}?token={}&connectId={}",
            self.endpoint, self.token, connect_id
        )
    }
}

/// 토큰 발급자.
pub struct TokenProvider {
    endpoint: String,
    client: Client,
}

impl TokenProvider {
    /// 새로운 토큰 발급자를 생성합니다.
    ///
    /// # Errors
    /// HTTP 클라이언트 생성에 실패하면 `FeedError::Network`를 반환합니다.
    pub fn new(config: &FeedConfig) -> FeedResult<Self> {
        let client = Client::builder()
            .timeout(config.connect_timeout)
            .build()
            .map_err(|e| FeedError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: config.token_endpoint.clone(),
            client,
        })
    }

    /// 새 접속 티켓을 발급받습니다.
    pub async fn issue(&self) -> FeedResult<ConnectTicket> {
        debug!("Requesting connect token from {}", self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .send()
            .await
            .map_err(|e| FeedError::TokenAcquisition(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| FeedError::TokenAcquisition(e.to_string()))?;

        if !status.is_success() {
            error!("Token request failed: {} - {}", status, body);
            return Err(FeedError::TokenAcquisition(format!(
                "Token endpoint returned {}",
                status
            )));
        }

        let bullet: BulletResponse = serde_json::from_str(&body).map_err(|e| {
            FeedError::TokenAcquisition(format!("Failed to parse token response: {}", e))
        })?;

        let data = bullet
            .data
            .ok_or_else(|| FeedError::TokenAcquisition("Response missing data".to_string()))?;

        let token = match data.token {
            Some(t) if !t.is_empty() => t,
            _ => {
                return Err(FeedError::TokenAcquisition(
                    "Response missing token".to_string(),
                ))
            }
        };

        let server = data.instance_servers.into_iter().next().ok_or_else(|| {
            FeedError::TokenAcquisition("Response missing instance servers".to_string())
        })?;

        info!(
            "Connect token obtained (endpoint: {}, ping interval: {}ms)",
            server.endpoint, server.ping_interval
        );

        Ok(ConnectTicket {
            token,
            endpoint: server.endpoint,
            ping_interval: Duration::from_millis(server.ping_interval),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(endpoint: &str) -> FeedConfig {
        FeedConfig::new(endpoint)
    }

    #[tokio::test]
    async fn test_issue_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/bullet-public")
            .with_status(200)
            .with_body(
                r#"{"code":"200000","data":{"token":"abc123","instanceServers":[{"endpoint":"wss://ws.example.com/endpoint","pingInterval":18000,"pingTimeout":10000,"protocol":"websocket"}]}}"#,
            )
            .create_async()
            .await;

        let config = test_config(&format!("{}/api/v1/bullet-public", server.url()));
        let provider = TokenProvider::new(&config).unwrap();
        let ticket = provider.issue().await.unwrap();

        assert_eq!(ticket.token, "abc123");
        assert_eq!(ticket.endpoint, "wss://ws.example.com/endpoint");
        assert_eq!(ticket.ping_interval, Duration::from_millis(18000));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_token_fails() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/bullet")
            .with_status(200)
            .with_body(r#"{"code":"200000","data":{"instanceServers":[]}}"#)
            .create_async()
            .await;

        let config = test_config(&format!("{}/bullet", server.url()));
        let provider = TokenProvider::new(&config).unwrap();
        let err = provider.issue().await.unwrap_err();

        assert!(matches!(err, FeedError::TokenAcquisition(_)));
    }

    #[tokio::test]
    async fn test_server_error_fails() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/bullet")
            .with_status(503)
            .with_body("unavailable")
            .create_async()
            .await;

        let config = test_config(&format!("{}/bullet", server.url()));
        let provider = TokenProvider::new(&config).unwrap();
        let err = provider.issue().await.unwrap_err();

        assert!(matches!(err, FeedError::TokenAcquisition(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_connect_url() {
        let ticket = ConnectTicket {
            token: "tok".to_string(),
            endpoint: "wss://ws.example.com/endpoint".to_string(),
            ping_interval: Duration::from_millis(18000),
        };

        assert_eq!(
            ticket.connect_url("deadbeef"),
            "wss://ws.example.com/endpoint?token=tok&connectId=deadbeef"
        );
    }
}
