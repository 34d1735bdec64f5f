//! 실시간 시장 데이터 WebSocket 클라이언트.
//!
//! 공개 시장 데이터 스트리밍 프로토콜에 대한 영속 클라이언트입니다.
//! 시세/캔들 피드를 구독하면 시스템 전체에서 피드당 정확히 하나의
//! 활성 구독만 유지되며, 전송 장애 시 자동 재연결과 구독 재생으로
//! 복구됩니다. 연결당 구독 수가 상한에 도달하면 라우터가 새 연결을
//! 만들어 샤딩합니다.
//!
//! # 사용 예
//!
//! ```no_run
//! use feed_client::{FeedConfig, FeedRouter, MarketEvent};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (events, mut event_rx) = mpsc::channel(1_000);
//!     let router = FeedRouter::new(FeedConfig::default(), events);
//!
//!     router.connect().await?;
//!     router.subscribe_ticker("BTC-USDT").await?;
//!     router.subscribe_candle("ETH-USDT", "5m").await?;
//!
//!     while let Some(event) = event_rx.recv().await {
//!         match event {
//!             MarketEvent::Ticker(ticker) => println!("{}: {}", ticker.symbol, ticker.price),
//!             MarketEvent::Candle(candle) => println!("{}: {:?}", candle.symbol, candle.close),
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod handler;
pub mod queue;
pub mod router;
pub mod token;
pub mod transport;

pub use config::FeedConfig;
pub use connection::{Connection, ConnectionState};
pub use error::{FeedError, FeedResult};
pub use events::{FeedNotification, MarketEvent, NotificationReceiver};
pub use router::FeedRouter;

// 핵심 타입 재노출
pub use feed_core::{CandleInterval, CandleUpdate, Feed, TickerUpdate};
