//! 피드 시스템 전반에서 사용되는 공통 타입.

mod feed;
mod interval;
mod market;

pub use feed::*;
pub use interval::*;
pub use market::*;
