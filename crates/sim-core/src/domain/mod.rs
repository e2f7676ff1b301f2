//! 백테스트 시뮬레이션을 위한 도메인 모델.

mod candle;
mod equity;
mod statistics;
mod trade;

pub use candle::*;
pub use equity::*;
pub use statistics::*;
pub use trade::*;
