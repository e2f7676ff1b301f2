//! 백테스팅 모듈
//!
//! 과거 캔들 데이터와 진입/청산 신호로 롱 단일 포지션 전략을 시뮬레이션합니다.
//!
//! # 주요 구성요소
//!
//! - [`BacktestConfig`]: 백테스트 설정 (허용 최대 낙폭)
//! - [`BacktestEngine`]: 백테스트 실행 엔진
//! - [`BacktestOutput`]: 거래 목록, 통계, 자산 곡선
//! - [`DrawdownTracker`]: 경로 의존 낙폭 추적

pub mod engine;
pub mod equity;

pub use engine::{
    run_backtest, BacktestConfig, BacktestEngine, BacktestError, BacktestOutput, BacktestResult,
};
pub use equity::DrawdownTracker;
