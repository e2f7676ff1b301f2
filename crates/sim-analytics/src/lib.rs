//! 백테스트 및 재생 엔진.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - 진입/청산 신호 기반 백테스트 엔진 (롱 단일 포지션)
//! - 경로 의존 낙폭 추적
//! - 결과 재생 컨트롤러 (주입 가능한 타이머)
//! - 기본 제공 신호 (지정 인덱스, SMA 교차, RSI 임계값)
//!
//! # Re-exports
//!
//! - [`backtest`]: 백테스트 엔진 (BacktestEngine, BacktestOutput 등)
//! - [`replay`]: 재생 컨트롤러 (ReplayController, ManualTimer, TokioTimer 등)
//! - [`signals`]: 신호 함수 (Signal, SignalSpec 등)

pub mod backtest;
pub mod replay;
pub mod signals;

// Backtest 모듈 re-exports
pub use backtest::{
    run_backtest, BacktestConfig, BacktestEngine, BacktestError, BacktestOutput, BacktestResult,
    DrawdownTracker,
};

// Replay 모듈 re-exports
pub use replay::{
    ManualTimer, ReplayCommand, ReplayController, ReplayError, ReplayEvent, ReplayEventKind,
    ReplayResult, ReplayState, ReplayTimer, TokioTimer,
};

// Signals 모듈 re-exports
pub use signals::{
    from_fn, try_from_fn, AtIndices, CrossDirection, Never, RsiThreshold, Signal, SignalError,
    SignalResult, SignalRole, SignalSpec, SmaCross,
};
