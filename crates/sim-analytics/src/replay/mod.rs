//! 재생 모듈
//!
//! 백테스트 결과를 캔들 단위로 재생합니다.
//!
//! # 주요 구성요소
//!
//! - [`ReplayController`]: 재생 상태 머신
//! - [`ReplayTimer`]: 주입 가능한 반복 타이머 ([`ManualTimer`], [`TokioTimer`])
//! - [`ReplayState`]: 렌더러용 상태 스냅샷
//! - `ReplayController<TokioTimer>::run`: 채널 기반 비동기 구동기

pub mod controller;
mod driver;
pub mod timer;

pub use controller::{
    ReplayCommand, ReplayController, ReplayError, ReplayEvent, ReplayEventKind, ReplayResult,
    ReplayState, MIN_SPEED_MS,
};
pub use timer::{ManualTimer, ReplayTimer, TokioTimer};
