//! # Sim Core
//!
//! 백테스트 시뮬레이터의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 시뮬레이션 전반에서 사용되는 기본 타입을 제공합니다:
//! - OHLCV 캔들 및 시계열 검증
//! - 거래(라운드트립) 기록
//! - 백테스트 통계 집계
//! - 자산 곡선 포인트
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
