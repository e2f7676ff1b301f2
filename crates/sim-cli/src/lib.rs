//! 시뮬레이터 CLI 도구 모음.
//!
//! 이 crate는 다음 기능을 제공합니다:
//! - CSV 캔들 데이터 로더
//! - 전략 설정 파일 (TOML/JSON)
//! - 백테스트 CLI
//! - 터미널 재생

pub mod commands;
