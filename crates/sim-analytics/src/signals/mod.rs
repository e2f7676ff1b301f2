//! 진입/청산 신호 함수.
//!
//! 신호는 `(캔들, 인덱스, 전체 시계열) -> bool` 형태의 순수 판단 함수입니다.
//! 엔진은 신호의 내부를 알지 못하며, 실패한 신호는 치명적 에러로 전파됩니다.
//!
//! # 주요 구성요소
//!
//! - [`Signal`]: 신호 trait
//! - [`from_fn`] / [`try_from_fn`]: 클로저 래퍼
//! - [`AtIndices`], [`Never`]: 단순 신호
//! - [`SmaCross`], [`RsiThreshold`]: 지표 기반 신호 (`ta` 크레이트)
//! - [`SignalSpec`]: 설정 파일용 신호 정의

mod indicators;

pub use indicators::{CrossDirection, RsiThreshold, SmaCross};

use serde::{Deserialize, Serialize};
use sim_core::{Candle, ConfigError, ConfigResult};
use std::collections::BTreeSet;
use std::fmt;

/// 신호 실패 타입
pub type SignalError = Box<dyn std::error::Error + Send + Sync>;

/// 신호 평가 결과 타입
pub type SignalResult = Result<bool, SignalError>;

/// 신호 역할.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalRole {
    /// 진입 신호
    Entry,
    /// 청산 신호
    Exit,
}

impl fmt::Display for SignalRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalRole::Entry => f.write_str("진입"),
            SignalRole::Exit => f.write_str("청산"),
        }
    }
}

/// 진입/청산 판단 함수.
pub trait Signal {
    /// 주어진 캔들에서 신호가 발생했는지 평가합니다.
    ///
    /// `series[index]`는 항상 `candle`과 같습니다.
    fn evaluate(&self, candle: &Candle, index: usize, series: &[Candle]) -> SignalResult;

    /// 시계열 전체의 평가 결과를 한 번에 계산합니다.
    ///
    /// 반환값의 `i`번째 원소는 `evaluate(&series[i], i, series)`와 같아야 합니다.
    /// 지표처럼 누적 계산이 필요한 신호는 이 메서드로 전체 실행을 O(N)으로 만들 수
    /// 있습니다. 기본 구현은 `None`이며, 이 경우 엔진은 캔들마다 `evaluate`를
    /// 호출합니다.
    fn precompute(&self, _series: &[Candle]) -> Option<Vec<bool>> {
        None
    }

    /// 신호 이름 (로그용)
    fn name(&self) -> &str {
        "custom"
    }
}

impl Signal for Box<dyn Signal> {
    fn evaluate(&self, candle: &Candle, index: usize, series: &[Candle]) -> SignalResult {
        (**self).evaluate(candle, index, series)
    }

    fn precompute(&self, series: &[Candle]) -> Option<Vec<bool>> {
        (**self).precompute(series)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// 실패하지 않는 `bool` 클로저 래퍼.
pub struct FnSignal<F>(F);

impl<F> Signal for FnSignal<F>
where
    F: Fn(&Candle, usize, &[Candle]) -> bool,
{
    fn evaluate(&self, candle: &Candle, index: usize, series: &[Candle]) -> SignalResult {
        Ok((self.0)(candle, index, series))
    }
}

/// `bool`을 반환하는 클로저로 신호를 만듭니다.
pub fn from_fn<F>(f: F) -> FnSignal<F>
where
    F: Fn(&Candle, usize, &[Candle]) -> bool,
{
    FnSignal(f)
}

/// 실패할 수 있는 클로저 래퍼.
pub struct TryFnSignal<F>(F);

impl<F> Signal for TryFnSignal<F>
where
    F: Fn(&Candle, usize, &[Candle]) -> SignalResult,
{
    fn evaluate(&self, candle: &Candle, index: usize, series: &[Candle]) -> SignalResult {
        (self.0)(candle, index, series)
    }
}

/// `SignalResult`를 반환하는 클로저로 신호를 만듭니다.
pub fn try_from_fn<F>(f: F) -> TryFnSignal<F>
where
    F: Fn(&Candle, usize, &[Candle]) -> SignalResult,
{
    TryFnSignal(f)
}

/// 지정된 인덱스에서만 발생하는 신호.
#[derive(Debug, Clone, Default)]
pub struct AtIndices {
    indices: BTreeSet<usize>,
}

impl AtIndices {
    pub fn new(indices: impl IntoIterator<Item = usize>) -> Self {
        Self {
            indices: indices.into_iter().collect(),
        }
    }
}

impl Signal for AtIndices {
    fn evaluate(&self, _candle: &Candle, index: usize, _series: &[Candle]) -> SignalResult {
        Ok(self.indices.contains(&index))
    }

    fn name(&self) -> &str {
        "at_indices"
    }
}

/// 절대 발생하지 않는 신호.
#[derive(Debug, Clone, Copy, Default)]
pub struct Never;

impl Signal for Never {
    fn evaluate(&self, _candle: &Candle, _index: usize, _series: &[Candle]) -> SignalResult {
        Ok(false)
    }

    fn name(&self) -> &str {
        "never"
    }
}

/// 설정 파일용 신호 정의.
///
/// ```toml
/// [entry]
/// type = "sma_cross"
/// fast = 5
/// slow = 20
/// direction = "above"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalSpec {
    /// 지정 인덱스
    AtIndices { indices: Vec<usize> },
    /// 단기/장기 SMA 교차
    SmaCross {
        fast: usize,
        slow: usize,
        #[serde(default)]
        direction: CrossDirection,
    },
    /// RSI 임계값 교차
    Rsi {
        period: usize,
        level: f64,
        #[serde(default)]
        direction: CrossDirection,
    },
    /// 발생하지 않음
    Never,
}

impl SignalSpec {
    /// 정의로부터 신호를 생성합니다.
    pub fn build(&self) -> ConfigResult<Box<dyn Signal>> {
        let signal: Box<dyn Signal> = match self {
            SignalSpec::AtIndices { indices } => {
                if indices.is_empty() {
                    return Err(ConfigError::InvalidSignal(
                        "at_indices에는 최소 하나의 인덱스가 필요합니다".to_string(),
                    ));
                }
                Box::new(AtIndices::new(indices.iter().copied()))
            }
            SignalSpec::SmaCross {
                fast,
                slow,
                direction,
            } => Box::new(SmaCross::new(*fast, *slow, *direction)?),
            SignalSpec::Rsi {
                period,
                level,
                direction,
            } => Box::new(RsiThreshold::new(*period, *level, *direction)?),
            SignalSpec::Never => Box::new(Never),
        };
        Ok(signal)
    }
}
