//! 지표 기반 신호.
//!
//! - SMA 교차 (`ta::indicators::SimpleMovingAverage`)
//! - RSI 임계값 교차 (`ta::indicators::RelativeStrengthIndex`)
//!
//! 신호는 상태를 갖지 않습니다. `evaluate`는 `series[..=index]` 종가로 지표를
//! 다시 계산하고, `precompute`는 시계열 전체를 한 번 순회해 같은 결과를
//! 인덱스별로 돌려줍니다. 엔진은 `precompute`를 사용하므로 전체 실행은 O(N)입니다.
//! 교차 판정에 직전 값이 필요하므로 인덱스 0에서는 발생하지 않습니다.

use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use sim_core::{Candle, ConfigError, ConfigResult};
use ta::indicators::{RelativeStrengthIndex, SimpleMovingAverage};
use ta::Next;

use super::{Signal, SignalError, SignalResult};

/// 교차 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossDirection {
    /// 아래에서 위로 돌파
    #[default]
    Above,
    /// 위에서 아래로 이탈
    Below,
}

impl CrossDirection {
    /// `(prev_a, prev_b)` → `(a, b)` 변화가 이 방향의 교차인지 확인합니다.
    fn crossed(self, prev_a: f64, prev_b: f64, a: f64, b: f64) -> bool {
        match self {
            CrossDirection::Above => prev_a <= prev_b && a > b,
            CrossDirection::Below => prev_a >= prev_b && a < b,
        }
    }
}

/// 시계열 앞부분(`..=index`) 종가를 f64로 변환합니다.
fn closes(series: &[Candle], index: usize) -> Result<Vec<f64>, SignalError> {
    series[..=index]
        .iter()
        .enumerate()
        .map(|(i, c)| {
            c.close
                .to_f64()
                .ok_or_else(|| format!("종가를 f64로 변환할 수 없습니다 (index={})", i).into())
        })
        .collect()
}

/// 시계열 전체 종가를 f64로 변환합니다. 변환할 수 없는 값이 있으면 `None`.
fn all_closes(series: &[Candle]) -> Option<Vec<f64>> {
    series.iter().map(|c| c.close.to_f64()).collect()
}

/// 지표에 값을 순서대로 넣고 모든 출력을 반환합니다.
fn outputs<I>(mut indicator: I, values: &[f64]) -> Vec<f64>
where
    I: Next<f64, Output = f64>,
{
    values.iter().map(|&value| indicator.next(value)).collect()
}

/// 지표에 값을 순서대로 넣고 마지막 두 출력을 반환합니다.
fn last_two<I>(mut indicator: I, values: &[f64]) -> Option<(f64, f64)>
where
    I: Next<f64, Output = f64>,
{
    let mut prev = None;
    let mut last = None;
    for &value in values {
        prev = last;
        last = Some(indicator.next(value));
    }
    prev.zip(last)
}

/// 단기/장기 단순이동평균 교차 신호.
#[derive(Debug, Clone)]
pub struct SmaCross {
    fast: usize,
    slow: usize,
    direction: CrossDirection,
}

impl SmaCross {
    /// 새 SMA 교차 신호를 생성합니다.
    ///
    /// `0 < fast < slow` 이어야 합니다.
    pub fn new(fast: usize, slow: usize, direction: CrossDirection) -> ConfigResult<Self> {
        if fast == 0 || fast >= slow {
            return Err(ConfigError::InvalidSignal(format!(
                "SMA 기간은 0 < fast < slow 이어야 합니다 (fast={}, slow={})",
                fast, slow
            )));
        }
        Ok(Self {
            fast,
            slow,
            direction,
        })
    }

    fn sma(period: usize) -> Result<SimpleMovingAverage, SignalError> {
        SimpleMovingAverage::new(period)
            .map_err(|_| format!("SMA 생성 실패 (period={})", period).into())
    }
}

impl Signal for SmaCross {
    fn evaluate(&self, _candle: &Candle, index: usize, series: &[Candle]) -> SignalResult {
        // 장기 SMA가 직전 캔들에서도 완성되어 있어야 교차를 판단할 수 있음
        if index < self.slow {
            return Ok(false);
        }

        let values = closes(series, index)?;
        let fast = last_two(Self::sma(self.fast)?, &values);
        let slow = last_two(Self::sma(self.slow)?, &values);

        Ok(match (fast, slow) {
            (Some((prev_fast, fast)), Some((prev_slow, slow))) => {
                self.direction.crossed(prev_fast, prev_slow, fast, slow)
            }
            _ => false,
        })
    }

    fn precompute(&self, series: &[Candle]) -> Option<Vec<bool>> {
        let values = all_closes(series)?;
        let fast = outputs(Self::sma(self.fast).ok()?, &values);
        let slow = outputs(Self::sma(self.slow).ok()?, &values);

        // slow ≥ 2 이므로 i ≥ slow 이면 i - 1 은 유효
        Some(
            (0..values.len())
                .map(|i| {
                    i >= self.slow
                        && self.direction.crossed(fast[i - 1], slow[i - 1], fast[i], slow[i])
                })
                .collect(),
        )
    }

    fn name(&self) -> &str {
        "sma_cross"
    }
}

/// RSI 임계값 교차 신호.
///
/// `Above`: RSI가 `level`을 상향 돌파, `Below`: 하향 이탈.
#[derive(Debug, Clone)]
pub struct RsiThreshold {
    period: usize,
    level: f64,
    direction: CrossDirection,
}

impl RsiThreshold {
    /// 새 RSI 신호를 생성합니다.
    ///
    /// `period > 0`, `0 < level < 100` 이어야 합니다.
    pub fn new(period: usize, level: f64, direction: CrossDirection) -> ConfigResult<Self> {
        if period == 0 {
            return Err(ConfigError::InvalidSignal(
                "RSI 기간은 0보다 커야 합니다".to_string(),
            ));
        }
        if !level.is_finite() || level <= 0.0 || level >= 100.0 {
            return Err(ConfigError::InvalidSignal(format!(
                "RSI 레벨은 0 ~ 100 사이여야 합니다: {}",
                level
            )));
        }
        Ok(Self {
            period,
            level,
            direction,
        })
    }
}

impl Signal for RsiThreshold {
    fn evaluate(&self, _candle: &Candle, index: usize, series: &[Candle]) -> SignalResult {
        if index < self.period {
            return Ok(false);
        }

        let rsi = RelativeStrengthIndex::new(self.period)
            .map_err(|_| format!("RSI 생성 실패 (period={})", self.period))?;
        let values = closes(series, index)?;

        Ok(match last_two(rsi, &values) {
            Some((prev, current)) => self.direction.crossed(prev, self.level, current, self.level),
            None => false,
        })
    }

    fn precompute(&self, series: &[Candle]) -> Option<Vec<bool>> {
        let values = all_closes(series)?;
        let rsi = outputs(RelativeStrengthIndex::new(self.period).ok()?, &values);

        Some(
            (0..values.len())
                .map(|i| {
                    i >= self.period
                        && self.direction.crossed(rsi[i - 1], self.level, rsi[i], self.level)
                })
                .collect(),
        )
    }

    fn name(&self) -> &str {
        "rsi"
    }
}
