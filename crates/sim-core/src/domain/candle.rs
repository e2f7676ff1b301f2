//! OHLCV 캔들 및 캔들 시계열 검증.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{InputError, PriceField};

/// OHLCV 캔들스틱 데이터.
///
/// 시계열로 공급된 뒤에는 변경되지 않습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// 캔들 시간 (unix 초 단위로 직렬화)
    #[serde(with = "chrono::serde::ts_seconds")]
    pub time: DateTime<Utc>,
    /// 시가
    pub open: Decimal,
    /// 고가
    pub high: Decimal,
    /// 저가
    pub low: Decimal,
    /// 종가
    pub close: Decimal,
    /// 거래량
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<Decimal>,
}

impl Candle {
    /// 새 캔들을 생성합니다.
    pub fn new(
        time: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
    ) -> Self {
        Self {
            time,
            open,
            high,
            low,
            close,
            volume: None,
        }
    }

    /// 거래량을 설정합니다.
    pub fn with_volume(mut self, volume: Decimal) -> Self {
        self.volume = Some(volume);
        self
    }

    fn prices(&self) -> [(PriceField, Decimal); 4] {
        [
            (PriceField::Open, self.open),
            (PriceField::High, self.high),
            (PriceField::Low, self.low),
            (PriceField::Close, self.close),
        ]
    }
}

/// `f64` 원시 행 `(unix 초, open, high, low, close)`을 캔들 시계열로 변환합니다.
///
/// NaN/무한대 가격이나 표현할 수 없는 타임스탬프는 [`InputError`]로 거부됩니다.
pub fn candles_from_f64(rows: &[(i64, f64, f64, f64, f64)]) -> Result<Vec<Candle>, InputError> {
    rows.iter()
        .enumerate()
        .map(|(index, &(ts, open, high, low, close))| {
            let time = DateTime::from_timestamp(ts, 0)
                .ok_or(InputError::InvalidTimestamp { index, value: ts })?;
            let price = |field: PriceField, value: f64| {
                if !value.is_finite() {
                    return Err(InputError::NonFinitePrice { index, field });
                }
                Decimal::from_f64(value).ok_or(InputError::NonFinitePrice { index, field })
            };

            Ok(Candle::new(
                time,
                price(PriceField::Open, open)?,
                price(PriceField::High, high)?,
                price(PriceField::Low, low)?,
                price(PriceField::Close, close)?,
            ))
        })
        .collect()
}

/// 캔들 시계열이 시뮬레이션에 사용 가능한지 검증합니다.
///
/// - 비어있지 않아야 함
/// - 모든 가격이 0보다 커야 함
/// - 고가 ≥ 저가
/// - 시간이 감소하지 않아야 함
pub fn validate_series(candles: &[Candle]) -> Result<(), InputError> {
    if candles.is_empty() {
        return Err(InputError::EmptySeries);
    }

    for (index, candle) in candles.iter().enumerate() {
        for (field, value) in candle.prices() {
            if value <= Decimal::ZERO {
                return Err(InputError::NonPositivePrice { index, field });
            }
        }
        if candle.high < candle.low {
            return Err(InputError::InvertedRange { index });
        }
        if index > 0 && candle.time < candles[index - 1].time {
            return Err(InputError::NonMonotonicTime { index });
        }
    }

    Ok(())
}
