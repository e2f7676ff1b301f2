//! 시뮬레이터의 에러 타입.
//!
//! 입력 데이터 에러와 설정 에러를 정의합니다. 전략 신호 실패는
//! 엔진 쪽(`sim_analytics::backtest::BacktestError`)에서 다룹니다.

use rust_decimal::Decimal;
use std::fmt;
use thiserror::Error;

/// 캔들 가격 필드.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceField {
    Open,
    High,
    Low,
    Close,
}

impl fmt::Display for PriceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PriceField::Open => "open",
            PriceField::High => "high",
            PriceField::Low => "low",
            PriceField::Close => "close",
        };
        f.write_str(name)
    }
}

/// 캔들 시계열 입력 에러.
///
/// 엔진은 이 에러를 만나면 실행을 중단하지 않고 빈 결과로 degrade 합니다.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    /// 캔들이 하나도 없음
    #[error("캔들 데이터가 비어있습니다")]
    EmptySeries,

    /// 시간 역행
    #[error("캔들 시간이 역행합니다 (index={index})")]
    NonMonotonicTime { index: usize },

    /// NaN / 무한대 가격
    #[error("유한하지 않은 가격입니다 (index={index}, field={field})")]
    NonFinitePrice { index: usize, field: PriceField },

    /// 0 이하 가격
    #[error("가격은 0보다 커야 합니다 (index={index}, field={field})")]
    NonPositivePrice { index: usize, field: PriceField },

    /// 고가 < 저가
    #[error("고가가 저가보다 낮습니다 (index={index})")]
    InvertedRange { index: usize },

    /// 표현할 수 없는 타임스탬프
    #[error("잘못된 타임스탬프입니다 (index={index}, value={value})")]
    InvalidTimestamp { index: usize, value: i64 },

    /// 가격 변동이 표현 가능한 수익률 범위를 벗어남
    #[error("수익률이 표현 가능한 범위를 벗어났습니다 (index={index})")]
    ReturnOutOfRange { index: usize },
}

impl InputError {
    /// 문제가 발견된 캔들 인덱스를 반환합니다.
    pub fn index(&self) -> Option<usize> {
        match self {
            InputError::EmptySeries => None,
            InputError::NonMonotonicTime { index }
            | InputError::NonFinitePrice { index, .. }
            | InputError::NonPositivePrice { index, .. }
            | InputError::InvertedRange { index }
            | InputError::InvalidTimestamp { index, .. }
            | InputError::ReturnOutOfRange { index } => Some(*index),
        }
    }
}

/// 설정 에러.
///
/// 잘못된 값은 보정하지 않고 명시적으로 거부합니다.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 허용 최대 낙폭 범위 위반
    #[error("허용 최대 낙폭은 (0, 1] 범위여야 합니다: {0}")]
    MaxDrawdownOutOfRange(Decimal),

    /// 재생 속도 위반
    #[error("재생 속도는 0보다 커야 합니다: {0}ms")]
    InvalidSpeed(u64),

    /// 신호 매개변수 오류
    #[error("신호 설정 오류: {0}")]
    InvalidSignal(String),

    /// 설정 로드 실패
    #[error("설정 로드 실패: {0}")]
    Load(#[from] config::ConfigError),
}

/// 설정 작업을 위한 Result 타입.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_input_error_index() {
        assert_eq!(InputError::EmptySeries.index(), None);
        assert_eq!(InputError::NonMonotonicTime { index: 3 }.index(), Some(3));
        assert_eq!(InputError::ReturnOutOfRange { index: 7 }.index(), Some(7));
    }

    #[test]
    fn test_error_messages() {
        let err = InputError::NonPositivePrice {
            index: 2,
            field: PriceField::Close,
        };
        assert!(err.to_string().contains("field=close"));

        let err = ConfigError::MaxDrawdownOutOfRange(dec!(1.5));
        assert!(err.to_string().contains("1.5"));
    }
}
