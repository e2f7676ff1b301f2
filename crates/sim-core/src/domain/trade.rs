//! 백테스트 거래 기록.
//!
//! 이 모듈은 엔진이 생성하는 거래 관련 타입을 정의합니다:
//! - `Trade` - 진입부터 청산까지의 완료된 롱 거래
//! - `ExitReason` - 청산 사유
//! - `OpenPosition` - 데이터 종료 시점까지 청산되지 않은 포지션

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 단일 포지션 수익률 상한 (10^12, 즉 1조 배 상승).
///
/// 거래 수가 아무리 많아도 수익률 합계와 백분율 표시가 `Decimal` 범위를
/// 넘지 않도록 합니다. 하한은 가격이 양수이므로 항상 -1 입니다.
pub const MAX_RETURN_RATIO: Decimal = Decimal::from_parts(3_567_587_328, 232, 0, false, 0);

/// 진입가 대비 수익률을 계산합니다.
///
/// 진입가가 0 이하이거나, 계산이 넘치거나, 결과가 [`MAX_RETURN_RATIO`]를
/// 넘으면 `None`을 반환합니다.
pub fn return_ratio(entry_price: Decimal, price: Decimal) -> Option<Decimal> {
    if entry_price <= Decimal::ZERO {
        return None;
    }
    let ratio = price.checked_sub(entry_price)?.checked_div(entry_price)?;
    (ratio <= MAX_RETURN_RATIO).then_some(ratio)
}

/// 청산 사유.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// 청산 신호
    Signal,
    /// 허용 낙폭 초과로 인한 강제 청산
    StopOut,
}

/// 완료된 롱 거래.
///
/// 불변 조건: `exit_index > entry_index`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// 진입 캔들 인덱스
    pub entry_index: usize,
    /// 진입 시각
    #[serde(with = "chrono::serde::ts_seconds")]
    pub entry_time: DateTime<Utc>,
    /// 진입가 (진입 캔들 종가)
    pub entry_price: Decimal,
    /// 청산 캔들 인덱스
    pub exit_index: usize,
    /// 청산 시각
    #[serde(with = "chrono::serde::ts_seconds")]
    pub exit_time: DateTime<Utc>,
    /// 청산가 (청산 캔들 종가)
    pub exit_price: Decimal,
    /// 절대 손익 (단위 수량 기준)
    pub pnl: Decimal,
    /// 상대 손익 (예: 0.05 = 5%)
    pub pnl_percentage: Decimal,
    /// 청산 사유
    pub exit_reason: ExitReason,
}

impl Trade {
    /// 진입/청산 정보로 거래를 생성하고 손익을 계산합니다.
    ///
    /// 손익률을 표현할 수 없으면 `None`을 반환합니다 ([`return_ratio`] 참고).
    pub fn new(
        entry_index: usize,
        entry_time: DateTime<Utc>,
        entry_price: Decimal,
        exit_index: usize,
        exit_time: DateTime<Utc>,
        exit_price: Decimal,
        exit_reason: ExitReason,
    ) -> Option<Self> {
        Some(Self {
            entry_index,
            entry_time,
            entry_price,
            exit_index,
            exit_time,
            exit_price,
            pnl: exit_price.checked_sub(entry_price)?,
            pnl_percentage: return_ratio(entry_price, exit_price)?,
            exit_reason,
        })
    }

    /// 수익 거래인지 확인합니다.
    pub fn is_win(&self) -> bool {
        self.pnl > Decimal::ZERO
    }

    /// 강제 청산된 거래인지 확인합니다.
    pub fn is_stop_out(&self) -> bool {
        self.exit_reason == ExitReason::StopOut
    }

    /// 보유 캔들 수
    pub fn holding_bars(&self) -> usize {
        self.exit_index - self.entry_index
    }
}

/// 데이터 종료 시점까지 청산되지 않은 포지션.
///
/// 정보 제공용이며 거래 목록과 통계에는 포함되지 않습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenPosition {
    /// 진입 캔들 인덱스
    pub entry_index: usize,
    /// 진입 시각
    #[serde(with = "chrono::serde::ts_seconds")]
    pub entry_time: DateTime<Utc>,
    /// 진입가
    pub entry_price: Decimal,
    /// 마지막 캔들 종가
    pub last_price: Decimal,
    /// 미실현 상대 손익
    pub unrealized_pnl_percentage: Decimal,
}
