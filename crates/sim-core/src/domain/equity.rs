//! 자산 곡선 포인트.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 캔들 한 개 시점의 자산 상태.
///
/// 자산은 초기값 1을 기준으로 한 상대값입니다:
/// `1 + Σ(청산된 거래 수익률) + 보유 중 수익률`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    /// 캔들 인덱스
    pub index: usize,
    /// 캔들 시각
    #[serde(with = "chrono::serde::ts_seconds")]
    pub time: DateTime<Utc>,
    /// 상대 자산
    pub equity: Decimal,
    /// 고점 대비 낙폭 (0 ~ 1)
    pub drawdown: Decimal,
    /// 이 시점에 포지션 보유 여부
    pub in_position: bool,
}
