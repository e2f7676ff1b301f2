//! 경로 의존 낙폭 추적.
//!
//! 자산은 초기값 1을 기준으로 한 단위 자산입니다:
//! `equity = 1 + Σ(청산된 거래 수익률) + 보유 중 수익률`.
//! 고점은 전체 실행에 걸쳐 단조 증가하며, 낙폭은 매 캔들마다 샘플링됩니다.

use rust_decimal::Decimal;

/// 자산 고점과 최대 낙폭을 추적합니다.
#[derive(Debug, Clone)]
pub struct DrawdownTracker {
    /// 청산된 거래 수익률 합계
    realized: Decimal,
    /// 고점 자산
    peak: Decimal,
    /// 실행 중 최대 낙폭
    max_drawdown: Decimal,
}

impl Default for DrawdownTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl DrawdownTracker {
    /// 초기 자산 1로 트래커를 생성합니다.
    pub fn new() -> Self {
        Self {
            realized: Decimal::ZERO,
            peak: Decimal::ONE,
            max_drawdown: Decimal::ZERO,
        }
    }

    /// 현재 캔들의 자산과 낙폭을 샘플링합니다.
    ///
    /// `open_return`은 보유 중 포지션의 수익률이며, 플랫 상태에서는 0입니다.
    /// 자산은 0 아래로 내려가지 않으므로 낙폭은 항상 `[0, 1]` 범위입니다.
    ///
    /// 자산이 `Decimal` 범위를 넘으면 `None`을 반환하고 상태를 바꾸지 않습니다.
    pub fn sample(&mut self, open_return: Decimal) -> Option<(Decimal, Decimal)> {
        let equity = Decimal::ONE
            .checked_add(self.realized)?
            .checked_add(open_return)?
            .max(Decimal::ZERO);
        let peak = self.peak.max(equity);

        // peak ≥ 1, 0 ≤ equity ≤ peak
        let drawdown = (peak - equity).checked_div(peak)?;

        self.peak = peak;
        self.max_drawdown = self.max_drawdown.max(drawdown);
        Some((equity, drawdown))
    }

    /// 청산된 거래 수익률을 누적합니다. 합계가 넘치면 `None`을 반환합니다.
    pub fn realize(&mut self, pnl_percentage: Decimal) -> Option<Decimal> {
        self.realized = self.realized.checked_add(pnl_percentage)?;
        Some(self.realized)
    }

    /// 최대 낙폭
    pub fn max_drawdown(&self) -> Decimal {
        self.max_drawdown
    }
}
