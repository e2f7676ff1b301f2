//! 백테스트 통계 집계.
//!
//! 거래 목록과 엔진의 낙폭 추적값으로부터 요약 통계를 계산합니다.
//! 통계는 항상 거래 목록에서 파생되며 독립적으로 변경되지 않습니다.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::trade::Trade;

/// 백테스트 요약 통계.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestStats {
    /// 총 거래 횟수
    pub total_trades: usize,
    /// 수익 거래 횟수 (pnl > 0)
    pub winning_trades: usize,
    /// 비수익 거래 횟수 (pnl ≤ 0)
    pub losing_trades: usize,
    /// 승률 (0 ~ 1)
    pub win_rate: Decimal,
    /// 수익 거래 평균 수익률
    pub avg_win: Decimal,
    /// 비수익 거래 평균 수익률 (≤ 0)
    pub avg_loss: Decimal,
    /// 최대 수익 거래 수익률
    pub largest_win: Decimal,
    /// 최대 손실 거래 수익률 (≤ 0)
    pub largest_loss: Decimal,
    /// 최대 낙폭 (0 ~ 1, 엔진의 경로 의존 추적값)
    pub max_drawdown: Decimal,
    /// 총 수익률 (거래별 수익률의 단순 합)
    pub total_return: Decimal,
    /// 강제 청산 횟수
    pub stop_outs: usize,
}

impl Default for BacktestStats {
    fn default() -> Self {
        Self {
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            win_rate: Decimal::ZERO,
            avg_win: Decimal::ZERO,
            avg_loss: Decimal::ZERO,
            largest_win: Decimal::ZERO,
            largest_loss: Decimal::ZERO,
            max_drawdown: Decimal::ZERO,
            total_return: Decimal::ZERO,
            stop_outs: 0,
        }
    }
}

impl BacktestStats {
    /// 거래 목록과 엔진 최대 낙폭으로부터 통계를 계산합니다.
    ///
    /// `max_drawdown`은 재계산하지 않고 그대로 전달됩니다. 청산된 거래만으로는
    /// 강제 청산을 유발한 보유 중 낙폭을 알 수 없기 때문입니다.
    ///
    /// `total_return`은 복리가 아닌 단순 합산입니다.
    pub fn compute(trades: &[Trade], max_drawdown: Decimal) -> Self {
        if trades.is_empty() {
            return Self {
                max_drawdown,
                ..Self::default()
            };
        }

        let (wins, losses): (Vec<&Trade>, Vec<&Trade>) = trades.iter().partition(|t| t.is_win());

        let total_trades = trades.len();
        let win_rate = Decimal::from(wins.len()) / Decimal::from(total_trades);

        Self {
            total_trades,
            winning_trades: wins.len(),
            losing_trades: losses.len(),
            win_rate,
            avg_win: mean_return(&wins),
            avg_loss: mean_return(&losses),
            largest_win: wins
                .iter()
                .map(|t| t.pnl_percentage)
                .max()
                .unwrap_or(Decimal::ZERO),
            largest_loss: losses
                .iter()
                .map(|t| t.pnl_percentage)
                .min()
                .unwrap_or(Decimal::ZERO),
            max_drawdown,
            total_return: trades.iter().map(|t| t.pnl_percentage).sum(),
            stop_outs: trades.iter().filter(|t| t.is_stop_out()).count(),
        }
    }

    /// 거래가 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.total_trades == 0
    }

    /// 요약 문자열 반환
    pub fn summary(&self) -> String {
        let hundred = Decimal::ONE_HUNDRED;
        format!(
            "백테스트 통계\n\
             ═══════════════════════════════════════\n\
             총 거래: {} (수익 {} / 손실 {})\n\
             승률: {:.1}%\n\
             평균 수익: {:.2}%\n\
             평균 손실: {:.2}%\n\
             최대 수익: {:.2}%\n\
             최대 손실: {:.2}%\n\
             ───────────────────────────────────────\n\
             총 수익률: {:.2}%\n\
             최대 낙폭: {:.2}%\n\
             강제 청산: {}\n\
             ═══════════════════════════════════════",
            self.total_trades,
            self.winning_trades,
            self.losing_trades,
            self.win_rate * hundred,
            self.avg_win * hundred,
            self.avg_loss * hundred,
            self.largest_win * hundred,
            self.largest_loss * hundred,
            self.total_return * hundred,
            self.max_drawdown * hundred,
            self.stop_outs,
        )
    }
}

fn mean_return(trades: &[&Trade]) -> Decimal {
    if trades.is_empty() {
        return Decimal::ZERO;
    }
    let sum: Decimal = trades.iter().map(|t| t.pnl_percentage).sum();
    sum / Decimal::from(trades.len())
}
