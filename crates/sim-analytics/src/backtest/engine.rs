//! 백테스팅 엔진
//!
//! 캔들 시계열을 한 번 순회하며 진입/청산 신호로 롱 단일 포지션을 시뮬레이션합니다.
//!
//! # 동작 방식
//!
//! - 포지션 상태는 `Flat` / `Long` 두 가지입니다
//! - 인덱스 0은 기준점으로만 사용되며, 순회는 인덱스 1부터 시작합니다
//! - 진입과 청산은 모두 해당 캔들의 종가로 체결됩니다
//! - 보유 중에는 매 캔들마다 자산과 낙폭을 샘플링하고, 청산 신호가 없더라도
//!   낙폭이 허용치 이상이면 강제 청산합니다
//! - 데이터 종료 시점의 미청산 포지션은 거래로 기록하지 않습니다
//!
//! # 사용 예시
//!
//! ```rust,ignore
//! use sim_analytics::backtest::{BacktestConfig, BacktestEngine};
//! use sim_analytics::signals::{AtIndices, SmaCross, CrossDirection};
//! use rust_decimal_macros::dec;
//!
//! let engine = BacktestEngine::new(BacktestConfig::new(dec!(0.1)));
//! let entry = SmaCross::new(5, 20, CrossDirection::Above)?;
//! let exit = SmaCross::new(5, 20, CrossDirection::Below)?;
//!
//! let output = engine.run(&candles, &entry, &exit)?;
//! println!("{}", output.stats.summary());
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sim_core::{
    backtest_span, return_ratio, validate_series, validate_max_drawdown, BacktestSettings,
    BacktestStats, Candle, ConfigError, EquityPoint, ExitReason, InputError, OpenPosition, Trade,
    DEFAULT_MAX_DRAWDOWN_ALLOWED,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::backtest::equity::DrawdownTracker;
use crate::signals::{Signal, SignalError, SignalRole};

/// 백테스트 오류
#[derive(Debug, Error)]
pub enum BacktestError {
    /// 설정 오류
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// 신호 평가 실패 (치명적, 재시도하지 않음)
    #[error("{role} 신호 평가 실패 (index={index}): {source}")]
    Predicate {
        role: SignalRole,
        index: usize,
        #[source]
        source: SignalError,
    },
}

/// 백테스트 결과 타입
pub type BacktestResult<T> = Result<T, BacktestError>;

/// 백테스트 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// 허용 최대 낙폭 (0, 1]. 1이면 사실상 강제 청산 비활성
    #[serde(default = "default_max_drawdown_allowed")]
    pub max_drawdown_allowed: Decimal,
}

fn default_max_drawdown_allowed() -> Decimal {
    DEFAULT_MAX_DRAWDOWN_ALLOWED
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            max_drawdown_allowed: default_max_drawdown_allowed(),
        }
    }
}

impl BacktestConfig {
    /// 새로운 설정을 생성합니다.
    pub fn new(max_drawdown_allowed: Decimal) -> Self {
        Self {
            max_drawdown_allowed,
        }
    }

    /// 설정 검증. 범위를 벗어난 값은 보정하지 않고 거부합니다.
    pub fn validate(&self) -> BacktestResult<()> {
        validate_max_drawdown(self.max_drawdown_allowed)?;
        Ok(())
    }
}

impl From<&BacktestSettings> for BacktestConfig {
    fn from(settings: &BacktestSettings) -> Self {
        Self::new(settings.max_drawdown_allowed)
    }
}

/// 백테스트 실행 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestOutput {
    /// 완료된 거래 (시간순, 겹치지 않음)
    pub trades: Vec<Trade>,

    /// 요약 통계
    pub stats: BacktestStats,

    /// 캔들별 자산 곡선 (인덱스 0은 자산 1의 기준점)
    pub equity_curve: Vec<EquityPoint>,

    /// 데이터 종료 시점까지 청산되지 않은 포지션 (통계에 포함되지 않음)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_position: Option<OpenPosition>,

    /// 데이터 포인트 수
    pub data_points: usize,

    /// 입력 검증 실패로 빈 결과가 반환된 경우 그 원인
    #[serde(skip)]
    pub input_error: Option<InputError>,
}

impl BacktestOutput {
    /// 입력 오류로 인한 빈 결과
    fn degraded(data_points: usize, error: InputError) -> Self {
        match error {
            InputError::EmptySeries => debug!("빈 캔들 데이터, 빈 결과 반환"),
            _ => warn!(error = %error, index = ?error.index(), "입력 데이터 오류, 빈 결과 반환"),
        }
        Self {
            trades: Vec::new(),
            stats: BacktestStats::default(),
            equity_curve: Vec::new(),
            open_position: None,
            data_points,
            input_error: Some(error),
        }
    }

    /// 입력 오류로 결과가 비었는지 확인합니다.
    pub fn is_degraded(&self) -> bool {
        self.input_error.is_some()
    }
}

/// 보유 중인 롱 포지션
#[derive(Debug, Clone, Copy)]
struct LongPosition {
    entry_index: usize,
    entry_time: DateTime<Utc>,
    entry_price: Decimal,
}

/// 포지션 상태
#[derive(Debug, Clone, Copy)]
enum PositionState {
    Flat,
    Long(LongPosition),
}

/// 한 실행 동안의 신호 평가기.
///
/// 신호가 시계열 전체 결과를 미리 계산할 수 있으면 그 결과를 사용하고,
/// 그렇지 않으면 캔들마다 `evaluate`를 호출합니다.
struct SignalEvaluator<'a> {
    signal: &'a dyn Signal,
    role: SignalRole,
    precomputed: Option<Vec<bool>>,
}

impl<'a> SignalEvaluator<'a> {
    fn new(signal: &'a dyn Signal, role: SignalRole, candles: &[Candle]) -> Self {
        let precomputed = signal
            .precompute(candles)
            .filter(|fired| fired.len() == candles.len());
        debug!(
            %role,
            signal = signal.name(),
            precomputed = precomputed.is_some(),
            "신호 준비"
        );
        Self {
            signal,
            role,
            precomputed,
        }
    }

    /// 신호를 평가하고 실패를 치명적 에러로 변환합니다.
    fn fired(&self, candle: &Candle, index: usize, candles: &[Candle]) -> BacktestResult<bool> {
        if let Some(&fired) = self.precomputed.as_ref().and_then(|f| f.get(index)) {
            return Ok(fired);
        }
        self.signal
            .evaluate(candle, index, candles)
            .map_err(|source| BacktestError::Predicate {
                role: self.role,
                index,
                source,
            })
    }
}

/// 백테스트 엔진
///
/// 실행 간 상태를 갖지 않으므로 같은 입력에 대해 항상 같은 결과를 반환합니다.
#[derive(Debug, Clone, Default)]
pub struct BacktestEngine {
    config: BacktestConfig,
}

impl BacktestEngine {
    /// 새로운 백테스트 엔진을 생성합니다.
    pub fn new(config: BacktestConfig) -> Self {
        Self { config }
    }

    /// 엔진 설정
    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// 캔들 데이터로 백테스트를 실행합니다.
    ///
    /// # 매개변수
    ///
    /// * `candles` - 과거 캔들 데이터 (시간순 정렬 필수)
    /// * `entry` - 진입 신호 (플랫 상태에서만 평가)
    /// * `exit` - 청산 신호 (보유 중에만 평가)
    ///
    /// # 반환값
    ///
    /// 입력 데이터가 잘못된 경우 에러 대신 빈 결과를 반환합니다. 검증을 통과한
    /// 시계열이라도 수익률이 표현 가능한 범위를 벗어나면
    /// [`InputError::ReturnOutOfRange`]로 같은 처리를 합니다.
    /// 설정 오류와 신호 평가 실패는 에러로 전파됩니다.
    pub fn run(
        &self,
        candles: &[Candle],
        entry: &dyn Signal,
        exit: &dyn Signal,
    ) -> BacktestResult<BacktestOutput> {
        // 설정 검증
        self.config.validate()?;

        if let Err(err) = validate_series(candles) {
            return Ok(BacktestOutput::degraded(candles.len(), err));
        }

        let span = backtest_span!(
            "backtest_run",
            candles.len(),
            self.config.max_drawdown_allowed
        );
        let _enter = span.enter();

        let entry = SignalEvaluator::new(entry, SignalRole::Entry, candles);
        let exit = SignalEvaluator::new(exit, SignalRole::Exit, candles);
        let out_of_range = |index: usize| -> BacktestResult<BacktestOutput> {
            let err = InputError::ReturnOutOfRange { index };
            Ok(BacktestOutput::degraded(candles.len(), err))
        };

        let max_drawdown_allowed = self.config.max_drawdown_allowed;
        let mut tracker = DrawdownTracker::new();
        let mut state = PositionState::Flat;
        let mut trades: Vec<Trade> = Vec::new();
        let mut equity_curve = Vec::with_capacity(candles.len());

        // 인덱스 0은 기준점
        equity_curve.push(EquityPoint {
            index: 0,
            time: candles[0].time,
            equity: Decimal::ONE,
            drawdown: Decimal::ZERO,
            in_position: false,
        });

        for (index, candle) in candles.iter().enumerate().skip(1) {
            let (equity, drawdown) = match state {
                PositionState::Flat => {
                    if entry.fired(candle, index, candles)? {
                        debug!(index, price = %candle.close, signal = entry.signal.name(), "포지션 진입");
                        state = PositionState::Long(LongPosition {
                            entry_index: index,
                            entry_time: candle.time,
                            entry_price: candle.close,
                        });
                    }
                    // 진입 캔들의 보유 수익률은 0
                    let Some(sample) = tracker.sample(Decimal::ZERO) else {
                        return out_of_range(index);
                    };
                    sample
                }
                PositionState::Long(position) => {
                    let Some((equity, drawdown)) = return_ratio(position.entry_price, candle.close)
                        .and_then(|open_return| tracker.sample(open_return))
                    else {
                        return out_of_range(index);
                    };

                    let exit_reason = if exit.fired(candle, index, candles)? {
                        Some(ExitReason::Signal)
                    } else if drawdown >= max_drawdown_allowed {
                        Some(ExitReason::StopOut)
                    } else {
                        None
                    };

                    if let Some(reason) = exit_reason {
                        let Some(trade) = Trade::new(
                            position.entry_index,
                            position.entry_time,
                            position.entry_price,
                            index,
                            candle.time,
                            candle.close,
                            reason,
                        ) else {
                            return out_of_range(index);
                        };
                        debug!(
                            index,
                            price = %candle.close,
                            pnl = %trade.pnl,
                            reason = ?reason,
                            drawdown = %drawdown,
                            "포지션 청산"
                        );
                        if tracker.realize(trade.pnl_percentage).is_none() {
                            return out_of_range(index);
                        }
                        trades.push(trade);
                        state = PositionState::Flat;
                    }

                    (equity, drawdown)
                }
            };

            equity_curve.push(EquityPoint {
                index,
                time: candle.time,
                equity,
                drawdown,
                in_position: matches!(state, PositionState::Long(_)),
            });
        }

        let open_position = match state {
            PositionState::Long(position) => {
                // 마지막 캔들은 validate_series에서 존재가 보장됨
                let last_index = candles.len() - 1;
                let last = &candles[last_index];
                let Some(unrealized) = return_ratio(position.entry_price, last.close) else {
                    return out_of_range(last_index);
                };
                warn!(
                    entry_index = position.entry_index,
                    unrealized_pnl_percentage = %unrealized,
                    "데이터 종료 시점에 미청산 포지션이 있습니다 (거래로 기록하지 않음)"
                );
                Some(OpenPosition {
                    entry_index: position.entry_index,
                    entry_time: position.entry_time,
                    entry_price: position.entry_price,
                    last_price: last.close,
                    unrealized_pnl_percentage: unrealized,
                })
            }
            PositionState::Flat => None,
        };

        let stats = BacktestStats::compute(&trades, tracker.max_drawdown());

        info!(
            trades = stats.total_trades,
            win_rate = %stats.win_rate,
            total_return = %stats.total_return,
            max_drawdown = %stats.max_drawdown,
            stop_outs = stats.stop_outs,
            "백테스트 완료"
        );

        Ok(BacktestOutput {
            trades,
            stats,
            equity_curve,
            open_position,
            data_points: candles.len(),
            input_error: None,
        })
    }
}

/// 기본 엔진으로 백테스트를 실행합니다.
///
/// `max_drawdown_allowed`가 `None`이면 기본값 1.0을 사용합니다.
pub fn run_backtest(
    candles: &[Candle],
    entry: &dyn Signal,
    exit: &dyn Signal,
    max_drawdown_allowed: Option<Decimal>,
) -> BacktestResult<BacktestOutput> {
    let config = max_drawdown_allowed
        .map(BacktestConfig::new)
        .unwrap_or_default();
    BacktestEngine::new(config).run(candles, entry, exit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::{from_fn, try_from_fn, AtIndices, Never};
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn create_candles(closes: &[Decimal]) -> Vec<Candle> {
        let base = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                Candle::new(base + Duration::days(i as i64), close, close, close, close)
            })
            .collect()
    }

    #[test]
    fn test_default_config() {
        let config = BacktestConfig::default();
        assert_eq!(config.max_drawdown_allowed, dec!(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        assert!(BacktestConfig::new(dec!(0)).validate().is_err());
        assert!(BacktestConfig::new(dec!(1.5)).validate().is_err());
        assert!(BacktestConfig::new(dec!(0.05)).validate().is_ok());
    }

    #[test]
    fn test_single_trade_by_signal() {
        let candles = create_candles(&[dec!(100), dec!(105), dec!(103), dec!(108), dec!(102)]);
        let output = run_backtest(&candles, &AtIndices::new([1]), &AtIndices::new([3]), None)
            .unwrap();

        assert_eq!(output.trades.len(), 1);
        let trade = &output.trades[0];
        assert_eq!(trade.entry_index, 1);
        assert_eq!(trade.exit_index, 3);
        assert_eq!(trade.entry_price, dec!(105));
        assert_eq!(trade.exit_price, dec!(108));
        assert_eq!(trade.pnl, dec!(3));
        assert_eq!(trade.exit_reason, ExitReason::Signal);
        assert!((trade.pnl_percentage - dec!(0.0286)).abs() < dec!(0.0001));

        assert_eq!(output.stats.total_trades, 1);
        assert_eq!(output.stats.win_rate, dec!(1));
        assert!((output.stats.max_drawdown - dec!(2) / dec!(105)).abs() < dec!(0.000001));
        assert!(output.open_position.is_none());
        assert_eq!(output.equity_curve.len(), candles.len());
    }

    #[test]
    fn test_stop_out() {
        let candles = create_candles(&[dec!(100), dec!(100), dec!(97), dec!(90), dec!(95)]);
        let output = run_backtest(&candles, &AtIndices::new([1]), &Never, Some(dec!(0.05)))
            .unwrap();

        assert_eq!(output.trades.len(), 1);
        let trade = &output.trades[0];
        assert_eq!(trade.exit_index, 3);
        assert_eq!(trade.pnl, dec!(-10));
        assert_eq!(trade.exit_reason, ExitReason::StopOut);
        assert_eq!(output.stats.stop_outs, 1);
        assert_eq!(output.stats.max_drawdown, dec!(0.1));
    }

    #[test]
    fn test_exit_signal_takes_precedence_over_stop_out() {
        let candles = create_candles(&[dec!(100), dec!(100), dec!(80)]);
        let output = run_backtest(
            &candles,
            &AtIndices::new([1]),
            &AtIndices::new([2]),
            Some(dec!(0.05)),
        )
        .unwrap();

        assert_eq!(output.trades[0].exit_reason, ExitReason::Signal);
    }

    #[test]
    fn test_never_entry() {
        let candles = create_candles(&[dec!(100), dec!(101), dec!(99), dec!(102)]);
        let output = run_backtest(&candles, &Never, &Never, None).unwrap();

        assert!(output.trades.is_empty());
        assert_eq!(output.stats, BacktestStats::default());
        assert!(!output.is_degraded());
        assert!(output.equity_curve.iter().all(|p| p.equity == dec!(1)));
    }

    #[test]
    fn test_empty_candles() {
        let output = run_backtest(&[], &Never, &Never, None).unwrap();
        assert!(output.trades.is_empty());
        assert!(output.equity_curve.is_empty());
        assert_eq!(output.input_error, Some(InputError::EmptySeries));
    }

    #[test]
    fn test_malformed_series_degrades() {
        let mut candles = create_candles(&[dec!(100), dec!(101), dec!(102)]);
        candles.swap(1, 2);
        let output = run_backtest(&candles, &AtIndices::new([1]), &Never, None).unwrap();

        assert!(output.trades.is_empty());
        assert_eq!(
            output.input_error,
            Some(InputError::NonMonotonicTime { index: 2 })
        );
    }

    #[test]
    fn test_invalid_max_drawdown_rejected() {
        let candles = create_candles(&[dec!(100), dec!(101)]);
        let result = run_backtest(&candles, &Never, &Never, Some(dec!(1.2)));
        assert!(matches!(
            result,
            Err(BacktestError::Config(ConfigError::MaxDrawdownOutOfRange(_)))
        ));
    }

    #[test]
    fn test_predicate_error_is_fatal() {
        let candles = create_candles(&[dec!(100), dec!(101), dec!(102), dec!(103)]);
        let failing = try_from_fn(|_c, i, _s| {
            if i == 2 {
                Err("지표 계산 실패".into())
            } else {
                Ok(false)
            }
        });

        let result = run_backtest(&candles, &failing, &Never, None);
        match result {
            Err(BacktestError::Predicate { role, index, .. }) => {
                assert_eq!(role, SignalRole::Entry);
                assert_eq!(index, 2);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_exit_predicate_error_is_fatal() {
        let candles = create_candles(&[dec!(100), dec!(101), dec!(102), dec!(103), dec!(104)]);
        let failing = try_from_fn(|_c, i, _s| {
            if i == 3 {
                Err("청산 지표 계산 실패".into())
            } else {
                Ok(false)
            }
        });

        let result = run_backtest(&candles, &AtIndices::new([1]), &failing, None);
        match result {
            Err(BacktestError::Predicate { role, index, source }) => {
                assert_eq!(role, SignalRole::Exit);
                assert_eq!(index, 3);
                assert_eq!(source.to_string(), "청산 지표 계산 실패");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_single_candle() {
        let candles = create_candles(&[dec!(100)]);
        let entry = from_fn(|_c, _i, _s| true);
        let output = run_backtest(&candles, &entry, &entry, None).unwrap();

        assert!(!output.is_degraded());
        assert!(output.trades.is_empty());
        assert!(output.open_position.is_none());
        assert_eq!(output.data_points, 1);
        assert_eq!(output.equity_curve.len(), 1);
        assert_eq!(output.equity_curve[0].equity, dec!(1));
        assert_eq!(output.stats, BacktestStats::default());
    }

    #[test]
    fn test_unrepresentable_return_degrades() {
        // 검증은 통과하지만 1e-10 → 1e20 변동은 Decimal 나눗셈이 넘침
        let candles = create_candles(&[
            dec!(0.0000000001),
            dec!(0.0000000001),
            dec!(100000000000000000000),
        ]);
        assert!(validate_series(&candles).is_ok());

        let output = run_backtest(&candles, &AtIndices::new([1]), &Never, None).unwrap();
        assert!(output.is_degraded());
        assert!(output.trades.is_empty());
        assert!(output.equity_curve.is_empty());
        assert_eq!(
            output.input_error,
            Some(InputError::ReturnOutOfRange { index: 2 })
        );
    }

    #[test]
    fn test_return_above_cap_degrades_on_exit() {
        // 1e13배 상승은 표현 가능하지만 단일 거래 상한을 넘음
        let candles = create_candles(&[
            dec!(0.0000000001),
            dec!(0.0000000001),
            dec!(0.0000000002),
            dec!(1000),
        ]);
        let output = run_backtest(&candles, &AtIndices::new([1]), &AtIndices::new([3]), None)
            .unwrap();
        assert_eq!(
            output.input_error,
            Some(InputError::ReturnOutOfRange { index: 3 })
        );
    }

    #[test]
    fn test_open_position_not_recorded() {
        let candles = create_candles(&[dec!(100), dec!(100), dec!(110), dec!(120)]);
        let output = run_backtest(&candles, &AtIndices::new([1]), &Never, None).unwrap();

        assert!(output.trades.is_empty());
        assert_eq!(output.stats.total_trades, 0);

        let open = output.open_position.unwrap();
        assert_eq!(open.entry_index, 1);
        assert_eq!(open.last_price, dec!(120));
        assert_eq!(open.unrealized_pnl_percentage, dec!(0.2));
        assert!(output.equity_curve.last().unwrap().in_position);
    }

    #[test]
    fn test_index_zero_is_reference_only() {
        let candles = create_candles(&[dec!(100), dec!(101), dec!(102)]);
        let entry = from_fn(|_c, i, _s| i == 0);
        let output = run_backtest(&candles, &entry, &Never, None).unwrap();

        assert!(output.trades.is_empty());
        assert!(output.open_position.is_none());
    }

    #[test]
    fn test_rising_series_has_no_drawdown() {
        let candles = create_candles(&[dec!(100), dec!(101), dec!(103), dec!(106), dec!(110)]);
        let output = run_backtest(&candles, &AtIndices::new([1]), &AtIndices::new([4]), None)
            .unwrap();
        assert_eq!(output.stats.max_drawdown, Decimal::ZERO);
    }

    #[test]
    fn test_deterministic() {
        let candles = create_candles(&[
            dec!(100),
            dec!(102),
            dec!(99),
            dec!(104),
            dec!(98),
            dec!(107),
        ]);
        let entry = from_fn(|c, _i, _s| c.close < dec!(100));
        let exit = from_fn(|c, _i, _s| c.close > dec!(103));

        let engine = BacktestEngine::new(BacktestConfig::new(dec!(0.5)));
        let first = engine.run(&candles, &entry, &exit).unwrap();
        let second = engine.run(&candles, &entry, &exit).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.trades.len(), 2);
    }
}
