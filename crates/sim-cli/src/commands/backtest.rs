//! 백테스트 명령어.
//!
//! CSV 캔들 데이터와 전략 설정 파일로 백테스트를 실행합니다.
//!
//! # 사용 예시
//!
//! ```bash
//! # SMA 교차 전략 백테스트
//! sim backtest -d data/sample_daily.csv -s config/strategies/sma_cross.toml
//!
//! # 허용 최대 낙폭 지정 후 JSON으로 결과 저장
//! sim backtest -d data/sample_daily.csv -s config/strategies/rsi.toml \
//!     --max-drawdown 0.1 -o results/rsi.json
//! ```

use anyhow::{anyhow, Result};
use rust_decimal::Decimal;
use sim_analytics::backtest::{BacktestConfig, BacktestEngine, BacktestOutput};
use sim_core::{Candle, SimConfig};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::commands::data::load_candles_csv;
use crate::commands::strategy::{load_strategy, StrategyFile};

/// 백테스트 CLI 설정
#[derive(Debug, Clone)]
pub struct BacktestCliConfig {
    /// 캔들 CSV 경로
    pub data_path: PathBuf,
    /// 전략 설정 파일 경로
    pub strategy_path: PathBuf,
    /// 허용 최대 낙폭 (명령행 지정 시 최우선)
    pub max_drawdown_allowed: Option<Decimal>,
    /// 결과 저장 경로 (옵션)
    pub output_path: Option<PathBuf>,
}

/// 로드된 백테스트 입력
pub struct PreparedBacktest {
    pub strategy: StrategyFile,
    pub candles: Vec<Candle>,
    pub config: BacktestConfig,
}

/// 허용 최대 낙폭 결정: 명령행 → 전략 파일 → 전역 설정
pub fn resolve_max_drawdown(
    cli: Option<Decimal>,
    strategy: &StrategyFile,
    settings: &SimConfig,
) -> Decimal {
    cli.or(strategy.max_drawdown_allowed)
        .unwrap_or(settings.backtest.max_drawdown_allowed)
}

/// 데이터와 전략을 로드합니다.
pub fn prepare(config: &BacktestCliConfig, settings: &SimConfig) -> Result<PreparedBacktest> {
    let strategy = load_strategy(&config.strategy_path)?;
    info!("Loaded strategy: {}", strategy.name);

    let candles = load_candles_csv(&config.data_path)?;
    info!("Loaded {} candles from {}", candles.len(), config.data_path.display());

    let max_drawdown = resolve_max_drawdown(config.max_drawdown_allowed, &strategy, settings);

    Ok(PreparedBacktest {
        strategy,
        candles,
        config: BacktestConfig::new(max_drawdown),
    })
}

/// 준비된 입력으로 엔진을 실행합니다.
pub fn execute(prepared: &PreparedBacktest) -> Result<BacktestOutput> {
    let (entry, exit) = prepared.strategy.build_signals()?;
    let engine = BacktestEngine::new(prepared.config.clone());

    let output = engine
        .run(&prepared.candles, &entry, &exit)
        .map_err(|e| anyhow!("백테스트 실패: {}", e))?;

    if let Some(err) = &output.input_error {
        warn!(error = %err, "입력 데이터 오류로 빈 결과가 반환되었습니다");
    }

    Ok(output)
}

/// 백테스트 실행
pub fn run_backtest(config: BacktestCliConfig, settings: &SimConfig) -> Result<BacktestOutput> {
    let prepared = prepare(&config, settings)?;

    println!("\n📊 백테스트 실행 중...");
    println!("전략: {}", prepared.strategy.name);
    println!("데이터: {} ({} 캔들)", config.data_path.display(), prepared.candles.len());
    println!("허용 최대 낙폭: {}", prepared.config.max_drawdown_allowed);

    let output = execute(&prepared)?;

    // 결과 출력
    println!("\n{}", output.stats.summary());
    print_report(&output);

    // 결과 저장 (옵션)
    if let Some(output_path) = &config.output_path {
        save_report(&output, output_path)?;
        info!("Report saved to: {}", output_path.display());
        println!("\n📁 결과 저장됨: {}", output_path.display());
    }

    Ok(output)
}

/// 거래 목록과 미청산 포지션 출력
fn print_report(output: &BacktestOutput) {
    if let Some(err) = &output.input_error {
        println!("\n⚠️  입력 데이터 오류: {}", err);
        return;
    }

    if !output.trades.is_empty() {
        println!("\n  #  | 진입                 | 청산                 | 보유  | 손익       | 사유");
        println!("  ─────────────────────────────────────────────────────────────────────────────");
        for (i, trade) in output.trades.iter().enumerate() {
            println!(
                "  {:<3}| [{:>4}] {:<12} | [{:>4}] {:<12} | {:>5} | {:>9.2}% | {:?}",
                i + 1,
                trade.entry_index,
                trade.entry_price,
                trade.exit_index,
                trade.exit_price,
                trade.holding_bars(),
                trade.pnl_percentage * Decimal::ONE_HUNDRED,
                trade.exit_reason,
            );
        }
    }

    if let Some(open) = &output.open_position {
        println!(
            "\n미청산 포지션: [{}] {} → {} ({:.2}%, 통계 제외)",
            open.entry_index,
            open.entry_price,
            open.last_price,
            open.unrealized_pnl_percentage * Decimal::ONE_HUNDRED
        );
    }
}

/// 백테스트 결과를 파일로 저장
fn save_report(output: &BacktestOutput, path: &Path) -> Result<()> {
    // 디렉토리 생성
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = if path.extension().is_some_and(|ext| ext == "json") {
        serde_json::to_string_pretty(output)?
    } else {
        // 기본: 텍스트 요약
        output.stats.summary()
    };

    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use sim_analytics::signals::SignalSpec;

    fn strategy(max_drawdown_allowed: Option<Decimal>) -> StrategyFile {
        StrategyFile {
            name: "test".to_string(),
            max_drawdown_allowed,
            entry: SignalSpec::AtIndices { indices: vec![1] },
            exit: SignalSpec::AtIndices { indices: vec![3] },
        }
    }

    #[test]
    fn test_resolve_max_drawdown_precedence() {
        let settings = SimConfig::default();

        assert_eq!(
            resolve_max_drawdown(Some(dec!(0.1)), &strategy(Some(dec!(0.2))), &settings),
            dec!(0.1)
        );
        assert_eq!(
            resolve_max_drawdown(None, &strategy(Some(dec!(0.2))), &settings),
            dec!(0.2)
        );
        assert_eq!(resolve_max_drawdown(None, &strategy(None), &settings), dec!(1));
    }

    #[test]
    fn test_execute_prepared() {
        let candles = crate::commands::data::parse_candles(
            "1,100,100,100,100\n2,105,105,105,105\n3,103,103,103,103\n4,108,108,108,108\n5,102,102,102,102\n",
        )
        .unwrap();
        let prepared = PreparedBacktest {
            strategy: strategy(None),
            candles,
            config: BacktestConfig::default(),
        };

        let output = execute(&prepared).unwrap();
        assert_eq!(output.trades.len(), 1);
        assert_eq!(output.trades[0].pnl, dec!(3));
    }

    #[test]
    fn test_execute_rejects_bad_drawdown() {
        let prepared = PreparedBacktest {
            strategy: strategy(None),
            candles: Vec::new(),
            config: BacktestConfig::new(dec!(2)),
        };
        assert!(execute(&prepared).is_err());
    }

    #[test]
    fn test_save_report_json() {
        let path = std::env::temp_dir().join(format!("sim-report-{}.json", std::process::id()));
        let prepared = PreparedBacktest {
            strategy: strategy(None),
            candles: crate::commands::data::parse_candles("1,1,1,1,1\n2,2,2,2,2\n").unwrap(),
            config: BacktestConfig::default(),
        };
        let output = execute(&prepared).unwrap();

        save_report(&output, &path).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(json["data_points"], 2);
        assert!(json["open_position"].is_object());
    }
}
