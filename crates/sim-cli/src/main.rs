//! 백테스트 시뮬레이터 CLI.
//!
//! # 사용 예시
//!
//! ```bash
//! # 백테스트 실행
//! sim backtest -d data/sample_daily.csv -s config/strategies/sma_cross.toml
//!
//! # 결과 재생
//! sim replay -d data/sample_daily.csv -s config/strategies/sma_cross.toml --speed 200
//!
//! # 사용 가능한 신호 목록 보기
//! sim signals
//! ```

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use sim_cli::commands::backtest::{run_backtest, BacktestCliConfig};
use sim_cli::commands::replay::{run_replay, ReplayCliConfig};
use sim_cli::commands::strategy::print_available_signals;
use sim_core::{init_logging, LogConfig, SimConfig};

#[derive(Parser)]
#[command(name = "sim")]
#[command(about = "Backtest simulator CLI - 신호 기반 백테스트 및 재생", long_about = None)]
#[command(version)]
struct Cli {
    /// 설정 파일 (기본: config/default.toml, 없으면 환경 변수만 사용)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 백테스트 실행
    Backtest {
        /// 캔들 CSV 파일 (time,open,high,low,close[,volume])
        #[arg(short, long)]
        data: PathBuf,

        /// 전략 설정 파일 (TOML 또는 JSON)
        #[arg(short, long)]
        strategy: PathBuf,

        /// 허용 최대 낙폭 (0, 1]
        #[arg(long)]
        max_drawdown: Option<Decimal>,

        /// 결과 저장 경로 (.json이면 전체 결과, 그 외는 텍스트 요약)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// 백테스트 결과 재생
    Replay {
        /// 캔들 CSV 파일
        #[arg(short, long)]
        data: PathBuf,

        /// 전략 설정 파일 (TOML 또는 JSON)
        #[arg(short, long)]
        strategy: PathBuf,

        /// 허용 최대 낙폭 (0, 1]
        #[arg(long)]
        max_drawdown: Option<Decimal>,

        /// 재생 간격 (밀리초)
        #[arg(long)]
        speed: Option<u64>,

        /// 표준 입력으로 재생 제어
        #[arg(short, long, default_value = "false")]
        interactive: bool,
    },

    /// 사용 가능한 신호 목록 보기
    Signals,
}

/// 설정 로드: 지정 파일 → 기본 파일 → 환경 변수
fn load_settings(path: Option<&Path>) -> Result<SimConfig> {
    let settings = match path {
        Some(path) => SimConfig::load(path)?,
        None if Path::new("config/default.toml").exists() => SimConfig::load_default()?,
        None => SimConfig::from_env()?,
    };
    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref())?;

    // 트레이싱 초기화
    init_logging(LogConfig::from(&settings.logging)).map_err(|e| anyhow!(e))?;

    match cli.command {
        Commands::Backtest {
            data,
            strategy,
            max_drawdown,
            output,
        } => {
            let config = BacktestCliConfig {
                data_path: data,
                strategy_path: strategy,
                max_drawdown_allowed: max_drawdown,
                output_path: output,
            };

            match run_backtest(config, &settings) {
                Ok(output) => {
                    info!(trades = output.trades.len(), "✅ Backtest completed successfully");
                }
                Err(e) => {
                    error!("Backtest failed: {}", e);
                    return Err(e);
                }
            }
        }

        Commands::Replay {
            data,
            strategy,
            max_drawdown,
            speed,
            interactive,
        } => {
            let config = ReplayCliConfig {
                backtest: BacktestCliConfig {
                    data_path: data,
                    strategy_path: strategy,
                    max_drawdown_allowed: max_drawdown,
                    output_path: None,
                },
                speed_ms: speed,
                interactive,
            };

            if let Err(e) = run_replay(config, &settings).await {
                error!("Replay failed: {}", e);
                return Err(e);
            }
        }

        Commands::Signals => print_available_signals(),
    }

    Ok(())
}
