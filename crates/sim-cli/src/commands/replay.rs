//! 재생 명령어.
//!
//! 백테스트 결과를 터미널에서 캔들 단위로 재생합니다.
//!
//! # 사용 예시
//!
//! ```bash
//! # 자동 재생 (200ms 간격)
//! sim replay -d data/sample_daily.csv -s config/strategies/sma_cross.toml --speed 200
//!
//! # 대화형 재생
//! sim replay -d data/sample_daily.csv -s config/strategies/sma_cross.toml --interactive
//! ```
//!
//! 대화형 명령: `p` 재생/일시정지, `n` 다음, `b` 이전, `r` 처음으로,
//! `s <ms>` 속도 변경, `g <index>` 이동, `q` 종료

use anyhow::{anyhow, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rust_decimal::Decimal;
use sim_analytics::replay::{
    ReplayCommand, ReplayController, ReplayEvent, ReplayEventKind, ReplayState, TokioTimer,
};
use sim_core::{Candle, SimConfig};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::commands::backtest::{execute, prepare, BacktestCliConfig};

/// 재생 CLI 설정
#[derive(Debug, Clone)]
pub struct ReplayCliConfig {
    pub backtest: BacktestCliConfig,
    /// 재생 간격 (밀리초, 없으면 전역 설정 사용)
    pub speed_ms: Option<u64>,
    /// 표준 입력으로 재생 제어
    pub interactive: bool,
}

/// 대화형 입력
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayInput {
    Command(ReplayCommand),
    Quit,
}

/// 대화형 입력 한 줄을 해석합니다.
pub fn parse_input(line: &str) -> Result<ReplayInput> {
    let mut parts = line.split_whitespace();
    let command = parts.next().unwrap_or_default();
    let arg = parts.next();

    let input = match (command, arg) {
        ("p", None) => ReplayInput::Command(ReplayCommand::TogglePlay),
        ("n", None) => ReplayInput::Command(ReplayCommand::StepForward),
        ("b", None) => ReplayInput::Command(ReplayCommand::StepBackward),
        ("r", None) => ReplayInput::Command(ReplayCommand::Reset),
        ("q", None) => ReplayInput::Quit,
        ("s", Some(ms)) => ReplayInput::Command(ReplayCommand::SetSpeed(
            ms.parse().map_err(|_| anyhow!("잘못된 속도: {}", ms))?,
        )),
        ("g", Some(index)) => ReplayInput::Command(ReplayCommand::Seek(
            index.parse().map_err(|_| anyhow!("잘못된 인덱스: {}", index))?,
        )),
        _ => return Err(anyhow!("알 수 없는 명령: '{}' (p/n/b/r/s <ms>/g <index>/q)", line.trim())),
    };
    Ok(input)
}

/// 이벤트 설명 문자열
pub fn describe_event(event: &ReplayEvent) -> String {
    match event.kind {
        ReplayEventKind::Entry => format!(
            "🟢 진입 [{}] @ {}",
            event.trade.entry_index, event.trade.entry_price
        ),
        ReplayEventKind::Exit => format!(
            "🔴 청산 [{}] @ {} (손익 {}, {:.2}%, {}캔들 보유, {:?})",
            event.trade.exit_index,
            event.trade.exit_price,
            event.trade.pnl,
            event.trade.pnl_percentage * Decimal::ONE_HUNDRED,
            event.trade.holding_bars(),
            event.trade.exit_reason
        ),
    }
}

/// 재생 실행
pub async fn run_replay(config: ReplayCliConfig, settings: &SimConfig) -> Result<()> {
    let prepared = prepare(&config.backtest, settings)?;
    let output = execute(&prepared)?;

    let speed_ms = config.speed_ms.unwrap_or(settings.replay.speed_ms);
    let mut controller = ReplayController::from_output(&output, speed_ms, TokioTimer::new())
        .map_err(|e| anyhow!("재생 준비 실패: {}", e))?;

    info!(
        frames = controller.total_frames(),
        trades = output.trades.len(),
        speed_ms = controller.speed_ms(),
        "Starting replay"
    );
    println!("\n▶️  재생: {} ({} 캔들, {} 거래)", prepared.strategy.name, controller.total_frames(), output.trades.len());
    if config.interactive {
        println!("명령: p 재생/일시정지 | n 다음 | b 이전 | r 처음 | s <ms> 속도 | g <index> 이동 | q 종료");
    }

    let (command_tx, command_rx) = mpsc::channel(32);
    let (state_tx, state_rx) = watch::channel(controller.state());

    let driver = controller.run(command_rx, state_tx);
    let renderer = render(state_rx.clone(), &prepared.candles);
    let input = async {
        if config.interactive {
            read_commands(command_tx).await
        } else {
            autoplay(command_tx, state_rx).await
        }
    };

    let ((), rendered, input) = tokio::join!(driver, renderer, input);
    rendered?;
    input?;

    println!("\n{}", output.stats.summary());
    Ok(())
}

/// 자동 재생: 끝까지 재생한 뒤 명령 채널을 닫습니다.
async fn autoplay(
    commands: mpsc::Sender<ReplayCommand>,
    mut states: watch::Receiver<ReplayState>,
) -> Result<()> {
    commands.send(ReplayCommand::Play).await?;
    states
        .wait_for(|s| !s.is_playing && s.current_index + 1 >= s.total_frames)
        .await?;
    debug!("자동 재생 완료");
    Ok(())
}

/// 표준 입력에서 명령을 읽습니다. `q` 또는 EOF에서 종료합니다.
async fn read_commands(commands: mpsc::Sender<ReplayCommand>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match parse_input(&line) {
            Ok(ReplayInput::Command(command)) => commands.send(command).await?,
            Ok(ReplayInput::Quit) => break,
            Err(e) => eprintln!("{}", e),
        }
    }

    Ok(())
}

/// 상태 스냅샷을 진행 바로 표시합니다. 구동기가 종료되면 반환합니다.
async fn render(mut states: watch::Receiver<ReplayState>, candles: &[Candle]) -> Result<()> {
    let total = states.borrow().total_frames as u64;
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let mut last_index = None;
    loop {
        let state = states.borrow_and_update().clone();
        pb.set_position(state.current_index as u64 + 1);

        if let Some(candle) = candles.get(state.current_index) {
            let status = if state.is_playing { "▶" } else { "⏸" };
            pb.set_message(format!(
                "{} {} 종가 {} ({}ms)",
                status,
                candle.time.format("%Y-%m-%d %H:%M"),
                candle.close,
                state.speed_ms
            ));
        }

        if last_index != Some(state.current_index) {
            if let Some(event) = &state.current_event {
                pb.println(describe_event(event));
            }
            last_index = Some(state.current_index);
        }

        if states.changed().await.is_err() {
            break;
        }
    }

    pb.finish();
    Ok(())
}
