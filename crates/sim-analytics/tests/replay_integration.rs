//! 재생 컨트롤러 통합 테스트.
//!
//! 백테스트 결과를 컨트롤러에 넘겨 이벤트 파생과 비동기 구동기를 검증합니다.

use std::time::Duration;

use chrono::DateTime;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use sim_analytics::backtest::run_backtest;
use sim_analytics::replay::{
    ManualTimer, ReplayCommand, ReplayController, ReplayEventKind, ReplayState, ReplayTimer, TokioTimer,
};
use sim_analytics::signals::AtIndices;
use sim_core::Candle;

fn create_candles(closes: &[Decimal]) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            let t = DateTime::from_timestamp(1_700_000_000 + i as i64 * 60, 0).unwrap();
            Candle::new(t, c, c, c, c)
        })
        .collect()
}

fn ten_candles() -> Vec<Candle> {
    create_candles(&[
        dec!(100),
        dec!(101),
        dec!(102),
        dec!(103),
        dec!(101),
        dec!(104),
        dec!(107),
        dec!(106),
        dec!(105),
        dec!(108),
    ])
}

#[test]
fn test_events_follow_backtest_trades() {
    let candles = ten_candles();
    let output =
        run_backtest(&candles, &AtIndices::new([2]), &AtIndices::new([6]), None).unwrap();
    assert_eq!(output.trades.len(), 1);

    let mut replay = ReplayController::from_output(&output, 100, ManualTimer::new()).unwrap();
    assert_eq!(replay.total_frames(), 10);

    let mut events = Vec::new();
    for _ in 0..10 {
        if let Some(event) = replay.current_event() {
            events.push((replay.current_index(), event));
        }
        replay.step_forward();
    }

    assert_eq!(events.len(), 2);
    let (entry_index, entry) = &events[0];
    let (exit_index, exit) = &events[1];
    assert_eq!(*entry_index, 2);
    assert_eq!(entry.kind, ReplayEventKind::Entry);
    assert_eq!(*exit_index, 6);
    assert_eq!(exit.kind, ReplayEventKind::Exit);
    assert_eq!(exit.pnl(), Some(output.trades[0].pnl));
    assert_eq!(exit.pnl(), Some(dec!(5)));
}

#[test]
fn test_single_candle_replay() {
    let candles = create_candles(&[dec!(100)]);
    let output = run_backtest(&candles, &AtIndices::new([0]), &AtIndices::new([0]), None).unwrap();
    assert!(output.trades.is_empty());
    assert_eq!(output.equity_curve.len(), 1);

    let mut replay = ReplayController::from_output(&output, 100, ManualTimer::new()).unwrap();
    assert_eq!(replay.total_frames(), 1);
    assert_eq!(replay.progress(), 100.0);

    replay.play();
    assert!(!replay.is_playing());
    assert!(!replay.timer().is_armed());
    assert!(replay.current_event().is_none());
}

#[test]
fn test_manual_playback_is_deterministic() {
    let candles = ten_candles();
    let output =
        run_backtest(&candles, &AtIndices::new([2]), &AtIndices::new([6]), None).unwrap();

    let run = || {
        let mut replay = ReplayController::from_output(&output, 50, ManualTimer::new()).unwrap();
        replay.play();
        let mut trace = Vec::new();
        for _ in 0..12 {
            replay.advance(Duration::from_millis(50));
            trace.push((replay.current_index(), replay.is_playing()));
        }
        trace
    };

    let first = run();
    assert_eq!(first, run());
    assert_eq!(first.last(), Some(&(9, false)));
}

#[test]
fn test_state_serializes_event_type() {
    let candles = ten_candles();
    let output =
        run_backtest(&candles, &AtIndices::new([2]), &AtIndices::new([6]), None).unwrap();
    let mut replay = ReplayController::from_output(&output, 100, ManualTimer::new()).unwrap();
    replay.seek(6);

    let json = serde_json::to_value(replay.state()).unwrap();
    assert_eq!(json["current_index"], 6);
    assert_eq!(json["current_event"]["type"], "exit");
    assert_eq!(json["current_event"]["trade"]["exit_index"], 6);
}

fn spawn_driver(
    frames: usize,
    speed_ms: u64,
) -> (
    mpsc::Sender<ReplayCommand>,
    watch::Receiver<ReplayState>,
    tokio::task::JoinHandle<()>,
) {
    let mut replay =
        ReplayController::new(frames, Vec::new(), speed_ms, TokioTimer::new()).unwrap();
    let (command_tx, command_rx) = mpsc::channel(16);
    let (state_tx, state_rx) = watch::channel(replay.state());
    let handle = tokio::spawn(async move {
        replay.run(command_rx, state_tx).await;
    });
    (command_tx, state_rx, handle)
}

#[tokio::test(start_paused = true)]
async fn test_driver_plays_to_end() {
    let (commands, mut states, handle) = spawn_driver(5, 100);
    let start = Instant::now();

    commands.send(ReplayCommand::Play).await.unwrap();
    let state = states
        .wait_for(|s| s.current_index == 4 && !s.is_playing)
        .await
        .unwrap()
        .clone();

    assert_eq!(state.progress, 100.0);
    assert_eq!(start.elapsed(), Duration::from_millis(400));

    drop(commands);
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_driver_pause_stops_ticks() {
    let (commands, mut states, handle) = spawn_driver(10, 100);

    commands.send(ReplayCommand::Play).await.unwrap();
    states.wait_for(|s| s.current_index == 2).await.unwrap();
    commands.send(ReplayCommand::Pause).await.unwrap();
    states.wait_for(|s| !s.is_playing).await.unwrap();

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(states.borrow().current_index, 2);

    drop(commands);
    handle.await.unwrap();
    assert!(!states.borrow().is_playing);
}

#[tokio::test(start_paused = true)]
async fn test_driver_speed_change() {
    let (commands, mut states, handle) = spawn_driver(10, 1_000);
    let start = Instant::now();

    commands.send(ReplayCommand::SetSpeed(10)).await.unwrap();
    commands.send(ReplayCommand::Play).await.unwrap();
    states
        .wait_for(|s| s.current_index == 9)
        .await
        .unwrap();

    assert!(start.elapsed() < Duration::from_millis(1_000));

    drop(commands);
    handle.await.unwrap();
}
