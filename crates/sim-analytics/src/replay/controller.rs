//! 재생 컨트롤러.
//!
//! 백테스트 결과를 캔들 단위로 재생하는 상태 머신입니다. 상태는
//! `일시정지` / `재생` 두 가지이며, 커서는 항상 `[0, N-1]` 범위에 있습니다.
//!
//! 재생 중에는 타이머가 `speed_ms`마다 [`ReplayController::on_tick`]을
//! 호출해야 합니다. 타이머는 일시정지, 속도 변경, 해제 시 새 타이머를
//! 무장하기 전에 반드시 취소되므로, 일시정지 이후의 틱은 타이머 구현이
//! 취소 규칙을 어긴 경우에만 도착합니다.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sim_core::Trade;
use thiserror::Error;
use tracing::{debug, warn};

use super::timer::{ManualTimer, ReplayTimer};
use crate::backtest::BacktestOutput;

/// 최소 재생 간격 (밀리초)
pub const MIN_SPEED_MS: u64 = 1;

/// 재생 오류
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplayError {
    /// 재생할 캔들이 없음
    #[error("재생할 캔들이 없습니다")]
    EmptySeries,

    /// 거래 인덱스가 캔들 범위를 벗어남
    #[error("거래 인덱스가 범위를 벗어났습니다 (index={index}, frames={len})")]
    TradeOutOfRange { index: usize, len: usize },

    /// 한 인덱스에 두 이벤트가 겹침
    #[error("인덱스 {index}에 이벤트가 중복됩니다")]
    EventCollision { index: usize },
}

/// 재생 결과 타입
pub type ReplayResult<T> = Result<T, ReplayError>;

/// 이벤트 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayEventKind {
    /// 진입
    Entry,
    /// 청산
    Exit,
}

/// 현재 인덱스의 거래 이벤트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayEvent {
    #[serde(rename = "type")]
    pub kind: ReplayEventKind,
    pub trade: Trade,
}

impl ReplayEvent {
    /// 청산 이벤트의 실현 손익
    pub fn pnl(&self) -> Option<Decimal> {
        match self.kind {
            ReplayEventKind::Exit => Some(self.trade.pnl),
            ReplayEventKind::Entry => None,
        }
    }
}

/// 렌더러에 전달되는 재생 상태 스냅샷
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayState {
    pub current_index: usize,
    pub total_frames: usize,
    pub is_playing: bool,
    pub speed_ms: u64,
    /// 진행률 (0 ~ 100)
    pub progress: f64,
    pub current_event: Option<ReplayEvent>,
}

/// 재생 명령
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayCommand {
    Play,
    Pause,
    TogglePlay,
    StepForward,
    StepBackward,
    Reset,
    SetSpeed(u64),
    Seek(usize),
}

#[derive(Debug, Clone, Copy)]
struct EventSlot {
    kind: ReplayEventKind,
    trade_idx: usize,
}

/// 재생 컨트롤러
#[derive(Debug)]
pub struct ReplayController<T: ReplayTimer> {
    trades: Vec<Trade>,
    /// 캔들 인덱스별 이벤트 (길이 = total_frames)
    slots: Vec<Option<EventSlot>>,
    current_index: usize,
    playing: bool,
    speed_ms: u64,
    timer: T,
}

impl<T: ReplayTimer> ReplayController<T> {
    /// 새 컨트롤러를 생성합니다.
    ///
    /// 거래 인덱스가 범위를 벗어나거나 한 인덱스에 두 이벤트가 겹치면 에러를 반환합니다.
    pub fn new(
        total_frames: usize,
        trades: Vec<Trade>,
        speed_ms: u64,
        timer: T,
    ) -> ReplayResult<Self> {
        if total_frames == 0 {
            return Err(ReplayError::EmptySeries);
        }

        let mut slots: Vec<Option<EventSlot>> = vec![None; total_frames];
        for (trade_idx, trade) in trades.iter().enumerate() {
            for (index, kind) in [
                (trade.entry_index, ReplayEventKind::Entry),
                (trade.exit_index, ReplayEventKind::Exit),
            ] {
                let slot = slots.get_mut(index).ok_or(ReplayError::TradeOutOfRange {
                    index,
                    len: total_frames,
                })?;
                if slot.is_some() {
                    return Err(ReplayError::EventCollision { index });
                }
                *slot = Some(EventSlot { kind, trade_idx });
            }
        }

        Ok(Self {
            trades,
            slots,
            current_index: 0,
            playing: false,
            speed_ms: speed_ms.max(MIN_SPEED_MS),
            timer,
        })
    }

    /// 백테스트 결과로부터 컨트롤러를 생성합니다.
    pub fn from_output(output: &BacktestOutput, speed_ms: u64, timer: T) -> ReplayResult<Self> {
        Self::new(output.data_points, output.trades.clone(), speed_ms, timer)
    }

    fn last_index(&self) -> usize {
        self.slots.len() - 1
    }

    fn period(&self) -> Duration {
        Duration::from_millis(self.speed_ms)
    }

    /// 재생을 시작합니다. 이미 재생 중이거나 마지막 인덱스이면 무시합니다.
    pub fn play(&mut self) {
        if self.playing || self.current_index >= self.last_index() {
            return;
        }
        self.timer.cancel();
        self.timer.arm(self.period());
        self.playing = true;
        debug!(index = self.current_index, speed_ms = self.speed_ms, "재생 시작");
    }

    /// 재생을 일시정지하고 타이머를 취소합니다.
    pub fn pause(&mut self) {
        self.timer.cancel();
        if self.playing {
            self.playing = false;
            debug!(index = self.current_index, "일시정지");
        }
    }

    /// 재생/일시정지를 전환합니다.
    pub fn toggle_play(&mut self) {
        if self.playing {
            self.pause();
        } else {
            self.play();
        }
    }

    /// 한 캔들 앞으로 이동합니다. 재생 중 마지막 인덱스에 도달하면 자동 일시정지합니다.
    pub fn step_forward(&mut self) {
        self.current_index = (self.current_index + 1).min(self.last_index());
        self.pause_at_end();
    }

    /// 한 캔들 뒤로 이동합니다.
    pub fn step_backward(&mut self) {
        self.current_index = self.current_index.saturating_sub(1);
    }

    /// 처음으로 돌아가고 일시정지합니다.
    pub fn reset(&mut self) {
        self.pause();
        self.current_index = 0;
        debug!("재생 초기화");
    }

    /// 지정 인덱스로 이동합니다. 범위를 벗어나면 `[0, N-1]`로 보정합니다.
    pub fn seek(&mut self, index: usize) {
        self.current_index = index.min(self.last_index());
        self.pause_at_end();
    }

    /// 재생 간격을 변경합니다. 커서는 움직이지 않습니다.
    ///
    /// 0은 [`MIN_SPEED_MS`]로 보정됩니다. 재생 중이면 기존 타이머를 취소한 뒤
    /// 새 간격으로 다시 무장합니다.
    pub fn set_speed(&mut self, speed_ms: u64) {
        self.speed_ms = speed_ms.max(MIN_SPEED_MS);
        if self.playing {
            self.timer.cancel();
            self.timer.arm(self.period());
        }
        debug!(speed_ms = self.speed_ms, "재생 속도 변경");
    }

    /// 타이머 틱 처리.
    ///
    /// 재생 중이고 타이머가 무장된 상태에서만 커서를 한 칸 전진시키고 `true`를
    /// 반환합니다. 일시정지나 해제 이후에 도착한 틱은 상태를 바꾸지 않고
    /// `false`를 반환합니다.
    pub fn on_tick(&mut self) -> bool {
        if !self.playing || !self.timer.is_armed() {
            warn!(index = self.current_index, "일시정지 상태에서 틱 수신, 무시합니다");
            return false;
        }
        self.step_forward();
        true
    }

    /// 명령을 적용합니다.
    pub fn apply(&mut self, command: ReplayCommand) {
        match command {
            ReplayCommand::Play => self.play(),
            ReplayCommand::Pause => self.pause(),
            ReplayCommand::TogglePlay => self.toggle_play(),
            ReplayCommand::StepForward => self.step_forward(),
            ReplayCommand::StepBackward => self.step_backward(),
            ReplayCommand::Reset => self.reset(),
            ReplayCommand::SetSpeed(ms) => self.set_speed(ms),
            ReplayCommand::Seek(index) => self.seek(index),
        }
    }

    /// 타이머를 해제합니다. 이후 틱은 발생하지 않습니다.
    pub fn teardown(&mut self) {
        self.pause();
        self.timer.cancel();
    }

    fn pause_at_end(&mut self) {
        if self.playing && self.current_index >= self.last_index() {
            debug!(index = self.current_index, "마지막 캔들 도달");
            self.pause();
        }
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn speed_ms(&self) -> u64 {
        self.speed_ms
    }

    pub fn total_frames(&self) -> usize {
        self.slots.len()
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    /// 진행률 `100 * (i + 1) / N`
    pub fn progress(&self) -> f64 {
        100.0 * (self.current_index + 1) as f64 / self.slots.len() as f64
    }

    /// 현재 인덱스의 거래 이벤트
    pub fn current_event(&self) -> Option<ReplayEvent> {
        let slot = self.slots[self.current_index]?;
        Some(ReplayEvent {
            kind: slot.kind,
            trade: self.trades[slot.trade_idx].clone(),
        })
    }

    /// 현재 상태 스냅샷
    pub fn state(&self) -> ReplayState {
        ReplayState {
            current_index: self.current_index,
            total_frames: self.total_frames(),
            is_playing: self.playing,
            speed_ms: self.speed_ms,
            progress: self.progress(),
            current_event: self.current_event(),
        }
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub(super) fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }
}

impl ReplayController<ManualTimer> {
    /// 수동 타이머를 `elapsed`만큼 진행하고 발생한 틱 수를 반환합니다.
    pub fn advance(&mut self, elapsed: Duration) -> usize {
        let mut budget = elapsed;
        let mut ticks = 0;
        while let Some(used) = self.timer.take_due(budget) {
            budget -= used;
            if self.on_tick() {
                ticks += 1;
            }
        }
        ticks
    }
}

impl<T: ReplayTimer> Drop for ReplayController<T> {
    fn drop(&mut self) {
        self.timer.cancel();
    }
}
