//! 재생 타이머 추상화.
//!
//! 컨트롤러는 반복 타이머 하나만 사용합니다. 타이머를 교체할 때는 항상
//! 기존 타이머를 먼저 취소하므로 동시에 둘 이상이 무장되는 일은 없습니다.
//!
//! - [`ManualTimer`]: 테스트용 결정적 타이머 (시간을 직접 진행)
//! - [`TokioTimer`]: `tokio::time::Interval` 기반 실제 타이머

use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// 반복 타이머.
pub trait ReplayTimer {
    /// `period` 간격의 반복 타이머를 무장합니다.
    fn arm(&mut self, period: Duration);

    /// 무장된 타이머를 취소합니다. 무장되지 않았으면 아무 일도 하지 않습니다.
    fn cancel(&mut self);

    /// 타이머가 무장되어 있는지 확인합니다.
    fn is_armed(&self) -> bool;
}

/// 수동으로 시간을 진행하는 결정적 타이머.
///
/// 무장/취소 횟수를 기록하므로 타이머 누수를 테스트할 수 있습니다.
#[derive(Debug, Clone, Default)]
pub struct ManualTimer {
    period: Option<Duration>,
    /// 마지막 틱(또는 무장) 이후 경과 시간
    elapsed: Duration,
    armed_total: usize,
    cancelled_total: usize,
    overlapping_arms: usize,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 현재 간격
    pub fn period(&self) -> Option<Duration> {
        self.period
    }

    /// 누적 무장 횟수
    pub fn armed_total(&self) -> usize {
        self.armed_total
    }

    /// 누적 취소 횟수 (무장된 타이머에 대한 것만)
    pub fn cancelled_total(&self) -> usize {
        self.cancelled_total
    }

    /// 이전 타이머를 취소하지 않고 무장한 횟수. 항상 0이어야 합니다.
    pub fn overlapping_arms(&self) -> usize {
        self.overlapping_arms
    }

    /// `budget` 안에서 다음 틱이 발생하면 틱까지 소요된 시간을 반환합니다.
    ///
    /// 틱이 없으면 남은 시간만큼 경과 시간을 누적하고 `None`을 반환합니다.
    pub fn take_due(&mut self, budget: Duration) -> Option<Duration> {
        let period = self.period?;
        let remaining = period.saturating_sub(self.elapsed);
        if budget >= remaining {
            self.elapsed = Duration::ZERO;
            Some(remaining)
        } else {
            self.elapsed += budget;
            None
        }
    }
}

impl ReplayTimer for ManualTimer {
    fn arm(&mut self, period: Duration) {
        if self.period.is_some() {
            self.overlapping_arms += 1;
        }
        self.period = Some(period);
        self.elapsed = Duration::ZERO;
        self.armed_total += 1;
    }

    fn cancel(&mut self) {
        if self.period.take().is_some() {
            self.cancelled_total += 1;
        }
        self.elapsed = Duration::ZERO;
    }

    fn is_armed(&self) -> bool {
        self.period.is_some()
    }
}

/// `tokio::time::Interval` 기반 타이머.
///
/// 첫 틱은 무장 후 한 간격 뒤에 발생하며, 밀린 틱은 몰아서 발생시키지 않습니다.
#[derive(Debug, Default)]
pub struct TokioTimer {
    interval: Option<Interval>,
}

impl TokioTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 다음 틱을 기다립니다.
    ///
    /// 무장되지 않은 상태에서는 영원히 대기하므로 `select!` 분기로 사용할 수 있습니다.
    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }
}

impl ReplayTimer for TokioTimer {
    fn arm(&mut self, period: Duration) {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);
    }

    fn cancel(&mut self) {
        self.interval = None;
    }

    fn is_armed(&self) -> bool {
        self.interval.is_some()
    }
}
