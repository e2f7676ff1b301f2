//! tokio 기반 재생 구동기.
//!
//! 명령 채널(`mpsc`)과 타이머 틱을 하나의 태스크에서 직렬로 처리하고,
//! 상태가 바뀔 때마다 `watch` 채널로 스냅샷을 발행합니다.

use tokio::sync::{mpsc, watch};
use tracing::debug;

use super::controller::{ReplayCommand, ReplayController, ReplayState};
use super::timer::TokioTimer;

impl ReplayController<TokioTimer> {
    /// 명령 채널이 닫힐 때까지 재생을 구동합니다.
    ///
    /// 종료 시 타이머를 해제하고 마지막 상태를 발행합니다.
    pub async fn run(
        &mut self,
        mut commands: mpsc::Receiver<ReplayCommand>,
        frames: watch::Sender<ReplayState>,
    ) {
        frames.send_replace(self.state());

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => {
                        debug!(?command, "재생 명령 수신");
                        self.apply(command);
                    }
                    None => break,
                },
                () = self.timer_mut().tick() => {
                    self.on_tick();
                }
            }

            frames.send_replace(self.state());
        }

        self.teardown();
        frames.send_replace(self.state());
        debug!(index = self.current_index(), "재생 구동 종료");
    }
}
