//! 每题倒计时
//!
//! 一秒一次的 tokio interval。每次换题或继续时重新创建（第一次 tick
//! 在整整一秒之后），暂停、结束和销毁时取消。

use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

const TICK_PERIOD: Duration = Duration::from_secs(1);

/// 倒计时
#[derive(Debug, Default)]
pub struct Countdown {
    interval: Option<Interval>,
}

impl Countdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// 重新开始计时，丢弃之前的 interval
    pub fn arm(&mut self) {
        let mut interval = interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);
    }

    pub fn cancel(&mut self) {
        self.interval = None;
    }

    pub fn is_armed(&self) -> bool {
        self.interval.is_some()
    }

    /// 等待下一次 tick；未启动时永远不会返回
    ///
    /// 可以安全地放在 `tokio::select!` 中。
    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }
}
