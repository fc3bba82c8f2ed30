//! Phase scheduler
//!
//! Owns the one-second ticker and the countdown for the current phase. It
//! lives inside the arena task, so a cancelled ticker can never fire again:
//! there is no separate task to race with.

use crate::config::TimerConfig;
use crate::types::LightState;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::time::{Duration, Instant, Interval, MissedTickBehavior, interval_at};

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Result of one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Phase continues with this many seconds left
    Counting(u32),
    /// Countdown reached zero; the caller toggles the light and re-arms
    Expired,
}

pub struct PhaseScheduler {
    timers: TimerConfig,
    rng: StdRng,
    ticker: Option<Interval>,
    time_remaining: u32,
    duration: u32,
}

impl PhaseScheduler {
    pub fn new(timers: TimerConfig) -> Self {
        Self::with_rng(timers, StdRng::from_entropy())
    }

    pub fn seeded(timers: TimerConfig, seed: u64) -> Self {
        Self::with_rng(timers, StdRng::seed_from_u64(seed))
    }

    fn with_rng(timers: TimerConfig, rng: StdRng) -> Self {
        Self {
            timers,
            rng,
            ticker: None,
            time_remaining: 0,
            duration: 0,
        }
    }

    /// Bounds used by the next `arm`
    pub fn set_timers(&mut self, timers: TimerConfig) {
        self.timers = timers;
    }

    /// Draw a fresh duration for `light` and (re)start the ticker.
    /// Returns the drawn duration in seconds.
    pub fn arm(&mut self, light: LightState) -> u32 {
        let duration = self.timers.bounds_for(light).draw(&mut self.rng);
        self.duration = duration;
        self.time_remaining = duration;

        let mut ticker = interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ticker = Some(ticker);
        duration
    }

    /// Stop ticking. Safe to call when already stopped.
    pub fn cancel(&mut self) {
        self.ticker = None;
        self.time_remaining = 0;
        self.duration = 0;
    }

    pub fn is_armed(&self) -> bool {
        self.ticker.is_some()
    }

    pub fn time_remaining(&self) -> Option<u32> {
        self.ticker.as_ref().map(|_| self.time_remaining)
    }

    /// Share of the current phase still to run, in `[0, 1]`
    pub fn fraction_remaining(&self) -> f64 {
        if self.duration == 0 {
            return 0.0;
        }
        (f64::from(self.time_remaining) / f64::from(self.duration)).clamp(0.0, 1.0)
    }

    /// Resolve at the next tick. Never resolves while disarmed.
    pub async fn wait(&mut self) {
        match self.ticker.as_mut() {
            Some(ticker) => {
                ticker.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    /// Count down one second
    pub fn advance(&mut self) -> Tick {
        self.time_remaining = self.time_remaining.saturating_sub(1);
        if self.time_remaining == 0 {
            Tick::Expired
        } else {
            Tick::Counting(self.time_remaining)
        }
    }
}
