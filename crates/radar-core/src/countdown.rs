use std::fmt;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use tracing::{debug, trace};

pub const TICK_PERIOD: StdDuration = StdDuration::from_secs(1);

const MS_PER_SECOND: f64 = 1000.0;
const MS_PER_MINUTE: f64 = MS_PER_SECOND * 60.0;
const MS_PER_HOUR: f64 = MS_PER_MINUTE * 60.0;
const MS_PER_DAY: f64 = MS_PER_HOUR * 24.0;
const DAYS_PER_YEAR: f64 = 365.25;

/// Remaining time split into display units. Years are average years of
/// 365.25 days, so the split drifts from calendar arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    pub years: u64,
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
    total_ms: i64,
}

impl Countdown {
    pub fn total_seconds(&self) -> i64 {
        self.total_ms / 1000
    }

    /// Renders the "no countdown" row shown for released or TBA titles.
    pub fn placeholder() -> &'static str {
        "--y --d --h --m --s"
    }
}

impl fmt::Display for Countdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}y {:02}d {:02}h {:02}m {:02}s",
            self.years, self.days, self.hours, self.minutes, self.seconds
        )
    }
}

/// `None` once the target is absent or no longer in the future.
pub fn remaining(target: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<Countdown> {
    let target = target?;
    let total_ms = (target - now).num_milliseconds();
    if total_ms <= 0 {
        return None;
    }

    let diff = total_ms as f64;
    Some(Countdown {
        years: (diff / (MS_PER_DAY * DAYS_PER_YEAR)).floor() as u64,
        days: ((diff / MS_PER_DAY) % DAYS_PER_YEAR).floor() as u64,
        hours: ((diff / MS_PER_HOUR) % 24.0).floor() as u64,
        minutes: ((diff / MS_PER_MINUTE) % 60.0).floor() as u64,
        seconds: ((diff / MS_PER_SECOND) % 60.0).floor() as u64,
        total_ms,
    })
}

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Owns the active countdown target. Dropping the ticker ends the tick
/// subscription; nothing outlives it.
#[derive(Debug)]
pub struct CountdownTicker<C: Clock> {
    clock: C,
    target: Option<DateTime<Utc>>,
    ticks: u64,
}

impl<C: Clock> CountdownTicker<C> {
    pub fn new(clock: C, target: Option<DateTime<Utc>>) -> Self {
        debug!(deadline = ?target, "countdown ticker acquired");
        Self {
            clock,
            target,
            ticks: 0,
        }
    }

    pub fn target(&self) -> Option<DateTime<Utc>> {
        self.target
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn retarget(&mut self, target: Option<DateTime<Utc>>) {
        if self.target != target {
            debug!(old = ?self.target, new = ?target, "countdown retargeted");
            self.target = target;
            self.ticks = 0;
        }
    }

    pub fn tick(&mut self) -> Option<Countdown> {
        self.ticks += 1;
        let now = self.clock.now();
        let out = remaining(self.target, now);
        trace!(tick = self.ticks, active = out.is_some(), "countdown tick");
        out
    }
}

impl<C: Clock> Drop for CountdownTicker<C> {
    fn drop(&mut self) {
        debug!(
            deadline = ?self.target,
            ticks = self.ticks,
            "countdown ticker released"
        );
    }
}
