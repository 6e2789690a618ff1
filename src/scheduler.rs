use crate::config::Config;
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone)]
struct Cadence {
    every: Duration,
    next_due: DateTime<Utc>,
}

impl Cadence {
    fn new(every: Duration, first_due: DateTime<Utc>) -> Self {
        Self {
            every,
            next_due: first_due,
        }
    }

    /// Fires at most once per call. A cadence that fell more than one period
    /// behind re-anchors on `now` instead of firing repeatedly.
    fn poll(&mut self, now: DateTime<Utc>) -> bool {
        if now < self.next_due {
            return false;
        }
        self.next_due += self.every;
        if self.next_due <= now {
            self.next_due = now + self.every;
        }
        true
    }
}

/// Which jobs are due on this poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Due {
    /// Bank elapsed minutes and persist.
    pub reconcile: bool,
    /// Redraw live elapsed times. Never persists.
    pub display: bool,
}

impl Due {
    pub fn any(&self) -> bool {
        self.reconcile || self.display
    }
}

/// Two fixed cadences polled by the host loop with the current time.
#[derive(Debug, Clone)]
pub struct Scheduler {
    reconcile: Cadence,
    display: Cadence,
}

impl Scheduler {
    /// The display cadence is due immediately; reconciliation first runs one
    /// period after `now`.
    pub fn new(reconcile_every: Duration, display_every: Duration, now: DateTime<Utc>) -> Self {
        Self {
            reconcile: Cadence::new(reconcile_every, now + reconcile_every),
            display: Cadence::new(display_every, now),
        }
    }

    pub fn from_config(config: &Config, now: DateTime<Utc>) -> Result<Self> {
        let reconcile = Duration::from_std(config.reconcile_every()?)
            .context("Reconcile interval is too large")?;
        let display = Duration::from_std(config.display_every()?)
            .context("Display interval is too large")?;
        Ok(Self::new(reconcile, display, now))
    }

    pub fn poll(&mut self, now: DateTime<Utc>) -> Due {
        Due {
            reconcile: self.reconcile.poll(now),
            display: self.display.poll(now),
        }
    }

    pub fn next_due(&self) -> DateTime<Utc> {
        self.reconcile.next_due.min(self.display.next_due)
    }

    /// How long the host may sleep before the next poll.
    pub fn until_next(&self, now: DateTime<Utc>) -> std::time::Duration {
        (self.next_due() - now)
            .to_std()
            .unwrap_or(std::time::Duration::ZERO)
    }
}
