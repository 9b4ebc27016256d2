//! Start/stop bookkeeping for the periodic retry timer.

use std::time::{Duration, Instant};

/// An interval timer that is ticked from outside.
///
/// The timer owns no thread or task; whoever drives the session calls the
/// session's tick method every `interval` while [`IntervalTimer::is_active`].
#[derive(Debug, Clone)]
pub struct IntervalTimer {
    interval: Duration,
    started_at: Option<Instant>,
    ticks: u64,
}

impl IntervalTimer {
    /// Creates a stopped timer.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            started_at: None,
            ticks: 0,
        }
    }

    /// Starts the timer. Starting a running timer does nothing.
    pub fn start(&mut self) -> &mut Self {
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
            self.ticks = 0;
        }
        self
    }

    /// Stops the timer. Stopping a stopped timer does nothing.
    pub fn stop(&mut self) -> &mut Self {
        self.started_at = None;
        self
    }

    /// Stops and starts again.
    pub fn restart(&mut self) -> &mut Self {
        self.stop();
        self.start()
    }

    /// Returns true while running.
    pub fn is_active(&self) -> bool {
        self.started_at.is_some()
    }

    /// The tick period.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// How long the timer has been running, zero if stopped.
    pub fn duration(&self) -> Duration {
        self.started_at
            .map(|start| start.elapsed())
            .unwrap_or(Duration::ZERO)
    }

    /// Records a tick and returns the tick count since the last start.
    pub fn record_tick(&mut self) -> u64 {
        self.ticks += 1;
        self.ticks
    }

    /// Ticks since the last start.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_stop_restart() {
        let mut timer = IntervalTimer::new(Duration::from_millis(500));
        assert!(!timer.is_active());
        assert_eq!(timer.duration(), Duration::ZERO);

        timer.start();
        assert!(timer.is_active());
        timer.record_tick();
        timer.record_tick();
        assert_eq!(timer.ticks(), 2);

        // second start is a no-op and keeps the tick count
        timer.start();
        assert_eq!(timer.ticks(), 2);

        timer.restart();
        assert!(timer.is_active());
        assert_eq!(timer.ticks(), 0);

        timer.stop().stop();
        assert!(!timer.is_active());
        assert_eq!(timer.interval(), Duration::from_millis(500));
    }
}
