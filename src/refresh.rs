use crate::types::RefreshState;

/// Countdown state machine behind auto-refresh.
///
/// Pure bookkeeping: the controller owns the actual 1-second tick source and
/// creates or drops it whenever `is_active()` changes or the countdown is re-armed.
/// An interval of 0 keeps the scheduler logically stopped even if `is_running`
/// is set, so raising the interval later resumes without another `start`.
#[derive(Debug, Clone)]
pub struct RefreshScheduler {
    interval_secs: u64,
    is_running: bool,
    seconds_remaining: u64,
    last_updated_at_ns: Option<u64>,
}

impl RefreshScheduler {
    pub fn new(interval_secs: u64) -> Self {
        Self {
            interval_secs,
            is_running: false,
            seconds_remaining: interval_secs,
            last_updated_at_ns: None,
        }
    }

    /// Stopped → Running, or re-arm with a new interval if already running.
    pub fn start(&mut self, interval_secs: u64) {
        self.interval_secs = interval_secs;
        self.is_running = true;
        self.seconds_remaining = interval_secs;
    }

    pub fn stop(&mut self) {
        self.is_running = false;
        self.seconds_remaining = self.interval_secs;
    }

    /// Negative input clamps to 0, which disables auto-refresh. A running
    /// scheduler restarts its countdown from the new interval.
    pub fn set_interval(&mut self, seconds: i64) {
        self.interval_secs = seconds.max(0) as u64;
        self.seconds_remaining = self.interval_secs;
    }

    /// Restart the countdown without changing the interval.
    pub fn restart_countdown(&mut self) {
        self.seconds_remaining = self.interval_secs;
    }

    pub fn is_active(&self) -> bool {
        self.is_running && self.interval_secs > 0
    }

    /// One second elapsed. Returns true when a pipeline cycle is due; the
    /// countdown is then already reset for the next round.
    pub fn tick(&mut self) -> bool {
        if !self.is_active() {
            return false;
        }
        self.seconds_remaining = self.seconds_remaining.saturating_sub(1);
        if self.seconds_remaining == 0 {
            self.seconds_remaining = self.interval_secs;
            true
        } else {
            false
        }
    }

    pub fn mark_updated(&mut self, at_ns: u64) {
        self.last_updated_at_ns = Some(at_ns);
    }

    pub fn interval_secs(&self) -> u64 {
        self.interval_secs
    }

    pub fn state(&self) -> RefreshState {
        RefreshState {
            interval_secs: self.interval_secs,
            is_running: self.is_running,
            seconds_remaining: self.seconds_remaining,
            last_updated_at_ns: self.last_updated_at_ns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ten_ticks_fire_exactly_once_and_reset() {
        let mut s = RefreshScheduler::new(10);
        s.start(10);
        let fired = (0..10).filter(|_| s.tick()).count();
        assert_eq!(fired, 1);
        assert_eq!(s.state().seconds_remaining, 10);
    }

    #[test]
    fn fires_on_the_last_tick_only() {
        let mut s = RefreshScheduler::new(3);
        s.start(3);
        assert!(!s.tick());
        assert_eq!(s.state().seconds_remaining, 2);
        assert!(!s.tick());
        assert!(s.tick());
        assert_eq!(s.state().seconds_remaining, 3);
    }

    #[test]
    fn stopped_scheduler_never_fires() {
        let mut s = RefreshScheduler::new(1);
        assert!(!s.tick());
        s.start(1);
        assert!(s.tick());
        s.stop();
        assert!((0..5).all(|_| !s.tick()));
        assert!(!s.state().is_running);
    }

    #[test]
    fn zero_interval_behaves_as_stopped() {
        let mut s = RefreshScheduler::new(10);
        s.start(10);
        s.set_interval(0);
        assert!(s.state().is_running);
        assert!(!s.is_active());
        assert!((0..20).all(|_| !s.tick()));

        s.set_interval(2);
        assert!(s.is_active());
        assert!(!s.tick());
        assert!(s.tick());
    }

    #[test]
    fn negative_interval_clamps_to_zero() {
        let mut s = RefreshScheduler::new(10);
        s.set_interval(-5);
        assert_eq!(s.interval_secs(), 0);
    }

    #[test]
    fn reconfiguring_while_running_restarts_countdown() {
        let mut s = RefreshScheduler::new(10);
        s.start(10);
        for _ in 0..7 {
            s.tick();
        }
        assert_eq!(s.state().seconds_remaining, 3);
        s.set_interval(30);
        assert_eq!(s.state().seconds_remaining, 30);

        s.tick();
        s.restart_countdown();
        assert_eq!(s.state().seconds_remaining, 30);
    }

    #[test]
    fn start_while_running_rearms_with_new_interval() {
        let mut s = RefreshScheduler::new(10);
        s.start(10);
        s.tick();
        s.start(5);
        let expected = RefreshState {
            interval_secs: 5,
            is_running: true,
            seconds_remaining: 5,
            last_updated_at_ns: None,
        };
        assert_eq!(s.state(), expected);
    }
}
