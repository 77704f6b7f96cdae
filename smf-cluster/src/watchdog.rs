//! The master's per-session watchdog: a timer of configured period that
//! sends a watchdog request, measures the round trip to the reply, and
//! closes the session after two consecutive missed replies (§4.1).
use std::time::{Duration, Instant};

use smf_types::WireValue;

use crate::opcode;
use crate::record::CommandRecord;

pub fn watchdog_request() -> CommandRecord {
    CommandRecord::new(opcode::WATCHDOG_REQ, vec![])
}

pub fn watchdog_response(client_ts: u64) -> CommandRecord {
    CommandRecord::new(opcode::WATCHDOG_RES, vec![WireValue::TimePoint(client_ts)])
}

/// Tracks one session's watchdog ticks. `on_tick` is called each time the
/// master's timer fires; it returns whether the session must be closed.
pub struct WatchdogMonitor {
    period: Duration,
    sent_at: Option<Instant>,
    consecutive_misses: u32,
    last_rtt: Option<Duration>,
}

impl WatchdogMonitor {
    pub fn new(period: Duration) -> Self {
        WatchdogMonitor {
            period,
            sent_at: None,
            consecutive_misses: 0,
            last_rtt: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn last_rtt(&self) -> Option<Duration> {
        self.last_rtt
    }

    /// Fires on the timer tick. If a previous request is still outstanding,
    /// it counts as a miss; the caller should close the session once this
    /// returns `true` (two consecutive misses).
    pub fn on_tick(&mut self) -> bool {
        let missed = self.sent_at.is_some();
        if missed {
            self.consecutive_misses += 1;
        }
        self.sent_at = Some(Instant::now());
        self.consecutive_misses >= 2
    }

    /// Fires when a watchdog reply arrives; clears the outstanding flag and
    /// records the round trip.
    pub fn on_reply(&mut self) {
        if let Some(sent_at) = self.sent_at.take() {
            self.last_rtt = Some(sent_at.elapsed());
        }
        self.consecutive_misses = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn first_tick_never_counts_as_a_miss() {
        let mut monitor = WatchdogMonitor::new(Duration::from_secs(30));
        assert!(!monitor.on_tick());
    }

    #[test]
    fn two_consecutive_missed_replies_signal_close() {
        let mut monitor = WatchdogMonitor::new(Duration::from_millis(1));
        assert!(!monitor.on_tick());
        assert!(monitor.on_tick());
    }

    #[test]
    fn reply_resets_the_miss_counter_and_records_rtt() {
        let mut monitor = WatchdogMonitor::new(Duration::from_secs(30));
        monitor.on_tick();
        sleep(Duration::from_millis(5));
        monitor.on_reply();
        assert!(monitor.last_rtt.unwrap() >= Duration::from_millis(5));
        assert!(!monitor.on_tick());
    }
}
