//! Redundancy list cycling and randomized back-off for a gateway's upstream
//! IP-T connection (§4.2, §5 `ipt[]`). A session holds one of these and
//! asks it, on every connection loss, which target to try next and how
//! long to wait first.
use std::time::Duration;

use crate::scramble::ScrambleKey;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedundancyTarget {
    pub host: String,
    pub service: u16,
    pub account: String,
    pub pwd: String,
    pub def_sk: ScrambleKey,
    pub scrambled: bool,
    pub monitor: bool,
}

/// Cycles through a configured redundancy list, handing out a randomized
/// back-off in `[min, max]` each time a connection attempt fails. Boot-time
/// randomization (rather than a fixed schedule) keeps a fleet of gateways
/// reconnecting to the same master from synchronizing into a thundering
/// herd after a shared outage.
pub struct Reconnector {
    targets: Vec<RedundancyTarget>,
    next: usize,
    min_backoff: Duration,
    max_backoff: Duration,
}

impl Reconnector {
    pub fn new(targets: Vec<RedundancyTarget>) -> Self {
        Reconnector {
            targets,
            next: 0,
            min_backoff: Duration::from_secs(10),
            max_backoff: Duration::from_secs(120),
        }
    }

    pub fn with_backoff_range(mut self, min: Duration, max: Duration) -> Self {
        self.min_backoff = min;
        self.max_backoff = max;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// The next target to dial, cycling back to the start of the list once
    /// exhausted.
    pub fn next_target(&mut self) -> Option<&RedundancyTarget> {
        if self.targets.is_empty() {
            return None;
        }
        let target = &self.targets[self.next];
        self.next = (self.next + 1) % self.targets.len();
        Some(target)
    }

    pub fn backoff(&self) -> Duration {
        let min_ms = self.min_backoff.as_millis() as u64;
        let max_ms = self.max_backoff.as_millis() as u64;
        if max_ms <= min_ms {
            return self.min_backoff;
        }
        Duration::from_millis(rand::random_range(min_ms..=max_ms))
    }

    /// Applies a redirect carried in a login response by reordering the
    /// list so the redirected host is tried first, without discarding the
    /// rest of the configured redundancy list.
    pub fn redirect_to(&mut self, host: &str, service: u16) {
        if let Some(pos) = self
            .targets
            .iter()
            .position(|t| t.host == host && t.service == service)
        {
            self.targets.swap(0, pos);
            self.next = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(host: &str) -> RedundancyTarget {
        RedundancyTarget {
            host: host.into(),
            service: 7000,
            account: "root".into(),
            pwd: "root".into(),
            def_sk: ScrambleKey::default_key(),
            scrambled: false,
            monitor: false,
        }
    }

    #[test]
    fn cycles_through_targets_in_order_and_wraps() {
        let mut r = Reconnector::new(vec![target("a"), target("b"), target("c")]);
        assert_eq!(r.next_target().unwrap().host, "a");
        assert_eq!(r.next_target().unwrap().host, "b");
        assert_eq!(r.next_target().unwrap().host, "c");
        assert_eq!(r.next_target().unwrap().host, "a");
    }

    #[test]
    fn empty_list_yields_no_target() {
        let mut r = Reconnector::new(vec![]);
        assert!(r.next_target().is_none());
    }

    #[test]
    fn backoff_stays_within_configured_bounds() {
        let r = Reconnector::new(vec![target("a")])
            .with_backoff_range(Duration::from_secs(10), Duration::from_secs(120));
        for _ in 0..200 {
            let b = r.backoff();
            assert!(b >= Duration::from_secs(10) && b <= Duration::from_secs(120));
        }
    }

    #[test]
    fn redirect_moves_matching_target_to_the_front() {
        let mut r = Reconnector::new(vec![target("a"), target("b"), target("c")]);
        r.redirect_to("c", 7000);
        assert_eq!(r.next_target().unwrap().host, "c");
        assert_eq!(r.next_target().unwrap().host, "a");
    }

    #[test]
    fn redirect_to_unknown_host_is_a_no_op() {
        let mut r = Reconnector::new(vec![target("a"), target("b")]);
        r.redirect_to("z", 9999);
        assert_eq!(r.next_target().unwrap().host, "a");
    }
}
