//! Sequence-number allocation and pending-request bookkeeping for one
//! IP-T session (§4.2). `seq` is the originator's correlation key: it
//! allocates a slot, stores what the slot is waiting for, and matches the
//! eventual response (or times it out) against that same number. `0` is
//! reserved for the asynchronous watchdog and is never allocated here.
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::command::Command;
use crate::framing::Frame;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

struct Pending {
    command: Command,
    sent_at: Instant,
}

/// One outstanding request has either already been answered (`Ok(Frame)`)
/// or timed out (`Err(TimedOut)`); a caller blocks on this to get whichever
/// comes first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Answered(Frame),
    TimedOut,
}

/// Tracks allocated sequence numbers and what each one is waiting for.
/// Plain bookkeeping, no socket: a session's read loop calls `complete`
/// when a response frame arrives and `expire_overdue` on a periodic tick.
pub struct PendingRequests {
    next_seq: Mutex<u8>,
    pending: Mutex<HashMap<u8, Pending>>,
    timeout: Duration,
}

impl PendingRequests {
    pub fn new() -> Self {
        PendingRequests::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        PendingRequests {
            next_seq: Mutex::new(1),
            pending: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    /// Allocates the next sequence number, wrapping from 255 back to 1
    /// (never reissuing 0) and registers it as awaiting a reply to
    /// `command`.
    pub fn allocate(&self, command: Command) -> u8 {
        let mut next = self.next_seq.lock().unwrap();
        let seq = *next;
        *next = if *next == 255 { 1 } else { *next + 1 };
        drop(next);
        self.pending.lock().unwrap().insert(
            seq,
            Pending {
                command,
                sent_at: Instant::now(),
            },
        );
        seq
    }

    /// Resolves `seq` against an incoming response frame. Returns `false`
    /// if `seq` was not outstanding (stale or unsolicited response — the
    /// caller should drop the frame and log a protocol warning).
    pub fn complete(&self, frame: &Frame) -> bool {
        self.pending.lock().unwrap().remove(&frame.seq).is_some()
    }

    /// Sweeps requests older than the configured timeout, returning the
    /// `(seq, command)` of each so the caller can synthesize a failure
    /// response for its waiting task.
    pub fn expire_overdue(&self) -> Vec<(u8, Command)> {
        let now = Instant::now();
        let mut pending = self.pending.lock().unwrap();
        let overdue: Vec<u8> = pending
            .iter()
            .filter(|(_, p)| now.duration_since(p.sent_at) >= self.timeout)
            .map(|(seq, _)| *seq)
            .collect();
        overdue
            .into_iter()
            .map(|seq| {
                let p = pending.remove(&seq).unwrap();
                (seq, p.command)
            })
            .collect()
    }

    pub fn outstanding_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }
}

impl Default for PendingRequests {
    fn default() -> Self {
        PendingRequests::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_skips_zero_and_wraps_at_255() {
        let p = PendingRequests::new();
        assert_eq!(p.allocate(Command::WatchdogReq), 1);
        let mut next = p.next_seq.lock().unwrap();
        *next = 255;
        drop(next);
        assert_eq!(p.allocate(Command::WatchdogReq), 255);
        assert_eq!(p.allocate(Command::WatchdogReq), 1);
    }

    #[test]
    fn complete_resolves_an_outstanding_seq_once() {
        let p = PendingRequests::new();
        let seq = p.allocate(Command::OpenConnectionReq);
        let frame = Frame::new(seq, Command::OpenConnectionRes.code(), vec![]);
        assert!(p.complete(&frame));
        assert!(!p.complete(&frame));
    }

    #[test]
    fn unsolicited_response_is_not_completed() {
        let p = PendingRequests::new();
        let frame = Frame::new(42, Command::OpenConnectionRes.code(), vec![]);
        assert!(!p.complete(&frame));
    }

    #[test]
    fn expire_overdue_drains_requests_past_the_timeout() {
        let p = PendingRequests::with_timeout(Duration::from_millis(1));
        let seq = p.allocate(Command::TransferPushDataReq);
        std::thread::sleep(Duration::from_millis(5));
        let overdue = p.expire_overdue();
        assert_eq!(overdue, vec![(seq, Command::TransferPushDataReq)]);
        assert_eq!(p.outstanding_count(), 0);
    }

    #[test]
    fn fresh_requests_are_not_expired() {
        let p = PendingRequests::with_timeout(Duration::from_secs(30));
        p.allocate(Command::OpenConnectionReq);
        assert!(p.expire_overdue().is_empty());
    }
}
