//! The nine named aggregation cadences (§4.5) a data collector can select,
//! and the persistent table each one writes its buckets into. `Initial`
//! never rotates — it is the one-shot commissioning readout captured the
//! first time a meter answers, so every timestamp folds into bucket zero.
use std::collections::VecDeque;

use smf_store::Columns;
use smf_types::ServerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Profile {
    OneMin,
    FifteenMin,
    SixtyMin,
    Day24h,
    Last2h,
    LastWeek,
    OneMonth,
    OneYear,
    Initial,
}

impl Profile {
    pub const ALL: [Profile; 9] = [
        Profile::OneMin,
        Profile::FifteenMin,
        Profile::SixtyMin,
        Profile::Day24h,
        Profile::Last2h,
        Profile::LastWeek,
        Profile::OneMonth,
        Profile::OneYear,
        Profile::Initial,
    ];

    /// Bucket span in seconds. `Initial` has none — every readout lands in
    /// the same bucket, so `bucket_of` special-cases it below rather than
    /// dividing by zero.
    pub fn step_seconds(self) -> u64 {
        match self {
            Profile::OneMin => 60,
            Profile::FifteenMin => 15 * 60,
            Profile::SixtyMin => 60 * 60,
            Profile::Day24h => 24 * 60 * 60,
            Profile::Last2h => 2 * 60 * 60,
            Profile::LastWeek => 7 * 24 * 60 * 60,
            Profile::OneMonth => 30 * 24 * 60 * 60,
            Profile::OneYear => 365 * 24 * 60 * 60,
            Profile::Initial => 0,
        }
    }

    /// The persistent table a bucket for this profile is written into.
    pub fn table_name(self) -> &'static str {
        match self {
            Profile::OneMin => "_Profile1Min",
            Profile::FifteenMin => "_Profile15Min",
            Profile::SixtyMin => "_Profile60Min",
            Profile::Day24h => "_Profile24h",
            Profile::Last2h => "_ProfileLast2h",
            Profile::LastWeek => "_ProfileLastWeek",
            Profile::OneMonth => "_Profile1Month",
            Profile::OneYear => "_Profile1Year",
            Profile::Initial => "_ProfileInitial",
        }
    }

    /// `floor(ts / step)`, the bucket index a reading at `ts` belongs to.
    pub fn bucket_of(self, ts: u64) -> u64 {
        match self.step_seconds() {
            0 => 0,
            step => ts / step,
        }
    }
}

/// Default number of buckets kept per `(server-id, profile)` so a failed
/// mid-cycle push has something recent to resend (§4.5 push scheduling).
pub const DEFAULT_HISTORY_DEPTH: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    pub server_id: ServerId,
    pub bucket_key: u64,
    pub body: Columns,
}

/// A bounded FIFO of a single `(server-id, profile)`'s most recent buckets.
/// Not a cache of everything ever written — the persistent table already
/// holds full history; this is only what a push task may need to retry.
#[derive(Debug, Default)]
pub struct BucketRing {
    depth: usize,
    buckets: VecDeque<Bucket>,
}

impl BucketRing {
    pub fn new() -> Self {
        Self::with_depth(DEFAULT_HISTORY_DEPTH)
    }

    pub fn with_depth(depth: usize) -> Self {
        BucketRing {
            depth: depth.max(1),
            buckets: VecDeque::new(),
        }
    }

    pub fn push(&mut self, bucket: Bucket) {
        self.buckets.push_back(bucket);
        while self.buckets.len() > self.depth {
            self.buckets.pop_front();
        }
    }

    pub fn most_recent(&self) -> Option<&Bucket> {
        self.buckets.back()
    }

    /// `n = 0` is the most recent, `n = 1` the one before it, and so on —
    /// a failed push retries by asking for the bucket it last tried plus
    /// one step further back.
    pub fn nth_from_latest(&self, n: usize) -> Option<&Bucket> {
        let len = self.buckets.len();
        if n >= len {
            return None;
        }
        self.buckets.get(len - 1 - n)
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sid() -> ServerId {
        ServerId::new(vec![0x05, 1, 2, 3, 4, 5, 6]).unwrap()
    }

    fn bucket(key: u64) -> Bucket {
        Bucket {
            server_id: sid(),
            bucket_key: key,
            body: Columns::new(),
        }
    }

    #[test]
    fn sixty_min_buckets_floor_to_the_hour() {
        assert_eq!(Profile::SixtyMin.bucket_of(3600), 1);
        assert_eq!(Profile::SixtyMin.bucket_of(3599), 0);
        assert_eq!(Profile::SixtyMin.bucket_of(7199), 1);
    }

    #[test]
    fn initial_profile_always_lands_in_bucket_zero() {
        assert_eq!(Profile::Initial.bucket_of(0), 0);
        assert_eq!(Profile::Initial.bucket_of(1_000_000), 0);
    }

    #[test]
    fn ring_evicts_the_oldest_bucket_past_its_depth() {
        let mut ring = BucketRing::with_depth(3);
        for k in 0..5 {
            ring.push(bucket(k));
        }
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.most_recent().unwrap().bucket_key, 4);
        assert_eq!(ring.nth_from_latest(0).unwrap().bucket_key, 4);
        assert_eq!(ring.nth_from_latest(1).unwrap().bucket_key, 3);
        assert_eq!(ring.nth_from_latest(2).unwrap().bucket_key, 2);
        assert!(ring.nth_from_latest(3).is_none());
    }

    #[test]
    fn empty_ring_has_no_most_recent() {
        let ring = BucketRing::new();
        assert!(ring.most_recent().is_none());
        assert!(ring.is_empty());
    }
}
