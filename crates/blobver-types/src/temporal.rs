use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Creation stamp of a version blob, in milliseconds since the UNIX epoch.
///
/// The stamp is embedded in the version's blob name. The object store's own
/// upload timestamp remains the primary ordering key; the stamp is the
/// secondary key used when two uploads report the same instant.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionStamp(u64);

impl VersionStamp {
    /// Create a stamp from raw epoch milliseconds.
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// A stamp for the current wall-clock time.
    pub fn now() -> Self {
        Self(wall_clock_ms())
    }

    /// Epoch milliseconds.
    pub fn as_millis(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for VersionStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VersionStamp({}ms)", self.0)
    }
}

impl fmt::Display for VersionStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic issuer of [`VersionStamp`]s.
///
/// Two writes from the same process in the same millisecond would otherwise
/// produce the same blob name. `next()` returns `max(now, last + 1)` so every
/// stamp handed out by one clock is unique and strictly increasing.
#[derive(Debug, Default)]
pub struct VersionClock {
    last: AtomicU64,
}

impl VersionClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next stamp.
    pub fn next(&self) -> VersionStamp {
        self.next_at(wall_clock_ms())
    }

    /// Issue the next stamp given an explicit wall-clock reading.
    pub fn next_at(&self, now_ms: u64) -> VersionStamp {
        let mut last = self.last.load(Ordering::Acquire);
        loop {
            let candidate = now_ms.max(last.saturating_add(1));
            match self.last.compare_exchange_weak(
                last,
                candidate,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return VersionStamp(candidate),
                Err(actual) => last = actual,
            }
        }
    }

    /// Record a stamp seen elsewhere so later stamps sort after it.
    pub fn observe(&self, seen: VersionStamp) {
        self.last.fetch_max(seen.0, Ordering::AcqRel);
    }

    /// The most recent stamp issued or observed.
    pub fn last(&self) -> VersionStamp {
        VersionStamp(self.last.load(Ordering::Acquire))
    }
}

fn wall_clock_ms() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_by_millis() {
        let a = VersionStamp::from_millis(100);
        let b = VersionStamp::from_millis(200);
        assert!(a < b);
        assert_eq!(a.max(b), b);
    }

    #[test]
    fn now_produces_reasonable_timestamp() {
        let stamp = VersionStamp::now();
        // Should be after 2020-01-01 (1577836800000 ms)
        assert!(stamp.as_millis() > 1_577_836_800_000);
    }

    #[test]
    fn clock_is_strictly_increasing_within_one_millisecond() {
        let clock = VersionClock::new();
        let a = clock.next_at(1_000);
        let b = clock.next_at(1_000);
        let c = clock.next_at(1_000);
        assert_eq!(a.as_millis(), 1_000);
        assert_eq!(b.as_millis(), 1_001);
        assert_eq!(c.as_millis(), 1_002);
    }

    #[test]
    fn clock_follows_wall_clock_when_ahead() {
        let clock = VersionClock::new();
        clock.next_at(1_000);
        assert_eq!(clock.next_at(5_000).as_millis(), 5_000);
    }

    #[test]
    fn clock_does_not_go_backwards() {
        let clock = VersionClock::new();
        clock.next_at(5_000);
        assert_eq!(clock.next_at(10).as_millis(), 5_001);
    }

    #[test]
    fn observe_advances_past_foreign_stamp() {
        let clock = VersionClock::new();
        clock.observe(VersionStamp::from_millis(9_000));
        assert_eq!(clock.last().as_millis(), 9_000);
        assert_eq!(clock.next_at(100).as_millis(), 9_001);
        // Observing an older stamp changes nothing.
        clock.observe(VersionStamp::from_millis(1));
        assert_eq!(clock.last().as_millis(), 9_001);
    }

    #[test]
    fn concurrent_clock_never_repeats() {
        use std::collections::HashSet;
        use std::sync::Arc;
        use std::thread;

        let clock = Arc::new(VersionClock::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let clock = Arc::clone(&clock);
                thread::spawn(move || (0..200).map(|_| clock.next_at(42)).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for h in handles {
            for stamp in h.join().expect("thread should not panic") {
                assert!(seen.insert(stamp), "duplicate stamp {stamp}");
            }
        }
        assert_eq!(seen.len(), 1_600);
    }

    #[test]
    fn serde_is_a_bare_number() {
        let stamp = VersionStamp::from_millis(1234567890);
        let json = serde_json::to_string(&stamp).unwrap();
        assert_eq!(json, "1234567890");
        let parsed: VersionStamp = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, stamp);
    }

    #[test]
    fn display_format() {
        assert_eq!(format!("{}", VersionStamp::from_millis(1000)), "1000");
    }
}
