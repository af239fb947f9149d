//! An injected clock source, per `SPEC_FULL.md` Section 5/6: the core reads
//! wall-clock microseconds through a caller-supplied clock rather than
//! calling `SystemTime::now()` directly, so tests can control nonce
//! expiry deterministically.

use std::time::{SystemTime, UNIX_EPOCH};

/// A source of monotonic (non-decreasing across consecutive calls)
/// microseconds since the Unix epoch.
pub trait Clock {
    fn now_micros(&self) -> u64;
}

/// The default clock, backed by [`SystemTime::now`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_micros(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock predates the Unix epoch")
            .as_micros() as u64
    }
}

/// A clock that returns a fixed, caller-controlled value. Used by tests that
/// need deterministic nonce expiry.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    fn now_micros(&self) -> u64 {
        self.0
    }
}
