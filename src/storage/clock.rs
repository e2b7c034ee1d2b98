//! Wall-clock time source.
//!
//! All expiration bookkeeping in the store is expressed as absolute epoch
//! milliseconds. Routing every time read through this module keeps the
//! comparison direction consistent (an entry is expired when
//! `now_millis() > expires_at_ms`) and gives tests a single place to
//! reason about.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time as milliseconds since the Unix epoch.
#[inline]
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// True when a deadline stamped at `expires_at_ms` has passed at `now_ms`.
#[inline]
pub fn is_expired_at(expires_at_ms: i64, now_ms: i64) -> bool {
    now_ms > expires_at_ms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_millis_is_monotonic_enough() {
        let a = now_millis();
        let b = now_millis();
        assert!(b >= a);
        // Sanity: we are well past 2020-01-01.
        assert!(a > 1_577_836_800_000);
    }

    #[test]
    fn test_expiry_comparison_is_strict() {
        assert!(!is_expired_at(100, 100));
        assert!(is_expired_at(100, 101));
        assert!(!is_expired_at(100, 99));
    }
}
