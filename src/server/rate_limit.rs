//! Sliding-window send quota
//!
//! The limiter itself is a stateless policy; the per-session counters it
//! operates on live in the session record owned by the connection registry,
//! so they survive disconnect and reconnect. The window only advances on an
//! active send attempt: there is no background sweep resetting counters.

use std::time::Duration;

use tokio::time::Instant;

use crate::error::{RelayError, Result};
use crate::server::registry::ThrottleState;

/// Per-session send quota over a fixed window
#[derive(Debug, Clone)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window }
    }

    /// Apply the quota to one send attempt
    ///
    /// Crossing the limit flips the session over-limit and schedules the
    /// window reset; while over-limit and inside the window every attempt is
    /// rejected. The first attempt at or past the reset point clears the
    /// flag, zeroes the counter, and is itself accepted (counting as 1).
    /// Rejected sends are not buffered.
    pub fn check(&self, state: &mut ThrottleState, now: Instant) -> Result<()> {
        if state.over_limit {
            match state.window_reset_at {
                Some(reset_at) if now >= reset_at => {
                    state.over_limit = false;
                    state.window_reset_at = None;
                    state.sent_count = 0;
                }
                _ => {
                    return Err(RelayError::rate_limited(format!(
                        "Send quota of {} messages exhausted, retry after the window elapses",
                        self.limit
                    )));
                }
            }
        } else if state.sent_count >= self.limit {
            state.over_limit = true;
            state.window_reset_at = Some(now + self.window);
            return Err(RelayError::rate_limited(format!(
                "Send quota of {} messages exhausted, retry after the window elapses",
                self.limit
            )));
        }

        state.sent_count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> RateLimiter {
        RateLimiter::new(20, Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn test_twenty_first_send_is_rejected() {
        let limiter = limiter();
        let mut state = ThrottleState::default();
        let now = Instant::now();

        for _ in 0..20 {
            limiter.check(&mut state, now).unwrap();
        }
        assert_eq!(state.sent_count, 20);
        assert!(!state.over_limit);

        let err = limiter.check(&mut state, now).unwrap_err();
        assert!(matches!(err, RelayError::RateLimited(_)));
        assert!(state.over_limit);
        assert!(state.window_reset_at.is_some());
    }

    #[tokio::test]
    async fn test_rejections_repeat_inside_window() {
        let limiter = limiter();
        let mut state = ThrottleState::default();
        let now = Instant::now();

        for _ in 0..20 {
            limiter.check(&mut state, now).unwrap();
        }
        assert!(limiter.check(&mut state, now).is_err());

        let inside = now + Duration::from_secs(1800);
        assert!(limiter.check(&mut state, inside).is_err());
        // Counter untouched while over-limit
        assert_eq!(state.sent_count, 20);
    }

    #[tokio::test]
    async fn test_window_expiry_accepts_and_counts_one() {
        let limiter = limiter();
        let mut state = ThrottleState::default();
        let now = Instant::now();

        for _ in 0..20 {
            limiter.check(&mut state, now).unwrap();
        }
        assert!(limiter.check(&mut state, now).is_err());

        let after = now + Duration::from_secs(3600);
        limiter.check(&mut state, after).unwrap();
        assert_eq!(state.sent_count, 1);
        assert!(!state.over_limit);
        assert!(state.window_reset_at.is_none());
    }

    #[tokio::test]
    async fn test_window_starts_at_the_rejecting_attempt() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let mut state = ThrottleState::default();
        let now = Instant::now();

        limiter.check(&mut state, now).unwrap();
        limiter.check(&mut state, now).unwrap();
        assert_eq!(state.sent_count, 2);

        // Idle time does not reset the counter; the limit still trips, and
        // the reset point is measured from this attempt
        let later = now + Duration::from_secs(120);
        assert!(limiter.check(&mut state, later).is_err());
        assert_eq!(state.window_reset_at, Some(later + Duration::from_secs(60)));

        limiter
            .check(&mut state, later + Duration::from_secs(60))
            .unwrap();
        assert_eq!(state.sent_count, 1);
    }
}
