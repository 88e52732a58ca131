//! # Replay Guard
//!
//! Nonces of accepted value-transferring requests. Check-and-insert happens
//! under one lock, so concurrent requests with the same nonce have exactly
//! one winner.
//!
//! ## Retention
//!
//! - `Unbounded` (default): a nonce is never admitted twice for the life of
//!   the process. Memory grows with accepted transfers.
//! - `Window`: nonces are forgotten after `ttl`, and at most `max_entries`
//!   live nonces are held. When the window is full of live nonces, new ones
//!   are refused rather than evicting live entries.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

use super::EnvelopeError;

/// How long admitted nonces are remembered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NonceRetention {
    #[default]
    Unbounded,
    Window { ttl: Duration, max_entries: usize },
}

struct Inner {
    seen: HashMap<String, Instant>,
    last_gc: Instant,
}

/// Process-wide nonce set, owned by the envelope verifier.
pub struct ReplayGuard {
    retention: NonceRetention,
    inner: Mutex<Inner>,
}

impl ReplayGuard {
    /// Minimum spacing between garbage collections in window mode.
    const GC_INTERVAL: Duration = Duration::from_secs(10);

    pub fn new(retention: NonceRetention) -> Self {
        Self {
            retention,
            inner: Mutex::new(Inner {
                seen: HashMap::new(),
                last_gc: Instant::now(),
            }),
        }
    }

    pub fn retention(&self) -> NonceRetention {
        self.retention
    }

    /// Admit `nonce` if it has not been seen.
    pub fn check_and_insert(&self, nonce: &str) -> Result<(), EnvelopeError> {
        self.check_and_insert_at(nonce, Instant::now())
    }

    fn check_and_insert_at(&self, nonce: &str, now: Instant) -> Result<(), EnvelopeError> {
        let mut inner = self.inner.lock();

        if let NonceRetention::Window { ttl, max_entries } = self.retention {
            let full = inner.seen.len() >= max_entries;
            if full || now.saturating_duration_since(inner.last_gc) >= Self::GC_INTERVAL {
                let before = inner.seen.len();
                inner
                    .seen
                    .retain(|_, admitted| now.saturating_duration_since(*admitted) < ttl);
                inner.last_gc = now;
                debug!(removed = before - inner.seen.len(), "Nonce window collected");
            }

            if let Some(admitted) = inner.seen.get(nonce) {
                if now.saturating_duration_since(*admitted) < ttl {
                    return Err(EnvelopeError::Replay(nonce.to_string()));
                }
            } else if inner.seen.len() >= max_entries {
                return Err(EnvelopeError::ReplayCapacity(inner.seen.len()));
            }
        } else if inner.seen.contains_key(nonce) {
            return Err(EnvelopeError::Replay(nonce.to_string()));
        }

        inner.seen.insert(nonce.to_string(), now);
        Ok(())
    }

    /// Number of remembered nonces.
    pub fn len(&self) -> usize {
        self.inner.lock().seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ReplayGuard {
    fn default() -> Self {
        Self::new(NonceRetention::Unbounded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_second_use_rejected() {
        let guard = ReplayGuard::default();
        assert!(guard.check_and_insert("n1").is_ok());
        assert_eq!(
            guard.check_and_insert("n1"),
            Err(EnvelopeError::Replay("n1".into()))
        );
        assert!(guard.check_and_insert("n2").is_ok());
        assert_eq!(guard.len(), 2);
    }

    #[test]
    fn test_concurrent_same_nonce_single_winner() {
        let guard = Arc::new(ReplayGuard::default());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let guard = Arc::clone(&guard);
                std::thread::spawn(move || guard.check_and_insert("shared").is_ok())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_window_forgets_after_ttl() {
        let guard = ReplayGuard::new(NonceRetention::Window {
            ttl: Duration::from_secs(60),
            max_entries: 100,
        });
        let start = Instant::now();

        assert!(guard.check_and_insert_at("n1", start).is_ok());
        assert!(guard
            .check_and_insert_at("n1", start + Duration::from_secs(30))
            .is_err());
        assert!(guard
            .check_and_insert_at("n1", start + Duration::from_secs(61))
            .is_ok());
    }

    #[test]
    fn test_window_full_refuses_new_nonces() {
        let guard = ReplayGuard::new(NonceRetention::Window {
            ttl: Duration::from_secs(60),
            max_entries: 2,
        });
        let start = Instant::now();

        guard.check_and_insert_at("a", start).unwrap();
        guard.check_and_insert_at("b", start).unwrap();
        assert_eq!(
            guard.check_and_insert_at("c", start + Duration::from_secs(1)),
            Err(EnvelopeError::ReplayCapacity(2))
        );

        // Once the old entries expire there is room again.
        assert!(guard
            .check_and_insert_at("c", start + Duration::from_secs(90))
            .is_ok());
        assert_eq!(guard.len(), 1);
    }
}
