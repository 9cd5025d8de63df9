//! Idle-timeout reaper
//!
//! Strategi: periodic full sweep dengan shortcut minimum timestamp.
//! Karena `last_activity` hanya bisa maju, koneksi paling lama yang terlihat
//! saat sweep terakhir menentukan kapan paling cepat ada yang bisa expire.
//! Sebelum deadline itu, sweep dilewati tanpa scan.

use std::time::{Duration, Instant};

use mio::Token;
use tracing::info;

use crate::core::Registry;

// Timeout diukur dengan `>`, jadi deadline digeser sedikit supaya tidak
// spin di sekitar batas milidetik
const SWEEP_SLACK: Duration = Duration::from_millis(1);

#[derive(Debug)]
pub struct Reaper {
    timeout: Duration,
    next_deadline: Option<Instant>,
}

impl Reaper {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            next_deadline: None,
        }
    }

    #[inline(always)]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Catat aktivitas koneksi baru
    pub fn track(&mut self, activity: Instant) {
        let deadline = activity + self.timeout + SWEEP_SLACK;
        self.next_deadline = Some(match self.next_deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
    }

    /// Berapa lama readiness wait boleh tidur. `None` = tidak ada koneksi untuk diawasi.
    pub fn poll_timeout(&self, now: Instant) -> Option<Duration> {
        self.next_deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    #[inline]
    pub fn is_due(&self, now: Instant) -> bool {
        matches!(self.next_deadline, Some(deadline) if now >= deadline)
    }

    /// Evict semua koneksi idle lebih lama dari timeout. Returns token yang di-evict.
    pub fn sweep(&mut self, registry: &Registry, now: Instant) -> Vec<Token> {
        if !self.is_due(now) {
            return Vec::new();
        }

        let sweep = registry.sweep(now, self.timeout);
        let mut evicted = Vec::with_capacity(sweep.expired.len());
        for token in sweep.expired {
            if registry.remove(token) {
                info!(token = token.0, "idle timeout, connection evicted");
                evicted.push(token);
            }
        }

        self.next_deadline = sweep
            .oldest
            .map(|oldest| oldest + self.timeout + SWEEP_SLACK);
        evicted
    }
}
