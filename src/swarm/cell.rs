//! Lock-free state cells for agent fields.
//!
//! Agent state is read concurrently by measurement while the loop writes
//! corrections, so every scalar field lives in an atomic cell. Floats are
//! bit-cast through `AtomicU64`; durations are stored as nanoseconds.
//! All accesses are `Relaxed`: no cross-field ordering is required, and
//! torn interleavings merely land on a different consistent ordering the
//! loop converges from anyway.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::domain::ports::ResourceManager;

// ---------------------------------------------------------------------------
// AtomicF64
// ---------------------------------------------------------------------------

/// An `f64` cell with atomic load/store/update.
#[derive(Debug)]
pub struct AtomicF64(AtomicU64);

impl AtomicF64 {
    /// Create a cell holding `value`.
    pub fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    /// Read the current value.
    pub fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    /// Replace the current value.
    pub fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }

    /// Apply `f` atomically (compare-and-swap loop) and return the value
    /// that was written.
    pub fn update(&self, mut f: impl FnMut(f64) -> f64) -> f64 {
        let mut written = self.load();
        let _ = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                written = f(f64::from_bits(bits));
                Some(written.to_bits())
            });
        written
    }
}

// ---------------------------------------------------------------------------
// AtomicDuration
// ---------------------------------------------------------------------------

/// A `Duration` cell stored as atomic nanoseconds.
#[derive(Debug)]
pub struct AtomicDuration(AtomicU64);

impl AtomicDuration {
    /// Create a cell holding `value`. Durations beyond `u64::MAX`
    /// nanoseconds (about 584 years) saturate.
    pub fn new(value: Duration) -> Self {
        Self(AtomicU64::new(Self::to_nanos(value)))
    }

    /// Read the current duration.
    pub fn load(&self) -> Duration {
        Duration::from_nanos(self.0.load(Ordering::Relaxed))
    }

    /// Replace the current duration.
    pub fn store(&self, value: Duration) {
        self.0.store(Self::to_nanos(value), Ordering::Relaxed);
    }

    fn to_nanos(value: Duration) -> u64 {
        u64::try_from(value.as_nanos()).unwrap_or(u64::MAX)
    }
}

// ---------------------------------------------------------------------------
// EnergyStore
// ---------------------------------------------------------------------------

/// Default [`ResourceManager`]: a capped atomic energy reservoir.
///
/// The balance can never go negative (requests deliver at most what is
/// present) and never exceeds capacity (top-ups saturate).
#[derive(Debug)]
pub struct EnergyStore {
    balance: AtomicF64,
    capacity: f64,
}

impl EnergyStore {
    /// A store starting full at `capacity`.
    pub fn full(capacity: f64) -> Self {
        Self {
            balance: AtomicF64::new(capacity),
            capacity,
        }
    }

    /// The configured capacity.
    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Force the balance to `value`, clamped into `[0, capacity]`. Test
    /// and chaos surface only.
    pub fn set(&self, value: f64) {
        self.balance.store(value.clamp(0.0, self.capacity));
    }
}

impl ResourceManager for EnergyStore {
    fn request(&self, amount: f64) -> f64 {
        let mut delivered = 0.0;
        self.balance.update(|current| {
            delivered = amount.max(0.0).min(current);
            current - delivered
        });
        delivered
    }

    fn release(&self, amount: f64) {
        self.replenish(amount);
    }

    fn replenish(&self, amount: f64) {
        let cap = self.capacity;
        self.balance
            .update(|current| (current + amount.max(0.0)).min(cap));
    }

    fn available(&self) -> f64 {
        self.balance.load()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_atomic_f64_roundtrip() {
        let cell = AtomicF64::new(1.5);
        assert_eq!(cell.load(), 1.5);
        cell.store(-2.25);
        assert_eq!(cell.load(), -2.25);
    }

    #[test]
    fn test_atomic_f64_update_returns_written() {
        let cell = AtomicF64::new(10.0);
        let written = cell.update(|v| v / 2.0);
        assert_eq!(written, 5.0);
        assert_eq!(cell.load(), 5.0);
    }

    #[test]
    fn test_atomic_duration_roundtrip() {
        let cell = AtomicDuration::new(Duration::from_millis(100));
        assert_eq!(cell.load(), Duration::from_millis(100));
        cell.store(Duration::from_micros(250));
        assert_eq!(cell.load(), Duration::from_micros(250));
    }

    #[test]
    fn test_energy_request_never_overdraws() {
        let store = EnergyStore::full(10.0);
        assert_eq!(store.request(4.0), 4.0);
        assert_eq!(store.request(100.0), 6.0);
        assert_eq!(store.available(), 0.0);
        assert_eq!(store.request(1.0), 0.0);
    }

    #[test]
    fn test_energy_replenish_caps_at_capacity() {
        let store = EnergyStore::full(10.0);
        store.request(3.0);
        store.replenish(50.0);
        assert_eq!(store.available(), 10.0);
    }

    #[test]
    fn test_energy_concurrent_requests_conserve_balance() {
        let store = Arc::new(EnergyStore::full(1000.0));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                let mut taken = 0.0;
                for _ in 0..100 {
                    taken += store.request(1.0);
                }
                taken
            }));
        }
        let total: f64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert!((total + store.available() - 1000.0).abs() < 1e-9);
        assert!(store.available() >= 0.0);
    }
}
