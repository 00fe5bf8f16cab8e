//! Cancellation and progress reporting for long running computations.
//!
//! Both handles are cheap to clone and can be shared with a thread that observes (or stops) a
//! computation running elsewhere.
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

/// Shared flag polled by long loops. Once set, the computation aborts at its next check.
#[derive(Debug, Clone, Default)]
pub struct StopToken(Arc<AtomicBool>);

impl StopToken {
    /// Creates a new [`StopToken`] which is not yet stopped.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    /// Request the computation to stop.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
    /// Clear a previous stop request.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
    /// Returns `true` if a stop was requested.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Monotonically increasing fraction in `[0, 1]`.
///
/// The value is stored as the bit pattern of a non-negative `f64`. For non-negative floats the bit
/// patterns are ordered like the values themselves, which allows `fetch_max`.
#[derive(Debug, Clone, Default)]
pub struct Progress(Arc<AtomicU64>);

impl Progress {
    /// Creates a new [`Progress`] at 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    /// Raise the progress to `fraction`. Values lower than the current one are ignored.
    pub fn advance(&self, fraction: f64) {
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            return;
        };
        self.0.fetch_max(fraction.to_bits(), Ordering::SeqCst);
    }
    /// Restart at 0 (for a new computation).
    pub fn restart(&self) {
        self.0.store(0.0_f64.to_bits(), Ordering::SeqCst);
    }
    /// Current progress.
    #[must_use]
    pub fn fraction(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::SeqCst))
    }
}
