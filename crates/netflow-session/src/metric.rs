//! Live session counter sinks.

use std::sync::atomic::{AtomicI64, Ordering};

/// Sink tracking the number of live sessions.
///
/// Implemented by the decoder's metrics backend. The registry calls `inc`
/// once per created session and `dec` once per expired session.
pub trait ActiveSessionsMetric: Send + Sync {
    /// A session was created.
    fn inc(&self);

    /// A session was removed.
    fn dec(&self);
}

/// Metric sink that discards updates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetric;

impl ActiveSessionsMetric for NoopMetric {
    fn inc(&self) {}

    fn dec(&self) {}
}

/// In-process gauge for decoders without a metrics backend.
#[derive(Debug, Default)]
pub struct SessionGauge(AtomicI64);

impl SessionGauge {
    /// Create a gauge at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value.
    pub fn get(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }
}

impl ActiveSessionsMetric for SessionGauge {
    fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    fn dec(&self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}
