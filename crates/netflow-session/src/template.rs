//! Cached template slots and the recency marker used for idle eviction.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Second-chance marker shared by template slots and sessions.
///
/// `false` means the entry was used since the last sweep. A sweep arms the
/// marker by flipping it to `true`; a sweep that finds it already armed makes
/// the entry an eviction candidate. Any use disarms it again.
#[derive(Debug, Default)]
pub struct RecencyMarker(AtomicBool);

impl RecencyMarker {
    /// Create a disarmed marker.
    pub fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Record a use, cancelling any pending eviction.
    pub fn touch(&self) {
        self.0.store(false, Ordering::Release);
    }

    /// Arm the marker. Returns `false` if it was already armed, meaning the
    /// entry went a whole sweep interval without being used.
    pub fn arm(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Whether the marker is still armed.
    pub fn is_armed(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// A cached template with its recency marker.
#[derive(Debug)]
pub struct TemplateSlot<T> {
    template: Arc<T>,
    marker: RecencyMarker,
}

impl<T> TemplateSlot<T> {
    /// Wrap a template. The marker starts disarmed.
    pub fn new(template: Arc<T>) -> Self {
        Self {
            template,
            marker: RecencyMarker::new(),
        }
    }

    /// The cached template.
    pub fn template(&self) -> &Arc<T> {
        &self.template
    }

    /// The slot's recency marker.
    pub fn marker(&self) -> &RecencyMarker {
        &self.marker
    }
}
