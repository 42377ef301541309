//! Per observation domain template table and sequence tracking.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::key::{SessionKey, TemplateId};
use crate::sequence::{MAX_SEQUENCE_DIFFERENCE, is_valid_sequence};
use crate::template::{RecencyMarker, TemplateSlot};

/// Outcome of [`Session::expire_templates`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpireStats {
    /// Templates still cached after the sweep.
    pub alive: usize,
    /// Templates evicted by the sweep.
    pub removed: usize,
}

impl ExpireStats {
    /// Whether the sweep evicted anything.
    pub fn has_removals(&self) -> bool {
        self.removed > 0
    }
}

impl fmt::Display for ExpireStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} templates expired ({} remain)", self.removed, self.alive)
    }
}

/// Outcome of [`Session::check_reset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceCheck {
    /// Sequence number recorded before this packet, `None` on the first packet.
    pub previous: Option<u32>,
    /// True if the gap was out of tolerance and all templates were dropped.
    pub reset: bool,
}

/// State guarded by the session lock.
struct SessionState<T> {
    templates: HashMap<TemplateId, TemplateSlot<T>>,
    last_sequence: Option<u32>,
}

/// Template table and sequence state for one observation domain.
///
/// Sessions are owned by a [`SessionMap`](crate::SessionMap); the decode path
/// holds an `Arc<Session<T>>` only for the packet being decoded.
pub struct Session<T> {
    key: SessionKey,
    state: RwLock<SessionState<T>>,
    marker: RecencyMarker,
    max_sequence_difference: u32,
}

impl<T> Session<T> {
    /// Create an empty session using the default sequence tolerance.
    pub fn new(key: SessionKey) -> Self {
        Self::with_max_sequence_difference(key, MAX_SEQUENCE_DIFFERENCE)
    }

    /// Create an empty session with a custom sequence tolerance.
    pub fn with_max_sequence_difference(key: SessionKey, max_sequence_difference: u32) -> Self {
        Self {
            key,
            state: RwLock::new(SessionState {
                templates: HashMap::new(),
                last_sequence: None,
            }),
            marker: RecencyMarker::new(),
            max_sequence_difference,
        }
    }

    /// The key this session is registered under.
    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    /// Insert or replace the template for `id`.
    ///
    /// A re-announced template supersedes the old one. The new slot starts
    /// with a disarmed marker.
    pub fn add_template(&self, id: TemplateId, template: Arc<T>) {
        trace!(session = %self.key, template_id = id, "Adding template");
        let mut state = self.state.write();
        state.templates.insert(id, TemplateSlot::new(template));
    }

    /// Look up a template, marking it as used.
    pub fn get_template(&self, id: TemplateId) -> Option<Arc<T>> {
        let state = self.state.read();
        state.templates.get(&id).map(|slot| {
            slot.marker().touch();
            Arc::clone(slot.template())
        })
    }

    /// Evict templates that have not been read since the previous sweep.
    ///
    /// The first pass arms every marker under the read lock. Slots whose
    /// marker was already armed are re-checked and removed under the write
    /// lock, so a `get_template` racing between the passes keeps its slot.
    pub fn expire_templates(&self) -> ExpireStats {
        let (candidates, mut total) = {
            let state = self.state.read();
            let candidates: Vec<TemplateId> = state
                .templates
                .iter()
                .filter(|(_, slot)| !slot.marker().arm())
                .map(|(id, _)| *id)
                .collect();
            (candidates, state.templates.len())
        };

        let mut removed = 0;
        if !candidates.is_empty() {
            let mut state = self.state.write();
            total = state.templates.len();
            for id in candidates {
                let still_idle = state
                    .templates
                    .get(&id)
                    .is_some_and(|slot| slot.marker().is_armed());
                if still_idle {
                    debug!(session = %self.key, template_id = id, "Expired template");
                    state.templates.remove(&id);
                    removed += 1;
                }
            }
        }

        ExpireStats {
            alive: total - removed,
            removed,
        }
    }

    /// Record `sequence` and drop all templates if it is discontinuous with
    /// the previous packet.
    ///
    /// The sequence update and the table reset happen in the same critical
    /// section, so no reader sees one without the other.
    pub fn check_reset(&self, sequence: u32) -> SequenceCheck {
        let mut state = self.state.write();
        let previous = state.last_sequence;
        let reset = previous
            .is_some_and(|prev| !is_valid_sequence(prev, sequence, self.max_sequence_difference));
        if reset {
            debug!(
                session = %self.key,
                previous = ?previous,
                sequence,
                dropped_templates = state.templates.len(),
                "Sequence discontinuity, resetting session"
            );
            state.templates = HashMap::new();
        }
        state.last_sequence = Some(sequence);
        SequenceCheck { previous, reset }
    }

    /// Last recorded sequence number.
    pub fn last_sequence(&self) -> Option<u32> {
        self.state.read().last_sequence
    }

    /// Number of cached templates.
    pub fn len(&self) -> usize {
        self.state.read().templates.len()
    }

    /// Whether no templates are cached.
    pub fn is_empty(&self) -> bool {
        self.state.read().templates.is_empty()
    }

    /// IDs of the cached templates, in no particular order.
    pub fn template_ids(&self) -> Vec<TemplateId> {
        self.state.read().templates.keys().copied().collect()
    }

    pub(crate) fn marker(&self) -> &RecencyMarker {
        &self.marker
    }
}

impl<T> fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("Session")
            .field("key", &self.key)
            .field("templates", &state.templates.len())
            .field("last_sequence", &state.last_sequence)
            .field("max_sequence_difference", &self.max_sequence_difference)
            .finish()
    }
}
