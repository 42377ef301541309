//! Registry of live sessions keyed by exporter and observation domain.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::config::SessionConfig;
use crate::key::SessionKey;
use crate::metric::ActiveSessionsMetric;
use crate::session::Session;

/// Outcome of one [`SessionMap::cleanup`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupStats {
    /// Sessions still registered after the pass.
    pub sessions_alive: usize,
    /// Sessions removed by the pass.
    pub sessions_removed: usize,
    /// Templates that survived their session's sweep, including those held
    /// by sessions removed later in the same pass.
    pub templates_alive: usize,
    /// Templates evicted from their sessions by the pass.
    pub templates_removed: usize,
}

impl CleanupStats {
    /// Whether the pass removed any session or template.
    pub fn has_removals(&self) -> bool {
        self.sessions_removed > 0 || self.templates_removed > 0
    }
}

impl fmt::Display for CleanupStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "expired {} sessions ({} remain) / {} templates ({} remain)",
            self.sessions_removed, self.sessions_alive, self.templates_removed, self.templates_alive
        )
    }
}

/// Point-in-time size of the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Number of registered sessions.
    pub sessions: usize,
    /// Templates cached across all sessions.
    pub templates: usize,
}

struct RegistryInner<T> {
    sessions: RwLock<HashMap<SessionKey, Arc<Session<T>>>>,
    metric: Option<Arc<dyn ActiveSessionsMetric>>,
    config: SessionConfig,
}

/// Registry owning every session of one decoder.
///
/// Cloning is cheap and yields a handle to the same registry, so the decode
/// path and the cleanup task can each hold one.
pub struct SessionMap<T> {
    inner: Arc<RegistryInner<T>>,
}

impl<T> SessionMap<T> {
    /// Create an empty registry without a metric sink.
    pub fn new(config: SessionConfig) -> Self {
        Self::build(config, None)
    }

    /// Create an empty registry reporting live sessions to `metric`.
    pub fn with_metric(config: SessionConfig, metric: Arc<dyn ActiveSessionsMetric>) -> Self {
        Self::build(config, Some(metric))
    }

    fn build(config: SessionConfig, metric: Option<Arc<dyn ActiveSessionsMetric>>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                sessions: RwLock::new(HashMap::new()),
                metric,
                config,
            }),
        }
    }

    /// Get the registry configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Build the key for a packet, honoring the shared-templates setting.
    pub fn key_for(&self, addr: impl fmt::Display, source_id: u32) -> SessionKey {
        SessionKey::new(addr, source_id, self.inner.config.shared_templates)
    }

    /// Return the session for `key`, creating it on first use.
    ///
    /// Hits take only the read lock. Misses re-check under the write lock so
    /// concurrent callers racing on a new key share one session.
    pub fn get_or_create(&self, key: &SessionKey) -> Arc<Session<T>> {
        {
            let sessions = self.inner.sessions.read();
            if let Some(session) = sessions.get(key) {
                session.marker().touch();
                return Arc::clone(session);
            }
        }

        let mut sessions = self.inner.sessions.write();
        match sessions.entry(key.clone()) {
            Entry::Occupied(entry) => {
                let session = entry.get();
                session.marker().touch();
                Arc::clone(session)
            }
            Entry::Vacant(entry) => {
                let session = Arc::new(Session::with_max_sequence_difference(
                    key.clone(),
                    self.inner.config.max_sequence_difference,
                ));
                entry.insert(Arc::clone(&session));
                if let Some(metric) = &self.inner.metric {
                    metric.inc();
                }
                debug!(session = %key, sessions = sessions.len(), "Created session");
                session
            }
        }
    }

    /// Look up a session without creating it or marking it as used.
    pub fn get(&self, key: &SessionKey) -> Option<Arc<Session<T>>> {
        self.inner.sessions.read().get(key).cloned()
    }

    /// Expire idle templates in every session, then idle sessions.
    ///
    /// A session is removed once it has gone two consecutive passes without
    /// a `get_or_create` hit. Candidates are collected under the read lock
    /// and re-checked under the write lock before removal.
    pub fn cleanup(&self) -> CleanupStats {
        let mut stats = CleanupStats::default();

        let (candidates, mut total) = {
            let sessions = self.inner.sessions.read();
            let mut candidates = Vec::new();
            for (key, session) in sessions.iter() {
                let expired = session.expire_templates();
                stats.templates_alive += expired.alive;
                stats.templates_removed += expired.removed;
                if !session.marker().arm() {
                    candidates.push(key.clone());
                }
            }
            (candidates, sessions.len())
        };

        if !candidates.is_empty() {
            let mut sessions = self.inner.sessions.write();
            total = sessions.len();
            for key in candidates {
                let still_idle = sessions
                    .get(&key)
                    .is_some_and(|session| session.marker().is_armed());
                if still_idle {
                    debug!(session = %key, "Expired session");
                    sessions.remove(&key);
                    stats.sessions_removed += 1;
                    if let Some(metric) = &self.inner.metric {
                        metric.dec();
                    }
                }
            }
        }

        stats.sessions_alive = total - stats.sessions_removed;
        stats
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.inner.sessions.read().len()
    }

    /// Whether no sessions are registered.
    pub fn is_empty(&self) -> bool {
        self.inner.sessions.read().is_empty()
    }

    /// Count sessions and cached templates without touching any marker.
    pub fn stats(&self) -> RegistryStats {
        let sessions = self.inner.sessions.read();
        RegistryStats {
            sessions: sessions.len(),
            templates: sessions.values().map(|session| session.len()).sum(),
        }
    }
}

impl<T> Clone for SessionMap<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for SessionMap<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionMap")
            .field("sessions", &self.len())
            .field("config", &self.inner.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::SessionGauge;

    fn registry() -> (SessionMap<String>, Arc<SessionGauge>) {
        let gauge = Arc::new(SessionGauge::new());
        let map = SessionMap::with_metric(SessionConfig::default(), gauge.clone());
        (map, gauge)
    }

    #[test]
    fn test_get_or_create_reuses_session() {
        let (map, gauge) = registry();
        let key = map.key_for("10.0.0.1:2055", 1);

        let a = map.get_or_create(&key);
        let b = map.get_or_create(&key);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(map.len(), 1);
        assert_eq!(gauge.get(), 1);
        assert_eq!(a.key(), &key);
    }

    #[test]
    fn test_distinct_keys_distinct_sessions() {
        let (map, gauge) = registry();
        let a = map.get_or_create(&map.key_for("10.0.0.1:2055", 1));
        let b = map.get_or_create(&map.key_for("10.0.0.1:2055", 2));
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(gauge.get(), 2);
    }

    #[test]
    fn test_shared_templates_collapse_exporters() {
        let map: SessionMap<String> =
            SessionMap::new(SessionConfig::new().with_shared_templates(true));
        let a = map.get_or_create(&map.key_for("10.0.0.1:2055", 1));
        let b = map.get_or_create(&map.key_for("10.0.0.2:2055", 1));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_sessions_inherit_sequence_tolerance() {
        let map: SessionMap<String> =
            SessionMap::new(SessionConfig::new().with_max_sequence_difference(5));
        let session = map.get_or_create(&SessionKey::shared(1));
        session.check_reset(100);
        assert!(!session.check_reset(104).reset);
        assert!(session.check_reset(110).reset);
    }

    #[test]
    fn test_get_does_not_create() {
        let (map, gauge) = registry();
        let key = SessionKey::shared(9);
        assert!(map.get(&key).is_none());
        assert!(map.is_empty());
        assert_eq!(gauge.get(), 0);
    }

    #[test]
    fn test_idle_session_removed_after_two_passes() {
        let (map, gauge) = registry();
        let key = SessionKey::shared(1);
        map.get_or_create(&key);

        let first = map.cleanup();
        assert_eq!(first.sessions_alive, 1);
        assert!(!first.has_removals());

        let second = map.cleanup();
        assert_eq!(second.sessions_removed, 1);
        assert_eq!(second.sessions_alive, 0);
        assert!(map.get(&key).is_none());
        assert_eq!(gauge.get(), 0);
    }

    #[test]
    fn test_access_between_passes_keeps_session() {
        let (map, gauge) = registry();
        let key = SessionKey::shared(1);
        let original = map.get_or_create(&key);

        for _ in 0..4 {
            map.cleanup();
            let again = map.get_or_create(&key);
            assert!(Arc::ptr_eq(&original, &again));
        }
        assert_eq!(gauge.get(), 1);

        map.cleanup();
        assert_eq!(map.cleanup().sessions_removed, 1);
    }

    #[test]
    fn test_peek_does_not_keep_session_alive() {
        let (map, _) = registry();
        let key = SessionKey::shared(1);
        map.get_or_create(&key);

        map.cleanup();
        assert!(map.get(&key).is_some());
        assert_eq!(map.cleanup().sessions_removed, 1);
    }

    #[test]
    fn test_cleanup_aggregates_template_counts() {
        let (map, _) = registry();
        let a = map.get_or_create(&SessionKey::shared(1));
        let b = map.get_or_create(&SessionKey::shared(2));
        a.add_template(256, Arc::new("a".into()));
        a.add_template(257, Arc::new("b".into()));
        b.add_template(256, Arc::new("c".into()));

        let first = map.cleanup();
        assert_eq!(first.templates_alive, 3);
        assert_eq!(first.templates_removed, 0);

        // Keep both sessions and one template alive
        map.get_or_create(&SessionKey::shared(1));
        map.get_or_create(&SessionKey::shared(2));
        a.get_template(256);

        let second = map.cleanup();
        assert_eq!(
            second,
            CleanupStats {
                sessions_alive: 2,
                sessions_removed: 0,
                templates_alive: 1,
                templates_removed: 2,
            }
        );
        assert_eq!(map.stats(), RegistryStats { sessions: 2, templates: 1 });
    }

    #[test]
    fn test_removed_session_templates_count_as_alive() {
        let (map, _) = registry();
        let key = SessionKey::shared(1);
        map.get_or_create(&key);
        map.cleanup();

        // Added after the session was armed, without a get_or_create hit
        map.get(&key).unwrap().add_template(256, Arc::new("t".into()));

        assert_eq!(
            map.cleanup(),
            CleanupStats {
                sessions_alive: 0,
                sessions_removed: 1,
                templates_alive: 1,
                templates_removed: 0,
            }
        );
    }

    #[test]
    fn test_registry_without_metric() {
        let map: SessionMap<String> = SessionMap::new(SessionConfig::default());
        map.get_or_create(&SessionKey::shared(1));
        map.cleanup();
        assert_eq!(map.cleanup().sessions_removed, 1);
    }

    #[test]
    fn test_clone_shares_registry() {
        let (map, _) = registry();
        let handle = map.clone();
        let key = SessionKey::shared(3);
        let a = map.get_or_create(&key);
        let b = handle.get_or_create(&key);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_cleanup_stats_display() {
        let stats = CleanupStats {
            sessions_alive: 4,
            sessions_removed: 1,
            templates_alive: 10,
            templates_removed: 2,
        };
        assert_eq!(
            stats.to_string(),
            "expired 1 sessions (4 remain) / 2 templates (10 remain)"
        );
    }
}
