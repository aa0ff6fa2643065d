//! In-memory session store keyed by call id.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tracing::debug;

use crate::common::config::SessionConfig;
use crate::common::session::Session;

/// Summary of one active call, as exposed by the statistics endpoint.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionSummary {
    /// Call identifier.
    pub call_id: String,
    /// Seconds since the call started.
    pub duration_seconds: i64,
    /// Completed turns.
    pub turn_count: u64,
    /// Running mean of turn durations.
    pub average_response_time_ms: f64,
    /// Completion failures.
    pub error_count: u64,
    /// Turns answered with the provider voice.
    pub synthesis_fallbacks: u64,
    /// End-of-call signal from analysis.
    pub should_end_call: bool,
}

/// Store statistics.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct StoreStats {
    /// Number of sessions currently held.
    pub active_sessions: usize,
    /// Per-session summaries, ordered by call id.
    pub sessions: Vec<SessionSummary>,
}

/// Thread-safe map of active call sessions.
///
/// Single-process only: sessions are not shared between instances.
pub struct SessionStore {
    sessions: DashMap<String, Session>,
    history_limit: usize,
}

impl SessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new(config: &SessionConfig) -> Self {
        Self::with_history_limit(config.max_history)
    }

    /// Create an empty store with an explicit history limit.
    #[must_use]
    pub fn with_history_limit(history_limit: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            history_limit,
        }
    }

    /// Return a snapshot of the session for `call_id`, creating it if unknown.
    #[must_use]
    pub fn get_or_create(&self, call_id: &str) -> Session {
        self.get_or_create_at(call_id, Utc::now())
    }

    /// Same as [`Self::get_or_create`] with an explicit clock.
    #[must_use]
    pub fn get_or_create_at(&self, call_id: &str, now: DateTime<Utc>) -> Session {
        let mut entry = self.sessions.entry(call_id.to_string()).or_insert_with(|| {
            debug!(call_id, "Created session");
            Session::new(call_id, self.history_limit, now)
        });
        entry.last_activity_at = now;
        entry.value().clone()
    }

    /// Write back a session mutated by a turn.
    ///
    /// Returns `false` when the call ended meanwhile; the update is dropped so an
    /// ended call is never resurrected.
    pub fn commit(&self, mut session: Session) -> bool {
        match self.sessions.get_mut(&session.id) {
            Some(mut entry) => {
                session.last_activity_at = Utc::now();
                *entry = session;
                true
            }
            None => false,
        }
    }

    /// Mark the greeting as issued. Returns `true` only the first time for a call.
    pub fn mark_greeted(&self, call_id: &str) -> bool {
        let now = Utc::now();
        let mut entry = self
            .sessions
            .entry(call_id.to_string())
            .or_insert_with(|| Session::new(call_id, self.history_limit, now));
        entry.last_activity_at = now;
        let first = !entry.greeted;
        entry.greeted = true;
        first
    }

    /// Snapshot of a session without refreshing its activity time.
    #[must_use]
    pub fn get(&self, call_id: &str) -> Option<Session> {
        self.sessions.get(call_id).map(|entry| entry.value().clone())
    }

    /// Remove a session. No-op if absent.
    pub fn end(&self, call_id: &str) {
        if self.sessions.remove(call_id).is_some() {
            debug!(call_id, "Ended session");
        }
    }

    /// Remove every session idle for longer than `idle_threshold`.
    pub fn sweep(&self, now: DateTime<Utc>, idle_threshold: Duration) -> usize {
        let Some(cutoff) = TimeDelta::from_std(idle_threshold)
            .ok()
            .and_then(|threshold| now.checked_sub_signed(threshold))
        else {
            return 0;
        };

        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| session.last_activity_at >= cutoff);
        before.saturating_sub(self.sessions.len())
    }

    /// Number of active sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the store holds no session.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Current statistics.
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        let now = Utc::now();
        let mut sessions: Vec<SessionSummary> = self
            .sessions
            .iter()
            .map(|entry| SessionSummary {
                call_id: entry.id.clone(),
                duration_seconds: entry.duration_seconds(now),
                turn_count: entry.metrics.turn_count,
                average_response_time_ms: entry.metrics.average_response_time_ms,
                error_count: entry.metrics.error_count,
                synthesis_fallbacks: entry.metrics.synthesis_fallbacks,
                should_end_call: entry.context.should_end_call,
            })
            .collect();
        sessions.sort_by(|a, b| a.call_id.cmp(&b.call_id));

        StoreStats {
            active_sessions: sessions.len(),
            sessions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::session::Turn;

    #[test]
    fn test_get_or_create_is_idempotent() {
        let store = SessionStore::with_history_limit(10);
        let first = store.get_or_create("c1");
        assert!(first.history.is_empty());
        let second = store.get_or_create("c1");
        assert_eq!(first.started_at, second.started_at);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_get_or_create_refreshes_activity() {
        let store = SessionStore::with_history_limit(10);
        let t0 = Utc::now();
        let t1 = t0 + TimeDelta::seconds(30);
        let _ = store.get_or_create_at("c1", t0);
        let session = store.get_or_create_at("c1", t1);
        assert_eq!(session.started_at, t0);
        assert_eq!(session.last_activity_at, t1);
    }

    #[test]
    fn test_end_is_idempotent() {
        let store = SessionStore::with_history_limit(10);
        let _ = store.get_or_create("c1");
        store.end("c1");
        store.end("c1");
        store.end("never-seen");
        assert!(store.is_empty());
    }

    #[test]
    fn test_commit_persists_and_skips_ended_calls() {
        let store = SessionStore::with_history_limit(10);
        let mut session = store.get_or_create("c1");
        session.push_turn(Turn::user("hi", 0.8));
        assert!(store.commit(session.clone()));
        assert_eq!(store.get("c1").map(|s| s.history.len()), Some(1));

        store.end("c1");
        assert!(!store.commit(session));
        assert!(store.get("c1").is_none());
    }

    #[test]
    fn test_sweep_removes_only_idle_sessions() {
        let store = SessionStore::with_history_limit(10);
        let now = Utc::now();
        let threshold = Duration::from_secs(3600);
        let _ = store.get_or_create_at("stale", now - TimeDelta::seconds(3601));
        let _ = store.get_or_create_at("edge", now - TimeDelta::seconds(3600));
        let _ = store.get_or_create_at("fresh", now - TimeDelta::seconds(10));

        let removed = store.sweep(now, threshold);

        assert_eq!(removed, 1);
        assert!(store.get("stale").is_none());
        assert!(store.get("edge").is_some());
        assert!(store.get("fresh").is_some());
    }

    #[test]
    fn test_mark_greeted_only_once() {
        let store = SessionStore::with_history_limit(10);
        assert!(store.mark_greeted("c1"));
        assert!(!store.mark_greeted("c1"));
    }

    #[test]
    fn test_stats_summaries() {
        let store = SessionStore::with_history_limit(10);
        let mut session = store.get_or_create("b");
        session.metrics.record_turn(200.0);
        session.metrics.error_count = 1;
        assert!(store.commit(session));
        let _ = store.get_or_create("a");

        let stats = store.stats();
        assert_eq!(stats.active_sessions, 2);
        assert_eq!(stats.sessions[0].call_id, "a");
        assert_eq!(stats.sessions[1].turn_count, 1);
        assert_eq!(stats.sessions[1].error_count, 1);
        assert!((stats.sessions[1].average_response_time_ms - 200.0).abs() < f64::EPSILON);
    }
}
