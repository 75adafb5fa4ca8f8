//! Session registry
//!
//! Maps an opaque session token (carried in the `livepad_session` cookie) to
//! an in-memory key/value bag. Sessions are created on first contact and live
//! for the lifetime of the process.

use std::collections::HashMap;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

/// Bag key recording the last workspace a session edited or resumed.
pub const WORKSPACE_KEY: &str = "workspace";

/// In-memory state for one browser session
#[derive(Debug, Clone)]
pub struct Session {
    values: HashMap<String, Value>,
}

impl Session {
    fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Outcome of [`SessionRegistry::resolve`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSession {
    pub token: String,
    pub is_new: bool,
}

/// Process-wide session registry
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the presented token if it names a live session, otherwise mint
    /// a fresh one with an empty bag. Never fails.
    pub fn resolve(&self, presented: Option<&str>) -> ResolvedSession {
        if let Some(token) = presented.map(str::trim).filter(|t| !t.is_empty()) {
            if self.sessions.contains_key(token) {
                return ResolvedSession {
                    token: token.to_string(),
                    is_new: false,
                };
            }
        }

        loop {
            let token = Uuid::new_v4().to_string();
            // Entry holds the shard lock, so check-and-insert is atomic.
            if let Entry::Vacant(slot) = self.sessions.entry(token.clone()) {
                slot.insert(Session::new());
                debug!(
                    component = "session",
                    event = "session.created",
                    "Created session"
                );
                return ResolvedSession {
                    token,
                    is_new: true,
                };
            }
        }
    }

    /// Snapshot of a session
    pub fn get(&self, token: &str) -> Option<Session> {
        self.sessions.get(token).map(|s| s.clone())
    }

    /// Read one bag value
    pub fn value(&self, token: &str, key: &str) -> Option<Value> {
        self.sessions.get(token).and_then(|s| s.get(key).cloned())
    }

    /// Store a bag value. Returns false if the session does not exist.
    pub fn set_value(&self, token: &str, key: &str, value: impl Into<Value>) -> bool {
        match self.sessions.get_mut(token) {
            Some(mut session) => {
                session.values.insert(key.to_string(), value.into());
                true
            }
            None => false,
        }
    }

    /// All live session tokens
    pub fn list(&self) -> Vec<String> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn absent_token_mints_new_session() {
        let registry = SessionRegistry::new();
        let resolved = registry.resolve(None);
        assert!(resolved.is_new);
        assert_eq!(registry.len(), 1);
        assert!(registry.get(&resolved.token).unwrap().is_empty());
    }

    #[test]
    fn known_token_is_returned_unchanged() {
        let registry = SessionRegistry::new();
        let first = registry.resolve(None);
        registry.set_value(&first.token, WORKSPACE_KEY, "u1");

        let again = registry.resolve(Some(&first.token));
        assert!(!again.is_new);
        assert_eq!(again.token, first.token);
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.value(&first.token, WORKSPACE_KEY),
            Some(Value::from("u1"))
        );
    }

    #[test]
    fn unknown_or_blank_token_mints_new_session() {
        let registry = SessionRegistry::new();
        let resolved = registry.resolve(Some("forged-token"));
        assert!(resolved.is_new);
        assert_ne!(resolved.token, "forged-token");

        let blank = registry.resolve(Some("  "));
        assert!(blank.is_new);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn set_value_on_missing_session_is_rejected() {
        let registry = SessionRegistry::new();
        assert!(!registry.set_value("nope", "k", 1));
        assert!(registry.value("nope", "k").is_none());
    }

    #[test]
    fn list_returns_every_token() {
        let registry = SessionRegistry::new();
        let a = registry.resolve(None).token;
        let b = registry.resolve(None).token;
        let mut listed = registry.list();
        listed.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(listed, expected);
    }

    #[tokio::test]
    async fn concurrent_resolves_of_same_token_do_not_duplicate() {
        let registry = Arc::new(SessionRegistry::new());
        let token = registry.resolve(None).token;

        let mut tasks = Vec::new();
        for _ in 0..32 {
            let registry = Arc::clone(&registry);
            let token = token.clone();
            tasks.push(tokio::spawn(async move { registry.resolve(Some(&token)) }));
        }
        for task in tasks {
            let resolved = task.await.unwrap();
            assert!(!resolved.is_new);
            assert_eq!(resolved.token, token);
        }
        assert_eq!(registry.len(), 1);
    }
}
