use crate::config::SessionConfig;
use chrono::{DateTime, Utc};
use neuroflow_core::Message;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// One conversation: a bounded, ordered message history.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    messages: Vec<Message>,
    max_messages: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: impl Into<String>, max_messages: usize) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            messages: Vec::new(),
            max_messages: max_messages.max(1),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a message, dropping the oldest ones beyond the window.
    pub fn add_message(&mut self, message: Message) {
        self.updated_at = Utc::now();
        self.messages.push(message);
        if self.messages.len() > self.max_messages {
            let excess = self.messages.len() - self.max_messages;
            self.messages.drain(..excess);
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }
}

/// Exclusive handle to a session. Holding the lock serializes requests.
pub type SessionHandle = Arc<tokio::sync::Mutex<Session>>;

struct Entry {
    session: SessionHandle,
    last_seen: Instant,
}

impl Entry {
    /// Nobody outside the registry holds the handle.
    fn is_idle(&self) -> bool {
        Arc::strong_count(&self.session) == 1
    }
}

/// Process-wide map of live sessions.
///
/// Sessions are created on first use. Eviction is lazy, on every
/// [`acquire`](Self::acquire): sessions idle past the TTL are dropped, then
/// the least recently used ones until the cap holds. Sessions with a request
/// in flight are never evicted.
pub struct SessionRegistry {
    entries: Mutex<HashMap<String, Entry>>,
    config: SessionConfig,
}

impl SessionRegistry {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Get or create the session and mark it as recently used.
    pub fn acquire(&self, session_id: &str) -> SessionHandle {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        self.sweep(&mut entries, now);

        let max_messages = self.config.max_messages;
        let entry = entries.entry(session_id.to_string()).or_insert_with(|| {
            debug!(session_id, "Session created");
            Entry {
                session: Arc::new(tokio::sync::Mutex::new(Session::new(session_id, max_messages))),
                last_seen: now,
            }
        });
        entry.last_seen = now;
        let handle = entry.session.clone();

        self.enforce_cap(&mut entries, Some(session_id));
        handle
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.entries.lock().contains_key(session_id)
    }

    fn sweep(&self, entries: &mut HashMap<String, Entry>, now: Instant) {
        let ttl = Duration::from_secs(self.config.idle_ttl_secs);
        let before = entries.len();
        entries.retain(|_, e| !e.is_idle() || now.duration_since(e.last_seen) < ttl);
        let expired = before - entries.len();
        if expired > 0 {
            debug!(expired, "Expired idle sessions");
        }
    }

    fn enforce_cap(&self, entries: &mut HashMap<String, Entry>, keep: Option<&str>) {
        while entries.len() > self.config.max_sessions {
            let victim = entries
                .iter()
                .filter(|(id, e)| e.is_idle() && Some(id.as_str()) != keep)
                .min_by_key(|(_, e)| e.last_seen)
                .map(|(id, _)| id.clone());
            match victim {
                Some(id) => {
                    entries.remove(&id);
                    debug!(session_id = %id, "Evicted least recently used session");
                }
                None => break,
            }
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}
