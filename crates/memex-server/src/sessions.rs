//! Chat session table (§3): process-local, non-durable conversation
//! state, evicted after an hour of inactivity. Guarded by a single mutex;
//! a periodic sweeper removes expired sessions under the same lock.

use crate::chat_provider::Message;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const SESSION_TTL: Duration = Duration::from_secs(3600);

pub struct Session {
    pub instance: String,
    pub messages: Vec<Message>,
    pub last_active: Instant,
}

#[derive(Default)]
pub struct SessionTable {
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, instance: &str) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let session = Session { instance: instance.to_string(), messages: Vec::new(), last_active: Instant::now() };
        self.sessions.lock().unwrap().insert(id.clone(), session);
        id
    }

    /// Returns `None` if the session is missing or has expired (expiry is
    /// checked, not just relied on the sweeper, so a call right before a
    /// sweep still sees correct behavior).
    pub fn touch(&self, id: &str) -> bool {
        let mut sessions = self.sessions.lock().unwrap();
        match sessions.get_mut(id) {
            Some(session) if session.last_active.elapsed() < SESSION_TTL => {
                session.last_active = Instant::now();
                true
            }
            _ => false,
        }
    }

    pub fn with_messages<R>(&self, id: &str, f: impl FnOnce(&mut Vec<Message>) -> R) -> Option<R> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions.get_mut(id)?;
        if session.last_active.elapsed() >= SESSION_TTL {
            return None;
        }
        Some(f(&mut session.messages))
    }

    pub fn remove(&self, id: &str) -> bool {
        self.sessions.lock().unwrap().remove(id).is_some()
    }

    /// Batch-evict every session untouched for longer than the TTL.
    pub fn sweep(&self) -> usize {
        let mut sessions = self.sessions.lock().unwrap();
        let before = sessions.len();
        sessions.retain(|_, s| s.last_active.elapsed() < SESSION_TTL);
        before - sessions.len()
    }
}

pub fn spawn_sweeper(table: std::sync::Arc<SessionTable>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            let evicted = table.sweep();
            if evicted > 0 {
                tracing::debug!("session sweep evicted {evicted} expired sessions");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_touch_round_trip() {
        let table = SessionTable::new();
        let id = table.create("personal");
        assert!(table.touch(&id));
        assert!(!table.touch("missing"));
    }

    #[test]
    fn sweep_evicts_only_after_the_instant_ttl() {
        let table = SessionTable::new();
        let id = table.create("personal");
        {
            let mut sessions = table.sessions.lock().unwrap();
            let session = sessions.get_mut(&id).unwrap();
            session.last_active = Instant::now() - Duration::from_secs(3601);
        }
        assert_eq!(table.sweep(), 1);
        assert!(!table.touch(&id));
    }
}
