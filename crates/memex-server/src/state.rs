//! Explicit server context threaded through every handler and
//! constructor. No process-global state outside of this struct's own
//! rate limiter and session table (§9's redesign flag).

use crate::ai_validator::AiValidator;
use crate::audit::AuditLog;
use crate::auth::AuthStore;
use crate::chat_provider::ChatProvider;
use crate::config::ServerConfig;
use crate::instance::Instance;
use crate::rate_limit::RateLimiter;
use crate::sessions::SessionTable;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone)]
pub struct AppState(pub Arc<Inner>);

pub struct Inner {
    pub config: ServerConfig,
    pub instances: HashMap<String, Arc<Instance>>,
    pub auth: AuthStore,
    pub rate_limiter: RateLimiter,
    pub audit: AuditLog,
    pub validator: Arc<AiValidator>,
    pub chat_provider: Arc<dyn ChatProvider>,
    pub sessions: Arc<SessionTable>,
    pub started_at: Instant,
}

impl std::ops::Deref for AppState {
    type Target = Inner;

    fn deref(&self) -> &Inner {
        &self.0
    }
}

impl AppState {
    pub fn instance(&self, name: &str) -> Option<Arc<Instance>> {
        self.0.instances.get(name).cloned()
    }
}
