//! Session lookup. Storage itself is pluggable; the façade only needs to
//! find a session by cookie, read it, and mint a fresh id on login.

use axum::http::HeaderMap;
use axum::http::header::COOKIE;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use tokio::sync::RwLock;

/// Sessions an [`InMemorySessionStore`] keeps before evicting the least
/// recently used.
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionData {
    pub session_key: Option<String>,
    pub user: Option<String>,
    pub form_key: Option<String>,
}

pub type SessionHandle = Arc<RwLock<SessionData>>;

pub trait SessionStore: Send + Sync {
    fn get(&self, id: &str) -> Option<SessionHandle>;

    /// Drops `previous` (if any) and returns a brand-new session.
    fn regenerate(&self, previous: Option<&str>) -> (String, SessionHandle);

    fn remove(&self, id: &str);
}

/// Process-local store for a single server. Bounded: once full, every new
/// session evicts the one used least recently. Deployments running several
/// servers behind one cookie plug in a shared [`SessionStore`] instead.
pub struct InMemorySessionStore {
    sessions: Mutex<LruCache<String, SessionHandle>>,
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_SESSIONS)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            sessions: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Installs a session under a known id.
    pub fn insert(&self, id: impl Into<String>, data: SessionData) -> SessionHandle {
        let handle = Arc::new(RwLock::new(data));
        self.lock().put(id.into(), handle.clone());
        handle
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, SessionHandle>> {
        match self.sessions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, id: &str) -> Option<SessionHandle> {
        self.lock().get(id).cloned()
    }

    fn regenerate(&self, previous: Option<&str>) -> (String, SessionHandle) {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let handle = Arc::new(RwLock::new(SessionData::default()));
        let mut sessions = self.lock();
        if let Some(previous) = previous {
            sessions.pop(previous);
        }
        if let Some((evicted, _)) = sessions.push(id.clone(), handle.clone()) {
            tracing::debug!(session = %evicted, "session store full; evicted oldest session");
        }
        (id, handle)
    }

    fn remove(&self, id: &str) {
        self.lock().pop(id);
    }
}

/// What a handler may use after the session lock is gone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub id: Option<String>,
    pub session_key: Option<String>,
    pub user: Option<String>,
}

impl SessionSnapshot {
    /// Copies the fields out under the read lock and releases it before
    /// returning, so no upstream call ever runs with the lock held.
    pub async fn capture(store: &dyn SessionStore, id: Option<String>) -> Self {
        let Some(id) = id else {
            return Self::default();
        };
        let Some(handle) = store.get(&id) else {
            return Self {
                id: Some(id),
                ..Self::default()
            };
        };
        let data = handle.read().await;
        Self {
            session_key: data.session_key.clone(),
            user: data.user.clone(),
            id: Some(id),
        }
    }

    pub fn owner(&self) -> &str {
        self.user.as_deref().unwrap_or("-")
    }
}

/// Value of the named cookie, if the request carries it.
pub fn cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"').to_string())
}
