use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

const CACHE_CAPACITY: usize = 100;

/// Login credentials held between a login that the back end answered with
/// "password change required" and the follow-up password change.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Session id → credentials. Every read, insert and delete takes the one
/// mutex.
pub struct CredentialCache {
    entries: Mutex<LruCache<String, Credentials>>,
}

impl Default for CredentialCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialCache {
    pub fn new() -> Self {
        Self::with_capacity(CACHE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn insert(&self, session_id: &str, credentials: Credentials) {
        self.lock().put(session_id.to_string(), credentials);
    }

    pub fn get(&self, session_id: &str) -> Option<Credentials> {
        self.lock().get(session_id).cloned()
    }

    /// Removes and returns the entry.
    pub fn take(&self, session_id: &str) -> Option<Credentials> {
        self.lock().pop(session_id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<String, Credentials>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn creds(user: &str) -> Credentials {
        Credentials {
            username: user.to_string(),
            password: "changeme".to_string(),
        }
    }

    #[test]
    fn take_evicts() {
        let cache = CredentialCache::new();
        cache.insert("s1", creds("admin"));
        assert_eq!(cache.get("s1"), Some(creds("admin")));
        assert_eq!(cache.take("s1"), Some(creds("admin")));
        assert_eq!(cache.take("s1"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn oldest_entry_goes_first() {
        let cache = CredentialCache::with_capacity(2);
        cache.insert("a", creds("a"));
        cache.insert("b", creds("b"));
        assert!(cache.get("a").is_some());
        cache.insert("c", creds("c"));
        assert_eq!(cache.len(), 2);
        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
    }

    #[test]
    fn default_capacity_is_bounded() {
        let cache = CredentialCache::new();
        for index in 0..150 {
            cache.insert(&format!("s{index}"), creds("u"));
        }
        assert_eq!(cache.len(), CACHE_CAPACITY);
        assert!(cache.get("s0").is_none());
        assert!(cache.get("s149").is_some());
    }

    #[test]
    fn debug_hides_the_password() {
        assert!(!format!("{:?}", creds("admin")).contains("changeme"));
    }
}
