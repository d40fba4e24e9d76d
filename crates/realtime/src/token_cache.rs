//! Short-lived cache of verified JWTs, so a chatty connection sending many
//! frames per second doesn't pay a signature check on every one of them.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use uuid::Uuid;

struct CachedClaims {
    user_id: Uuid,
    token_version: i32,
    verified_at: Instant,
}

pub struct TokenVerifyCache {
    entries: parking_lot::Mutex<HashMap<String, CachedClaims>>,
    ttl: Duration,
}

impl TokenVerifyCache {
    pub fn new(ttl: Duration) -> Self {
        Self { entries: parking_lot::Mutex::new(HashMap::new()), ttl }
    }

    /// Returns `Some((user_id, token_version))` if `token` was verified
    /// within the last `ttl` and hasn't been evicted.
    pub fn get(&self, token: &str) -> Option<(Uuid, i32)> {
        let entries = self.entries.lock();
        let cached = entries.get(token)?;
        if cached.verified_at.elapsed() < self.ttl {
            Some((cached.user_id, cached.token_version))
        } else {
            None
        }
    }

    pub fn insert(&self, token: &str, user_id: Uuid, token_version: i32) {
        let mut entries = self.entries.lock();
        if entries.len() > 10_000 {
            let ttl = self.ttl;
            entries.retain(|_, c| c.verified_at.elapsed() < ttl);
        }
        entries.insert(token.to_owned(), CachedClaims { user_id, token_version, verified_at: Instant::now() });
    }

    /// Drops every cached verification for a user — called after a role
    /// change or ban bumps their `token_version`, since cached entries would
    /// otherwise keep authorizing the stale token for up to `ttl`.
    pub fn invalidate_user(&self, user_id: Uuid) {
        self.entries.lock().retain(|_, c| c.user_id != user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unseen_token_misses() {
        let cache = TokenVerifyCache::new(Duration::from_secs(300));
        assert!(cache.get("nope").is_none());
    }

    #[test]
    fn inserted_token_hits_until_ttl_expires() {
        let cache = TokenVerifyCache::new(Duration::from_millis(20));
        let user = Uuid::now_v7();
        cache.insert("tok", user, 3);
        assert_eq!(cache.get("tok"), Some((user, 3)));

        std::thread::sleep(Duration::from_millis(30));
        assert!(cache.get("tok").is_none(), "entry should have aged out of the ttl");
    }

    #[test]
    fn invalidate_user_drops_every_token_for_that_user() {
        let cache = TokenVerifyCache::new(Duration::from_secs(300));
        let alice = Uuid::now_v7();
        let bob = Uuid::now_v7();
        cache.insert("alice-tok-1", alice, 1);
        cache.insert("alice-tok-2", alice, 1);
        cache.insert("bob-tok", bob, 1);

        cache.invalidate_user(alice);

        assert!(cache.get("alice-tok-1").is_none());
        assert!(cache.get("alice-tok-2").is_none());
        assert_eq!(cache.get("bob-tok"), Some((bob, 1)));
    }
}
