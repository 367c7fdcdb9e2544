//! Password verification: the client submits an MD5 of its password, the
//! persistence layer stores a bcrypt hash of that MD5. A small in-memory
//! cache remembers the last MD5 that verified successfully against a given
//! bcrypt hash so repeat logins skip the bcrypt cost — but a failed
//! verification is never cached (§8 boundary behavior).

use parking_lot::Mutex;
use std::collections::HashMap;

pub fn hash_password(md5_password: &str) -> bcrypt::BcryptResult<String> {
    bcrypt::hash(md5_password, bcrypt::DEFAULT_COST)
}

/// Caches `bcrypt_hash -> last md5 that verified against it`, so a login
/// storm from the same account doesn't re-run bcrypt on every request.
#[derive(Default)]
pub struct BcryptCache {
    entries: Mutex<HashMap<String, String>>,
}

impl BcryptCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Verifies `md5_password` against `bcrypt_hash`, consulting (and
    /// populating) the cache. Only a successful verification is cached.
    pub fn verify(&self, md5_password: &str, bcrypt_hash: &str) -> bool {
        if let Some(cached) = self.entries.lock().get(bcrypt_hash) {
            if cached == md5_password {
                return true;
            }
        }

        let matches = bcrypt::verify(md5_password, bcrypt_hash).unwrap_or(false);
        if matches {
            self.entries
                .lock()
                .insert(bcrypt_hash.to_string(), md5_password.to_string());
        }
        matches
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn verify_accepts_matching_password() {
        let hash = hash_password("5f4dcc3b5aa765d61d8327deb882cf99").unwrap();
        let cache = BcryptCache::new();
        assert!(cache.verify("5f4dcc3b5aa765d61d8327deb882cf99", &hash));
    }

    #[test]
    fn verify_rejects_and_does_not_cache_failed_attempt() {
        let hash = hash_password("5f4dcc3b5aa765d61d8327deb882cf99").unwrap();
        let cache = BcryptCache::new();
        assert!(!cache.verify("wrong-password-hash-aaaaaaaaaaaaaaaa", &hash));
        // A failed attempt must not poison the cache for a later correct one.
        assert!(cache.verify("5f4dcc3b5aa765d61d8327deb882cf99", &hash));
    }

    #[test]
    fn cached_entry_short_circuits_bcrypt() {
        let hash = hash_password("5f4dcc3b5aa765d61d8327deb882cf99").unwrap();
        let cache = BcryptCache::new();
        assert!(cache.verify("5f4dcc3b5aa765d61d8327deb882cf99", &hash));
        // Second call hits the cache path; same result either way.
        assert!(cache.verify("5f4dcc3b5aa765d61d8327deb882cf99", &hash));
    }
}
