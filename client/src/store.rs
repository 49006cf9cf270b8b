// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2025 The Carpocratian Church of Commonality and Equality, Inc.

//! Per-configuration token persistence.
//!
//! Each configuration owns two keys: a JSON array of stored tokens and the
//! count of that array. Both are always written in the same batch.

use privpass_common::api::StoredToken;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::redeem::{BindingContext, Redemption, RedemptionBuilder};
use crate::storage::KeyValueStorage;
use crate::token::{ConfigId, Token, TokenSeed};

/// Told about every change to a configuration's token count. Called after
/// the store lock is released, so a listener may read the store back.
pub trait CountListener: Send + Sync {
    fn count_changed(&self, config: ConfigId, count: usize);
}

impl<F> CountListener for F
where
    F: Fn(ConfigId, usize) + Send + Sync,
{
    fn count_changed(&self, config: ConfigId, count: usize) {
        self(config, count)
    }
}

pub fn tokens_key(config: ConfigId) -> String {
    format!("bypass-tokens-{}", config)
}

/// The count is stored as the JSON text of an integer (`"3"`). Every
/// [`KeyValueStorage`] value is a string, as in browser localStorage, so a
/// store written by either side reads back on the other.
pub fn count_key(config: ConfigId) -> String {
    format!("bypass-tokens-count-{}", config)
}

pub struct TokenStore {
    storage: Arc<dyn KeyValueStorage>,
    // Serializes every read-modify-write cycle.
    lock: Mutex<()>,
    listeners: RwLock<Vec<Arc<dyn CountListener>>>,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self {
            storage,
            lock: Mutex::new(()),
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn subscribe(&self, listener: Arc<dyn CountListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Prepends `tokens` to whatever is stored. Returns the new count.
    pub fn save(&self, config: ConfigId, tokens: &[Token]) -> Result<usize> {
        let count = {
            let _guard = self.guard();
            let existing = self.read_entries(config)?.unwrap_or_default();

            let mut entries = Vec::with_capacity(tokens.len() + existing.len());
            for t in tokens {
                entries.push(serde_json::to_value(t.to_stored())?);
            }
            entries.extend(existing);
            self.write_entries(config, &entries)?
        };
        info!(config = %config, added = tokens.len(), count, "stored tokens");
        self.notify(config, count);
        Ok(count)
    }

    /// `None` when nothing was ever stored. Entries that fail to decode are
    /// skipped and left in storage.
    pub fn load(&self, config: ConfigId) -> Result<Option<Vec<Token>>> {
        let _guard = self.guard();
        let entries = match self.read_entries(config)? {
            Some(e) => e,
            None => return Ok(None),
        };

        let tokens = entries
            .iter()
            .enumerate()
            .filter_map(|(i, v)| match decode_entry(v) {
                Ok(t) => Some(t),
                Err(e) => {
                    warn!(config = %config, index = i, error = %e, "skipping undecodable token");
                    None
                }
            })
            .collect();
        Ok(Some(tokens))
    }

    /// Persisted count. Does not parse the token array.
    pub fn count(&self, config: ConfigId) -> Result<usize> {
        let raw = self
            .storage
            .get(&count_key(config))
            .map_err(Error::Storage)?;
        match raw {
            Some(s) => parse_count(&s),
            None => Ok(0),
        }
    }

    /// Removes the one entry whose seed matches. Returns the new count.
    pub fn consume(&self, config: ConfigId, seed: &TokenSeed) -> Result<usize> {
        let count = {
            let _guard = self.guard();
            let mut entries = self.read_entries(config)?.ok_or(Error::TokenNotFound)?;

            let idx = entries
                .iter()
                .position(|v| entry_seed(v).map_or(false, |s| s.ct_matches(seed)))
                .ok_or(Error::TokenNotFound)?;
            entries.remove(idx);
            self.write_entries(config, &entries)?
        };
        debug!(config = %config, count, "consumed token");
        self.notify(config, count);
        Ok(count)
    }

    /// Spends the first decodable token. The redemption is returned only
    /// once the token is gone from storage.
    pub fn redeem_next(
        &self,
        config: ConfigId,
        builder: &RedemptionBuilder,
        binding: &BindingContext,
    ) -> Result<Redemption> {
        let (redemption, count) = {
            let _guard = self.guard();
            let mut entries = self.read_entries(config)?.ok_or(Error::TokenNotFound)?;

            let (idx, token) = entries
                .iter()
                .enumerate()
                .find_map(|(i, v)| decode_entry(v).ok().map(|t| (i, t)))
                .ok_or(Error::TokenNotFound)?;
            let redemption = builder.redeem(&token, binding);
            entries.remove(idx);
            (redemption, self.write_entries(config, &entries)?)
        };
        debug!(config = %config, count, "redeemed token");
        self.notify(config, count);
        Ok(redemption)
    }

    /// Forgets every token of `config`.
    pub fn clear(&self, config: ConfigId) -> Result<()> {
        {
            let _guard = self.guard();
            self.storage
                .remove(&[tokens_key(config), count_key(config)])
                .map_err(Error::Storage)?;
        }
        info!(config = %config, "cleared tokens");
        self.notify(config, 0);
        Ok(())
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        // The guarded value is (); storage writes are all-or-nothing, so a
        // panic in another holder leaves nothing half-written.
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Raw entries, after checking them against the stored count.
    fn read_entries(&self, config: ConfigId) -> Result<Option<Vec<Value>>> {
        let tokens = self
            .storage
            .get(&tokens_key(config))
            .map_err(Error::Storage)?;
        let count = self
            .storage
            .get(&count_key(config))
            .map_err(Error::Storage)?
            .map(|s| parse_count(&s))
            .transpose()?;

        let entries: Vec<Value> = match (tokens, count) {
            (None, None) | (None, Some(0)) => return Ok(None),
            (None, Some(count)) => {
                return Err(Error::StorageInconsistency { count, stored: 0 });
            }
            (Some(raw), count) => {
                let entries: Vec<Value> = serde_json::from_str(&raw)?;
                let count = count.unwrap_or(0);
                if count != entries.len() {
                    return Err(Error::StorageInconsistency {
                        count,
                        stored: entries.len(),
                    });
                }
                entries
            }
        };
        Ok(Some(entries))
    }

    fn write_entries(&self, config: ConfigId, entries: &[Value]) -> Result<usize> {
        let raw = serde_json::to_string(entries)?;
        self.storage
            .write_batch(&[
                (tokens_key(config), raw),
                (count_key(config), entries.len().to_string()),
            ])
            .map_err(Error::Storage)?;
        Ok(entries.len())
    }

    fn notify(&self, config: ConfigId, count: usize) {
        // snapshot, so a listener may subscribe another
        let listeners: Vec<_> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for l in &listeners {
            l.count_changed(config, count);
        }
    }
}

fn parse_count(s: &str) -> Result<usize> {
    s.trim()
        .parse()
        .map_err(|_| Error::Decode(format!("stored count {:?} is not an integer", s)))
}

fn decode_entry(v: &Value) -> Result<Token> {
    let stored: StoredToken = serde_json::from_value(v.clone())?;
    Token::from_stored(&stored)
}

/// Seed of an entry, even when its point or blind are unreadable.
fn entry_seed(v: &Value) -> Option<TokenSeed> {
    v.get("data")
        .and_then(Value::as_str)
        .and_then(|s| TokenSeed::from_base64(s).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use p256::{NonZeroScalar, ProjectivePoint};
    use rand_core::{OsRng, RngCore};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn token() -> Token {
        let mut seed = vec![0u8; 32];
        OsRng.fill_bytes(&mut seed);
        Token {
            seed: TokenSeed::new(seed),
            point: ProjectivePoint::GENERATOR * *NonZeroScalar::random(&mut OsRng),
            blind: NonZeroScalar::random(&mut OsRng),
        }
    }

    fn store() -> (Arc<MemoryStorage>, TokenStore) {
        let storage = Arc::new(MemoryStorage::new());
        (storage.clone(), TokenStore::new(storage))
    }

    const CFG: ConfigId = ConfigId(1);

    #[test]
    fn test_empty_store() {
        let (_, s) = store();
        assert!(s.load(CFG).unwrap().is_none());
        assert_eq!(s.count(CFG).unwrap(), 0);
        assert!(matches!(
            s.consume(CFG, &token().seed),
            Err(Error::TokenNotFound)
        ));
    }

    #[test]
    fn test_save_prepends_new_tokens() {
        let (storage, s) = store();
        let old = vec![token(), token()];
        let new = vec![token()];
        assert_eq!(s.save(CFG, &old).unwrap(), 2);
        assert_eq!(s.save(CFG, &new).unwrap(), 3);

        let loaded = s.load(CFG).unwrap().unwrap();
        let seeds: Vec<_> = loaded.iter().map(|t| t.seed.clone()).collect();
        assert_eq!(seeds, vec![new[0].seed.clone(), old[0].seed.clone(), old[1].seed.clone()]);

        let raw_count = storage.get("bypass-tokens-count-1").unwrap().unwrap();
        assert_eq!(raw_count, "3");
        assert_eq!(serde_json::from_str::<u64>(&raw_count).unwrap(), 3);
        let raw = storage.get("bypass-tokens-1").unwrap().unwrap();
        let arr: Vec<StoredToken> = serde_json::from_str(&raw).unwrap();
        assert_eq!(arr.len(), 3);
    }

    #[test]
    fn test_configs_are_separate() {
        let (_, s) = store();
        s.save(ConfigId(1), &[token()]).unwrap();
        s.save(ConfigId(2), &[token(), token()]).unwrap();
        assert_eq!(s.count(ConfigId(1)).unwrap(), 1);
        assert_eq!(s.count(ConfigId(2)).unwrap(), 2);

        let t = s.load(ConfigId(1)).unwrap().unwrap().remove(0);
        assert!(matches!(
            s.consume(ConfigId(2), &t.seed),
            Err(Error::TokenNotFound)
        ));
    }

    #[test]
    fn test_consume_once() {
        let (_, s) = store();
        let tokens = vec![token(), token(), token()];
        s.save(CFG, &tokens).unwrap();

        assert_eq!(s.consume(CFG, &tokens[1].seed).unwrap(), 2);
        assert!(matches!(
            s.consume(CFG, &tokens[1].seed),
            Err(Error::TokenNotFound)
        ));
        let left = s.load(CFG).unwrap().unwrap();
        assert!(left.iter().all(|t| t.seed != tokens[1].seed));
    }

    #[test]
    fn test_duplicate_seed_consumes_one_entry() {
        let (_, s) = store();
        let t = token();
        s.save(CFG, &[t.clone()]).unwrap();
        s.save(CFG, &[t.clone()]).unwrap();
        assert_eq!(s.count(CFG).unwrap(), 2);
        assert_eq!(s.consume(CFG, &t.seed).unwrap(), 1);
    }

    #[test]
    fn test_count_mismatch_is_inconsistency() {
        let (storage, s) = store();
        s.save(CFG, &[token(), token()]).unwrap();
        storage
            .write_batch(&[(count_key(CFG), "5".to_string())])
            .unwrap();
        assert!(matches!(
            s.load(CFG),
            Err(Error::StorageInconsistency { count: 5, stored: 2 })
        ));

        storage.remove(&[tokens_key(CFG)]).unwrap();
        assert!(matches!(
            s.load(CFG),
            Err(Error::StorageInconsistency { count: 5, stored: 0 })
        ));
    }

    #[test]
    fn test_undecodable_entry_is_skipped_and_kept() {
        let (storage, s) = store();
        let good = token();
        let mut entries = vec![serde_json::to_value(good.to_stored()).unwrap()];
        entries.push(serde_json::json!({"data": "AAAA", "point": "bad", "blind": "1"}));
        entries.push(serde_json::json!({"unexpected": true}));
        storage
            .write_batch(&[
                (tokens_key(CFG), serde_json::to_string(&entries).unwrap()),
                (count_key(CFG), "3".to_string()),
            ])
            .unwrap();

        let loaded = s.load(CFG).unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].seed, good.seed);
        assert_eq!(s.count(CFG).unwrap(), 3);

        // a token with a readable seed can still be consumed
        assert_eq!(s.consume(CFG, &TokenSeed::new(vec![0, 0, 0])).unwrap(), 2);
    }

    #[test]
    fn test_redeem_next_takes_first_decodable() {
        let (storage, s) = store();
        let good = token();
        let entries = vec![
            serde_json::json!({"data": "AAAA", "point": "bad", "blind": "1"}),
            serde_json::to_value(good.to_stored()).unwrap(),
        ];
        storage
            .write_batch(&[
                (tokens_key(CFG), serde_json::to_string(&entries).unwrap()),
                (count_key(CFG), "2".to_string()),
            ])
            .unwrap();

        let binding = BindingContext::new(b"host".to_vec());
        let r = s.redeem_next(CFG, &RedemptionBuilder::new(), &binding).unwrap();
        assert_eq!(r.seed, good.seed);
        assert_eq!(s.count(CFG).unwrap(), 1);
        assert!(matches!(
            s.redeem_next(CFG, &RedemptionBuilder::new(), &binding),
            Err(Error::TokenNotFound)
        ));
    }

    #[test]
    fn test_clear_and_listeners() {
        let (_, s) = store();
        let last = Arc::new(AtomicUsize::new(usize::MAX));
        let calls = Arc::new(AtomicUsize::new(0));
        {
            let last = last.clone();
            let calls = calls.clone();
            s.subscribe(Arc::new(move |cfg: ConfigId, n: usize| {
                assert_eq!(cfg, CFG);
                last.store(n, Ordering::SeqCst);
                calls.fetch_add(1, Ordering::SeqCst);
            }));
        }

        let tokens = vec![token(), token()];
        s.save(CFG, &tokens).unwrap();
        assert_eq!(last.load(Ordering::SeqCst), 2);
        s.consume(CFG, &tokens[0].seed).unwrap();
        assert_eq!(last.load(Ordering::SeqCst), 1);
        s.clear(CFG).unwrap();
        assert_eq!(last.load(Ordering::SeqCst), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        assert!(s.load(CFG).unwrap().is_none());
        assert_eq!(s.count(CFG).unwrap(), 0);
    }

    #[test]
    fn test_listener_can_read_store_back() {
        let s = Arc::new(TokenStore::new(Arc::new(MemoryStorage::new())));
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let weak = Arc::downgrade(&s);
            let seen = seen.clone();
            s.subscribe(Arc::new(move |cfg: ConfigId, n: usize| {
                let store = weak.upgrade().expect("store alive");
                let loaded = store.load(cfg).unwrap().map_or(0, |t| t.len());
                seen.lock().unwrap().push((n, loaded));
            }));
        }

        let tokens = vec![token(), token()];
        let (tx, rx) = std::sync::mpsc::channel();
        {
            let s = s.clone();
            let tokens = tokens.clone();
            std::thread::spawn(move || {
                s.save(CFG, &tokens).unwrap();
                s.consume(CFG, &tokens[0].seed).unwrap();
                s.redeem_next(CFG, &RedemptionBuilder::new(), &BindingContext::new(vec![1]))
                    .unwrap();
                s.clear(CFG).unwrap();
                tx.send(()).unwrap();
            });
        }
        rx.recv_timeout(std::time::Duration::from_secs(5))
            .expect("store calls returned");

        assert_eq!(*seen.lock().unwrap(), vec![(2, 2), (1, 1), (0, 0), (0, 0)]);
    }

    #[test]
    fn test_failed_consume_does_not_notify() {
        let (_, s) = store();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        s.subscribe(Arc::new(move |_: ConfigId, _: usize| {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        assert!(s.consume(CFG, &token().seed).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
