//! Referral-code registry — durable identity → code mapping with
//! collision-checked generation.
//!
//! `get_or_create_code` is idempotent and safe under concurrent callers:
//! the store's atomic insert decides races, and a losing caller returns
//! the winning code instead of minting a second record.

pub mod postgres;
pub mod store;

pub use store::{CodeStore, InsertOutcome, MemoryStore, ReferralRecord, StoreError};

use rand::Rng;
use tracing::debug;

/// Symbols a referral code is drawn from: digits and lowercase letters.
pub const CODE_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Length of every referral code.
pub const CODE_LEN: usize = 16;

/// Default bound on fresh draws when generated codes collide.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Draw a candidate code of [`CODE_LEN`] symbols uniformly from
/// [`CODE_ALPHABET`].
pub fn generate_code<R: Rng>(rng: &mut R) -> String {
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Errors surfaced by [`Registry::get_or_create_code`].
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("identity must not be empty")]
    EmptyIdentity,
    /// Every candidate collided with an existing code. Transient: the
    /// caller may retry the whole operation.
    #[error("code generation exhausted after {attempts} attempts")]
    RegistrationExhausted { attempts: u32 },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Owns the identity → referral-code mapping.
///
/// The identity is an opaque key here; callers normalize it before the
/// call. Exactly one durable write happens on first creation, zero on
/// lookups of an existing identity.
#[derive(Clone)]
pub struct Registry<S> {
    store: S,
    max_attempts: u32,
}

impl<S: CodeStore> Registry<S> {
    pub fn new(store: S) -> Self {
        Self::with_max_attempts(store, DEFAULT_MAX_ATTEMPTS)
    }

    pub fn with_max_attempts(store: S, max_attempts: u32) -> Self {
        Self {
            store,
            max_attempts,
        }
    }

    /// Return the identity's code, creating and persisting one on first use.
    pub async fn get_or_create_code(&self, identity: &str) -> Result<String, RegistryError> {
        if identity.is_empty() {
            return Err(RegistryError::EmptyIdentity);
        }

        if let Some(existing) = self.store.find_by_identity(identity).await? {
            return Ok(existing.code);
        }

        for _ in 0..self.max_attempts {
            let code = {
                let mut rng = rand::thread_rng();
                generate_code(&mut rng)
            };

            // The insert below is the authoritative uniqueness check; this
            // read only skips a write that is already doomed.
            if self.store.find_by_code(&code).await?.is_some() {
                debug!("candidate code for '{identity}' already taken, redrawing");
                continue;
            }

            let record = ReferralRecord::new(identity, code);
            match self.store.insert_if_absent(&record).await? {
                InsertOutcome::Inserted => return Ok(record.code),
                InsertOutcome::IdentityExists { existing } => return Ok(existing.code),
                InsertOutcome::CodeTaken => {
                    debug!("candidate code for '{identity}' collided on insert, redrawing");
                    continue;
                }
            }
        }

        Err(RegistryError::RegistrationExhausted {
            attempts: self.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn generated_codes_use_the_fixed_alphabet() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let code = generate_code(&mut rng);
            assert_eq!(code.len(), CODE_LEN);
            assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn generation_is_deterministic_for_a_seeded_rng() {
        let a = generate_code(&mut StdRng::seed_from_u64(42));
        let b = generate_code(&mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn repeated_calls_return_the_same_code() {
        let store = MemoryStore::new();
        let registry = Registry::new(store.clone());

        let first = registry.get_or_create_code("0xabc").await.unwrap();
        for _ in 0..5 {
            let again = registry.get_or_create_code("0xabc").await.unwrap();
            assert_eq!(again, first);
        }
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_agree_on_one_code() {
        let store = MemoryStore::new();
        let registry = Registry::new(store.clone());

        let mut handles = Vec::new();
        for _ in 0..16 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry.get_or_create_code("0xabc").await.unwrap()
            }));
        }

        let mut codes = HashSet::new();
        for handle in handles {
            codes.insert(handle.await.unwrap());
        }
        assert_eq!(codes.len(), 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_distinct_identities_each_get_their_own_code() {
        let store = MemoryStore::new();
        let registry = Registry::new(store.clone());

        let mut handles = Vec::new();
        for n in 0..32 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry
                    .get_or_create_code(&format!("0xid{n}"))
                    .await
                    .unwrap()
            }));
        }

        let mut codes = HashSet::new();
        for handle in handles {
            codes.insert(handle.await.unwrap());
        }
        assert_eq!(codes.len(), 32);
        assert_eq!(store.len().await, 32);
    }

    #[tokio::test]
    async fn distinct_identities_get_distinct_codes() {
        let registry = Registry::new(MemoryStore::new());
        let a = registry.get_or_create_code("0xaaa").await.unwrap();
        let b = registry.get_or_create_code("0xbbb").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn empty_identity_is_rejected() {
        let registry = Registry::new(MemoryStore::new());
        let err = registry.get_or_create_code("").await.unwrap_err();
        assert!(matches!(err, RegistryError::EmptyIdentity));
    }

    /// Reports the first `collisions` candidate codes as already taken,
    /// then delegates to a real in-memory store.
    struct CollidingStore {
        collisions: u32,
        seen: AtomicU32,
        inner: MemoryStore,
    }

    impl CollidingStore {
        fn new(collisions: u32) -> Self {
            Self {
                collisions,
                seen: AtomicU32::new(0),
                inner: MemoryStore::new(),
            }
        }
    }

    #[async_trait]
    impl CodeStore for CollidingStore {
        async fn find_by_identity(
            &self,
            identity: &str,
        ) -> Result<Option<ReferralRecord>, StoreError> {
            self.inner.find_by_identity(identity).await
        }

        async fn find_by_code(&self, code: &str) -> Result<Option<ReferralRecord>, StoreError> {
            if self.seen.fetch_add(1, Ordering::SeqCst) < self.collisions {
                return Ok(Some(ReferralRecord::new("someone-else", code)));
            }
            self.inner.find_by_code(code).await
        }

        async fn insert_if_absent(
            &self,
            record: &ReferralRecord,
        ) -> Result<InsertOutcome, StoreError> {
            self.inner.insert_if_absent(record).await
        }
    }

    #[tokio::test]
    async fn three_collisions_exhaust_generation() {
        let registry = Registry::new(CollidingStore::new(3));
        let err = registry.get_or_create_code("0xabc").await.unwrap_err();
        assert!(matches!(
            err,
            RegistryError::RegistrationExhausted { attempts: 3 }
        ));
    }

    #[tokio::test]
    async fn two_collisions_succeed_on_the_third_attempt() {
        let registry = Registry::new(CollidingStore::new(2));
        let code = registry.get_or_create_code("0xabc").await.unwrap();
        assert_eq!(code.len(), CODE_LEN);
    }

    /// Simulates losing the insert race on the identity key: lookups miss,
    /// the insert reports an existing winner.
    struct RacingStore {
        winner: ReferralRecord,
    }

    #[async_trait]
    impl CodeStore for RacingStore {
        async fn find_by_identity(
            &self,
            _identity: &str,
        ) -> Result<Option<ReferralRecord>, StoreError> {
            Ok(None)
        }

        async fn find_by_code(&self, _code: &str) -> Result<Option<ReferralRecord>, StoreError> {
            Ok(None)
        }

        async fn insert_if_absent(
            &self,
            _record: &ReferralRecord,
        ) -> Result<InsertOutcome, StoreError> {
            Ok(InsertOutcome::IdentityExists {
                existing: self.winner.clone(),
            })
        }
    }

    #[tokio::test]
    async fn race_loser_returns_the_winning_code() {
        let registry = Registry::new(RacingStore {
            winner: ReferralRecord::new("0xabc", "winnercode000000"),
        });
        let code = registry.get_or_create_code("0xabc").await.unwrap();
        assert_eq!(code, "winnercode000000");
    }

    /// Every insert loses the race on the code key.
    struct TakenStore;

    #[async_trait]
    impl CodeStore for TakenStore {
        async fn find_by_identity(
            &self,
            _identity: &str,
        ) -> Result<Option<ReferralRecord>, StoreError> {
            Ok(None)
        }

        async fn find_by_code(&self, _code: &str) -> Result<Option<ReferralRecord>, StoreError> {
            Ok(None)
        }

        async fn insert_if_absent(
            &self,
            _record: &ReferralRecord,
        ) -> Result<InsertOutcome, StoreError> {
            Ok(InsertOutcome::CodeTaken)
        }
    }

    #[tokio::test]
    async fn insert_races_on_the_code_count_against_the_bound() {
        let registry = Registry::with_max_attempts(TakenStore, 5);
        let err = registry.get_or_create_code("0xabc").await.unwrap_err();
        assert!(matches!(
            err,
            RegistryError::RegistrationExhausted { attempts: 5 }
        ));
    }
}
