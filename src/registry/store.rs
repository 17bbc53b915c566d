//! Store contract for referral records, plus the in-memory implementation.
//!
//! The store owns both uniqueness guarantees: one record per identity and
//! one record per code. `insert_if_absent` must be atomic so concurrent
//! creators cannot both win; the registry only interprets the outcome.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

/// One durable identity → code mapping. Never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferralRecord {
    pub identity: String,
    pub code: String,
}

impl ReferralRecord {
    pub fn new(identity: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            code: code.into(),
        }
    }
}

/// Result of an atomic insert attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The record was persisted; exactly one durable write happened.
    Inserted,
    /// Another record already holds this identity. Carries the winner so
    /// a racing caller can return the winning code without re-reading.
    IdentityExists { existing: ReferralRecord },
    /// Another identity already holds this code; the caller should draw a
    /// fresh one.
    CodeTaken,
}

/// Errors from the underlying store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),
}

/// Durable referral-record store.
///
/// Implementations acquire a connection per operation and release it on
/// every exit path; no call spans a round-trip to the feed or transport.
#[async_trait]
pub trait CodeStore: Send + Sync {
    async fn find_by_identity(&self, identity: &str) -> Result<Option<ReferralRecord>, StoreError>;

    async fn find_by_code(&self, code: &str) -> Result<Option<ReferralRecord>, StoreError>;

    /// Insert the record unless either key is taken. Check-and-insert is
    /// a single atomic step.
    async fn insert_if_absent(&self, record: &ReferralRecord) -> Result<InsertOutcome, StoreError>;
}

#[derive(Default)]
struct MemoryInner {
    by_identity: HashMap<String, String>,
    by_code: HashMap<String, String>,
}

/// In-memory store for tests and local runs. Both indexes live under one
/// lock, which makes `insert_if_absent` atomic.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records (test assertions).
    pub async fn len(&self) -> usize {
        self.inner.lock().await.by_identity.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CodeStore for MemoryStore {
    async fn find_by_identity(&self, identity: &str) -> Result<Option<ReferralRecord>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .by_identity
            .get(identity)
            .map(|code| ReferralRecord::new(identity, code.clone())))
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<ReferralRecord>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .by_code
            .get(code)
            .map(|identity| ReferralRecord::new(identity.clone(), code)))
    }

    async fn insert_if_absent(&self, record: &ReferralRecord) -> Result<InsertOutcome, StoreError> {
        let mut inner = self.inner.lock().await;

        if let Some(code) = inner.by_identity.get(&record.identity) {
            return Ok(InsertOutcome::IdentityExists {
                existing: ReferralRecord::new(record.identity.clone(), code.clone()),
            });
        }
        if inner.by_code.contains_key(&record.code) {
            return Ok(InsertOutcome::CodeTaken);
        }

        inner
            .by_identity
            .insert(record.identity.clone(), record.code.clone());
        inner
            .by_code
            .insert(record.code.clone(), record.identity.clone());
        Ok(InsertOutcome::Inserted)
    }
}
