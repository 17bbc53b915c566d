//! Postgres-backed referral store.
//!
//! Uniqueness lives in the schema: `referral_codes_pkey` on the identity
//! and `referral_codes_code_key` on the code. `insert_if_absent` maps a
//! unique violation back to the racing outcome by constraint name.

use async_trait::async_trait;
use sqlx::PgPool;

use super::store::{CodeStore, InsertOutcome, ReferralRecord, StoreError};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|error| StoreError::Database(error.to_string()))?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply pending migrations from the crate's `migrations/` directory.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!()
            .run(&self.pool)
            .await
            .map_err(|error| StoreError::Database(error.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl CodeStore for PgStore {
    async fn find_by_identity(&self, identity: &str) -> Result<Option<ReferralRecord>, StoreError> {
        let row = sqlx::query_as::<_, CodeRow>(
            "SELECT identity, code FROM referral_codes WHERE identity = $1",
        )
        .bind(identity)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| StoreError::Database(error.to_string()))?;

        Ok(row.map(Into::into))
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<ReferralRecord>, StoreError> {
        let row = sqlx::query_as::<_, CodeRow>(
            "SELECT identity, code FROM referral_codes WHERE code = $1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| StoreError::Database(error.to_string()))?;

        Ok(row.map(Into::into))
    }

    async fn insert_if_absent(&self, record: &ReferralRecord) -> Result<InsertOutcome, StoreError> {
        let result = sqlx::query("INSERT INTO referral_codes (identity, code) VALUES ($1, $2)")
            .bind(&record.identity)
            .bind(&record.code)
            .execute(&self.pool)
            .await;

        let error = match result {
            Ok(_) => return Ok(InsertOutcome::Inserted),
            Err(error) => error,
        };
        if !is_unique_violation(&error) {
            return Err(StoreError::Database(error.to_string()));
        }
        if constraint_name(&error) == Some("referral_codes_code_key") {
            return Ok(InsertOutcome::CodeTaken);
        }

        // Conflict on the identity key: the winner has committed, read its
        // row. A miss here means the conflict cannot be attributed, so let
        // the caller redraw and retry.
        match self.find_by_identity(&record.identity).await? {
            Some(existing) => Ok(InsertOutcome::IdentityExists { existing }),
            None => Ok(InsertOutcome::CodeTaken),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CodeRow {
    identity: String,
    code: String,
}

impl From<CodeRow> for ReferralRecord {
    fn from(value: CodeRow) -> Self {
        Self {
            identity: value.identity,
            code: value.code,
        }
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Database(db_error) if db_error.code().as_deref() == Some("23505")
    )
}

fn constraint_name(error: &sqlx::Error) -> Option<&str> {
    match error {
        sqlx::Error::Database(db_error) => db_error.constraint(),
        _ => None,
    }
}
