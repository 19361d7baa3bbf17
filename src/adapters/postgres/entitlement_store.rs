//! PostgreSQL implementation of EntitlementStore.
//!
//! Updates run in a short transaction that locks the account's row,
//! applies the patch through `EntitlementRecord::apply` and writes the
//! full result back. Conditional updates check their precondition against
//! the locked row. No provider call ever happens inside that transaction.

use crate::config::DatabaseConfig;
use crate::domain::entitlement::{
    ConditionalUpdate, EntitlementPatch, EntitlementRecord, Plan, Precondition,
};
use crate::domain::foundation::{AccountId, DomainError, ErrorCode, Timestamp};
use crate::ports::EntitlementStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};

const SELECT_COLUMNS: &str = r#"
    SELECT account_id, plan, trial_ends_at, trial_ending_soon, provider_customer_id,
           provider_subscription_id, provider_subscription_status, verified_at,
           account_created_at
    FROM entitlements
"#;

/// PostgreSQL implementation of the EntitlementStore port.
#[derive(Clone)]
pub struct PostgresEntitlementStore {
    pool: PgPool,
}

impl PostgresEntitlementStore {
    /// Creates a store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a pool sized from configuration.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DomainError> {
        tracing::info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout())
            .idle_timeout(config.idle_timeout())
            .connect(&config.url)
            .await
            .map_err(|e| DomainError::database(format!("Failed to connect: {}", e)))?;

        Ok(Self { pool })
    }

    /// Applies pending migrations from `migrations/`.
    pub async fn run_migrations(&self) -> Result<(), DomainError> {
        tracing::info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Migration failed: {}", e)))
    }
}

/// Database row representation of an entitlement record.
#[derive(Debug, sqlx::FromRow)]
struct EntitlementRow {
    account_id: String,
    plan: String,
    trial_ends_at: Option<DateTime<Utc>>,
    trial_ending_soon: bool,
    provider_customer_id: Option<String>,
    provider_subscription_id: Option<String>,
    provider_subscription_status: Option<String>,
    verified_at: Option<DateTime<Utc>>,
    account_created_at: DateTime<Utc>,
}

impl TryFrom<EntitlementRow> for EntitlementRecord {
    type Error = DomainError;

    fn try_from(row: EntitlementRow) -> Result<Self, Self::Error> {
        let plan: Plan = row.plan.parse().map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid plan value: {}", e))
        })?;

        Ok(EntitlementRecord {
            account_id: AccountId::new(row.account_id).map_err(|e| {
                DomainError::new(ErrorCode::DatabaseError, format!("Invalid account_id: {}", e))
            })?,
            plan,
            trial_ends_at: row.trial_ends_at.map(Timestamp::from_datetime),
            trial_ending_soon: row.trial_ending_soon,
            provider_customer_id: row.provider_customer_id,
            provider_subscription_id: row.provider_subscription_id,
            provider_subscription_status: row.provider_subscription_status,
            verified_at: row.verified_at.map(Timestamp::from_datetime),
            account_created_at: Timestamp::from_datetime(row.account_created_at),
        })
    }
}

fn db_error(action: &str, e: sqlx::Error) -> DomainError {
    DomainError::database(format!("Failed to {}: {}", action, e))
}

#[async_trait]
impl EntitlementStore for PostgresEntitlementStore {
    async fn get(&self, account_id: &AccountId) -> Result<Option<EntitlementRecord>, DomainError> {
        let row: Option<EntitlementRow> =
            sqlx::query_as(&format!("{} WHERE account_id = $1", SELECT_COLUMNS))
                .bind(account_id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("find entitlement", e))?;

        row.map(EntitlementRecord::try_from).transpose()
    }

    async fn find_by_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<EntitlementRecord>, DomainError> {
        let row: Option<EntitlementRow> = sqlx::query_as(&format!(
            "{} WHERE provider_customer_id = $1 ORDER BY account_created_at LIMIT 1",
            SELECT_COLUMNS
        ))
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find entitlement by customer", e))?;

        row.map(EntitlementRecord::try_from).transpose()
    }

    async fn create(&self, record: &EntitlementRecord) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO entitlements (
                account_id, plan, trial_ends_at, trial_ending_soon, provider_customer_id,
                provider_subscription_id, provider_subscription_status, verified_at,
                account_created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(record.account_id.as_str())
        .bind(record.plan.as_str())
        .bind(record.trial_ends_at.map(|t| *t.as_datetime()))
        .bind(record.trial_ending_soon)
        .bind(&record.provider_customer_id)
        .bind(&record.provider_subscription_id)
        .bind(&record.provider_subscription_status)
        .bind(record.verified_at.map(|t| *t.as_datetime()))
        .bind(record.account_created_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.constraint() == Some("entitlements_pkey") {
                    return DomainError::new(
                        ErrorCode::AlreadyExists,
                        "Account already has an entitlement record",
                    )
                    .with_detail("account_id", record.account_id.as_str());
                }
            }
            db_error("save entitlement", e)
        })?;

        Ok(())
    }

    async fn update(
        &self,
        account_id: &AccountId,
        patch: &EntitlementPatch,
    ) -> Result<EntitlementRecord, DomainError> {
        self.update_if(account_id, &Precondition::default(), patch)
            .await
            .map(ConditionalUpdate::into_record)
    }

    async fn update_if(
        &self,
        account_id: &AccountId,
        expected: &Precondition,
        patch: &EntitlementPatch,
    ) -> Result<ConditionalUpdate, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("begin transaction", e))?;

        let row: Option<EntitlementRow> = sqlx::query_as(&format!(
            "{} WHERE account_id = $1 FOR UPDATE",
            SELECT_COLUMNS
        ))
        .bind(account_id.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| db_error("lock entitlement", e))?;

        let current = row
            .map(EntitlementRecord::try_from)
            .transpose()?
            .ok_or_else(|| {
                DomainError::new(ErrorCode::EntitlementNotFound, "Entitlement not found")
                    .with_detail("account_id", account_id.as_str())
            })?;

        if !expected.holds(&current) {
            tx.rollback()
                .await
                .map_err(|e| db_error("release entitlement lock", e))?;
            return Ok(ConditionalUpdate::Superseded(current));
        }

        let next = current.apply(patch)?;

        sqlx::query(
            r#"
            UPDATE entitlements SET
                plan = $2,
                trial_ends_at = $3,
                trial_ending_soon = $4,
                provider_customer_id = $5,
                provider_subscription_id = $6,
                provider_subscription_status = $7,
                verified_at = $8,
                updated_at = NOW()
            WHERE account_id = $1
            "#,
        )
        .bind(account_id.as_str())
        .bind(next.plan.as_str())
        .bind(next.trial_ends_at.map(|t| *t.as_datetime()))
        .bind(next.trial_ending_soon)
        .bind(&next.provider_customer_id)
        .bind(&next.provider_subscription_id)
        .bind(&next.provider_subscription_status)
        .bind(next.verified_at.map(|t| *t.as_datetime()))
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("update entitlement", e))?;

        tx.commit()
            .await
            .map_err(|e| db_error("commit entitlement update", e))?;

        Ok(ConditionalUpdate::Applied(next))
    }
}
