//! PostgreSQL storage implementation.
//!
//! Each mutating operation runs in one database transaction that locks the
//! company's account row. Debits additionally use a conditional
//! `UPDATE ... WHERE balance >= $n`, and the processed-event marker relies on
//! the primary key of `processed_webhook_events`.

use async_trait::async_trait;
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

use ledger_core::{
    CompanyCreditAccount, CompanyId, CreditTransaction, PlanId, TransactionId, TransactionKind,
    WebhookFailure,
};

use crate::error::{Result, StoreError};
use crate::{
    apply_adjustment, guard_automated_mutation, require_positive, AdjustmentMode, Store,
};

const ACCOUNT_COLS: &str = "company_id, balance, purchased_total, spent_total, \
     needs_reconciliation, created_at, updated_at";

const TRANSACTION_COLS: &str =
    "id, company_id, kind, amount, balance_after, reference, description, created_at";

fn row_to_account(row: &PgRow) -> Result<CompanyCreditAccount> {
    Ok(CompanyCreditAccount {
        company_id: CompanyId::new(row.try_get::<String, _>("company_id")?)?,
        balance: row.try_get("balance")?,
        purchased_total: row.try_get("purchased_total")?,
        spent_total: row.try_get("spent_total")?,
        needs_reconciliation: row.try_get("needs_reconciliation")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_transaction(row: &PgRow) -> Result<CreditTransaction> {
    let kind: String = row.try_get("kind")?;
    Ok(CreditTransaction {
        id: row.try_get::<String, _>("id")?.parse::<TransactionId>()?,
        company_id: CompanyId::new(row.try_get::<String, _>("company_id")?)?,
        kind: TransactionKind::parse(&kind)
            .ok_or_else(|| StoreError::Serialization(format!("unknown transaction kind {kind}")))?,
        amount: row.try_get("amount")?,
        balance_after: row.try_get("balance_after")?,
        reference: row.try_get("reference")?,
        description: row.try_get("description")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_failure(row: &PgRow) -> Result<WebhookFailure> {
    Ok(WebhookFailure {
        event_id: row.try_get("event_id")?,
        event_type: row.try_get("event_type")?,
        reason: row.try_get("reason")?,
        metadata: row.try_get("metadata")?,
        recorded_at: row.try_get("recorded_at")?,
    })
}

fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// PostgreSQL-backed storage implementation.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect to the database at `database_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be established.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Apply the embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if a migration fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        tracing::info!("Ledger migrations applied");
        Ok(())
    }

    /// Create the zero-balance account row if it does not exist yet.
    async fn ensure_account(conn: &mut PgConnection, company_id: &CompanyId) -> Result<()> {
        sqlx::query(
            "INSERT INTO company_credit_accounts (company_id) VALUES ($1) \
             ON CONFLICT (company_id) DO NOTHING",
        )
        .bind(company_id.as_str())
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Load and row-lock an account for the rest of the transaction.
    async fn lock_account(
        conn: &mut PgConnection,
        company_id: &CompanyId,
    ) -> Result<Option<CompanyCreditAccount>> {
        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLS} FROM company_credit_accounts WHERE company_id = $1 FOR UPDATE"
        ))
        .bind(company_id.as_str())
        .fetch_optional(conn)
        .await?;

        row.as_ref().map(row_to_account).transpose()
    }

    /// Persist `needs_reconciliation = TRUE`.
    async fn flag_for_reconciliation(
        conn: &mut PgConnection,
        company_id: &CompanyId,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE company_credit_accounts \
             SET needs_reconciliation = TRUE, updated_at = now() \
             WHERE company_id = $1",
        )
        .bind(company_id.as_str())
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Write the full set of mutable account columns.
    async fn write_account(conn: &mut PgConnection, account: &CompanyCreditAccount) -> Result<()> {
        sqlx::query(
            "UPDATE company_credit_accounts \
             SET balance = $2, purchased_total = $3, spent_total = $4, \
                 needs_reconciliation = $5, updated_at = $6 \
             WHERE company_id = $1",
        )
        .bind(account.company_id.as_str())
        .bind(account.balance)
        .bind(account.purchased_total)
        .bind(account.spent_total)
        .bind(account.needs_reconciliation)
        .bind(account.updated_at)
        .execute(conn)
        .await?;
        Ok(())
    }

    async fn append_transaction(conn: &mut PgConnection, tx: &CreditTransaction) -> Result<()> {
        sqlx::query(
            "INSERT INTO credit_transactions \
             (id, company_id, kind, amount, balance_after, reference, description, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(tx.id.to_string())
        .bind(tx.company_id.as_str())
        .bind(tx.kind.as_str())
        .bind(tx.amount)
        .bind(tx.balance_after)
        .bind(&tx.reference)
        .bind(&tx.description)
        .bind(tx.created_at)
        .execute(conn)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    // =========================================================================
    // Account Operations
    // =========================================================================

    async fn get_account(&self, company_id: &CompanyId) -> Result<Option<CompanyCreditAccount>> {
        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLS} FROM company_credit_accounts WHERE company_id = $1"
        ))
        .bind(company_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_account).transpose()
    }

    async fn wipe_company(&self, company_id: &CompanyId) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM credit_transactions WHERE company_id = $1")
            .bind(company_id.as_str())
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM company_credit_accounts WHERE company_id = $1")
            .bind(company_id.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            tx.rollback().await?;
            return Err(StoreError::NotFound);
        }

        tx.commit().await?;
        Ok(())
    }

    async fn reconcile(&self, company_id: &CompanyId) -> Result<CompanyCreditAccount> {
        let mut tx = self.pool.begin().await?;
        let mut account = Self::lock_account(&mut tx, company_id)
            .await?
            .ok_or(StoreError::NotFound)?;

        account
            .check_invariants()
            .map_err(|reason| StoreError::ConsistencyViolation {
                company_id: company_id.to_string(),
                reason,
            })?;

        account.needs_reconciliation = false;
        account.updated_at = chrono::Utc::now();
        Self::write_account(&mut tx, &account).await?;
        tx.commit().await?;

        Ok(account)
    }

    // =========================================================================
    // Ledger Mutations
    // =========================================================================

    async fn credit(
        &self,
        company_id: &CompanyId,
        amount: i64,
        reference: &str,
        idempotency_key: &str,
    ) -> Result<i64> {
        require_positive(amount)?;

        let mut tx = self.pool.begin().await?;

        // A concurrent insert of the same key blocks here until the other
        // transaction finishes, then conflicts.
        let inserted = sqlx::query(
            "INSERT INTO processed_webhook_events (event_id, company_id, credits) \
             VALUES ($1, $2, $3) ON CONFLICT (event_id) DO NOTHING",
        )
        .bind(idempotency_key)
        .bind(company_id.as_str())
        .bind(amount)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 0 {
            tx.rollback().await?;
            return Err(StoreError::DuplicateEvent {
                event_id: idempotency_key.to_string(),
            });
        }

        Self::ensure_account(&mut tx, company_id).await?;
        let mut account = Self::lock_account(&mut tx, company_id)
            .await?
            .ok_or(StoreError::NotFound)?;

        if let Err(err) = guard_automated_mutation(&mut account) {
            tx.rollback().await?;
            let mut conn = self.pool.acquire().await?;
            Self::flag_for_reconciliation(&mut conn, company_id).await?;
            return Err(err);
        }

        let balance: i64 = sqlx::query_scalar(
            "UPDATE company_credit_accounts \
             SET balance = balance + $2, purchased_total = purchased_total + $2, updated_at = now() \
             WHERE company_id = $1 \
             RETURNING balance",
        )
        .bind(company_id.as_str())
        .bind(amount)
        .fetch_one(&mut *tx)
        .await?;

        let transaction =
            CreditTransaction::purchase(company_id.clone(), amount, balance, reference.to_string());
        Self::append_transaction(&mut tx, &transaction).await?;

        tx.commit().await?;
        Ok(balance)
    }

    async fn debit(&self, company_id: &CompanyId, amount: i64, reference: &str) -> Result<i64> {
        require_positive(amount)?;

        let mut tx = self.pool.begin().await?;
        Self::ensure_account(&mut tx, company_id).await?;
        let mut account = Self::lock_account(&mut tx, company_id)
            .await?
            .ok_or(StoreError::NotFound)?;

        if let Err(err) = guard_automated_mutation(&mut account) {
            Self::flag_for_reconciliation(&mut tx, company_id).await?;
            tx.commit().await?;
            return Err(err);
        }

        let balance: Option<i64> = sqlx::query_scalar(
            "UPDATE company_credit_accounts \
             SET balance = balance - $2, spent_total = spent_total + $2, updated_at = now() \
             WHERE company_id = $1 AND balance >= $2 \
             RETURNING balance",
        )
        .bind(company_id.as_str())
        .bind(amount)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(balance) = balance else {
            // Keep the lazily created row; nothing else was written.
            tx.commit().await?;
            return Err(StoreError::InsufficientCredits {
                balance: account.balance,
                required: amount,
            });
        };

        let transaction =
            CreditTransaction::spend(company_id.clone(), amount, balance, reference.to_string());
        Self::append_transaction(&mut tx, &transaction).await?;

        tx.commit().await?;
        Ok(balance)
    }

    async fn adjust(
        &self,
        company_id: &CompanyId,
        delta: i64,
        reason: &str,
        mode: AdjustmentMode,
    ) -> Result<i64> {
        if delta == 0 {
            return Err(StoreError::InvalidAmount(
                "adjustment delta must be non-zero".into(),
            ));
        }

        let mut tx = self.pool.begin().await?;
        Self::ensure_account(&mut tx, company_id).await?;
        let mut account = Self::lock_account(&mut tx, company_id)
            .await?
            .ok_or(StoreError::NotFound)?;

        if let Err(e) = apply_adjustment(&mut account, delta, mode) {
            tx.rollback().await?;
            return Err(e);
        }
        Self::write_account(&mut tx, &account).await?;

        let transaction = CreditTransaction::admin_adjustment(
            company_id.clone(),
            delta,
            account.balance,
            reason.to_string(),
        );
        Self::append_transaction(&mut tx, &transaction).await?;

        tx.commit().await?;
        Ok(account.balance)
    }

    async fn refund(&self, company_id: &CompanyId, amount: i64, reference: &str) -> Result<i64> {
        require_positive(amount)?;

        let mut tx = self.pool.begin().await?;
        let mut account = Self::lock_account(&mut tx, company_id)
            .await?
            .ok_or(StoreError::NotFound)?;

        if let Err(err) = guard_automated_mutation(&mut account) {
            Self::flag_for_reconciliation(&mut tx, company_id).await?;
            tx.commit().await?;
            return Err(err);
        }

        if amount > account.spent_total {
            tx.rollback().await?;
            return Err(StoreError::InvalidAmount(format!(
                "refund of {amount} exceeds spent total {}",
                account.spent_total
            )));
        }

        account.balance += amount;
        account.spent_total -= amount;
        account.updated_at = chrono::Utc::now();
        Self::write_account(&mut tx, &account).await?;

        let transaction = CreditTransaction::refund(
            company_id.clone(),
            amount,
            account.balance,
            reference.to_string(),
        );
        Self::append_transaction(&mut tx, &transaction).await?;

        tx.commit().await?;
        Ok(account.balance)
    }

    // =========================================================================
    // Transaction History
    // =========================================================================

    async fn list_transactions(
        &self,
        company_id: &CompanyId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditTransaction>> {
        let rows = sqlx::query(&format!(
            "SELECT {TRANSACTION_COLS} FROM credit_transactions \
             WHERE company_id = $1 \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2 OFFSET $3"
        ))
        .bind(company_id.as_str())
        .bind(to_i64(limit))
        .bind(to_i64(offset))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_transaction).collect()
    }

    // =========================================================================
    // Webhook Bookkeeping
    // =========================================================================

    async fn has_processed_event(&self, event_id: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM processed_webhook_events WHERE event_id = $1)",
        )
        .bind(event_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn record_webhook_failure(&self, failure: &WebhookFailure) -> Result<()> {
        sqlx::query(
            "INSERT INTO webhook_failures (event_id, event_type, reason, metadata, recorded_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&failure.event_id)
        .bind(&failure.event_type)
        .bind(&failure.reason)
        .bind(&failure.metadata)
        .bind(failure.recorded_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_webhook_failures(&self, limit: usize) -> Result<Vec<WebhookFailure>> {
        let rows = sqlx::query(
            "SELECT event_id, event_type, reason, metadata, recorded_at \
             FROM webhook_failures ORDER BY recorded_at DESC, id DESC LIMIT $1",
        )
        .bind(to_i64(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_failure).collect()
    }

    // =========================================================================
    // Plan References
    // =========================================================================

    async fn get_company_plan(&self, company_id: &CompanyId) -> Result<Option<PlanId>> {
        let plan: Option<String> =
            sqlx::query_scalar("SELECT plan_id FROM company_plans WHERE company_id = $1")
                .bind(company_id.as_str())
                .fetch_optional(&self.pool)
                .await?;

        Ok(plan.map(PlanId::new).transpose()?)
    }

    async fn set_company_plan(
        &self,
        company_id: &CompanyId,
        plan_id: Option<&PlanId>,
    ) -> Result<()> {
        match plan_id {
            Some(plan_id) => {
                sqlx::query(
                    "INSERT INTO company_plans (company_id, plan_id) VALUES ($1, $2) \
                     ON CONFLICT (company_id) \
                     DO UPDATE SET plan_id = EXCLUDED.plan_id, updated_at = now()",
                )
                .bind(company_id.as_str())
                .bind(plan_id.as_str())
                .execute(&self.pool)
                .await?;
            }
            None => {
                sqlx::query("DELETE FROM company_plans WHERE company_id = $1")
                    .bind(company_id.as_str())
                    .execute(&self.pool)
                    .await?;
            }
        }
        Ok(())
    }
}
