//! In-memory storage implementation.
//!
//! All tables live behind one `tokio::sync::Mutex`, so every operation is a
//! single critical section. Nothing survives a restart.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use ledger_core::{
    CompanyCreditAccount, CompanyId, CreditTransaction, PlanId, ProcessedWebhookEvent,
    WebhookFailure,
};

use crate::error::{Result, StoreError};
use crate::{
    apply_adjustment, guard_automated_mutation, require_positive, AdjustmentMode, Store,
};

#[derive(Debug, Default)]
struct Tables {
    accounts: HashMap<CompanyId, CompanyCreditAccount>,
    /// Append order is chronological order.
    transactions: Vec<CreditTransaction>,
    processed_events: HashMap<String, ProcessedWebhookEvent>,
    webhook_failures: Vec<WebhookFailure>,
    company_plans: HashMap<CompanyId, PlanId>,
}

impl Tables {
    fn account_mut(&mut self, company_id: &CompanyId) -> &mut CompanyCreditAccount {
        self.accounts
            .entry(company_id.clone())
            .or_insert_with(|| CompanyCreditAccount::new(company_id.clone()))
    }
}

/// Mutex-guarded in-memory storage.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite an account row as-is, bypassing every check.
    ///
    /// Lets tests simulate rows corrupted outside the ledger.
    pub async fn put_account_unchecked(&self, account: CompanyCreditAccount) {
        let mut tables = self.tables.lock().await;
        tables.accounts.insert(account.company_id.clone(), account);
    }
}

#[async_trait]
impl Store for MemoryStore {
    // =========================================================================
    // Account Operations
    // =========================================================================

    async fn get_account(&self, company_id: &CompanyId) -> Result<Option<CompanyCreditAccount>> {
        Ok(self.tables.lock().await.accounts.get(company_id).cloned())
    }

    async fn wipe_company(&self, company_id: &CompanyId) -> Result<()> {
        let mut tables = self.tables.lock().await;
        if tables.accounts.remove(company_id).is_none() {
            return Err(StoreError::NotFound);
        }
        tables
            .transactions
            .retain(|tx| &tx.company_id != company_id);
        Ok(())
    }

    async fn reconcile(&self, company_id: &CompanyId) -> Result<CompanyCreditAccount> {
        let mut tables = self.tables.lock().await;
        let account = tables
            .accounts
            .get_mut(company_id)
            .ok_or(StoreError::NotFound)?;

        account
            .check_invariants()
            .map_err(|reason| StoreError::ConsistencyViolation {
                company_id: company_id.to_string(),
                reason,
            })?;

        account.needs_reconciliation = false;
        account.updated_at = Utc::now();
        Ok(account.clone())
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

        let mut tables = self.tables.lock().await;
        if tables.processed_events.contains_key(idempotency_key) {
            return Err(StoreError::DuplicateEvent {
                event_id: idempotency_key.to_string(),
            });
        }

        let account = tables.account_mut(company_id);
        guard_automated_mutation(account)?;

        account.balance += amount;
        account.purchased_total += amount;
        account.updated_at = Utc::now();
        let balance = account.balance;

        tables.transactions.push(CreditTransaction::purchase(
            company_id.clone(),
            amount,
            balance,
            reference.to_string(),
        ));
        tables.processed_events.insert(
            idempotency_key.to_string(),
            ProcessedWebhookEvent::new(idempotency_key, company_id.clone(), amount),
        );

        Ok(balance)
    }

    async fn debit(&self, company_id: &CompanyId, amount: i64, reference: &str) -> Result<i64> {
        require_positive(amount)?;

        let mut tables = self.tables.lock().await;
        let account = tables.account_mut(company_id);
        guard_automated_mutation(account)?;

        if !account.has_sufficient_credits(amount) {
            return Err(StoreError::InsufficientCredits {
                balance: account.balance,
                required: amount,
            });
        }

        account.balance -= amount;
        account.spent_total += amount;
        account.updated_at = Utc::now();
        let balance = account.balance;

        tables.transactions.push(CreditTransaction::spend(
            company_id.clone(),
            amount,
            balance,
            reference.to_string(),
        ));

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

        let mut tables = self.tables.lock().await;
        let mut account = tables
            .accounts
            .get(company_id)
            .cloned()
            .unwrap_or_else(|| CompanyCreditAccount::new(company_id.clone()));
        apply_adjustment(&mut account, delta, mode)?;
        let balance = account.balance;
        tables.accounts.insert(company_id.clone(), account);

        tables.transactions.push(CreditTransaction::admin_adjustment(
            company_id.clone(),
            delta,
            balance,
            reason.to_string(),
        ));

        Ok(balance)
    }

    async fn refund(&self, company_id: &CompanyId, amount: i64, reference: &str) -> Result<i64> {
        require_positive(amount)?;

        let mut tables = self.tables.lock().await;
        let account = tables
            .accounts
            .get_mut(company_id)
            .ok_or(StoreError::NotFound)?;
        guard_automated_mutation(account)?;

        if amount > account.spent_total {
            return Err(StoreError::InvalidAmount(format!(
                "refund of {amount} exceeds spent total {}",
                account.spent_total
            )));
        }

        account.balance += amount;
        account.spent_total -= amount;
        account.updated_at = Utc::now();
        let balance = account.balance;

        tables.transactions.push(CreditTransaction::refund(
            company_id.clone(),
            amount,
            balance,
            reference.to_string(),
        ));

        Ok(balance)
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
        let tables = self.tables.lock().await;
        Ok(tables
            .transactions
            .iter()
            .rev()
            .filter(|tx| &tx.company_id == company_id)
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    // =========================================================================
    // Webhook Bookkeeping
    // =========================================================================

    async fn has_processed_event(&self, event_id: &str) -> Result<bool> {
        Ok(self
            .tables
            .lock()
            .await
            .processed_events
            .contains_key(event_id))
    }

    async fn record_webhook_failure(&self, failure: &WebhookFailure) -> Result<()> {
        self.tables
            .lock()
            .await
            .webhook_failures
            .push(failure.clone());
        Ok(())
    }

    async fn list_webhook_failures(&self, limit: usize) -> Result<Vec<WebhookFailure>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .webhook_failures
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    // =========================================================================
    // Plan References
    // =========================================================================

    async fn get_company_plan(&self, company_id: &CompanyId) -> Result<Option<PlanId>> {
        Ok(self
            .tables
            .lock()
            .await
            .company_plans
            .get(company_id)
            .cloned())
    }

    async fn set_company_plan(
        &self,
        company_id: &CompanyId,
        plan_id: Option<&PlanId>,
    ) -> Result<()> {
        let mut tables = self.tables.lock().await;
        match plan_id {
            Some(plan_id) => {
                tables
                    .company_plans
                    .insert(company_id.clone(), plan_id.clone());
            }
            None => {
                tables.company_plans.remove(company_id);
            }
        }
        Ok(())
    }
}
