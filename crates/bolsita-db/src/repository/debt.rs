//! # Debt Repository
//!
//! Debts under `users/{owner}/debts`, each with a `payments` sub-collection.
//!
//! ## Payment Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  apply_payment(debt_id, amount)                                        │
//! │       │                                                                 │
//! │       ├── amount ≤ 0 ? ──► MustBePositive (no store access)            │
//! │       ▼                                                                 │
//! │  snapshot: debts/{id} @ v                                              │
//! │       ├── missing ?            ──► DebtNotFound                        │
//! │       ├── amount > balance ?   ──► Overpayment                         │
//! │       ▼                                                                 │
//! │  commit (debt must still be @ v)                                       │
//! │       ├── debts/{id}                   balance -= amount               │
//! │       └── debts/{id}/payments/{new}    { amount, createdAt }           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every payment bumps the debt's version, so a cascading delete that pins
//! the debt version also sees every payment written before it.

use chrono::Utc;
use tracing::{debug, info, warn};

use bolsita_core::validation::{validate_new_debt, validate_positive_amount};
use bolsita_core::{CoreError, Debt, DebtPayment, Money, NewDebt, ValidationError};

use super::{check_id, RepoContext};
use crate::error::{DbError, DbResult};
use crate::paths::new_id;
use crate::store::{Precondition, WriteBatch};
use crate::subscription::Subscription;
use crate::txn::{run_optimistic, WriteSet};

#[derive(Debug, Clone)]
pub struct DebtRepository {
    ctx: RepoContext,
}

fn sort_newest_first(debts: &mut Vec<Debt>) {
    debts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
}

fn sort_payments(payments: &mut Vec<DebtPayment>) {
    payments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
}

impl DebtRepository {
    pub fn new(ctx: RepoContext) -> Self {
        DebtRepository { ctx }
    }

    /// Opens a debt with its balance equal to the initial amount.
    pub async fn create(&self, new: NewDebt) -> DbResult<Debt> {
        validate_new_debt(&new)?;
        let debt = Debt {
            id: new_id(),
            owner_id: self.ctx.owner_id(),
            direction: new.direction,
            person_name: new.person_name.trim().to_string(),
            initial_amount: new.initial_amount,
            current_balance: new.initial_amount,
            concept: new.concept.trim().to_string(),
            created_at: Utc::now(),
            due_date: new.due_date,
        };

        debug!(id = %debt.id, direction = ?debt.direction, amount = %debt.initial_amount, "Creating debt");

        let mut batch = WriteBatch::new();
        batch.set(self.ctx.scope.debt(&debt.id), &debt, Precondition::Missing)?;
        self.ctx.store.commit(batch).await?;
        Ok(debt)
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Debt>> {
        check_id("id", id)?;
        match self.ctx.store.get(&self.ctx.scope.debt(id)).await? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    /// Every debt, newest first.
    pub async fn list(&self) -> DbResult<Vec<Debt>> {
        let mut debts: Vec<Debt> = self.ctx.list(&self.ctx.scope.debts()).await?;
        sort_newest_first(&mut debts);
        Ok(debts)
    }

    /// Applies a payment and returns the updated debt with the new payment.
    ///
    /// ## Errors
    /// - `MustBePositive` when `amount ≤ 0`
    /// - `DebtNotFound` when the debt does not exist
    /// - `Overpayment` when `amount` exceeds the current balance
    /// - `Contention` when the debt keeps changing underneath
    pub async fn apply_payment(&self, debt_id: &str, amount: Money) -> DbResult<(Debt, DebtPayment)> {
        check_id("debtId", debt_id)?;
        validate_positive_amount("payment", amount)?;

        debug!(debt_id = %debt_id, amount = %amount, "Applying debt payment");

        let path = self.ctx.scope.debt(debt_id);
        let payment_id = new_id();
        let payment_path = self.ctx.scope.payment(debt_id, &payment_id);

        let (debt, payment) = run_optimistic(
            self.ctx.store.as_ref(),
            std::slice::from_ref(&path),
            self.ctx.policy,
            |snapshot| {
                if !amount.is_positive() {
                    return Err(ValidationError::must_be_positive("payment").into());
                }

                let mut debt: Debt = snapshot
                    .decode(&path)?
                    .ok_or_else(|| CoreError::DebtNotFound(debt_id.to_string()))?;

                if amount > debt.current_balance {
                    return Err(CoreError::Overpayment {
                        amount,
                        balance: debt.current_balance,
                    }
                    .into());
                }
                debt.current_balance = debt.current_balance - amount;

                let payment = DebtPayment {
                    id: payment_id.clone(),
                    amount,
                    created_at: Utc::now(),
                };

                let mut writes = WriteSet::new();
                writes.set(path.clone(), &debt)?;
                writes.create(payment_path.clone(), &payment)?;
                Ok((writes, (debt, payment)))
            },
        )
        .await?;

        info!(
            debt_id = %debt_id,
            amount = %amount,
            balance = %debt.current_balance,
            "Debt payment recorded"
        );
        Ok((debt, payment))
    }

    /// Payments of one debt, newest first.
    pub async fn payments(&self, debt_id: &str) -> DbResult<Vec<DebtPayment>> {
        check_id("debtId", debt_id)?;
        let mut payments: Vec<DebtPayment> = self.ctx.list(&self.ctx.scope.payments(debt_id)).await?;
        sort_payments(&mut payments);
        Ok(payments)
    }

    /// Deletes a debt together with its payments, in one commit.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        check_id("id", id)?;
        let path = self.ctx.scope.debt(id);
        let payments_collection = self.ctx.scope.payments(id);
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            // Debt first: a payment committed after this read bumps its version.
            let debt = self
                .ctx
                .store
                .get(&path)
                .await?
                .ok_or_else(|| DbError::not_found("Debt", id))?;
            let payments = self.ctx.store.list(&payments_collection).await?;

            let mut batch = WriteBatch::new();
            batch.delete(path.clone(), Precondition::Version(debt.version));
            for payment in &payments {
                batch.delete(payment.path.clone(), Precondition::Version(payment.version));
            }

            match self.ctx.store.commit(batch).await {
                Ok(()) => {
                    debug!(id = %id, payments = payments.len(), "Deleted debt");
                    return Ok(());
                }
                Err(err) if err.is_retryable() && attempt < self.ctx.policy.max_attempts => {
                    warn!(id = %id, attempt, "Debt changed during delete, retrying");
                }
                Err(err) if err.is_retryable() => {
                    return Err(DbError::Contention { attempts: attempt })
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Live debt list, newest first.
    pub async fn subscribe(&self) -> DbResult<Subscription<Vec<Debt>>> {
        self.ctx
            .subscribe_collection(self.ctx.scope.debts(), sort_newest_first)
            .await
    }

    /// Live payment list of one debt, newest first.
    pub async fn subscribe_payments(&self, debt_id: &str) -> DbResult<Subscription<Vec<DebtPayment>>> {
        check_id("debtId", debt_id)?;
        self.ctx
            .subscribe_collection(self.ctx.scope.payments(debt_id), sort_payments)
            .await
    }
}
