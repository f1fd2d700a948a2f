// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ledger service: the sole writer of account balances.
//!
//! Balances change in exactly two ways:
//!
//! - **deposit approval** credits `deposit.amount`;
//! - **purchase settlement** debits `item.price_coins`.
//!
//! Each balance write is a compare-and-swap on the account row (see
//! [`AccountRepository`]), so concurrent settlements serialize. The second
//! row of each flow (deposit status, purchase record) is written separately
//! and a failure there is undone with a compensating write.
//!
//! ## Deposit approval
//!
//! ```text
//! pending ─swap─► crediting ─credit─► (balance += amount) ─swap─► approved
//!                     │
//!                     └─ credit failed ─► pending
//! ```
//!
//! The credit is idempotent per deposit, so a deposit stuck in `crediting`
//! can be finished by [`LedgerService::reconcile_deposit`] without any risk
//! of paying twice.

use chrono::Utc;

use super::{discard_blobs, required_text, Backends, MarketError, MarketResult, Upload};
use crate::audit_log;
use crate::auth::AuthenticatedUser;
use crate::storage::{
    ensure_admin, ensure_self, generate_blob_name, Account, AccountRepository, AuditEvent,
    AuditEventType, Bucket, CatalogRepository, Deposit, DepositRepository, DepositStatus,
    OwnershipEnforcer, PaymentMethod, Purchase, PurchaseRepository, RowStoreError,
    TransitionError,
};

const MAX_TRANSACTION_REF_LEN: usize = 128;

/// Admin verdict on a pending deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approved,
    Rejected,
}

/// Deposit submission input.
#[derive(Debug, Clone)]
pub struct DepositDraft {
    pub account_id: String,
    /// Requested coins; must be positive.
    pub amount: i64,
    pub method: PaymentMethod,
    pub transaction_ref: String,
    pub screenshot: Option<Upload>,
}

/// Result of a successful purchase.
#[derive(Debug, Clone)]
pub struct Settlement {
    pub purchase: Purchase,
    /// Balance after the debit.
    pub balance: u64,
}

/// Balance-changing operations and the records that justify them.
pub struct LedgerService<'a> {
    backends: Backends<'a>,
}

impl<'a> LedgerService<'a> {
    pub fn new(backends: Backends<'a>) -> Self {
        Self { backends }
    }

    fn accounts(&self) -> AccountRepository<'a> {
        AccountRepository::new(self.backends.rows)
    }

    fn deposits(&self) -> DepositRepository<'a> {
        DepositRepository::new(self.backends.rows)
    }

    fn purchases(&self) -> PurchaseRepository<'a> {
        PurchaseRepository::new(self.backends.rows)
    }

    // ========== Accounts ==========

    /// The caller's account, created with a zero balance on first use.
    pub fn open_account(&self, caller: &AuthenticatedUser) -> MarketResult<Account> {
        let (account, created) = self.accounts().open(&caller.user_id)?;
        if created {
            tracing::info!(account_id = %account.id, "account opened");
            audit_log!(
                self.backends.audit,
                AuditEventType::AccountOpened,
                caller,
                "account",
                &account.id
            );
        }
        Ok(account)
    }

    // ========== Deposits ==========

    /// Record a payment claim for admin review.
    ///
    /// The screenshot is stored first; if the deposit row cannot be written
    /// the screenshot is removed again.
    pub fn submit_deposit(
        &self,
        caller: &AuthenticatedUser,
        draft: DepositDraft,
    ) -> MarketResult<Deposit> {
        ensure_self(caller, &draft.account_id)?;

        let amount = u64::try_from(draft.amount)
            .ok()
            .filter(|amount| *amount > 0)
            .ok_or_else(|| MarketError::validation("amount must be a positive number of coins"))?;
        let transaction_ref =
            required_text("transaction reference", &draft.transaction_ref, MAX_TRANSACTION_REF_LEN)?;
        let screenshot = draft
            .screenshot
            .ok_or_else(|| MarketError::validation("payment screenshot is required"))?;
        screenshot.ensure_image("payment screenshot")?;

        self.accounts().open(&draft.account_id)?;

        let blob_name =
            generate_blob_name(Some(&draft.account_id), screenshot.file_name.as_deref());
        self.backends.blobs.upload(
            Bucket::PaymentScreenshots,
            &blob_name,
            &screenshot.bytes,
            &screenshot.content_type,
        )?;

        let now = Utc::now();
        let deposit = Deposit {
            id: uuid::Uuid::new_v4().to_string(),
            account_id: draft.account_id,
            amount,
            method: draft.method,
            transaction_ref,
            screenshot: blob_name,
            status: DepositStatus::Pending,
            created_at: now,
            updated_at: now,
            resolved_by: None,
            resolved_at: None,
        };

        if let Err(error) = self.deposits().create(&deposit) {
            tracing::error!(deposit_id = %deposit.id, %error, "failed to record deposit");
            let cleanup = discard_blobs(
                self.backends.blobs,
                Bucket::PaymentScreenshots,
                std::slice::from_ref(&deposit.screenshot),
            );
            return Err(MarketError::Persistence {
                reason: error.to_string(),
                compensation: cleanup,
            });
        }

        tracing::info!(
            deposit_id = %deposit.id,
            account_id = %deposit.account_id,
            amount = deposit.amount,
            method = %deposit.method,
            "deposit submitted"
        );
        audit_log!(
            self.backends.audit,
            AuditEvent::new(AuditEventType::DepositSubmitted)
                .with_user(&caller.user_id)
                .with_resource("deposit", &deposit.id)
                .with_details(serde_json::json!({
                    "amount": deposit.amount,
                    "method": deposit.method,
                }))
        );
        Ok(deposit)
    }

    /// Approve or reject a pending deposit (admin only).
    pub fn resolve_deposit(
        &self,
        caller: &AuthenticatedUser,
        deposit_id: &str,
        decision: Decision,
    ) -> MarketResult<Deposit> {
        ensure_admin(caller, "resolving a deposit")?;

        let deposit = self.require_deposit(deposit_id)?;
        if deposit.status != DepositStatus::Pending {
            return Err(not_pending(&deposit.id, deposit.status));
        }

        match decision {
            Decision::Rejected => {
                let rejected = self
                    .deposits()
                    .transition(
                        deposit_id,
                        DepositStatus::Pending,
                        DepositStatus::Rejected,
                        &caller.user_id,
                    )
                    .map_err(|e| transition_error(deposit_id, e))?;

                tracing::info!(deposit_id, "deposit rejected");
                audit_log!(
                    self.backends.audit,
                    AuditEventType::DepositRejected,
                    caller,
                    "deposit",
                    deposit_id
                );
                Ok(rejected)
            }
            Decision::Approved => self.approve(caller, deposit_id),
        }
    }

    fn approve(&self, caller: &AuthenticatedUser, deposit_id: &str) -> MarketResult<Deposit> {
        let deposits = self.deposits();

        // Claim the deposit. Only one concurrent approver can win this swap.
        let crediting = deposits
            .transition(
                deposit_id,
                DepositStatus::Pending,
                DepositStatus::Crediting,
                &caller.user_id,
            )
            .map_err(|e| transition_error(deposit_id, e))?;

        let credited = self.accounts().credit_deposit(
            &crediting.account_id,
            crediting.amount,
            &crediting.id,
        );
        let account = match credited {
            Ok(account) => account,
            Err(credit_error) => {
                tracing::error!(deposit_id, error = %credit_error, "credit failed, reverting deposit to pending");
                let reverted = deposits.transition(
                    deposit_id,
                    DepositStatus::Crediting,
                    DepositStatus::Pending,
                    &caller.user_id,
                );
                audit_log!(
                    self.backends.audit,
                    AuditEvent::new(AuditEventType::DepositApproved)
                        .with_user(&caller.user_id)
                        .with_resource("deposit", deposit_id)
                        .failed(credit_error.to_string())
                );
                return Err(match reverted {
                    Ok(_) => credit_error.into(),
                    Err(revert_error) => {
                        tracing::error!(deposit_id, error = %revert_error, "deposit left in crediting state");
                        MarketError::uncompensated(
                            credit_error,
                            format!("revert to pending failed: {revert_error}"),
                        )
                    }
                });
            }
        };

        let approved = deposits
            .transition(
                deposit_id,
                DepositStatus::Crediting,
                DepositStatus::Approved,
                &caller.user_id,
            )
            .map_err(|error| {
                tracing::error!(
                    deposit_id,
                    %error,
                    "coins credited but deposit left in crediting state; reconcile it"
                );
                MarketError::uncompensated(
                    error,
                    "coins were credited; deposit remains in crediting until reconciled",
                )
            })?;
        self.release_credit_marker(&approved);

        tracing::info!(
            deposit_id,
            account_id = %approved.account_id,
            amount = approved.amount,
            balance = account.balance,
            "deposit approved"
        );
        audit_log!(
            self.backends.audit,
            AuditEvent::new(AuditEventType::DepositApproved)
                .with_user(&caller.user_id)
                .with_resource("deposit", deposit_id)
                .with_details(serde_json::json!({
                    "account_id": approved.account_id,
                    "amount": approved.amount,
                    "balance": account.balance,
                }))
        );
        Ok(approved)
    }

    /// Finish an approval that stalled in `crediting` (admin only).
    ///
    /// Re-applying the credit is a no-op if it already landed.
    pub fn reconcile_deposit(
        &self,
        caller: &AuthenticatedUser,
        deposit_id: &str,
    ) -> MarketResult<Deposit> {
        ensure_admin(caller, "reconciling a deposit")?;

        let deposit = self.require_deposit(deposit_id)?;
        if deposit.status != DepositStatus::Crediting {
            return Err(MarketError::invalid_state(format!(
                "deposit {deposit_id} is {}, only crediting deposits can be reconciled",
                deposit.status
            )));
        }

        let account =
            self.accounts()
                .credit_deposit(&deposit.account_id, deposit.amount, &deposit.id)?;
        let approved = self
            .deposits()
            .transition(
                deposit_id,
                DepositStatus::Crediting,
                DepositStatus::Approved,
                &caller.user_id,
            )
            .map_err(|e| transition_error(deposit_id, e))?;
        self.release_credit_marker(&approved);

        tracing::info!(deposit_id, balance = account.balance, "deposit reconciled");
        audit_log!(
            self.backends.audit,
            AuditEventType::DepositReconciled,
            caller,
            "deposit",
            deposit_id
        );
        Ok(approved)
    }

    /// Deposits visible to the caller, newest first: all of them for
    /// admins, own deposits otherwise.
    pub fn list_deposits(
        &self,
        caller: &AuthenticatedUser,
        status: Option<DepositStatus>,
    ) -> MarketResult<Vec<Deposit>> {
        let deposits = if caller.is_admin() {
            self.deposits().list_all(status)?
        } else {
            self.deposits().list_by_account(&caller.user_id, status)?
        };
        Ok(deposits)
    }

    /// One deposit, if the caller owns it or is an admin.
    pub fn get_deposit(&self, caller: &AuthenticatedUser, deposit_id: &str) -> MarketResult<Deposit> {
        let deposit = self.require_deposit(deposit_id)?;
        deposit.verify_visible_to(caller, "deposit")?;
        Ok(deposit)
    }

    /// Best effort: a marker left behind only costs row space.
    fn release_credit_marker(&self, approved: &Deposit) {
        if let Err(error) = self
            .accounts()
            .release_deposit(&approved.account_id, &approved.id)
        {
            tracing::warn!(deposit_id = %approved.id, %error, "failed to release deposit credit marker");
        }
    }

    fn require_deposit(&self, deposit_id: &str) -> MarketResult<Deposit> {
        self.deposits()
            .get(deposit_id)?
            .ok_or_else(|| MarketError::not_found("deposit", deposit_id))
    }

    // ========== Purchases ==========

    /// Spend coins on a catalog item.
    ///
    /// Order: item and account must exist, the pair must not be owned, the
    /// debit must succeed, then the purchase row is inserted. If the insert
    /// fails the debited coins are refunded. Free items take the same path.
    pub fn settle_purchase(
        &self,
        caller: &AuthenticatedUser,
        account_id: &str,
        item_id: &str,
    ) -> MarketResult<Settlement> {
        ensure_self(caller, account_id)?;

        let item = CatalogRepository::new(self.backends.rows)
            .get(item_id)?
            .ok_or_else(|| MarketError::not_found("catalog item", item_id))?;
        let accounts = self.accounts();
        accounts
            .get(account_id)?
            .ok_or_else(|| MarketError::not_found("account", account_id))?;

        let purchases = self.purchases();
        if purchases.find(account_id, item_id)?.is_some() {
            return Err(duplicate(account_id, item_id));
        }

        let price = item.price_coins;
        let debited = accounts.debit(account_id, price).inspect_err(|error| {
            tracing::info!(account_id, item_id, price, %error, "purchase declined");
        })?;

        let purchase = Purchase::new(account_id, item_id, price);
        if let Err(insert_error) = purchases.create(&purchase) {
            let refunded = accounts.refund(account_id, price);
            let outcome = match (&insert_error, refunded) {
                (RowStoreError::AlreadyExists { .. }, Ok(_)) => duplicate(account_id, item_id),
                (_, Ok(_)) => MarketError::persistence(&insert_error),
                (_, Err(refund_error)) => {
                    tracing::error!(
                        account_id,
                        item_id,
                        price,
                        error = %refund_error,
                        "refund after failed purchase insert did not land"
                    );
                    MarketError::uncompensated(
                        &insert_error,
                        format!("refund of {price} coins failed: {refund_error}"),
                    )
                }
            };
            tracing::warn!(account_id, item_id, error = %insert_error, "purchase insert failed");
            return Err(outcome);
        }

        tracing::info!(
            account_id,
            item_id,
            price,
            balance = debited.balance,
            "purchase settled"
        );
        audit_log!(
            self.backends.audit,
            AuditEvent::new(AuditEventType::PurchaseSettled)
                .with_user(&caller.user_id)
                .with_resource("catalog_item", item_id)
                .with_details(serde_json::json!({
                    "price_coins": price,
                    "balance": debited.balance,
                }))
        );

        Ok(Settlement {
            purchase,
            balance: debited.balance,
        })
    }

    /// The caller's purchases, newest first.
    pub fn list_purchases(&self, caller: &AuthenticatedUser) -> MarketResult<Vec<Purchase>> {
        Ok(self.purchases().list_by_account(&caller.user_id)?)
    }
}

fn duplicate(account_id: &str, item_id: &str) -> MarketError {
    MarketError::DuplicatePurchase {
        account_id: account_id.to_string(),
        item_id: item_id.to_string(),
    }
}

fn not_pending(deposit_id: &str, status: DepositStatus) -> MarketError {
    MarketError::invalid_state(format!(
        "deposit {deposit_id} is {status}, only pending deposits can be resolved"
    ))
}

fn transition_error(deposit_id: &str, error: TransitionError<DepositStatus>) -> MarketError {
    match error {
        TransitionError::Conflict { current } => MarketError::invalid_state(format!(
            "deposit {deposit_id} changed to {current} concurrently"
        )),
        TransitionError::Store(RowStoreError::NotFound { .. }) => {
            MarketError::not_found("deposit", deposit_id)
        }
        TransitionError::Store(e) => e.into(),
    }
}
