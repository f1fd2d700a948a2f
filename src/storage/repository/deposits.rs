// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Deposit repository.
//!
//! ## Lifecycle
//!
//! ```text
//! pending ──approve──► crediting ──credited──► approved
//!    │                    │
//!    │                    └──credit failed──► pending
//!    └──reject──► rejected
//! ```
//!
//! `crediting` means the deposit was approved but the coins may not have
//! reached the account yet. It is a visible state so stalled approvals can
//! be found and reconciled.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{Record, Rows, TransitionError};
use crate::storage::row_store::{RowStore, RowStoreResult, Table};

/// Payment rails accepted for deposits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Easypaisa,
    JazzCash,
    Upi,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 3] = [
        PaymentMethod::Easypaisa,
        PaymentMethod::JazzCash,
        PaymentMethod::Upi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Easypaisa => "easypaisa",
            PaymentMethod::JazzCash => "jazzcash",
            PaymentMethod::Upi => "upi",
        }
    }

    /// Human-readable name shown on the deposit form.
    pub fn display_name(&self) -> &'static str {
        match self {
            PaymentMethod::Easypaisa => "Easypaisa",
            PaymentMethod::JazzCash => "JazzCash",
            PaymentMethod::Upi => "UPI",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['_', '-', ' '], "");
        PaymentMethod::ALL
            .into_iter()
            .find(|m| m.as_str() == normalized)
            .ok_or_else(|| format!("unknown payment method: {s}"))
    }
}

/// Deposit review status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DepositStatus {
    Pending,
    /// Approved; credit to the account in progress or stalled.
    Crediting,
    Approved,
    Rejected,
}

impl DepositStatus {
    pub const ALL: [DepositStatus; 4] = [
        DepositStatus::Pending,
        DepositStatus::Crediting,
        DepositStatus::Approved,
        DepositStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DepositStatus::Pending => "pending",
            DepositStatus::Crediting => "crediting",
            DepositStatus::Approved => "approved",
            DepositStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for DepositStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DepositStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DepositStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown deposit status: {s}"))
    }
}

/// A user's claim of an external payment, pending admin review.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Deposit {
    pub id: String,
    pub account_id: String,
    /// Coins requested.
    pub amount: u64,
    pub method: PaymentMethod,
    /// Transaction id reported by the payer.
    pub transaction_ref: String,
    /// Blob name in the `payment-screenshots` bucket.
    pub screenshot: String,
    pub status: DepositStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Admin who approved or rejected the deposit.
    #[serde(default)]
    pub resolved_by: Option<String>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Record for Deposit {
    const TABLE: Table = Table::Deposits;

    fn id(&self) -> &str {
        &self.id
    }
}

impl crate::storage::OwnedResource for Deposit {
    fn owner_account_id(&self) -> &str {
        &self.account_id
    }
}

/// Repository for deposit rows.
pub struct DepositRepository<'a> {
    rows: Rows<'a>,
}

impl<'a> DepositRepository<'a> {
    pub fn new(store: &'a dyn RowStore) -> Self {
        Self {
            rows: Rows::new(store),
        }
    }

    pub fn get(&self, deposit_id: &str) -> RowStoreResult<Option<Deposit>> {
        self.rows.get(deposit_id)
    }

    pub fn create(&self, deposit: &Deposit) -> RowStoreResult<()> {
        self.rows.insert(deposit)
    }

    /// All deposits, newest first, optionally filtered by status.
    pub fn list_all(&self, status: Option<DepositStatus>) -> RowStoreResult<Vec<Deposit>> {
        let mut deposits: Vec<Deposit> = self
            .rows
            .list::<Deposit>()?
            .into_iter()
            .filter(|d| status.is_none_or(|s| d.status == s))
            .collect();
        deposits.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(deposits)
    }

    /// Deposits of one account, newest first.
    pub fn list_by_account(
        &self,
        account_id: &str,
        status: Option<DepositStatus>,
    ) -> RowStoreResult<Vec<Deposit>> {
        let mut deposits = self.list_all(status)?;
        deposits.retain(|d| d.account_id == account_id);
        Ok(deposits)
    }

    /// Move a deposit from `from` to `to` if it is still in `from`.
    ///
    /// Moving back to `pending` clears the resolution fields; any other
    /// target records `actor` as the resolver.
    pub fn transition(
        &self,
        deposit_id: &str,
        from: DepositStatus,
        to: DepositStatus,
        actor: &str,
    ) -> Result<Deposit, TransitionError<DepositStatus>> {
        self.rows.modify(deposit_id, |deposit: &Deposit| {
            if deposit.status != from {
                return Err(TransitionError::Conflict {
                    current: deposit.status,
                });
            }
            let now = Utc::now();
            let mut next = deposit.clone();
            next.status = to;
            next.updated_at = now;
            if to == DepositStatus::Pending {
                next.resolved_by = None;
                next.resolved_at = None;
            } else {
                next.resolved_by = Some(actor.to_string());
                next.resolved_at = Some(now);
            }
            Ok(Some(next))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::repository::testing::MemoryStore;

    fn deposit(id: &str, account: &str) -> Deposit {
        let now = Utc::now();
        Deposit {
            id: id.to_string(),
            account_id: account.to_string(),
            amount: 500,
            method: PaymentMethod::Easypaisa,
            transaction_ref: "TX1".to_string(),
            screenshot: format!("{account}/proof.png"),
            status: DepositStatus::Pending,
            created_at: now,
            updated_at: now,
            resolved_by: None,
            resolved_at: None,
        }
    }

    #[test]
    fn payment_method_parsing_is_lenient() {
        assert_eq!("EasyPaisa".parse::<PaymentMethod>().unwrap(), PaymentMethod::Easypaisa);
        assert_eq!("jazz_cash".parse::<PaymentMethod>().unwrap(), PaymentMethod::JazzCash);
        assert_eq!(" UPI ".parse::<PaymentMethod>().unwrap(), PaymentMethod::Upi);
        assert!("paypal".parse::<PaymentMethod>().is_err());
        assert_eq!(
            serde_json::to_value(PaymentMethod::JazzCash).unwrap(),
            serde_json::json!("jazzcash")
        );
    }

    #[test]
    fn transition_requires_expected_status() {
        let store = MemoryStore::default();
        let repo = DepositRepository::new(&store);
        repo.create(&deposit("dep_1", "user_1")).unwrap();

        let crediting = repo
            .transition("dep_1", DepositStatus::Pending, DepositStatus::Crediting, "admin_1")
            .unwrap();
        assert_eq!(crediting.status, DepositStatus::Crediting);
        assert_eq!(crediting.resolved_by.as_deref(), Some("admin_1"));

        let err = repo
            .transition("dep_1", DepositStatus::Pending, DepositStatus::Rejected, "admin_2")
            .unwrap_err();
        assert!(matches!(
            err,
            TransitionError::Conflict {
                current: DepositStatus::Crediting
            }
        ));

        let reverted = repo
            .transition("dep_1", DepositStatus::Crediting, DepositStatus::Pending, "admin_1")
            .unwrap();
        assert_eq!(reverted.status, DepositStatus::Pending);
        assert!(reverted.resolved_by.is_none());
    }

    #[test]
    fn listing_filters_by_owner_and_status() {
        let store = MemoryStore::default();
        let repo = DepositRepository::new(&store);
        repo.create(&deposit("dep_1", "user_1")).unwrap();
        repo.create(&deposit("dep_2", "user_2")).unwrap();
        repo.create(&deposit("dep_3", "user_1")).unwrap();
        repo.transition("dep_3", DepositStatus::Pending, DepositStatus::Rejected, "admin")
            .unwrap();

        assert_eq!(repo.list_all(None).unwrap().len(), 3);
        assert_eq!(repo.list_by_account("user_1", None).unwrap().len(), 2);
        let pending = repo
            .list_by_account("user_1", Some(DepositStatus::Pending))
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "dep_1");
    }
}
