// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Admin dashboard counters.

use std::collections::BTreeMap;

use serde::Serialize;
use utoipa::ToSchema;

use super::{Backends, MarketResult};
use crate::auth::AuthenticatedUser;
use crate::storage::{
    ensure_admin, AccountRepository, CatalogRepository, DepositRepository, DepositStatus,
    FeatureRequestRepository, PurchaseRepository, RequestStatus,
};

/// Marketplace totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct MarketStats {
    pub catalog_items: usize,
    pub accounts: usize,
    /// Sum of all account balances.
    pub coins_outstanding: u64,
    pub purchases: usize,
    /// Deposit count per status, every status present.
    pub deposits: BTreeMap<String, usize>,
    /// Feature request count per status, every status present.
    pub feature_requests: BTreeMap<String, usize>,
}

pub struct StatsService<'a> {
    backends: Backends<'a>,
}

impl<'a> StatsService<'a> {
    pub fn new(backends: Backends<'a>) -> Self {
        Self { backends }
    }

    pub fn stats(&self, caller: &AuthenticatedUser) -> MarketResult<MarketStats> {
        ensure_admin(caller, "reading marketplace stats")?;
        let rows = self.backends.rows;

        let accounts = AccountRepository::new(rows).list_all()?;
        let coins_outstanding = accounts
            .iter()
            .fold(0u64, |total, account| total.saturating_add(account.balance));

        let mut deposits: BTreeMap<String, usize> = DepositStatus::ALL
            .iter()
            .map(|status| (status.as_str().to_string(), 0))
            .collect();
        for deposit in DepositRepository::new(rows).list_all(None)? {
            *deposits.entry(deposit.status.as_str().to_string()).or_default() += 1;
        }

        let mut feature_requests: BTreeMap<String, usize> = RequestStatus::ALL
            .iter()
            .map(|status| (status.as_str().to_string(), 0))
            .collect();
        for request in FeatureRequestRepository::new(rows).list_all()? {
            *feature_requests
                .entry(request.status.as_str().to_string())
                .or_default() += 1;
        }

        Ok(MarketStats {
            catalog_items: CatalogRepository::new(rows).list()?.len(),
            accounts: accounts.len(),
            coins_outstanding,
            purchases: PurchaseRepository::new(rows).list_all()?.len(),
            deposits,
            feature_requests,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{admin, png, user, Fixture};
    use crate::services::{
        Decision, DepositDraft, LedgerService, MarketError, NewRequest, RequestTracker,
    };
    use crate::storage::PaymentMethod;

    #[test]
    fn counts_reflect_activity() {
        let fx = Fixture::new();
        let ledger = LedgerService::new(fx.backends());

        for (account, amount) in [("user_1", 500), ("user_2", 70)] {
            let deposit = ledger
                .submit_deposit(
                    &user(account),
                    DepositDraft {
                        account_id: account.to_string(),
                        amount,
                        method: PaymentMethod::Upi,
                        transaction_ref: format!("UPI-{account}"),
                        screenshot: Some(png()),
                    },
                )
                .unwrap();
            ledger
                .resolve_deposit(&admin(), &deposit.id, Decision::Approved)
                .unwrap();
        }
        ledger
            .submit_deposit(
                &user("user_1"),
                DepositDraft {
                    account_id: "user_1".to_string(),
                    amount: 10,
                    method: PaymentMethod::Upi,
                    transaction_ref: "UPI-late".to_string(),
                    screenshot: Some(png()),
                },
            )
            .unwrap();
        RequestTracker::new(fx.backends())
            .create(
                &user("user_2"),
                NewRequest {
                    requester_name: "Kai".to_string(),
                    requester_email: "kai@example.org".to_string(),
                    target_name: "Dynmap".to_string(),
                    platform: "paper".to_string(),
                    supported_versions: vec!["1.21".to_string()],
                    category: "maps".to_string(),
                    description: "Update for 1.21".to_string(),
                },
            )
            .unwrap();

        let stats = StatsService::new(fx.backends()).stats(&admin()).unwrap();
        assert_eq!(stats.accounts, 2);
        assert_eq!(stats.coins_outstanding, 570);
        assert_eq!(stats.catalog_items, 0);
        assert_eq!(stats.purchases, 0);
        assert_eq!(stats.deposits["approved"], 2);
        assert_eq!(stats.deposits["pending"], 1);
        assert_eq!(stats.deposits["crediting"], 0);
        assert_eq!(stats.feature_requests["pending"], 1);
        assert_eq!(stats.feature_requests["completed"], 0);
    }

    #[test]
    fn stats_are_admin_only() {
        let fx = Fixture::new();
        assert!(matches!(
            StatsService::new(fx.backends()).stats(&user("user_1")),
            Err(MarketError::Authorization(_))
        ));
    }
}
