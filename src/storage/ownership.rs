// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ownership and role checks applied by the services before they touch a
//! row on a caller's behalf.

use crate::auth::{AuthenticatedUser, Role};

/// Access check failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("user {user_id} does not own this {resource}")]
    NotOwner { user_id: String, resource: String },

    #[error("user {user_id} may not act for account {account_id}")]
    NotSelf { user_id: String, account_id: String },

    #[error("{operation} requires the admin role")]
    AdminRequired { operation: String },
}

/// Records that belong to one account.
pub trait OwnedResource {
    /// Account id of the owner.
    fn owner_account_id(&self) -> &str;
}

/// Ownership verification, blanket-implemented for every [`OwnedResource`].
pub trait OwnershipEnforcer {
    /// Pass if `user` owns the record; admins do not bypass this check.
    fn verify_ownership(&self, user: &AuthenticatedUser, resource: &str) -> Result<(), AccessError>;

    /// Pass if `user` owns the record or is an admin.
    fn verify_visible_to(&self, user: &AuthenticatedUser, resource: &str) -> Result<(), AccessError> {
        if user.is_admin() {
            return Ok(());
        }
        self.verify_ownership(user, resource)
    }
}

impl<T: OwnedResource> OwnershipEnforcer for T {
    fn verify_ownership(&self, user: &AuthenticatedUser, resource: &str) -> Result<(), AccessError> {
        if self.owner_account_id() == user.user_id {
            Ok(())
        } else {
            Err(AccessError::NotOwner {
                user_id: user.user_id.clone(),
                resource: resource.to_string(),
            })
        }
    }
}

/// Require that the caller acts for their own account.
pub fn ensure_self(user: &AuthenticatedUser, account_id: &str) -> Result<(), AccessError> {
    if user.user_id == account_id {
        Ok(())
    } else {
        Err(AccessError::NotSelf {
            user_id: user.user_id.clone(),
            account_id: account_id.to_string(),
        })
    }
}

/// Require the admin role for `operation`.
pub fn ensure_admin(user: &AuthenticatedUser, operation: &str) -> Result<(), AccessError> {
    if user.role == Role::Admin {
        Ok(())
    } else {
        Err(AccessError::AdminRequired {
            operation: operation.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ticket {
        owner: String,
    }

    impl OwnedResource for Ticket {
        fn owner_account_id(&self) -> &str {
            &self.owner
        }
    }

    fn ticket(owner: &str) -> Ticket {
        Ticket {
            owner: owner.to_string(),
        }
    }

    #[test]
    fn owner_passes_and_stranger_fails() {
        let user = AuthenticatedUser::new("user_1", Role::User);
        assert!(ticket("user_1").verify_ownership(&user, "ticket").is_ok());

        let err = ticket("user_2").verify_ownership(&user, "ticket").unwrap_err();
        assert!(matches!(err, AccessError::NotOwner { .. }));
    }

    #[test]
    fn admins_see_but_do_not_own() {
        let admin = AuthenticatedUser::new("admin_1", Role::Admin);
        assert!(ticket("user_1").verify_visible_to(&admin, "ticket").is_ok());
        assert!(ticket("user_1").verify_ownership(&admin, "ticket").is_err());
    }

    #[test]
    fn self_and_admin_checks() {
        let user = AuthenticatedUser::new("user_1", Role::User);
        let admin = AuthenticatedUser::new("admin_1", Role::Admin);

        assert!(ensure_self(&user, "user_1").is_ok());
        assert!(matches!(
            ensure_self(&user, "user_2"),
            Err(AccessError::NotSelf { .. })
        ));
        assert!(ensure_admin(&admin, "approve deposit").is_ok());
        assert_eq!(
            ensure_admin(&user, "approve deposit").unwrap_err().to_string(),
            "approve deposit requires the admin role"
        );
    }
}
