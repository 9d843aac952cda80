//! The identity an operation runs on behalf of.
//!
//! There is no ambient session: [`crate::Portal::authenticate`] returns a
//! [`Caller`] and every operation that needs an identity takes one.

use portal_core::{
  account::{Account, Role},
  group::GroupName,
};

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
  pub account_id: i64,
  pub login:      String,
  pub role:       Role,
  pub group:      Option<GroupName>,
}

impl Caller {
  pub fn from_account(account: &Account) -> Self {
    Self {
      account_id: account.account_id,
      login:      account.login.clone(),
      role:       account.role,
      group:      account.group.clone(),
    }
  }

  /// The local operator running the `portal` admin binary.
  pub fn operator() -> Self {
    Self {
      account_id: 0,
      login:      "operator".into(),
      role:       Role::Admin,
      group:      None,
    }
  }

  pub fn is_admin(&self) -> bool { self.role == Role::Admin }

  pub fn is_staff(&self) -> bool { self.role.can_teach() }

  pub fn require_admin(&self, action: &str) -> Result<()> {
    if self.is_admin() {
      Ok(())
    } else {
      Err(Error::Forbidden(format!("{action} requires an administrator")))
    }
  }

  pub fn require_staff(&self, action: &str) -> Result<()> {
    if self.is_staff() {
      Ok(())
    } else {
      Err(Error::Forbidden(format!("{action} requires a teacher")))
    }
  }

  /// Students see only their own group; staff see every group.
  pub fn require_group_access(&self, group: &GroupName) -> Result<()> {
    if self.is_staff() || self.group.as_ref() == Some(group) {
      Ok(())
    } else {
      Err(Error::Forbidden(format!("no access to group {group}")))
    }
  }

  /// Students see only their own records; staff see everyone's.
  pub fn require_self_or_staff(&self, account_id: i64) -> Result<()> {
    if self.is_staff() || self.account_id == account_id {
      Ok(())
    } else {
      Err(Error::Forbidden(format!("no access to account {account_id}")))
    }
  }
}
