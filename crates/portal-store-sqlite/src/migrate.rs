//! One-way migration from the per-group table layout to the normalized store.
//!
//! Every roster member becomes a student account with no credential. Logins
//! already present in the target are skipped, so re-running the migration is
//! harmless.

use portal_core::{
  account::{NewAccount, Role},
  group::GroupName,
  store::{AccountStore, GroupDirectory, RosterStore},
};

use crate::{Error, PartitionedStore, Result, SqliteStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigratedMember {
  pub group:      GroupName,
  pub local_id:   i64,
  pub account_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedMember {
  pub group:    GroupName,
  pub local_id: i64,
  pub login:    String,
  pub reason:   String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
  pub groups:   usize,
  pub migrated: Vec<MigratedMember>,
  pub skipped:  Vec<SkippedMember>,
}

impl MigrationReport {
  /// The account created for a legacy `(group, local id)` pair.
  pub fn account_for(&self, group: &GroupName, local_id: i64) -> Option<i64> {
    self
      .migrated
      .iter()
      .find(|m| &m.group == group && m.local_id == local_id)
      .map(|m| m.account_id)
  }
}

/// Copy every group and member from `source` into `target`.
pub async fn migrate_partitioned(
  source: &PartitionedStore,
  target: &SqliteStore,
) -> Result<MigrationReport> {
  let mut report = MigrationReport::default();

  for group in source.list_groups().await? {
    target.create_group(group.name.clone()).await?;
    report.groups += 1;

    for member in source.list_members(&group.name).await? {
      let input = NewAccount {
        login:         member.login.clone(),
        password_hash: None,
        display_name:  member.display_name,
        role:          Role::Student,
        group:         Some(group.name.clone()),
        contact:       member.contact,
      };
      let skip = |reason: String| SkippedMember {
        group: group.name.clone(),
        local_id: member.member_id,
        login: member.login.clone(),
        reason,
      };

      match target.create_account(input).await {
        Ok(account) => report.migrated.push(MigratedMember {
          group:      group.name.clone(),
          local_id:   member.member_id,
          account_id: account.account_id,
        }),
        Err(e @ (Error::LoginTaken(_) | Error::EmailTaken(_))) => {
          report.skipped.push(skip(e.to_string()))
        }
        // Legacy rows predate login validation.
        Err(Error::Core(e)) => report.skipped.push(skip(e.to_string())),
        Err(e) => return Err(e),
      }
    }
  }

  tracing::info!(
    groups = report.groups,
    migrated = report.migrated.len(),
    skipped = report.skipped.len(),
    "roster migration finished"
  );
  Ok(report)
}
