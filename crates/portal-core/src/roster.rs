//! Roster entries: the student records belonging to one group.

use serde::{Deserialize, Serialize};

use crate::{
  Result,
  account::{ContactInfo, normalize_display_name, normalize_login},
  group::GroupName,
};

/// One member of a group's roster.
///
/// How unique `member_id` is depends on the backend: the normalized store
/// uses the global account id, the partitioned store a per-group counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
  pub member_id:    i64,
  pub group:        GroupName,
  pub login:        String,
  pub display_name: String,
  pub contact:      ContactInfo,
}

/// Input to [`crate::store::RosterStore::add_member`].
#[derive(Debug, Clone)]
pub struct NewMember {
  pub login:        String,
  pub display_name: String,
  pub contact:      ContactInfo,
}

impl NewMember {
  pub fn new(login: impl Into<String>, display_name: impl Into<String>) -> Self {
    Self {
      login:        login.into(),
      display_name: display_name.into(),
      contact:      ContactInfo::default(),
    }
  }

  /// Normalise and validate every field.
  pub fn validated(self) -> Result<Self> {
    self.contact.validate()?;
    Ok(Self {
      login:        normalize_login(&self.login)?,
      display_name: normalize_display_name(&self.display_name)?,
      contact:      self.contact,
    })
  }
}

/// Full replacement for a member's mutable fields. Unlike
/// [`crate::account::ProfileUpdate`], absent contact attributes are cleared.
#[derive(Debug, Clone)]
pub struct MemberFields {
  pub display_name: String,
  pub contact:      ContactInfo,
}

impl MemberFields {
  pub fn validated(self) -> Result<Self> {
    self.contact.validate()?;
    Ok(Self {
      display_name: normalize_display_name(&self.display_name)?,
      contact:      self.contact,
    })
  }
}
