//! Groups: the cohort identifiers that partition students and offerings.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Longest accepted group name, in characters.
pub const MAX_GROUP_NAME_LEN: usize = 50;

/// A validated group identifier.
///
/// Group names are untrusted input. Validation only rejects names that can
/// never be meaningful (empty, too long, control characters); it does **not**
/// make a name safe to splice into SQL. Backends that derive storage-object
/// names from a group must go through their own allow-list.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GroupName(String);

impl GroupName {
  pub fn parse(raw: &str) -> Result<Self> {
    let name = raw.trim();
    if name.is_empty() {
      return Err(Error::InvalidGroupName("must not be empty".into()));
    }
    if name.chars().count() > MAX_GROUP_NAME_LEN {
      return Err(Error::InvalidGroupName(format!(
        "longer than {MAX_GROUP_NAME_LEN} characters"
      )));
    }
    if name.chars().any(char::is_control) {
      return Err(Error::InvalidGroupName(
        "contains control characters".into(),
      ));
    }
    Ok(Self(name.to_owned()))
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl TryFrom<String> for GroupName {
  type Error = Error;

  fn try_from(value: String) -> Result<Self> { Self::parse(&value) }
}

impl From<GroupName> for String {
  fn from(value: GroupName) -> Self { value.0 }
}

impl fmt::Display for GroupName {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// A registered group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
  pub name:       GroupName,
  pub created_at: DateTime<Utc>,
}
