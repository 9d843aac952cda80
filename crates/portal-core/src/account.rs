//! Accounts: global identities with credentials and profile attributes.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, group::GroupName};

pub const MIN_LOGIN_LEN: usize = 3;
pub const MAX_LOGIN_LEN: usize = 100;
pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_DISPLAY_NAME_LEN: usize = 100;

// ─── Role ────────────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  #[default]
  Student,
  Teacher,
  Admin,
}

impl Role {
  /// Whether accounts with this role may be assigned to teach an offering.
  pub fn can_teach(self) -> bool { matches!(self, Self::Teacher | Self::Admin) }
}

// ─── Contact attributes ──────────────────────────────────────────────────────

/// Optional profile attributes shared by accounts and roster members.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
  pub email:          Option<String>,
  pub phone:          Option<String>,
  pub city:           Option<String>,
  pub date_of_birth:  Option<NaiveDate>,
  pub admission_year: Option<i32>,
}

impl ContactInfo {
  /// Check every supplied attribute. Absent attributes are always valid.
  pub fn validate(&self) -> Result<()> {
    if let Some(email) = &self.email {
      validate_email(email)?;
    }
    if let Some(phone) = &self.phone {
      validate_phone(phone)?;
    }
    if let Some(year) = self.admission_year {
      validate_admission_year(year)?;
    }
    Ok(())
  }
}

// ─── Field validators ────────────────────────────────────────────────────────

/// Trim and check a login name.
pub fn normalize_login(raw: &str) -> Result<String> {
  let login = raw.trim();
  let len = login.chars().count();
  if !(MIN_LOGIN_LEN..=MAX_LOGIN_LEN).contains(&len) {
    return Err(Error::InvalidLogin(format!(
      "must be {MIN_LOGIN_LEN}..={MAX_LOGIN_LEN} characters"
    )));
  }
  if login.chars().any(|c| c.is_whitespace() || c.is_control()) {
    return Err(Error::InvalidLogin("must not contain whitespace".into()));
  }
  Ok(login.to_owned())
}

pub fn validate_password(plaintext: &str) -> Result<()> {
  if plaintext.chars().count() < MIN_PASSWORD_LEN {
    return Err(Error::PasswordTooShort { min: MIN_PASSWORD_LEN });
  }
  Ok(())
}

/// Trim and check a display name.
pub fn normalize_display_name(raw: &str) -> Result<String> {
  let name = raw.trim();
  if name.is_empty() {
    return Err(Error::InvalidDisplayName("must not be empty".into()));
  }
  if name.chars().count() > MAX_DISPLAY_NAME_LEN {
    return Err(Error::InvalidDisplayName(format!(
      "longer than {MAX_DISPLAY_NAME_LEN} characters"
    )));
  }
  Ok(name.to_owned())
}

pub fn validate_email(email: &str) -> Result<()> {
  let invalid = || Error::InvalidEmail(email.to_owned());
  if email.chars().any(char::is_whitespace) {
    return Err(invalid());
  }
  let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
  if local.is_empty() || domain.contains('@') {
    return Err(invalid());
  }
  let dotted = domain
    .split('.')
    .collect::<Vec<_>>();
  if dotted.len() < 2 || dotted.iter().any(|label| label.is_empty()) {
    return Err(invalid());
  }
  Ok(())
}

/// Accepts `^\+?1?\d{9,15}$`.
pub fn validate_phone(phone: &str) -> Result<()> {
  let digits = phone.strip_prefix('+').unwrap_or(phone);
  let len = digits.len();
  let all_digits = !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit());
  let ok = all_digits
    && ((9..=15).contains(&len) || (len == 16 && digits.starts_with('1')));
  if ok { Ok(()) } else { Err(Error::InvalidPhone(phone.to_owned())) }
}

pub fn validate_admission_year(year: i32) -> Result<()> {
  if (1900..=2100).contains(&year) {
    Ok(())
  } else {
    Err(Error::InvalidAdmissionYear(year))
  }
}

// ─── Account ─────────────────────────────────────────────────────────────────

/// A persisted account. The credential hash is never part of this type; see
/// [`crate::store::AccountStore::find_credential`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
  pub account_id:   i64,
  pub login:        String,
  pub display_name: String,
  pub role:         Role,
  pub group:        Option<GroupName>,
  pub contact:      ContactInfo,
  pub created_at:   DateTime<Utc>,
}

/// Input to [`crate::store::AccountStore::create_account`].
///
/// `password_hash` is already hashed; the store never sees plaintext.
#[derive(Debug, Clone)]
pub struct NewAccount {
  pub login:         String,
  pub password_hash: Option<String>,
  pub display_name:  String,
  pub role:          Role,
  pub group:         Option<GroupName>,
  pub contact:       ContactInfo,
}

impl NewAccount {
  /// A student account with no contact attributes.
  pub fn student(
    login: impl Into<String>,
    password_hash: Option<String>,
    display_name: impl Into<String>,
    group: GroupName,
  ) -> Self {
    Self {
      login: login.into(),
      password_hash,
      display_name: display_name.into(),
      role: Role::Student,
      group: Some(group),
      contact: ContactInfo::default(),
    }
  }
}

/// An account together with its stored credential hash. Only returned by
/// [`crate::store::AccountStore::find_credential`]; never serialised.
#[derive(Debug, Clone)]
pub struct Credential {
  pub account:       Account,
  /// `None` for roster members added by staff; they cannot log in.
  pub password_hash: Option<String>,
}

// ─── Partial update ──────────────────────────────────────────────────────────

/// A partial profile update. Every `None` field means "leave unchanged";
/// there is no way to clear a field through this type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
  pub display_name:   Option<String>,
  pub group:          Option<GroupName>,
  pub email:          Option<String>,
  pub phone:          Option<String>,
  pub city:           Option<String>,
  pub date_of_birth:  Option<NaiveDate>,
  pub admission_year: Option<i32>,
}

impl ProfileUpdate {
  pub fn is_empty(&self) -> bool { *self == Self::default() }

  /// Normalise and validate every supplied field.
  pub fn validated(mut self) -> Result<Self> {
    if let Some(name) = &self.display_name {
      self.display_name = Some(normalize_display_name(name)?);
    }
    ContactInfo {
      email:          self.email.clone(),
      phone:          self.phone.clone(),
      city:           None,
      date_of_birth:  None,
      admission_year: self.admission_year,
    }
    .validate()?;
    Ok(self)
  }

  /// Apply the supplied fields on top of `account`.
  pub fn apply_to(&self, account: &mut Account) {
    if let Some(v) = &self.display_name {
      account.display_name = v.clone();
    }
    if let Some(v) = &self.group {
      account.group = Some(v.clone());
    }
    let c = &mut account.contact;
    if let Some(v) = &self.email {
      c.email = Some(v.clone());
    }
    if let Some(v) = &self.phone {
      c.phone = Some(v.clone());
    }
    if let Some(v) = &self.city {
      c.city = Some(v.clone());
    }
    if let Some(v) = self.date_of_birth {
      c.date_of_birth = Some(v);
    }
    if let Some(v) = self.admission_year {
      c.admission_year = Some(v);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn login_bounds() {
    assert!(normalize_login("ab").is_err());
    assert_eq!(normalize_login("  abc ").unwrap(), "abc");
    assert!(normalize_login("has space").is_err());
    assert!(normalize_login(&"a".repeat(MAX_LOGIN_LEN + 1)).is_err());
  }

  #[test]
  fn password_minimum() {
    assert!(matches!(
      validate_password("12345"),
      Err(Error::PasswordTooShort { min: 6 })
    ));
    assert!(validate_password("123456").is_ok());
  }

  #[test]
  fn phone_pattern() {
    for ok in ["+79991234567", "123456789", "1234567890123456", "+1123456789"] {
      assert!(validate_phone(ok).is_ok(), "{ok}");
    }
    for bad in ["12345678", "+", "", "12-34-56-78-90", "2234567890123456", "++123456789"] {
      assert!(validate_phone(bad).is_err(), "{bad}");
    }
  }

  #[test]
  fn email_shape() {
    assert!(validate_email("alice@example.com").is_ok());
    for bad in ["alice", "@example.com", "a@b", "a@@b.com", "a b@c.com", "a@b..com"] {
      assert!(validate_email(bad).is_err(), "{bad}");
    }
  }

  #[test]
  fn profile_update_applies_only_supplied_fields() {
    let mut account = Account {
      account_id:   1,
      login:        "alice".into(),
      display_name: "Alice".into(),
      role:         Role::Student,
      group:        Some(GroupName::parse("CS-101").unwrap()),
      contact:      ContactInfo {
        email: Some("alice@example.com".into()),
        phone: Some("+79991234567".into()),
        city:  Some("Omsk".into()),
        ..Default::default()
      },
      created_at:   Utc::now(),
    };
    let before = account.clone();

    let update = ProfileUpdate { city: Some("X".into()), ..Default::default() };
    update.apply_to(&mut account);

    assert_eq!(account.contact.city.as_deref(), Some("X"));
    assert_eq!(account.contact.email, before.contact.email);
    assert_eq!(account.contact.phone, before.contact.phone);
    assert_eq!(account.display_name, before.display_name);
    assert_eq!(account.group, before.group);
  }

  #[test]
  fn profile_update_validation_rejects_bad_phone() {
    let update = ProfileUpdate { phone: Some("nope".into()), ..Default::default() };
    assert!(matches!(update.validated(), Err(Error::InvalidPhone(_))));
  }
}
