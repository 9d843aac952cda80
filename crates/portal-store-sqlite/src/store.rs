//! [`SqliteStore`]: the normalized implementation of the portal store traits.
//!
//! The group directory, roster and account traits live here; the grade ledger
//! and study materials are in `ledger.rs`.

use std::path::Path;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension as _, params};

use portal_core::{
  account::{
    Account, Credential, NewAccount, ProfileUpdate, Role, normalize_display_name,
    normalize_login,
  },
  group::{Group, GroupName},
  roster::{Member, MemberFields, NewMember},
  store::{AccountStore, GroupDirectory, RosterStore},
};

use crate::{
  Error, Result, db,
  encode::{
    ACCOUNT_COLUMNS, GROUP_COLUMNS, RawAccount, RawGroup, encode_date, encode_dt,
    encode_role,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A portal store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Row helpers ─────────────────────────────────────────────────────────────

/// Insert the group unless it is already registered. Returns whether a row
/// was created.
pub(crate) fn ensure_group(
  conn: &Connection,
  name: &GroupName,
  now: &str,
) -> rusqlite::Result<bool> {
  let inserted = conn.execute(
    "INSERT INTO groups (name, created_at) VALUES (?1, ?2)
     ON CONFLICT (name) DO NOTHING",
    params![name.as_str(), now],
  )?;
  Ok(inserted > 0)
}

fn group_row(conn: &Connection, name: &GroupName) -> rusqlite::Result<RawGroup> {
  conn.query_row(
    &format!("SELECT {GROUP_COLUMNS} FROM groups WHERE name = ?1"),
    params![name.as_str()],
    RawGroup::from_row,
  )
}

pub(crate) fn account_row(
  conn: &Connection,
  account_id: i64,
) -> rusqlite::Result<Option<RawAccount>> {
  conn
    .query_row(
      &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE account_id = ?1"),
      params![account_id],
      RawAccount::from_row,
    )
    .optional()
}

/// Fails if `email` belongs to any account other than `owner`.
fn check_email_free(conn: &Connection, email: &str, owner: Option<i64>) -> Result<()> {
  let holder: Option<i64> = conn
    .query_row(
      "SELECT account_id FROM accounts WHERE email = ?1",
      params![email],
      |r| r.get(0),
    )
    .optional()?;
  match holder {
    Some(id) if Some(id) != owner => Err(Error::EmailTaken(email.to_owned())),
    _ => Ok(()),
  }
}

fn insert_account(conn: &Connection, input: &NewAccount, now: &str) -> Result<i64> {
  if db::exists(conn, "SELECT 1 FROM accounts WHERE login = ?1", &input.login)? {
    return Err(Error::LoginTaken(input.login.clone()));
  }
  if let Some(email) = &input.contact.email {
    check_email_free(conn, email, None)?;
  }
  if let Some(group) = &input.group {
    ensure_group(conn, group, now)?;
  }
  let c = &input.contact;
  conn.execute(
    "INSERT INTO accounts
       (login, password_hash, display_name, role, group_name, email, phone,
        city, date_of_birth, admission_year, created_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    params![
      input.login,
      input.password_hash,
      input.display_name,
      encode_role(input.role),
      input.group.as_ref().map(GroupName::as_str),
      c.email,
      c.phone,
      c.city,
      c.date_of_birth.map(encode_date),
      c.admission_year,
      now,
    ],
  )?;
  Ok(conn.last_insert_rowid())
}

// ─── GroupDirectory impl ─────────────────────────────────────────────────────

impl GroupDirectory for SqliteStore {
  type Error = Error;

  async fn group_exists<'a>(&'a self, name: &'a GroupName) -> Result<bool> {
    let name = name.clone();
    db::read(&self.conn, move |conn| {
      Ok(db::exists(conn, "SELECT 1 FROM groups WHERE name = ?1", name.as_str())?)
    })
    .await
  }

  async fn create_group(&self, name: GroupName) -> Result<Group> {
    let now = encode_dt(Utc::now());
    let (created, raw) = db::write(&self.conn, move |conn| {
      let created = ensure_group(conn, &name, &now)?;
      Ok((created, group_row(conn, &name)?))
    })
    .await?;
    let group = raw.into_group()?;
    if created {
      tracing::debug!(group = %group.name, "created group");
    }
    Ok(group)
  }

  async fn list_groups(&self) -> Result<Vec<Group>> {
    let rows = db::read(&self.conn, |conn| {
      let mut stmt = conn
        .prepare(&format!("SELECT {GROUP_COLUMNS} FROM groups ORDER BY name"))?;
      let rows = stmt
        .query_map([], RawGroup::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
      Ok(rows)
    })
    .await?;
    rows.into_iter().map(RawGroup::into_group).collect()
  }
}

// ─── RosterStore impl ────────────────────────────────────────────────────────
//
// The roster is a view over accounts: a member is an account with a group.

impl RosterStore for SqliteStore {
  async fn add_member(&self, group: GroupName, member: NewMember) -> Result<Member> {
    let member = member.validated()?;
    let account = self
      .create_account(NewAccount {
        login:         member.login,
        password_hash: None,
        display_name:  member.display_name,
        role:          Role::Student,
        group:         Some(group.clone()),
        contact:       member.contact,
      })
      .await?;
    Ok(Member {
      member_id: account.account_id,
      group,
      login: account.login,
      display_name: account.display_name,
      contact: account.contact,
    })
  }

  async fn list_members<'a>(&'a self, group: &'a GroupName) -> Result<Vec<Member>> {
    let name = group.as_str().to_owned();
    let rows = db::read(&self.conn, move |conn| {
      let mut stmt = conn.prepare(&format!(
        "SELECT {ACCOUNT_COLUMNS} FROM accounts
         WHERE group_name = ?1
         ORDER BY display_name, account_id"
      ))?;
      let rows = stmt
        .query_map(params![name], RawAccount::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
      Ok(rows)
    })
    .await?;

    let mut members = Vec::with_capacity(rows.len());
    for raw in rows {
      members.extend(raw.into_member()?);
    }
    Ok(members)
  }

  async fn find_member<'a>(
    &'a self,
    member_id: i64,
    hint: Option<&'a GroupName>,
  ) -> Result<Option<Member>> {
    let raw = db::read(&self.conn, move |conn| Ok(account_row(conn, member_id)?))
      .await?;
    let Some(member) = raw.map(RawAccount::into_member).transpose()?.flatten() else {
      return Ok(None);
    };
    match hint {
      Some(group) if *group != member.group => Ok(None),
      _ => Ok(Some(member)),
    }
  }

  async fn update_member(
    &self,
    member_id: i64,
    group: GroupName,
    fields: MemberFields,
  ) -> Result<Member> {
    let fields = fields.validated()?;
    let raw = db::write(&self.conn, move |conn| {
      let c = &fields.contact;
      if let Some(email) = &c.email {
        check_email_free(conn, email, Some(member_id))?;
      }
      let changed = conn.execute(
        "UPDATE accounts
         SET display_name = ?3, email = ?4, phone = ?5, city = ?6,
             date_of_birth = ?7, admission_year = ?8
         WHERE account_id = ?1 AND group_name = ?2",
        params![
          member_id,
          group.as_str(),
          fields.display_name,
          c.email,
          c.phone,
          c.city,
          c.date_of_birth.map(encode_date),
          c.admission_year,
        ],
      )?;
      if changed == 0 {
        return Err(Error::MemberNotFound(member_id));
      }
      account_row(conn, member_id)?.ok_or(Error::MemberNotFound(member_id))
    })
    .await?;
    raw.into_member()?.ok_or(Error::MemberNotFound(member_id))
  }
}

// ─── AccountStore impl ───────────────────────────────────────────────────────

impl AccountStore for SqliteStore {
  async fn create_account(&self, input: NewAccount) -> Result<Account> {
    let input = NewAccount {
      login: normalize_login(&input.login)?,
      display_name: normalize_display_name(&input.display_name)?,
      ..input
    };
    input.contact.validate()?;

    let now = encode_dt(Utc::now());
    let raw = db::write(&self.conn, move |conn| {
      let id = insert_account(conn, &input, &now)?;
      account_row(conn, id)?.ok_or(Error::AccountNotFound(id))
    })
    .await?;
    raw.into_account()
  }

  async fn get_account(&self, account_id: i64) -> Result<Option<Account>> {
    let raw = db::read(&self.conn, move |conn| Ok(account_row(conn, account_id)?))
      .await?;
    raw.map(RawAccount::into_account).transpose()
  }

  async fn find_credential<'a>(&'a self, login: &'a str) -> Result<Option<Credential>> {
    let login = login.trim().to_owned();
    let raw = db::read(&self.conn, move |conn| {
      Ok(
        conn
          .query_row(
            &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE login = ?1"),
            params![login],
            RawAccount::from_row,
          )
          .optional()?,
      )
    })
    .await?;
    raw.map(RawAccount::into_credential).transpose()
  }

  async fn update_profile(
    &self,
    account_id: i64,
    update: ProfileUpdate,
    password_hash: Option<String>,
  ) -> Result<Account> {
    let update = update.validated()?;
    let now = encode_dt(Utc::now());
    db::write(&self.conn, move |conn| {
      let mut account = account_row(conn, account_id)?
        .ok_or(Error::AccountNotFound(account_id))?
        .into_account()?;
      update.apply_to(&mut account);
      if let Some(email) = &update.email {
        check_email_free(conn, email, Some(account_id))?;
      }
      if let Some(group) = &account.group {
        ensure_group(conn, group, &now)?;
      }

      let c = &account.contact;
      conn.execute(
        "UPDATE accounts
         SET display_name = ?2, group_name = ?3, email = ?4, phone = ?5,
             city = ?6, date_of_birth = ?7, admission_year = ?8
         WHERE account_id = ?1",
        params![
          account_id,
          account.display_name,
          account.group.as_ref().map(GroupName::as_str),
          c.email,
          c.phone,
          c.city,
          c.date_of_birth.map(encode_date),
          c.admission_year,
        ],
      )?;
      if let Some(hash) = &password_hash {
        conn.execute(
          "UPDATE accounts SET password_hash = ?2 WHERE account_id = ?1",
          params![account_id, hash],
        )?;
      }
      Ok(account)
    })
    .await
  }

  async fn set_credential(&self, account_id: i64, password_hash: String) -> Result<()> {
    db::write(&self.conn, move |conn| {
      let changed = conn.execute(
        "UPDATE accounts SET password_hash = ?2 WHERE account_id = ?1",
        params![account_id, password_hash],
      )?;
      if changed == 0 {
        return Err(Error::AccountNotFound(account_id));
      }
      Ok(())
    })
    .await
  }
}
