//! [`PartitionedStore`]: rosters kept in one table per group.
//!
//! The `groups_list` directory maps each group to its roster table. Table
//! names are derived from the group name by [`roster_table_name`], which
//! produces only `[a-z0-9_]` and is reversible, so distinct groups never share
//! a table and no caller-supplied text reaches SQL. Names read back from the
//! directory are re-checked with [`is_roster_table_name`] before use.
//!
//! Lookups without a group hint scan every roster table, so they cost one
//! query per group.

use std::path::Path;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension as _, params};

use portal_core::{
  group::{Group, GroupName},
  roster::{Member, MemberFields, NewMember},
  store::{GroupDirectory, RosterStore},
};

use crate::{
  Error, Result, db,
  encode::{MEMBER_COLUMNS, RawGroup, RawMember, encode_date, encode_dt},
  schema::{DIRECTORY_SCHEMA, ROSTER_ADDED_COLUMNS, roster_table_ddl},
};

pub const TABLE_PREFIX: &str = "group_";

// ─── Table naming ────────────────────────────────────────────────────────────

/// Derive the roster table name for `group`.
///
/// Lowercase ASCII letters and digits pass through; every other byte
/// (including `_` and uppercase letters) becomes `_` followed by two lowercase
/// hex digits. The mapping is injective.
pub fn roster_table_name(group: &GroupName) -> String {
  let mut out = String::from(TABLE_PREFIX);
  for b in group.as_str().bytes() {
    match b {
      b'a'..=b'z' | b'0'..=b'9' => out.push(char::from(b)),
      _ => {
        out.push('_');
        out.push_str(&hex::encode([b]));
      }
    }
  }
  out
}

/// Whether `name` has the shape [`roster_table_name`] produces.
pub fn is_roster_table_name(name: &str) -> bool {
  name.strip_prefix(TABLE_PREFIX).is_some_and(|rest| {
    !rest.is_empty()
      && rest
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
  })
}

fn checked(table: String) -> Result<String> {
  if is_roster_table_name(&table) {
    Ok(table)
  } else {
    Err(Error::UnsafeTableName(table))
  }
}

// ─── Row helpers ─────────────────────────────────────────────────────────────

fn lookup_table(conn: &Connection, group: &GroupName) -> Result<Option<String>> {
  let table: Option<String> = conn
    .query_row(
      "SELECT table_name FROM groups_list WHERE group_name = ?1",
      params![group.as_str()],
      |r| r.get(0),
    )
    .optional()?;
  table.map(checked).transpose()
}

/// Register `group` and create its roster table if either is missing.
fn provision(conn: &Connection, group: &GroupName, now: &str) -> Result<(bool, String)> {
  if let Some(table) = lookup_table(conn, group)? {
    conn.execute(&roster_table_ddl(&table), [])?;
    return Ok((false, table));
  }
  let table = roster_table_name(group);
  conn.execute(
    "INSERT INTO groups_list (group_name, table_name, created_at)
     VALUES (?1, ?2, ?3)",
    params![group.as_str(), table, now],
  )?;
  conn.execute(&roster_table_ddl(&table), [])?;
  Ok((true, table))
}

fn member_row(
  conn: &Connection,
  table: &str,
  member_id: i64,
) -> rusqlite::Result<Option<RawMember>> {
  conn
    .query_row(
      &format!("SELECT {MEMBER_COLUMNS} FROM \"{table}\" WHERE member_id = ?1"),
      params![member_id],
      RawMember::from_row,
    )
    .optional()
}

fn column_names(conn: &Connection, table: &str) -> rusqlite::Result<Vec<String>> {
  let mut stmt = conn.prepare(&format!("PRAGMA table_info(\"{table}\")"))?;
  let names = stmt
    .query_map([], |r| r.get::<_, String>(1))?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(names)
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A roster store that provisions one table per group.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct PartitionedStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl PartitionedStore {
  /// Open (or create) a store at `path`, then bring every existing roster
  /// table up to the current column set.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn).await
  }

  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn).await
  }

  async fn init(conn: tokio_rusqlite::Connection) -> Result<Self> {
    conn
      .call(|conn| {
        conn.execute_batch(DIRECTORY_SCHEMA)?;
        Ok(())
      })
      .await?;
    let store = Self { conn };
    store.upgrade_roster_tables().await?;
    Ok(store)
  }

  /// Add any missing columns to every registered roster table and create
  /// tables whose directory row exists without one. Returns the number of
  /// columns added.
  pub async fn upgrade_roster_tables(&self) -> Result<usize> {
    let added = db::write(&self.conn, |conn| {
      let tables = {
        let mut stmt = conn.prepare("SELECT table_name FROM groups_list")?;
        stmt
          .query_map([], |r| r.get::<_, String>(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?
      };

      let mut added = 0;
      for table in tables {
        let table = checked(table)?;
        conn.execute(&roster_table_ddl(&table), [])?;
        let present = column_names(conn, &table)?;
        for (column, ty) in ROSTER_ADDED_COLUMNS {
          if !present.iter().any(|c| c == column) {
            conn.execute(
              &format!("ALTER TABLE \"{table}\" ADD COLUMN {column} {ty}"),
              [],
            )?;
            added += 1;
          }
        }
      }
      Ok(added)
    })
    .await?;

    if added > 0 {
      tracing::info!(columns = added, "upgraded roster tables");
    }
    Ok(added)
  }
}

// ─── GroupDirectory impl ─────────────────────────────────────────────────────

impl GroupDirectory for PartitionedStore {
  type Error = Error;

  async fn group_exists<'a>(&'a self, name: &'a GroupName) -> Result<bool> {
    let name = name.clone();
    db::read(&self.conn, move |conn| Ok(lookup_table(conn, &name)?.is_some())).await
  }

  async fn create_group(&self, name: GroupName) -> Result<Group> {
    let now = encode_dt(Utc::now());
    let (created, raw) = db::write(&self.conn, move |conn| {
      let (created, _) = provision(conn, &name, &now)?;
      let raw = conn.query_row(
        "SELECT group_name, created_at FROM groups_list WHERE group_name = ?1",
        params![name.as_str()],
        RawGroup::from_row,
      )?;
      Ok((created, raw))
    })
    .await?;
    let group = raw.into_group()?;
    if created {
      tracing::debug!(group = %group.name, "provisioned roster table");
    }
    Ok(group)
  }

  async fn list_groups(&self) -> Result<Vec<Group>> {
    let rows = db::read(&self.conn, |conn| {
      let mut stmt = conn.prepare(
        "SELECT group_name, created_at FROM groups_list ORDER BY group_name",
      )?;
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

impl RosterStore for PartitionedStore {
  async fn add_member(&self, group: GroupName, member: NewMember) -> Result<Member> {
    let member = member.validated()?;
    let now = encode_dt(Utc::now());
    let (group, raw) = db::write(&self.conn, move |conn| {
      let (_, table) = provision(conn, &group, &now)?;
      let c = &member.contact;
      conn.execute(
        &format!(
          "INSERT INTO \"{table}\"
             (login, display_name, email, phone, city, date_of_birth,
              admission_year)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
        ),
        params![
          member.login,
          member.display_name,
          c.email,
          c.phone,
          c.city,
          c.date_of_birth.map(encode_date),
          c.admission_year,
        ],
      )?;
      let id = conn.last_insert_rowid();
      let raw = member_row(conn, &table, id)?.ok_or(Error::MemberNotFound(id))?;
      Ok((group, raw))
    })
    .await?;
    raw.into_member(group)
  }

  async fn list_members<'a>(&'a self, group: &'a GroupName) -> Result<Vec<Member>> {
    let name = group.clone();
    let rows = db::read(&self.conn, move |conn| {
      let Some(table) = lookup_table(conn, &name)? else {
        return Ok(Vec::new());
      };
      let mut stmt = conn.prepare(&format!(
        "SELECT {MEMBER_COLUMNS} FROM \"{table}\"
         ORDER BY display_name, member_id"
      ))?;
      let rows = stmt
        .query_map([], RawMember::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
      Ok(rows)
    })
    .await?;
    rows
      .into_iter()
      .map(|raw| raw.into_member(group.clone()))
      .collect()
  }

  /// Without a hint every roster table is searched. A member id present in
  /// more than one group is reported as [`Error::AmbiguousMember`] rather
  /// than resolved arbitrarily.
  async fn find_member<'a>(
    &'a self,
    member_id: i64,
    hint: Option<&'a GroupName>,
  ) -> Result<Option<Member>> {
    let hint = hint.cloned();
    let found = db::read(&self.conn, move |conn| {
      let candidates = match hint {
        Some(group) => match lookup_table(conn, &group)? {
          Some(table) => vec![(group.as_str().to_owned(), table)],
          None => Vec::new(),
        },
        None => {
          let mut stmt = conn.prepare(
            "SELECT group_name, table_name FROM groups_list ORDER BY group_name",
          )?;
          let rows = stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<rusqlite::Result<Vec<(String, String)>>>()?;
          rows
        }
      };

      let mut found = Vec::new();
      for (group, table) in candidates {
        let table = checked(table)?;
        if let Some(raw) = member_row(conn, &table, member_id)? {
          found.push((group, raw));
        }
      }
      Ok(found)
    })
    .await?;

    let mut members = found
      .into_iter()
      .map(|(group, raw)| raw.into_member(GroupName::parse(&group)?))
      .collect::<Result<Vec<_>>>()?;
    match members.len() {
      0 | 1 => Ok(members.pop()),
      _ => {
        let groups: Vec<GroupName> = members.into_iter().map(|m| m.group).collect();
        tracing::warn!(member_id, ?groups, "member id present in several groups");
        Err(Error::AmbiguousMember { member_id, groups })
      }
    }
  }

  async fn update_member(
    &self,
    member_id: i64,
    group: GroupName,
    fields: MemberFields,
  ) -> Result<Member> {
    let fields = fields.validated()?;
    let (group, raw) = db::write(&self.conn, move |conn| {
      let table =
        lookup_table(conn, &group)?.ok_or_else(|| Error::GroupNotFound(group.clone()))?;
      let c = &fields.contact;
      let changed = conn.execute(
        &format!(
          "UPDATE \"{table}\"
           SET display_name = ?2, email = ?3, phone = ?4, city = ?5,
               date_of_birth = ?6, admission_year = ?7
           WHERE member_id = ?1"
        ),
        params![
          member_id,
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
      let raw = member_row(conn, &table, member_id)?
        .ok_or(Error::MemberNotFound(member_id))?;
      Ok((group, raw))
    })
    .await?;
    raw.into_member(group)
  }
}
