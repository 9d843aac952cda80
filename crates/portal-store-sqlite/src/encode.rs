//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings in UTC with microsecond
//! precision, so lexical order matches chronological order. Calendar dates
//! are stored as `YYYY-MM-DD`.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use portal_core::{
  account::{Account, ContactInfo, Credential, Role},
  grade::{
    GRADE_DATE_FORMAT, Grade, GradeCategory, GradeRecord, GradeValue, Offering,
    Subject,
  },
  group::{Group, GroupName},
  material::{FileRef, Material},
  roster::Member,
};
use rusqlite::Row;

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String {
  d.format(GRADE_DATE_FORMAT).to_string()
}

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, GRADE_DATE_FORMAT)
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Role ────────────────────────────────────────────────────────────────────

pub fn encode_role(r: Role) -> &'static str {
  match r {
    Role::Student => "student",
    Role::Teacher => "teacher",
    Role::Admin => "admin",
  }
}

pub fn decode_role(s: &str) -> Result<Role> {
  match s {
    "student" => Ok(Role::Student),
    "teacher" => Ok(Role::Teacher),
    "admin" => Ok(Role::Admin),
    other => Err(Error::Decode(format!("unknown role: {other:?}"))),
  }
}

// ─── GradeCategory ───────────────────────────────────────────────────────────

pub fn encode_category(c: GradeCategory) -> &'static str {
  match c {
    GradeCategory::Exam => "exam",
    GradeCategory::Test => "test",
    GradeCategory::Credit => "credit",
  }
}

pub fn decode_category(s: &str) -> Result<GradeCategory> {
  match s {
    "exam" => Ok(GradeCategory::Exam),
    "test" => Ok(GradeCategory::Test),
    "credit" => Ok(GradeCategory::Credit),
    other => Err(Error::Decode(format!("unknown grade category: {other:?}"))),
  }
}

fn decode_group(s: &str) -> Result<GroupName> { Ok(GroupName::parse(s)?) }

fn decode_opt_date(s: Option<String>) -> Result<Option<NaiveDate>> {
  s.as_deref().map(decode_date).transpose()
}

fn decode_opt_year(y: Option<i64>) -> Result<Option<i32>> {
  y.map(|y| {
    i32::try_from(y).map_err(|_| Error::Decode(format!("admission year {y}")))
  })
  .transpose()
}

fn decode_semester(s: i64) -> Result<u8> {
  u8::try_from(s).map_err(|_| Error::Decode(format!("semester {s}")))
}

fn decode_value(v: i64) -> Result<GradeValue> { Ok(GradeValue::new(v)?) }

// ─── Row types ───────────────────────────────────────────────────────────────

pub const GROUP_COLUMNS: &str = "name, created_at";

pub struct RawGroup {
  pub name:       String,
  pub created_at: String,
}

impl RawGroup {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self { name: row.get(0)?, created_at: row.get(1)? })
  }

  pub fn into_group(self) -> Result<Group> {
    Ok(Group {
      name:       decode_group(&self.name)?,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Column list matching [`RawAccount::from_row`]. `password_hash` is last so
/// the credential query can share the prefix.
pub const ACCOUNT_COLUMNS: &str = "account_id, login, display_name, role, \
                                   group_name, email, phone, city, \
                                   date_of_birth, admission_year, created_at, \
                                   password_hash";

pub struct RawAccount {
  pub account_id:     i64,
  pub login:          String,
  pub display_name:   String,
  pub role:           String,
  pub group_name:     Option<String>,
  pub email:          Option<String>,
  pub phone:          Option<String>,
  pub city:           Option<String>,
  pub date_of_birth:  Option<String>,
  pub admission_year: Option<i64>,
  pub created_at:     String,
  pub password_hash:  Option<String>,
}

impl RawAccount {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      account_id:     row.get(0)?,
      login:          row.get(1)?,
      display_name:   row.get(2)?,
      role:           row.get(3)?,
      group_name:     row.get(4)?,
      email:          row.get(5)?,
      phone:          row.get(6)?,
      city:           row.get(7)?,
      date_of_birth:  row.get(8)?,
      admission_year: row.get(9)?,
      created_at:     row.get(10)?,
      password_hash:  row.get(11)?,
    })
  }

  pub fn into_account(self) -> Result<Account> {
    Ok(self.into_credential()?.account)
  }

  pub fn into_credential(self) -> Result<Credential> {
    let account = Account {
      account_id:   self.account_id,
      login:        self.login,
      display_name: self.display_name,
      role:         decode_role(&self.role)?,
      group:        self.group_name.as_deref().map(decode_group).transpose()?,
      contact:      ContactInfo {
        email:          self.email,
        phone:          self.phone,
        city:           self.city,
        date_of_birth:  decode_opt_date(self.date_of_birth)?,
        admission_year: decode_opt_year(self.admission_year)?,
      },
      created_at:   decode_dt(&self.created_at)?,
    };
    Ok(Credential { account, password_hash: self.password_hash })
  }

  /// A grouped account viewed as a roster member; `None` when the account
  /// belongs to no group.
  pub fn into_member(self) -> Result<Option<Member>> {
    let account = self.into_account()?;
    Ok(account.group.map(|group| Member {
      member_id: account.account_id,
      group,
      login: account.login,
      display_name: account.display_name,
      contact: account.contact,
    }))
  }
}

/// Column list for per-group roster tables.
pub const MEMBER_COLUMNS: &str = "member_id, login, display_name, email, \
                                  phone, city, date_of_birth, admission_year";

pub struct RawMember {
  pub member_id:      i64,
  pub login:          String,
  pub display_name:   String,
  pub email:          Option<String>,
  pub phone:          Option<String>,
  pub city:           Option<String>,
  pub date_of_birth:  Option<String>,
  pub admission_year: Option<i64>,
}

impl RawMember {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      member_id:      row.get(0)?,
      login:          row.get(1)?,
      display_name:   row.get(2)?,
      email:          row.get(3)?,
      phone:          row.get(4)?,
      city:           row.get(5)?,
      date_of_birth:  row.get(6)?,
      admission_year: row.get(7)?,
    })
  }

  pub fn into_member(self, group: GroupName) -> Result<Member> {
    Ok(Member {
      member_id: self.member_id,
      group,
      login: self.login,
      display_name: self.display_name,
      contact: ContactInfo {
        email:          self.email,
        phone:          self.phone,
        city:           self.city,
        date_of_birth:  decode_opt_date(self.date_of_birth)?,
        admission_year: decode_opt_year(self.admission_year)?,
      },
    })
  }
}

pub const SUBJECT_COLUMNS: &str = "subject_id, name, description";

pub fn subject_from_row(row: &Row<'_>) -> rusqlite::Result<Subject> {
  Ok(Subject {
    subject_id:  row.get(0)?,
    name:        row.get(1)?,
    description: row.get(2)?,
  })
}

pub const OFFERING_COLUMNS: &str =
  "offering_id, group_name, subject_id, semester, teacher_id";

pub struct RawOffering {
  pub offering_id: i64,
  pub group_name:  String,
  pub subject_id:  i64,
  pub semester:    i64,
  pub teacher_id:  i64,
}

impl RawOffering {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      offering_id: row.get(0)?,
      group_name:  row.get(1)?,
      subject_id:  row.get(2)?,
      semester:    row.get(3)?,
      teacher_id:  row.get(4)?,
    })
  }

  pub fn into_offering(self) -> Result<Offering> {
    Ok(Offering {
      offering_id: self.offering_id,
      group:       decode_group(&self.group_name)?,
      subject_id:  self.subject_id,
      semester:    decode_semester(self.semester)?,
      teacher_id:  self.teacher_id,
    })
  }
}

pub const GRADE_COLUMNS: &str =
  "grade_id, student_id, offering_id, value, category, date, recorded_at";

pub struct RawGrade {
  pub grade_id:    i64,
  pub student_id:  i64,
  pub offering_id: i64,
  pub value:       i64,
  pub category:    String,
  pub date:        String,
  pub recorded_at: String,
}

impl RawGrade {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      grade_id:    row.get(0)?,
      student_id:  row.get(1)?,
      offering_id: row.get(2)?,
      value:       row.get(3)?,
      category:    row.get(4)?,
      date:        row.get(5)?,
      recorded_at: row.get(6)?,
    })
  }

  pub fn into_grade(self) -> Result<Grade> {
    Ok(Grade {
      grade_id:    self.grade_id,
      student_id:  self.student_id,
      offering_id: self.offering_id,
      value:       decode_value(self.value)?,
      category:    decode_category(&self.category)?,
      date:        decode_date(&self.date)?,
      recorded_at: decode_dt(&self.recorded_at)?,
    })
  }
}

/// A grade joined with its offering, subject and teacher.
pub struct RawGradeRecord {
  pub grade_id: i64,
  pub semester: i64,
  pub subject:  String,
  pub teacher:  String,
  pub value:    i64,
  pub category: String,
  pub date:     String,
}

impl RawGradeRecord {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      grade_id: row.get(0)?,
      semester: row.get(1)?,
      subject:  row.get(2)?,
      teacher:  row.get(3)?,
      value:    row.get(4)?,
      category: row.get(5)?,
      date:     row.get(6)?,
    })
  }

  pub fn into_record(self) -> Result<GradeRecord> {
    Ok(GradeRecord {
      grade_id: self.grade_id,
      semester: decode_semester(self.semester)?,
      subject:  self.subject,
      teacher:  self.teacher,
      value:    decode_value(self.value)?,
      category: decode_category(&self.category)?,
      date:     decode_date(&self.date)?,
    })
  }
}

pub const MATERIAL_COLUMNS: &str = "m.material_id, m.title, m.description, \
                                    m.subject_id, m.author_id, m.file_path, \
                                    m.content_hash, m.extension, m.uploaded_at";

pub struct RawMaterial {
  pub material_id:  i64,
  pub title:        String,
  pub description:  String,
  pub subject_id:   i64,
  pub author_id:    i64,
  pub file_path:    String,
  pub content_hash: String,
  pub extension:    String,
  pub uploaded_at:  String,
  /// Filled from `material_groups` after the row is read.
  pub groups:       Vec<String>,
}

impl RawMaterial {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      material_id:  row.get(0)?,
      title:        row.get(1)?,
      description:  row.get(2)?,
      subject_id:   row.get(3)?,
      author_id:    row.get(4)?,
      file_path:    row.get(5)?,
      content_hash: row.get(6)?,
      extension:    row.get(7)?,
      uploaded_at:  row.get(8)?,
      groups:       Vec::new(),
    })
  }

  pub fn into_material(self) -> Result<Material> {
    Ok(Material {
      material_id: self.material_id,
      title:       self.title,
      description: self.description,
      subject_id:  self.subject_id,
      groups:      self
        .groups
        .iter()
        .map(|g| decode_group(g))
        .collect::<Result<_>>()?,
      author_id:   self.author_id,
      file:        FileRef {
        path:         self.file_path,
        content_hash: self.content_hash,
        extension:    self.extension,
      },
      uploaded_at: decode_dt(&self.uploaded_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn timestamps_sort_lexically() {
    let a = "2024-01-15T10:00:00Z".parse::<DateTime<Utc>>().unwrap();
    let b = a + chrono::Duration::milliseconds(1500);
    assert!(encode_dt(a) < encode_dt(b));
    assert_eq!(decode_dt(&encode_dt(b)).unwrap(), b);
  }

  #[test]
  fn unknown_role_is_a_decode_error() {
    assert!(matches!(decode_role("janitor"), Err(Error::Decode(_))));
  }
}
