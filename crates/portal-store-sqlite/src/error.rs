//! Error type for `portal-store-sqlite`.

use portal_core::{Classify, ErrorKind, group::GroupName};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] portal_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("cannot decode stored value: {0}")]
  Decode(String),

  /// A roster table name read back from the directory failed the
  /// allow-list; it is never used in a statement.
  #[error("refusing to use unsafe table name {0:?}")]
  UnsafeTableName(String),

  #[error("group not found: {0}")]
  GroupNotFound(GroupName),

  #[error("account not found: {0}")]
  AccountNotFound(i64),

  #[error("member {0} not found")]
  MemberNotFound(i64),

  #[error("subject not found: {0}")]
  SubjectNotFound(i64),

  #[error("offering not found: {0}")]
  OfferingNotFound(i64),

  #[error("login {0:?} is already taken")]
  LoginTaken(String),

  #[error("email {0:?} is already registered")]
  EmailTaken(String),

  #[error("subject {0:?} already exists")]
  DuplicateSubject(String),

  #[error("subject {subject_id} is already offered to {group} in semester {semester}")]
  DuplicateOffering {
    group:      GroupName,
    subject_id: i64,
    semester:   u8,
  },

  #[error("account {0} cannot teach")]
  NotATeacher(i64),

  /// Only student accounts can receive grades.
  #[error("account {0} is not a student")]
  NotAStudent(i64),

  #[error("student {student_id} is not a member of {group}")]
  NotInGroup {
    student_id: i64,
    group:      GroupName,
  },

  /// The same local id exists in more than one group's roster table.
  #[error("member id {member_id} is ambiguous across groups {groups:?}")]
  AmbiguousMember {
    member_id: i64,
    groups:    Vec<GroupName>,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<rusqlite::Error> for Error {
  fn from(e: rusqlite::Error) -> Self {
    Self::Database(tokio_rusqlite::Error::Rusqlite(e))
  }
}

impl Classify for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Self::Core(e) => e.kind(),
      Self::Database(_)
      | Self::DateParse(_)
      | Self::Decode(_)
      | Self::UnsafeTableName(_) => ErrorKind::Persistence,
      Self::GroupNotFound(_)
      | Self::AccountNotFound(_)
      | Self::MemberNotFound(_)
      | Self::SubjectNotFound(_)
      | Self::OfferingNotFound(_) => ErrorKind::NotFound,
      Self::LoginTaken(_)
      | Self::EmailTaken(_)
      | Self::DuplicateSubject(_)
      | Self::DuplicateOffering { .. }
      | Self::AmbiguousMember { .. } => ErrorKind::Conflict,
      Self::NotATeacher(_) | Self::NotAStudent(_) | Self::NotInGroup { .. } => {
        ErrorKind::Validation
      }
    }
  }
}
