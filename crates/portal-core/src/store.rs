//! Storage traits.
//!
//! The traits are implemented by storage backends (e.g.
//! `portal-store-sqlite`). Higher layers (`portal-service`,
//! `portal-performance`) depend on these abstractions, not on a backend.
//!
//! All methods return `Send` futures so the traits can be used in
//! multi-threaded async runtimes (e.g. tokio with `axum`).

use std::future::Future;

use crate::{
  Classify,
  account::{Account, Credential, NewAccount, ProfileUpdate},
  grade::{Grade, GradeRecord, NewGrade, NewOffering, NewSubject, Offering, RecordOutcome, Subject},
  group::{Group, GroupName},
  material::{Material, NewMaterial},
  roster::{Member, MemberFields, NewMember},
};

// ─── Group directory ─────────────────────────────────────────────────────────

/// The authoritative registry of valid group identifiers.
pub trait GroupDirectory: Send + Sync {
  type Error: std::error::Error + Classify + Send + Sync + 'static;

  fn group_exists<'a>(
    &'a self,
    name: &'a GroupName,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Register a group. Idempotent: creating an existing group is not an
  /// error and returns the existing record unchanged. Backends that keep
  /// per-group storage provision it in the same transaction.
  fn create_group(
    &self,
    name: GroupName,
  ) -> impl Future<Output = Result<Group, Self::Error>> + Send + '_;

  /// All groups, ordered by name.
  fn list_groups(
    &self,
  ) -> impl Future<Output = Result<Vec<Group>, Self::Error>> + Send + '_;
}

// ─── Roster ──────────────────────────────────────────────────────────────────

/// Per-group collections of member records.
pub trait RosterStore: GroupDirectory {
  /// Append a member to `group`, creating the group if absent.
  fn add_member(
    &self,
    group: GroupName,
    member: NewMember,
  ) -> impl Future<Output = Result<Member, Self::Error>> + Send + '_;

  /// Members of `group` ordered by display name. An unknown group yields an
  /// empty list; use [`GroupDirectory::group_exists`] to tell the two apart.
  fn list_members<'a>(
    &'a self,
    group: &'a GroupName,
  ) -> impl Future<Output = Result<Vec<Member>, Self::Error>> + Send + 'a;

  /// Look a member up by id. `hint` narrows the search to one group.
  fn find_member<'a>(
    &'a self,
    member_id: i64,
    hint: Option<&'a GroupName>,
  ) -> impl Future<Output = Result<Option<Member>, Self::Error>> + Send + 'a;

  /// Replace a member's display name and contact attributes. The caller
  /// must name the group holding the row.
  fn update_member(
    &self,
    member_id: i64,
    group: GroupName,
    fields: MemberFields,
  ) -> impl Future<Output = Result<Member, Self::Error>> + Send + '_;
}

// ─── Accounts ────────────────────────────────────────────────────────────────

pub trait AccountStore: GroupDirectory {
  /// Persist a new account, creating its group if absent. A duplicate login
  /// is a conflict.
  fn create_account(
    &self,
    input: NewAccount,
  ) -> impl Future<Output = Result<Account, Self::Error>> + Send + '_;

  fn get_account(
    &self,
    account_id: i64,
  ) -> impl Future<Output = Result<Option<Account>, Self::Error>> + Send + '_;

  fn find_credential<'a>(
    &'a self,
    login: &'a str,
  ) -> impl Future<Output = Result<Option<Credential>, Self::Error>> + Send + 'a;

  /// Apply a partial update; `None` fields are left unchanged. A supplied
  /// `password_hash` replaces the credential in the same transaction.
  fn update_profile(
    &self,
    account_id: i64,
    update: ProfileUpdate,
    password_hash: Option<String>,
  ) -> impl Future<Output = Result<Account, Self::Error>> + Send + '_;

  fn set_credential(
    &self,
    account_id: i64,
    password_hash: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

// ─── Grades ──────────────────────────────────────────────────────────────────

pub trait GradeLedger: GroupDirectory {
  fn create_subject(
    &self,
    input: NewSubject,
  ) -> impl Future<Output = Result<Subject, Self::Error>> + Send + '_;

  fn get_subject(
    &self,
    subject_id: i64,
  ) -> impl Future<Output = Result<Option<Subject>, Self::Error>> + Send + '_;

  /// All subjects, ordered by name.
  fn list_subjects(
    &self,
  ) -> impl Future<Output = Result<Vec<Subject>, Self::Error>> + Send + '_;

  /// Bind a subject to a group for a semester. The group is created if
  /// absent; a duplicate `(group, subject, semester)` is a conflict.
  fn create_offering(
    &self,
    input: NewOffering,
  ) -> impl Future<Output = Result<Offering, Self::Error>> + Send + '_;

  fn get_offering(
    &self,
    offering_id: i64,
  ) -> impl Future<Output = Result<Option<Offering>, Self::Error>> + Send + '_;

  fn offerings_for_teacher(
    &self,
    teacher_id: i64,
  ) -> impl Future<Output = Result<Vec<Offering>, Self::Error>> + Send + '_;

  /// Insert or overwrite the grade for `(student, offering)`. The ledger
  /// never holds more than one row per pair and keeps no history.
  fn record_grade(
    &self,
    input: NewGrade,
  ) -> impl Future<Output = Result<(Grade, RecordOutcome), Self::Error>> + Send + '_;

  fn grades_for_offering(
    &self,
    offering_id: i64,
  ) -> impl Future<Output = Result<Vec<Grade>, Self::Error>> + Send + '_;

  /// A student's grades joined with offering and subject details,
  /// optionally restricted to one semester.
  fn grade_records(
    &self,
    student_id: i64,
    semester: Option<u8>,
  ) -> impl Future<Output = Result<Vec<GradeRecord>, Self::Error>> + Send + '_;

  /// Distinct semesters in which the student has grades, ascending.
  fn semesters_for_student(
    &self,
    student_id: i64,
  ) -> impl Future<Output = Result<Vec<u8>, Self::Error>> + Send + '_;
}

// ─── Study materials ─────────────────────────────────────────────────────────

pub trait MaterialStore: GroupDirectory {
  /// Publish a material. Every listed group is created if absent.
  fn add_material(
    &self,
    input: NewMaterial,
  ) -> impl Future<Output = Result<Material, Self::Error>> + Send + '_;

  /// Materials visible to `group`, by subject name then newest first.
  fn list_materials<'a>(
    &'a self,
    group: &'a GroupName,
  ) -> impl Future<Output = Result<Vec<Material>, Self::Error>> + Send + 'a;

  /// Materials uploaded by `author_id`, newest first.
  fn materials_by_author(
    &self,
    author_id: i64,
  ) -> impl Future<Output = Result<Vec<Material>, Self::Error>> + Send + '_;
}

// ─── Everything ──────────────────────────────────────────────────────────────

/// A backend offering the whole normalized model.
pub trait PortalStore: RosterStore + AccountStore + GradeLedger + MaterialStore {}

impl<T> PortalStore for T where
  T: RosterStore + AccountStore + GradeLedger + MaterialStore
{
}
