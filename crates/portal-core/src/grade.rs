//! Subjects, offerings and the grade ledger's record types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, group::GroupName};

pub const MIN_GRADE: i64 = 1;
pub const MAX_GRADE: i64 = 5;
pub const MAX_SEMESTER: i64 = 12;

/// Date format accepted for grade dates.
pub const GRADE_DATE_FORMAT: &str = "%Y-%m-%d";

// ─── GradeValue ──────────────────────────────────────────────────────────────

/// A grade in the closed range `1..=5`. Out-of-range values cannot be
/// constructed; they are rejected, never clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct GradeValue(u8);

impl GradeValue {
  pub fn new(value: i64) -> Result<Self> {
    if (MIN_GRADE..=MAX_GRADE).contains(&value) {
      Ok(Self(value as u8))
    } else {
      Err(Error::GradeOutOfRange(value))
    }
  }

  pub fn get(self) -> u8 { self.0 }
}

impl TryFrom<i64> for GradeValue {
  type Error = Error;

  fn try_from(value: i64) -> Result<Self> { Self::new(value) }
}

impl From<GradeValue> for u8 {
  fn from(value: GradeValue) -> Self { value.0 }
}

// ─── Category ────────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum GradeCategory {
  #[default]
  Exam,
  Test,
  Credit,
}

// ─── Parsing helpers ─────────────────────────────────────────────────────────

pub fn parse_grade_date(raw: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(raw.trim(), GRADE_DATE_FORMAT)
    .map_err(|_| Error::InvalidDate(raw.to_owned()))
}

pub fn validate_semester(raw: i64) -> Result<u8> {
  if (1..=MAX_SEMESTER).contains(&raw) {
    Ok(raw as u8)
  } else {
    Err(Error::InvalidSemester(raw))
  }
}

// ─── Subject ─────────────────────────────────────────────────────────────────

/// A named course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
  pub subject_id:  i64,
  pub name:        String,
  pub description: String,
}

#[derive(Debug, Clone)]
pub struct NewSubject {
  pub name:        String,
  pub description: String,
}

impl NewSubject {
  pub fn new(name: impl Into<String>) -> Self {
    Self { name: name.into(), description: String::new() }
  }

  pub fn validated(self) -> Result<Self> {
    let name = self.name.trim();
    if name.is_empty() || name.chars().count() > 100 {
      return Err(Error::InvalidSubjectName(self.name.clone()));
    }
    Ok(Self { name: name.to_owned(), description: self.description })
  }
}

// ─── Offering ────────────────────────────────────────────────────────────────

/// A subject taught to one group in one semester by one teacher. Unique on
/// `(group, subject_id, semester)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offering {
  pub offering_id: i64,
  pub group:       GroupName,
  pub subject_id:  i64,
  pub semester:    u8,
  pub teacher_id:  i64,
}

#[derive(Debug, Clone)]
pub struct NewOffering {
  pub group:      GroupName,
  pub subject_id: i64,
  pub semester:   u8,
  pub teacher_id: i64,
}

// ─── Grade ───────────────────────────────────────────────────────────────────

/// The current grade of one student for one offering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grade {
  pub grade_id:    i64,
  pub student_id:  i64,
  pub offering_id: i64,
  pub value:       GradeValue,
  pub category:    GradeCategory,
  pub date:        NaiveDate,
  pub recorded_at: DateTime<Utc>,
}

/// Input to [`crate::store::GradeLedger::record_grade`]. Both the value and
/// the date are already parsed, so an invalid request can never reach the
/// store.
#[derive(Debug, Clone)]
pub struct NewGrade {
  pub student_id:  i64,
  pub offering_id: i64,
  pub value:       GradeValue,
  pub category:    GradeCategory,
  pub date:        NaiveDate,
}

impl NewGrade {
  /// Parse raw form-style input.
  pub fn parse(
    student_id: i64,
    offering_id: i64,
    value: i64,
    date: &str,
  ) -> Result<Self> {
    Ok(Self {
      student_id,
      offering_id,
      value: GradeValue::new(value)?,
      category: GradeCategory::default(),
      date: parse_grade_date(date)?,
    })
  }
}

/// What [`crate::store::GradeLedger::record_grade`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
  Inserted,
  /// An existing grade was overwritten in place; its old value is gone from
  /// the ledger and only reported here.
  Replaced { previous: GradeValue },
}

/// A grade flattened together with its offering's semester, subject and
/// teacher. Input to [`crate::performance::aggregate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradeRecord {
  pub grade_id: i64,
  pub semester: u8,
  pub subject:  String,
  pub teacher:  String,
  pub value:    GradeValue,
  pub category: GradeCategory,
  pub date:     NaiveDate,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn grade_value_bounds() {
    for v in 1..=5 {
      assert_eq!(GradeValue::new(v).unwrap().get() as i64, v);
    }
    for v in [0, 6, -1, 255, i64::MAX] {
      assert!(matches!(GradeValue::new(v), Err(Error::GradeOutOfRange(x)) if x == v));
    }
  }

  #[test]
  fn grade_value_deserialization_rejects_out_of_range() {
    assert!(serde_json::from_str::<GradeValue>("3").is_ok());
    assert!(serde_json::from_str::<GradeValue>("9").is_err());
  }

  #[test]
  fn grade_dates() {
    assert_eq!(
      parse_grade_date("2024-01-15").unwrap(),
      NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    );
    for bad in ["15.01.2024", "2024-13-01", "", "yesterday"] {
      assert!(matches!(parse_grade_date(bad), Err(Error::InvalidDate(_))));
    }
  }

  #[test]
  fn semesters() {
    assert_eq!(validate_semester(1).unwrap(), 1);
    assert_eq!(validate_semester(12).unwrap(), 12);
    assert!(validate_semester(0).is_err());
    assert!(validate_semester(13).is_err());
  }

  #[test]
  fn new_grade_parse_checks_value_before_date() {
    assert!(matches!(
      NewGrade::parse(1, 1, 7, "not a date"),
      Err(Error::GradeOutOfRange(7))
    ));
    assert!(matches!(
      NewGrade::parse(1, 1, 4, "not a date"),
      Err(Error::InvalidDate(_))
    ));
  }
}
