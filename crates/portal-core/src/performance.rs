//! Performance aggregation and the wire format of the performance service.
//!
//! The same [`aggregate`] function backs both the remote service and the
//! portal's local fallback, so the two paths agree for the same grade data.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::grade::{GradeCategory, GradeRecord, GradeValue};

// ─── Report ──────────────────────────────────────────────────────────────────

/// One grade as it appears inside a subject aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeEntry {
  pub date:     NaiveDate,
  pub value:    GradeValue,
  #[serde(rename = "type")]
  pub category: GradeCategory,
}

/// All grades of one subject in one semester.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectAggregate {
  pub teacher: String,
  /// Mean of `grades`, rounded to two decimals.
  pub avg:     f64,
  /// Ordered by date.
  pub grades:  Vec<GradeEntry>,
}

/// Semester number → subject name → aggregate.
pub type SemesterMap = BTreeMap<u8, BTreeMap<String, SubjectAggregate>>;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PerformanceReport {
  /// Mean over every grade, rounded to two decimals; `None` when the student
  /// has no grades.
  pub avg_grade: Option<f64>,
  pub semesters: SemesterMap,
}

/// Round half-up to two decimals.
pub fn round2(value: f64) -> f64 { (value * 100.0).round() / 100.0 }

fn mean(values: impl Iterator<Item = GradeValue>) -> Option<f64> {
  let (sum, count) = values.fold((0u32, 0u32), |(s, c), v| (s + u32::from(v.get()), c + 1));
  (count > 0).then(|| round2(f64::from(sum) / f64::from(count)))
}

/// Compute a student's performance report from their flattened grades.
pub fn aggregate(records: &[GradeRecord]) -> PerformanceReport {
  let mut sorted: Vec<&GradeRecord> = records.iter().collect();
  sorted.sort_by(|a, b| {
    (a.semester, &a.subject, a.date, a.grade_id)
      .cmp(&(b.semester, &b.subject, b.date, b.grade_id))
  });

  let mut semesters = SemesterMap::new();
  for record in &sorted {
    let entry = semesters
      .entry(record.semester)
      .or_default()
      .entry(record.subject.clone())
      .or_insert_with(|| SubjectAggregate {
        teacher: record.teacher.clone(),
        avg:     0.0,
        grades:  Vec::new(),
      });
    entry.grades.push(GradeEntry {
      date:     record.date,
      value:    record.value,
      category: record.category,
    });
  }

  for subject in semesters.values_mut().flat_map(|s| s.values_mut()) {
    subject.avg = mean(subject.grades.iter().map(|g| g.value)).unwrap_or(0.0);
  }

  PerformanceReport {
    avg_grade: mean(sorted.iter().map(|r| r.value)),
    semesters,
  }
}

// ─── Wire format ─────────────────────────────────────────────────────────────

/// Body of `POST /api/performance`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRequest {
  pub student_id: i64,
  pub auth_token: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub semester:   Option<i64>,
}

/// Response of `POST /api/performance`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceResponse {
  pub success:   bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub avg_grade: Option<f64>,
  #[serde(default)]
  pub semesters: SemesterMap,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error:     Option<String>,
}

impl PerformanceResponse {
  pub fn ok(report: PerformanceReport) -> Self {
    Self {
      success:   true,
      avg_grade: report.avg_grade,
      semesters: report.semesters,
      error:     None,
    }
  }

  pub fn failure(message: impl Into<String>) -> Self {
    Self {
      success:   false,
      avg_grade: None,
      semesters: SemesterMap::new(),
      error:     Some(message.into()),
    }
  }

  /// The report carried by a successful response.
  pub fn into_report(self) -> Option<PerformanceReport> {
    self.success.then_some(PerformanceReport {
      avg_grade: self.avg_grade,
      semesters: self.semesters,
    })
  }
}
