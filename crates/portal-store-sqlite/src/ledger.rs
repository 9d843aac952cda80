//! Grade ledger and study materials for [`SqliteStore`].

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension as _, params};

use portal_core::{
  account::Role,
  grade::{
    Grade, GradeRecord, GradeValue, NewGrade, NewOffering, NewSubject, Offering,
    RecordOutcome, Subject, validate_semester,
  },
  group::GroupName,
  material::{Material, NewMaterial},
  store::{GradeLedger, MaterialStore},
};

use crate::{
  Error, Result, db,
  encode::{
    GRADE_COLUMNS, MATERIAL_COLUMNS, OFFERING_COLUMNS, RawGrade, RawGradeRecord,
    RawMaterial, RawOffering, SUBJECT_COLUMNS, decode_dt, decode_role, encode_category,
    encode_date, encode_dt, subject_from_row,
  },
  store::{SqliteStore, account_row, ensure_group},
};

fn offering_row(
  conn: &Connection,
  offering_id: i64,
) -> rusqlite::Result<Option<RawOffering>> {
  conn
    .query_row(
      &format!("SELECT {OFFERING_COLUMNS} FROM offerings WHERE offering_id = ?1"),
      params![offering_id],
      RawOffering::from_row,
    )
    .optional()
}

fn grade_row(conn: &Connection, grade_id: i64) -> rusqlite::Result<RawGrade> {
  conn.query_row(
    &format!("SELECT {GRADE_COLUMNS} FROM grades WHERE grade_id = ?1"),
    params![grade_id],
    RawGrade::from_row,
  )
}

fn subject_exists(conn: &Connection, subject_id: i64) -> rusqlite::Result<bool> {
  db::exists(conn, "SELECT 1 FROM subjects WHERE subject_id = ?1", subject_id)
}

/// Run a material query whose first parameter is `param`, then attach each
/// material's group list.
fn query_materials(
  conn: &Connection,
  sql: &str,
  param: impl rusqlite::ToSql,
) -> rusqlite::Result<Vec<RawMaterial>> {
  let mut stmt = conn.prepare(sql)?;
  let mut rows = stmt
    .query_map(params![param], RawMaterial::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let mut groups_stmt = conn.prepare(
    "SELECT group_name FROM material_groups
     WHERE material_id = ?1 ORDER BY group_name",
  )?;
  for row in &mut rows {
    row.groups = groups_stmt
      .query_map(params![row.material_id], |r| r.get(0))?
      .collect::<rusqlite::Result<Vec<String>>>()?;
  }
  Ok(rows)
}

// ─── GradeLedger impl ────────────────────────────────────────────────────────

impl GradeLedger for SqliteStore {
  async fn create_subject(&self, input: NewSubject) -> Result<Subject> {
    let input = input.validated()?;
    db::write(&self.conn, move |conn| {
      if db::exists(conn, "SELECT 1 FROM subjects WHERE name = ?1", &input.name)? {
        return Err(Error::DuplicateSubject(input.name));
      }
      conn.execute(
        "INSERT INTO subjects (name, description) VALUES (?1, ?2)",
        params![input.name, input.description],
      )?;
      Ok(Subject {
        subject_id:  conn.last_insert_rowid(),
        name:        input.name,
        description: input.description,
      })
    })
    .await
  }

  async fn get_subject(&self, subject_id: i64) -> Result<Option<Subject>> {
    db::read(&self.conn, move |conn| {
      Ok(
        conn
          .query_row(
            &format!("SELECT {SUBJECT_COLUMNS} FROM subjects WHERE subject_id = ?1"),
            params![subject_id],
            subject_from_row,
          )
          .optional()?,
      )
    })
    .await
  }

  async fn list_subjects(&self) -> Result<Vec<Subject>> {
    db::read(&self.conn, |conn| {
      let mut stmt = conn
        .prepare(&format!("SELECT {SUBJECT_COLUMNS} FROM subjects ORDER BY name"))?;
      let rows = stmt
        .query_map([], subject_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
      Ok(rows)
    })
    .await
  }

  async fn create_offering(&self, input: NewOffering) -> Result<Offering> {
    validate_semester(i64::from(input.semester))?;
    let now = encode_dt(Utc::now());
    db::write(&self.conn, move |conn| {
      if !subject_exists(conn, input.subject_id)? {
        return Err(Error::SubjectNotFound(input.subject_id));
      }
      let teacher = account_row(conn, input.teacher_id)?
        .ok_or(Error::AccountNotFound(input.teacher_id))?;
      if !decode_role(&teacher.role)?.can_teach() {
        return Err(Error::NotATeacher(input.teacher_id));
      }
      let duplicate = conn
        .query_row(
          "SELECT 1 FROM offerings
           WHERE group_name = ?1 AND subject_id = ?2 AND semester = ?3",
          params![input.group.as_str(), input.subject_id, input.semester],
          |_| Ok(()),
        )
        .optional()?
        .is_some();
      if duplicate {
        return Err(Error::DuplicateOffering {
          group:      input.group,
          subject_id: input.subject_id,
          semester:   input.semester,
        });
      }

      ensure_group(conn, &input.group, &now)?;
      conn.execute(
        "INSERT INTO offerings (group_name, subject_id, semester, teacher_id)
         VALUES (?1, ?2, ?3, ?4)",
        params![
          input.group.as_str(),
          input.subject_id,
          input.semester,
          input.teacher_id
        ],
      )?;
      Ok(Offering {
        offering_id: conn.last_insert_rowid(),
        group:       input.group,
        subject_id:  input.subject_id,
        semester:    input.semester,
        teacher_id:  input.teacher_id,
      })
    })
    .await
  }

  async fn get_offering(&self, offering_id: i64) -> Result<Option<Offering>> {
    let raw = db::read(&self.conn, move |conn| Ok(offering_row(conn, offering_id)?))
      .await?;
    raw.map(RawOffering::into_offering).transpose()
  }

  async fn offerings_for_teacher(&self, teacher_id: i64) -> Result<Vec<Offering>> {
    let rows = db::read(&self.conn, move |conn| {
      let mut stmt = conn.prepare(&format!(
        "SELECT {OFFERING_COLUMNS} FROM offerings
         WHERE teacher_id = ?1
         ORDER BY semester, group_name, subject_id"
      ))?;
      let rows = stmt
        .query_map(params![teacher_id], RawOffering::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
      Ok(rows)
    })
    .await?;
    rows.into_iter().map(RawOffering::into_offering).collect()
  }

  async fn record_grade(&self, input: NewGrade) -> Result<(Grade, RecordOutcome)> {
    let now = encode_dt(Utc::now());
    let (raw, previous) = db::write(&self.conn, move |conn| {
      let offering = offering_row(conn, input.offering_id)?
        .ok_or(Error::OfferingNotFound(input.offering_id))?;
      let student = account_row(conn, input.student_id)?
        .ok_or(Error::AccountNotFound(input.student_id))?;
      if decode_role(&student.role)? != Role::Student {
        return Err(Error::NotAStudent(input.student_id));
      }
      if student.group_name.as_deref() != Some(offering.group_name.as_str()) {
        return Err(Error::NotInGroup {
          student_id: input.student_id,
          group:      GroupName::parse(&offering.group_name)?,
        });
      }

      let existing: Option<(i64, i64)> = conn
        .query_row(
          "SELECT grade_id, value FROM grades
           WHERE student_id = ?1 AND offering_id = ?2",
          params![input.student_id, input.offering_id],
          |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?;

      let value = input.value.get();
      let category = encode_category(input.category);
      let date = encode_date(input.date);
      let (grade_id, previous) = match existing {
        Some((grade_id, previous)) => {
          conn.execute(
            "UPDATE grades
             SET value = ?2, category = ?3, date = ?4, recorded_at = ?5
             WHERE grade_id = ?1",
            params![grade_id, value, category, date, now],
          )?;
          (grade_id, Some(previous))
        }
        None => {
          conn.execute(
            "INSERT INTO grades
               (student_id, offering_id, value, category, date, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
              input.student_id,
              input.offering_id,
              value,
              category,
              date,
              now
            ],
          )?;
          (conn.last_insert_rowid(), None)
        }
      };
      Ok((grade_row(conn, grade_id)?, previous))
    })
    .await?;

    let outcome = match previous {
      Some(v) => RecordOutcome::Replaced { previous: GradeValue::new(v)? },
      None => RecordOutcome::Inserted,
    };
    Ok((raw.into_grade()?, outcome))
  }

  async fn grades_for_offering(&self, offering_id: i64) -> Result<Vec<Grade>> {
    let rows = db::read(&self.conn, move |conn| {
      let mut stmt = conn.prepare(&format!(
        "SELECT {GRADE_COLUMNS} FROM grades
         WHERE offering_id = ?1
         ORDER BY grade_id"
      ))?;
      let rows = stmt
        .query_map(params![offering_id], RawGrade::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
      Ok(rows)
    })
    .await?;
    rows.into_iter().map(RawGrade::into_grade).collect()
  }

  async fn grade_records(
    &self,
    student_id: i64,
    semester: Option<u8>,
  ) -> Result<Vec<GradeRecord>> {
    let rows = db::read(&self.conn, move |conn| {
      let mut stmt = conn.prepare(
        "SELECT g.grade_id, o.semester, s.name, t.display_name,
                g.value, g.category, g.date
         FROM grades g
         JOIN offerings o ON o.offering_id = g.offering_id
         JOIN subjects  s ON s.subject_id  = o.subject_id
         JOIN accounts  t ON t.account_id  = o.teacher_id
         WHERE g.student_id = ?1 AND (?2 IS NULL OR o.semester = ?2)
         ORDER BY o.semester, s.name, g.date, g.grade_id",
      )?;
      let rows = stmt
        .query_map(params![student_id, semester], RawGradeRecord::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
      Ok(rows)
    })
    .await?;
    rows.into_iter().map(RawGradeRecord::into_record).collect()
  }

  async fn semesters_for_student(&self, student_id: i64) -> Result<Vec<u8>> {
    db::read(&self.conn, move |conn| {
      let mut stmt = conn.prepare(
        "SELECT DISTINCT o.semester
         FROM grades g JOIN offerings o ON o.offering_id = g.offering_id
         WHERE g.student_id = ?1
         ORDER BY o.semester",
      )?;
      let rows = stmt
        .query_map(params![student_id], |r| r.get(0))?
        .collect::<rusqlite::Result<Vec<u8>>>()?;
      Ok(rows)
    })
    .await
  }
}

// ─── MaterialStore impl ──────────────────────────────────────────────────────

impl MaterialStore for SqliteStore {
  async fn add_material(&self, input: NewMaterial) -> Result<Material> {
    let input = input.validated()?;
    let now = encode_dt(Utc::now());
    // Round-trip through the stored form so the returned value equals a
    // later read.
    let uploaded_at = decode_dt(&now)?;
    db::write(&self.conn, move |conn| {
      if !subject_exists(conn, input.subject_id)? {
        return Err(Error::SubjectNotFound(input.subject_id));
      }
      if account_row(conn, input.author_id)?.is_none() {
        return Err(Error::AccountNotFound(input.author_id));
      }
      for group in &input.groups {
        ensure_group(conn, group, &now)?;
      }

      conn.execute(
        "INSERT INTO materials
           (title, description, subject_id, author_id, file_path,
            content_hash, extension, uploaded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
          input.title,
          input.description,
          input.subject_id,
          input.author_id,
          input.file.path,
          input.file.content_hash,
          input.file.extension,
          now,
        ],
      )?;
      let material_id = conn.last_insert_rowid();
      for group in &input.groups {
        conn.execute(
          "INSERT INTO material_groups (material_id, group_name) VALUES (?1, ?2)",
          params![material_id, group.as_str()],
        )?;
      }

      Ok(Material {
        material_id,
        title: input.title,
        description: input.description,
        subject_id: input.subject_id,
        groups: input.groups,
        author_id: input.author_id,
        file: input.file,
        uploaded_at,
      })
    })
    .await
  }

  async fn list_materials<'a>(&'a self, group: &'a GroupName) -> Result<Vec<Material>> {
    let name = group.as_str().to_owned();
    let rows = db::read(&self.conn, move |conn| {
      Ok(query_materials(
        conn,
        &format!(
          "SELECT {MATERIAL_COLUMNS}
           FROM materials m
           JOIN material_groups mg ON mg.material_id = m.material_id
           JOIN subjects s ON s.subject_id = m.subject_id
           WHERE mg.group_name = ?1
           ORDER BY s.name, m.uploaded_at DESC, m.material_id DESC"
        ),
        name,
      )?)
    })
    .await?;
    rows.into_iter().map(RawMaterial::into_material).collect()
  }

  async fn materials_by_author(&self, author_id: i64) -> Result<Vec<Material>> {
    let rows = db::read(&self.conn, move |conn| {
      Ok(query_materials(
        conn,
        &format!(
          "SELECT {MATERIAL_COLUMNS}
           FROM materials m
           WHERE m.author_id = ?1
           ORDER BY m.uploaded_at DESC, m.material_id DESC"
        ),
        author_id,
      )?)
    })
    .await?;
    rows.into_iter().map(RawMaterial::into_material).collect()
  }
}
