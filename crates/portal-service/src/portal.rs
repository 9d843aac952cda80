//! The portal facade: every user-facing operation, with validation,
//! capability checks and event emission, over any [`PortalStore`].

use std::{path::PathBuf, sync::Arc};

use chrono::Utc;
use portal_core::{
  ErrorKind,
  account::{
    Account, ContactInfo, NewAccount, ProfileUpdate, Role, normalize_display_name,
    normalize_login, validate_password,
  },
  events::{EventSink, PortalEvent},
  grade::{
    Grade, GradeCategory, NewGrade, NewOffering, NewSubject, Offering, RecordOutcome,
    Subject, validate_semester,
  },
  group::{Group, GroupName},
  material::{FileRef, Material, NewMaterial},
  performance::aggregate,
  roster::Member,
  store::{
    AccountStore, GradeLedger, GroupDirectory, MaterialStore, PortalStore, RosterStore,
  },
};

use crate::{
  Caller, Error, Result,
  credential::{hash_credential, verify_credential},
  performance::{PerformanceClient, ReportSource, SourcedReport},
};

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Self-registration form.
#[derive(Debug, Clone)]
pub struct RegisterRequest {
  pub login:        String,
  pub password:     String,
  pub display_name: String,
  pub group:        String,
  pub contact:      ContactInfo,
}

/// Profile edit. A credential change must carry the current password.
#[derive(Debug, Clone, Default)]
pub struct ProfileChange {
  pub update:           ProfileUpdate,
  pub new_password:     Option<String>,
  pub current_password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OfferingInput {
  pub group:      GroupName,
  pub subject_id: i64,
  pub semester:   i64,
  pub teacher_id: i64,
}

/// Raw grade form input; parsed before anything is read or written.
#[derive(Debug, Clone)]
pub struct GradeInput {
  pub student_id:  i64,
  pub offering_id: i64,
  pub value:       i64,
  pub category:    GradeCategory,
  pub date:        String,
}

#[derive(Debug, Clone)]
pub struct MaterialUpload {
  pub title:         String,
  pub description:   String,
  pub subject_id:    i64,
  pub groups:        Vec<GroupName>,
  pub original_name: String,
  pub contents:      Vec<u8>,
}

// ─── Portal ──────────────────────────────────────────────────────────────────

pub struct Portal<S> {
  store:        Arc<S>,
  events:       Arc<dyn EventSink>,
  performance:  Option<PerformanceClient>,
  material_dir: PathBuf,
}

impl<S: PortalStore> Portal<S> {
  pub fn new(store: S, events: Arc<dyn EventSink>) -> Self {
    Self {
      store: Arc::new(store),
      events,
      performance: None,
      material_dir: PathBuf::from("media"),
    }
  }

  /// Ask this service for performance reports before computing locally.
  pub fn with_performance(mut self, client: PerformanceClient) -> Self {
    self.performance = Some(client);
    self
  }

  pub fn with_material_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.material_dir = dir.into();
    self
  }

  pub fn store(&self) -> &S { &self.store }

  fn emit(&self, event: PortalEvent) { self.events.emit(&event); }

  /// Wrap a storage error, reporting uniqueness conflicts to the sink.
  fn storage(
    &self,
    operation: &'static str,
    e: <S as GroupDirectory>::Error,
  ) -> Error {
    let err = Error::store(e);
    if err.kind() == Some(ErrorKind::Conflict) {
      self.emit(PortalEvent::Conflict { operation, detail: err.to_string() });
    }
    err
  }

  async fn group_is_new(&self, group: &GroupName) -> Result<bool> {
    let exists = self
      .store
      .group_exists(group)
      .await
      .map_err(|e| self.storage("group_exists", e))?;
    Ok(!exists)
  }

  // ─── Accounts ────────────────────────────────────────────────────────────

  /// Create a student account. Every field is checked before the store is
  /// touched; the group is created if it does not exist yet.
  pub async fn register(&self, req: RegisterRequest) -> Result<Account> {
    let login = normalize_login(&req.login)?;
    validate_password(&req.password)?;
    let display_name = normalize_display_name(&req.display_name)?;
    let group = GroupName::parse(&req.group)?;
    req.contact.validate()?;

    let new_group = self.group_is_new(&group).await?;
    let password_hash = hash_credential(&req.password)?;
    let account = self
      .store
      .create_account(NewAccount {
        login,
        password_hash: Some(password_hash),
        display_name,
        role: Role::Student,
        group: Some(group.clone()),
        contact: req.contact,
      })
      .await
      .map_err(|e| self.storage("register", e))?;

    if new_group {
      self.emit(PortalEvent::GroupCreated { group: group.clone() });
    }
    self.emit(PortalEvent::Registered {
      account_id: account.account_id,
      login: account.login.clone(),
      group,
    });
    Ok(account)
  }

  /// Check a login/password pair. Unknown logins, accounts without a
  /// credential and wrong passwords are indistinguishable.
  pub async fn authenticate(&self, login: &str, password: &str) -> Result<Caller> {
    let credential = self
      .store
      .find_credential(login)
      .await
      .map_err(|e| self.storage("authenticate", e))?
      .ok_or(Error::InvalidCredentials)?;
    let hash = credential.password_hash.as_deref().ok_or(Error::InvalidCredentials)?;
    if !verify_credential(hash, password) {
      return Err(Error::InvalidCredentials);
    }
    tracing::debug!(account_id = credential.account.account_id, "authenticated");
    Ok(Caller::from_account(&credential.account))
  }

  pub async fn get_account(&self, caller: &Caller, account_id: i64) -> Result<Account> {
    caller.require_self_or_staff(account_id)?;
    self
      .store
      .get_account(account_id)
      .await
      .map_err(|e| self.storage("get_account", e))?
      .ok_or_else(|| Error::NotFound(format!("account {account_id}")))
  }

  pub async fn update_profile(
    &self,
    caller: &Caller,
    account_id: i64,
    change: ProfileChange,
  ) -> Result<Account> {
    caller.require_self_or_staff(account_id)?;
    let update = change.update.validated()?;
    if let Some(new_password) = &change.new_password {
      validate_password(new_password)?;
    }

    let account = self.get_account(caller, account_id).await?;
    let new_hash = match &change.new_password {
      Some(new_password) => {
        let current = change.current_password.as_deref().ok_or(Error::InvalidCredentials)?;
        let stored = self
          .store
          .find_credential(&account.login)
          .await
          .map_err(|e| self.storage("update_profile", e))?
          .and_then(|c| c.password_hash)
          .ok_or(Error::InvalidCredentials)?;
        if !verify_credential(&stored, current) {
          return Err(Error::InvalidCredentials);
        }
        Some(hash_credential(new_password)?)
      }
      None => None,
    };

    let new_group = match &update.group {
      Some(group) => self.group_is_new(group).await?,
      None => false,
    };
    let credential_changed = new_hash.is_some();
    let updated = if update.is_empty() && new_hash.is_none() {
      account
    } else {
      self
        .store
        .update_profile(account_id, update, new_hash)
        .await
        .map_err(|e| self.storage("update_profile", e))?
    };
    if new_group && let Some(group) = &updated.group {
      self.emit(PortalEvent::GroupCreated { group: group.clone() });
    }

    self.emit(PortalEvent::ProfileUpdated { account_id, credential_changed });
    Ok(updated)
  }

  // ─── Groups ──────────────────────────────────────────────────────────────

  pub async fn list_groups(&self) -> Result<Vec<Group>> {
    self.store.list_groups().await.map_err(|e| self.storage("list_groups", e))
  }

  /// Register a group. Creating an existing group returns it unchanged.
  pub async fn create_group(&self, caller: &Caller, name: &str) -> Result<Group> {
    caller.require_staff("creating a group")?;
    let name = GroupName::parse(name)?;
    let new_group = self.group_is_new(&name).await?;
    let group = self
      .store
      .create_group(name)
      .await
      .map_err(|e| self.storage("create_group", e))?;
    if new_group {
      self.emit(PortalEvent::GroupCreated { group: group.name.clone() });
    }
    Ok(group)
  }

  pub async fn get_roster(&self, caller: &Caller, group: &GroupName) -> Result<Vec<Member>> {
    caller.require_group_access(group)?;
    self
      .store
      .list_members(group)
      .await
      .map_err(|e| self.storage("get_roster", e))
  }

  // ─── Grades ──────────────────────────────────────────────────────────────

  pub async fn create_subject(&self, caller: &Caller, input: NewSubject) -> Result<Subject> {
    caller.require_staff("creating a subject")?;
    let input = input.validated()?;
    self
      .store
      .create_subject(input)
      .await
      .map_err(|e| self.storage("create_subject", e))
  }

  /// All subjects, ordered by name.
  pub async fn list_subjects(&self) -> Result<Vec<Subject>> {
    self
      .store
      .list_subjects()
      .await
      .map_err(|e| self.storage("list_subjects", e))
  }

  /// Offerings the caller teaches.
  pub async fn my_offerings(&self, caller: &Caller) -> Result<Vec<Offering>> {
    caller.require_staff("listing taught offerings")?;
    self
      .store
      .offerings_for_teacher(caller.account_id)
      .await
      .map_err(|e| self.storage("my_offerings", e))
  }

  pub async fn create_offering(
    &self,
    caller: &Caller,
    input: OfferingInput,
  ) -> Result<Offering> {
    caller.require_admin("creating an offering")?;
    let semester = validate_semester(input.semester)?;

    let new_group = self.group_is_new(&input.group).await?;
    let offering = self
      .store
      .create_offering(NewOffering {
        group: input.group,
        subject_id: input.subject_id,
        semester,
        teacher_id: input.teacher_id,
      })
      .await
      .map_err(|e| self.storage("create_offering", e))?;
    if new_group {
      self.emit(PortalEvent::GroupCreated { group: offering.group.clone() });
    }
    Ok(offering)
  }

  /// The offering, provided `caller` teaches it or is an administrator.
  async fn offering_for(&self, caller: &Caller, offering_id: i64) -> Result<Offering> {
    let offering = self
      .store
      .get_offering(offering_id)
      .await
      .map_err(|e| self.storage("get_offering", e))?
      .ok_or_else(|| Error::NotFound(format!("offering {offering_id}")))?;
    if offering.teacher_id != caller.account_id && !caller.is_admin() {
      return Err(Error::Forbidden(format!(
        "offering {offering_id} is taught by another teacher"
      )));
    }
    Ok(offering)
  }

  /// Set a student's grade for an offering, overwriting any earlier value.
  pub async fn record_grade(&self, caller: &Caller, input: GradeInput) -> Result<Grade> {
    let mut grade = NewGrade::parse(
      input.student_id,
      input.offering_id,
      input.value,
      &input.date,
    )?;
    grade.category = input.category;

    self.offering_for(caller, input.offering_id).await?;
    let (grade, outcome) = self
      .store
      .record_grade(grade)
      .await
      .map_err(|e| self.storage("record_grade", e))?;

    let previous = match outcome {
      RecordOutcome::Inserted => None,
      RecordOutcome::Replaced { previous } => Some(previous),
    };
    self.emit(PortalEvent::GradeRecorded {
      student_id: grade.student_id,
      offering_id: grade.offering_id,
      value: grade.value,
      previous,
    });
    Ok(grade)
  }

  pub async fn grades_for_offering(
    &self,
    caller: &Caller,
    offering_id: i64,
  ) -> Result<Vec<Grade>> {
    self.offering_for(caller, offering_id).await?;
    self
      .store
      .grades_for_offering(offering_id)
      .await
      .map_err(|e| self.storage("grades_for_offering", e))
  }

  pub async fn available_semesters(&self, caller: &Caller, student_id: i64) -> Result<Vec<u8>> {
    caller.require_self_or_staff(student_id)?;
    self
      .store
      .semesters_for_student(student_id)
      .await
      .map_err(|e| self.storage("available_semesters", e))
  }

  // ─── Materials ───────────────────────────────────────────────────────────

  /// Store the uploaded file under the material directory and publish it.
  /// The file is removed again if the store rejects the material.
  pub async fn add_material(&self, caller: &Caller, upload: MaterialUpload) -> Result<Material> {
    caller.require_staff("publishing a material")?;
    let file = FileRef::for_upload(&upload.original_name, &upload.contents, Utc::now())?;
    let input = NewMaterial {
      title: upload.title,
      description: upload.description,
      subject_id: upload.subject_id,
      groups: upload.groups,
      author_id: caller.account_id,
      file,
    }
    .validated()?;

    let path = self.material_dir.join(&input.file.path);
    if let Some(parent) = path.parent() {
      tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, &upload.contents).await?;

    let material = match self.store.add_material(input).await {
      Ok(material) => material,
      Err(e) => {
        if let Err(rm) = tokio::fs::remove_file(&path).await {
          tracing::warn!(path = %path.display(), error = %rm, "failed to remove orphaned upload");
        }
        return Err(self.storage("add_material", e));
      }
    };

    self.emit(PortalEvent::MaterialPublished {
      material_id: material.material_id,
      subject_id: material.subject_id,
      groups: material.groups.clone(),
    });
    Ok(material)
  }

  /// Materials the caller uploaded, newest first.
  pub async fn my_materials(&self, caller: &Caller) -> Result<Vec<Material>> {
    caller.require_staff("listing uploaded materials")?;
    self
      .store
      .materials_by_author(caller.account_id)
      .await
      .map_err(|e| self.storage("my_materials", e))
  }

  pub async fn list_materials(&self, caller: &Caller, group: &GroupName) -> Result<Vec<Material>> {
    caller.require_group_access(group)?;
    self
      .store
      .list_materials(group)
      .await
      .map_err(|e| self.storage("list_materials", e))
  }

  // ─── Performance ─────────────────────────────────────────────────────────

  /// A student's performance report. The remote service is asked first when
  /// configured; any failure there falls back to the local computation.
  pub async fn performance(
    &self,
    caller: &Caller,
    student_id: i64,
    semester: Option<i64>,
  ) -> Result<SourcedReport> {
    caller.require_self_or_staff(student_id)?;
    let semester = semester.map(validate_semester).transpose()?;

    if let Some(client) = &self.performance {
      match client.fetch(student_id, semester).await {
        Ok(report) => return Ok(SourcedReport { report, source: ReportSource::Remote }),
        Err(e) => {
          tracing::warn!(student_id, error = %e, "performance service failed, computing locally");
          self.emit(PortalEvent::PerformanceFallback { student_id, reason: e.to_string() });
        }
      }
    }

    let records = self
      .store
      .grade_records(student_id, semester)
      .await
      .map_err(|e| self.storage("performance", e))?;
    Ok(SourcedReport { report: aggregate(&records), source: ReportSource::Local })
  }
}
