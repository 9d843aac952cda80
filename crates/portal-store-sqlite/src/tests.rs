//! Integration tests for both stores against in-memory databases.

use chrono::Utc;
use portal_core::{
  Classify, ErrorKind,
  account::{ContactInfo, NewAccount, ProfileUpdate, Role},
  grade::{GradeValue, NewGrade, NewOffering, NewSubject, RecordOutcome},
  group::GroupName,
  material::{FileRef, NewMaterial},
  roster::{MemberFields, NewMember},
  store::{AccountStore, GradeLedger, GroupDirectory, MaterialStore, RosterStore},
};

use crate::{
  Error, PartitionedStore, SqliteStore,
  migrate::migrate_partitioned,
  partitioned::{is_roster_table_name, roster_table_name},
};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

async fn partitioned() -> PartitionedStore {
  PartitionedStore::open_in_memory()
    .await
    .expect("in-memory partitioned store")
}

fn group(name: &str) -> GroupName { GroupName::parse(name).unwrap() }

// ─── Roster behaviour shared by both designs ─────────────────────────────────

async fn roster_contract<S: RosterStore>(s: &S) {
  let cs = group("CS-101");
  assert!(!s.group_exists(&cs).await.unwrap());
  assert!(s.list_members(&cs).await.unwrap().is_empty());

  let created = s.create_group(cs.clone()).await.unwrap();
  let again = s.create_group(cs.clone()).await.unwrap();
  assert_eq!(created, again, "create_group is idempotent");
  assert!(s.group_exists(&cs).await.unwrap());

  let bob = s.add_member(cs.clone(), NewMember::new("bob", "Bob")).await.unwrap();
  let alice = s
    .add_member(cs.clone(), NewMember::new("alice", " Alice "))
    .await
    .unwrap();
  assert_eq!(alice.display_name, "Alice");
  assert_eq!(alice.group, cs);

  let names: Vec<_> = s
    .list_members(&cs)
    .await
    .unwrap()
    .into_iter()
    .map(|m| m.display_name)
    .collect();
  assert_eq!(names, ["Alice", "Bob"]);

  // Adding to an unknown group registers it.
  let math = group("MATH-1");
  s.add_member(math.clone(), NewMember::new("carol", "Carol"))
    .await
    .unwrap();
  assert!(s.group_exists(&math).await.unwrap());
  let groups: Vec<_> = s
    .list_groups()
    .await
    .unwrap()
    .into_iter()
    .map(|g| g.name)
    .collect();
  assert_eq!(groups, [cs.clone(), math.clone()]);

  let found = s.find_member(bob.member_id, Some(&cs)).await.unwrap();
  assert_eq!(found.as_ref().map(|m| m.login.as_str()), Some("bob"));

  let updated = s
    .update_member(bob.member_id, cs.clone(), MemberFields {
      display_name: "Robert".into(),
      contact:      ContactInfo {
        city: Some("Omsk".into()),
        ..Default::default()
      },
    })
    .await
    .unwrap();
  assert_eq!(updated.display_name, "Robert");
  assert_eq!(updated.contact.city.as_deref(), Some("Omsk"));
  assert_eq!(
    s.find_member(bob.member_id, Some(&cs)).await.unwrap(),
    Some(updated)
  );

  let err = s
    .update_member(9999, cs.clone(), MemberFields {
      display_name: "Nobody".into(),
      contact:      ContactInfo::default(),
    })
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);

  let err = s
    .add_member(cs.clone(), NewMember {
      contact: ContactInfo { phone: Some("nope".into()), ..Default::default() },
      ..NewMember::new("dave", "Dave")
    })
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn normalized_roster_contract() { roster_contract(&store().await).await; }

#[tokio::test]
async fn partitioned_roster_contract() {
  roster_contract(&partitioned().await).await;
}

// ─── Accounts ────────────────────────────────────────────────────────────────

fn student(login: &str, group_name: &str) -> NewAccount {
  NewAccount::student(login, Some("hash".into()), login.to_uppercase(), group(group_name))
}

#[tokio::test]
async fn duplicate_login_is_a_conflict() {
  let s = store().await;
  s.create_account(student("alice", "CS-101")).await.unwrap();

  let err = s.create_account(student(" alice", "CS-102")).await.unwrap_err();
  assert!(matches!(err, Error::LoginTaken(ref l) if l == "alice"));
  assert_eq!(err.kind(), ErrorKind::Conflict);

  // The failed insert must not have registered its group.
  assert!(!s.group_exists(&group("CS-102")).await.unwrap());
}

#[tokio::test]
async fn credential_lookup_trims_login() {
  let s = store().await;
  let account = s.create_account(student("alice", "CS-101")).await.unwrap();

  let cred = s.find_credential("  alice ").await.unwrap().unwrap();
  assert_eq!(cred.account, account);
  assert_eq!(cred.password_hash.as_deref(), Some("hash"));
  assert!(s.find_credential("mallory").await.unwrap().is_none());

  s.set_credential(account.account_id, "other".into()).await.unwrap();
  let cred = s.find_credential("alice").await.unwrap().unwrap();
  assert_eq!(cred.password_hash.as_deref(), Some("other"));

  let err = s.set_credential(42, "x".into()).await.unwrap_err();
  assert!(matches!(err, Error::AccountNotFound(42)));
}

#[tokio::test]
async fn profile_update_is_partial() {
  let s = store().await;
  let mut input = student("alice", "CS-101");
  input.contact = ContactInfo {
    email: Some("alice@example.com".into()),
    phone: Some("+79991234567".into()),
    ..Default::default()
  };
  let account = s.create_account(input).await.unwrap();

  let updated = s
    .update_profile(account.account_id, ProfileUpdate {
      city: Some("X".into()),
      group: Some(group("CS-202")),
      ..Default::default()
    }, None)
    .await
    .unwrap();
  assert_eq!(updated.contact.city.as_deref(), Some("X"));
  assert_eq!(updated.contact.email, account.contact.email);
  assert_eq!(updated.contact.phone, account.contact.phone);
  assert_eq!(updated.group, Some(group("CS-202")));
  assert!(s.group_exists(&group("CS-202")).await.unwrap());

  let stored = s.get_account(account.account_id).await.unwrap().unwrap();
  assert_eq!(stored, updated);
}

#[tokio::test]
async fn profile_update_for_missing_account() {
  let s = store().await;
  let err = s
    .update_profile(7, ProfileUpdate {
      city: Some("X".into()),
      ..Default::default()
    }, None)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::AccountNotFound(7)));
  assert!(s.get_account(7).await.unwrap().is_none());
}

#[tokio::test]
async fn profile_update_can_replace_credential() {
  let s = store().await;
  let account = s.create_account(student("alice", "CS-101")).await.unwrap();

  s.update_profile(account.account_id, ProfileUpdate::default(), Some("new-hash".into()))
    .await
    .unwrap();
  let cred = s.find_credential("alice").await.unwrap().unwrap();
  assert_eq!(cred.password_hash.as_deref(), Some("new-hash"));

  // A rejected profile change leaves the credential alone.
  let err = s
    .update_profile(account.account_id, ProfileUpdate {
      group: Some(group("CS-202")),
      email: Some("not-an-email".into()),
      ..Default::default()
    }, Some("other-hash".into()))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Validation);
  let cred = s.find_credential("alice").await.unwrap().unwrap();
  assert_eq!(cred.password_hash.as_deref(), Some("new-hash"));
  assert_eq!(cred.account.group, Some(group("CS-101")));
}

fn with_email(login: &str, email: &str) -> NewAccount {
  let mut input = student(login, "CS-101");
  input.contact.email = Some(email.into());
  input
}

#[tokio::test]
async fn emails_are_unique() {
  let s = store().await;
  let alice = s
    .create_account(with_email("alice", "alice@example.com"))
    .await
    .unwrap();
  let bob = s.create_account(student("bob", "CS-101")).await.unwrap();
  // Accounts without an email never collide.
  s.create_account(student("carol", "CS-101")).await.unwrap();

  let err = s
    .create_account(with_email("alice2", "alice@example.com"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::EmailTaken(ref e) if e == "alice@example.com"));
  assert_eq!(err.kind(), ErrorKind::Conflict);
  assert!(s.find_credential("alice2").await.unwrap().is_none());

  let taken = ProfileUpdate {
    email: Some("alice@example.com".into()),
    ..Default::default()
  };
  let err = s
    .update_profile(bob.account_id, taken.clone(), Some("bob-hash".into()))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::EmailTaken(_)));
  let cred = s.find_credential("bob").await.unwrap().unwrap();
  assert_eq!(cred.account.contact.email, None);
  assert_eq!(cred.password_hash.as_deref(), Some("hash"));

  // Re-saving one's own address is fine.
  s.update_profile(alice.account_id, taken, None).await.unwrap();
}

// ─── Grades ──────────────────────────────────────────────────────────────────

struct Fixture {
  store:    SqliteStore,
  teacher:  i64,
  student:  i64,
  offering: i64,
}

async fn fixture() -> Fixture {
  let s = store().await;
  let teacher = s
    .create_account(NewAccount {
      role: Role::Teacher,
      group: None,
      ..student("tnov", "CS-101")
    })
    .await
    .unwrap();
  let alice = s.create_account(student("alice", "CS-101")).await.unwrap();
  let math = s.create_subject(NewSubject::new("Math")).await.unwrap();
  let offering = s
    .create_offering(NewOffering {
      group:      group("CS-101"),
      subject_id: math.subject_id,
      semester:   1,
      teacher_id: teacher.account_id,
    })
    .await
    .unwrap();
  Fixture {
    store: s,
    teacher: teacher.account_id,
    student: alice.account_id,
    offering: offering.offering_id,
  }
}

#[tokio::test]
async fn grade_upsert_keeps_one_row() {
  let f = fixture().await;
  let s = &f.store;

  let (first, outcome) = s
    .record_grade(NewGrade::parse(f.student, f.offering, 4, "2024-01-15").unwrap())
    .await
    .unwrap();
  assert_eq!(outcome, RecordOutcome::Inserted);

  let (second, outcome) = s
    .record_grade(NewGrade::parse(f.student, f.offering, 5, "2024-01-20").unwrap())
    .await
    .unwrap();
  assert_eq!(outcome, RecordOutcome::Replaced {
    previous: GradeValue::new(4).unwrap(),
  });
  assert_eq!(second.grade_id, first.grade_id);

  let grades = s.grades_for_offering(f.offering).await.unwrap();
  assert_eq!(grades.len(), 1);
  assert_eq!(grades[0].value.get(), 5);
  assert_eq!(grades[0].date.to_string(), "2024-01-20");
}

#[tokio::test]
async fn grade_requires_group_membership() {
  let f = fixture().await;
  let outsider = f
    .store
    .create_account(student("bob", "CS-999"))
    .await
    .unwrap();
  let err = f
    .store
    .record_grade(NewGrade::parse(outsider.account_id, f.offering, 3, "2024-01-15").unwrap())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NotInGroup { .. }));

  let err = f
    .store
    .record_grade(NewGrade::parse(f.student, 999, 3, "2024-01-15").unwrap())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::OfferingNotFound(999)));
}

#[tokio::test]
async fn only_students_receive_grades() {
  let f = fixture().await;
  let s = &f.store;

  let err = s
    .record_grade(NewGrade::parse(f.teacher, f.offering, 5, "2024-01-15").unwrap())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NotAStudent(id) if id == f.teacher));
  assert_eq!(err.kind(), ErrorKind::Validation);

  // Staff belonging to the offering's group are still not gradable.
  let tutor = s
    .create_account(NewAccount { role: Role::Teacher, ..student("tutor", "CS-101") })
    .await
    .unwrap();
  let physics = s.create_subject(NewSubject::new("Physics")).await.unwrap();
  let own = s
    .create_offering(NewOffering {
      group:      group("CS-101"),
      subject_id: physics.subject_id,
      semester:   1,
      teacher_id: tutor.account_id,
    })
    .await
    .unwrap();
  let err = s
    .record_grade(NewGrade::parse(tutor.account_id, own.offering_id, 5, "2024-01-15").unwrap())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NotAStudent(_)));

  assert!(s.grades_for_offering(f.offering).await.unwrap().is_empty());
  assert!(s.grades_for_offering(own.offering_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn offerings_reject_non_teachers_and_duplicates() {
  let f = fixture().await;
  let s = &f.store;
  let physics = s.create_subject(NewSubject::new("Physics")).await.unwrap();

  let err = s
    .create_offering(NewOffering {
      group:      group("CS-101"),
      subject_id: physics.subject_id,
      semester:   1,
      teacher_id: f.student,
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NotATeacher(_)));

  let math_again = NewOffering {
    group:      group("CS-101"),
    subject_id: 1,
    semester:   1,
    teacher_id: f.teacher,
  };
  let err = s.create_offering(math_again).await.unwrap_err();
  assert!(matches!(err, Error::DuplicateOffering { semester: 1, .. }));

  let err = s
    .create_subject(NewSubject::new("Physics"))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Conflict);

  assert_eq!(s.offerings_for_teacher(f.teacher).await.unwrap().len(), 1);
}

#[tokio::test]
async fn grade_records_join_and_filter_by_semester() {
  let f = fixture().await;
  let s = &f.store;
  let physics = s.create_subject(NewSubject::new("Physics")).await.unwrap();
  let second = s
    .create_offering(NewOffering {
      group:      group("CS-101"),
      subject_id: physics.subject_id,
      semester:   2,
      teacher_id: f.teacher,
    })
    .await
    .unwrap();

  s.record_grade(NewGrade::parse(f.student, second.offering_id, 3, "2024-06-01").unwrap())
    .await
    .unwrap();
  s.record_grade(NewGrade::parse(f.student, f.offering, 5, "2024-01-15").unwrap())
    .await
    .unwrap();

  let all = s.grade_records(f.student, None).await.unwrap();
  let summary: Vec<_> = all
    .iter()
    .map(|r| (r.semester, r.subject.as_str(), r.value.get()))
    .collect();
  assert_eq!(summary, [(1, "Math", 5), (2, "Physics", 3)]);
  assert_eq!(all[0].teacher, "TNOV");

  let second_only = s.grade_records(f.student, Some(2)).await.unwrap();
  assert_eq!(second_only.len(), 1);
  assert_eq!(second_only[0].subject, "Physics");

  assert_eq!(s.semesters_for_student(f.student).await.unwrap(), [1, 2]);
  assert!(s.semesters_for_student(f.teacher).await.unwrap().is_empty());
}

// ─── Materials ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn materials_are_visible_to_each_listed_group() {
  let f = fixture().await;
  let s = &f.store;
  let file = FileRef::for_upload("notes.txt", b"notes", Utc::now()).unwrap();
  let material = s
    .add_material(NewMaterial {
      title:       "Lecture 1".into(),
      description: String::new(),
      subject_id:  1,
      groups:      vec![group("CS-102"), group("CS-101"), group("CS-101")],
      author_id:   f.teacher,
      file:        file.clone(),
    })
    .await
    .unwrap();
  assert_eq!(material.groups, [group("CS-101"), group("CS-102")]);

  for name in ["CS-101", "CS-102"] {
    let listed = s.list_materials(&group(name)).await.unwrap();
    assert_eq!(listed, [material.clone()], "{name}");
  }
  assert!(s.list_materials(&group("CS-999")).await.unwrap().is_empty());
  assert_eq!(s.materials_by_author(f.teacher).await.unwrap().len(), 1);

  let err = s
    .add_material(NewMaterial {
      title:       "Orphan".into(),
      description: String::new(),
      subject_id:  1,
      groups:      Vec::new(),
      author_id:   f.teacher,
      file,
    })
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Validation);
}

// ─── Partitioned layout ──────────────────────────────────────────────────────

#[test]
fn table_names_are_safe_and_distinct() {
  let plain = roster_table_name(&group("cs101"));
  assert_eq!(plain, "group_cs101");

  let names = ["a_b", "a-b", "A-B", "a b", "группа", "x\"; DROP TABLE groups_list; --"];
  let tables: Vec<_> = names.iter().map(|n| roster_table_name(&group(n))).collect();
  for t in &tables {
    assert!(is_roster_table_name(t), "{t}");
  }
  let mut unique = tables.clone();
  unique.sort();
  unique.dedup();
  assert_eq!(unique.len(), tables.len());

  assert!(!is_roster_table_name("groups_list"));
  assert!(!is_roster_table_name("group_x\"--"));
}

#[tokio::test]
async fn hostile_group_name_is_just_data() {
  let s = partitioned().await;
  let hostile = group("x\"; DROP TABLE groups_list; --");
  s.create_group(hostile.clone()).await.unwrap();
  s.add_member(hostile.clone(), NewMember::new("eve", "Eve"))
    .await
    .unwrap();

  let groups = s.list_groups().await.unwrap();
  assert_eq!(groups.len(), 1);
  assert_eq!(groups[0].name, hostile);
  assert_eq!(s.list_members(&hostile).await.unwrap()[0].login, "eve");
}

#[tokio::test]
async fn unhinted_lookup_reports_ambiguity() {
  let s = partitioned().await;
  let a = s.add_member(group("A"), NewMember::new("ann", "Ann")).await.unwrap();
  let b = s.add_member(group("B"), NewMember::new("ben", "Ben")).await.unwrap();
  assert_eq!(a.member_id, b.member_id, "ids are per-table counters");

  let err = s.find_member(a.member_id, None).await.unwrap_err();
  match err {
    Error::AmbiguousMember { groups, .. } => {
      assert_eq!(groups, [group("A"), group("B")]);
    }
    other => panic!("unexpected error: {other}"),
  }

  let found = s.find_member(a.member_id, Some(&group("B"))).await.unwrap();
  assert_eq!(found.map(|m| m.login), Some("ben".to_owned()));
  assert!(s.find_member(a.member_id, Some(&group("C"))).await.unwrap().is_none());
  assert!(s.find_member(99, None).await.unwrap().is_none());
}

#[tokio::test]
async fn legacy_tables_gain_missing_columns() {
  let s = partitioned().await;
  s.conn
    .call(|conn| {
      conn.execute_batch(
        "CREATE TABLE group_old (
           member_id INTEGER PRIMARY KEY AUTOINCREMENT,
           login TEXT NOT NULL,
           display_name TEXT NOT NULL
         );
         INSERT INTO group_old (login, display_name) VALUES ('olga', 'Olga');
         INSERT INTO groups_list (group_name, table_name, created_at)
           VALUES ('old', 'group_old', '2020-09-01T00:00:00Z');",
      )?;
      Ok(())
    })
    .await
    .unwrap();

  assert_eq!(s.upgrade_roster_tables().await.unwrap(), 5);
  assert_eq!(s.upgrade_roster_tables().await.unwrap(), 0);

  let members = s.list_members(&group("old")).await.unwrap();
  assert_eq!(members.len(), 1);
  assert_eq!(members[0].contact, ContactInfo::default());

  s.add_member(group("old"), NewMember {
    contact: ContactInfo { city: Some("Tomsk".into()), ..Default::default() },
    ..NewMember::new("oleg", "Oleg")
  })
  .await
  .unwrap();
  assert_eq!(s.list_members(&group("old")).await.unwrap().len(), 2);
}

#[tokio::test]
async fn tampered_directory_entry_is_refused() {
  let s = partitioned().await;
  s.conn
    .call(|conn| {
      conn.execute(
        "INSERT INTO groups_list (group_name, table_name, created_at)
         VALUES ('bad', 'groups_list', '2020-09-01T00:00:00Z')",
        [],
      )?;
      Ok(())
    })
    .await
    .unwrap();

  let err = s.list_members(&group("bad")).await.unwrap_err();
  assert!(matches!(err, Error::UnsafeTableName(_)));
  assert_eq!(err.kind(), ErrorKind::Persistence);
}

// ─── Migration ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn migration_maps_members_and_is_idempotent() {
  let legacy = partitioned().await;
  let a = legacy
    .add_member(group("CS-101"), NewMember::new("alice", "Alice"))
    .await
    .unwrap();
  let b = legacy
    .add_member(group("CS-102"), NewMember::new("bob", "Bob"))
    .await
    .unwrap();
  legacy
    .add_member(group("CS-102"), NewMember::new("taken", "Taken"))
    .await
    .unwrap();
  legacy.create_group(group("EMPTY")).await.unwrap();

  let target = store().await;
  target.create_account(student("taken", "STAFF")).await.unwrap();

  let report = migrate_partitioned(&legacy, &target).await.unwrap();
  assert_eq!(report.groups, 3);
  assert_eq!(report.migrated.len(), 2);
  assert_eq!(report.skipped.len(), 1);
  assert_eq!(report.skipped[0].login, "taken");

  let alice_id = report.account_for(&group("CS-101"), a.member_id).unwrap();
  let bob_id = report.account_for(&group("CS-102"), b.member_id).unwrap();
  assert_ne!(alice_id, bob_id);

  let alice = target.find_credential("alice").await.unwrap().unwrap();
  assert_eq!(alice.account.account_id, alice_id);
  assert_eq!(alice.account.group, Some(group("CS-101")));
  assert!(alice.password_hash.is_none());
  assert!(target.group_exists(&group("EMPTY")).await.unwrap());

  let again = migrate_partitioned(&legacy, &target).await.unwrap();
  assert!(again.migrated.is_empty());
  assert_eq!(again.skipped.len(), 3);
  assert_eq!(target.list_members(&group("CS-102")).await.unwrap().len(), 1);
}
