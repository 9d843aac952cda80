//! SQL schemas for both storage designs.
//!
//! Executed once at connection startup. Every statement is idempotent thanks
//! to `IF NOT EXISTS`; future migrations will be gated on `user_version`.

/// Normalized schema: fixed tables, foreign keys, one row per grade pair.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS groups (
    name        TEXT PRIMARY KEY,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS accounts (
    account_id      INTEGER PRIMARY KEY AUTOINCREMENT,
    login           TEXT NOT NULL UNIQUE,
    password_hash   TEXT,            -- NULL: cannot authenticate
    display_name    TEXT NOT NULL,
    role            TEXT NOT NULL DEFAULT 'student',
    group_name      TEXT REFERENCES groups(name),
    email           TEXT,
    phone           TEXT,
    city            TEXT,
    date_of_birth   TEXT,            -- YYYY-MM-DD
    admission_year  INTEGER,
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS subjects (
    subject_id   INTEGER PRIMARY KEY AUTOINCREMENT,
    name         TEXT NOT NULL UNIQUE,
    description  TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS offerings (
    offering_id  INTEGER PRIMARY KEY AUTOINCREMENT,
    group_name   TEXT    NOT NULL REFERENCES groups(name),
    subject_id   INTEGER NOT NULL REFERENCES subjects(subject_id),
    semester     INTEGER NOT NULL CHECK (semester BETWEEN 1 AND 12),
    teacher_id   INTEGER NOT NULL REFERENCES accounts(account_id),
    UNIQUE (group_name, subject_id, semester)
);

-- Current grade only; overwritten in place, no history.
CREATE TABLE IF NOT EXISTS grades (
    grade_id     INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id   INTEGER NOT NULL REFERENCES accounts(account_id),
    offering_id  INTEGER NOT NULL REFERENCES offerings(offering_id),
    value        INTEGER NOT NULL CHECK (value BETWEEN 1 AND 5),
    category     TEXT    NOT NULL DEFAULT 'exam',
    date         TEXT    NOT NULL,   -- YYYY-MM-DD
    recorded_at  TEXT    NOT NULL,
    UNIQUE (student_id, offering_id)
);

CREATE TABLE IF NOT EXISTS materials (
    material_id   INTEGER PRIMARY KEY AUTOINCREMENT,
    title         TEXT    NOT NULL,
    description   TEXT    NOT NULL DEFAULT '',
    subject_id    INTEGER NOT NULL REFERENCES subjects(subject_id),
    author_id     INTEGER NOT NULL REFERENCES accounts(account_id),
    file_path     TEXT    NOT NULL,
    content_hash  TEXT    NOT NULL,
    extension     TEXT    NOT NULL,
    uploaded_at   TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS material_groups (
    material_id  INTEGER NOT NULL REFERENCES materials(material_id),
    group_name   TEXT    NOT NULL REFERENCES groups(name),
    PRIMARY KEY (material_id, group_name)
);

CREATE INDEX IF NOT EXISTS accounts_group_idx       ON accounts(group_name, display_name);
CREATE UNIQUE INDEX IF NOT EXISTS accounts_email_idx ON accounts(email);  -- NULLs never collide
CREATE INDEX IF NOT EXISTS offerings_teacher_idx    ON offerings(teacher_id);
CREATE INDEX IF NOT EXISTS grades_offering_idx      ON grades(offering_id);
CREATE INDEX IF NOT EXISTS materials_author_idx     ON materials(author_id);
CREATE INDEX IF NOT EXISTS material_groups_group_idx ON material_groups(group_name);

PRAGMA user_version = 1;
";

/// Partitioned schema: only the directory is fixed. Roster tables are
/// provisioned per group by [`roster_table_ddl`].
pub const DIRECTORY_SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS groups_list (
    group_name  TEXT PRIMARY KEY,
    table_name  TEXT NOT NULL UNIQUE,
    created_at  TEXT NOT NULL
);
";

/// Columns added to roster tables after their first revision. Tables
/// created before a column existed are brought up to date on open.
pub const ROSTER_ADDED_COLUMNS: &[(&str, &str)] = &[
  ("email", "TEXT"),
  ("phone", "TEXT"),
  ("city", "TEXT"),
  ("date_of_birth", "TEXT"),
  ("admission_year", "INTEGER"),
];

/// DDL for one group's roster table. `table` must already have passed
/// [`crate::partitioned::is_roster_table_name`].
pub fn roster_table_ddl(table: &str) -> String {
  format!(
    "CREATE TABLE IF NOT EXISTS \"{table}\" (
        member_id       INTEGER PRIMARY KEY AUTOINCREMENT,
        login           TEXT NOT NULL,
        display_name    TEXT NOT NULL,
        email           TEXT,
        phone           TEXT,
        city            TEXT,
        date_of_birth   TEXT,
        admission_year  INTEGER
    )"
  )
}
