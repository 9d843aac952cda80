//! Study materials: files published for a subject to one or more groups.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{Error, Result, group::GroupName};

/// File extensions accepted for uploads.
pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "docx", "txt"];

/// A stored file; no binary data lives in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
  /// Path relative to the configured material directory.
  pub path:         String,
  /// SHA-256 hex digest of the file contents.
  pub content_hash: String,
  pub extension:    String,
}

impl FileRef {
  /// Build the reference for a fresh upload.
  ///
  /// The stored name is random so that two uploads with the same original
  /// name never collide; the directory is dated like
  /// `study_materials/2024/01/15/`.
  pub fn for_upload(
    original_name: &str,
    contents: &[u8],
    at: DateTime<Utc>,
  ) -> Result<Self> {
    let extension = extension_of(original_name)?;
    let content_hash = hex::encode(Sha256::digest(contents));
    let path = format!(
      "study_materials/{}/{}.{extension}",
      at.format("%Y/%m/%d"),
      Uuid::new_v4().simple(),
    );
    Ok(Self { path, content_hash, extension })
  }
}

fn extension_of(name: &str) -> Result<String> {
  let ext = name
    .rsplit_once('.')
    .map(|(_, ext)| ext.to_ascii_lowercase())
    .ok_or_else(|| Error::UnsupportedFileType(name.to_owned()))?;
  if ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
    Ok(ext)
  } else {
    Err(Error::UnsupportedFileType(name.to_owned()))
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Material {
  pub material_id: i64,
  pub title:       String,
  pub description: String,
  pub subject_id:  i64,
  /// Sorted by name.
  pub groups:      Vec<GroupName>,
  pub author_id:   i64,
  pub file:        FileRef,
  pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMaterial {
  pub title:       String,
  pub description: String,
  pub subject_id:  i64,
  pub groups:      Vec<GroupName>,
  pub author_id:   i64,
  pub file:        FileRef,
}

impl NewMaterial {
  pub fn validated(mut self) -> Result<Self> {
    if self.groups.is_empty() {
      return Err(Error::NoMaterialGroups);
    }
    self.groups.sort();
    self.groups.dedup();
    self.title = self.title.trim().to_owned();
    Ok(self)
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn upload_reference_is_dated_and_hashed() {
    let at = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
    let file = FileRef::for_upload("Lecture 1.PDF", b"hello", at).unwrap();

    assert_eq!(file.extension, "pdf");
    assert!(file.path.starts_with("study_materials/2024/01/15/"));
    assert!(file.path.ends_with(".pdf"));
    assert_eq!(
      file.content_hash,
      "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
    );
  }

  #[test]
  fn rejects_unknown_extensions() {
    let at = Utc::now();
    for name in ["virus.exe", "noext", "archive.tar.gz"] {
      assert!(matches!(
        FileRef::for_upload(name, b"", at),
        Err(Error::UnsupportedFileType(_))
      ));
    }
  }

  #[test]
  fn material_requires_a_group() {
    let m = NewMaterial {
      title:       "Notes".into(),
      description: String::new(),
      subject_id:  1,
      groups:      vec![],
      author_id:   1,
      file:        FileRef::for_upload("a.txt", b"x", Utc::now()).unwrap(),
    };
    assert!(matches!(m.validated(), Err(Error::NoMaterialGroups)));
  }
}
