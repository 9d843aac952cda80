//! `portal.toml` loading.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::performance::PerformanceSettings;

/// Runtime configuration for the portal.
///
/// Keys may be overridden from the environment with a `PORTAL_` prefix and
/// `__` between nested keys, e.g. `PORTAL_PERFORMANCE__URL`.
#[derive(Debug, Clone, Deserialize)]
pub struct PortalConfig {
  pub store_path:   PathBuf,
  /// Root under which uploaded material files are written.
  #[serde(default = "default_material_dir")]
  pub material_dir: PathBuf,
  /// Without this table, performance reports are always computed locally.
  #[serde(default)]
  pub performance:  Option<PerformanceSettings>,
}

fn default_material_dir() -> PathBuf { PathBuf::from("media") }

impl PortalConfig {
  /// Read `path` (which need not exist) and layer the environment on top.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    let mut cfg: Self = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("PORTAL")
          .prefix_separator("_")
          .separator("__"),
      )
      .build()?
      .try_deserialize()?;
    cfg.store_path = expand_tilde(&cfg.store_path);
    cfg.material_dir = expand_tilde(&cfg.material_dir);
    Ok(cfg)
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn write_config(name: &str, body: &str) -> PathBuf {
    let path = std::env::temp_dir()
      .join(format!("portal-config-{}-{name}.toml", std::process::id()));
    std::fs::write(&path, body).unwrap();
    path
  }

  #[test]
  fn reads_nested_performance_table() {
    let path = write_config(
      "nested",
      r#"
        store_path = "/var/lib/portal/portal.db"
        material_dir = "/srv/materials"

        [performance]
        url = "http://127.0.0.1:8081"
        auth_token = "s3cret"
      "#,
    );
    let cfg = PortalConfig::load(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(cfg.store_path, PathBuf::from("/var/lib/portal/portal.db"));
    assert_eq!(cfg.material_dir, PathBuf::from("/srv/materials"));
    let perf = cfg.performance.unwrap();
    assert_eq!(perf.url, "http://127.0.0.1:8081");
    assert_eq!(perf.auth_token, "s3cret");
    assert_eq!(perf.timeout_secs, crate::performance::DEFAULT_TIMEOUT_SECS);
  }

  #[test]
  fn performance_is_optional() {
    let path = write_config("minimal", r#"store_path = "portal.db""#);
    let cfg = PortalConfig::load(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert!(cfg.performance.is_none());
    assert_eq!(cfg.material_dir, PathBuf::from("media"));
  }

  #[test]
  fn tilde_expansion() {
    let Ok(home) = std::env::var("HOME") else { return };
    assert_eq!(
      expand_tilde(Path::new("~/portal.db")),
      PathBuf::from(home).join("portal.db")
    );
    assert_eq!(expand_tilde(Path::new("/abs/x")), PathBuf::from("/abs/x"));
  }
}
