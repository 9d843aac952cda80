//! portal administration binary.
//!
//! Reads `portal.toml` (or the path given with `--config`), layers
//! `PORTAL_*` environment variables on top, and runs one operation against
//! the normalized store as the local operator.
//!
//! # Examples
//!
//! ```text
//! portal create-group CS-101
//! echo 'secret1' | portal register alice "Alice Smith" CS-101
//! portal migrate --from legacy.db
//! portal performance --student 1 --semester 2
//! ```

use std::{io::BufRead, path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use portal_core::{account::ContactInfo, group::GroupName};
use portal_service::{
  Caller, Portal,
  config::{PortalConfig, expand_tilde},
  credential::hash_credential,
  events::TracingSink,
  performance::PerformanceClient,
  portal::RegisterRequest,
};
use portal_store_sqlite::{PartitionedStore, SqliteStore, migrate::migrate_partitioned};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Student portal administration")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "portal.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Print the argon2 hash for a password read from stdin.
  HashPassword,
  /// List every registered group.
  Groups,
  /// Register a group (no-op if it exists).
  CreateGroup { name: String },
  /// Register a student account; the password is read from stdin.
  Register {
    login:        String,
    display_name: String,
    group:        String,
    #[arg(long)]
    email:        Option<String>,
    #[arg(long)]
    phone:        Option<String>,
    #[arg(long)]
    city:         Option<String>,
  },
  /// List the members of a group.
  Roster { group: String },
  /// Copy every member of a per-group-table database into accounts.
  Migrate {
    /// The legacy database holding `groups_list` and `group_*` tables.
    #[arg(long)]
    from: PathBuf,
  },
  /// Print a student's performance report as JSON.
  Performance {
    #[arg(long)]
    student:  i64,
    #[arg(long)]
    semester: Option<i64>,
  },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  if let Command::HashPassword = cli.command {
    let password = read_password()?;
    println!("{}", hash_credential(&password)?);
    return Ok(());
  }

  let cfg = PortalConfig::load(&cli.config).context("failed to read config file")?;
  let store = SqliteStore::open(&cfg.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", cfg.store_path))?;

  let mut portal =
    Portal::new(store, Arc::new(TracingSink)).with_material_dir(cfg.material_dir.clone());
  if let Some(settings) = &cfg.performance {
    let client =
      PerformanceClient::new(settings).context("failed to build performance client")?;
    portal = portal.with_performance(client);
  }
  let operator = Caller::operator();

  match cli.command {
    Command::HashPassword => {}
    Command::Groups => {
      for group in portal.list_groups().await? {
        println!("{}\t{}", group.name, group.created_at.to_rfc3339());
      }
    }
    Command::CreateGroup { name } => {
      let group = portal.create_group(&operator, &name).await?;
      println!("{}", group.name);
    }
    Command::Register { login, display_name, group, email, phone, city } => {
      let password = read_password()?;
      let account = portal
        .register(RegisterRequest {
          login,
          password,
          display_name,
          group,
          contact: ContactInfo { email, phone, city, ..Default::default() },
        })
        .await?;
      println!("{}", account.account_id);
    }
    Command::Roster { group } => {
      let group = GroupName::parse(&group)?;
      for member in portal.get_roster(&operator, &group).await? {
        println!("{}\t{}\t{}", member.member_id, member.login, member.display_name);
      }
    }
    Command::Migrate { from } => {
      let from = expand_tilde(&from);
      let legacy = PartitionedStore::open(&from)
        .await
        .with_context(|| format!("failed to open legacy store at {from:?}"))?;
      let report = migrate_partitioned(&legacy, portal.store())
        .await
        .context("migration failed")?;
      for skipped in &report.skipped {
        println!(
          "skipped\t{}\t{}\t{}\t{}",
          skipped.group, skipped.local_id, skipped.login, skipped.reason
        );
      }
      println!("migrated {} members across {} groups", report.migrated.len(), report.groups);
    }
    Command::Performance { student, semester } => {
      let sourced = portal.performance(&operator, student, semester).await?;
      tracing::info!(source = ?sourced.source, "performance report");
      println!("{}", serde_json::to_string_pretty(&sourced.report)?);
    }
  }

  Ok(())
}

/// Read one line from stdin, without its line terminator.
fn read_password() -> anyhow::Result<String> {
  let mut line = String::new();
  std::io::stdin()
    .lock()
    .read_line(&mut line)
    .context("failed to read password from stdin")?;
  Ok(line.trim_end_matches(['\n', '\r']).to_owned())
}
