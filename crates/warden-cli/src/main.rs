//! warden command-line interface
//!
//! Administers and queries a warden RBAC store from the shell.
//!
//! # Usage
//!
//! ```bash
//! # Check a permission; exits 2 when denied
//! warden can User:1 publish
//!
//! # Reconcile state from snapshot files, removing anything extra
//! warden sync --roles roles.json --permissions permissions.json \
//!     --mappings mappings.json --prune
//!
//! # With a config file
//! warden --config warden.yaml status
//! ```

mod config;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::info;

use warden_domain::{
    register_decision_cache_metrics, EngineConfig, ExportFilter, RbacEngine, Subject, SyncOptions,
    TenantScope,
};
use warden_storage::{
    MemoryRbacStore, PostgresConfig, PostgresRbacStore, RbacStore, DEFAULT_SUBJECT_KIND,
};

use crate::config::WardenConfig;
use crate::logging::{init_logging, parse_log_level};

/// warden - Tenant-scoped RBAC administration
#[derive(Parser, Debug)]
#[command(name = "warden")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Guard to operate on; defaults to the configured default guard
    #[arg(short, long, global = true)]
    guard: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a role, or report the existing one
    CreateRole {
        name: String,
        #[command(flatten)]
        tenant: TenantArgs,
    },
    /// Create a permission, or report the existing one
    CreatePermission { name: String },
    /// Attach a permission to a role, creating either end as needed
    Grant {
        role: String,
        permission: String,
        #[command(flatten)]
        tenant: TenantArgs,
    },
    /// Detach a permission from a role
    Revoke {
        role: String,
        permission: String,
        #[command(flatten)]
        tenant: TenantArgs,
    },
    /// Assign a role to a subject (subject is [kind:]id, e.g. User:42)
    AssignRole {
        subject: String,
        role: String,
        #[command(flatten)]
        tenant: TenantArgs,
    },
    /// Remove a role from a subject
    RemoveRole {
        subject: String,
        role: String,
        #[command(flatten)]
        tenant: TenantArgs,
    },
    /// Check whether a subject is authorized; exits 2 when denied
    Can {
        subject: String,
        permission: String,
        #[command(flatten)]
        tenant: TenantArgs,
    },
    /// Reconcile persisted state from three snapshot files
    Sync {
        /// Path to the role array document
        #[arg(long)]
        roles: PathBuf,
        /// Path to the permission array document
        #[arg(long)]
        permissions: PathBuf,
        /// Path to the mappings document
        #[arg(long)]
        mappings: PathBuf,
        /// Enable every prune flag
        #[arg(long)]
        prune: bool,
        /// Prune roles absent from the snapshot
        #[arg(long)]
        prune_roles: bool,
        /// Prune permissions absent from the snapshot
        #[arg(long)]
        prune_permissions: bool,
        /// Prune role-permission edges absent from the snapshot
        #[arg(long)]
        prune_role_permissions: bool,
        /// Prune subject-role edges absent from the snapshot
        #[arg(long)]
        prune_model_roles: bool,
        /// Prune direct grants absent from the snapshot
        #[arg(long)]
        prune_model_permissions: bool,
        /// Report what would change without writing anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Dump the full RBAC state as a JSON snapshot
    Export {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Probe the storage backend and report its health
    Status,
}

/// Tenant scope selection for scope-aware commands.
#[derive(Args, Debug, Default)]
struct TenantArgs {
    /// Owning entity type, e.g. Org
    #[arg(long, requires = "tenant_id")]
    tenant_type: Option<String>,

    /// Owning entity id
    #[arg(long, requires = "tenant_type")]
    tenant_id: Option<i64>,
}

impl TenantArgs {
    fn scope(&self) -> TenantScope {
        match (&self.tenant_type, self.tenant_id) {
            (Some(kind), Some(id)) => TenantScope::of(kind, id),
            _ => TenantScope::global(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => WardenConfig::load(path)?,
        None => WardenConfig::from_env()?,
    };

    init_logging(parse_log_level(&config.logging.level), config.logging.json);
    register_decision_cache_metrics();

    match config.storage.backend.as_str() {
        "memory" => {
            info!("Using in-memory storage backend");
            let engine = build_engine(MemoryRbacStore::new_shared(), &config);
            run(engine, cli).await
        }
        "postgres" => {
            let database_url = config.storage.database_url.as_ref().ok_or_else(|| {
                anyhow::anyhow!("storage.database_url is required for the postgres backend")
            })?;

            info!("Connecting to PostgreSQL");
            let pg_config = PostgresConfig {
                database_url: database_url.clone(),
                max_connections: config.storage.pool_size,
                min_connections: 1,
                connect_timeout_secs: config.storage.connection_timeout_secs,
                ..PostgresConfig::default()
            };
            let store = PostgresRbacStore::from_config(&pg_config).await?;
            store.run_migrations().await?;

            let engine = build_engine(Arc::new(store), &config);
            run(engine, cli).await
        }
        other => anyhow::bail!("unknown storage backend: {other}"),
    }
}

fn build_engine<S: RbacStore>(store: Arc<S>, config: &WardenConfig) -> RbacEngine<S> {
    let mut engine_config = EngineConfig::default().with_default_guard(&config.rbac.default_guard);
    if let Some(role) = &config.rbac.super_admin_role {
        engine_config = engine_config.with_super_admin_role(role);
    }

    let engine = RbacEngine::with_config(store, engine_config);
    if config.cache.enabled {
        engine.enable_cache(Duration::from_secs(config.cache.ttl_secs));
    }
    engine
}

async fn run<S: RbacStore>(engine: RbacEngine<S>, cli: Cli) -> anyhow::Result<ExitCode> {
    let guard_flag = cli.guard;
    let guard = guard_flag
        .clone()
        .unwrap_or_else(|| engine.default_guard().to_string());

    match cli.command {
        Command::CreateRole { name, tenant } => {
            let role = engine.find_or_create_role(&name, &guard, &tenant.scope()).await?;
            println!("role {} (id {}, guard {})", role.name, role.id, role.guard_name);
        }
        Command::CreatePermission { name } => {
            let permission = engine.find_or_create_permission(&name, &guard).await?;
            println!(
                "permission {} (id {}, guard {})",
                permission.name, permission.id, permission.guard_name
            );
        }
        Command::Grant {
            role,
            permission,
            tenant,
        } => {
            engine
                .give_permission_to_role(&role, &permission, &guard, &tenant.scope())
                .await?;
            println!("granted {permission} to {role}");
        }
        Command::Revoke {
            role,
            permission,
            tenant,
        } => {
            engine
                .revoke_permission_from_role(&role, &permission, &guard, &tenant.scope())
                .await?;
            println!("revoked {permission} from {role}");
        }
        Command::AssignRole {
            subject,
            role,
            tenant,
        } => {
            let subject = parse_subject(&subject)?;
            engine.assign_role(&subject, &role, &guard, &tenant.scope()).await?;
            println!("assigned {role} to {subject}");
        }
        Command::RemoveRole {
            subject,
            role,
            tenant,
        } => {
            let subject = parse_subject(&subject)?;
            engine.remove_role(&subject, &role, &guard, &tenant.scope()).await?;
            println!("removed {role} from {subject}");
        }
        Command::Can {
            subject,
            permission,
            tenant,
        } => {
            let subject = parse_subject(&subject)?;
            let allowed = engine
                .authorize(&subject, &permission, &guard, &tenant.scope())
                .await?;
            if allowed {
                println!("allowed");
            } else {
                println!("denied");
                return Ok(ExitCode::from(2));
            }
        }
        Command::Sync {
            roles,
            permissions,
            mappings,
            prune,
            prune_roles,
            prune_permissions,
            prune_role_permissions,
            prune_model_roles,
            prune_model_permissions,
            dry_run,
        } => {
            let mut options = if prune {
                SyncOptions::prune_all()
            } else {
                SyncOptions::default()
            };
            options.prune_extra_roles |= prune_roles;
            options.prune_extra_permissions |= prune_permissions;
            options.prune_extra_role_permissions |= prune_role_permissions;
            options.prune_extra_model_roles |= prune_model_roles;
            options.prune_extra_model_permissions |= prune_model_permissions;
            options.dry_run = dry_run;

            let report = engine
                .sync_from_files(&roles, &permissions, &mappings, options)
                .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Export { output } => {
            let filter = match guard_flag {
                Some(guard) => ExportFilter::guard(guard),
                None => ExportFilter::default(),
            };
            let snapshot = engine.export_state(&filter).await?;
            let json = serde_json::to_string_pretty(&snapshot)?;
            match output {
                Some(path) => {
                    tokio::fs::write(&path, json)
                        .await
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    info!(path = %path.display(), "state exported");
                }
                None => println!("{json}"),
            }
        }
        Command::Status => {
            let status = engine.store().health_check().await?;
            println!(
                "backend {} ({} in {:?})",
                status.message.as_deref().unwrap_or("unknown"),
                if status.healthy { "healthy" } else { "unhealthy" },
                status.latency
            );
            if let Some(pool) = status.pool_stats {
                println!(
                    "pool {}/{} active, {} idle",
                    pool.active_connections, pool.max_connections, pool.idle_connections
                );
            }
            if !status.healthy {
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Parses a subject reference. `User:42` names the kind explicitly; a bare
/// id such as `42` uses the default subject kind.
fn parse_subject(raw: &str) -> anyhow::Result<Subject> {
    let (kind, id) = match raw.split_once(':') {
        Some((kind, id)) => (kind.trim(), id),
        None => (DEFAULT_SUBJECT_KIND, raw),
    };
    if kind.is_empty() {
        anyhow::bail!("subject must be [kind:]id, e.g. User:42");
    }
    let id: i64 = id
        .trim()
        .parse()
        .with_context(|| format!("invalid subject id in {raw:?}"))?;
    Ok(Subject::new(kind, id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_subject() {
        assert_eq!(parse_subject("User:42").unwrap(), Subject::new("User", 42));
        assert_eq!(parse_subject(" Team : 7 ").unwrap(), Subject::new("Team", 7));
        assert_eq!(parse_subject("42").unwrap(), Subject::user(42));
        assert!(parse_subject("User").is_err());
        assert!(parse_subject(":42").is_err());
        assert!(parse_subject("User:abc").is_err());
    }

    #[test]
    fn test_cli_args_parsing() {
        let cli = Cli::try_parse_from(["warden", "can", "User:1", "publish"]).unwrap();
        assert!(cli.config.is_none());
        assert!(cli.guard.is_none());
        assert!(matches!(cli.command, Command::Can { .. }));

        let cli = Cli::try_parse_from([
            "warden", "--config", "warden.yaml", "--guard", "api", "grant", "editor", "publish",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("warden.yaml")));
        assert_eq!(cli.guard.as_deref(), Some("api"));
        assert!(matches!(cli.command, Command::Grant { .. }));
    }

    #[test]
    fn test_tenant_args_require_both_halves() {
        let result =
            Cli::try_parse_from(["warden", "create-role", "admin", "--tenant-type", "Org"]);
        assert!(result.is_err());

        let cli = Cli::try_parse_from([
            "warden",
            "create-role",
            "admin",
            "--tenant-type",
            "Org",
            "--tenant-id",
            "7",
        ])
        .unwrap();
        match cli.command {
            Command::CreateRole { tenant, .. } => {
                assert_eq!(tenant.scope(), TenantScope::of("Org", 7));
            }
            other => panic!("unexpected command: {other:?}"),
        }

        // Without tenant flags the scope is global.
        assert_eq!(TenantArgs::default().scope(), TenantScope::global());
    }

    #[test]
    fn test_sync_flags() {
        let cli = Cli::try_parse_from([
            "warden",
            "sync",
            "--roles",
            "r.json",
            "--permissions",
            "p.json",
            "--mappings",
            "m.json",
            "--prune",
            "--dry-run",
        ])
        .unwrap();
        match cli.command {
            Command::Sync { prune, dry_run, prune_roles, .. } => {
                assert!(prune);
                assert!(dry_run);
                assert!(!prune_roles);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
