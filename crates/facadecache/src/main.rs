//! facadecache - inspect a facade cache bootstrapped from a store snapshot

mod cli;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facadecache_core::{
    CacheConfig, CacheManager, CommitEvent, CommitListener, EntityKind, ListenerSummary,
    SnapshotStore,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "facadecache",
    version,
    about = "Inspect a facade cache bootstrapped from a store snapshot",
    long_about = "Bootstraps the in-process facade cache from a JSON snapshot of the store,\n\
                  optionally replays a JSON-lines commit log through the commit listener,\n\
                  then answers lookups against the resulting tables.\n\
                  \n\
                  Examples:\n\
                    facadecache --snapshot db.json                     # Row counts (default)\n\
                    facadecache --snapshot db.json user alice          # User id by name\n\
                    facadecache --snapshot db.json project core        # Project id, builds, issues\n\
                    facadecache --snapshot db.json builds --project core --commit abc123\n\
                    facadecache --snapshot db.json --replay commits.jsonl list builds --json\n\
                  \n\
                  Environment Variables:\n\
                    FACADECACHE_SNAPSHOT             # Snapshot path\n\
                    FACADECACHE_CONFIG               # TOML config path\n\
                    FACADECACHE_NO_COLOR             # Disable ANSI colors\n\
                    RUST_LOG                         # Log filter (default: facadecache=info)"
)]
struct Cli {
    #[command(subcommand)]
    mode: Option<Mode>,

    /// JSON snapshot of the store used for bootstrap
    #[arg(long, env = "FACADECACHE_SNAPSHOT")]
    snapshot: PathBuf,

    /// TOML configuration file
    #[arg(long, env = "FACADECACHE_CONFIG")]
    config: Option<PathBuf>,

    /// JSON-lines commit log replayed after bootstrap
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Disable ANSI colors (log-friendly)
    #[arg(long, env = "FACADECACHE_NO_COLOR")]
    no_color: bool,
}

#[derive(Subcommand)]
enum Mode {
    /// Print row counts per table (default)
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Look up a user id by name
    User {
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Look up a user id by email
    Email {
        email: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a project's id, build ids and issue numbers
    Project {
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List build ids of a project, optionally restricted to commit hashes
    Builds {
        /// Project name
        #[arg(long)]
        project: String,
        /// Commit hash to keep (repeatable)
        #[arg(long = "commit")]
        commits: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Dump every cached row of one kind
    List {
        /// user, project, team, membership, configuration, build or issue
        kind: EntityKind,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "facadecache=info,facadecache_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => CacheConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => CacheConfig::default(),
    };

    let cache = start_cache(config, &cli.snapshot, cli.replay.as_deref()).await?;
    let no_color = cli.no_color;

    let output = match cli.mode.unwrap_or(Mode::Stats { json: false }) {
        Mode::Stats { json } => cli::format_stats(&cache.stats(), json, no_color),
        Mode::User { name, json } => {
            cli::format_lookup("user", &name, cache.user_id_by_name(&name), json)
        }
        Mode::Email { email, json } => {
            cli::format_lookup("email", &email, cache.user_id_by_email(&email), json)
        }
        Mode::Project { name, json } => {
            let id = cache
                .project_id_by_name(&name)
                .with_context(|| format!("No project named '{}'", name))?;
            let details = cli::ProjectDetails {
                name,
                id,
                builds: sorted(cache.build_ids_by_project(id)),
                issues: sorted(cache.issue_numbers(id)),
            };
            cli::format_project(&details, json)
        }
        Mode::Builds {
            project,
            commits,
            json,
        } => {
            let id = cache
                .project_id_by_name(&project)
                .with_context(|| format!("No project named '{}'", project))?;
            let builds = if commits.is_empty() {
                cache.build_ids_by_project(id)
            } else {
                cache.filter_build_ids(id, &commits)
            };
            cli::format_id_list(&sorted(builds), json)
        }
        Mode::List { kind, json } => {
            cli::format_rows(kind, &cli::rows_of(&cache, kind), json, no_color)
        }
    };

    println!("{}", output);

    cache.shutdown();
    Ok(())
}

/// Bootstrap through the commit listener, then replay the optional commit log
async fn start_cache(
    config: CacheConfig,
    snapshot: &Path,
    replay: Option<&Path>,
) -> Result<Arc<CacheManager>> {
    let store = SnapshotStore::open(snapshot)
        .with_context(|| format!("Failed to open snapshot {}", snapshot.display()))?;

    let cache = Arc::new(CacheManager::new(config));
    let (sender, handle) = CommitListener::spawn(Arc::clone(&cache), Arc::new(store));

    sender.notify(CommitEvent::SystemStarted).await?;
    if let Some(path) = replay {
        let events = read_commit_log(path).await?;
        info!(events = events.len(), path = %path.display(), "Replaying commit log");
        sender.notify_all(events).await?;
    }
    sender.close();

    let summary: ListenerSummary = handle
        .await
        .context("Commit listener panicked")?
        .context("Commit listener failed")?;

    if summary.dropped > 0 {
        warn!(dropped = summary.dropped, "Some notifications were not applied");
    }
    Ok(cache)
}

/// Parse a JSON-lines commit log; blank lines are skipped
async fn read_commit_log(path: &Path) -> Result<Vec<CommitEvent>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read commit log {}", path.display()))?;

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(number, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("{}:{}: invalid commit event", path.display(), number + 1))
        })
        .collect()
}

fn sorted<T: Ord>(items: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut items: Vec<T> = items.into_iter().collect();
    items.sort();
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const SNAPSHOT: &str = r#"{
        "users": [{"id": 1, "name": "alice", "email": "alice@example.com"}],
        "projects": [{"id": 10, "name": "core"}],
        "configurations": [{"id": 20, "project_id": 10}],
        "builds": [{"id": 200, "configuration_id": 20, "commit_hash": "aaa"}]
    }"#;

    #[test]
    fn test_cli_parses_builds_with_commits() {
        let cli = Cli::try_parse_from([
            "facadecache",
            "--snapshot",
            "db.json",
            "builds",
            "--project",
            "core",
            "--commit",
            "aaa",
            "--commit",
            "bbb",
        ])
        .unwrap();

        match cli.mode {
            Some(Mode::Builds {
                project, commits, ..
            }) => {
                assert_eq!(project, "core");
                assert_eq!(commits, vec!["aaa", "bbb"]);
            }
            _ => panic!("expected builds subcommand"),
        }
    }

    #[test]
    fn test_cli_parses_list_kind() {
        let cli =
            Cli::try_parse_from(["facadecache", "--snapshot", "db.json", "list", "Builds"])
                .unwrap();
        assert!(matches!(
            cli.mode,
            Some(Mode::List {
                kind: EntityKind::Build,
                json: false
            })
        ));

        let err = Cli::try_parse_from(["facadecache", "--snapshot", "db.json", "list", "widgets"]);
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn test_start_cache_replays_commit_log() {
        let dir = TempDir::new().unwrap();
        let snapshot = dir.path().join("db.json");
        fs::write(&snapshot, SNAPSHOT).unwrap();

        let log = dir.path().join("commits.jsonl");
        fs::write(
            &log,
            concat!(
                r#"{"event": "persisted", "entity": {"kind": "build", "id": 201, "configuration_id": 20, "commit_hash": "bbb"}}"#,
                "\n\n",
                r#"{"event": "removed", "kind": "user", "id": 1}"#,
                "\n",
            ),
        )
        .unwrap();

        let cache = start_cache(CacheConfig::default(), &snapshot, Some(&log))
            .await
            .unwrap();

        assert!(cache.is_ready());
        assert_eq!(cache.build_ids_by_project(10).len(), 2);
        assert!(cache.user_id_by_name("alice").is_none());
    }

    #[tokio::test]
    async fn test_invalid_commit_log_line_is_reported() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("commits.jsonl");
        fs::write(&log, "{\"event\": \"exploded\"}\n").unwrap();

        let err = read_commit_log(&log).await.unwrap_err();
        assert!(err.to_string().contains(":1: invalid commit event"));
    }

    #[tokio::test]
    async fn test_missing_snapshot_is_an_error() {
        let dir = TempDir::new().unwrap();
        let result =
            start_cache(CacheConfig::default(), &dir.path().join("absent.json"), None).await;
        assert!(result.is_err());
    }
}
