//! Output formatting for the inspection commands
//!
//! Every formatter returns either pretty JSON or a comfy-table rendering.

use comfy_table::{Cell, Color, ContentArrangement, Row, Table};
use facadecache_core::{AnyFacade, CacheManager, CacheStats, EntityId, EntityKind};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

/// Everything `project <NAME>` reports
#[derive(Debug)]
pub struct ProjectDetails {
    pub name: String,
    pub id: EntityId,
    pub builds: Vec<EntityId>,
    pub issues: Vec<i64>,
}

fn header(columns: &[&str], no_color: bool) -> Vec<Cell> {
    columns
        .iter()
        .map(|column| {
            let cell = Cell::new(column);
            if no_color {
                cell
            } else {
                cell.fg(Color::Cyan)
            }
        })
        .collect()
}

fn pretty(value: serde_json::Value) -> String {
    serde_json::to_string_pretty(&value).unwrap_or_else(|_| "null".to_string())
}

/// Row counts per table
pub fn format_stats(stats: &CacheStats, json: bool, no_color: bool) -> String {
    if json {
        let rows: serde_json::Map<String, serde_json::Value> = stats
            .rows
            .iter()
            .map(|(kind, count)| (kind.as_str().to_string(), json!(count)))
            .collect();
        return pretty(json!({ "rows": rows, "total": stats.total_rows() }));
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(header(&["Table", "Rows"], no_color));
    for kind in EntityKind::ALL {
        table.add_row(Row::from(vec![
            kind.as_str().to_string(),
            stats.rows_of(kind).to_string(),
        ]));
    }
    table.add_row(Row::from(vec![
        "total".to_string(),
        stats.total_rows().to_string(),
    ]));
    table.to_string()
}

/// Result of a single index lookup
pub fn format_lookup(what: &str, key: &str, id: Option<EntityId>, json: bool) -> String {
    if json {
        let mut value = serde_json::Map::new();
        value.insert(what.to_string(), json!(key));
        value.insert("id".to_string(), json!(id));
        return pretty(serde_json::Value::Object(value));
    }
    match id {
        Some(id) => id.to_string(),
        None => format!("No {} matching '{}'", what, key),
    }
}

pub fn format_project(details: &ProjectDetails, json: bool) -> String {
    if json {
        return pretty(json!({
            "name": details.name,
            "id": details.id,
            "builds": details.builds,
            "issues": details.issues,
        }));
    }

    let builds = join(&details.builds);
    let issues = join(&details.issues);
    format!(
        "Project:  {} (id {})\nBuilds:   {}\nIssues:   {}",
        details.name,
        details.id,
        if builds.is_empty() { "-" } else { builds.as_str() },
        if issues.is_empty() { "-" } else { issues.as_str() },
    )
}

pub fn format_id_list(ids: &[EntityId], json: bool) -> String {
    if json {
        return pretty(json!(ids));
    }
    if ids.is_empty() {
        return "No builds found.".to_string();
    }
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

fn join<T: ToString>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Every cached row of `kind`, ordered by identity
pub fn rows_of(cache: &CacheManager, kind: EntityKind) -> Vec<AnyFacade> {
    fn erase<F: Clone + Into<AnyFacade>>(rows: HashMap<EntityId, Arc<F>>) -> Vec<AnyFacade> {
        rows.into_values().map(|row| (*row).clone().into()).collect()
    }

    let mut rows = match kind {
        EntityKind::User => erase(cache.users()),
        EntityKind::Project => erase(cache.projects()),
        EntityKind::Team => erase(cache.teams()),
        EntityKind::Membership => erase(cache.memberships()),
        EntityKind::Configuration => erase(cache.configurations()),
        EntityKind::Build => erase(cache.builds()),
        EntityKind::Issue => erase(cache.issues()),
    };
    rows.sort_by_key(AnyFacade::id);
    rows
}

/// Columns shown for each kind in table mode
fn columns(kind: EntityKind) -> &'static [&'static str] {
    match kind {
        EntityKind::User => &["ID", "Name", "Email"],
        EntityKind::Project => &["ID", "Name"],
        EntityKind::Team => &["ID", "Project"],
        EntityKind::Membership => &["ID", "User", "Team"],
        EntityKind::Configuration => &["ID", "Project"],
        EntityKind::Build => &["ID", "Configuration", "Commit"],
        EntityKind::Issue => &["ID", "Project", "Number"],
    }
}

fn cells(row: &AnyFacade) -> Vec<String> {
    match row {
        AnyFacade::User(u) => vec![
            u.id.to_string(),
            u.name.clone(),
            u.email.clone().unwrap_or_else(|| "-".to_string()),
        ],
        AnyFacade::Project(p) => vec![p.id.to_string(), p.name.clone()],
        AnyFacade::Team(t) => vec![t.id.to_string(), t.project_id.to_string()],
        AnyFacade::Membership(m) => vec![
            m.id.to_string(),
            m.user_id.to_string(),
            m.team_id.to_string(),
        ],
        AnyFacade::Configuration(c) => vec![c.id.to_string(), c.project_id.to_string()],
        AnyFacade::Build(b) => vec![
            b.id.to_string(),
            b.configuration_id.to_string(),
            b.commit_hash.clone(),
        ],
        AnyFacade::Issue(i) => vec![
            i.id.to_string(),
            i.project_id.to_string(),
            i.number.to_string(),
        ],
    }
}

pub fn format_rows(kind: EntityKind, rows: &[AnyFacade], json: bool, no_color: bool) -> String {
    if json {
        return serde_json::to_string_pretty(rows).unwrap_or_else(|_| "[]".to_string());
    }
    if rows.is_empty() {
        return format!("No {} rows cached.", kind);
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(header(columns(kind), no_color));
    for row in rows {
        table.add_row(Row::from(cells(row)));
    }
    table.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use facadecache_core::models::{BuildFacade, ProjectFacade, UserFacade};
    use facadecache_core::{Snapshot, SnapshotStore};

    fn cache() -> CacheManager {
        let cache = CacheManager::with_defaults();
        cache
            .bootstrap(&SnapshotStore::new(Snapshot {
                users: vec![
                    UserFacade::new(2, "bob", None),
                    UserFacade::new(1, "alice", Some("alice@example.com".to_string())),
                ],
                projects: vec![ProjectFacade::new(10, "core")],
                ..Default::default()
            }))
            .unwrap();
        cache
    }

    #[test]
    fn test_format_stats_json() {
        let output = format_stats(&cache().stats(), true, true);
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["rows"]["user"], 2);
        assert_eq!(value["rows"]["build"], 0);
        assert_eq!(value["total"], 3);
    }

    #[test]
    fn test_format_stats_table_lists_every_kind() {
        let output = format_stats(&cache().stats(), false, true);
        for kind in EntityKind::ALL {
            assert!(output.contains(kind.as_str()));
        }
    }

    #[test]
    fn test_format_lookup_miss() {
        assert_eq!(
            format_lookup("user", "zed", None, false),
            "No user matching 'zed'"
        );
        let output = format_lookup("user", "alice", Some(EntityId::new(1)), true);
        assert!(output.contains("\"id\": 1"));
    }

    #[test]
    fn test_rows_of_sorted_by_id() {
        let rows = rows_of(&cache(), EntityKind::User);
        let ids: Vec<i64> = rows.iter().map(|r| r.id().get()).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_format_rows_json_is_tagged() {
        let rows = vec![AnyFacade::from(BuildFacade::new(5, 7, "abc"))];
        let output = format_rows(EntityKind::Build, &rows, true, true);
        assert!(output.starts_with('['));
        assert!(output.contains("\"kind\": \"build\""));
    }

    #[test]
    fn test_format_rows_empty() {
        let output = format_rows(EntityKind::Issue, &[], false, true);
        assert_eq!(output, "No issue rows cached.");
    }

    #[test]
    fn test_format_project_without_builds() {
        let details = ProjectDetails {
            name: "core".to_string(),
            id: EntityId::new(10),
            builds: Vec::new(),
            issues: vec![1, 2],
        };
        let output = format_project(&details, false);
        assert!(output.contains("Builds:   -"));
        assert!(output.contains("Issues:   1, 2"));
    }
}
