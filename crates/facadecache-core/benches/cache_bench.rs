//! Cache performance benchmarks for facadecache-core
//!
//! Measures:
//! - Bootstrap of a synthetic snapshot at several sizes
//! - Get-by-id and index lookups on a warm cache
//! - Derived build queries (builds -> configurations join)
//! - Cascading removal of a whole project
//!
//! Run with:
//! ```bash
//! cargo bench --bench cache_bench
//! ```

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use facadecache_core::models::{
    BuildFacade, ConfigurationFacade, IssueFacade, MembershipFacade, ProjectFacade, TeamFacade,
    UserFacade,
};
use facadecache_core::{CacheManager, EntityKind, Snapshot, SnapshotStore};
use std::hint::black_box;
use std::time::Duration;

/// Synthetic snapshot with `projects` projects and proportional dependents
fn synthetic_snapshot(projects: i64) -> Snapshot {
    let mut snapshot = Snapshot::default();
    let users = projects * 5;

    for u in 0..users {
        snapshot.users.push(UserFacade::new(
            u,
            format!("user{u}"),
            Some(format!("user{u}@example.com")),
        ));
    }

    for p in 0..projects {
        snapshot.projects.push(ProjectFacade::new(p, format!("project{p}")));

        let team_id = p;
        snapshot.teams.push(TeamFacade::new(team_id, p));
        for offset in 0..5 {
            let user = (p * 5 + offset) % users;
            snapshot
                .memberships
                .push(MembershipFacade::new(p * 5 + offset, user, team_id));
        }

        for c in 0..4 {
            let configuration_id = p * 4 + c;
            snapshot
                .configurations
                .push(ConfigurationFacade::new(configuration_id, p));
            for b in 0..25 {
                snapshot.builds.push(BuildFacade::new(
                    configuration_id * 25 + b,
                    configuration_id,
                    format!("{:040x}", b),
                ));
            }
        }

        for i in 0..10 {
            snapshot.issues.push(IssueFacade::new(p * 10 + i, p, i + 1));
        }
    }

    snapshot
}

fn warm_cache(projects: i64) -> CacheManager {
    let cache = CacheManager::with_defaults();
    cache
        .bootstrap(&SnapshotStore::new(synthetic_snapshot(projects)))
        .expect("bootstrap");
    cache
}

/// Bootstrap scalability
fn bench_bootstrap_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("bootstrap_scaling");
    group.measurement_time(Duration::from_secs(5));

    for projects in [10i64, 100, 1_000].iter() {
        let store = SnapshotStore::new(synthetic_snapshot(*projects));
        group.bench_with_input(
            BenchmarkId::from_parameter(projects),
            projects,
            |b, _| {
                b.iter(|| {
                    let cache = CacheManager::with_defaults();
                    black_box(cache.bootstrap(&store).expect("bootstrap"))
                });
            },
        );
    }

    group.finish();
}

/// Point reads on a warm cache
fn bench_point_reads(c: &mut Criterion) {
    let mut group = c.benchmark_group("point_reads");
    let cache = warm_cache(1_000);

    group.bench_function("build_by_id", |b| {
        b.iter(|| black_box(cache.build(black_box(12_345))));
    });

    group.bench_function("user_id_by_name", |b| {
        b.iter(|| black_box(cache.user_id_by_name(black_box("user2500"))));
    });

    group.bench_function("project_id_by_name_miss", |b| {
        b.iter(|| black_box(cache.project_id_by_name(black_box("missing"))));
    });

    group.finish();
}

/// Derived queries walk every build row
fn bench_derived_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("derived_queries");
    let cache = warm_cache(100);
    let hashes: Vec<String> = (0..5).map(|b| format!("{:040x}", b)).collect();

    group.bench_function("build_ids_by_project", |b| {
        b.iter(|| black_box(cache.build_ids_by_project(black_box(42))));
    });

    group.bench_function("filter_build_ids", |b| {
        b.iter(|| black_box(cache.filter_build_ids(black_box(42), &hashes)));
    });

    group.bench_function("issue_numbers", |b| {
        b.iter(|| black_box(cache.issue_numbers(black_box(42))));
    });

    group.finish();
}

/// Remove a project and cascade through teams, memberships, configurations, builds, issues
fn bench_cascading_removal(c: &mut Criterion) {
    let mut group = c.benchmark_group("cascading_removal");
    group.sample_size(20);
    let store = SnapshotStore::new(synthetic_snapshot(100));

    group.bench_function("remove_project", |b| {
        b.iter_batched(
            || {
                let cache = CacheManager::with_defaults();
                cache.bootstrap(&store).expect("bootstrap");
                cache
            },
            |cache| black_box(cache.apply_remove(EntityKind::Project, 42)),
            criterion::BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_bootstrap_scaling,
    bench_point_reads,
    bench_derived_queries,
    bench_cascading_removal
);
criterion_main!(benches);
