//! End-to-end tests: webhook events are routed and the resulting actions
//! run against in-memory repositories.
//!
//! Key scenarios tested:
//! - A production push publishes to sgc-production and rebases staging
//! - Editor commits flow back with JSON and never delete
//! - Commits created by a sync do not trigger another sync
//! - Repeated syncs are no-ops without writes
//! - Cross-repository transfers upload each distinct blob once
//! - A destination that moved mid-sync is merged instead of overwritten

use std::collections::BTreeMap;

use themesync::store::StoreError;
use themesync::store::memory::{MemoryStore, StoreOp};
use themesync::sync::{
    DEFAULT_COMMIT_MARKER, RebaseOutcome, SyncOptions, SyncResult, SyncStatus,
    rebase_onto_latest, sync_branch,
};
use themesync::webhook::{Action, PushEvent, RepositoryRef, RoutingConfig, WebhookEvent, route_event};
use themesync::{BatchConfig, Branch, SyncScope};

fn base_options() -> SyncOptions {
    SyncOptions {
        batch: BatchConfig::immediate(),
        ..SyncOptions::default()
    }
}

fn push(branch: Branch, message: &str) -> WebhookEvent {
    WebhookEvent::Push(PushEvent {
        repository: RepositoryRef {
            owner: "acme".to_string(),
            name: "theme".to_string(),
        },
        installation_id: Some(1),
        git_ref: format!("refs/heads/{branch}"),
        after: "0000000".to_string(),
        deleted: false,
        head_commit_message: Some(message.to_string()),
    })
}

#[derive(Debug, Default)]
struct Applied {
    syncs: Vec<SyncResult>,
    rebases: Vec<RebaseOutcome>,
}

/// Run routed actions in order, the way the server's dispatcher does.
async fn apply(store: &MemoryStore, actions: &[Action]) -> Applied {
    let mut applied = Applied::default();
    for action in actions {
        match action {
            Action::Sync(sync) => {
                let options = sync.options(&base_options());
                let result = sync_branch(
                    store,
                    sync.source.as_str(),
                    store,
                    sync.destination.as_str(),
                    &options,
                    None,
                )
                .await
                .unwrap();
                applied.syncs.push(result);
            }
            Action::Rebase {
                branch,
                onto,
                strategy,
            } => {
                let outcome = rebase_onto_latest(
                    store,
                    branch.as_str(),
                    onto.as_str(),
                    *strategy,
                    DEFAULT_COMMIT_MARKER,
                    None,
                )
                .await
                .unwrap();
                applied.rebases.push(outcome);
            }
            other => panic!("unexpected action {other:?}"),
        }
    }
    applied
}

/// Every branch starts at one shared commit.
fn theme_repository() -> MemoryStore {
    let store = MemoryStore::new("acme/theme");
    let base = store.commit_files(
        "production",
        &[
            ("README.md", "readme"),
            ("assets/theme.css", "body {}"),
            ("config/settings_schema.json", "[1]"),
            ("config/settings_data.json", "{\"current\":1}"),
            ("sections/header.liquid", "<header>"),
            ("templates/index.json", "{\"sections\":1}"),
        ],
        "initial theme",
    );
    for branch in ["staging", "sgc-production", "sgc-staging"] {
        store.set_branch(branch, &base);
    }
    store
}

fn paths(files: &BTreeMap<String, String>) -> Vec<&str> {
    files.keys().map(String::as_str).collect()
}

#[tokio::test]
async fn production_push_publishes_code_and_rebases_staging() {
    let store = theme_repository();
    store.commit_changes(
        "sgc-production",
        &[("templates/index.json", Some("{\"sections\":\"editor\"}"))],
        "Update from Shopify",
    );
    store.commit_changes("staging", &[("assets/wip.js", Some("wip"))], "work in progress");
    let production = store.commit_changes(
        "production",
        &[
            ("assets/theme.css", Some("body { margin: 0 }")),
            ("snippets/price.liquid", Some("{{ price }}")),
            ("sections/header.liquid", None),
            ("config/settings_schema.json", Some("[2]")),
            ("templates/index.json", Some("{\"sections\":\"developer\"}")),
            ("README.md", Some("readme v2")),
        ],
        "Redesign header",
    );

    let actions = route_event(
        &push(Branch::Production, "Redesign header"),
        &RoutingConfig::default(),
    );
    let applied = apply(&store, &actions).await;

    let sync = &applied.syncs[0];
    assert_eq!(sync.status, SyncStatus::Committed);
    assert_eq!((sync.added, sync.updated, sync.deleted), (1, 2, 1));

    let files = store.branch_files("sgc-production");
    assert_eq!(
        paths(&files),
        vec![
            "README.md",
            "assets/theme.css",
            "config/settings_data.json",
            "config/settings_schema.json",
            "snippets/price.liquid",
            "templates/index.json",
        ]
    );
    assert_eq!(files["assets/theme.css"], "body { margin: 0 }");
    assert_eq!(files["config/settings_schema.json"], "[2]");
    // Editor-owned JSON and files outside the theme are left alone.
    assert_eq!(files["templates/index.json"], "{\"sections\":\"editor\"}");
    assert_eq!(files["README.md"], "readme");

    let rebase = &applied.rebases[0];
    assert!(rebase.rebased);
    let head = store.commit(&store.branch_head("staging").unwrap()).unwrap();
    assert_eq!(head.parents, vec![production]);
    assert!(head.message.starts_with(DEFAULT_COMMIT_MARKER));
    assert_eq!(store.branch_files("staging"), store.branch_files("production"));
}

#[tokio::test]
async fn staging_push_publishes_without_rebasing() {
    let store = theme_repository();
    store.commit_changes("staging", &[("blocks/promo.liquid", Some("promo"))], "Add promo");

    let actions = route_event(&push(Branch::Staging, "Add promo"), &RoutingConfig::default());
    let applied = apply(&store, &actions).await;

    assert_eq!(applied.syncs.len(), 1);
    assert!(applied.rebases.is_empty());
    assert_eq!(store.branch_files("sgc-staging")["blocks/promo.liquid"], "promo");
    assert!(!store.branch_files("sgc-production").contains_key("blocks/promo.liquid"));
}

#[tokio::test]
async fn editor_changes_flow_back_without_deletes() {
    let store = theme_repository();
    store.commit_changes(
        "sgc-production",
        &[
            ("config/settings_data.json", Some("{\"current\":2}")),
            ("sections/header.liquid", None),
        ],
        "Update from Shopify for theme acme/production",
    );

    let actions = route_event(
        &push(Branch::SgcProduction, "Update from Shopify for theme acme/production"),
        &RoutingConfig::default(),
    );
    let applied = apply(&store, &actions).await;

    assert_eq!(applied.syncs[0].destination, "production");
    assert_eq!(applied.syncs[0].deleted, 0);
    let files = store.branch_files("production");
    assert_eq!(files["config/settings_data.json"], "{\"current\":2}");
    assert_eq!(files["sections/header.liquid"], "<header>");
}

#[tokio::test]
async fn sync_commits_do_not_trigger_another_sync() {
    let store = theme_repository();
    store.commit_changes("production", &[("assets/theme.css", Some("v2"))], "Tweak");

    let applied = apply(
        &store,
        &route_event(&push(Branch::Production, "Tweak"), &RoutingConfig::default()),
    )
    .await;
    let sync_commit = store
        .commit(applied.syncs[0].commit_sha.as_deref().unwrap())
        .unwrap();

    let echo = route_event(
        &push(Branch::SgcProduction, &sync_commit.message),
        &RoutingConfig::default(),
    );
    assert!(echo.is_empty());
}

#[tokio::test]
async fn second_run_is_a_no_op_without_writes() {
    let store = theme_repository();
    store.commit_changes("production", &[("assets/theme.css", Some("v2"))], "Tweak");
    let actions = route_event(&push(Branch::Production, "Tweak"), &RoutingConfig::default());
    let sync_only: Vec<Action> = actions
        .into_iter()
        .filter(|a| matches!(a, Action::Sync(_)))
        .collect();

    let first = apply(&store, &sync_only).await;
    assert_eq!(first.syncs[0].status, SyncStatus::Committed);

    store.reset_calls();
    let head = store.branch_head("sgc-production");
    let second = apply(&store, &sync_only).await;

    assert!(second.syncs[0].is_noop());
    assert_eq!(store.mutation_calls(), 0);
    assert_eq!(store.branch_head("sgc-production"), head);
}

#[tokio::test]
async fn identical_content_is_uploaded_once_across_repositories() {
    let source = MemoryStore::new("acme/theme");
    let destination = MemoryStore::new("acme/theme-mirror");
    source.commit_files(
        "production",
        &[
            ("assets/a.svg", "<svg/>"),
            ("assets/b.svg", "<svg/>"),
            ("snippets/icon.liquid", "<svg/>"),
            ("snippets/other.liquid", "other"),
        ],
        "icons",
    );
    destination.commit_files("sgc-production", &[("snippets/other.liquid", "other")], "seed");

    let result = sync_branch(
        &source,
        "production",
        &destination,
        "sgc-production",
        &base_options(),
        None,
    )
    .await
    .unwrap();

    assert_eq!(result.added, 3);
    assert_eq!(result.blobs_transferred, 1);
    assert_eq!(destination.calls(StoreOp::CreateBlob), 1);
    assert_eq!(source.calls(StoreOp::GetBlob), 1);
    assert_eq!(destination.branch_files("sgc-production")["assets/b.svg"], "<svg/>");
}

#[tokio::test]
async fn destination_moved_during_sync_is_merged() {
    let store = theme_repository();
    store.commit_changes("production", &[("assets/theme.css", Some("v2"))], "Tweak");
    store.fail_next(
        StoreOp::UpdateRef,
        StoreError::api(422, "Update is not a fast forward"),
    );

    let options = SyncOptions {
        scope: SyncScope::theme_without_json(),
        allow_deletes: true,
        shared_objects: true,
        ..base_options()
    };
    let result = sync_branch(&store, "production", &store, "sgc-production", &options, None)
        .await
        .unwrap();

    assert_eq!(result.status, SyncStatus::FallbackMerged);
    assert_eq!(result.updated, 1);
    let merge = store.commit(result.commit_sha.as_deref().unwrap()).unwrap();
    assert_eq!(merge.parents.len(), 2);
    assert_eq!(store.branch_files("sgc-production")["assets/theme.css"], "v2");
}
