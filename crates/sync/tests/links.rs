#![forbid(unsafe_code)]

mod support;

use support::*;
use tb_core::AcceptanceCriterion;
use tb_core::sync::SyncState;
use tb_storage::SqliteStore;
use tb_sync::{CollaboratorError, Strategy, SyncAction, SyncConfig, SyncEngine, SyncError};

#[test]
fn link_requires_both_records_and_is_one_to_one() {
    let (local, remote) = (FakeLocal::new(), FakeRemote::new());
    let engine = engine(&local, &remote);
    local.insert(task("task-1", "Fix bug", "To Do"));
    local.insert(task("task-2", "Other", "To Do"));
    remote.insert(issue("OPS-1", "Fix bug", "To Do"));
    remote.insert(issue("OPS-2", "Other", "To Do"));

    let err = engine.link(&id("task-1"), &key("OPS-404")).expect_err("missing issue");
    assert!(err.is_not_found());
    let err = engine.link(&id("task-404"), &key("OPS-1")).expect_err("missing task");
    assert!(err.is_not_found());

    engine.link(&id("task-1"), &key("OPS-1")).expect("link");
    engine.link(&id("task-1"), &key("OPS-1")).expect("relink is idempotent");
    match engine.link(&id("task-2"), &key("OPS-1")) {
        Err(SyncError::Conflict(_)) => {}
        other => panic!("expected conflict, got {other:?}"),
    }
    match engine.link(&id("task-1"), &key("OPS-2")) {
        Err(SyncError::Conflict(_)) => {}
        other => panic!("expected conflict, got {other:?}"),
    }
    assert_eq!(engine.mapped_ids().expect("mapped"), vec![id("task-1")]);
}

#[test]
fn unlink_forgets_baseline() {
    let (local, remote) = (FakeLocal::new(), FakeRemote::new());
    let engine = engine(&local, &remote);
    linked_pair(&engine, &local, &remote, "task-1", "OPS-1", "Fix bug", "To Do");
    engine.sync_all(&[id("task-1")], Strategy::Prompt, false);

    let row = engine.unlink(&id("task-1")).expect("unlink");
    assert_eq!(row.remote_key, key("OPS-1"));
    assert!(engine.unlink(&id("task-1")).expect_err("twice").is_not_found());
    assert!(
        !engine
            .with_store(|store| store.baseline_get(&id("task-1")))
            .expect("baseline")
            .is_complete()
    );

    // Relinking starts over from an unknown state.
    engine.link(&id("task-1"), &key("OPS-1")).expect("relink");
    let report = engine.sync_all(&[id("task-1")], Strategy::Prompt, false);
    assert_eq!(report.synced[0].state, SyncState::Unknown);
}

#[test]
fn create_remote_creates_links_and_baselines() {
    let (local, remote) = (FakeLocal::new(), FakeRemote::new());
    let engine = engine(&local, &remote);
    let mut new_task = task("task-1", "Add dark mode", "In Progress");
    new_task.labels = vec!["ui".to_string(), "ui".to_string()];
    new_task.assignee = Some("@dana".to_string());
    new_task.acceptance_criteria = vec![AcceptanceCriterion {
        index: 1,
        text: "Toggle in settings".to_string(),
        checked: false,
    }];
    local.insert(new_task);

    let created = engine.create_remote(&id("task-1")).expect("create remote");
    assert_eq!(created.key.project(), "OPS");
    assert_eq!(created.summary, "Add dark mode");
    assert_eq!(created.status, "In Progress");
    assert_eq!(created.issue_type, "Task");
    assert_eq!(created.assignee.as_deref(), Some("dana"));
    assert_eq!(created.labels, vec!["ui".to_string()]);
    assert!(
        created
            .description
            .as_deref()
            .is_some_and(|d| d.contains("- [ ] #1 Toggle in settings"))
    );
    assert_eq!(remote.creates(), 1);
    assert_eq!(remote.transitions(), 1);

    let report = engine.sync_all(&[id("task-1")], Strategy::Prompt, false);
    assert_eq!(report.synced[0].state, SyncState::InSync);

    match engine.create_remote(&id("task-1")) {
        Err(SyncError::Conflict(_)) => {}
        other => panic!("expected conflict, got {other:?}"),
    }
    assert_eq!(remote.creates(), 1);
}

#[test]
fn import_remote_creates_a_local_task() {
    let (local, remote) = (FakeLocal::new(), FakeRemote::new());
    let engine = engine(&local, &remote);
    let mut existing = issue("OPS-7", "Rotate keys", "Done");
    existing.priority = Some("High".to_string());
    remote.insert(existing);

    let local_id = engine.import_remote(&key("OPS-7")).expect("import");
    let created = local.task(local_id.as_str());
    assert_eq!(created.title, "Rotate keys");
    assert_eq!(created.status, "Done");
    assert_eq!(created.priority.as_deref(), Some("High"));
    assert_eq!(local.creates(), 1);

    let report = engine.sync_all(&[local_id.clone()], Strategy::Prompt, false);
    assert_eq!(report.synced[0].state, SyncState::InSync);
    assert!(matches!(
        engine.import_remote(&key("OPS-7")),
        Err(SyncError::Conflict(_))
    ));
}

#[test]
fn discover_links_unique_title_matches_only() {
    let (local, remote) = (FakeLocal::new(), FakeRemote::new());
    let engine = engine(&local, &remote);
    local.insert(task("task-1", "Fix  login", "To Do"));
    local.insert(task("task-2", "Duplicate", "To Do"));
    local.insert(task("task-3", "Duplicate", "To Do"));
    local.insert(task("task-4", "No counterpart", "To Do"));
    local.insert(task("task-5", "Already linked", "To Do"));
    remote.insert(issue("OPS-1", "Fix login", "To Do"));
    remote.insert(issue("OPS-2", "Duplicate", "To Do"));
    remote.insert(issue("OPS-3", "Already linked", "To Do"));
    remote.insert(issue("OPS-4", "Already linked", "To Do"));
    remote.insert(issue("WEB-1", "No counterpart", "To Do"));
    engine.link(&id("task-5"), &key("OPS-3")).expect("link");

    let links = engine.discover().expect("discover");
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].local_id, id("task-1"));
    assert_eq!(links[0].remote_key, key("OPS-1"));
    assert_eq!(
        engine.mapped_ids().expect("mapped"),
        vec![id("task-1"), id("task-5")]
    );
    assert!(engine.discover().expect("rerun").is_empty());
}

#[test]
fn linked_view_composes_remote_metadata() {
    let (local, remote) = (FakeLocal::new(), FakeRemote::new());
    let engine = engine(&local, &remote);
    linked_pair(&engine, &local, &remote, "task-1", "OPS-1", "Fix bug", "To Do");
    local.insert(task("task-2", "Solo", "To Do"));
    engine.sync_all(&[id("task-1")], Strategy::Prompt, false);
    remote.edit("OPS-1", |i| i.status = "Done".to_string());

    let view = engine.linked_view(&id("task-1")).expect("view");
    assert!(view.is_linked());
    let link = view.remote.as_ref().expect("remote link");
    assert_eq!(link.key, key("OPS-1"));
    assert_eq!(link.status, "Done");
    assert_eq!(link.issue_type, "Task");
    assert_eq!(view.state, Some(SyncState::NeedsPull));
    assert_eq!(view.task.status, "To Do");

    let solo = engine.linked_view(&id("task-2")).expect("view");
    assert!(!solo.is_linked());
    assert_eq!(solo.state, None);
}

#[test]
fn status_map_translates_between_vocabularies() {
    let (local, remote) = (FakeLocal::new(), FakeRemote::new());
    remote.set_workflow(&["Open", "In Development", "Closed"]);
    let config = SyncConfig::from_yaml_str(
        concat!(
            "project_key: OPS\nstatus_map:\n",
            "  - {local: To Do, remote: Open}\n",
            "  - {local: In Progress, remote: In Development}\n",
            "  - {local: Done, remote: Closed}\n",
        ),
    )
    .expect("config");
    let engine = engine_with(config, &local, &remote);
    local.insert(task("task-1", "Fix bug", "To Do"));
    remote.insert(issue("OPS-1", "Fix bug", "Open"));
    engine.link(&id("task-1"), &key("OPS-1")).expect("link");

    let first = engine.sync_all(&[id("task-1")], Strategy::Prompt, false);
    assert_eq!(first.synced[0].action, SyncAction::Baseline);

    local.edit("task-1", |t| t.status = "In Progress".to_string());
    engine.sync_all(&[id("task-1")], Strategy::Prompt, false);
    assert_eq!(remote.issue("OPS-1").status, "In Development");

    remote.edit("OPS-1", |i| i.status = "Closed".to_string());
    engine.sync_all(&[id("task-1")], Strategy::Prompt, false);
    assert_eq!(local.task("task-1").status, "Done");
}

#[test]
fn invalid_config_aborts_before_any_entity() {
    let (local, remote) = (FakeLocal::new(), FakeRemote::new());
    let store = SqliteStore::open_in_memory().expect("open store");
    let err = SyncEngine::new(SyncConfig::default(), store, local.clone(), remote.clone())
        .err()
        .expect("missing project key");
    assert_eq!(err.kind(), "validation");
    assert_eq!(local.updates() + remote.writes(), 0);
}

#[test]
fn remote_outage_surfaces_from_mapping_operations() {
    let (local, remote) = (FakeLocal::new(), FakeRemote::new());
    let engine = engine(&local, &remote);
    local.insert(task("task-1", "Fix bug", "To Do"));
    remote.set_outage(Some(CollaboratorError::unavailable("connection refused")));

    let err = engine.create_remote(&id("task-1")).expect_err("outage");
    assert_eq!(err.kind(), "remote_unavailable");
    assert!(engine.mapped_ids().expect("mapped").is_empty());
}
