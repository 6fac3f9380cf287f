#![forbid(unsafe_code)]

mod support;

use support::*;
use tb_core::sync::{SyncState, TrackedField};
use tb_sync::{DecisionChoice, ScriptedDecisions, Strategy, SyncAction};

#[test]
fn push_without_baseline_transfers_and_records_it() {
    let (local, remote) = (FakeLocal::new(), FakeRemote::new());
    let engine = engine(&local, &remote);
    local.insert(task("task-1", "Ship release notes", "In Progress"));
    remote.insert(issue("OPS-1", "Release notes", "To Do"));
    engine.link(&id("task-1"), &key("OPS-1")).expect("link");

    let report = engine.push(&[id("task-1")], false, false);
    assert_eq!(report.synced.len(), 1);
    assert_eq!(report.synced[0].state, SyncState::Unknown);
    assert_eq!(report.synced[0].action, SyncAction::Push);
    let pushed = remote.issue("OPS-1");
    assert_eq!(pushed.summary, "Ship release notes");
    assert_eq!(pushed.status, "In Progress");

    let again = engine.sync_all(&[id("task-1")], Strategy::Prompt, false);
    assert_eq!(again.synced[0].state, SyncState::InSync);
}

#[test]
fn push_on_in_sync_entity_is_a_no_op() {
    let (local, remote) = (FakeLocal::new(), FakeRemote::new());
    let engine = engine(&local, &remote);
    linked_pair(&engine, &local, &remote, "task-1", "OPS-1", "Fix bug", "To Do");
    engine.sync_all(&[id("task-1")], Strategy::Prompt, false);

    let report = engine.push(&[id("task-1")], false, false);
    assert_eq!(report.synced[0].action, SyncAction::Noop);
    assert_eq!(remote.writes(), 0);
}

#[test]
fn push_skips_entities_with_remote_changes() {
    let (local, remote) = (FakeLocal::new(), FakeRemote::new());
    let engine = engine(&local, &remote);
    linked_pair(&engine, &local, &remote, "task-1", "OPS-1", "Fix bug", "To Do");
    engine.sync_all(&[id("task-1")], Strategy::Prompt, false);
    remote.edit("OPS-1", |i| i.summary = "Fix crash".to_string());

    let report = engine.push(&[id("task-1")], false, false);
    assert_eq!(report.skipped.len(), 1);
    assert!(report.skipped[0].reason.contains("pull"));
    assert_eq!(remote.issue("OPS-1").summary, "Fix crash");

    let pulled = engine.pull(&[id("task-1")], false, false);
    assert_eq!(pulled.synced[0].action, SyncAction::Pull);
    assert_eq!(local.task("task-1").title, "Fix crash");
}

#[test]
fn conflict_blocks_push_and_pull_until_forced() {
    let (local, remote) = (FakeLocal::new(), FakeRemote::new());
    let engine = engine(&local, &remote);
    linked_pair(&engine, &local, &remote, "task-1", "OPS-1", "Fix bug", "To Do");
    engine.sync_all(&[id("task-1")], Strategy::Prompt, false);
    local.edit("task-1", |t| t.status = "In Progress".to_string());
    remote.edit("OPS-1", |i| i.status = "Done".to_string());

    for report in [
        engine.push(&[id("task-1")], false, false),
        engine.pull(&[id("task-1")], false, false),
    ] {
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.conflicts[0].fields, vec![TrackedField::Status]);
        assert!(!report.conflicts[0].marked_manual);
        assert!(report.synced.is_empty());
    }
    assert_eq!(local.updates() + remote.writes(), 0);

    let forced = engine.pull(&[id("task-1")], true, false);
    assert_eq!(forced.synced[0].action, SyncAction::Pull);
    assert_eq!(local.task("task-1").status, "Done");
    let again = engine.sync_all(&[id("task-1")], Strategy::Manual, false);
    assert_eq!(again.synced[0].state, SyncState::InSync);
}

#[test]
fn forced_push_overwrites_even_when_in_sync() {
    let (local, remote) = (FakeLocal::new(), FakeRemote::new());
    let engine = engine(&local, &remote);
    linked_pair(&engine, &local, &remote, "task-1", "OPS-1", "Fix bug", "To Do");
    engine.sync_all(&[id("task-1")], Strategy::Prompt, false);

    let report = engine.push(&[id("task-1")], true, false);
    assert_eq!(report.synced[0].action, SyncAction::Push);
    assert_eq!(remote.updates(), 1);
}

#[test]
fn dry_run_push_only_plans() {
    let (local, remote) = (FakeLocal::new(), FakeRemote::new());
    let engine = engine(&local, &remote);
    linked_pair(&engine, &local, &remote, "task-1", "OPS-1", "Fix bug", "To Do");
    engine.sync_all(&[id("task-1")], Strategy::Prompt, false);
    local.edit("task-1", |t| t.priority = Some("Low".to_string()));

    let report = engine.push(&[id("task-1")], false, true);
    assert_eq!(report.planned.len(), 1);
    assert_eq!(report.planned[0].action, SyncAction::Push);
    assert_eq!(remote.writes(), 0);

    let again = engine.sync_all(&[id("task-1")], Strategy::Prompt, true);
    assert_eq!(again.planned[0].state, SyncState::NeedsPush);
}

#[test]
fn missing_transition_fails_the_entity() {
    let (local, remote) = (FakeLocal::new(), FakeRemote::new());
    let engine = engine(&local, &remote);
    linked_pair(&engine, &local, &remote, "task-1", "OPS-1", "Fix bug", "To Do");
    engine.sync_all(&[id("task-1")], Strategy::Prompt, false);
    local.edit("task-1", |t| t.status = "Blocked".to_string());

    let report = engine.push(&[id("task-1")], false, false);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].kind, "transition");
    assert_eq!(report.exit_code(), 1);

    // Baseline untouched: the entity still needs a push.
    let plan = engine.sync_all(&[id("task-1")], Strategy::Prompt, true);
    assert_eq!(plan.planned[0].state, SyncState::NeedsPush);
}

#[test]
fn unreachable_status_leaves_remote_untouched() {
    let (local, remote) = (FakeLocal::new(), FakeRemote::new());
    let engine = engine(&local, &remote);
    linked_pair(&engine, &local, &remote, "task-1", "OPS-1", "Fix login", "To Do");
    engine.sync_all(&[id("task-1")], Strategy::Prompt, false);
    local.edit("task-1", |t| {
        t.title = "Fix login bug".to_string();
        t.status = "Blocked".to_string();
    });

    let report = engine.push(&[id("task-1")], false, false);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].kind, "transition");
    assert_eq!(remote.writes(), 0);
    assert_eq!(remote.issue("OPS-1").summary, "Fix login");

    // Still a plain push: no conflict is manufactured for the next run.
    let manual = engine.sync_all(&[id("task-1")], Strategy::Manual, false);
    assert!(manual.conflicts.is_empty());
    assert_eq!(manual.failed[0].kind, "transition");
    let plan = engine.sync_all(&[id("task-1")], Strategy::Manual, true);
    assert_eq!(plan.planned[0].state, SyncState::NeedsPush);
}

#[test]
fn unreachable_merged_status_writes_neither_side() {
    let (local, remote) = (FakeLocal::new(), FakeRemote::new());
    let engine = engine(&local, &remote).with_decisions(
        ScriptedDecisions::new()
            .choose(TrackedField::Status, DecisionChoice::Local)
            .choose(TrackedField::Title, DecisionChoice::Remote),
    );
    linked_pair(&engine, &local, &remote, "task-1", "OPS-1", "Fix login", "To Do");
    engine.sync_all(&[id("task-1")], Strategy::Prompt, false);
    local.edit("task-1", |t| {
        t.title = "Fix login bug".to_string();
        t.status = "Blocked".to_string();
    });
    remote.edit("OPS-1", |i| {
        i.summary = "Fix login crash".to_string();
        i.status = "Done".to_string();
    });

    let report = engine.sync_all(&[id("task-1")], Strategy::Prompt, false);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].kind, "transition");
    assert_eq!(local.updates() + remote.writes(), 0);
    assert_eq!(local.task("task-1").title, "Fix login bug");
    assert_eq!(remote.issue("OPS-1").summary, "Fix login crash");
}
