//! Integration cycles against real git repositories.

mod common;

use std::sync::Arc;

use common::{git, GitFixture};
use pretested::adapters::git::GitCliGateway;
use pretested::adapters::memory::InMemoryJobStateRepository;
use pretested::domain::models::{BuildVerdict, CommitId, JobConfig, StrategyKind};
use pretested::domain::ports::VcsGateway;
use pretested::{IntegrationController, IntegrationError};
use tokio_test::{assert_err, assert_ok};

const TRICKY_MESSAGE: &str = "Fix \"quoted\" and 'single' handling\n\nSecond paragraph with `ticks` and $HOME\n- bullet";

fn controller(fixture: &GitFixture, configure: impl FnOnce(&mut JobConfig)) -> IntegrationController {
    common::setup_test_logging();
    let mut config = JobConfig::new("core", fixture.workspace.display().to_string());
    configure(&mut config);
    let vcs = Arc::new(GitCliGateway::new(&fixture.workspace, "origin"));
    IntegrationController::new(&config, vcs, Arc::new(InMemoryJobStateRepository::new()))
}

async fn integrate(controller: &mut IntegrationController) {
    let start = assert_ok!(controller.on_build_start().await);
    assert!(start.proceed);
    let completion = assert_ok!(controller.on_build_complete(BuildVerdict::Success).await);
    assert!(completion.result.integrated);
}

#[tokio::test]
async fn test_squash_single_commit_keeps_message_verbatim() {
    let fixture = GitFixture::new();
    let base = fixture.head("master").unwrap();
    fixture.push_commit("ready", "bob", TRICKY_MESSAGE, &[("x.txt", "x\n")]);

    let mut controller = controller(&fixture, |_| {});
    integrate(&mut controller).await;

    let target = fixture.head("master").unwrap();
    assert_eq!(fixture.log_since("master", &base).len(), 1);
    assert_eq!(fixture.message(&target), TRICKY_MESSAGE);
    assert_eq!(fixture.author(&target), "bob <bob@example.com>");
    assert_eq!(fixture.file_at(&target, "x.txt"), "x");
}

#[tokio::test]
async fn test_squash_range_attributes_last_author() {
    let fixture = GitFixture::new();
    let base = fixture.head("master").unwrap();
    let x = fixture.push_commit("ready", "bob", "add x", &[("x.txt", "x\n")]);
    fixture.push_commit("ready", "carol", TRICKY_MESSAGE, &[("y.txt", "y\n")]);

    let mut controller = controller(&fixture, |_| {});
    integrate(&mut controller).await;

    let target = fixture.head("master").unwrap();
    assert_eq!(fixture.log_since("master", &base).len(), 1);
    assert_eq!(fixture.author(&target), "carol <carol@example.com>");

    let message = fixture.message(&target);
    assert!(message.starts_with("Squashed commit of the following:"));
    assert!(message.contains(&format!("commit {x}")));
    assert!(message.contains("    Fix \"quoted\" and 'single' handling"));
    assert!(message.find("add x").unwrap() < message.find("Fix \"quoted\"").unwrap());
}

#[tokio::test]
async fn test_accumulate_preserves_each_commit() {
    let fixture = GitFixture::new();
    let base = fixture.head("master").unwrap();
    let sources = [
        fixture.push_commit("ready", "bob", "first 'one'", &[("a.txt", "a\n")]),
        fixture.push_commit("ready", "carol", TRICKY_MESSAGE, &[("b.txt", "b\n")]),
        fixture.push_commit("ready", "dave", "third \"three\"", &[("c.txt", "c\n")]),
    ];

    let mut controller = controller(&fixture, |c| c.strategy = StrategyKind::Accumulate);
    integrate(&mut controller).await;

    let replayed = fixture.log_since("master", &base);
    assert_eq!(replayed.len(), 3);
    for (new, source) in replayed.iter().zip(&sources) {
        assert_ne!(new, source);
        assert_eq!(fixture.message(new), fixture.message(source));
        assert_eq!(fixture.author(new), fixture.author(source));
    }
}

#[tokio::test]
async fn test_fast_forward_publishes_ready_head() {
    let fixture = GitFixture::new();
    fixture.push_commit("ready", "bob", "add x", &[("x.txt", "x\n")]);
    let y = fixture.push_commit("ready", "carol", "add y", &[("y.txt", "y\n")]);

    let mut controller = controller(&fixture, |c| c.strategy = StrategyKind::FastForward);
    integrate(&mut controller).await;

    assert_eq!(fixture.head("master"), Some(y));
}

#[tokio::test]
async fn test_accumulate_replays_merge_against_first_parent() {
    let fixture = GitFixture::new();
    let base = fixture.head("master").unwrap();
    let dev = &fixture.developer;
    git(dev, &["fetch", "--quiet", "origin"]);
    git(dev, &["checkout", "--quiet", "-B", "ready", "origin/ready"]);
    git(dev, &["checkout", "--quiet", "-b", "feature"]);
    std::fs::write(dev.join("feature.txt"), "f\n").unwrap();
    git(dev, &["add", "feature.txt"]);
    git(dev, &["commit", "--quiet", "-m", "feature work"]);
    git(dev, &["checkout", "--quiet", "ready"]);
    std::fs::write(dev.join("ready.txt"), "r\n").unwrap();
    git(dev, &["add", "ready.txt"]);
    git(dev, &["commit", "--quiet", "-m", "ready work"]);
    git(dev, &["merge", "--quiet", "--no-ff", "feature", "-m", "Merge feature"]);
    git(dev, &["push", "--quiet", "origin", "ready"]);

    let mut controller = controller(&fixture, |c| c.strategy = StrategyKind::Accumulate);
    let pending = assert_ok!(controller.pending_candidates().await);
    assert_eq!(pending.len(), 3);
    integrate(&mut controller).await;

    let replayed = fixture.log_since("master", &base);
    assert_eq!(replayed.len(), 2);
    let target = fixture.head("master").unwrap();
    assert_eq!(fixture.file_at(&target, "feature.txt"), "f");
    assert_eq!(fixture.file_at(&target, "ready.txt"), "r");
    assert_eq!(fixture.message(&target), "Merge feature");
}

#[tokio::test]
async fn test_concurrent_push_to_target_is_rejected() {
    let fixture = GitFixture::new();
    fixture.push_commit("ready", "bob", "add x", &[("x.txt", "x\n")]);

    let mut controller = controller(&fixture, |_| {});
    assert!(assert_ok!(controller.on_build_start().await).proceed);
    let hotfix = fixture.push_commit("master", "alice", "hotfix", &[("hotfix.txt", "h\n")]);

    let err = assert_err!(controller.on_build_complete(BuildVerdict::Success).await);
    assert!(
        matches!(err, IntegrationError::ConcurrentUpdate { .. }),
        "unexpected error: {err:?}"
    );
    assert_eq!(fixture.head("master"), Some(hotfix.clone()));

    integrate(&mut controller).await;
    let target = fixture.head("master").unwrap();
    assert_eq!(
        git(&fixture.origin, &["rev-parse", &format!("{target}^")]),
        hotfix
    );
}

#[tokio::test]
async fn test_conflict_reports_files_and_leaves_workspace_clean() {
    let fixture = GitFixture::new();
    fixture.push_commit("ready", "bob", "ready edit", &[("README", "ready\n")]);
    let target_before = fixture.push_commit("master", "alice", "master edit", &[("README", "master\n")]);

    let mut controller = controller(&fixture, |_| {});
    let err = assert_err!(controller.on_build_start().await);
    match &err {
        IntegrationError::Conflict { files, range, .. } => {
            assert_eq!(files, &vec!["README".to_string()]);
            assert_eq!(range.count, 1);
        }
        other => panic!("expected conflict, got {other:?}"),
    }

    assert_eq!(fixture.head("master"), Some(target_before));
    assert_eq!(git(&fixture.workspace, &["status", "--porcelain"]), "");
}

#[tokio::test]
async fn test_ready_branch_deleted_only_after_integration() {
    let fixture = GitFixture::new();
    fixture.push_commit("ready", "bob", "add x", &[("x.txt", "x\n")]);

    let mut controller = controller(&fixture, |c| c.delete_ready_branch = true);
    integrate(&mut controller).await;

    assert_eq!(fixture.head("ready"), None);
    assert!(!assert_ok!(controller.on_build_start().await).proceed);
}

#[tokio::test]
async fn test_ready_branch_recreated_from_target_after_delete() {
    let fixture = GitFixture::new();
    fixture.push_commit("ready", "bob", "add x", &[("x.txt", "x\n")]);

    let mut controller = controller(&fixture, |c| c.delete_ready_branch = true);
    integrate(&mut controller).await;
    assert_eq!(fixture.head("ready"), None);

    git(&fixture.developer, &["fetch", "--quiet", "--prune", "origin"]);
    git(&fixture.developer, &["push", "--quiet", "origin", "origin/master:refs/heads/ready"]);
    let base = fixture.head("master").unwrap();
    fixture.push_commit("ready", "dave", "add z", &[("z.txt", "z\n")]);

    integrate(&mut controller).await;
    let target = fixture.head("master").unwrap();
    assert_eq!(fixture.log_since("master", &base).len(), 1);
    assert_eq!(fixture.author(&target), "dave <dave@example.com>");
    assert_eq!(fixture.file_at(&target, "z.txt"), "z");
}

#[tokio::test]
async fn test_ready_branch_kept_when_it_moved_during_build() {
    let fixture = GitFixture::new();
    fixture.push_commit("ready", "bob", "add x", &[("x.txt", "x\n")]);

    let mut controller = controller(&fixture, |c| c.delete_ready_branch = true);
    assert_ok!(controller.on_build_start().await);
    let y = fixture.push_commit("ready", "carol", "add y", &[("y.txt", "y\n")]);

    let completion = assert_ok!(controller.on_build_complete(BuildVerdict::Success).await);
    assert!(completion.result.integrated);
    assert!(completion.retrigger);
    assert_eq!(fixture.head("ready"), Some(y));
}

#[tokio::test]
async fn test_gateway_resolves_and_lists_remote_branches() {
    let fixture = GitFixture::new();
    let base = fixture.head("master").unwrap();
    let x = fixture.push_commit("ready", "bob", TRICKY_MESSAGE, &[("x.txt", "x\n")]);

    let vcs = GitCliGateway::new(&fixture.workspace, "origin");
    assert_ok!(vcs.refresh().await);
    assert_eq!(
        assert_ok!(vcs.resolve_branch("ready").await),
        Some(CommitId::new(x.clone()))
    );
    assert_eq!(assert_ok!(vcs.resolve_branch("missing").await), None);
    assert!(vcs.resolve_branch("bad..name").await.is_err());

    let commits = assert_ok!(vcs.list_commits("ready", &[CommitId::new(base.clone())]).await);
    assert_eq!(commits.len(), 1);
    assert_eq!(commits[0].message, TRICKY_MESSAGE);
    assert_eq!(commits[0].parents, vec![CommitId::new(base.clone())]);
    assert!(assert_ok!(
        vcs.is_ancestor(&CommitId::new(base), &CommitId::new(x)).await
    ));
}
