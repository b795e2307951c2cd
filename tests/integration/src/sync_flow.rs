//! End-to-end flows through the engine with the built-in handlers
//!
//! config file -> resolver -> fallback over real handlers -> policy -> lock file

use std::sync::Arc;

use datum_core::test_support::ScriptedHandler;
use datum_core::{
    DataConfig, Engine, EngineOptions, HandlerRegistry, LockState, RunStatus, Severity, StatusLine,
};
use datum_handlers::{GitHandler, register_builtins};
use datum_test_utils::git::cache_dir;
use datum_test_utils::{TestProject, UpstreamRepo};
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

struct Run {
    status: RunStatus,
    lines: Vec<StatusLine>,
}

async fn check(registry: &HandlerRegistry, project: &TestProject) -> Run {
    let config = DataConfig::load(&project.path(".data.yaml")).unwrap();
    let mut lines = Vec::new();
    let report = Engine::new(registry, EngineOptions::default())
        .check(
            &config,
            &project.path(".data.lock.yaml"),
            &CancellationToken::new(),
            &mut lines,
        )
        .await
        .unwrap();
    Run {
        status: report.status,
        lines,
    }
}

fn lock(project: &TestProject) -> LockState {
    LockState::load(&project.path(".data.lock.yaml")).unwrap()
}

#[tokio::test]
async fn git_dataset_is_pinned_to_blob_and_follows_updates() {
    let upstream = UpstreamRepo::new();
    let first = upstream.commit_file("data/iris.csv", "a,b\n1,2\n", "add iris");
    let (_cache_tmp, cache) = cache_dir();
    let mut registry = HandlerRegistry::new();
    register_builtins(&mut registry);
    registry.register("git", Arc::new(GitHandler::with_cache_dir(&cache)));

    let project = TestProject::new();
    project.config(&format!(
        r#"version: 1
datasets:
  - id: iris
    target: {}
    policy: update
    source:
      type: git
      url: {}
      ref: main
      path: data/iris.csv
"#,
        project.path("data/iris.csv").display(),
        upstream.url()
    ));

    let run = check(&registry, &project).await;
    assert_eq!(run.status, RunStatus::Success);
    project.assert_file_contains("data/iris.csv", "a,b\n1,2\n");
    let entry = lock(&project).get("iris").cloned().unwrap();
    assert_eq!(
        entry.remote_fingerprint,
        Some(format!("gitblob:{}", upstream.blob_id(first, "data/iris.csv")))
    );

    let second = upstream.commit_file("data/iris.csv", "a,b\n3,4\n", "update iris");
    let run = check(&registry, &project).await;
    assert_eq!(run.lines.last().unwrap().severity, Severity::Updated);
    project.assert_file_contains("data/iris.csv", "a,b\n3,4\n");
    assert_eq!(
        lock(&project).get("iris").unwrap().remote_fingerprint,
        Some(format!("gitblob:{}", upstream.blob_id(second, "data/iris.csv")))
    );
}

#[tokio::test]
async fn unreachable_primary_falls_back_to_local_mirror() {
    let project = TestProject::new();
    let mirror = project.write("mirror/wine.csv", "x,y\n");
    project.config(&format!(
        r#"version: 1
defaults:
  policy: update
datasets:
  - id: wine
    target: {}
    sources:
      - type: primary
      - type: file
        path: {}
"#,
        project.path("data/wine.csv").display(),
        mirror.display()
    ));
    let mut registry = datum_handlers::builtin_registry();
    registry.register("primary", Arc::new(ScriptedHandler::new("primary").failing("503")));

    let run = check(&registry, &project).await;

    assert_eq!(run.status, RunStatus::Success);
    let warnings: Vec<_> = run
        .lines
        .iter()
        .filter(|l| l.severity == Severity::Warn)
        .collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].to_string(), "[WARN] wine: source 1/2 failed: 503");

    let entry = lock(&project).get("wine").cloned().unwrap();
    let content_hash = datum_fs::compute_content_checksum("x,y\n");
    assert_eq!(entry.remote_fingerprint.as_deref(), Some(content_hash.as_str()));
    assert_eq!(entry.local_content_hash.as_deref(), Some(content_hash.as_str()));
}

#[tokio::test]
async fn repeated_update_checks_are_stable() {
    let project = TestProject::new();
    let upstream = project.write("upstream/a.csv", "1\n");
    project.config(&format!(
        "version: 1\ndatasets:\n  - id: a\n    target: {}\n    policy: update\n    source: {{type: file, path: {}}}\n",
        project.path("a.csv").display(),
        upstream.display()
    ));
    let registry = datum_handlers::builtin_registry();

    check(&registry, &project).await;
    let first = lock(&project);
    let run = check(&registry, &project).await;
    let second = lock(&project);

    assert_eq!(run.lines.len(), 1);
    assert_eq!(run.lines[0].severity, Severity::Ok);
    let strip = |state: &LockState| {
        state
            .items
            .iter()
            .map(|(id, e)| (id.clone(), e.remote_fingerprint.clone(), e.local_content_hash.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(strip(&first), strip(&second));
}

#[tokio::test]
async fn all_sources_down_marks_entry_inaccessible_and_keeps_fingerprint() {
    let project = TestProject::new();
    let upstream = project.write("upstream/a.csv", "1\n");
    project.config(&format!(
        "version: 1\ndatasets:\n  - id: a\n    target: {}\n    policy: fail\n    source: {{type: file, path: {}}}\n",
        project.path("a.csv").display(),
        upstream.display()
    ));
    let registry = datum_handlers::builtin_registry();
    let config = DataConfig::load(&project.path(".data.yaml")).unwrap();
    Engine::new(&registry, EngineOptions::default())
        .fetch(
            &config,
            &project.path(".data.lock.yaml"),
            &[],
            &CancellationToken::new(),
            &mut Vec::new(),
        )
        .await
        .unwrap();
    let before = lock(&project).get("a").cloned().unwrap();
    std::fs::remove_file(&upstream).unwrap();

    let run = check(&registry, &project).await;

    assert_eq!(run.status, RunStatus::Failure);
    let after = lock(&project).get("a").cloned().unwrap();
    assert_eq!(after.remote_fingerprint, before.remote_fingerprint);
    assert_eq!(after.local_content_hash, before.local_content_hash);
    assert!(after.inaccessible_at.is_some());
    assert!(after.inaccessible_error.is_some());
}

#[cfg(unix)]
#[tokio::test]
async fn command_source_end_to_end() {
    let project = TestProject::new();
    project.config(&format!(
        r#"version: 1
datasets:
  - id: model
    target: {}
    policy: update
    source:
      type: command
      url: model-v1
      fingerprint_cmd: "echo {{{{url}}}}"
      fetch_cmd: "printf '%s' {{{{url}}}} > \"$DEST\""
"#,
        project.path("models/model.bin").display()
    ));
    let registry = datum_handlers::builtin_registry();

    let run = check(&registry, &project).await;

    assert_eq!(run.status, RunStatus::Success);
    project.assert_file_contains("models/model.bin", "model-v1");
    assert_eq!(
        lock(&project).get("model").unwrap().remote_fingerprint.as_deref(),
        Some("model-v1")
    );
}

#[cfg(unix)]
#[tokio::test]
async fn timed_out_source_never_overwrites_the_fallback_result() {
    let project = TestProject::new();
    let fifo = project.path("upstream/stalled.csv");
    std::fs::create_dir_all(fifo.parent().unwrap()).unwrap();
    let made = std::process::Command::new("mkfifo").arg(&fifo).status().unwrap();
    assert!(made.success());
    let mirror = project.write("mirror/iris.csv", "from mirror\n");
    project.config(&format!(
        r#"version: 1
datasets:
  - id: iris
    target: {}
    policy: update
    sources:
      - type: file
        path: {}
      - type: file
        path: {}
"#,
        project.path("data/iris.csv").display(),
        fifo.display(),
        mirror.display()
    ));
    let registry = datum_handlers::builtin_registry();
    let config = DataConfig::load(&project.path(".data.yaml")).unwrap();
    let options = EngineOptions {
        op_timeout: std::time::Duration::from_millis(300),
    };

    let mut lines = Vec::new();
    let report = Engine::new(&registry, options)
        .fetch(
            &config,
            &project.path(".data.lock.yaml"),
            &[],
            &CancellationToken::new(),
            &mut lines,
        )
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::Success);
    assert!(
        lines
            .iter()
            .any(|l| l.severity == Severity::Warn && l.message.contains("Timed out")),
        "got {lines:?}"
    );
    project.assert_file_contains("data/iris.csv", "from mirror\n");

    // Release the copy still blocked on the stalled source.
    let writer = std::thread::spawn(move || {
        if let Ok(mut pipe) = std::fs::OpenOptions::new().write(true).open(&fifo) {
            let _ = std::io::Write::write_all(&mut pipe, b"late from timed-out source\n");
        }
    });
    writer.join().unwrap();
    std::thread::sleep(std::time::Duration::from_millis(300));

    project.assert_file_contains("data/iris.csv", "from mirror\n");
    let entry = lock(&project).get("iris").cloned().unwrap();
    assert_eq!(
        entry.local_content_hash,
        Some(datum_fs::compute_content_checksum("from mirror\n"))
    );
    let leftovers = std::fs::read_dir(project.path("data")).unwrap().count();
    assert_eq!(leftovers, 1);
}
