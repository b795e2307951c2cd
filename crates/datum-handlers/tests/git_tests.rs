//! Git handler against throwaway upstream repositories

use std::time::Duration;

use datum_core::{OpContext, SourceHandler, SourceSpec};
use datum_handlers::GitHandler;
use datum_test_utils::git::{UpstreamRepo, cache_dir};
use pretty_assertions::assert_eq;
use rstest::rstest;
use tokio_util::sync::CancellationToken;

fn ctx() -> OpContext {
    OpContext::new(&CancellationToken::new(), Duration::from_secs(30))
}

fn spec(upstream: &UpstreamRepo, reference: &str, path: &str) -> SourceSpec {
    SourceSpec::new("git")
        .with_param("url", upstream.url())
        .with_param("ref", reference)
        .with_param("path", path)
}

#[tokio::test]
async fn fingerprint_is_blob_id_on_branch() {
    let upstream = UpstreamRepo::new();
    let commit = upstream.commit_file("data/iris.csv", "a,b\n", "add iris");
    let (_tmp, cache) = cache_dir();

    let fp = GitHandler::with_cache_dir(&cache)
        .fingerprint(&ctx(), &spec(&upstream, "main", "data/iris.csv"))
        .await
        .unwrap();

    assert_eq!(fp, format!("gitblob:{}", upstream.blob_id(commit, "data/iris.csv")));
    assert!(cache.join("git").is_dir());
}

#[rstest]
#[case::tag("v1")]
#[case::full_tag_ref("refs/tags/v1")]
#[case::full_branch_ref("refs/heads/main")]
#[tokio::test]
async fn refs_resolve_to_the_tagged_content(#[case] reference: &str) {
    let upstream = UpstreamRepo::new();
    let first = upstream.commit_file("iris.csv", "v1\n", "first");
    upstream.tag("v1", first);
    let (_tmp, cache) = cache_dir();

    let fp = GitHandler::with_cache_dir(&cache)
        .fingerprint(&ctx(), &spec(&upstream, reference, "iris.csv"))
        .await
        .unwrap();

    assert_eq!(fp, format!("gitblob:{}", upstream.blob_id(first, "iris.csv")));
}

#[tokio::test]
async fn commit_id_pins_old_content() {
    let upstream = UpstreamRepo::new();
    let first = upstream.commit_file("iris.csv", "old\n", "first");
    upstream.commit_file("iris.csv", "new\n", "second");
    let (_tmp, cache) = cache_dir();
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("iris.csv");

    GitHandler::with_cache_dir(&cache)
        .fetch(&ctx(), &spec(&upstream, &first.to_string(), "iris.csv"), &dest)
        .await
        .unwrap();

    assert_eq!(std::fs::read_to_string(&dest).unwrap(), "old\n");
}

#[tokio::test]
async fn fetch_writes_blob_content() {
    let upstream = UpstreamRepo::new();
    upstream.commit_file("data/iris.csv", "a,b\n1,2\n", "add iris");
    let (_tmp, cache) = cache_dir();
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("out/iris.csv");

    GitHandler::with_cache_dir(&cache)
        .fetch(&ctx(), &spec(&upstream, "main", "data/iris.csv"), &dest)
        .await
        .unwrap();

    assert_eq!(std::fs::read_to_string(&dest).unwrap(), "a,b\n1,2\n");
}

#[tokio::test]
async fn new_commits_change_the_fingerprint_only_when_the_file_changes() {
    let upstream = UpstreamRepo::new();
    upstream.commit_file("iris.csv", "one\n", "first");
    let (_tmp, cache) = cache_dir();
    let handler = GitHandler::with_cache_dir(&cache);
    let source = spec(&upstream, "main", "iris.csv");

    let before = handler.fingerprint(&ctx(), &source).await.unwrap();
    upstream.commit_file("README.md", "docs\n", "unrelated");
    let unrelated = handler.fingerprint(&ctx(), &source).await.unwrap();
    upstream.commit_file("iris.csv", "two\n", "update");
    let after = handler.fingerprint(&ctx(), &source).await.unwrap();

    assert_eq!(before, unrelated);
    assert_ne!(before, after);
}

#[tokio::test]
async fn missing_file_names_the_path() {
    let upstream = UpstreamRepo::new();
    upstream.commit_file("iris.csv", "a\n", "first");
    let (_tmp, cache) = cache_dir();

    let err = GitHandler::with_cache_dir(&cache)
        .fingerprint(&ctx(), &spec(&upstream, "main", "wine.csv"))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("\"wine.csv\" not found"), "got {err}");
}

#[tokio::test]
async fn failed_fetch_keeps_previous_target() {
    let upstream = UpstreamRepo::new();
    upstream.commit_file("iris.csv", "a\n", "first");
    let (_tmp, cache) = cache_dir();
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("wine.csv");
    std::fs::write(&dest, "old\n").unwrap();

    let err = GitHandler::with_cache_dir(&cache)
        .fetch(&ctx(), &spec(&upstream, "main", "wine.csv"), &dest)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("\"wine.csv\" not found"), "got {err}");
    assert_eq!(std::fs::read_to_string(&dest).unwrap(), "old\n");
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[tokio::test]
async fn unknown_ref_is_an_error() {
    let upstream = UpstreamRepo::new();
    upstream.commit_file("iris.csv", "a\n", "first");
    let (_tmp, cache) = cache_dir();

    let err = GitHandler::with_cache_dir(&cache)
        .fingerprint(&ctx(), &spec(&upstream, "no-such-branch", "iris.csv"))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("cannot resolve ref"), "got {err}");
}

#[tokio::test]
async fn unreachable_remote_leaves_no_mirror_behind() {
    let (_tmp, cache) = cache_dir();
    let missing = tempfile::tempdir().unwrap().path().join("gone");
    let source = SourceSpec::new("git")
        .with_param("url", missing.to_string_lossy())
        .with_param("ref", "main")
        .with_param("path", "iris.csv");

    let err = GitHandler::with_cache_dir(&cache).fingerprint(&ctx(), &source).await;

    assert!(err.is_err());
    let mirrors = std::fs::read_dir(cache.join("git")).map(|d| d.count()).unwrap_or(0);
    assert_eq!(mirrors, 0);
}

#[rstest]
#[case::no_url(&[("ref", "main"), ("path", "a")])]
#[case::no_ref(&[("url", "u"), ("path", "a")])]
#[case::no_path(&[("url", "u"), ("ref", "main")])]
#[tokio::test]
async fn required_params(#[case] params: &[(&str, &str)]) {
    let (_tmp, cache) = cache_dir();
    let source = params
        .iter()
        .fold(SourceSpec::new("git"), |s, (k, v)| s.with_param(*k, *v));

    let err = GitHandler::with_cache_dir(&cache)
        .fingerprint(&ctx(), &source)
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "git: require source.url, source.ref, source.path");
}
