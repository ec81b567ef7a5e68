//! CLI integration tests for Loam
//!
//! These tests verify the complete workflow from initialization through
//! entry, media, and cache management, ensuring commands work together
//! correctly.

use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

/// Get a command instance for the loam binary
fn loam_cmd() -> assert_cmd::Command {
    assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("loam"))
}

/// Create a temporary directory and initialize a loam site
fn setup_site() -> TempDir {
    let dir = TempDir::new().unwrap();
    loam_cmd().arg("init").arg(dir.path()).assert().success();
    dir
}

fn fetch_json(dir: &TempDir, id: &str) -> Value {
    let output = loam_cmd()
        .current_dir(dir.path())
        .args(["--format", "json", "entry", "fetch", id])
        .output()
        .unwrap();

    assert!(output.status.success(), "fetch failed: {:?}", output);
    serde_json::from_slice(&output.stdout).unwrap()
}

// =============================================================================
// Initialization Tests
// =============================================================================

#[test]
fn test_init_creates_structure() {
    let dir = TempDir::new().unwrap();

    loam_cmd()
        .arg("init")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized loam site"));

    assert!(dir.path().join(".loam").is_dir());
    assert!(dir.path().join(".loam/entries").is_dir());
    assert!(dir.path().join(".loam/media").is_dir());
    assert!(dir.path().join(".loam/plugins").is_dir());
    assert!(dir.path().join(".loam/settings.yaml").is_file());
    assert!(dir.path().join(".loam/.gitignore").is_file());
}

#[test]
fn test_init_is_idempotent() {
    let dir = TempDir::new().unwrap();

    loam_cmd().arg("init").arg(dir.path()).assert().success();
    loam_cmd().arg("init").arg(dir.path()).assert().success();
}

#[test]
fn test_commands_outside_site_fail() {
    let dir = TempDir::new().unwrap();

    loam_cmd()
        .current_dir(dir.path())
        .args(["entry", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not in a loam site"));
}

// =============================================================================
// Entry Tests
// =============================================================================

#[test]
fn test_entry_create_writes_frontmatter_file() {
    let dir = setup_site();

    loam_cmd()
        .current_dir(dir.path())
        .args(["entry", "create", "foo", "--set", "title=Foo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created entry 'foo'"));

    let file = dir.path().join(".loam/entries/foo/entry.md");
    assert!(file.is_file());

    let raw = fs::read_to_string(&file).unwrap();
    assert!(raw.starts_with("---\n"));
    assert!(raw.contains("title: Foo"));
}

#[test]
fn test_entry_fetch_returns_defaults() {
    let dir = setup_site();

    loam_cmd()
        .current_dir(dir.path())
        .args(["entry", "create", "foo"])
        .assert()
        .success();

    let fields = fetch_json(&dir, "foo");

    assert_eq!(fields["id"], "foo");
    assert_eq!(fields["published_by"], "");
    assert_eq!(fields["routable"], true);
    assert!(fields["created_at"].as_i64().unwrap() > 0);
    assert!(fields["uuid"].as_str().is_some());
}

#[test]
fn test_entry_fetch_preserves_explicit_fields() {
    let dir = setup_site();

    loam_cmd()
        .current_dir(dir.path())
        .args(["entry", "create", "zedd", "--set", "published_by=Zed"])
        .assert()
        .success();

    let fields = fetch_json(&dir, "zedd");
    assert_eq!(fields["published_by"], "Zed");
}

#[test]
fn test_entry_fetch_expands_markdown_directive() {
    let dir = setup_site();

    loam_cmd()
        .current_dir(dir.path())
        .args(["entry", "create", "post", "--set", "summary=@markdown **x**"])
        .assert()
        .success();

    let fields = fetch_json(&dir, "post");
    assert_eq!(fields["summary"], "<p><strong>x</strong></p>");
}

#[test]
fn test_entry_fetch_with_vars() {
    let dir = setup_site();

    loam_cmd()
        .current_dir(dir.path())
        .args(["entry", "create", "page", "--set", "greeting=Hi @var(name)"])
        .assert()
        .success();

    let output = loam_cmd()
        .current_dir(dir.path())
        .args([
            "--format",
            "json",
            "entry",
            "fetch",
            "page",
            "--var",
            "name=World",
        ])
        .output()
        .unwrap();

    let fields: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(fields["greeting"], "Hi World");
}

#[test]
fn test_entry_create_duplicate_fails() {
    let dir = setup_site();

    loam_cmd()
        .current_dir(dir.path())
        .args(["entry", "create", "foo"])
        .assert()
        .success();

    loam_cmd()
        .current_dir(dir.path())
        .args(["entry", "create", "foo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_entry_update_merges_fields() {
    let dir = setup_site();

    loam_cmd()
        .current_dir(dir.path())
        .args(["entry", "create", "page", "--set", "title=Old"])
        .assert()
        .success();

    loam_cmd()
        .current_dir(dir.path())
        .args(["entry", "update", "page", "--set", "title=New"])
        .assert()
        .success();

    let fields = fetch_json(&dir, "page");
    assert_eq!(fields["title"], "New");
}

#[test]
fn test_entry_delete_removes_file() {
    let dir = setup_site();

    loam_cmd()
        .current_dir(dir.path())
        .args(["entry", "create", "foo"])
        .assert()
        .success();

    loam_cmd()
        .current_dir(dir.path())
        .args(["entry", "delete", "foo"])
        .assert()
        .success();

    assert!(!dir.path().join(".loam/entries/foo").exists());

    loam_cmd()
        .current_dir(dir.path())
        .args(["entry", "fetch", "foo"])
        .assert()
        .failure();
}

#[test]
fn test_entry_list_shows_children() {
    let dir = setup_site();

    for id in ["blog", "blog/alpha", "blog/zeta"] {
        loam_cmd()
            .current_dir(dir.path())
            .args(["entry", "create", id])
            .assert()
            .success();
    }

    loam_cmd()
        .current_dir(dir.path())
        .args(["entry", "list", "blog"])
        .assert()
        .success()
        .stdout(predicate::str::contains("blog/alpha").and(predicate::str::contains("blog/zeta")));
}

#[test]
fn test_entry_move_and_copy() {
    let dir = setup_site();

    loam_cmd()
        .current_dir(dir.path())
        .args(["entry", "create", "a", "--set", "title=A"])
        .assert()
        .success();

    loam_cmd()
        .current_dir(dir.path())
        .args(["entry", "move", "a", "b"])
        .assert()
        .success();

    assert!(!dir.path().join(".loam/entries/a").exists());
    assert!(dir.path().join(".loam/entries/b/entry.md").is_file());

    loam_cmd()
        .current_dir(dir.path())
        .args(["entry", "copy", "b", "c"])
        .assert()
        .success();

    assert_eq!(fetch_json(&dir, "c")["title"], "A");
}

#[test]
fn test_raw_shortcode_is_not_expanded() {
    let dir = setup_site();

    loam_cmd()
        .current_dir(dir.path())
        .args([
            "entry",
            "create",
            "doc",
            "--set",
            r#"example=[raw][entries_fetch id="foo" field="title"][/raw]"#,
        ])
        .assert()
        .success();

    let fields = fetch_json(&dir, "doc");
    assert_eq!(fields["example"], r#"[entries_fetch id="foo" field="title"]"#);
}

// =============================================================================
// Media Tests
// =============================================================================

#[test]
fn test_media_roundtrip() {
    let dir = setup_site();
    let source = dir.path().join("photo.jpg");
    fs::write(&source, "jpeg-bytes").unwrap();

    loam_cmd()
        .current_dir(dir.path())
        .args([
            "media",
            "add",
            source.to_str().unwrap(),
            "uploads/photo.jpg",
            "--set",
            "title=Photo",
        ])
        .assert()
        .success();

    let output = loam_cmd()
        .current_dir(dir.path())
        .args(["--format", "json", "media", "fetch", "uploads/photo.jpg"])
        .output()
        .unwrap();
    let fields: Value = serde_json::from_slice(&output.stdout).unwrap();

    assert_eq!(fields["title"], "Photo");
    assert!(fields["modified_at"].as_i64().unwrap() > 0);

    loam_cmd()
        .current_dir(dir.path())
        .args(["media", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("uploads/photo.jpg"));

    loam_cmd()
        .current_dir(dir.path())
        .args(["media", "delete", "uploads/photo.jpg"])
        .assert()
        .success();

    loam_cmd()
        .current_dir(dir.path())
        .args(["media", "fetch", "uploads/photo.jpg"])
        .assert()
        .failure();
}

// =============================================================================
// Cache Tests
// =============================================================================

#[test]
fn test_cache_set_get_delete_across_invocations() {
    let dir = setup_site();

    loam_cmd()
        .current_dir(dir.path())
        .args(["cache", "set", "greeting", "\"hello\""])
        .assert()
        .success();

    loam_cmd()
        .current_dir(dir.path())
        .args(["cache", "has", "greeting"])
        .assert()
        .success()
        .stdout(predicate::str::contains("found"));

    loam_cmd()
        .current_dir(dir.path())
        .args(["--format", "json", "cache", "get", "greeting"])
        .assert()
        .success()
        .stdout(predicate::str::contains("hello"));

    loam_cmd()
        .current_dir(dir.path())
        .args(["cache", "delete", "greeting"])
        .assert()
        .success();

    loam_cmd()
        .current_dir(dir.path())
        .args(["cache", "get", "greeting"])
        .assert()
        .failure();
}

#[test]
fn test_cache_clear() {
    let dir = setup_site();

    loam_cmd()
        .current_dir(dir.path())
        .args(["cache", "set", "k", "1"])
        .assert()
        .success();

    loam_cmd()
        .current_dir(dir.path())
        .args(["cache", "clear"])
        .assert()
        .success();

    loam_cmd()
        .current_dir(dir.path())
        .args(["cache", "has", "k"])
        .assert()
        .success()
        .stdout(predicate::str::contains("not found"));
}

#[test]
fn test_disabled_cache_reports_misses() {
    let dir = setup_site();

    fs::write(
        dir.path().join(".loam/settings.yaml"),
        "cache:\n  enabled: false\n",
    )
    .unwrap();

    loam_cmd()
        .current_dir(dir.path())
        .args(["cache", "set", "k", "1"])
        .assert()
        .success();

    loam_cmd()
        .current_dir(dir.path())
        .args(["cache", "has", "k"])
        .assert()
        .success()
        .stdout(predicate::str::contains("not found"));
}

// =============================================================================
// Status and Plugin Tests
// =============================================================================

#[test]
fn test_status_counts_content() {
    let dir = setup_site();

    loam_cmd()
        .current_dir(dir.path())
        .args(["entry", "create", "one"])
        .assert()
        .success();
    loam_cmd()
        .current_dir(dir.path())
        .args(["entry", "create", "two"])
        .assert()
        .success();

    let output = loam_cmd()
        .current_dir(dir.path())
        .args(["--format", "json", "status"])
        .output()
        .unwrap();
    let status: Value = serde_json::from_slice(&output.stdout).unwrap();

    assert_eq!(status["entries"], 2);
    assert_eq!(status["plugins"], 0);
}

#[test]
fn test_plugin_list_empty() {
    let dir = setup_site();

    loam_cmd()
        .current_dir(dir.path())
        .args(["plugin", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No plugins activated"));
}
