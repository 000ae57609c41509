use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;

const INSTALL_RDF: &str = r#"<?xml version="1.0"?>
<RDF xmlns="http://www.w3.org/1999/02/22-rdf-syntax-ns#" xmlns:em="http://www.mozilla.org/2004/em-rdf#">
  <Description about="urn:mozilla:install-manifest">
    <em:id>ext@example.test</em:id>
    <em:version>1.0</em:version>
  </Description>
</RDF>
"#;

fn xpi_nightly() -> Command {
    let mut command = Command::cargo_bin("xpi_nightly").unwrap();
    command
        .env_remove("XPI_NIGHTLY_CONFIG")
        .env_remove("XPI_NIGHTLY_PASSWORD")
        .env_remove("GITHUB_TOKEN")
        .env("NO_COLOR", "1");
    command
}

fn git(dir: &Path, args: &[&str]) {
    let status = std::process::Command::new("git")
        .args(args)
        .current_dir(dir)
        .status()
        .unwrap();
    assert!(status.success(), "git {args:?} failed");
}

#[test]
fn test_help() {
    xpi_nightly()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--force"));
}

#[test]
fn test_verbose_conflicts_with_quiet() {
    xpi_nightly().args(["--verbose", "--quiet"]).assert().failure();
}

#[test]
fn test_missing_config_exits_with_failure() {
    let dir = tempfile::tempdir().unwrap();
    xpi_nightly()
        .arg("--config")
        .arg(dir.path().join("absent.toml"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Publish failed"));
}

#[test]
fn test_incomplete_config_exits_with_failure() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("xpi_nightly.toml");
    std::fs::write(&config, "[source]\nrepo = \"/src/ext\"\n").unwrap();

    xpi_nightly()
        .arg("--config")
        .arg(&config)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Publish failed"));
}

#[test]
fn test_dry_run_builds_without_publishing() {
    if which::which("git").is_err() {
        return;
    }
    let work = tempfile::tempdir().unwrap();
    let site = tempfile::tempdir().unwrap();
    std::fs::write(work.path().join("install.rdf"), INSTALL_RDF).unwrap();
    git(work.path(), &["init", "--quiet"]);
    git(work.path(), &["config", "user.name", "Nightly Bot"]);
    git(work.path(), &["config", "user.email", "nightly@example.test"]);
    git(work.path(), &["config", "commit.gpgsign", "false"]);
    git(work.path(), &["add", "install.rdf"]);
    git(work.path(), &["commit", "--quiet", "-m", "initial"]);

    let descriptor = site.path().join("update.rdf");
    let config = site.path().join("xpi_nightly.toml");
    std::fs::write(
        &config,
        format!(
            r#"[source]
repo = "{work}"

[target]
owner = "me"
repo = "ext"
fullname = "Example"
updateurl = "https://me.example.test/update.rdf"
updaterdf = "{descriptor}"

[user]
name = "me"
pass = "s3cret"
"#,
            work = work.path().display(),
            descriptor = descriptor.display(),
        ),
    )
    .unwrap();

    xpi_nightly()
        .arg("--config")
        .arg(&config)
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("not published"))
        .stdout(predicate::str::contains("ext-nightly-"));

    assert!(!descriptor.exists());
    let tags = std::process::Command::new("git")
        .args(["tag", "--list"])
        .current_dir(work.path())
        .output()
        .unwrap();
    assert!(tags.stdout.is_empty());
}
