//! End-to-end tests for the `quarry` binary.
//!
//! Each test gets its own home directory whose config points the default
//! repository at a local `file://` directory.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

struct Home {
    home: TempDir,
    repo: PathBuf,
}

impl Home {
    fn new() -> Self {
        let home = TempDir::new().unwrap();
        let repo = home.path().join("repo-server");
        std::fs::create_dir_all(&repo).unwrap();

        let quarry_dir = home.path().join(".quarry");
        std::fs::create_dir_all(&quarry_dir).unwrap();
        std::fs::write(
            quarry_dir.join("config.toml"),
            format!(
                "mirror = \"file://{}\"\ncache_dir = \"{}\"\n",
                repo.display(),
                home.path().join("cache").display()
            ),
        )
        .unwrap();

        Self { home, repo }
    }

    fn publish(&self, group: &str, artifact: &str, version: &str) {
        let dir = self
            .repo
            .join(group.replace('.', "/"))
            .join(artifact)
            .join(version);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(format!("{artifact}-{version}.jar")), artifact).unwrap();
    }

    fn path(&self) -> &Path {
        self.home.path()
    }

    fn quarry(&self) -> Command {
        let mut cmd = Command::cargo_bin("quarry").unwrap();
        cmd.env("HOME", self.path()).env_remove("RUST_LOG");
        cmd
    }
}

#[test]
fn test_resolve_prints_cached_path() {
    let home = Home::new();
    home.publish("org.example", "widget", "1.0");

    home.quarry()
        .args(["resolve", "org.example:widget:1.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("org/example/widget/1.0/widget-1.0.jar"));

    assert!(home.path().join("cache/org/example/widget/1.0/widget-1.0.jar").exists());
}

#[test]
fn test_resolve_bad_coordinate_shows_hint() {
    let home = Home::new();

    home.quarry()
        .args(["resolve", "org.example:widget"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("groupId:artifactId:version"));
}

#[test]
fn test_resolve_missing_artifact_fails() {
    let home = Home::new();

    home.quarry()
        .args(["resolve", "org.example:ghost:1.0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not resolve org.example:ghost:1.0"));
}

#[test]
fn test_classpath_excludes_test_scope() {
    let home = Home::new();
    home.publish("org.apache.commons", "commons-lang3", "3.12.0");
    home.publish("junit", "junit", "4.13.2");

    let project = TempDir::new().unwrap();
    std::fs::write(
        project.path().join("pom.xml"),
        r#"<project><dependencies>
  <dependency><groupId>org.apache.commons</groupId><artifactId>commons-lang3</artifactId><version>3.12.0</version></dependency>
  <dependency><groupId>junit</groupId><artifactId>junit</artifactId><version>4.13.2</version><scope>test</scope></dependency>
</dependencies></project>"#,
    )
    .unwrap();

    home.quarry()
        .arg("classpath")
        .arg(project.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("commons-lang3-3.12.0.jar"))
        .stdout(predicate::str::contains("junit").not());

    home.quarry()
        .arg("classpath")
        .arg(project.path())
        .arg("--test")
        .assert()
        .success()
        .stdout(predicate::str::contains("junit-4.13.2.jar"));
}

#[test]
fn test_run_scripts_share_a_session() {
    let home = Home::new();
    home.publish("org.example", "widget", "1.0");

    let scripts = TempDir::new().unwrap();
    let first = scripts.path().join("first.rhai");
    let second = scripts.path().join("second.rhai");
    std::fs::write(&first, r#"let greeting = "hello"; quarry::grab("org.example:widget:1.0");"#)
        .unwrap();
    std::fs::write(
        &second,
        r#"print(greeting); print(quarry::has_artifact("org.example:widget:1.0"));"#,
    )
    .unwrap();

    home.quarry()
        .arg("run")
        .arg(&first)
        .arg(&second)
        .assert()
        .success()
        .stdout(predicate::str::contains("hello\ntrue\n"));
}

#[test]
fn test_run_failing_script_exits_nonzero() {
    let home = Home::new();
    let scripts = TempDir::new().unwrap();
    let script = scripts.path().join("bad.rhai");
    std::fs::write(&script, r#"throw "no good";"#).unwrap();

    home.quarry()
        .arg("run")
        .arg(&script)
        .assert()
        .failure()
        .stderr(predicate::str::contains("no good"))
        .stderr(predicate::str::contains("1 of 1 scripts failed"));
}

#[test]
fn test_run_with_test_scope() {
    let home = Home::new();
    home.publish("junit", "junit", "4.13.2");

    let project = TempDir::new().unwrap();
    std::fs::write(
        project.path().join("pom.xml"),
        r#"<project><dependencies>
  <dependency><groupId>junit</groupId><artifactId>junit</artifactId><version>4.13.2</version><scope>test</scope></dependency>
</dependencies></project>"#,
    )
    .unwrap();

    let scripts = TempDir::new().unwrap();
    let script = scripts.path().join("check.rhai");
    std::fs::write(&script, "print(quarry::classpath().len());").unwrap();

    home.quarry()
        .arg("run")
        .arg(&script)
        .arg("--project")
        .arg(project.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("0\n"));

    home.quarry()
        .arg("run")
        .arg(&script)
        .arg("--project")
        .arg(project.path())
        .arg("--test")
        .assert()
        .success()
        .stdout(predicate::str::contains("1\n"));
}
