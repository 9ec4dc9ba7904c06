//! Runs the built `whirl` binary end to end.

use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Scratch directory plus a `whirl` command that never touches the
/// caller's environment.
struct TestContext {
    temp_dir: TempDir,
}

impl TestContext {
    fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    fn whirl(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_whirl"));
        cmd.current_dir(self.temp_dir.path());
        for (key, _) in std::env::vars() {
            if key.starts_with("WHIRL_") {
                cmd.env_remove(key);
            }
        }
        cmd.env_remove("RUST_LOG");
        cmd
    }

    fn run(&self, args: &[&str]) -> Output {
        self.whirl().args(args).output().expect("failed to run whirl")
    }
}

#[test]
fn help_lists_usage() {
    let ctx = TestContext::new();
    let output = ctx.run(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage:"));
    assert!(stdout.contains("--index-url"));
}

#[test]
fn unreadable_requirements_file_is_fatal() {
    let ctx = TestContext::new();
    let output = ctx.run(&["-r", "does-not-exist.txt"]);
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("does-not-exist.txt"));
}

#[test]
fn range_specifier_is_fatal() {
    let ctx = TestContext::new();
    let output = ctx.run(&["pkg>=1.0"]);
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn unknown_packages_are_listed_on_stdout() {
    let mut server = mockito::Server::new();
    let _missing = server
        .mock("GET", mockito::Matcher::Regex(r"^/simple/".into()))
        .with_status(404)
        .create();

    let ctx = TestContext::new();
    std::fs::write(ctx.path("requirements.txt"), "alpha==1.0\nbeta\n").unwrap();
    let index_url = format!("{}/simple", server.url());

    let output = ctx.run(&[
        "-r",
        "requirements.txt",
        "--index-url",
        &index_url,
        "--report",
        "report.json",
    ]);
    assert!(output.status.success(), "{output:?}");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut lines: Vec<&str> = stdout.lines().collect();
    lines.sort_unstable();
    assert_eq!(lines, vec!["alpha==1.0", "beta=="]);

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(ctx.path("report.json")).unwrap()).unwrap();
    let outcomes = report["outcomes"].as_array().unwrap();
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| o["status"] == "missing"));
}

#[test]
fn config_file_supplies_the_index() {
    let mut server = mockito::Server::new();
    let page = server
        .mock("GET", "/mirror/pkg")
        .with_status(404)
        .expect(1)
        .create();

    let ctx = TestContext::new();
    std::fs::write(
        ctx.path("whirl.toml"),
        format!("index_url = \"{}/mirror\"\n", server.url()),
    )
    .unwrap();

    let output = ctx.run(&["--config", "whirl.toml", "pkg"]);
    assert!(output.status.success(), "{output:?}");
    assert_eq!(String::from_utf8_lossy(&output.stdout), "pkg==\n");
    page.assert();
}
