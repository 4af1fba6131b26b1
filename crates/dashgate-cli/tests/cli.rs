//! End-to-end tests for the dashgate binary.

#![allow(deprecated)] // Command::cargo_bin is deprecated but replacement requires newer assert_cmd

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// A `dashgate` invocation isolated from the user's own configuration.
fn dashgate(project: &Path) -> Command {
    let mut cmd = Command::cargo_bin("dashgate").unwrap();
    cmd.env("HOME", project)
        .env("XDG_CONFIG_HOME", project.join(".config"))
        .env("NO_COLOR", "1")
        .arg("--project")
        .arg(project);
    cmd
}

fn check_json(project: &Path, args: &[&str]) -> serde_json::Value {
    let output = dashgate(project)
        .arg("check")
        .args(args)
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success(), "check failed: {output:?}");
    serde_json::from_slice(&output.stdout).unwrap()
}

// ============================================================================
// General
// ============================================================================

#[test]
fn version_command_succeeds() {
    let temp = TempDir::new().unwrap();
    dashgate(temp.path())
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("dashgate"));
}

#[test]
fn help_flag_shows_usage() {
    Command::cargo_bin("dashgate")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("dashboards"));
}

// ============================================================================
// Check
// ============================================================================

#[test]
fn check_requires_a_target() {
    let temp = TempDir::new().unwrap();
    dashgate(temp.path())
        .args(["check", "--header", "x-customer-id=ANTON"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

#[test]
fn check_rejects_two_targets() {
    let temp = TempDir::new().unwrap();
    dashgate(temp.path())
        .args(["check", "--table", "Orders", "--procedure", "CustOrderHist"])
        .assert()
        .failure();
}

#[test]
fn check_rejects_malformed_header() {
    let temp = TempDir::new().unwrap();
    dashgate(temp.path())
        .args(["check", "--header", "x-customer-id", "--table", "Orders"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("NAME=VALUE"));
}

#[test]
fn check_table_is_row_filtered() {
    let temp = TempDir::new().unwrap();
    let report = check_json(
        temp.path(),
        &["--header", "X-Customer-Id=ANTON", "--table", "Orders"],
    );

    assert_eq!(report["context"]["identity"], "ANTON");
    assert_eq!(report["context"]["role"], "User");
    assert_eq!(report["decision"]["allowed"], true);

    let filter = &report["request"]["rewritten_filter"];
    assert_eq!(filter["sql"], "\"CustomerID\" = @CustomerID");
    assert_eq!(filter["bindings"][0]["value"], "ANTON");
    assert!(report["request"]["procedural_call"].is_null());
}

#[test]
fn check_denied_table_has_no_request() {
    let temp = TempDir::new().unwrap();
    let report = check_json(temp.path(), &["--table", "Employees"]);

    assert_eq!(report["context"]["identity"], "ALFKI");
    assert_eq!(report["decision"]["allowed"], false);
    assert_eq!(report["decision"]["reason"], "not_in_rule");
    assert!(report["request"].is_null());
}

#[test]
fn check_elevated_identity_sees_any_table() {
    let temp = TempDir::new().unwrap();
    let report = check_json(
        temp.path(),
        &["--header", "x-customer-id=AROUT", "--table", "Employees"],
    );

    assert_eq!(report["context"]["role"], "Admin");
    assert_eq!(report["decision"]["reason"], "elevated_role");
    assert!(report["request"]["rewritten_filter"].is_null());
}

#[test]
fn check_procedure_is_bound_to_identity() {
    let temp = TempDir::new().unwrap();
    let report = check_json(
        temp.path(),
        &["--header", "x-customer-id=BONAP", "--procedure", "CustOrderHist"],
    );

    let call = &report["request"]["procedural_call"];
    assert_eq!(call["name"], "CustOrderHist");
    assert_eq!(call["parameters"]["CustomerID"], "BONAP");
}

#[test]
fn check_text_output() {
    let temp = TempDir::new().unwrap();
    dashgate(temp.path())
        .args(["check", "--header", "x-customer-id=ANTON", "--query", "CustomerOrders"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ANTON"))
        .stdout(predicate::str::contains("allowed"))
        .stdout(predicate::str::contains("SELECT * FROM Orders WHERE CustomerID = @CustomerID"));
}

#[test]
fn check_uses_project_policy() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("dashgate.toml"),
        r#"
[policy]
default_identity = "GUEST"

[[policy.rules]]
role = "User"
allowed_resources = ["Products"]
"#,
    )
    .unwrap();

    let report = check_json(temp.path(), &["--table", "Products"]);
    assert_eq!(report["context"]["identity"], "GUEST");
    assert_eq!(report["decision"]["allowed"], true);

    let report = check_json(temp.path(), &["--table", "Orders"]);
    assert_eq!(report["decision"]["allowed"], false);
}

// ============================================================================
// Dashboards
// ============================================================================

#[test]
fn dashboards_list_empty() {
    let temp = TempDir::new().unwrap();
    dashgate(temp.path())
        .args(["dashboards", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No dashboards"));
}

#[test]
fn dashboards_import_show_list() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("sales.json");
    fs::write(&source, r#"{"Title":"Sales"}"#).unwrap();

    dashgate(temp.path())
        .args(["dashboards", "import", "Sales"])
        .arg(&source)
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported Sales"));

    assert!(temp.path().join("dashboards").join("Sales.rdash").is_file());

    dashgate(temp.path())
        .args(["dashboards", "show", "Sales"])
        .assert()
        .success()
        .stdout(r#"{"Title":"Sales"}"#);

    dashgate(temp.path())
        .args(["dashboards", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Sales"));
}

#[test]
fn dashboards_show_missing_fails() {
    let temp = TempDir::new().unwrap();
    dashgate(temp.path())
        .args(["dashboards", "show", "Missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn dashboards_reject_path_traversal() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("evil.json");
    fs::write(&source, "{}").unwrap();

    dashgate(temp.path())
        .args(["dashboards", "import", "../evil"])
        .arg(&source)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid dashboard id"));
}

// ============================================================================
// Config
// ============================================================================

#[test]
fn config_show_redacts_password() {
    let temp = TempDir::new().unwrap();
    dashgate(temp.path())
        .args(["config", "show", "--format", "toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("CustOrderHist"))
        .stdout(predicate::str::contains("********"))
        .stdout(predicate::str::contains("password = \"dev\"").not());
}

#[test]
fn config_show_json_is_parseable() {
    let temp = TempDir::new().unwrap();
    let output = dashgate(temp.path())
        .args(["config", "show", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let config: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(config["policy"]["default_identity"], "ALFKI");
}

#[test]
fn config_validate_default_succeeds() {
    let temp = TempDir::new().unwrap();
    dashgate(temp.path())
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"));
}

#[test]
fn config_validate_reports_missing_project_file() {
    let temp = TempDir::new().unwrap();
    dashgate(temp.path())
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No dashgate.toml"));

    fs::write(temp.path().join("dashgate.toml"), "[project]\nname = \"portal\"\n").unwrap();
    dashgate(temp.path())
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No dashgate.toml").not());
}

#[test]
fn config_validate_rejects_elevated_default_identity() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("dashgate.toml"),
        r#"
[policy]
default_identity = "AROUT"
"#,
    )
    .unwrap();

    dashgate(temp.path())
        .args(["config", "validate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid policy configuration"));
}

// ============================================================================
// Environment overrides
// ============================================================================

#[test]
fn env_override_keeps_string_values_verbatim() {
    let temp = TempDir::new().unwrap();
    let output = dashgate(temp.path())
        .env("DASHGATE_POLICY__DEFAULT_IDENTITY", "007")
        .args(["check", "--table", "Orders", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "check failed: {output:?}");

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["context"]["identity"], "007");
    assert_eq!(report["request"]["rewritten_filter"]["bindings"][0]["value"], "007");
}

#[test]
fn env_override_parses_numeric_fields() {
    let temp = TempDir::new().unwrap();
    let output = dashgate(temp.path())
        .env("DASHGATE_DATABASE__PORT", "1500")
        .env("DASHGATE_DATABASE__HOST", "0123")
        .args(["config", "show", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "config show failed: {output:?}");

    let config: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(config["database"]["port"], 1500);
    assert_eq!(config["database"]["host"], "0123");
}

#[test]
fn env_override_splits_elevated_identities() {
    let temp = TempDir::new().unwrap();
    let run = |identity: &str| -> serde_json::Value {
        let output = dashgate(temp.path())
            .env("DASHGATE_POLICY__ELEVATED_IDENTITIES", "007,ZED")
            .args(["check", "--table", "Employees", "--json", "--header"])
            .arg(format!("x-customer-id={identity}"))
            .output()
            .unwrap();
        assert!(output.status.success(), "check failed: {output:?}");
        serde_json::from_slice(&output.stdout).unwrap()
    };

    assert_eq!(run("007")["context"]["role"], "Admin");
    assert_eq!(run("ZED")["context"]["role"], "Admin");

    // The list replaces the built-in elevated identities.
    let report = run("AROUT");
    assert_eq!(report["context"]["role"], "User");
    assert_eq!(report["decision"]["allowed"], false);
}
