use predicates::prelude::*;
use std::fs;
use std::time::{SystemTime, UNIX_EPOCH};

fn write_temp_config(contents: &str, extension: &str) -> std::path::PathBuf {
    let mut path = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time should be available")
        .as_nanos();
    path.push(format!("archsim-graph-{}.{}", nanos, extension));
    fs::write(&path, contents).expect("config write should succeed");
    path
}

const BALANCED_TOML: &str = r#"
[[nodes]]
id = "client"
kind = "client"

[nodes.spec.client]
requests_per_sec = 1000.0

[[nodes]]
id = "lb"
kind = "load-balancer"

[nodes.shared]
instances = 2

[[nodes]]
id = "app-a"
kind = "app-server"

[[nodes]]
id = "app-b"
kind = "app-server"

[[connections]]
source = "client"
target = "lb"

[[connections]]
source = "lb"
target = "app-a"

[[connections]]
source = "lb"
target = "app-b"
"#;

#[test]
fn summary_reports_default_scenarios() {
    let path = write_temp_config(BALANCED_TOML, "toml");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("archsim");
    cmd.args(["--config", path.to_str().unwrap(), "--format", "summary"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Normal Load: PASS"))
        .stdout(predicate::str::contains("Peak Load:"))
        .stdout(predicate::str::contains("Overall score:"));
}

#[test]
fn json_output_is_machine_readable() {
    let path = write_temp_config(BALANCED_TOML, "toml");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("archsim");
    cmd.args([
        "--config",
        path.to_str().unwrap(),
        "--format",
        "json",
        "--seed",
        "42",
    ]);
    let output = cmd.assert().success().get_output().stdout.clone();
    let report: serde_json::Value =
        serde_json::from_slice(&output).expect("stdout should be JSON");
    assert_eq!(report["scenarios"][0]["name"], "Normal Load");
    assert!(report["overall_score"].is_u64());
}

#[test]
fn json_graph_with_scenarios_runs() {
    let config = r#"{
  "nodes": [
    { "id": "api", "kind": "app-server" },
    { "id": "db", "kind": "sql-database" }
  ],
  "connections": [
    { "source": "api", "target": "db" }
  ],
  "scenarios": [
    { "name": "Quiet", "load_multiplier": 0.5 }
  ]
}"#;
    let path = write_temp_config(config, "json");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("archsim");
    cmd.args(["--config", path.to_str().unwrap(), "--format", "summary"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Quiet:"));
}

#[test]
fn human_output_lists_nodes_and_cost() {
    let path = write_temp_config(BALANCED_TOML, "toml");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("archsim");
    cmd.args(["--config", path.to_str().unwrap()]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Scenario 'Normal Load'"))
        .stdout(predicate::str::contains("estimated monthly cost"))
        .stdout(predicate::str::contains("app-a"));
}

#[test]
fn fixed_seed_output_is_reproducible() {
    let path = write_temp_config(BALANCED_TOML, "toml");
    let args = [
        "--config",
        path.to_str().unwrap(),
        "--format",
        "json",
        "--seed",
        "7",
    ];

    let mut first = assert_cmd::cargo::cargo_bin_cmd!("archsim");
    first.args(args);
    let first_out = first.assert().success().get_output().stdout.clone();

    let mut second = assert_cmd::cargo::cargo_bin_cmd!("archsim");
    second.args(args);
    second.assert().success().stdout(first_out);
}

#[test]
fn missing_config_fails_with_io_error() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("archsim");
    cmd.args(["--config", "/nonexistent/graph.toml"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("failed to read graph"));
}

#[test]
fn unsupported_extension_is_rejected() {
    let path = write_temp_config("nodes = []", "yaml");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("archsim");
    cmd.args(["--config", path.to_str().unwrap()]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("unsupported config format"));
}

#[test]
fn empty_graph_is_rejected() {
    let path = write_temp_config("nodes = []\nconnections = []", "toml");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("archsim");
    cmd.args(["--config", path.to_str().unwrap()]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("graph must contain at least one node"));
}

#[test]
fn zero_duration_is_rejected() {
    let path = write_temp_config(BALANCED_TOML, "toml");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("archsim");
    cmd.args(["--config", path.to_str().unwrap(), "--duration", "0"]);
    cmd.assert().failure().stderr(predicate::str::contains("duration"));
}
