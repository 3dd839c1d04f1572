use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

/// Command running against the in-memory demo backend from an empty directory
fn memory_cmd(dir: &TempDir) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("connectum");
    cmd.current_dir(dir.path())
        .env("CONNECTUM__BACKEND__KIND", "memory")
        .env("CONNECTUM__GENERAL__LOCAL_STORE", "memory")
        .env("CONNECTUM__TRANSLATION__PROVIDER", "mock")
        .env_remove("CONNECTUM__SESSION__USER_ID");
    cmd
}

#[test]
fn config_init_writes_example_file() {
    let dir = TempDir::new().expect("temp dir");
    let config_path = dir.path().join("connectum.toml");

    let mut cmd = cargo_bin_cmd!("connectum");
    cmd.args(["config", "init", "--path"])
        .arg(&config_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Created config file"));

    let content = fs::read_to_string(&config_path).expect("read config");
    assert!(content.contains("[backend]"));
    assert!(content.contains("best_answer_xp = 25"));
}

#[test]
fn config_init_refuses_to_overwrite() {
    let dir = TempDir::new().expect("temp dir");
    let config_path = dir.path().join("connectum.toml");
    fs::write(&config_path, "# mine\n").expect("write config");

    let mut cmd = cargo_bin_cmd!("connectum");
    cmd.args(["config", "init", "--path"])
        .arg(&config_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    assert_eq!(fs::read_to_string(&config_path).unwrap(), "# mine\n");
}

#[test]
fn feed_outputs_demo_questions_as_json() {
    let dir = TempDir::new().expect("temp dir");

    let output = memory_cmd(&dir)
        .args(["feed", "--json"])
        .output()
        .expect("run feed");
    assert!(output.status.success());

    let value: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    let questions = value.as_array().expect("array");
    assert_eq!(questions.len(), 3);
    assert!(questions.iter().all(|q| q["id"].is_string()));
}

#[test]
fn feed_search_narrows_results() {
    let dir = TempDir::new().expect("temp dir");

    let output = memory_cmd(&dir)
        .args(["feed", "--json", "--search", "no question mentions this"])
        .output()
        .expect("run feed");
    assert!(output.status.success());

    let value: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert_eq!(value.as_array().map(Vec::len), Some(0));
}

#[test]
fn translate_with_mock_provider() {
    let dir = TempDir::new().expect("temp dir");

    memory_cmd(&dir)
        .args(["translate", "--text", "Привіт", "--target", "de"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[Mock Translation to DE]: Привіт"));
}

#[test]
fn like_requires_a_session() {
    let dir = TempDir::new().expect("temp dir");

    memory_cmd(&dir)
        .args(["like", "--question", "demo-1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No session"));
}

#[test]
fn like_with_session_toggles() {
    let dir = TempDir::new().expect("temp dir");

    memory_cmd(&dir)
        .env("CONNECTUM__SESSION__USER_ID", "u-cli")
        .args(["like", "--question", "demo-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Liked demo-1"));
}

#[test]
fn leaderboard_is_empty_on_fresh_backend() {
    let dir = TempDir::new().expect("temp dir");

    memory_cmd(&dir)
        .arg("leaderboard")
        .assert()
        .success()
        .stdout(predicate::str::contains("No profiles yet."));
}

#[test]
fn missing_config_file_is_reported() {
    let dir = TempDir::new().expect("temp dir");

    memory_cmd(&dir)
        .args(["--config", "does-not-exist.toml", "feed"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Config file not found"));
}

#[test]
fn help_lists_subcommands() {
    let mut cmd = cargo_bin_cmd!("connectum");
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("feed"))
        .stdout(predicate::str::contains("leaderboard"))
        .stdout(predicate::str::contains("upload-avatar"));
}

#[test]
fn config_show_reflects_environment_overrides() {
    let dir = TempDir::new().expect("temp dir");

    memory_cmd(&dir)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("kind = \"memory\""))
        .stdout(predicate::str::contains("api_key_env = \"SUPABASE_ANON_KEY\""));
}
