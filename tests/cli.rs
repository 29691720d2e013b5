// Non-interactive subcommands against a throwaway state database. HOME points
// into the temp dir so the config and log files stay out of the real home.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use tempfile::{tempdir, TempDir};

fn turnwise(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("turnwise").unwrap();
    cmd.env("HOME", dir.path())
        .env("XDG_CONFIG_HOME", dir.path().join("config"))
        .env_remove("RUST_LOG")
        .arg("--db")
        .arg(dir.path().join("state.db"));
    cmd
}

fn stdout(cmd: &mut Command) -> String {
    let output = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(output).unwrap()
}

fn stderr_of_failure(cmd: &mut Command) -> String {
    let output = cmd.assert().failure().get_output().stderr.clone();
    String::from_utf8(output).unwrap()
}

fn write(dir: &Path, name: &str, text: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, text).unwrap();
    path
}

#[test]
fn lists_built_in_scenarios() {
    let dir = tempdir().unwrap();
    let listing = stdout(turnwise(&dir).arg("scenarios"));
    assert_eq!(listing.lines().count(), 5);
    assert!(listing.starts_with("cumprimentos\t"));
    assert!(listing.contains("solicitacao_pedir\t"));
}

#[test]
fn import_rejects_non_array_and_keeps_library() {
    let dir = tempdir().unwrap();
    let file = write(dir.path(), "one.json", r#"{"id": "x", "steps": []}"#);

    let err = stderr_of_failure(turnwise(&dir).arg("import").arg(&file));
    assert!(err.contains("JSON array"));

    let listing = stdout(turnwise(&dir).arg("scenarios"));
    assert_eq!(listing.lines().count(), 5);
}

#[test]
fn import_then_export_round_trips_through_the_database() {
    let dir = tempdir().unwrap();
    let file = write(
        dir.path(),
        "mine.json",
        r#"[{"id": "padaria", "title": "Padaria", "steps": [
            {"id": 1, "incoming": "Bom dia!", "optionsL1": ["Bom dia", "Oi"], "next": "END"}
        ]}]"#,
    );

    let out = stdout(turnwise(&dir).arg("import").arg(&file));
    assert_eq!(out.trim(), "imported 1 scenarios");

    let listing = stdout(turnwise(&dir).arg("scenarios"));
    assert_eq!(listing.trim(), "padaria\tPadaria\t1 steps");

    let exported = dir.path().join("export.json");
    stdout(turnwise(&dir).arg("export-scenarios").arg("-o").arg(&exported));
    let value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&exported).unwrap()).unwrap();
    assert_eq!(value[0]["id"], "padaria");
    assert_eq!(value[0]["steps"][0]["next"], "END");
}

#[test]
fn export_csv_without_history_fails() {
    let dir = tempdir().unwrap();
    assert_eq!(stdout(turnwise(&dir).arg("history")), "");
    let err = stderr_of_failure(turnwise(&dir).arg("export-csv"));
    assert!(err.contains("no responses"));
}

#[test]
fn unknown_session_export_fails() {
    let dir = tempdir().unwrap();
    let err = stderr_of_failure(turnwise(&dir).args(["export-json", "--session", "nope"]));
    assert!(err.contains("unknown session"));
}

#[test]
fn locked_mode_persists_between_runs() {
    let dir = tempdir().unwrap();
    let file = write(dir.path(), "empty.json", "[]");

    stdout(turnwise(&dir).arg("--locked").arg("scenarios"));
    let err = stderr_of_failure(turnwise(&dir).arg("import").arg(&file));
    assert!(err.contains("locked"));

    stdout(turnwise(&dir).arg("--unlock").arg("import").arg(&file));
}

#[test]
fn scenario_editing_commands() {
    let dir = tempdir().unwrap();
    let id = stdout(turnwise(&dir).arg("add-scenario")).trim().to_string();
    assert!(id.starts_with("scenario_"));

    assert_eq!(stdout(turnwise(&dir).args(["add-step", &id])).trim(), "2");
    stdout(turnwise(&dir).args(["set-next", &id, "1", r#"{"0": 2, "1": 2}"#]));
    stdout(turnwise(&dir).args(["rename-scenario", &id, "Padaria"]));
    stdout(turnwise(&dir).args(["remove-step", &id, "2"]));

    let err = stderr_of_failure(turnwise(&dir).args(["remove-step", &id, "1"]));
    assert!(err.contains("only step"));

    let listing = stdout(turnwise(&dir).arg("scenarios"));
    assert!(listing.contains(&format!("{id}\tPadaria\t1 steps")));

    stdout(turnwise(&dir).args(["remove-scenario", &id]));
    assert_eq!(stdout(turnwise(&dir).arg("scenarios")).lines().count(), 5);
}

#[test]
fn invalid_level_is_a_usage_error() {
    let dir = tempdir().unwrap();
    turnwise(&dir).args(["--level", "7"]).assert().failure();
}

#[test]
fn step_fields_can_be_edited() {
    let dir = tempdir().unwrap();
    stdout(turnwise(&dir).args(["set-step-field", "casa_mae", "1", "incoming", "Filho, vem jantar!"]));
    stdout(turnwise(&dir).args(["set-step-field", "casa_mae", "1", "chips", "Já vou\n\n  Só um minuto  "]));

    let exported = dir.path().join("export.json");
    stdout(turnwise(&dir).arg("export-scenarios").arg("-o").arg(&exported));
    let value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&exported).unwrap()).unwrap();
    let step = value
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["id"] == "casa_mae")
        .map(|s| s["steps"][0].clone())
        .unwrap();
    assert_eq!(step["incoming"], "Filho, vem jantar!");
    assert_eq!(step["level4"]["chips"], serde_json::json!(["Já vou", "Só um minuto"]));

    let err = stderr_of_failure(turnwise(&dir).args(["set-step-field", "casa_mae", "99", "hint", "x"]));
    assert!(err.contains("unknown step"));
}
