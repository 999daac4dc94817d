use std::fs;
use std::process::Command;
use tempfile::TempDir;

fn write_fixtures(dir: &TempDir) -> (std::path::PathBuf, std::path::PathBuf) {
    let config = dir.path().join("import.toml");
    fs::write(
        &config,
        r#"
[import]
classifier_delay_ms = 0

[classifier]
api_key_env = "EVENT_IMPORTER_CLI_TEST_UNSET_KEY"

[[sources]]
name = "teatern"
organizer_id = "6f1c2a9e-3b7d-4e21-9a55-0c8d2f4b7e10"
default_category = "theater"
"#,
    )
    .unwrap();

    let events = dir.path().join("events.json");
    fs::write(
        &events,
        r#"[
  {"name": "Hamlet", "date_time": "2030-03-01T19:00:00Z", "location": "Varbergs Teater"},
  {"name": "Hamlet", "date_time": "2030-03-01T19:00:00Z", "location": "Varbergs Teater"}
]"#,
    )
    .unwrap();

    (config, events)
}

#[test]
fn test_import_prints_only_json_on_stdout() {
    let dir = TempDir::new().unwrap();
    let (config, events) = write_fixtures(&dir);

    let output = Command::new(env!("CARGO_BIN_EXE_event_importer"))
        .current_dir(dir.path())
        .env_remove("EVENT_IMPORTER_CLI_TEST_UNSET_KEY")
        .arg("--config")
        .arg(&config)
        .args(["import", "--source", "teatern", "--events"])
        .arg(&events)
        .output()
        .unwrap();

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["source"], "teatern");
    assert_eq!(result["eventsFound"], 2);
    assert_eq!(result["eventsImported"], 1);
    assert_eq!(result["duplicatesSkipped"], 1);
    // Log lines go to stderr
    assert!(!output.stderr.is_empty());
}

#[test]
fn test_unknown_source_fails() {
    let dir = TempDir::new().unwrap();
    let (config, events) = write_fixtures(&dir);

    let output = Command::new(env!("CARGO_BIN_EXE_event_importer"))
        .current_dir(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["import", "--source", "saknas", "--events"])
        .arg(&events)
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}
