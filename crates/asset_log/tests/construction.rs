//! Construction of loggers from configuration files, and output to rotating files.

use std::{fs, path::Path};

use asset_log::{AssetLog, Environment, LogContext, LoggerError, Severity};

fn write_config(dir: &Path, contents: &str) -> std::path::PathBuf {
    let path = dir.join("logger.yaml");
    fs::write(&path, contents).unwrap();
    path
}

/// Reads the records written to `path`.
fn read_records(path: &Path) -> Vec<serde_json::Value> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

/// Names of the files in `dir`, sorted.
fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<_> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn empty_environment_fails_before_reading_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("does-not-exist.yaml");

    assert!(matches!(
        AssetLog::from_config_file("", &missing),
        Err(LoggerError::MissingEnvironment)
    ));
}

#[test]
fn unknown_environment_without_dev_entry_is_missing() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        dir.path(),
        "prod:\n  level: info\n  output_paths: [stdout]\n  appends: [request_id]\n",
    );

    assert!(matches!(
        AssetLog::from_config_file("", &path),
        Err(LoggerError::MissingEnvironment)
    ));
    assert!(matches!(
        AssetLog::from_config_file("staging", &path),
        Err(LoggerError::ConfigMissingForEnvironment(Environment::Dev))
    ));
    assert!(AssetLog::from_config_file("prod", &path).is_ok());
}

#[test]
fn unknown_environments_select_the_dev_entry() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        dir.path(),
        r#"
prod:
  level: error
  output_paths: ["stdout"]
  appends: ["request_id"]
test:
  level: warn
  output_paths: ["stderr"]
  appends: []
dev:
  level: debug
  output_paths: ["stdout"]
  appends: ["request_id", "user_id"]
"#,
    );

    let dev = AssetLog::from_config_file("dev", &path).unwrap();
    for environment in ["staging", "local", "PROD", "production"] {
        let logger = AssetLog::from_config_file(environment, &path).unwrap();
        assert_eq!(logger.config(), dev.config(), "environment {environment:?}");
        assert_eq!(logger.level(), Severity::Debug);
    }

    assert_eq!(
        AssetLog::from_config_file("prod", &path).unwrap().level(),
        Severity::Error
    );
    assert_eq!(
        AssetLog::from_config_file("test", &path).unwrap().level(),
        Severity::Warn
    );
}

#[test]
fn unreadable_and_malformed_files_are_reported() {
    let dir = tempfile::tempdir().unwrap();

    assert!(matches!(
        AssetLog::from_config_file("prod", dir.path().join("missing.yaml")),
        Err(LoggerError::ConfigRead { .. })
    ));

    let malformed = write_config(dir.path(), "prod: [level: info\n");
    match AssetLog::from_config_file("prod", &malformed) {
        Err(LoggerError::ConfigParse { path, .. }) => assert_eq!(path, malformed),
        other => panic!("expected `ConfigParse`, got {other:?}"),
    }
}

#[test]
fn invalid_level_in_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        dir.path(),
        "prod:\n  level: verbose\n  output_paths: [stdout]\n  appends: []\n",
    );

    assert!(matches!(
        AssetLog::from_config_file("prod", &path),
        Err(LoggerError::UnsupportedLevel(level)) if level == "verbose"
    ));
}

#[test]
fn records_are_written_to_rotating_files() {
    let dir = tempfile::tempdir().unwrap();
    let logs = dir.path().join("logs");
    let config = format!(
        "prod:\n  level: INFO\n  output_paths: [{first:?}, {second:?}]\n  appends: [request_id, user_id]\n  rotation:\n    max_backups: 2\n    max_age_days: 7\n",
        first = logs.join("app.log").to_string_lossy(),
        second = logs.join("audit.log").to_string_lossy(),
    );
    let path = write_config(dir.path(), &config);

    let logger = AssetLog::from_config_file("prod", &path).unwrap();
    let ctx = LogContext::new().record("request_id", "abc123");

    logger.info(&ctx, "hello");
    logger.debug(&ctx, "suppressed");
    logger.errorf(None, format_args!("failed after {} attempts", 3));

    assert_eq!(file_names(&logs), vec!["app.log", "audit.log"]);
    for name in ["app.log", "audit.log"] {
        let records = read_records(&logs.join(name));
        assert_eq!(records.len(), 2);

        assert_eq!(records[0]["level"], "INFO");
        assert_eq!(records[0]["message"], "hello");
        assert_eq!(records[0]["request_id"], "abc123");
        assert_eq!(records[0]["user_id"], "");

        assert_eq!(records[1]["level"], "ERROR");
        assert_eq!(records[1]["message"], "failed after 3 attempts");
        assert!(records[1].get("request_id").is_none());
    }
}

#[test]
fn direct_construction_writes_to_files() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("direct.log");

    let logger = AssetLog::new(
        "warn",
        [file.to_string_lossy().into_owned()],
        ["request_id"],
    )
    .unwrap();
    logger.info(&LogContext::new().record("request_id", "r1"), "suppressed");
    logger.warn(&LogContext::new().record("request_id", "r2"), "kept");

    let records = read_records(&file);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["message"], "kept");
    assert_eq!(records[0]["request_id"], "r2");
}

#[test]
fn files_rotate_once_they_exceed_the_size_limit() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("app.log");
    let config = format!(
        "prod:\n  level: info\n  output_paths: [{file:?}]\n  appends: []\n  rotation:\n    max_size_mb: 1\n    max_backups: 2\n",
        file = file.to_string_lossy(),
    );
    let path = write_config(dir.path(), &config);

    let logger = AssetLog::from_config_file("prod", &path).unwrap();
    let message = "x".repeat(400 * 1024);
    for _ in 0..12 {
        logger.info(None, &message);
    }

    let names = file_names(dir.path());
    assert!(file.exists());
    assert_eq!(names, vec!["app.log", "app.log.1", "app.log.2", "logger.yaml"]);
    for name in ["app.log.1", "app.log.2"] {
        let records = read_records(&dir.path().join(name));
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|record| record["message"] == message.as_str()));
    }
}
