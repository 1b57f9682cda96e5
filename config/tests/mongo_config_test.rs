//! Loads `MongoConfig` from real env files on disk.

use config::{ConfigError, MongoConfig};
use serial_test::serial;
use std::env;
use std::io::Write;
use tempfile::NamedTempFile;

const MONGO_VARS: [&str; 5] = [
    "MONGO_DB_NAME",
    "MONGO_DB_USER",
    "MONGO_DB_PASSWORD",
    "MONGO_HOST",
    "MONGO_PORT",
];

fn clear_mongo_env() {
    unsafe {
        for var in MONGO_VARS {
            env::remove_var(var);
        }
    }
}

fn env_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(contents.as_bytes()).expect("write env file");
    file
}

#[test]
#[serial]
fn test_load_full_env_file() {
    clear_mongo_env();
    let file = env_file(
        "MONGO_PORT=27017\nMONGO_HOST=localhost\nMONGO_DB_NAME=test\nMONGO_DB_USER=u\nMONGO_DB_PASSWORD=p\n",
    );

    let config = MongoConfig::from_env_file(file.path()).unwrap();

    assert_eq!(config.mongo_port, 27017);
    assert_eq!(config.mongo_host, "localhost");
    assert_eq!(config.mongo_db_name, "test");
    assert_eq!(config.mongo_username, "u");
    assert_eq!(config.mongo_password, "p");
}

#[test]
#[serial]
fn test_each_missing_variable_is_reported() {
    let lines = [
        ("MONGO_DB_NAME", "mongo_db_name", "MONGO_DB_NAME=test"),
        ("MONGO_DB_USER", "mongo_username", "MONGO_DB_USER=u"),
        ("MONGO_DB_PASSWORD", "mongo_password", "MONGO_DB_PASSWORD=p"),
        ("MONGO_HOST", "mongo_host", "MONGO_HOST=localhost"),
        ("MONGO_PORT", "mongo_port", "MONGO_PORT=27017"),
    ];

    for (skipped_var, skipped_key, _) in lines {
        clear_mongo_env();
        let contents: String = lines
            .iter()
            .filter(|(var, _, _)| *var != skipped_var)
            .map(|(_, _, line)| format!("{line}\n"))
            .collect();
        let file = env_file(&contents);

        let err = MongoConfig::from_env_file(file.path()).unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingConfig {
                key: skipped_key.to_string(),
                env_var: skipped_var.to_string(),
            },
            "expected {skipped_var} to be reported missing"
        );
    }
}

#[test]
#[serial]
fn test_non_numeric_port_is_invalid_type() {
    clear_mongo_env();
    let file = env_file(
        "MONGO_PORT=abc\nMONGO_HOST=localhost\nMONGO_DB_NAME=test\nMONGO_DB_USER=u\nMONGO_DB_PASSWORD=p\n",
    );

    let err = MongoConfig::from_env_file(file.path()).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::InvalidConfigType { ref key, ref value, .. }
            if key == "mongo_port" && value == "abc"
    ));
}

#[test]
#[serial]
fn test_process_environment_fills_gaps() {
    clear_mongo_env();
    unsafe {
        env::set_var("MONGO_DB_PASSWORD", "from-process");
        env::set_var("MONGO_PORT", "27018");
    }
    let file = env_file("MONGO_HOST=db.internal\nMONGO_DB_NAME=mirror\nMONGO_DB_USER=svc\n");

    let result = MongoConfig::from_env_file(file.path());
    clear_mongo_env();

    let config = result.unwrap();
    assert_eq!(config.mongo_password, "from-process");
    assert_eq!(config.mongo_port, 27018);
    assert_eq!(config.mongo_host, "db.internal");
}

#[test]
#[serial]
fn test_missing_file_uses_process_environment() {
    clear_mongo_env();
    unsafe {
        env::set_var("MONGO_DB_NAME", "test");
        env::set_var("MONGO_DB_USER", "u");
        env::set_var("MONGO_DB_PASSWORD", "p");
        env::set_var("MONGO_HOST", "localhost");
        env::set_var("MONGO_PORT", "27017");
    }

    let dir = tempfile::tempdir().expect("temp dir");
    let result = MongoConfig::from_env_file(dir.path().join("absent.env"));
    clear_mongo_env();

    assert_eq!(result.unwrap().mongo_port, 27017);
}
