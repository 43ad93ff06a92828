//! Environment-driven configuration: server settings and repository selection.

mod support;

use std::io::Write;
use std::path::PathBuf;

use crowd_predictor::config::{AppConfig, DEFAULT_HISTORY_DAYS, DEFAULT_SECRET_KEY};
use crowd_predictor::db::{RepositoryFactory, RepositoryType, StationRepository};

const APP_VARS: [&str; 7] = [
    "HOST",
    "PORT",
    "SECRET_KEY",
    "ACCESS_TOKEN_EXPIRE_MINUTES",
    "CORS_ORIGINS",
    "MODEL_PATH",
    "HISTORY_DAYS",
];

fn cleared() -> Vec<(&'static str, Option<&'static str>)> {
    APP_VARS.iter().map(|k| (*k, None)).collect()
}

#[test]
fn test_app_config_defaults_without_env() {
    support::with_scoped_env(&cleared(), || {
        let config = AppConfig::from_env();
        assert_eq!(config, AppConfig::default());
        assert!(config.uses_default_secret());
        assert_eq!(config.secret_key, DEFAULT_SECRET_KEY);
    });
}

#[test]
fn test_app_config_reads_env() {
    let mut changes = cleared();
    changes.extend([
        ("HOST", Some("127.0.0.1")),
        ("PORT", Some("9000")),
        ("SECRET_KEY", Some("s3cret")),
        ("ACCESS_TOKEN_EXPIRE_MINUTES", Some("90")),
        ("CORS_ORIGINS", Some("http://a.test, ,http://b.test")),
        ("MODEL_PATH", Some("/tmp/crowd-model.json")),
        ("HISTORY_DAYS", Some("14")),
    ]);
    support::with_scoped_env(&changes, || {
        let config = AppConfig::from_env();
        assert_eq!(config.bind_address(), "127.0.0.1:9000");
        assert_eq!(config.secret_key, "s3cret");
        assert!(!config.uses_default_secret());
        assert_eq!(config.access_token_expire_minutes, 90);
        assert_eq!(config.cors_origins, vec!["http://a.test", "http://b.test"]);
        assert_eq!(
            config.model_path,
            Some(PathBuf::from("/tmp/crowd-model.json"))
        );
        assert_eq!(config.history_days, 14);
    });
}

#[test]
fn test_app_config_bad_numbers_fall_back() {
    let mut changes = cleared();
    changes.extend([
        ("PORT", Some("not-a-port")),
        ("ACCESS_TOKEN_EXPIRE_MINUTES", Some("-5")),
        ("HISTORY_DAYS", Some("0")),
    ]);
    support::with_scoped_env(&changes, || {
        let config = AppConfig::from_env();
        let defaults = AppConfig::default();
        assert_eq!(config.port, defaults.port);
        assert_eq!(
            config.access_token_expire_minutes,
            defaults.access_token_expire_minutes
        );
        assert_eq!(config.history_days, defaults.history_days);
    });
}

#[test]
fn test_app_config_huge_history_window_falls_back() {
    let mut changes = cleared();
    changes.push(("HISTORY_DAYS", Some("200000000000")));
    support::with_scoped_env(&changes, || {
        assert_eq!(AppConfig::from_env().history_days, DEFAULT_HISTORY_DAYS);
    });
}

#[test]
fn test_app_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[server]
port = 3001
cors_origins = ["http://localhost:5173"]

[auth]
secret_key = "file-secret"

[prediction]
model_path = "models/crowd.json"
"#
    )
    .unwrap();

    let config = AppConfig::from_file(file.path()).unwrap();
    assert_eq!(config.port, 3001);
    assert_eq!(config.host, "0.0.0.0");
    assert_eq!(config.secret_key, "file-secret");
    assert_eq!(config.access_token_expire_minutes, 30);
    assert_eq!(config.model_path, Some(PathBuf::from("models/crowd.json")));

    assert!(AppConfig::from_file("/definitely/not/here.toml").is_err());
}

#[test]
fn test_repository_type_from_env_default() {
    support::with_scoped_env(
        &[
            ("REPOSITORY_TYPE", None),
            ("DATABASE_URL", None),
            ("PG_DATABASE_URL", None),
        ],
        || assert_eq!(RepositoryType::from_env(), RepositoryType::Local),
    );
}

#[test]
fn test_repository_type_from_env_with_database_url() {
    support::with_scoped_env(
        &[
            ("REPOSITORY_TYPE", None),
            ("DATABASE_URL", Some("postgres://localhost/crowd")),
        ],
        || assert_eq!(RepositoryType::from_env(), RepositoryType::Postgres),
    );
}

#[test]
fn test_repository_type_explicit_and_unknown() {
    support::with_scoped_env(
        &[
            ("REPOSITORY_TYPE", Some("memory")),
            ("DATABASE_URL", Some("postgres://localhost/crowd")),
        ],
        || assert_eq!(RepositoryType::from_env(), RepositoryType::Local),
    );
    support::with_scoped_env(&[("REPOSITORY_TYPE", Some("mongodb"))], || {
        assert_eq!(RepositoryType::from_env(), RepositoryType::Local)
    });
}

#[tokio::test]
async fn test_factory_from_config_file_local() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[repository]\ntype = \"local\"").unwrap();

    let repo = RepositoryFactory::from_config_file(file.path())
        .await
        .unwrap();
    assert!(repo.health_check().await.unwrap());
    assert_eq!(repo.count_stations().await.unwrap(), 0);
}

#[cfg(not(feature = "postgres-repo"))]
#[tokio::test]
async fn test_factory_postgres_without_feature() {
    let result = RepositoryFactory::create(RepositoryType::Postgres, None).await;
    assert!(result.is_err());
}
