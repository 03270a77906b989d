//! Integration tests for the connection registry and config-driven setup.

use emix_db::config::{self, DbConfig, ReloadPlan};
use emix_db::db::{self, ConnectionRegistry, DbPool};
use emix_db::models::ConnectionOptions;
use emix_db::DbError;
use tempfile::NamedTempFile;

/// Create a SQLite file holding a one-row `marker` table, so pools opened
/// on it can be told apart. Returns the file and its connection URL.
async fn marked_database(marker: &str) -> (NamedTempFile, String) {
    let temp_file = NamedTempFile::new().expect("Failed to create temp file");
    let url = format!("sqlite:{}?mode=rwc", temp_file.path().display());

    let pool = db::open(&ConnectionOptions::new("sqlite", url.clone()))
        .await
        .expect("Failed to open test database");
    let DbPool::SQLite(p) = &pool else {
        panic!("Expected SQLite pool");
    };
    sqlx::query("CREATE TABLE marker (name TEXT NOT NULL)")
        .execute(p)
        .await
        .unwrap();
    sqlx::query("INSERT INTO marker (name) VALUES (?)")
        .bind(marker)
        .execute(p)
        .await
        .unwrap();
    pool.close().await;

    (temp_file, url)
}

async fn marker_of(pool: &DbPool) -> String {
    let DbPool::SQLite(p) = pool else {
        panic!("Expected SQLite pool");
    };
    sqlx::query_scalar::<_, String>("SELECT name FROM marker")
        .fetch_one(p)
        .await
        .unwrap()
}

fn sqlite_config(name: &str, url: &str) -> DbConfig {
    DbConfig::new(name, "sqlite", url)
}

#[tokio::test]
async fn test_register_same_name_keeps_latest() {
    let (_f1, url1) = marked_database("first").await;
    let (_f2, url2) = marked_database("second").await;
    let registry = ConnectionRegistry::new();

    registry
        .register("a", db::open(&ConnectionOptions::new("sqlite", url1)).await.unwrap())
        .await
        .unwrap();
    registry
        .register("a", db::open(&ConnectionOptions::new("sqlite", url2)).await.unwrap())
        .await
        .unwrap();

    let pool = registry.lookup("a").await.unwrap();
    assert_eq!(marker_of(&pool).await, "second");
    assert_eq!(registry.len().await, 1);
}

#[tokio::test]
async fn test_register_from_options() {
    let (_f, url) = marked_database("opts").await;
    let registry = ConnectionRegistry::new();

    registry
        .register_from_options("main", &ConnectionOptions::new("sqlite", url))
        .await
        .unwrap();
    let pool = registry.lookup("main").await.unwrap();
    assert_eq!(marker_of(&pool).await, "opts");

    let err = registry
        .register_from_options("other", &ConnectionOptions::new("sqlite", ""))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::EmptyConnectionString));
    assert!(registry.lookup("other").await.is_none());
}

#[tokio::test]
async fn test_replace_all_swaps_entries_and_keeps_old_handles_valid() {
    let (_f1, url1) = marked_database("old").await;
    let (_f2, url2) = marked_database("new").await;

    let registry = ConnectionRegistry::from_configs(&[sqlite_config("main", &url1)])
        .await
        .unwrap();
    let held = registry.lookup("main").await.unwrap();

    registry
        .replace_all(&[sqlite_config("main", &url2), sqlite_config("extra", &url2)])
        .await
        .unwrap();

    assert_eq!(registry.names().await, vec!["extra".to_string(), "main".to_string()]);
    let current = registry.lookup("main").await.unwrap();
    assert_eq!(marker_of(&current).await, "new");

    // The handle issued before the swap still works.
    assert!(!held.is_closed());
    assert_eq!(marker_of(&held).await, "old");
}

#[tokio::test]
async fn test_replace_all_failure_keeps_previous_set() {
    let (_f, url) = marked_database("stable").await;
    let registry = ConnectionRegistry::from_configs(&[sqlite_config("main", &url)])
        .await
        .unwrap();

    let result = registry
        .replace_all(&[sqlite_config("next", &url), sqlite_config("broken", "")])
        .await;
    assert!(matches!(result, Err(DbError::EmptyConnectionString)));
    assert_eq!(registry.names().await, vec!["main".to_string()]);

    let result = registry.replace_all(&[sqlite_config("", &url)]).await;
    let err = result.unwrap_err();
    assert!(matches!(err, DbError::EmptyName));
    assert!(err.is_fatal());
    assert_eq!(registry.names().await, vec!["main".to_string()]);
}

#[tokio::test]
async fn test_replace_all_with_empty_list_clears() {
    let (_f, url) = marked_database("x").await;
    let registry = ConnectionRegistry::from_configs(&[sqlite_config("main", &url)])
        .await
        .unwrap();

    registry.replace_all(&[]).await.unwrap();
    assert!(registry.is_empty().await);
    assert!(registry.lookup("main").await.is_none());
}

#[tokio::test]
async fn test_reload_plan_from_file() {
    let (_f1, url1) = marked_database("boot").await;
    let (_f2, url2) = marked_database("reloaded").await;
    let registry = ConnectionRegistry::from_configs(&[sqlite_config("main", &url1)])
        .await
        .unwrap();

    // Nothing to reload: registry untouched.
    let empty = ReloadPlan::from_file("/nonexistent/emix/config.yml").unwrap();
    assert!(!empty.apply(&registry).await.unwrap());
    assert_eq!(registry.names().await, vec!["main".to_string()]);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reload.yaml");
    std::fs::write(
        &path,
        format!(
            "emix:\n  db:\n    - name: main\n      dialect: sqlite\n      connect: \"{}\"\n      maxOpenConns: 2\n",
            url2
        ),
    )
    .unwrap();

    let plan = ReloadPlan::from_file(&path).unwrap();
    assert!(plan.apply(&registry).await.unwrap());
    let pool = registry.lookup("main").await.unwrap();
    assert_eq!(marker_of(&pool).await, "reloaded");
}

#[tokio::test]
async fn test_bootstrap_from_directory() {
    let (_f, url) = marked_database("booted").await;
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("config.yml"),
        format!(
            "emix:\n  db:\n    - name: app\n      dialect: sqlite\n      connect: \"{}\"\n      maxIdleConns: 1\n      maxOpenConns: 4\n      connMaxLifetime: 60\n",
            url
        ),
    )
    .unwrap();

    let registry = config::bootstrap(dir.path()).await.unwrap();
    assert_eq!(registry.names().await, vec!["app".to_string()]);
    let pool = registry.lookup("app").await.unwrap();
    assert_eq!(marker_of(&pool).await, "booted");

    let empty_dir = tempfile::tempdir().unwrap();
    let registry = config::bootstrap(empty_dir.path()).await.unwrap();
    assert!(registry.is_empty().await);
}

#[tokio::test]
async fn test_bootstrap_malformed_config_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("config.yml"), "emix:\n  db: [\n").unwrap();

    let err = config::bootstrap(dir.path()).await.unwrap_err();
    assert!(matches!(err, DbError::ConfigParse { .. }));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_pager_through_registry() {
    let (_f, url) = marked_database("paged").await;
    let registry = ConnectionRegistry::from_configs(&[sqlite_config("main", &url)])
        .await
        .unwrap();

    let pager = registry
        .pager("main", 1, 0)
        .await
        .unwrap()
        .with_query("SELECT name FROM marker", vec![])
        .await
        .unwrap();
    assert_eq!(pager.total_rows(), 1);
    assert_eq!(pager.total_pages(), 1);

    #[derive(sqlx::FromRow)]
    struct Marker {
        name: String,
    }
    let rows: Vec<Marker> = pager.scan().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "paged");
}
