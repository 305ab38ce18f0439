use gantry_orm::{
    Migration, MigrationDirection, MigrationRegistry, MigrationRunner, MigrationStore,
    RunError, SqlMigration, SqliteStore, TrackingTable,
};
use sqlx::Row;

async fn store() -> SqliteStore {
    SqliteStore::in_memory(TrackingTable::default())
        .await
        .expect("in-memory sqlite")
}

async fn table_exists(store: &SqliteStore, name: &str) -> bool {
    let row = sqlx::query("SELECT COUNT(*) AS n FROM sqlite_master WHERE type = 'table' AND name = ?")
        .bind(name)
        .fetch_one(store.pool())
        .await
        .unwrap();
    row.get::<i64, _>("n") > 0
}

fn registry() -> MigrationRegistry {
    vec![
        Migration::new(
            "001_create_users",
            "Create users table",
            SqlMigration::new(
                "CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT NOT NULL)",
                "DROP TABLE users",
            ),
        ),
        Migration::new(
            "002_create_posts",
            "Create posts table",
            SqlMigration::new(
                "CREATE TABLE posts (id INTEGER PRIMARY KEY, title TEXT); CREATE INDEX idx_posts_title ON posts (title)",
                "DROP INDEX idx_posts_title; DROP TABLE posts",
            ),
        ),
    ]
    .into_iter()
    .collect()
}

#[tokio::test]
async fn test_run_creates_tables_and_tracking_records() {
    let store = store().await;
    let registry = registry();

    let result = MigrationRunner::new(&registry, &store).run().await.unwrap();

    assert_eq!(result.applied, vec!["001_create_users", "002_create_posts"]);
    assert!(table_exists(&store, "migration_records").await);
    assert!(table_exists(&store, "users").await);
    assert!(table_exists(&store, "posts").await);

    let records = store.applied_records().await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].id, "001_create_users");
    assert_eq!(records[0].description, "Create users table");

    let again = MigrationRunner::new(&registry, &store).run().await.unwrap();
    assert!(again.applied.is_empty());
    assert_eq!(again.skipped.len(), 2);
}

#[tokio::test]
async fn test_failed_migration_rolls_back_the_run() {
    let store = store().await;
    let mut registry = registry();
    registry.register(Migration::new(
        "003_broken",
        "References a missing table",
        SqlMigration::new("INSERT INTO missing_table (id) VALUES (1)", ""),
    ));

    let err = MigrationRunner::new(&registry, &store).run().await.unwrap_err();

    assert!(matches!(err, RunError::Apply { ref id, .. } if id == "003_broken"));
    assert!(!table_exists(&store, "users").await);
    assert!(!table_exists(&store, "posts").await);
    assert_eq!(store.count_tracking_record("001_create_users").await.unwrap(), 0);
    assert!(store.applied_records().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_manual_up_and_down() {
    let store = store().await;
    let registry = registry();
    let runner = MigrationRunner::new(&registry, &store);

    runner
        .apply_one("001_create_users", MigrationDirection::Up)
        .await
        .unwrap();
    assert!(table_exists(&store, "users").await);
    assert_eq!(store.count_tracking_record("001_create_users").await.unwrap(), 1);

    runner
        .apply_one("001_create_users", MigrationDirection::Down)
        .await
        .unwrap();
    assert!(!table_exists(&store, "users").await);
    assert_eq!(store.count_tracking_record("001_create_users").await.unwrap(), 0);
}

#[tokio::test]
async fn test_custom_tracking_table() {
    let store = SqliteStore::in_memory(TrackingTable::new("schema_history").unwrap())
        .await
        .unwrap();
    let registry = registry();

    MigrationRunner::new(&registry, &store).run().await.unwrap();

    assert!(table_exists(&store, "schema_history").await);
    assert!(!table_exists(&store, "migration_records").await);
}
