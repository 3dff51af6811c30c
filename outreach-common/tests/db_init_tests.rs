//! Tests for database creation and schema initialization

use outreach_common::db::init::{init_database, init_schema};

#[tokio::test]
async fn test_database_creation_when_missing() {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("nested").join("outreach.db");

    let pool = init_database(&db_path).await;
    assert!(pool.is_ok(), "Database initialization failed: {:?}", pool.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_schema_is_idempotent() {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("outreach.db");

    let pool = init_database(&db_path).await.unwrap();
    init_schema(&pool).await.expect("second schema pass should succeed");

    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(&pool)
    .await
    .unwrap();

    assert_eq!(tables, vec!["campaign_contacts", "campaigns", "email_sends"]);
}

#[tokio::test]
async fn test_delivery_status_is_constrained() {
    let temp_dir = tempfile::tempdir().unwrap();
    let pool = init_database(&temp_dir.path().join("outreach.db")).await.unwrap();

    let result = sqlx::query(
        "INSERT INTO email_sends (campaign_id, recipient_email, status, created_at) VALUES ('c', 'a@b.test', 'bounced', '2026-01-01T00:00:00Z')",
    )
    .execute(&pool)
    .await;

    assert!(result.is_err(), "unknown delivery status must be rejected");
}

#[tokio::test]
async fn test_connection_settings_apply_to_every_connection() {
    let temp_dir = tempfile::tempdir().unwrap();
    let pool = init_database(&temp_dir.path().join("outreach.db")).await.unwrap();

    // Hold several connections at once so each one is distinct
    let mut connections = Vec::new();
    for _ in 0..3 {
        connections.push(pool.acquire().await.unwrap());
    }

    for conn in connections.iter_mut() {
        let busy_timeout: i64 = sqlx::query_scalar("PRAGMA busy_timeout")
            .fetch_one(&mut **conn)
            .await
            .unwrap();
        let foreign_keys: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(&mut **conn)
            .await
            .unwrap();
        let journal_mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(&mut **conn)
            .await
            .unwrap();

        assert_eq!(busy_timeout, 5000);
        assert_eq!(foreign_keys, 1);
        assert_eq!(journal_mode, "wal");
    }
}
