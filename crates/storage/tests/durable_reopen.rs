use storage::{KeyValueStore, SqliteKvStore};

#[tokio::test]
async fn values_survive_reopening_the_database() {
    let suffix = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let root = std::env::temp_dir().join(format!("interview_storage_reopen_{suffix}"));
    let database_url = format!(
        "sqlite://{}",
        root.join("kv.db").to_string_lossy().replace('\\', "/")
    );

    {
        let store = SqliteKvStore::new(&database_url).await.expect("open");
        store
            .set("interview.setup_preferences", r#"{"context":"c"}"#)
            .await
            .expect("set");
        store.pool().close().await;
    }

    let reopened = SqliteKvStore::new(&database_url).await.expect("reopen");
    assert_eq!(
        reopened
            .get("interview.setup_preferences")
            .await
            .expect("get"),
        Some(r#"{"context":"c"}"#.to_string())
    );
    reopened.pool().close().await;

    std::fs::remove_dir_all(root).expect("cleanup");
}
