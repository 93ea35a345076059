//! Contract tests run identically against both store backends.

use chrono::{Duration, Utc};
use serde_json::json;

use wct_core::{Message, Schema};
use wct_store::{ArtifactStore, FilesystemStore, InMemoryStore, RunMetadata, RunStatus, StoreError};

fn sample_message(id: &str) -> Message {
    Message::new(
        id,
        json!({ "findings": [], "note": id }),
        Schema::new("personal_data_finding", "1.0.0"),
    )
}

async fn with_backends<F, Fut>(check: F)
where
    F: Fn(Box<dyn ArtifactStore>) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    check(Box::new(InMemoryStore::new())).await;

    let dir = tempfile::tempdir().unwrap();
    let base = camino::Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    check(Box::new(FilesystemStore::new(base))).await;
}

#[tokio::test]
async fn save_then_get_round_trips() {
    with_backends(|store| async move {
        let message = sample_message("m1");
        store.save("run-1", "artifacts/findings", &message).await.unwrap();

        let loaded = store.get("run-1", "artifacts/findings").await.unwrap();
        assert_eq!(loaded.id(), "m1");
        assert_eq!(loaded.content(), message.content());
        assert_eq!(loaded.schema(), message.schema());
    })
    .await;
}

#[tokio::test]
async fn get_missing_fails_with_artifact_not_found() {
    with_backends(|store| async move {
        let err = store.get("run-1", "artifacts/missing").await.unwrap_err();
        assert!(matches!(err, StoreError::ArtifactNotFound { .. }));
    })
    .await;
}

#[tokio::test]
async fn save_is_upsert() {
    with_backends(|store| async move {
        store.save("run-1", "artifacts/a", &sample_message("first")).await.unwrap();
        store.save("run-1", "artifacts/a", &sample_message("second")).await.unwrap();

        let loaded = store.get("run-1", "artifacts/a").await.unwrap();
        assert_eq!(loaded.id(), "second");
    })
    .await;
}

#[tokio::test]
async fn exists_and_delete_are_observable_and_idempotent() {
    with_backends(|store| async move {
        assert!(!store.exists("run-1", "artifacts/a").await.unwrap());

        store.save("run-1", "artifacts/a", &sample_message("m")).await.unwrap();
        assert!(store.exists("run-1", "artifacts/a").await.unwrap());

        store.delete("run-1", "artifacts/a").await.unwrap();
        assert!(!store.exists("run-1", "artifacts/a").await.unwrap());

        // Deleting again is a no-op.
        store.delete("run-1", "artifacts/a").await.unwrap();
    })
    .await;
}

#[tokio::test]
async fn list_keys_excludes_system_and_honours_prefix() {
    with_backends(|store| async move {
        store.save("run-1", "artifacts/a", &sample_message("a")).await.unwrap();
        store.save("run-1", "artifacts/nested/b", &sample_message("b")).await.unwrap();
        store.save_raw("run-1", "cache/key1", &json!({"status": "completed"})).await.unwrap();
        store.save_raw("run-1", "_system/state", &json!({"run_id": "run-1"})).await.unwrap();

        let all = store.list_keys("run-1", "").await.unwrap();
        assert_eq!(all, vec!["artifacts/a", "artifacts/nested/b", "cache/key1"]);

        let artifacts = store.list_keys("run-1", "artifacts/").await.unwrap();
        assert_eq!(artifacts, vec!["artifacts/a", "artifacts/nested/b"]);
    })
    .await;
}

#[tokio::test]
async fn clear_preserves_system_documents() {
    with_backends(|store| async move {
        store.save("run-1", "artifacts/a", &sample_message("a")).await.unwrap();
        store.save_raw("run-1", "cache/key1", &json!({})).await.unwrap();
        store.save_raw("run-1", "_system/state", &json!({"run_id": "run-1"})).await.unwrap();

        store.clear("run-1").await.unwrap();

        assert!(store.list_keys("run-1", "").await.unwrap().is_empty());
        assert!(
            store.get_raw("run-1", "_system/state").await.unwrap().is_some(),
            "system documents must survive clear"
        );
    })
    .await;
}

#[tokio::test]
async fn runs_are_isolated_from_each_other() {
    with_backends(|store| async move {
        store.save("run-1", "artifacts/a", &sample_message("a")).await.unwrap();

        assert!(!store.exists("run-2", "artifacts/a").await.unwrap());
        assert!(store.list_keys("run-2", "").await.unwrap().is_empty());
    })
    .await;
}

#[tokio::test]
async fn key_validation_rejects_escapes() {
    with_backends(|store| async move {
        let err = store
            .save_raw("run-1", "../escape", &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey { .. }));

        let err = store.get_raw("run-1", "/absolute").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey { .. }));
    })
    .await;
}

#[tokio::test]
async fn cache_view_set_get_clear() {
    with_backends(|store| async move {
        assert!(store.cache_get("run-1", "abc").await.unwrap().is_none());

        store.cache_set("run-1", "abc", &json!({"status": "pending"})).await.unwrap();
        let entry = store.cache_get("run-1", "abc").await.unwrap().unwrap();
        assert_eq!(entry["status"], "pending");

        // Artifacts are untouched by cache_clear.
        store.save("run-1", "artifacts/a", &sample_message("a")).await.unwrap();
        store.cache_clear("run-1").await.unwrap();

        assert!(store.cache_get("run-1", "abc").await.unwrap().is_none());
        assert!(store.exists("run-1", "artifacts/a").await.unwrap());
    })
    .await;
}

#[tokio::test]
async fn list_runs_sorts_most_recent_first_and_filters() {
    with_backends(|store| async move {
        let now = Utc::now();
        let older = RunMetadata {
            run_id: "run-old".to_string(),
            runbook_path: "a.yaml".to_string(),
            runbook_hash: "h1".to_string(),
            start_timestamp: now - Duration::hours(1),
            status: RunStatus::Completed,
        };
        let newer = RunMetadata {
            run_id: "run-new".to_string(),
            runbook_path: "b.yaml".to_string(),
            runbook_hash: "h2".to_string(),
            start_timestamp: now,
            status: RunStatus::Paused,
        };
        store.save_run_metadata("run-old", &older).await.unwrap();
        store.save_run_metadata("run-new", &newer).await.unwrap();

        let all = store.list_runs(None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].run_id, "run-new");
        assert_eq!(all[1].run_id, "run-old");

        let paused = store.list_runs(Some(RunStatus::Paused)).await.unwrap();
        assert_eq!(paused.len(), 1);
        assert_eq!(paused[0].run_id, "run-new");
    })
    .await;
}

#[tokio::test]
async fn concurrent_saves_to_distinct_keys_are_safe() {
    let store = std::sync::Arc::new(InMemoryStore::new());

    let mut handles = Vec::new();
    for i in 0..16 {
        let store = std::sync::Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            let key = format!("artifacts/item-{i}");
            store.save("run-1", &key, &sample_message(&format!("m{i}"))).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let keys = store.list_keys("run-1", "artifacts/").await.unwrap();
    assert_eq!(keys.len(), 16);
}
