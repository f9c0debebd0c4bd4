// File-backed option store tests

use common::models::OptionKey;
use common::store::{FileOptionStore, OptionStore};

#[tokio::test]
async fn test_values_survive_a_new_instance() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("options.json");

    let store = FileOptionStore::new(&path);
    store
        .set(OptionKey::GithubAccessToken, "ghp_secret".to_string())
        .await
        .unwrap();
    store
        .set(OptionKey::SelectScheduleBuilds, "daily".to_string())
        .await
        .unwrap();

    let reopened = FileOptionStore::new(&path);
    assert_eq!(
        reopened.get(OptionKey::GithubAccessToken).await.unwrap().as_deref(),
        Some("ghp_secret")
    );
    assert_eq!(
        reopened.get(OptionKey::SelectScheduleBuilds).await.unwrap().as_deref(),
        Some("daily")
    );
}

#[tokio::test]
async fn test_file_uses_stable_key_names() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("options.json");

    let store = FileOptionStore::new(&path);
    store
        .set(OptionKey::EnableOnPostUpdate, "enable".to_string())
        .await
        .unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["enable_on_post_update"], "enable");
}

#[tokio::test]
async fn test_external_edits_are_visible() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("options.json");
    let store = FileOptionStore::new(&path);
    assert_eq!(store.get(OptionKey::WebhookAddress).await.unwrap(), None);

    std::fs::write(
        &path,
        r#"{"webhook_address": "https://example.test/wf/dispatches"}"#,
    )
    .unwrap();

    assert_eq!(
        store.get(OptionKey::WebhookAddress).await.unwrap().as_deref(),
        Some("https://example.test/wf/dispatches")
    );
}

#[tokio::test]
async fn test_delete_removes_key() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileOptionStore::new(dir.path().join("options.json"));
    store
        .set(OptionKey::GithubRepo, "site".to_string())
        .await
        .unwrap();
    store.delete(OptionKey::GithubRepo).await.unwrap();

    assert_eq!(store.get(OptionKey::GithubRepo).await.unwrap(), None);
    assert!(store.all().await.unwrap().is_empty());
}
