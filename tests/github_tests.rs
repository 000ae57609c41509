use bytes::Bytes;
use httpmock::prelude::*;
use serde_json::json;
use std::time::Duration;
use xpi_nightly::error::{GitHubError, ReleaseError};
use xpi_nightly::github::{GitHubReleaseConfig, GitHubReleaseManager, ReleaseHost, ReleaseRecord};

fn manager(server: &MockServer) -> GitHubReleaseManager {
    GitHubReleaseManager::new(GitHubReleaseConfig {
        owner: "me".to_string(),
        repo: "ext".to_string(),
        api_base: server.base_url(),
        user: "me".to_string(),
        password: "s3cret".to_string(),
        timeout: Duration::from_secs(10),
    })
    .unwrap()
}

#[tokio::test]
async fn test_create_release() {
    let server = MockServer::start_async().await;
    let upload_url = server.url("/upload/1/assets{?name,label}");
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/repos/me/ext/releases")
                .header_exists("authorization")
                .json_body(json!({
                    "tag_name": "nightly-2024-01-02-0304",
                    "name": "Example nightly - 2024-01-02 03:04",
                    "body": "Automated build",
                }));
            then.status(201)
                .json_body(json!({ "id": 1, "upload_url": upload_url }));
        })
        .await;

    let release = manager(&server)
        .create_release("nightly-2024-01-02-0304", "Example nightly - 2024-01-02 03:04")
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(release.id, 1);
    assert_eq!(release.upload_url, server.url("/upload/1/assets"));
}

#[tokio::test]
async fn test_create_release_rejects_other_status() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/repos/me/ext/releases");
            then.status(422).body("tag already has a release");
        })
        .await;

    let err = manager(&server)
        .create_release("nightly-2024-01-02-0304", "Example nightly")
        .await
        .unwrap_err();

    match err {
        ReleaseError::GitHub(GitHubError::UnexpectedStatus { status, body, .. }) => {
            assert_eq!(status, 422);
            assert_eq!(body, "tag already has a release");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_create_release_with_unreadable_body() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/repos/me/ext/releases");
            then.status(201).body("not json");
        })
        .await;

    let err = manager(&server)
        .create_release("nightly-2024-01-02-0304", "Example nightly")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ReleaseError::GitHub(GitHubError::InvalidResponse { .. })
    ));
}

#[tokio::test]
async fn test_upload_asset() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/upload/1/assets")
                .query_param("name", "ext-nightly-2024-01-02-0304.xpi")
                .header("content-type", "application/x-xpinstall")
                .body("PK-bytes");
            then.status(201).json_body(json!({ "id": 9 }));
        })
        .await;

    let release = ReleaseRecord {
        id: 1,
        upload_url: server.url("/upload/1/assets"),
    };
    manager(&server)
        .upload_asset(
            &release,
            "ext-nightly-2024-01-02-0304.xpi",
            Bytes::from_static(b"PK-bytes"),
        )
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_upload_asset_failure() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/upload/1/assets");
            then.status(500);
        })
        .await;

    let release = ReleaseRecord {
        id: 1,
        upload_url: server.url("/upload/1/assets"),
    };
    let err = manager(&server)
        .upload_asset(&release, "ext.xpi", Bytes::from_static(b"PK"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ReleaseError::GitHub(GitHubError::UnexpectedStatus { status: 500, .. })
    ));
}

#[tokio::test]
async fn test_delete_release() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(DELETE).path("/repos/me/ext/releases/1");
            then.status(204);
        })
        .await;

    let release = ReleaseRecord {
        id: 1,
        upload_url: server.url("/upload/1/assets"),
    };
    manager(&server).delete_release(&release).await.unwrap();

    assert_eq!(mock.hits_async().await, 1);
}
