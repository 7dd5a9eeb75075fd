//! Tests for the remote filer backend against a mock cluster.

use blobvault_storage::{
    RemoteBackend, RemoteBackendConfig, StorageBackend, StorageErrorKind, collect_stream,
    stream_from_bytes,
};
use httpmock::Method::{DELETE, GET, POST};
use httpmock::MockServer;
use serde_json::json;
use std::net::TcpListener;

fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

async fn healthy_cluster() -> MockServer {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/cluster/status");
            then.status(200).json_body(json!({ "IsLeader": true }));
        })
        .await;
    server
}

fn config_for(server: &MockServer) -> RemoteBackendConfig {
    RemoteBackendConfig {
        master_url: server.base_url(),
        filer_url: Some(server.base_url()),
        timeout_secs: 5,
        list_page_size: 2,
    }
}

#[tokio::test]
async fn test_connect_fails_when_master_unhealthy() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/cluster/status");
            then.status(503);
        })
        .await;

    let err = RemoteBackend::connect(&config_for(&server)).await.unwrap_err();
    assert!(matches!(err.kind(), StorageErrorKind::Unavailable(_)));
}

#[tokio::test]
async fn test_put_uploads_multipart_file() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = healthy_cluster().await;
    let upload = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/blobs/ab/cd/object-1")
                .header_exists("content-type")
                .body_contains("Hello, World!");
            then.status(201).json_body(json!({ "name": "object-1", "size": 13 }));
        })
        .await;

    let backend = RemoteBackend::connect(&config_for(&server)).await.unwrap();
    let written = backend
        .put(
            "blobs/ab/cd/object-1",
            stream_from_bytes(b"Hello, World!".to_vec()),
            13,
        )
        .await
        .unwrap();

    assert_eq!(written, 13);
    upload.assert_async().await;
}

#[tokio::test]
async fn test_put_rejects_error_status() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = healthy_cluster().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/blobs/fail");
            then.status(500).body("volume full");
        })
        .await;

    let backend = RemoteBackend::connect(&config_for(&server)).await.unwrap();
    let err = backend
        .put("blobs/fail", stream_from_bytes(b"x".to_vec()), 1)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("volume full"));
}

#[tokio::test]
async fn test_get_streams_body_and_maps_missing() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = healthy_cluster().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/blobs/present");
            then.status(200).body("stored bytes");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/blobs/absent");
            then.status(404);
        })
        .await;

    let backend = RemoteBackend::connect(&config_for(&server)).await.unwrap();

    let body = collect_stream(backend.get("blobs/present").await.unwrap())
        .await
        .unwrap();
    assert_eq!(body, b"stored bytes");

    let err = match backend.get("blobs/absent").await {
        Ok(_) => panic!("expected not found"),
        Err(e) => e,
    };
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_delete_tolerates_missing() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = healthy_cluster().await;
    server
        .mock_async(|when, then| {
            when.method(DELETE).path("/blobs/gone");
            then.status(404);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(DELETE).path("/blobs/here");
            then.status(204);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(DELETE).path("/blobs/stuck");
            then.status(500);
        })
        .await;

    let backend = RemoteBackend::connect(&config_for(&server)).await.unwrap();
    backend.delete("blobs/gone").await.unwrap();
    backend.delete("blobs/here").await.unwrap();
    assert!(backend.delete("blobs/stuck").await.is_err());
}

#[tokio::test]
async fn test_list_recurses_and_paginates() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = healthy_cluster().await;

    // Second page is registered first so it wins over the general first-page mock.
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/blobs/")
                .query_param("lastFileName", "a1");
            then.status(200).json_body(json!({
                "Path": "/blobs",
                "Entries": [{ "FullPath": "/blobs/z9", "Mode": 420 }],
                "LastFileName": "z9",
                "ShouldDisplayLoadMore": false
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/blobs/")
                .query_param("limit", "2")
                .header("accept", "application/json");
            then.status(200).json_body(json!({
                "Path": "/blobs",
                "Entries": [
                    { "FullPath": "/blobs/ab", "Mode": 2147484141u64 },
                    { "FullPath": "/blobs/a1", "Mode": 420 }
                ],
                "LastFileName": "a1",
                "ShouldDisplayLoadMore": true
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/blobs/ab/");
            then.status(200).json_body(json!({
                "Path": "/blobs/ab",
                "Entries": [{ "FullPath": "/blobs/ab/cd", "Mode": 420 }],
                "LastFileName": "cd",
                "ShouldDisplayLoadMore": false
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/missing/");
            then.status(404);
        })
        .await;

    let backend = RemoteBackend::connect(&config_for(&server)).await.unwrap();

    let listed = backend.list("blobs").await.unwrap();
    assert_eq!(listed, vec!["blobs/a1", "blobs/ab/cd", "blobs/z9"]);

    assert!(backend.list("missing").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_traversal_rejected() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = healthy_cluster().await;
    let backend = RemoteBackend::connect(&config_for(&server)).await.unwrap();

    let err = backend
        .put("../escape", stream_from_bytes(b"x".to_vec()), 1)
        .await
        .unwrap_err();
    assert!(err.is_invalid_path());
}
