//! End-to-end write-path flows against a scripted upstream: the
//! fetch-then-update contract, conflict detection, and delete-then-get.

#![allow(clippy::unwrap_used)]

use serde_json::json;
use trilium_core::{Config, EtapiClient};
use trilium_mcp::tools;
use wiremock::matchers::{body_string, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn client_for(server: &MockServer) -> EtapiClient {
    let config = Config::new(&format!("{}/etapi", server.uri()), "tok_test").unwrap();
    EtapiClient::new(&config).unwrap()
}

fn note_json(blob: &str) -> serde_json::Value {
    json!({"noteId": "n1", "title": "Journal", "type": "text", "blobId": blob})
}

#[tokio::test]
async fn get_then_update_with_the_returned_hash_succeeds() {
    let server = MockServer::start().await;

    // Phase 1: the note carries hash H1 and body "<p>old</p>".
    Mock::given(method("GET"))
        .and(path("/etapi/notes/n1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(note_json("H1")))
        .up_to_n_times(2) // one for get_note, one for the update's hash check
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/etapi/notes/n1/content"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>old</p>"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/etapi/notes/n1/revision"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/etapi/notes/n1/content"))
        .and(body_string("<p>new</p>"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    // Phase 2: after the put, the note reports the advanced hash H2.
    Mock::given(method("GET"))
        .and(path("/etapi/notes/n1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(note_json("H2")))
        .mount(&server)
        .await;

    let client = client_for(&server).await;

    let got = tools::handle_get(
        &client,
        serde_json::from_value(json!({"noteId": "n1"})).unwrap(),
    )
    .await
    .unwrap();
    let hash = got.content_hash.unwrap();
    assert_eq!(hash, "H1");

    let written = tools::handle_update(
        &client,
        serde_json::from_value(json!({
            "noteId": "n1",
            "expectedHash": hash,
            "type": "text",
            "content": "<p>new</p>"
        }))
        .unwrap(),
    )
    .await
    .unwrap();

    assert_eq!(written.note_id, "n1");
    assert_eq!(written.new_hash, "H2");
    assert!(written.revision_created);
}

#[tokio::test]
async fn a_write_in_between_turns_the_update_into_a_conflict() {
    let server = MockServer::start().await;
    // The caller read H1 earlier, but the note has moved on to H2.
    Mock::given(method("GET"))
        .and(path("/etapi/notes/n1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(note_json("H2")))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/etapi/notes/n1/content"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = tools::handle_update(
        &client,
        serde_json::from_value(json!({
            "noteId": "n1",
            "expectedHash": "H1",
            "type": "text",
            "content": "<p>stale write</p>"
        }))
        .unwrap(),
    )
    .await
    .unwrap_err();

    let msg = err.to_string();
    assert!(msg.contains("H1") && msg.contains("H2"));
    assert!(msg.contains("re-fetch"));
}

#[tokio::test]
async fn delete_then_get_reports_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/etapi/notes/n1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/etapi/notes/n1"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "status": 404, "code": "NOTE_NOT_FOUND", "message": "Note 'n1' not found"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;

    let status = tools::handle_delete(
        &client,
        serde_json::from_value(json!({"noteId": "n1"})).unwrap(),
    )
    .await
    .unwrap();
    assert_eq!(status, "Deleted note n1");

    let err = tools::handle_get(
        &client,
        serde_json::from_value(json!({"noteId": "n1"})).unwrap(),
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("not found"));
}
