//! End-to-end editorial flow through the public session API.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vector_wave_console::client::BackendClient;
use vector_wave_console::config::{Endpoints, RetryPolicy};
use vector_wave_console::context;
use vector_wave_console::session::{Session, SessionEvent};
use vector_wave_console::state::Writer;
use vector_wave_console::suggestions::PUBLISH_NOW;

fn session_for(server: &MockServer) -> Session {
    let client =
        BackendClient::with_parts(&server.uri(), Endpoints::default(), RetryPolicy::disabled())
            .expect("client");
    Session::new(Arc::new(client), "content/raw")
}

async fn mount_backend(server: &MockServer, score: f64) {
    Mock::given(method("GET"))
        .and(path("/api/styleguides"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "guides": {"voice.md": "Write like a human."},
            "count": 1
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/list-content-folders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "folders": [
                {"name": "2025-07-31-adhd-ideas-overflow", "files_count": 5},
                {"name": "2025-07-31-brainstorm", "files_count": 3}
            ],
            "total": 2
        })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/analyze-folder"))
        .and(body_json(json!({
            "folder_path": "content/raw/2025-07-31-adhd-ideas-overflow"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "folder": "2025-07-31-adhd-ideas-overflow",
            "filesCount": 5,
            "contentType": "SERIES",
            "seriesTitle": "ADHD ideas",
            "valueScore": score,
            "recommendation": "Publish as a three-part series.",
            "topTopics": [
                {"title": "Idea overflow", "platform": "LinkedIn", "viralScore": 9}
            ]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn startup_listing_and_high_value_analysis() {
    let server = MockServer::start().await;
    mount_backend(&server, 9.0).await;
    let session = session_for(&server);
    let mut events = session.subscribe();

    let ready = session.initialize().await;
    assert_eq!(
        ready,
        SessionEvent::Ready {
            folders: 2,
            style_guides: 1
        }
    );
    assert_eq!(events.recv().await.expect("ready event"), ready);

    let listing = session
        .invoke(Writer::Assistant, "listContentFolders", Value::Null)
        .await;
    assert!(listing.contains("Found 2 content folders"), "{listing}");
    assert!(listing.contains("2025-07-31-adhd-ideas-overflow (5 files)"));
    assert!(listing.contains("2025-07-31-brainstorm (3 files)"));
    assert_eq!(session.state().suggestions().len(), 3);

    let analysis = session
        .invoke(
            Writer::User,
            "analyzeFolder",
            json!({"folderPath": "content/raw/2025-07-31-adhd-ideas-overflow"}),
        )
        .await;
    assert_eq!(
        analysis,
        "Analyzed folder content/raw/2025-07-31-adhd-ideas-overflow. Found 5 files of type SERIES."
    );

    let snapshot = session.state().snapshot();
    assert_eq!(snapshot.suggestions[0], PUBLISH_NOW);
    assert_eq!(snapshot.suggestions_writer, Writer::User);
    assert!(!snapshot.analysis_loading);

    let slices = session.readable_context();
    let history = slices
        .iter()
        .find(|slice| slice.name == "analysis_history")
        .expect("history slice");
    assert!(
        history
            .value
            .contains("content/raw/2025-07-31-adhd-ideas-overflow")
    );
    let prompt = context::render_for_prompt(&slices);
    assert!(prompt.contains("Write like a human."));
}

#[tokio::test]
async fn ordinary_analysis_has_no_publish_suggestion() {
    let server = MockServer::start().await;
    mount_backend(&server, 5.0).await;
    let session = session_for(&server);

    session
        .invoke(
            Writer::Assistant,
            "analyzeFolder",
            json!({"folderPath": "content/raw/2025-07-31-adhd-ideas-overflow"}),
        )
        .await;

    let suggestions = session.state().suggestions();
    assert!(!suggestions.iter().any(|s| s == PUBLISH_NOW));
    assert_eq!(
        suggestions[0],
        "Save editorial metadata for content/raw/2025-07-31-adhd-ideas-overflow"
    );
}
