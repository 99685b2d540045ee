//! HTTP surface tests against a live server on an ephemeral port.

use std::net::SocketAddr;
use std::sync::Arc;

use consult_core::collaborators::{HttpKnowledgeBackend, TavilySearch};
use consult_core::models::ActionKind;
use consult_core::oracle::ScriptedOracle;
use consult_core::{AppState, AppStateInner, ConsultConfig, Database};
use consult_server::{start_server_with_state, ServerConfig};

async fn spawn(oracle: Arc<ScriptedOracle>) -> (SocketAddr, AppState) {
    let state: AppState = Arc::new(
        AppStateInner::with_collaborators(
            Database::open_in_memory().unwrap(),
            &ConsultConfig::default(),
            oracle,
            Arc::new(TavilySearch::new(None)),
            Arc::new(HttpKnowledgeBackend::new(None)),
        )
        .unwrap(),
    );
    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        db_path: ":memory:".to_string(),
        session_ttl_secs: None,
    };
    let addr = start_server_with_state(config, state.clone()).await.unwrap();
    (addr, state)
}

/// Split an SSE body into (event name, JSON data) pairs.
fn parse_sse(body: &str) -> Vec<(String, serde_json::Value)> {
    body.split("\n\n")
        .filter_map(|frame| {
            let mut name = None;
            let mut data = String::new();
            for line in frame.lines() {
                if let Some(v) = line.strip_prefix("event:") {
                    name = Some(v.trim().to_string());
                } else if let Some(v) = line.strip_prefix("data:") {
                    data.push_str(v.trim_start());
                }
            }
            Some((name?, serde_json::from_str(&data).ok()?))
        })
        .collect()
}

async fn get_events(url: String, query: &[(&str, &str)]) -> Vec<(String, serde_json::Value)> {
    let response = reqwest::Client::new().get(url).query(query).send().await.unwrap();
    assert_eq!(response.status(), 200);
    parse_sse(&response.text().await.unwrap())
}

#[tokio::test]
async fn test_health() {
    let (addr, _) = spawn(Arc::new(ScriptedOracle::new())).await;
    let body: serde_json::Value = reqwest::get(format!("http://{}/api/health", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_start_and_resume_stream() {
    let oracle = Arc::new(ScriptedOracle::new());
    oracle
        .ask("intake", "Which eye is affected?")
        .say("intake", "Ophthalmologist")
        .act(
            "ophthalmology",
            ActionKind::LogFinding,
            serde_json::json!({"report": "Allergic conjunctivitis"}),
        )
        .say("ophthalmology", "Final Report: antihistamine drops");
    let (addr, _) = spawn(oracle).await;

    let events = get_events(
        format!("http://{}/api/consult/start/stream", addr),
        &[("message", "my eye is red")],
    )
    .await;
    let names: Vec<&str> = events.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["session", "action", "awaiting-input"]);
    let session_id = events[0].1["sessionId"].as_str().unwrap().to_string();
    assert_eq!(events[1].1["kind"], "interactive-question");
    assert_eq!(events[2].1["question"], "Which eye is affected?");
    assert_eq!(events[2].1["role"], "intake");

    let events = get_events(
        format!("http://{}/api/consult/resume/stream", addr),
        &[("sessionId", session_id.as_str()), ("answer", "the left one")],
    )
    .await;
    let (name, data) = events.last().unwrap();
    assert_eq!(name, "final");
    assert_eq!(data["role"], "ophthalmology");
    assert_eq!(
        data["report"],
        "Allergic conjunctivitis\n\nFinal Report: antihistamine drops"
    );
    let texts: Vec<&str> = events
        .iter()
        .filter(|(n, _)| n == "message")
        .filter_map(|(_, d)| d["text"].as_str())
        .collect();
    assert_eq!(
        texts,
        vec![
            "the left one",
            "Ophthalmologist",
            "Report added to patient's record.",
            "Final Report: antihistamine drops",
        ]
    );

    // Snapshot and listing
    let body: serde_json::Value = reqwest::get(format!("http://{}/api/sessions/{}", addr, session_id))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["session"]["status"]["state"], "terminal");
    assert_eq!(body["session"]["activeRole"], "ophthalmology");

    let body: serde_json::Value = reqwest::get(format!("http://{}/api/sessions?limit=5", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["sessions"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_resume_error_statuses() {
    let oracle = Arc::new(ScriptedOracle::new());
    oracle.ask("intake", "Age?").say("intake", "Final words");
    let (addr, state) = spawn(oracle).await;
    let client = reqwest::Client::new();
    let resume_url = format!("http://{}/api/consult/resume/stream", addr);

    let response = client
        .get(&resume_url)
        .query(&[("sessionId", "missing"), ("answer", "x")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    let events = get_events(
        format!("http://{}/api/consult/start/stream", addr),
        &[("message", "cough")],
    )
    .await;
    let session_id = events[0].1["sessionId"].as_str().unwrap().to_string();

    // Busy
    let guard = state.orchestrator.locks().try_acquire(&session_id).unwrap();
    let response = client
        .get(&resume_url)
        .query(&[("sessionId", session_id.as_str()), ("answer", "40")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);
    drop(guard);

    // Answer once: intake then chatters until its script runs out and fails.
    get_events(resume_url.clone(), &[("sessionId", session_id.as_str()), ("answer", "40")]).await;

    // No pending question any more.
    let response = client
        .get(&resume_url)
        .query(&[("sessionId", session_id.as_str()), ("answer", "40")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("failed"));
}

#[tokio::test]
async fn test_start_requires_message() {
    let (addr, _) = spawn(Arc::new(ScriptedOracle::new())).await;
    let response = reqwest::get(format!("http://{}/api/consult/start/stream", addr))
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_roles_and_delete() {
    let oracle = Arc::new(ScriptedOracle::new());
    oracle.ask("intake", "Age?");
    let (addr, _) = spawn(oracle).await;
    let client = reqwest::Client::new();

    let body: serde_json::Value = reqwest::get(format!("http://{}/api/roles", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let roles = body["roles"].as_array().unwrap();
    assert_eq!(roles.len(), 11);
    assert_eq!(roles[0]["id"], "intake");
    assert_eq!(body["fallbackRole"], "orthopedics");

    let events = get_events(
        format!("http://{}/api/consult/start/stream", addr),
        &[("message", "fever")],
    )
    .await;
    let session_id = events[0].1["sessionId"].as_str().unwrap().to_string();
    let url = format!("http://{}/api/sessions/{}", addr, session_id);

    assert_eq!(client.delete(&url).send().await.unwrap().status(), 200);
    assert_eq!(client.delete(&url).send().await.unwrap().status(), 404);
    assert_eq!(client.get(&url).send().await.unwrap().status(), 404);
}
