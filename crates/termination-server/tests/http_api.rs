use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::{Duration, TimeZone, Utc};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use termination_core::DetectorBuilder;
use termination_core::domain::{
    CompletionOutcome, ProcessId, ProcessState, RegistrationOutcome, TaskKey, TerminalState,
};
use termination_core::impls::InMemoryTaskStore;
use termination_core::ports::FixedClock;
use termination_server::{DetectorClient, router};
use tower::ServiceExt;

fn noon() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
}

fn app() -> (Router, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::new(noon() - Duration::hours(1)));
    let detector = DetectorBuilder::new()
        .store(Arc::new(InMemoryTaskStore::new()))
        .clock(clock.clone())
        .retention(Duration::hours(12))
        .build()
        .unwrap();
    (router(detector), clock)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, String) {
    let mut request = Request::builder().method(method).uri(uri);
    if body.is_some() {
        request = request.header(header::CONTENT_TYPE, "application/json");
    }
    let request = request
        .body(body.map(|b| Body::from(b.to_owned())).unwrap_or_else(Body::empty))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

const REGISTRATION: &str = r#"{"expirationTime":"2024-01-01T12:00:00Z"}"#;

#[tokio::test]
async fn register_echoes_body_then_conflicts() {
    let (app, _) = app();

    let (status, body) = send(&app, "PUT", "/processes/p1/tasks/t1", Some(REGISTRATION)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, REGISTRATION);

    let (status, body) = send(&app, "PUT", "/processes/p1/tasks/t1", Some(REGISTRATION)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, "Conflict");
}

#[tokio::test]
async fn unknown_process_is_404() {
    let (app, _) = app();
    let (status, body) = send(&app, "GET", "/processes/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, "Not Found");
}

#[tokio::test]
async fn process_moves_from_created_to_completed() {
    let (app, _) = app();
    send(&app, "PUT", "/processes/p1/tasks/t1", Some(REGISTRATION)).await;

    let (status, body) = send(&app, "GET", "/processes/p1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        serde_json::from_str::<Value>(&body).unwrap(),
        json!({"id": "p1", "state": "CREATED"})
    );

    let (status, _) = send(
        &app,
        "PUT",
        "/processes/p1/tasks/t1/completion",
        Some(r#"{"state":"COMPLETED"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = send(&app, "GET", "/processes/p1", None).await;
    assert_eq!(
        serde_json::from_str::<Value>(&body).unwrap(),
        json!({"id": "p1", "state": "COMPLETED"})
    );

    let (status, body) = send(
        &app,
        "PUT",
        "/processes/p1/tasks/t1/completion",
        Some(r#"{"state":"ERROR","errorMessage":"late"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, "Conflict");
}

#[tokio::test]
async fn aborted_task_reports_error_message() {
    let (app, _) = app();
    send(&app, "PUT", "/processes/p1/tasks/t1", Some(REGISTRATION)).await;
    send(&app, "PUT", "/processes/p1/tasks/t2", Some(REGISTRATION)).await;
    send(
        &app,
        "PUT",
        "/processes/p1/tasks/t2/completion",
        Some(r#"{"state":"ERROR","errorMessage":"disk full"}"#),
    )
    .await;

    let (_, body) = send(&app, "GET", "/processes/p1", None).await;
    assert_eq!(
        serde_json::from_str::<Value>(&body).unwrap(),
        json!({"id": "p1", "state": "ERROR", "stateMessage": "disk full"})
    );
}

#[tokio::test]
async fn missed_deadline_times_out_process() {
    let (app, clock) = app();
    send(&app, "PUT", "/processes/p1/tasks/t1", Some(REGISTRATION)).await;
    clock.advance(Duration::hours(2));

    let (status, _) = send(
        &app,
        "PUT",
        "/processes/p1/tasks/t1/completion",
        Some(r#"{"state":"COMPLETED"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = send(&app, "GET", "/processes/p1", None).await;
    assert_eq!(
        serde_json::from_str::<Value>(&body).unwrap(),
        json!({"id": "p1", "state": "ERROR", "stateMessage": "process timed out"})
    );
}

#[tokio::test]
async fn completing_unknown_task_conflicts() {
    let (app, _) = app();
    let (status, _) = send(
        &app,
        "PUT",
        "/processes/p1/tasks/ghost/completion",
        Some(r#"{"state":"COMPLETED"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&app, "GET", "/processes/p1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[rstest::rstest]
#[case::not_json("/processes/p1/tasks/t1", "nope")]
#[case::missing_field("/processes/p1/tasks/t1", "{}")]
#[case::bad_timestamp("/processes/p1/tasks/t1", r#"{"expirationTime":"tomorrow"}"#)]
#[case::unknown_state("/processes/p1/tasks/t1/completion", r#"{"state":"FINISHED"}"#)]
#[tokio::test]
async fn malformed_bodies_are_400(#[case] uri: &str, #[case] body: &str) {
    let (app, _) = app();
    let (status, text) = send(&app, "PUT", uri, Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(text, "Bad Request");
}

#[tokio::test]
async fn blank_ids_are_400() {
    let (app, _) = app();
    let (status, _) = send(&app, "PUT", "/processes/%20/tasks/t1", Some(REGISTRATION)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn request_id_is_echoed_or_generated() {
    let (app, _) = app();

    let request = Request::builder()
        .uri("/processes/p1")
        .header("x-request-id", "abc-123")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "abc-123");

    let request = Request::builder().uri("/processes/p1").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    let generated = response.headers()["x-request-id"].to_str().unwrap();
    assert_eq!(generated.len(), 26);
}

async fn live_client() -> DetectorClient {
    let (app, _) = app();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    DetectorClient::new(&format!("http://{addr}")).unwrap()
}

#[tokio::test]
async fn client_round_trips_through_live_server() {
    let client = live_client().await;
    let key = TaskKey::parse("p1", "t1").unwrap();
    let p1 = ProcessId::parse("p1").unwrap();

    assert_eq!(client.get(&p1).await.unwrap(), None);
    assert_eq!(
        client.register(&key, noon()).await.unwrap(),
        RegistrationOutcome::Created
    );
    assert_eq!(
        client.register(&key, noon()).await.unwrap(),
        RegistrationOutcome::AlreadyRegistered
    );
    assert_eq!(
        client.get(&p1).await.unwrap().map(|p| p.state),
        Some(ProcessState::Created)
    );
    assert_eq!(
        client
            .complete(&key, TerminalState::Aborted, Some("disk full".into()))
            .await
            .unwrap(),
        CompletionOutcome::Completed
    );
    assert_eq!(
        client.complete(&key, TerminalState::Finished, None).await.unwrap(),
        CompletionOutcome::Conflict
    );

    let process = client.get(&p1).await.unwrap().unwrap();
    assert_eq!(process.state, ProcessState::Error);
    assert_eq!(process.state_message.as_deref(), Some("disk full"));
}

#[tokio::test]
async fn client_keeps_reserved_characters_inside_ids() {
    let client = live_client().await;
    let first = TaskKey::parse("p1", "job?x=1").unwrap();
    let second = TaskKey::parse("p1", "job?x=2").unwrap();
    let bare = TaskKey::parse("p1", "job").unwrap();

    assert_eq!(
        client.register(&first, noon()).await.unwrap(),
        RegistrationOutcome::Created
    );
    assert_eq!(
        client.register(&second, noon()).await.unwrap(),
        RegistrationOutcome::Created
    );
    // "job" was never registered, so completing it touches neither task
    assert_eq!(
        client.complete(&bare, TerminalState::Aborted, None).await.unwrap(),
        CompletionOutcome::Conflict
    );
    let p1 = ProcessId::parse("p1").unwrap();
    assert_eq!(
        client.get(&p1).await.unwrap().map(|p| p.state),
        Some(ProcessState::Created)
    );

    let nested = TaskKey::parse("team/a#1", "build/step#2").unwrap();
    assert_eq!(
        client.register(&nested, noon()).await.unwrap(),
        RegistrationOutcome::Created
    );
    assert_eq!(
        client.complete(&nested, TerminalState::Finished, None).await.unwrap(),
        CompletionOutcome::Completed
    );
    let process = client.get(&nested.process_id).await.unwrap().unwrap();
    assert_eq!(process.id, "team/a#1");
    assert_eq!(process.state, ProcessState::Completed);
    assert_eq!(client.get(&ProcessId::parse("team").unwrap()).await.unwrap(), None);
}
