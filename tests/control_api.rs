use std::sync::Arc;
use std::time::Duration;

use action_flow::fake::{CodeSourceFixture, FakeTabs, TargetFixture, Verdict};
use action_flow::{RelayController, RelayProfile, RelayTimings};
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use futures::StreamExt;
use invite_relay::{build_router, ServeState};
use relay_state_center::{Phase, StateCenter};
use serde_json::{json, Value};
use tokio::time::timeout;
use tower::ServiceExt;

struct Harness {
    router: Router,
    controller: Arc<RelayController>,
    target: TargetFixture,
}

fn harness(codes: &[&str], verdicts: Vec<Verdict>) -> Harness {
    let source = CodeSourceFixture::new(codes);
    let target = TargetFixture::new(verdicts);
    let tabs = FakeTabs::new();
    tabs.open("https://formbiz.biz/", source.page.clone());
    tabs.prepare("https://sora.chatgpt.com/explore", target.page.clone());

    let profile = RelayProfile {
        timings: RelayTimings::quick(),
        ..RelayProfile::default()
    };
    let controller = RelayController::new(tabs, StateCenter::new(256), profile);
    let router = build_router(ServeState::new(controller.clone(), None));
    Harness {
        router,
        controller,
        target,
    }
}

async fn send(
    router: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            request = request.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let response = router
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn settle(controller: &RelayController) {
    timeout(Duration::from_secs(5), controller.wait())
        .await
        .expect("run did not finish");
}

#[tokio::test]
async fn health_reports_idle_relay() {
    let harness = harness(&[], vec![]);
    let (status, body) = send(&harness.router, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["running"], false);
    assert_eq!(body["phase"], "idle");
}

#[tokio::test]
async fn state_route_returns_wire_shape() {
    let harness = harness(&[], vec![]);
    let (status, body) = send(&harness.router, "GET", "/api/automation/state", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active"], false);
    assert_eq!(body["phase"], "idle");
    assert_eq!(body["lastCode"], "");
    assert_eq!(body["attemptCount"], 0);
    assert_eq!(body["lastCodeObservedAt"], 0);
}

#[tokio::test]
async fn start_route_runs_until_accepted() {
    let harness = harness(
        &["ZXC456", "QWE789"],
        vec![Verdict::Reject("Invalid code".into()), Verdict::Accept],
    );

    let (status, body) = send(&harness.router, "POST", "/api/automation/start", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true }));

    settle(&harness.controller).await;

    let (_, state) = send(&harness.router, "GET", "/api/automation/state", None).await;
    assert_eq!(state["phase"], "success");
    assert_eq!(state["active"], false);
    assert_eq!(state["lastCode"], "QWE789");
    assert_eq!(state["attemptCount"], 1);
    assert_eq!(harness.target.submitted(), vec!["ZXC456", "QWE789"]);
}

#[tokio::test]
async fn messages_route_dispatches_control_messages() {
    let harness = harness(&[], vec![]);

    let (status, body) = send(
        &harness.router,
        "POST",
        "/api/messages",
        Some(json!({ "action": "getState" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"]["phase"], "idle");

    let (_, body) = send(
        &harness.router,
        "POST",
        "/api/messages",
        Some(json!({ "action": "startAutomation" })),
    )
    .await;
    assert_eq!(body, json!({ "success": true }));
    assert!(harness.controller.state().active);

    let (_, body) = send(
        &harness.router,
        "POST",
        "/api/messages",
        Some(json!({ "action": "stopAutomation" })),
    )
    .await;
    assert_eq!(body, json!({ "success": true }));
    settle(&harness.controller).await;

    let state = harness.controller.state();
    assert!(!state.active);
    assert_eq!(state.phase, Phase::Idle);
}

#[tokio::test]
async fn unknown_message_is_rejected() {
    let harness = harness(&[], vec![]);
    let (status, _) = send(
        &harness.router,
        "POST",
        "/api/messages",
        Some(json!({ "action": "reboot" })),
    )
    .await;
    assert!(status.is_client_error());
    assert!(!harness.controller.state().active);
}

#[tokio::test]
async fn stop_route_can_preserve_progress() {
    let harness = harness(&["AAA111"], vec![]);
    let mut updates = harness.controller.subscribe();

    send(&harness.router, "POST", "/api/automation/start", None).await;
    timeout(Duration::from_secs(5), async {
        loop {
            let update = updates.recv().await.unwrap();
            if update.state.phase == Phase::UnknownWait {
                break;
            }
        }
    })
    .await
    .expect("no unknown outcome observed");

    let (status, _) = send(
        &harness.router,
        "POST",
        "/api/automation/stop?preserveState=true",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    settle(&harness.controller).await;

    let state = harness.controller.state();
    assert!(!state.active);
    assert_eq!(state.last_code, "AAA111");
    assert_ne!(state.phase, Phase::Idle);
}

#[tokio::test]
async fn events_stream_starts_with_a_snapshot() {
    let harness = harness(&["QWE789"], vec![Verdict::Accept]);
    let response = harness
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/automation/events")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let mut frames = response.into_body().into_data_stream();
    let first = timeout(Duration::from_secs(2), frames.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let first = String::from_utf8_lossy(&first).to_string();
    assert!(first.contains("event: stateUpdate"));
    assert!(first.contains(r#""action":"stateUpdate""#));
    assert!(first.contains(r#""phase":"idle""#));

    assert!(harness.controller.start());
    let mut seen = String::new();
    timeout(Duration::from_secs(5), async {
        while let Some(Ok(chunk)) = frames.next().await {
            seen.push_str(&String::from_utf8_lossy(&chunk));
            if seen.contains(r#""phase":"success""#) {
                break;
            }
        }
    })
    .await
    .expect("success update not streamed");
    assert!(seen.contains(r#""lastCode":"QWE789""#));
}
