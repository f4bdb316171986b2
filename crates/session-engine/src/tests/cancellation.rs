//! Requests in flight when the session ends.

use super::harness::{api, bearer, detail, refresh_body, TestHarness};
use crate::{ApiError, ApiRequest, SessionState};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

async fn mount_logout(harness: &TestHarness) {
    Mock::given(method("POST"))
        .and(path(api("auth/logout")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"message": "Logged out successfully"})),
        )
        .mount(&harness.server)
        .await;
}

#[tokio::test]
async fn logout_cancels_request_in_flight() {
    let harness = TestHarness::new().await;
    harness.sign_in("access-1", "refresh-1").await;
    mount_logout(&harness).await;

    Mock::given(method("GET"))
        .and(path(api("solutions")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&harness.server)
        .await;

    let manager = harness.manager.clone();
    let pending = tokio::spawn(async move { manager.send(&ApiRequest::get("solutions")).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    let state = harness.manager.logout().await;
    assert_eq!(state, SessionState::Unauthenticated(None));

    let result = pending.await.unwrap();
    assert_eq!(result.unwrap_err(), ApiError::Cancelled);
}

#[tokio::test]
async fn refresh_completing_after_logout_is_discarded() {
    let harness = TestHarness::new().await;
    harness.sign_in("access-old", "refresh-1").await;
    mount_logout(&harness).await;

    Mock::given(method("GET"))
        .and(path(api("solutions")))
        .and(header("Authorization", bearer("access-old").as_str()))
        .respond_with(ResponseTemplate::new(401).set_body_json(detail("Token expired")))
        .mount(&harness.server)
        .await;
    Mock::given(method("POST"))
        .and(path(api("auth/refresh")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(refresh_body("access-new", "refresh-2"))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&harness.server)
        .await;

    let manager = harness.manager.clone();
    let pending = tokio::spawn(async move { manager.send(&ApiRequest::get("solutions")).await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    harness.manager.logout().await;

    let result = pending.await.unwrap();
    assert_eq!(result.unwrap_err(), ApiError::Cancelled);

    // Give a late refresh response the chance to land if it were going to.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!harness.manager.is_authenticated());
    assert!(!harness.store().has_any());
}

#[tokio::test]
async fn new_session_is_not_affected_by_previous_teardown() {
    let harness = TestHarness::new().await;
    harness.sign_in("access-1", "refresh-1").await;
    mount_logout(&harness).await;

    harness.manager.logout().await;
    harness.sign_in("access-2", "refresh-2").await;

    Mock::given(method("GET"))
        .and(path(api("solutions")))
        .and(header("Authorization", bearer("access-2").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "sol_1"}])))
        .expect(1)
        .mount(&harness.server)
        .await;

    let response = harness
        .manager
        .send(&ApiRequest::get("solutions"))
        .await
        .unwrap();
    assert_eq!(response.json_value(), json!([{"id": "sol_1"}]));
}
