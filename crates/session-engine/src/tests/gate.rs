//! Route gating across a real login.

use super::harness::{api, login_body, TestHarness, LANDING_PATH, LOGIN_PATH};
use crate::{GateDecision, LoginRedirect};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn redirect_then_return_after_login() {
    let harness = TestHarness::new().await;
    let gate = harness.gate();

    assert_eq!(gate.check("/admin/solutions"), GateDecision::Loading);
    harness.manager.restore().await;

    let decision = gate.check("/admin/solutions");
    let GateDecision::Redirect(redirect) = decision else {
        panic!("expected redirect, got {:?}", decision);
    };
    assert_eq!(
        redirect,
        LoginRedirect {
            to: LOGIN_PATH.to_string(),
            from: "/admin/solutions".to_string(),
        }
    );

    Mock::given(method("POST"))
        .and(path(api("auth/login")))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body("access-1", "refresh-1")))
        .mount(&harness.server)
        .await;
    harness.manager.login("admin", "correct-horse").await.unwrap();

    let destination = gate.destination_after_login(Some(&redirect.from));
    assert_eq!(destination, "/admin/solutions");
    assert_eq!(gate.check(&destination), GateDecision::Render);
}

#[tokio::test]
async fn unsafe_return_location_lands_on_default() {
    let harness = TestHarness::new().await;
    let gate = harness.gate();

    assert_eq!(gate.destination_after_login(None), LANDING_PATH);
    assert_eq!(
        gate.destination_after_login(Some("https://evil.example/admin")),
        LANDING_PATH
    );
    assert_eq!(gate.destination_after_login(Some("//evil.example")), LANDING_PATH);
    assert_eq!(gate.destination_after_login(Some(LOGIN_PATH)), LANDING_PATH);
}

#[tokio::test]
async fn resolve_waits_for_slow_verification() {
    let harness = TestHarness::with_store({
        let store = token_store::TokenStore::in_memory();
        let admin = serde_json::from_value(super::harness::profile_json("Site Admin")).unwrap();
        assert!(store.set_all("access-1", "refresh-1", &admin));
        store
    })
    .await;

    Mock::given(method("GET"))
        .and(path(api("auth/me")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(super::harness::profile_json("Site Admin"))
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&harness.server)
        .await;

    let manager = harness.manager.clone();
    let restoring = tokio::spawn(async move { manager.restore().await });

    let gate = harness.gate();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(gate.check("/admin/solutions"), GateDecision::Loading);

    assert_eq!(gate.resolve("/admin/solutions").await, GateDecision::Render);
    assert!(restoring.await.unwrap().is_authenticated());
}
