use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::json;
use tower::ServiceExt;

use super::common::*;
use crate::workflows::membership::router::membership_router;
use crate::workflows::membership::webhook::{self, SIGNATURE_HEADER};

fn router(h: &Harness) -> Router {
    membership_router(h.service.clone())
}

fn post_json(uri: &str, payload: &serde_json::Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            serde_json::to_vec(payload).expect("serializable payload"),
        ))
        .expect("request builds")
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri)
        .body(Body::empty())
        .expect("request builds")
}

fn webhook_body(application_id: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "type": "checkout_session_completed",
        "data": {
            "metadata": {
                "application_id": application_id,
                "club_id": "C1",
                "user_id": "U1"
            },
            "amount_total": 15000
        }
    }))
    .expect("serializable payload")
}

fn signed_webhook(body: Vec<u8>, secret: &str) -> Request<Body> {
    let signature = webhook::sign(&body, secret, 1_700_000_000);
    Request::post("/api/v1/membership/payments/webhook")
        .header(header::CONTENT_TYPE, "application/json")
        .header(SIGNATURE_HEADER, signature)
        .body(Body::from(body))
        .expect("request builds")
}

#[tokio::test]
async fn submit_route_accepts_applications_without_exposing_billing() {
    let h = harness();

    let response = router(&h)
        .oneshot(post_json(
            "/api/v1/membership/applications",
            &serde_json::to_value(submission()).expect("serializable submission"),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let payload = read_json_body(response).await;
    let application = payload.get("application").expect("application view");
    assert_eq!(application.get("status"), Some(&json!("submitted")));
    assert!(
        application.get("billing").is_none(),
        "views never carry billing PII"
    );
    assert_eq!(payload.get("checkout_url"), Some(&serde_json::Value::Null));
}

#[tokio::test]
async fn status_route_reports_missing_applications() {
    let h = harness();

    let response = router(&h)
        .oneshot(get("/api/v1/membership/applications/mem-ghost"))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let payload = read_json_body(response).await;
    assert_eq!(payload.get("class"), Some(&json!("conflict")));
}

#[tokio::test]
async fn approve_route_flips_status_once() {
    let h = harness();
    let id = h
        .service
        .submit(submission())
        .expect("submission succeeds")
        .application
        .id;
    let uri = format!("/api/v1/membership/applications/{}/approve", id.0);

    let response = router(&h)
        .oneshot(post_json(&uri, &json!({})))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload.get("status"), Some(&json!("approved")));

    let response = router(&h)
        .oneshot(post_json(&uri, &json!({})))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn submit_route_hides_gateway_detail_from_applicants() {
    let h = harness();
    h.gateway.fail.store(true, std::sync::atomic::Ordering::SeqCst);

    let response = router(&h)
        .oneshot(post_json(
            "/api/v1/membership/applications",
            &serde_json::to_value(card_submission("C1", "U1")).expect("serializable submission"),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let payload = read_json_body(response).await;
    let message = payload
        .get("error")
        .and_then(serde_json::Value::as_str)
        .expect("error message");
    assert!(
        !message.contains("gateway offline"),
        "adapter detail must not leak: {message}"
    );
}

#[tokio::test]
async fn webhook_route_applies_signed_events_and_acks_replays() {
    let h = harness();
    let id = h
        .service
        .submit(card_submission("C1", "U1"))
        .expect("card submission succeeds")
        .application
        .id;

    let response = router(&h)
        .oneshot(signed_webhook(webhook_body(&id.0), "whsec_test"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload.get("disposition"), Some(&json!("applied")));

    let response = router(&h)
        .oneshot(signed_webhook(webhook_body(&id.0), "whsec_test"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload.get("disposition"), Some(&json!("already_paid")));
}

#[tokio::test]
async fn webhook_route_rejects_bad_signatures() {
    let h = harness();

    let response = router(&h)
        .oneshot(signed_webhook(webhook_body("mem-000001"), "whsec_other"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let unsigned = Request::post("/api/v1/membership/payments/webhook")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(webhook_body("mem-000001")))
        .expect("request builds");
    let response = router(&h)
        .oneshot(unsigned)
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn webhook_route_acks_unknown_applications() {
    let h = harness();

    let response = router(&h)
        .oneshot(signed_webhook(webhook_body("mem-ghost"), "whsec_test"))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(
        payload.get("disposition"),
        Some(&json!("unknown_application"))
    );
}

#[tokio::test]
async fn invoice_pdf_route_enforces_actor_headers() {
    let h = harness();
    let id = h
        .service
        .submit(submission())
        .expect("submission succeeds")
        .application
        .id;
    h.service.approve(&id, false).expect("approval succeeds");
    let uri = format!("/api/v1/membership/applications/{}/invoice.pdf", id.0);

    let response = router(&h)
        .oneshot(
            Request::get(&uri)
                .header("x-actor-role", "admin")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
        Some("application/pdf")
    );

    let response = router(&h)
        .oneshot(get(&uri))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = router(&h)
        .oneshot(
            Request::get(&uri)
                .header("x-actor-id", "U2")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn removal_request_route_requires_an_approved_application() {
    let h = harness();
    let id = h
        .service
        .submit(submission())
        .expect("submission succeeds")
        .application
        .id;
    let uri = format!("/api/v1/membership/applications/{}/removal-request", id.0);

    let response = router(&h)
        .oneshot(post_json(&uri, &json!({ "reason": "leaving the league" })))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    h.service.approve(&id, false).expect("approval succeeds");
    let response = router(&h)
        .oneshot(post_json(&uri, &json!({ "reason": "leaving the league" })))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload.get("status"), Some(&json!("removal_requested")));
}
