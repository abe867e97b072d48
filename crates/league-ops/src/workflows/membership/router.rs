use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use super::domain::{ApplicationId, Caller, MembershipSubmission, RemovalType};
use super::service::{ErrorClass, MembershipError, MembershipService};
use super::webhook::{self, WebhookError, WebhookEvent, SIGNATURE_HEADER};

/// Router exposing the orchestrator's public operations. Authentication is
/// owned by the surrounding web layer; the only identity this router reads is
/// the actor headers feeding the owner-or-admin check on the invoice path.
pub fn membership_router(service: Arc<MembershipService>) -> Router {
    Router::new()
        .route("/api/v1/membership/applications", post(submit_handler))
        .route("/api/v1/membership/applications/:id", get(status_handler))
        .route(
            "/api/v1/membership/applications/:id/approve",
            post(approve_handler),
        )
        .route(
            "/api/v1/membership/applications/:id/reject",
            post(reject_handler),
        )
        .route(
            "/api/v1/membership/applications/:id/removal-request",
            post(removal_request_handler),
        )
        .route(
            "/api/v1/membership/applications/:id/manual-invoice",
            post(manual_invoice_handler),
        )
        .route(
            "/api/v1/membership/applications/:id/invoice.pdf",
            get(invoice_pdf_handler),
        )
        .route(
            "/api/v1/membership/payments/webhook",
            post(webhook_handler),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApproveRequest {
    #[serde(default)]
    pub(crate) skip_billing: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RejectRequest {
    #[serde(default)]
    pub(crate) notes: Option<String>,
    #[serde(default)]
    pub(crate) removal_type: Option<RemovalType>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RemovalRequest {
    pub(crate) reason: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ManualInvoiceRequest {
    #[serde(default)]
    pub(crate) invoice_number: Option<String>,
}

pub(crate) async fn submit_handler(
    State(service): State<Arc<MembershipService>>,
    Json(submission): Json<MembershipSubmission>,
) -> Response {
    match service.submit(submission) {
        Ok(outcome) => {
            let payload = json!({
                "application": outcome.application.status_view(),
                "checkout_url": outcome.checkout_url,
            });
            (StatusCode::ACCEPTED, Json(payload)).into_response()
        }
        Err(err) => applicant_facing_error(&err),
    }
}

pub(crate) async fn status_handler(
    State(service): State<Arc<MembershipService>>,
    Path(application_id): Path<String>,
) -> Response {
    let id = ApplicationId(application_id);
    match service.get(&id) {
        Ok(application) => (StatusCode::OK, Json(application.status_view())).into_response(),
        Err(err) => error_response(&err),
    }
}

pub(crate) async fn approve_handler(
    State(service): State<Arc<MembershipService>>,
    Path(application_id): Path<String>,
    Json(request): Json<ApproveRequest>,
) -> Response {
    let id = ApplicationId(application_id);
    match service.approve(&id, request.skip_billing) {
        Ok(application) => (StatusCode::OK, Json(application.status_view())).into_response(),
        Err(err) => error_response(&err),
    }
}

pub(crate) async fn reject_handler(
    State(service): State<Arc<MembershipService>>,
    Path(application_id): Path<String>,
    Json(request): Json<RejectRequest>,
) -> Response {
    let id = ApplicationId(application_id);
    match service.reject(&id, request.notes, request.removal_type) {
        Ok(application) => (StatusCode::OK, Json(application.status_view())).into_response(),
        Err(err) => error_response(&err),
    }
}

pub(crate) async fn removal_request_handler(
    State(service): State<Arc<MembershipService>>,
    Path(application_id): Path<String>,
    Json(request): Json<RemovalRequest>,
) -> Response {
    let id = ApplicationId(application_id);
    match service.request_removal(&id, &request.reason) {
        Ok(application) => (StatusCode::OK, Json(application.status_view())).into_response(),
        Err(err) => applicant_facing_error(&err),
    }
}

pub(crate) async fn manual_invoice_handler(
    State(service): State<Arc<MembershipService>>,
    Path(application_id): Path<String>,
    Json(request): Json<ManualInvoiceRequest>,
) -> Response {
    let id = ApplicationId(application_id);
    match service.mark_manually_invoiced(&id, request.invoice_number) {
        Ok(application) => (StatusCode::OK, Json(application.status_view())).into_response(),
        Err(err) => error_response(&err),
    }
}

pub(crate) async fn invoice_pdf_handler(
    State(service): State<Arc<MembershipService>>,
    Path(application_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let id = ApplicationId(application_id);
    let Some(caller) = caller_from_headers(&headers) else {
        return error_response(&MembershipError::Unauthorized);
    };
    match service.invoice_pdf(&id, &caller) {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/pdf")],
            bytes,
        )
            .into_response(),
        Err(err) => error_response(&err),
    }
}

/// Webhook intake. 4xx is reserved for signature and payload problems; every
/// verified event is acked so the gateway stops redelivering, even when the
/// workflow outcome was merely recorded for later follow-up.
pub(crate) async fn webhook_handler(
    State(service): State<Arc<MembershipService>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(signature) = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) else {
        let err = WebhookError::MissingSignature;
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": err.to_string() })))
            .into_response();
    };

    let event = match webhook::verify_and_parse(&body, signature, &service.settings().webhook_secret)
    {
        Ok(event) => event,
        Err(err) => {
            let status = match err {
                WebhookError::SignatureMismatch => StatusCode::UNAUTHORIZED,
                _ => StatusCode::BAD_REQUEST,
            };
            return (status, Json(json!({ "error": err.to_string() }))).into_response();
        }
    };

    match event {
        WebhookEvent::Ignored { event_type } => (
            StatusCode::OK,
            Json(json!({ "disposition": "ignored", "event_type": event_type })),
        )
            .into_response(),
        WebhookEvent::CheckoutSessionCompleted(completed) => {
            match service.confirm_payment(completed) {
                Ok(confirmation) => (
                    StatusCode::OK,
                    Json(json!({ "disposition": confirmation.disposition() })),
                )
                    .into_response(),
                // Store unavailability or claim contention: let the gateway
                // redeliver; the idempotent handler converges.
                Err(err) => {
                    tracing::error!(error = %err, "payment confirmation could not be recorded");
                    (
                        err.status_code(),
                        Json(json!({ "error": "payment confirmation could not be recorded" })),
                    )
                        .into_response()
                }
            }
        }
    }
}

fn caller_from_headers(headers: &HeaderMap) -> Option<Caller> {
    if let Some(role) = headers.get("x-actor-role").and_then(|v| v.to_str().ok()) {
        if role.eq_ignore_ascii_case("admin") {
            return Some(Caller::Admin);
        }
    }
    headers
        .get("x-actor-id")
        .and_then(|v| v.to_str().ok())
        .filter(|id| !id.is_empty())
        .map(|id| Caller::Applicant(id.to_string()))
}

fn error_response(err: &MembershipError) -> Response {
    let payload = json!({
        "error": err.to_string(),
        "class": err.class().label(),
    });
    (err.status_code(), Json(payload)).into_response()
}

/// Applicant-facing operations report dependency and internal failures
/// generically; full detail stays in the server log.
fn applicant_facing_error(err: &MembershipError) -> Response {
    match err.class() {
        ErrorClass::RemoteDependency | ErrorClass::Internal => {
            tracing::error!(error = %err, "applicant-facing operation failed");
            let payload = json!({
                "error": "the request could not be completed; please try again later",
                "class": err.class().label(),
            });
            (err.status_code(), Json(payload)).into_response()
        }
        _ => error_response(err),
    }
}
