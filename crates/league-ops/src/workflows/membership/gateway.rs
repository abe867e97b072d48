use serde::{Deserialize, Serialize};

/// Opaque metadata attached to a hosted checkout session. Echoed back on the
/// confirmation webhook so the handler can correlate the payment with its
/// application without trusting the client redirect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutMetadata {
    pub application_id: String,
    pub club_id: String,
    pub user_id: String,
}

/// Request to open a hosted checkout session for the membership fee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub amount_cents: u32,
    pub currency: String,
    pub metadata: CheckoutMetadata,
    pub success_url: String,
    pub cancel_url: String,
}

/// A created checkout session: the gateway-side id persisted as `payment_id`
/// and the URL the applicant is redirected to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub session_id: String,
    pub url: String,
}

/// Outbound port for the card payment gateway. Confirmation never arrives
/// through this trait; it arrives exclusively via the signed webhook.
pub trait PaymentGateway: Send + Sync {
    fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError>;
}

/// Error enumeration for gateway calls.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("checkout session rejected: {0}")]
    SessionRejected(String),
    #[error("payment gateway unavailable: {0}")]
    Unavailable(String),
}
