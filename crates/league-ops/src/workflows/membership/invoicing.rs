use serde::{Deserialize, Serialize};

use super::domain::BillingDetails;

/// Request to issue the single fixed-line membership-fee invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRequest {
    pub billing: BillingDetails,
    pub net_amount_cents: u32,
    pub currency: String,
    pub vat_rate_percent: u8,
    pub line_description: String,
    pub paid: bool,
    pub comment: String,
}

/// Result of an issuance attempt. `Skipped` is a successful no-op (provider
/// disabled), not a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvoiceOutcome {
    Issued { invoice_number: String },
    Skipped,
}

/// Outbound port for the fiscal invoice provider. Best-effort from the
/// orchestrator's perspective: issuance failures never block a transition.
pub trait InvoiceIssuer: Send + Sync {
    fn issue_invoice(&self, request: InvoiceRequest) -> Result<InvoiceOutcome, InvoiceError>;

    fn fetch_invoice_pdf(&self, invoice_number: &str) -> Result<Vec<u8>, InvoiceError>;
}

/// Error enumeration for invoice provider calls.
#[derive(Debug, thiserror::Error)]
pub enum InvoiceError {
    #[error("invoice rejected by provider: {0}")]
    Rejected(String),
    #[error("invoice not found")]
    NotFound,
    #[error("invoice provider unavailable: {0}")]
    Unavailable(String),
}
