//! Club onboarding and league membership workflow.
//!
//! A club representative applies to join the league; an administrator or a
//! confirmed card payment approves the application. Approval provisions a
//! league record in the remote registry before any local state flips, and
//! rejection compensates by deprovisioning first. Billing PII lives on the
//! application only until the membership invoice is recorded, then it is
//! wiped.

pub mod domain;
pub mod gateway;
pub mod invoicing;
pub mod notify;
pub(crate) mod reference;
pub mod registry;
pub mod repository;
pub mod router;
pub mod service;
pub mod settings;
pub mod webhook;

#[cfg(test)]
mod tests;

pub use domain::{
    Application, ApplicationId, ApplicationStatus, BillingDetails, Caller, MembershipSubmission,
    PaymentMethod, PaymentStatus, RemovalType,
};
pub use gateway::{
    CheckoutMetadata, CheckoutRequest, CheckoutSession, GatewayError, PaymentGateway,
};
pub use invoicing::{InvoiceError, InvoiceIssuer, InvoiceOutcome, InvoiceRequest};
pub use notify::{EmailMessage, Notifier, NotifyError};
pub use registry::{
    LeagueRef, LeagueRegistry, ProvisionRequest, RegistryClub, RegistryError, RegistryUser,
};
pub use repository::{ApplicationRepository, ApplicationView, RepositoryError};
pub use router::membership_router;
pub use service::{
    ErrorClass, MembershipError, MembershipService, PaymentConfirmation, SubmissionOutcome,
};
pub use settings::{EmailTemplates, MembershipSettings};
pub use webhook::{CheckoutCompleted, WebhookError, WebhookEvent, SIGNATURE_HEADER};
