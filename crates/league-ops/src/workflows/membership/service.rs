use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::http::StatusCode;
use chrono::Utc;

use super::domain::{
    Application, ApplicationId, ApplicationStatus, Caller, MembershipSubmission, PaymentMethod,
    PaymentStatus, RemovalType,
};
use super::gateway::{CheckoutMetadata, CheckoutRequest, GatewayError, PaymentGateway};
use super::invoicing::{InvoiceError, InvoiceIssuer, InvoiceOutcome, InvoiceRequest};
use super::notify::{render_template, EmailMessage, Notifier};
use super::reference;
use super::registry::{LeagueRegistry, ProvisionRequest, RegistryError};
use super::repository::{ApplicationRepository, RepositoryError};
use super::settings::MembershipSettings;
use super::webhook::CheckoutCompleted;

/// Orchestrator for the application lifecycle: drives the state machine,
/// the two payment paths, invoicing, and the compensating registry actions.
pub struct MembershipService {
    repository: Arc<dyn ApplicationRepository>,
    registry: Arc<dyn LeagueRegistry>,
    gateway: Arc<dyn PaymentGateway>,
    invoices: Arc<dyn InvoiceIssuer>,
    notifier: Arc<dyn Notifier>,
    settings: MembershipSettings,
    in_flight: TransitionGuard,
}

static APPLICATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_application_id() -> ApplicationId {
    let id = APPLICATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ApplicationId(format!("mem-{id:06}"))
}

/// Result of a successful submission.
#[derive(Debug, Clone)]
pub struct SubmissionOutcome {
    pub application: Application,
    /// Hosted checkout URL for the card path; `None` on the transfer path.
    pub checkout_url: Option<String>,
}

/// Disposition of a verified checkout-completion event. Every variant is an
/// ack from the gateway's point of view.
#[derive(Debug, Clone)]
pub enum PaymentConfirmation {
    /// Payment recorded and the application auto-approved.
    Applied(Application),
    /// Replay of an already-recorded payment; nothing changed.
    AlreadyPaid(Application),
    /// Payment recorded but provisioning failed; left for admin follow-up.
    ProvisioningDeferred(Application),
    /// Authentic event whose metadata points at no stored application.
    UnknownApplication,
}

impl PaymentConfirmation {
    pub const fn disposition(&self) -> &'static str {
        match self {
            PaymentConfirmation::Applied(_) => "applied",
            PaymentConfirmation::AlreadyPaid(_) => "already_paid",
            PaymentConfirmation::ProvisioningDeferred(_) => "provisioning_deferred",
            PaymentConfirmation::UnknownApplication => "unknown_application",
        }
    }
}

impl MembershipService {
    pub fn new(
        repository: Arc<dyn ApplicationRepository>,
        registry: Arc<dyn LeagueRegistry>,
        gateway: Arc<dyn PaymentGateway>,
        invoices: Arc<dyn InvoiceIssuer>,
        notifier: Arc<dyn Notifier>,
        settings: MembershipSettings,
    ) -> Self {
        Self {
            repository,
            registry,
            gateway,
            invoices,
            notifier,
            settings,
            in_flight: TransitionGuard::default(),
        }
    }

    pub fn settings(&self) -> &MembershipSettings {
        &self.settings
    }

    /// Create a membership application. On the card path this also opens a
    /// hosted checkout session; a session-creation failure rolls the freshly
    /// inserted record back. On the transfer path a unique 6-digit payment
    /// reference is allocated and mailed to the applicant.
    pub fn submit(
        &self,
        submission: MembershipSubmission,
    ) -> Result<SubmissionOutcome, MembershipError> {
        validate_submission(&submission)?;

        if self
            .repository
            .find_active(&submission.club_id, &submission.applicant_user_id)?
            .is_some()
        {
            return Err(MembershipError::DuplicateApplication);
        }

        let applicant = self
            .registry
            .user_by_id(&submission.applicant_user_id)
            .map_err(MembershipError::RemoteProvisioning)?
            .ok_or(MembershipError::UnknownApplicant)?;
        let club_name = self
            .registry
            .user_clubs(&submission.applicant_user_id)
            .map_err(MembershipError::RemoteProvisioning)?
            .into_iter()
            .find(|club| club.club_id == submission.club_id)
            .map(|club| club.name)
            .unwrap_or_else(|| submission.club_name.clone());

        let mut application = Application {
            id: next_application_id(),
            club_id: submission.club_id,
            applicant_user_id: submission.applicant_user_id,
            club_name,
            applicant_name: applicant.name,
            applicant_email: applicant.email,
            status: ApplicationStatus::Submitted,
            submitted_at: Utc::now(),
            notes: Vec::new(),
            payment_method: submission.payment_method,
            payment_status: PaymentStatus::Pending,
            payment_id: None,
            transfer_reference: None,
            billing: Some(submission.billing),
            invoice_sent: false,
            invoice_number: None,
            removal_type: None,
        };

        if application.payment_method == PaymentMethod::Transfer {
            let mut rng = rand::thread_rng();
            application.transfer_reference =
                Some(reference::allocate(self.repository.as_ref(), &mut rng)?);
        }

        let mut stored = self.repository.insert(application)?;

        let mut checkout_url = None;
        match stored.payment_method {
            PaymentMethod::Card => {
                let request = CheckoutRequest {
                    amount_cents: self.settings.membership_fee_cents,
                    currency: self.settings.currency.clone(),
                    metadata: CheckoutMetadata {
                        application_id: stored.id.0.clone(),
                        club_id: stored.club_id.clone(),
                        user_id: stored.applicant_user_id.clone(),
                    },
                    success_url: self.settings.checkout_success_url.clone(),
                    cancel_url: self.settings.checkout_cancel_url.clone(),
                };
                match self.gateway.create_checkout_session(request) {
                    Ok(session) => {
                        stored.payment_id = Some(session.session_id);
                        self.repository.update(stored.clone())?;
                        checkout_url = Some(session.url);
                    }
                    Err(err) => {
                        if let Err(cleanup) = self.repository.remove(&stored.id) {
                            tracing::error!(
                                application_id = %stored.id.0,
                                error = %cleanup,
                                "failed to roll back application after checkout failure"
                            );
                        }
                        return Err(MembershipError::Gateway(err));
                    }
                }
            }
            PaymentMethod::Transfer => {
                self.send_email(&stored, OutcomeEmail::TransferInstructions);
            }
        }

        Ok(SubmissionOutcome {
            application: stored,
            checkout_url,
        })
    }

    /// Approve a submitted application: provision the league first, persist
    /// the local status only on success, then run the billing sub-flow unless
    /// the admin override skips it.
    pub fn approve(
        &self,
        id: &ApplicationId,
        skip_billing: bool,
    ) -> Result<Application, MembershipError> {
        let _claim = self.claim_for(id, ApplicationStatus::Approved)?;
        let mut application = self.fetch_required(id)?;
        ensure_transition(&application, ApplicationStatus::Approved)?;

        self.provision(&application)?;
        application.status = ApplicationStatus::Approved;

        if skip_billing {
            application.append_system_note("Billing skipped by administrator override");
        } else {
            self.run_invoicing(&mut application);
        }

        self.repository.update(application.clone())?;
        self.send_email(&application, OutcomeEmail::Approval);
        Ok(application)
    }

    /// Reject an application. If a league was provisioned it is deprovisioned
    /// first; a deprovisioning failure blocks the transition so local and
    /// remote state never diverge silently.
    pub fn reject(
        &self,
        id: &ApplicationId,
        notes: Option<String>,
        removal: Option<RemovalType>,
    ) -> Result<Application, MembershipError> {
        let removal = removal.unwrap_or(RemovalType::DeleteLeague);
        let _claim = self.claim_for(id, ApplicationStatus::Rejected)?;
        let mut application = self.fetch_required(id)?;
        ensure_transition(&application, ApplicationStatus::Rejected)?;

        if application.status.league_provisioned() {
            match self
                .registry
                .deprovision_league(&application.club_id, removal)
            {
                Ok(()) => {
                    application.removal_type = Some(removal);
                }
                Err(RegistryError::LeagueNotFound) => {
                    // Already compensated by an earlier attempt.
                    application.removal_type = Some(removal);
                    application.append_system_note("League already absent during deprovisioning");
                }
                Err(err) => return Err(MembershipError::RemoteProvisioning(err)),
            }
        }

        application.status = ApplicationStatus::Rejected;
        if let Some(note) = notes.filter(|note| !note.trim().is_empty()) {
            application.notes.push(note);
        }

        self.repository.update(application.clone())?;
        self.send_email(&application, OutcomeEmail::Rejection);
        Ok(application)
    }

    /// Applicant-initiated request to leave the league. Local-only; the
    /// compensating deprovision happens when an admin rejects the request.
    pub fn request_removal(
        &self,
        id: &ApplicationId,
        reason: &str,
    ) -> Result<Application, MembershipError> {
        let _claim = self.claim_for(id, ApplicationStatus::RemovalRequested)?;
        let mut application = self.fetch_required(id)?;
        ensure_transition(&application, ApplicationStatus::RemovalRequested)?;

        application.status = ApplicationStatus::RemovalRequested;
        application.append_system_note(&format!("Removal requested by applicant: {reason}"));
        self.repository.update(application.clone())?;
        Ok(application)
    }

    /// Apply a verified checkout-completion event. Idempotent under webhook
    /// replay: a second delivery for a paid application is a no-op. A
    /// provisioning failure is recorded durably but still acked, leaving the
    /// payment marked and the status untouched for manual follow-up.
    pub fn confirm_payment(
        &self,
        event: CheckoutCompleted,
    ) -> Result<PaymentConfirmation, MembershipError> {
        let id = ApplicationId(event.metadata.application_id.clone());

        let Some(current) = self.repository.fetch(&id)? else {
            tracing::warn!(
                application_id = %id.0,
                "checkout completion references an unknown application"
            );
            return Ok(PaymentConfirmation::UnknownApplication);
        };
        if current.payment_status == PaymentStatus::Paid {
            return Ok(PaymentConfirmation::AlreadyPaid(current));
        }

        let Some(_claim) = self.in_flight.claim(&id) else {
            return Err(MembershipError::Contended);
        };
        // Re-read under the claim; the pre-claim snapshot may be stale.
        let mut application = self.fetch_required(&id)?;
        if application.payment_status == PaymentStatus::Paid {
            return Ok(PaymentConfirmation::AlreadyPaid(application));
        }

        application.payment_status = PaymentStatus::Paid;

        let mut deferred = false;
        if application.status == ApplicationStatus::Submitted {
            match self.provision(&application) {
                Ok(()) => {
                    application.status = ApplicationStatus::Approved;
                    self.run_invoicing(&mut application);
                }
                Err(err) => {
                    tracing::warn!(
                        application_id = %application.id.0,
                        error = %err,
                        "league provisioning deferred after payment"
                    );
                    application.append_system_note(
                        "League provisioning failed after payment; awaiting manual approval",
                    );
                    deferred = true;
                }
            }
        }

        self.repository.update(application.clone())?;
        if application.status == ApplicationStatus::Approved {
            self.send_email(&application, OutcomeEmail::Approval);
        }

        Ok(if deferred {
            PaymentConfirmation::ProvisioningDeferred(application)
        } else {
            PaymentConfirmation::Applied(application)
        })
    }

    /// Record that billing was handled outside the invoice provider. Clears
    /// the billing PII block, same as a provider-issued invoice would.
    pub fn mark_manually_invoiced(
        &self,
        id: &ApplicationId,
        invoice_number: Option<String>,
    ) -> Result<Application, MembershipError> {
        let Some(_claim) = self.in_flight.claim(id) else {
            return Err(MembershipError::Contended);
        };
        let mut application = self.fetch_required(id)?;
        application.invoice_sent = true;
        if invoice_number.is_some() {
            application.invoice_number = invoice_number;
        }
        application.clear_billing();
        application.append_system_note("Invoice handled outside the provider");
        self.repository.update(application.clone())?;
        Ok(application)
    }

    /// Fetch the issued invoice PDF. Only the original applicant or an
    /// administrator may read it; unauthorized callers learn nothing about
    /// the record, not even whether it exists.
    pub fn invoice_pdf(
        &self,
        id: &ApplicationId,
        caller: &Caller,
    ) -> Result<Vec<u8>, MembershipError> {
        let Some(application) = self.repository.fetch(id)? else {
            return Err(match caller {
                Caller::Admin => MembershipError::Repository(RepositoryError::NotFound),
                Caller::Applicant(_) => MembershipError::Unauthorized,
            });
        };
        if !caller.may_access(&application) {
            return Err(MembershipError::Unauthorized);
        }
        let number = application
            .invoice_number
            .as_deref()
            .ok_or(MembershipError::InvoiceMissing)?;
        self.invoices
            .fetch_invoice_pdf(number)
            .map_err(MembershipError::Invoice)
    }

    /// Fetch an application for API responses.
    pub fn get(&self, id: &ApplicationId) -> Result<Application, MembershipError> {
        self.fetch_required(id)
    }

    fn fetch_required(&self, id: &ApplicationId) -> Result<Application, MembershipError> {
        self.repository
            .fetch(id)?
            .ok_or(MembershipError::Repository(RepositoryError::NotFound))
    }

    fn claim_for(
        &self,
        id: &ApplicationId,
        target: ApplicationStatus,
    ) -> Result<TransitionClaim<'_>, MembershipError> {
        self.in_flight.claim(id).ok_or_else(|| {
            // A concurrent transition is in flight; the loser's precondition
            // no longer holds.
            let from = self
                .repository
                .fetch(id)
                .ok()
                .flatten()
                .map(|application| application.status.label())
                .unwrap_or("unknown");
            MembershipError::InvalidTransition {
                from,
                to: target.label(),
            }
        })
    }

    fn provision(&self, application: &Application) -> Result<(), MembershipError> {
        let request = ProvisionRequest {
            club_id: application.club_id.clone(),
            creator_user_id: application.applicant_user_id.clone(),
            league_name: application.club_name.clone(),
            description: format!("League membership for {}", application.club_name),
        };
        match self.registry.provision_league(request) {
            // A duplicate means a prior attempt already provisioned it.
            Ok(_) | Err(RegistryError::DuplicateLeague) => Ok(()),
            Err(err) => Err(MembershipError::RemoteProvisioning(err)),
        }
    }

    /// Best-effort invoice issuance. On success the invoice number is stored
    /// and the billing PII wiped in the same logical update; on failure the
    /// transition proceeds with a durable system note.
    fn run_invoicing(&self, application: &mut Application) {
        if application.invoice_sent {
            return;
        }
        if !self.settings.invoicing_enabled {
            tracing::debug!(
                application_id = %application.id.0,
                "invoicing disabled; issuance skipped"
            );
            return;
        }
        let Some(billing) = application.billing.clone() else {
            tracing::warn!(
                application_id = %application.id.0,
                "billing details missing; cannot issue invoice"
            );
            application.append_system_note("Invoice creation failed");
            return;
        };

        let request = InvoiceRequest {
            billing,
            net_amount_cents: self.settings.membership_fee_cents,
            currency: self.settings.currency.clone(),
            vat_rate_percent: self.settings.vat_rate_percent,
            line_description: self.settings.invoice_line_description.clone(),
            paid: application.payment_status == PaymentStatus::Paid,
            comment: format!("Membership fee for {}", application.club_name),
        };
        match self.invoices.issue_invoice(request) {
            Ok(InvoiceOutcome::Issued { invoice_number }) => {
                application.invoice_sent = true;
                application.invoice_number = Some(invoice_number);
                application.clear_billing();
            }
            Ok(InvoiceOutcome::Skipped) => {}
            Err(err) => {
                tracing::warn!(
                    application_id = %application.id.0,
                    error = %err,
                    "invoice issuance failed"
                );
                application.append_system_note("Invoice creation failed");
            }
        }
    }

    fn send_email(&self, application: &Application, kind: OutcomeEmail) {
        let templates = &self.settings.templates;
        let (subject, body) = match kind {
            OutcomeEmail::Approval => (&templates.approval_subject, &templates.approval_body),
            OutcomeEmail::Rejection => (&templates.rejection_subject, &templates.rejection_body),
            OutcomeEmail::TransferInstructions => (
                &templates.transfer_instructions_subject,
                &templates.transfer_instructions_body,
            ),
        };
        let reference = application.transfer_reference.as_deref();
        let message = EmailMessage {
            to: application.applicant_email.clone(),
            subject: render_template(
                subject,
                &application.club_name,
                &application.applicant_name,
                reference,
            ),
            html_body: render_template(
                body,
                &application.club_name,
                &application.applicant_name,
                reference,
            ),
        };
        if let Err(err) = self.notifier.send(message) {
            tracing::warn!(
                application_id = %application.id.0,
                error = %err,
                "outcome email delivery failed"
            );
        }
    }
}

enum OutcomeEmail {
    Approval,
    Rejection,
    TransferInstructions,
}

fn ensure_transition(
    application: &Application,
    target: ApplicationStatus,
) -> Result<(), MembershipError> {
    if application.status.can_transition_to(target) {
        Ok(())
    } else {
        Err(MembershipError::InvalidTransition {
            from: application.status.label(),
            to: target.label(),
        })
    }
}

fn validate_submission(submission: &MembershipSubmission) -> Result<(), MembershipError> {
    required("club_id", &submission.club_id)?;
    required("club_name", &submission.club_name)?;
    required("applicant_user_id", &submission.applicant_user_id)?;
    required("billing.name", &submission.billing.name)?;
    required("billing.zip", &submission.billing.zip)?;
    required("billing.city", &submission.billing.city)?;
    required("billing.address", &submission.billing.address)?;
    required("billing.email", &submission.billing.email)?;
    Ok(())
}

fn required(field: &'static str, value: &str) -> Result<(), MembershipError> {
    if value.trim().is_empty() {
        Err(MembershipError::MissingField(field))
    } else {
        Ok(())
    }
}

/// Per-application mutual exclusion for state transitions. The mutex guards
/// only the in-flight id set; it is never held across a remote call.
#[derive(Default)]
struct TransitionGuard {
    in_flight: Mutex<HashSet<ApplicationId>>,
}

impl TransitionGuard {
    fn claim(&self, id: &ApplicationId) -> Option<TransitionClaim<'_>> {
        let mut set = match self.in_flight.lock() {
            Ok(set) => set,
            Err(poisoned) => poisoned.into_inner(),
        };
        if set.insert(id.clone()) {
            Some(TransitionClaim {
                guard: self,
                id: id.clone(),
            })
        } else {
            None
        }
    }
}

struct TransitionClaim<'a> {
    guard: &'a TransitionGuard,
    id: ApplicationId,
}

impl Drop for TransitionClaim<'_> {
    fn drop(&mut self) {
        let mut set = match self.guard.in_flight.lock() {
            Ok(set) => set,
            Err(poisoned) => poisoned.into_inner(),
        };
        set.remove(&self.id);
    }
}

/// Error raised by the membership orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum MembershipError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("applicant is not known to the league registry")]
    UnknownApplicant,
    #[error("an active application already exists for this club and applicant")]
    DuplicateApplication,
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },
    #[error("application is being updated concurrently")]
    Contended,
    #[error("league registry failure: {0}")]
    RemoteProvisioning(RegistryError),
    #[error("payment gateway failure: {0}")]
    Gateway(GatewayError),
    #[error("not authorized to access this resource")]
    Unauthorized,
    #[error("no invoice has been issued for this application")]
    InvoiceMissing,
    #[error("invoice provider failure: {0}")]
    Invoice(InvoiceError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Coarse failure classes so callers can choose retry, terminal display, or
/// security logging without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Validation,
    Conflict,
    RemoteDependency,
    Security,
    Internal,
}

impl ErrorClass {
    pub const fn label(self) -> &'static str {
        match self {
            ErrorClass::Validation => "validation",
            ErrorClass::Conflict => "conflict",
            ErrorClass::RemoteDependency => "remote_dependency",
            ErrorClass::Security => "security",
            ErrorClass::Internal => "internal",
        }
    }
}

impl MembershipError {
    pub fn class(&self) -> ErrorClass {
        match self {
            MembershipError::MissingField(_) | MembershipError::UnknownApplicant => {
                ErrorClass::Validation
            }
            MembershipError::DuplicateApplication
            | MembershipError::InvalidTransition { .. }
            | MembershipError::Contended
            | MembershipError::InvoiceMissing
            | MembershipError::Repository(RepositoryError::Conflict)
            | MembershipError::Repository(RepositoryError::NotFound) => ErrorClass::Conflict,
            MembershipError::RemoteProvisioning(_)
            | MembershipError::Gateway(_)
            | MembershipError::Invoice(_) => ErrorClass::RemoteDependency,
            MembershipError::Unauthorized => ErrorClass::Security,
            MembershipError::Repository(RepositoryError::Unavailable(_)) => ErrorClass::Internal,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            MembershipError::MissingField(_) | MembershipError::UnknownApplicant => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            MembershipError::DuplicateApplication
            | MembershipError::InvalidTransition { .. }
            | MembershipError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
            MembershipError::Contended => StatusCode::SERVICE_UNAVAILABLE,
            MembershipError::RemoteProvisioning(_)
            | MembershipError::Gateway(_)
            | MembershipError::Invoice(_) => StatusCode::BAD_GATEWAY,
            MembershipError::Unauthorized => StatusCode::FORBIDDEN,
            MembershipError::InvoiceMissing
            | MembershipError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
            MembershipError::Repository(RepositoryError::Unavailable(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}
