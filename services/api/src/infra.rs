use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use league_ops::config::AppConfig;
use league_ops::workflows::membership::{
    Application, ApplicationId, ApplicationRepository, ApplicationStatus, CheckoutRequest,
    CheckoutSession, EmailMessage, EmailTemplates, GatewayError, InvoiceError, InvoiceIssuer,
    InvoiceOutcome, InvoiceRequest, LeagueRef, LeagueRegistry, MembershipSettings, Notifier,
    NotifyError, PaymentGateway, ProvisionRequest, RegistryClub, RegistryError, RegistryUser,
    RemovalType, RepositoryError,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) fn settings_from_config(config: &AppConfig) -> MembershipSettings {
    MembershipSettings {
        membership_fee_cents: config.payments.membership_fee_cents,
        currency: config.payments.currency.clone(),
        vat_rate_percent: config.invoicing.vat_rate_percent,
        invoice_line_description: "Annual league membership fee".to_string(),
        invoicing_enabled: config.invoicing.enabled,
        webhook_secret: config.payments.webhook_secret.clone(),
        checkout_success_url: config.payments.checkout_success_url.clone(),
        checkout_cancel_url: config.payments.checkout_cancel_url.clone(),
        templates: EmailTemplates::default(),
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryApplicationRepository {
    records: Arc<Mutex<HashMap<ApplicationId, Application>>>,
}

impl ApplicationRepository for InMemoryApplicationRepository {
    fn insert(&self, application: Application) -> Result<Application, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&application.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(application.id.clone(), application.clone());
        Ok(application)
    }

    fn update(&self, application: Application) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&application.id) {
            guard.insert(application.id.clone(), application);
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<Application>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn remove(&self, id: &ApplicationId) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        guard.remove(id);
        Ok(())
    }

    fn find_active(
        &self,
        club_id: &str,
        applicant_user_id: &str,
    ) -> Result<Option<Application>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .find(|application| {
                application.club_id == club_id
                    && application.applicant_user_id == applicant_user_id
                    && application.status != ApplicationStatus::Rejected
            })
            .cloned())
    }

    fn reference_in_use(&self, reference: &str) -> Result<bool, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .any(|application| application.transfer_reference.as_deref() == Some(reference)))
    }
}

/// Local stand-in for the remote league registry, seeded with a small user
/// and club directory so the service is usable without the real system.
#[derive(Clone)]
pub(crate) struct InMemoryLeagueRegistry {
    users: Arc<Mutex<HashMap<String, RegistryUser>>>,
    clubs: Arc<Mutex<HashMap<String, Vec<RegistryClub>>>>,
    provisioned: Arc<Mutex<HashSet<String>>>,
}

impl Default for InMemoryLeagueRegistry {
    fn default() -> Self {
        let registry = Self {
            users: Arc::default(),
            clubs: Arc::default(),
            provisioned: Arc::default(),
        };
        registry.register_user("usr-1001", "Alex Carter", "alex.carter@example.org");
        registry.register_club("usr-1001", "club-rivertown", "Rivertown FC");
        registry.register_user("usr-1002", "Dana Kovacs", "dana.kovacs@example.org");
        registry.register_club("usr-1002", "club-hillside", "Hillside Rovers");
        registry
    }
}

impl InMemoryLeagueRegistry {
    pub(crate) fn register_user(&self, user_id: &str, name: &str, email: &str) {
        self.users.lock().expect("registry mutex poisoned").insert(
            user_id.to_string(),
            RegistryUser {
                user_id: user_id.to_string(),
                name: name.to_string(),
                email: email.to_string(),
            },
        );
    }

    pub(crate) fn register_club(&self, user_id: &str, club_id: &str, name: &str) {
        self.clubs
            .lock()
            .expect("registry mutex poisoned")
            .entry(user_id.to_string())
            .or_default()
            .push(RegistryClub {
                club_id: club_id.to_string(),
                name: name.to_string(),
            });
    }

    pub(crate) fn league_exists(&self, club_id: &str) -> bool {
        self.provisioned
            .lock()
            .expect("registry mutex poisoned")
            .contains(club_id)
    }
}

impl LeagueRegistry for InMemoryLeagueRegistry {
    fn provision_league(&self, request: ProvisionRequest) -> Result<LeagueRef, RegistryError> {
        let mut provisioned = self.provisioned.lock().expect("registry mutex poisoned");
        if !provisioned.insert(request.club_id.clone()) {
            return Err(RegistryError::DuplicateLeague);
        }
        tracing::info!(club_id = %request.club_id, league = %request.league_name, "league provisioned");
        Ok(LeagueRef {
            league_id: format!("league-{}", request.club_id),
        })
    }

    fn deprovision_league(&self, club_id: &str, removal: RemovalType) -> Result<(), RegistryError> {
        let mut provisioned = self.provisioned.lock().expect("registry mutex poisoned");
        if provisioned.remove(club_id) {
            tracing::info!(club_id = %club_id, removal = removal.label(), "league deprovisioned");
            Ok(())
        } else {
            Err(RegistryError::LeagueNotFound)
        }
    }

    fn user_clubs(&self, user_id: &str) -> Result<Vec<RegistryClub>, RegistryError> {
        let guard = self.clubs.lock().expect("registry mutex poisoned");
        Ok(guard.get(user_id).cloned().unwrap_or_default())
    }

    fn user_by_id(&self, user_id: &str) -> Result<Option<RegistryUser>, RegistryError> {
        let guard = self.users.lock().expect("registry mutex poisoned");
        Ok(guard.get(user_id).cloned())
    }
}

/// Checkout stub that fabricates hosted sessions instead of calling the real
/// gateway. Payment completion arrives through the signed webhook as usual.
#[derive(Default, Clone)]
pub(crate) struct StubCheckoutGateway {
    counter: Arc<AtomicU64>,
}

impl PaymentGateway for StubCheckoutGateway {
    fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let session_id = format!("cs_local_{n:05}");
        tracing::info!(
            session_id = %session_id,
            application_id = %request.metadata.application_id,
            amount_cents = request.amount_cents,
            "checkout session created"
        );
        Ok(CheckoutSession {
            url: format!("https://checkout.gateway.test/session/{session_id}"),
            session_id,
        })
    }
}

/// Invoice issuer backed by a sequence counter and an in-memory PDF store.
#[derive(Default, Clone)]
pub(crate) struct SequentialInvoiceIssuer {
    counter: Arc<AtomicU64>,
    pdfs: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl InvoiceIssuer for SequentialInvoiceIssuer {
    fn issue_invoice(&self, request: InvoiceRequest) -> Result<InvoiceOutcome, InvoiceError> {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let invoice_number = format!("LEA-{n:05}");
        let document = format!(
            "%PDF-1.4\n% {invoice_number}: {} {} net, VAT {}%, {}\n",
            request.net_amount_cents,
            request.currency,
            request.vat_rate_percent,
            request.line_description,
        );
        self.pdfs
            .lock()
            .expect("invoice mutex poisoned")
            .insert(invoice_number.clone(), document.into_bytes());
        tracing::info!(invoice_number = %invoice_number, paid = request.paid, "invoice issued");
        Ok(InvoiceOutcome::Issued { invoice_number })
    }

    fn fetch_invoice_pdf(&self, invoice_number: &str) -> Result<Vec<u8>, InvoiceError> {
        let guard = self.pdfs.lock().expect("invoice mutex poisoned");
        guard
            .get(invoice_number)
            .cloned()
            .ok_or(InvoiceError::NotFound)
    }
}

/// Notifier that logs outcome emails instead of delivering them.
#[derive(Default, Clone)]
pub(crate) struct LoggingNotifier;

impl Notifier for LoggingNotifier {
    fn send(&self, message: EmailMessage) -> Result<(), NotifyError> {
        tracing::info!(to = %message.to, subject = %message.subject, "outcome email queued");
        Ok(())
    }
}
