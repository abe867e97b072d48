use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};

use crate::workflows::membership::domain::{
    Application, ApplicationId, ApplicationStatus, BillingDetails, MembershipSubmission,
    PaymentMethod, RemovalType,
};
use crate::workflows::membership::gateway::{
    CheckoutRequest, CheckoutSession, GatewayError, PaymentGateway,
};
use crate::workflows::membership::invoicing::{
    InvoiceError, InvoiceIssuer, InvoiceOutcome, InvoiceRequest,
};
use crate::workflows::membership::notify::{EmailMessage, Notifier, NotifyError};
use crate::workflows::membership::registry::{
    LeagueRef, LeagueRegistry, ProvisionRequest, RegistryClub, RegistryError, RegistryUser,
};
use crate::workflows::membership::repository::{ApplicationRepository, RepositoryError};
use crate::workflows::membership::service::MembershipService;
use crate::workflows::membership::settings::{EmailTemplates, MembershipSettings};

pub(super) fn settings() -> MembershipSettings {
    MembershipSettings {
        membership_fee_cents: 15000,
        currency: "EUR".to_string(),
        vat_rate_percent: 27,
        invoice_line_description: "Annual league membership fee".to_string(),
        invoicing_enabled: true,
        webhook_secret: "whsec_test".to_string(),
        checkout_success_url: "https://league.example/checkout/success".to_string(),
        checkout_cancel_url: "https://league.example/checkout/cancel".to_string(),
        templates: EmailTemplates::default(),
    }
}

pub(super) fn billing() -> BillingDetails {
    BillingDetails {
        name: "Rivertown FC Kft.".to_string(),
        zip: "1065".to_string(),
        city: "Budapest".to_string(),
        address: "Nagymezo utca 44".to_string(),
        tax_number: "12345678-2-42".to_string(),
        email: "billing@rivertown.example".to_string(),
    }
}

pub(super) fn submission() -> MembershipSubmission {
    transfer_submission("C1", "U1")
}

pub(super) fn transfer_submission(club_id: &str, user_id: &str) -> MembershipSubmission {
    MembershipSubmission {
        club_id: club_id.to_string(),
        club_name: format!("Club {club_id}"),
        applicant_user_id: user_id.to_string(),
        payment_method: PaymentMethod::Transfer,
        billing: billing(),
    }
}

pub(super) fn card_submission(club_id: &str, user_id: &str) -> MembershipSubmission {
    MembershipSubmission {
        payment_method: PaymentMethod::Card,
        ..transfer_submission(club_id, user_id)
    }
}

#[derive(Default)]
pub(super) struct MemoryRepository {
    records: Mutex<HashMap<ApplicationId, Application>>,
}

impl MemoryRepository {
    pub(super) fn get(&self, id: &ApplicationId) -> Option<Application> {
        self.records
            .lock()
            .expect("repository mutex poisoned")
            .get(id)
            .cloned()
    }
}

impl ApplicationRepository for MemoryRepository {
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

pub(super) struct MemoryRegistry {
    pub(super) provision_calls: AtomicUsize,
    pub(super) deprovision_calls: AtomicUsize,
    pub(super) fail_provision: AtomicBool,
    pub(super) fail_deprovision: AtomicBool,
    provisioned: Mutex<HashSet<String>>,
    users: Mutex<HashMap<String, RegistryUser>>,
    clubs: Mutex<HashMap<String, Vec<RegistryClub>>>,
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        let registry = Self {
            provision_calls: AtomicUsize::new(0),
            deprovision_calls: AtomicUsize::new(0),
            fail_provision: AtomicBool::new(false),
            fail_deprovision: AtomicBool::new(false),
            provisioned: Mutex::default(),
            users: Mutex::default(),
            clubs: Mutex::default(),
        };
        registry.add_user("U1", "Alex Carter", "alex.carter@example.org");
        registry.add_club("U1", "C1", "Rivertown FC");
        registry
    }
}

impl MemoryRegistry {
    pub(super) fn add_user(&self, user_id: &str, name: &str, email: &str) {
        self.users.lock().expect("registry mutex poisoned").insert(
            user_id.to_string(),
            RegistryUser {
                user_id: user_id.to_string(),
                name: name.to_string(),
                email: email.to_string(),
            },
        );
    }

    pub(super) fn add_club(&self, user_id: &str, club_id: &str, name: &str) {
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

    pub(super) fn mark_provisioned(&self, club_id: &str) {
        self.provisioned
            .lock()
            .expect("registry mutex poisoned")
            .insert(club_id.to_string());
    }

    pub(super) fn league_exists(&self, club_id: &str) -> bool {
        self.provisioned
            .lock()
            .expect("registry mutex poisoned")
            .contains(club_id)
    }
}

impl LeagueRegistry for MemoryRegistry {
    fn provision_league(&self, request: ProvisionRequest) -> Result<LeagueRef, RegistryError> {
        self.provision_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_provision.load(Ordering::SeqCst) {
            return Err(RegistryError::Unavailable("registry offline".to_string()));
        }
        let mut provisioned = self.provisioned.lock().expect("registry mutex poisoned");
        if !provisioned.insert(request.club_id.clone()) {
            return Err(RegistryError::DuplicateLeague);
        }
        Ok(LeagueRef {
            league_id: format!("league-{}", request.club_id),
        })
    }

    fn deprovision_league(
        &self,
        club_id: &str,
        _removal: RemovalType,
    ) -> Result<(), RegistryError> {
        self.deprovision_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_deprovision.load(Ordering::SeqCst) {
            return Err(RegistryError::Unavailable("registry offline".to_string()));
        }
        let mut provisioned = self.provisioned.lock().expect("registry mutex poisoned");
        if provisioned.remove(club_id) {
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

/// Registry whose provisioning parks until the test releases it, so a test
/// can hold one operation inside the remote call while a rival arrives.
pub(super) struct GatedRegistry {
    inner: MemoryRegistry,
    pub(super) provision_calls: AtomicUsize,
    entered: Mutex<mpsc::Sender<()>>,
    release: Mutex<mpsc::Receiver<()>>,
}

pub(super) struct Gate {
    entered: mpsc::Receiver<()>,
    release: mpsc::Sender<()>,
}

impl Gate {
    pub(super) fn wait_for_entry(&self) {
        self.entered.recv().expect("provisioning call reached");
    }

    pub(super) fn release(&self) {
        self.release.send(()).expect("provisioning call still parked");
    }
}

pub(super) fn gated_registry() -> (Arc<GatedRegistry>, Gate) {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let registry = Arc::new(GatedRegistry {
        inner: MemoryRegistry::default(),
        provision_calls: AtomicUsize::new(0),
        entered: Mutex::new(entered_tx),
        release: Mutex::new(release_rx),
    });
    let gate = Gate {
        entered: entered_rx,
        release: release_tx,
    };
    (registry, gate)
}

pub(super) struct GatedHarness {
    pub(super) service: Arc<MembershipService>,
    pub(super) repository: Arc<MemoryRepository>,
    pub(super) registry: Arc<GatedRegistry>,
    pub(super) gate: Gate,
}

pub(super) fn gated_harness() -> GatedHarness {
    let (registry, gate) = gated_registry();
    let repository = Arc::new(MemoryRepository::default());
    let service = Arc::new(MembershipService::new(
        repository.clone(),
        registry.clone(),
        Arc::new(MemoryGateway::default()),
        Arc::new(MemoryInvoices::default()),
        Arc::new(MemoryNotifier::default()),
        settings(),
    ));
    GatedHarness {
        service,
        repository,
        registry,
        gate,
    }
}

impl LeagueRegistry for GatedRegistry {
    fn provision_league(&self, request: ProvisionRequest) -> Result<LeagueRef, RegistryError> {
        self.provision_calls.fetch_add(1, Ordering::SeqCst);
        self.entered
            .lock()
            .expect("entry mutex poisoned")
            .send(())
            .expect("test listens for entry");
        self.release
            .lock()
            .expect("release mutex poisoned")
            .recv()
            .expect("test releases the call");
        Ok(LeagueRef {
            league_id: format!("league-{}", request.club_id),
        })
    }

    fn deprovision_league(
        &self,
        club_id: &str,
        removal: RemovalType,
    ) -> Result<(), RegistryError> {
        self.inner.deprovision_league(club_id, removal)
    }

    fn user_clubs(&self, user_id: &str) -> Result<Vec<RegistryClub>, RegistryError> {
        self.inner.user_clubs(user_id)
    }

    fn user_by_id(&self, user_id: &str) -> Result<Option<RegistryUser>, RegistryError> {
        self.inner.user_by_id(user_id)
    }
}

#[derive(Default)]
pub(super) struct MemoryGateway {
    pub(super) fail: AtomicBool,
    counter: AtomicUsize,
    sessions: Mutex<Vec<CheckoutRequest>>,
}

impl MemoryGateway {
    pub(super) fn sessions(&self) -> Vec<CheckoutRequest> {
        self.sessions.lock().expect("gateway mutex poisoned").clone()
    }
}

impl PaymentGateway for MemoryGateway {
    fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable("gateway offline".to_string()));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.sessions
            .lock()
            .expect("gateway mutex poisoned")
            .push(request);
        Ok(CheckoutSession {
            session_id: format!("cs_{n:04}"),
            url: format!("https://pay.example/cs_{n:04}"),
        })
    }
}

#[derive(Default)]
pub(super) struct MemoryInvoices {
    pub(super) fail: AtomicBool,
    counter: AtomicUsize,
    issued: Mutex<Vec<InvoiceRequest>>,
    pdfs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryInvoices {
    pub(super) fn issued(&self) -> Vec<InvoiceRequest> {
        self.issued.lock().expect("invoice mutex poisoned").clone()
    }
}

impl InvoiceIssuer for MemoryInvoices {
    fn issue_invoice(&self, request: InvoiceRequest) -> Result<InvoiceOutcome, InvoiceError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(InvoiceError::Unavailable("provider offline".to_string()));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let invoice_number = format!("INV-{n:04}");
        self.issued
            .lock()
            .expect("invoice mutex poisoned")
            .push(request);
        self.pdfs
            .lock()
            .expect("invoice mutex poisoned")
            .insert(invoice_number.clone(), b"%PDF-1.4 membership".to_vec());
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

#[derive(Default)]
pub(super) struct MemoryNotifier {
    sent: Mutex<Vec<EmailMessage>>,
}

impl MemoryNotifier {
    pub(super) fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().expect("notifier mutex poisoned").clone()
    }
}

impl Notifier for MemoryNotifier {
    fn send(&self, message: EmailMessage) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .expect("notifier mutex poisoned")
            .push(message);
        Ok(())
    }
}

pub(super) struct Harness {
    pub(super) service: Arc<MembershipService>,
    pub(super) repository: Arc<MemoryRepository>,
    pub(super) registry: Arc<MemoryRegistry>,
    pub(super) gateway: Arc<MemoryGateway>,
    pub(super) invoices: Arc<MemoryInvoices>,
    pub(super) notifier: Arc<MemoryNotifier>,
}

pub(super) fn harness() -> Harness {
    harness_with(settings())
}

pub(super) fn harness_with(settings: MembershipSettings) -> Harness {
    let repository = Arc::new(MemoryRepository::default());
    let registry = Arc::new(MemoryRegistry::default());
    let gateway = Arc::new(MemoryGateway::default());
    let invoices = Arc::new(MemoryInvoices::default());
    let notifier = Arc::new(MemoryNotifier::default());
    let service = Arc::new(MembershipService::new(
        repository.clone(),
        registry.clone(),
        gateway.clone(),
        invoices.clone(),
        notifier.clone(),
        settings,
    ));
    Harness {
        service,
        repository,
        registry,
        gateway,
        invoices,
        notifier,
    }
}

pub(super) fn is_six_digits(value: &str) -> bool {
    value.len() == 6 && value.bytes().all(|b| b.is_ascii_digit())
}

pub(super) async fn read_json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
