use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{Application, ApplicationId};

/// Storage abstraction for the application store so the orchestrator can be
/// exercised in isolation. The store is the single source of truth for
/// workflow state; the league registry is a separate system with no shared
/// transaction boundary.
pub trait ApplicationRepository: Send + Sync {
    fn insert(&self, application: Application) -> Result<Application, RepositoryError>;
    fn update(&self, application: Application) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &ApplicationId) -> Result<Option<Application>, RepositoryError>;
    /// Physical delete, used only to roll back a submission whose checkout
    /// session could not be created. Rejected applications are retained.
    fn remove(&self, id: &ApplicationId) -> Result<(), RepositoryError>;
    /// The non-rejected application for a (club, applicant) pair, if any.
    fn find_active(
        &self,
        club_id: &str,
        applicant_user_id: &str,
    ) -> Result<Option<Application>, RepositoryError>;
    /// Whether any stored application already carries this transfer reference.
    fn reference_in_use(&self, reference: &str) -> Result<bool, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Sanitized representation of an application for API responses. Billing PII
/// is never part of this view.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationView {
    pub application_id: ApplicationId,
    pub club_id: String,
    pub club_name: String,
    pub status: &'static str,
    pub payment_method: &'static str,
    pub payment_status: &'static str,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_reference: Option<String>,
    pub invoice_sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,
    pub notes: Vec<String>,
}

impl Application {
    pub fn status_view(&self) -> ApplicationView {
        ApplicationView {
            application_id: self.id.clone(),
            club_id: self.club_id.clone(),
            club_name: self.club_name.clone(),
            status: self.status.label(),
            payment_method: self.payment_method.label(),
            payment_status: self.payment_status.label(),
            submitted_at: self.submitted_at,
            transfer_reference: self.transfer_reference.clone(),
            invoice_sent: self.invoice_sent,
            invoice_number: self.invoice_number.clone(),
            notes: self.notes.clone(),
        }
    }
}
