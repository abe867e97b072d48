use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for membership applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

/// Workflow status of a membership application.
///
/// The adjacency is deliberately small: `Rejected` is terminal and every
/// other edge requires an explicit orchestrator operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Submitted,
    Approved,
    Rejected,
    RemovalRequested,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::RemovalRequested => "removal_requested",
        }
    }

    /// Whether the workflow permits moving from `self` to `target`.
    pub const fn can_transition_to(self, target: ApplicationStatus) -> bool {
        matches!(
            (self, target),
            (ApplicationStatus::Submitted, ApplicationStatus::Approved)
                | (ApplicationStatus::Submitted, ApplicationStatus::Rejected)
                | (ApplicationStatus::Approved, ApplicationStatus::RemovalRequested)
                | (ApplicationStatus::Approved, ApplicationStatus::Rejected)
                | (ApplicationStatus::RemovalRequested, ApplicationStatus::Rejected)
        )
    }

    /// A league exists remotely for every application that reached approval
    /// and has not yet been compensated.
    pub const fn league_provisioned(self) -> bool {
        matches!(
            self,
            ApplicationStatus::Approved | ApplicationStatus::RemovalRequested
        )
    }
}

/// How the membership fee is collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    Transfer,
}

impl PaymentMethod {
    pub const fn label(self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::Transfer => "transfer",
        }
    }
}

/// Settlement state of the membership fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
        }
    }
}

/// How a provisioned league is compensated when membership ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalType {
    /// Hard-delete the league and any accumulated points.
    DeleteLeague,
    /// Soft-deactivate the league, preserving historical points.
    TerminateLeague,
}

impl RemovalType {
    pub const fn label(self) -> &'static str {
        match self {
            RemovalType::DeleteLeague => "delete_league",
            RemovalType::TerminateLeague => "terminate_league",
        }
    }
}

/// Billing PII captured at submission. Exists only to produce one invoice and
/// is wiped from the record the moment that invoice is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingDetails {
    pub name: String,
    pub zip: String,
    pub city: String,
    pub address: String,
    #[serde(default)]
    pub tax_number: String,
    pub email: String,
}

/// Applicant-provided input for a new membership application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembershipSubmission {
    pub club_id: String,
    pub club_name: String,
    pub applicant_user_id: String,
    pub payment_method: PaymentMethod,
    pub billing: BillingDetails,
}

/// The membership application aggregate root. Mutated only through the
/// orchestrator's state-transition operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub club_id: String,
    pub applicant_user_id: String,
    // Display fields denormalized from the league registry at submission time.
    pub club_name: String,
    pub applicant_name: String,
    pub applicant_email: String,
    pub status: ApplicationStatus,
    pub submitted_at: DateTime<Utc>,
    pub notes: Vec<String>,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub payment_id: Option<String>,
    pub transfer_reference: Option<String>,
    pub billing: Option<BillingDetails>,
    pub invoice_sent: bool,
    pub invoice_number: Option<String>,
    pub removal_type: Option<RemovalType>,
}

impl Application {
    /// Append a system annotation to the free-text note trail.
    pub fn append_system_note(&mut self, note: &str) {
        self.notes.push(format!("[SYSTEM] {note}"));
    }

    /// Wipe the billing PII block. Required once `invoice_sent` flips on.
    pub fn clear_billing(&mut self) {
        self.billing = None;
    }
}

/// Identity of the caller on authorization-gated read paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    Admin,
    Applicant(String),
}

impl Caller {
    pub fn may_access(&self, application: &Application) -> bool {
        match self {
            Caller::Admin => true,
            Caller::Applicant(user_id) => *user_id == application.applicant_user_id,
        }
    }
}
