use serde::{Deserialize, Serialize};

/// A rendered outcome email ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

/// Outbound port for outcome emails. Fire-and-forget: delivery is
/// at-least-once best-effort and failures are logged, never propagated into
/// the workflow.
pub trait Notifier: Send + Sync {
    fn send(&self, message: EmailMessage) -> Result<(), NotifyError>;
}

/// Notification dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("mail transport unavailable: {0}")]
    Transport(String),
}

/// Substitute the supported placeholders into an email template.
pub(crate) fn render_template(
    template: &str,
    club_name: &str,
    applicant_name: &str,
    transfer_reference: Option<&str>,
) -> String {
    template
        .replace("{club_name}", club_name)
        .replace("{applicant_name}", applicant_name)
        .replace("{transfer_reference}", transfer_reference.unwrap_or(""))
}
