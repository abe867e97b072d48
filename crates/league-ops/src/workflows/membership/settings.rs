use serde::{Deserialize, Serialize};

/// Immutable configuration snapshot injected into the orchestrator at
/// construction. The orchestrator never reads ambient global state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MembershipSettings {
    pub membership_fee_cents: u32,
    pub currency: String,
    pub vat_rate_percent: u8,
    pub invoice_line_description: String,
    pub invoicing_enabled: bool,
    pub webhook_secret: String,
    pub checkout_success_url: String,
    pub checkout_cancel_url: String,
    pub templates: EmailTemplates,
}

/// Outcome email templates. Placeholders `{club_name}`, `{applicant_name}`,
/// and `{transfer_reference}` are substituted at send time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailTemplates {
    pub approval_subject: String,
    pub approval_body: String,
    pub rejection_subject: String,
    pub rejection_body: String,
    pub transfer_instructions_subject: String,
    pub transfer_instructions_body: String,
}

impl Default for EmailTemplates {
    fn default() -> Self {
        Self {
            approval_subject: "Welcome to the league, {club_name}!".to_string(),
            approval_body: "<p>Dear {applicant_name},</p>\
                <p>Your membership application for <strong>{club_name}</strong> has been \
                approved. Your league record is live.</p>"
                .to_string(),
            rejection_subject: "Membership update for {club_name}".to_string(),
            rejection_body: "<p>Dear {applicant_name},</p>\
                <p>Your membership application for <strong>{club_name}</strong> has been \
                closed. Contact the league office for details.</p>"
                .to_string(),
            transfer_instructions_subject: "Payment instructions for {club_name}".to_string(),
            transfer_instructions_body: "<p>Dear {applicant_name},</p>\
                <p>Please wire the membership fee and quote the mandatory payment \
                reference <strong>{transfer_reference}</strong>. Your application will \
                be reviewed once the transfer is reconciled.</p>"
                .to_string(),
        }
    }
}
