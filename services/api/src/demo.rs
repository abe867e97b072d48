use crate::infra::{
    settings_from_config, InMemoryApplicationRepository, InMemoryLeagueRegistry, LoggingNotifier,
    SequentialInvoiceIssuer, StubCheckoutGateway,
};
use chrono::Utc;
use clap::{Args, ValueEnum};
use league_ops::config::AppConfig;
use league_ops::error::AppError;
use league_ops::workflows::membership::{
    webhook, Application, BillingDetails, Caller, MembershipService, MembershipSubmission,
    PaymentMethod, WebhookEvent,
};
use serde_json::json;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Payment path to demonstrate.
    #[arg(long, value_enum, default_value_t = DemoPayment::Card)]
    pub(crate) payment: DemoPayment,
    /// Skip the removal-request and offboarding portion of the walk.
    #[arg(long)]
    pub(crate) skip_removal: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, Default)]
pub(crate) enum DemoPayment {
    #[default]
    Card,
    Transfer,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let mut settings = settings_from_config(&config);
    // The walk always shows the billing sub-flow.
    settings.invoicing_enabled = true;
    let webhook_secret = settings.webhook_secret.clone();

    let registry = Arc::new(InMemoryLeagueRegistry::default());
    let service = Arc::new(MembershipService::new(
        Arc::new(InMemoryApplicationRepository::default()),
        registry.clone(),
        Arc::new(StubCheckoutGateway::default()),
        Arc::new(SequentialInvoiceIssuer::default()),
        Arc::new(LoggingNotifier),
        settings,
    ));

    println!("Membership lifecycle demo");

    let payment_method = match args.payment {
        DemoPayment::Card => PaymentMethod::Card,
        DemoPayment::Transfer => PaymentMethod::Transfer,
    };
    let outcome = service.submit(MembershipSubmission {
        club_id: "club-rivertown".to_string(),
        club_name: "Rivertown FC".to_string(),
        applicant_user_id: "usr-1001".to_string(),
        payment_method,
        billing: demo_billing(),
    })?;
    let id = outcome.application.id.clone();
    println!(
        "\nSubmitted application {} ({} payment)",
        id.0,
        outcome.application.payment_method.label()
    );
    if let Some(url) = &outcome.checkout_url {
        println!("Hosted checkout: {url}");
    }
    if let Some(reference) = &outcome.application.transfer_reference {
        println!("Transfer reference: {reference}");
    }
    print_view(&outcome.application);

    let approved = match payment_method {
        PaymentMethod::Card => {
            // The gateway's completion callback, reproduced as a signed
            // delivery through the same verifier the webhook route uses.
            let event_body = match serde_json::to_vec(&json!({
                "type": "checkout_session_completed",
                "data": {
                    "metadata": {
                        "application_id": id.0,
                        "club_id": "club-rivertown",
                        "user_id": "usr-1001"
                    },
                    "amount_total": 15000
                }
            })) {
                Ok(body) => body,
                Err(err) => {
                    println!("Could not build the demo event: {err}");
                    return Ok(());
                }
            };
            let signature = webhook::sign(&event_body, &webhook_secret, Utc::now().timestamp());
            println!("\nDelivering signed checkout completion ({signature})");

            match webhook::verify_and_parse(&event_body, &signature, &webhook_secret) {
                Ok(WebhookEvent::CheckoutSessionCompleted(completed)) => {
                    let confirmation = service.confirm_payment(completed)?;
                    println!("Webhook disposition: {}", confirmation.disposition());
                    service.get(&id)?
                }
                Ok(WebhookEvent::Ignored { event_type }) => {
                    println!("Event {event_type} ignored");
                    return Ok(());
                }
                Err(err) => {
                    println!("Webhook rejected: {err}");
                    return Ok(());
                }
            }
        }
        PaymentMethod::Transfer => {
            println!("\nAdministrator approves after reconciling the transfer");
            service.approve(&id, false)?
        }
    };
    print_view(&approved);

    match service.invoice_pdf(&id, &Caller::Admin) {
        Ok(pdf) => println!("Invoice PDF available ({} bytes)", pdf.len()),
        Err(err) => println!("Invoice PDF unavailable: {err}"),
    }

    if args.skip_removal {
        return Ok(());
    }

    println!("\nApplicant requests removal; administrator executes it");
    service.request_removal(&id, "club is relocating")?;
    let rejected = service.reject(&id, Some("offboarding complete".to_string()), None)?;
    print_view(&rejected);
    println!(
        "League record present in registry: {}",
        registry.league_exists("club-rivertown")
    );

    Ok(())
}

fn demo_billing() -> BillingDetails {
    BillingDetails {
        name: "Rivertown FC Kft.".to_string(),
        zip: "1065".to_string(),
        city: "Budapest".to_string(),
        address: "Nagymezo utca 44".to_string(),
        tax_number: "12345678-2-42".to_string(),
        email: "billing@rivertown.example".to_string(),
    }
}

fn print_view(application: &Application) {
    match serde_json::to_string_pretty(&application.status_view()) {
        Ok(view) => println!("{view}"),
        Err(err) => println!("status view unavailable: {err}"),
    }
}
