//! Outbound notifications.
//!
//! The dispatcher is driven purely by `RegistrationOutcome`: a new
//! registration produces exactly one send attempt, a repeated one produces
//! none. Delivery is fire-and-log. A failed send is reported to the caller in
//! the returned `DispatchReport` and written to the log, but the registration
//! it belongs to is already committed and stays that way.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{error, info, instrument};

use catalog::Product;

use crate::interest::RegistrationOutcome;

/// Titles longer than this are cut in subjects.
const SUBJECT_TITLE_CHARS: usize = 20;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmailContent {
    pub subject: String,
    pub body: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotificationKind {
    /// Sent once when a user starts tracking a product.
    Welcome,
    /// Product was out of stock and is available again.
    ChangeOfStock,
    /// Current price dropped below every earlier observation.
    LowestPrice,
    /// Discount rate reached the configured threshold (percent).
    ThresholdMet { threshold: Decimal },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("delivery to {recipients:?} failed: {reason}")]
pub struct DeliveryError {
    pub recipients: Vec<String>,
    pub reason: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, content: &EmailContent, recipients: &[String]) -> Result<(), DeliveryError>;
}

/// Notifier that only writes messages to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, content: &EmailContent, recipients: &[String]) -> Result<(), DeliveryError> {
        info!(
            target: "mail",
            subject = %content.subject,
            recipients = ?recipients,
            "notification sent"
        );
        Ok(())
    }
}

/// What happened to a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchReport {
    /// The outcome did not call for a notification (or nobody to send to).
    NotTriggered,
    Delivered,
    Failed(DeliveryError),
}

impl DispatchReport {
    pub fn was_attempted(&self) -> bool {
        !matches!(self, DispatchReport::NotTriggered)
    }
}

pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// Send the welcome message iff `outcome` is a new registration.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn dispatch_if_new(
        &self,
        product: &Product,
        user_email: &str,
        outcome: RegistrationOutcome,
    ) -> DispatchReport {
        if outcome != RegistrationOutcome::NewlyRegistered {
            return DispatchReport::NotTriggered;
        }

        let content = generate_email_body(product, NotificationKind::Welcome);
        self.deliver(&content, &[user_email.to_string()]).await
    }

    /// Send `kind` to every user tracking `product`.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn notify_users(&self, product: &Product, kind: NotificationKind) -> DispatchReport {
        let recipients = product.emails();
        if recipients.is_empty() {
            return DispatchReport::NotTriggered;
        }

        let content = generate_email_body(product, kind);
        self.deliver(&content, &recipients).await
    }

    async fn deliver(&self, content: &EmailContent, recipients: &[String]) -> DispatchReport {
        match self.notifier.send(content, recipients).await {
            Ok(()) => DispatchReport::Delivered,
            Err(e) => {
                error!(error = %e, subject = %content.subject, "notification delivery failed");
                DispatchReport::Failed(e)
            }
        }
    }
}

/// Render the message for `kind` from the product's descriptive fields.
pub fn generate_email_body(product: &Product, kind: NotificationKind) -> EmailContent {
    let title = if product.details.title.is_empty() {
        product.url.as_str()
    } else {
        product.details.title.as_str()
    };
    let short = shorten_title(title);
    let link = &product.url;

    match kind {
        NotificationKind::Welcome => EmailContent {
            subject: format!("Welcome to price tracking for {short}"),
            body: format!(
                "You are now tracking {title}.\n\
                 Current price: {currency}{price}\n\n\
                 We will let you know when it goes back in stock, hits a new low \
                 or drops past a big discount.\n\n{link}",
                currency = product.details.currency,
                price = product.current_price,
            ),
        },
        NotificationKind::ChangeOfStock => EmailContent {
            subject: format!("{short} is back in stock!"),
            body: format!("{title} has been restocked. Grab yours before it runs out again.\n\n{link}"),
        },
        NotificationKind::LowestPrice => EmailContent {
            subject: format!("Lowest price alert for {short}"),
            body: format!(
                "{title} just reached its lowest tracked price: {currency}{price}.\n\n{link}",
                currency = product.details.currency,
                price = product.current_price,
            ),
        },
        NotificationKind::ThresholdMet { threshold } => EmailContent {
            subject: format!("Discount alert for {short}"),
            body: format!(
                "{title} is now discounted by at least {threshold}%.\n\n{link}"
            ),
        },
    }
}

fn shorten_title(title: &str) -> String {
    if title.chars().count() > SUBJECT_TITLE_CHARS {
        let cut: String = title.chars().take(SUBJECT_TITLE_CHARS).collect();
        format!("{cut}...")
    } else {
        title.to_string()
    }
}
