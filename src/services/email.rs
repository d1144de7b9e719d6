// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Transactional email delivery.
//!
//! Messages are posted as JSON to an HTTPS email API. Delivery is never
//! critical: callers log failures and carry on. Without configuration the
//! mailer only logs what it would have sent.

use crate::config::{EmailConfig, PaymentConfig};
use crate::error::AppError;
use crate::models::{Enrollment, Transaction};
use serde::Serialize;

/// One outgoing message.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

/// Email API client.
pub struct Mailer {
    http: reqwest::Client,
    config: Option<EmailConfig>,
    /// Mock: messages captured instead of sent (debug builds only).
    #[cfg(debug_assertions)]
    outbox: Option<std::sync::Mutex<Vec<OutgoingEmail>>>,
}

impl Mailer {
    pub fn new(config: Option<EmailConfig>) -> Self {
        if config.is_none() {
            tracing::warn!("EMAIL_API_URL not set; outgoing email will only be logged");
        }
        Self {
            http: reqwest::Client::new(),
            config,
            #[cfg(debug_assertions)]
            outbox: None,
        }
    }

    /// Create a mock mailer that records messages for inspection.
    /// Only available in debug/test builds.
    #[cfg(debug_assertions)]
    pub fn new_mock() -> Self {
        Self {
            http: reqwest::Client::new(),
            config: None,
            outbox: Some(std::sync::Mutex::new(Vec::new())),
        }
    }

    /// Messages recorded by the mock mailer.
    #[cfg(debug_assertions)]
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.outbox
            .as_ref()
            .map(|outbox| outbox.lock().map(|m| m.clone()).unwrap_or_default())
            .unwrap_or_default()
    }

    /// Send a message through the email API.
    pub async fn send(&self, email: OutgoingEmail) -> Result<(), AppError> {
        #[cfg(debug_assertions)]
        {
            if let Some(outbox) = &self.outbox {
                if let Ok(mut messages) = outbox.lock() {
                    messages.push(email);
                }
                return Ok(());
            }
        }

        let Some(config) = &self.config else {
            tracing::info!(to = %email.to, subject = %email.subject, "Email delivery disabled, dropping message");
            return Ok(());
        };

        let response = self
            .http
            .post(&config.api_url)
            .bearer_auth(&config.api_key)
            .json(&SendRequest {
                from: &config.from,
                to: &email.to,
                subject: &email.subject,
                text: &email.text,
            })
            .send()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Email API request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Internal(anyhow::anyhow!(
                "Email API returned HTTP {}: {}",
                status,
                body
            )));
        }

        tracing::info!(to = %email.to, subject = %email.subject, "Email sent");
        Ok(())
    }

    /// Send, logging instead of failing.
    pub async fn send_best_effort(&self, email: OutgoingEmail) {
        let to = email.to.clone();
        let subject = email.subject.clone();
        if let Err(e) = self.send(email).await {
            tracing::warn!(to = %to, subject = %subject, error = %e, "Failed to send email (continuing)");
        }
    }
}

// ─── Templates ───────────────────────────────────────────────

pub fn verification_email(to: &str, name: &str, link: &str) -> OutgoingEmail {
    OutgoingEmail {
        to: to.to_string(),
        subject: "Potvrdite vašu email adresu".to_string(),
        text: format!(
            "Zdravo {},\n\n\
             hvala što ste se registrovali. Potvrdite email adresu klikom na link:\n\n\
             {}\n\n\
             Link važi 24 sata.\n",
            name, link
        ),
    }
}

pub fn payment_instructions_email(
    transaction: &Transaction,
    payment: &PaymentConfig,
) -> OutgoingEmail {
    OutgoingEmail {
        to: transaction.user_email.clone(),
        subject: format!("Instrukcije za uplatu ({})", transaction.payment_ref),
        text: format!(
            "Poštovani,\n\n\
             za \"{}\" izvršite uplatu sa sledećim podacima:\n\n\
             Primalac: {}, {}\n\
             Račun primaoca: {}\n\
             Iznos: {} {}\n\
             Svrha uplate: {}\n\
             Poziv na broj: {}\n\n\
             Pristup dobijate čim uplata bude proverena.\n",
            transaction.item_title,
            payment.recipient,
            payment.address,
            payment.account,
            transaction.amount,
            transaction.currency,
            transaction.item_title,
            transaction.payment_ref,
        ),
    }
}

pub fn payment_confirmed_email(transaction: &Transaction) -> OutgoingEmail {
    OutgoingEmail {
        to: transaction.user_email.clone(),
        subject: "Uplata je potvrđena".to_string(),
        text: format!(
            "Poštovani,\n\n\
             vaša uplata (poziv na broj {}) za \"{}\" je potvrđena. Pristup je aktiviran.\n",
            transaction.payment_ref, transaction.item_title
        ),
    }
}

pub fn payment_rejected_email(transaction: &Transaction) -> OutgoingEmail {
    let reason = transaction
        .rejection_reason
        .as_deref()
        .unwrap_or("uplata nije pronađena");
    OutgoingEmail {
        to: transaction.user_email.clone(),
        subject: "Uplata nije potvrđena".to_string(),
        text: format!(
            "Poštovani,\n\n\
             uplatu sa pozivom na broj {} za \"{}\" nismo mogli da potvrdimo.\n\
             Razlog: {}\n\n\
             Za pomoć odgovorite na ovaj email.\n",
            transaction.payment_ref, transaction.item_title, reason
        ),
    }
}

pub fn enrollment_activated_email(enrollment: &Enrollment) -> OutgoingEmail {
    OutgoingEmail {
        to: enrollment.user_email.clone(),
        subject: "Paket online časova je aktiviran".to_string(),
        text: format!(
            "Poštovani,\n\n\
             paket \"{}\" je aktiviran i imate {} časova na raspolaganju.\n\
             Javićemo vam termin vaše grupe.\n",
            enrollment.package_name, enrollment.remaining_classes
        ),
    }
}
