//! Outbound email notifications about payout status changes, delivered via
//! the internal email relay's JSON endpoint.

use std::time::Duration;

use claimpay_core::{
  payout::{Payout, PayoutStatus},
  provider::Notifier,
  recipient::Recipient,
};
use serde::Serialize;

use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct NotifierConfig {
  /// Full URL of the email relay's send endpoint.
  pub endpoint: String,
}

#[derive(Debug, Serialize)]
struct EmailRequest<'a> {
  to:      &'a str,
  subject: &'a str,
  body:    &'a str,
}

/// Notifier posting one email per notifying status change.
#[derive(Clone)]
pub struct HttpNotifier {
  client: reqwest::Client,
  config: NotifierConfig,
}

impl HttpNotifier {
  pub fn new(config: NotifierConfig) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(10))
      .build()?;
    Ok(Self { client, config })
  }
}

impl Notifier for HttpNotifier {
  type Error = Error;

  async fn notify(&self, recipient: &Recipient, payout: &Payout) -> Result<()> {
    let Some((subject, body)) = notification_content(recipient, payout) else {
      return Ok(());
    };

    let resp = self
      .client
      .post(&self.config.endpoint)
      .json(&EmailRequest {
        to: &recipient.email,
        subject: &subject,
        body: &body,
      })
      .send()
      .await?;

    if !resp.status().is_success() {
      let status = resp.status().as_u16();
      let message = resp.text().await.unwrap_or_default();
      return Err(Error::Api { status, message });
    }

    tracing::info!(to = %recipient.email, payout_id = %payout.id, "notification sent");
    Ok(())
  }
}

/// Subject and body for a payout's current status, or `None` for statuses
/// that never notify.
fn notification_content(
  recipient: &Recipient,
  payout: &Payout,
) -> Option<(String, String)> {
  let amount = payout.amount_eur;
  let first_name = &recipient.first_name;

  match payout.status {
    PayoutStatus::Sent => Some((
      "Your compensation payment is on the way!".to_string(),
      format!(
        "Dear {first_name},\n\n\
         Great news! Your compensation payment of €{amount:.2} has been sent \
         to your bank account.\n\n\
         Bank Account: {}\n\
         Expected Arrival: 1-3 business days\n\n\
         You will receive another notification when the payment is confirmed \
         in your account.\n\n\
         Thank you for using FlightCompensation.\n\n\
         Best regards,\n\
         FlightCompensation Team\n",
        masked_iban(recipient.iban.as_deref())
      ),
    )),
    PayoutStatus::Settled => Some((
      "Your compensation has been received!".to_string(),
      format!(
        "Dear {first_name},\n\n\
         Your compensation payment of €{amount:.2} has been successfully \
         deposited into your bank account.\n\n\
         Reference: {}\n\n\
         Thank you for choosing FlightCompensation.\n\n\
         Best regards,\n\
         FlightCompensation Team\n",
        payout.id
      ),
    )),
    PayoutStatus::Failed => Some((
      "Action needed: Payment issue".to_string(),
      format!(
        "Dear {first_name},\n\n\
         Unfortunately, we encountered an issue sending your compensation \
         payment of €{amount:.2}.\n\n\
         Reason: {}\n\n\
         Please log into the app and verify your bank details are correct. \
         Once updated, we will retry the payment automatically.\n\n\
         If you need assistance, please contact our support team.\n\n\
         Best regards,\n\
         FlightCompensation Team\n",
        payout.failure_reason.as_deref().unwrap_or("Unknown error")
      ),
    )),
    _ => None,
  }
}

/// Show only the first and last four characters of an IBAN. Counts `char`s,
/// not bytes — stored IBANs are unvalidated free text.
fn masked_iban(iban: Option<&str>) -> String {
  let Some(i) = iban else {
    return "N/A".to_string();
  };
  let count = i.chars().count();
  if count < 8 {
    return "N/A".to_string();
  }
  let head: String = i.chars().take(4).collect();
  let tail: String = i.chars().skip(count - 4).collect();
  format!("{head}...{tail}")
}
