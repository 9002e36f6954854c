use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use tracing::instrument;

use crate::config::PaymentConfig;

const API_BASE: &str = "https://api.yookassa.ru/v3";

#[derive(Debug, Error)]
pub enum PaymentError {
  #[error("payment gateway request failed: {0}")]
  Transport(#[from] reqwest::Error),
  #[error("payment gateway rejected the request: {status} {body}")]
  Api { status: u16, body: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
  Pending,
  WaitingForCapture,
  Succeeded,
  Canceled,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Payment {
  pub id: String,
  pub status: PaymentStatus,
  #[serde(default)]
  pub confirmation: Option<Confirmation>,
}

impl Payment {
  pub fn confirmation_url(&self) -> Option<&str> {
    self
      .confirmation
      .as_ref()
      .and_then(|confirmation| confirmation.confirmation_url.as_deref())
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Confirmation {
  #[serde(default)]
  pub confirmation_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreatePaymentRequest {
  amount: Amount,
  confirmation: ConfirmationRequest,
  capture: bool,
  description: String,
  metadata: PaymentMetadata,
}

#[derive(Debug, Serialize)]
struct Amount {
  value: String,
  currency: &'static str,
}

#[derive(Debug, Serialize)]
struct ConfirmationRequest {
  #[serde(rename = "type")]
  kind: &'static str,
  return_url: String,
}

#[derive(Debug, Serialize)]
struct PaymentMetadata {
  order_id: i64,
  user_id: i64,
}

/// Thin client for the two gateway calls the bot needs: create a payment
/// and look one up by id.
#[derive(Clone)]
pub struct PaymentClient {
  http: reqwest::Client,
  config: PaymentConfig,
}

impl PaymentClient {
  pub fn new(config: PaymentConfig) -> Self {
    Self {
      http: reqwest::Client::new(),
      config,
    }
  }

  #[instrument(skip(self, description))]
  pub async fn create_payment(
    &self,
    amount_kopecks: i64,
    description: String,
    order_id: i64,
    user_id: i64,
  ) -> Result<Payment, PaymentError> {
    let request = CreatePaymentRequest {
      amount: Amount {
        value: format_amount(amount_kopecks),
        currency: "RUB",
      },
      confirmation: ConfirmationRequest {
        kind: "redirect",
        return_url: self.config.return_url.clone(),
      },
      capture: true,
      description,
      metadata: PaymentMetadata { order_id, user_id },
    };

    let response = self
      .http
      .post(format!("{API_BASE}/payments"))
      .basic_auth(&self.config.shop_id, Some(&self.config.secret_key))
      .header("Idempotence-Key", uuid::Uuid::new_v4().to_string())
      .json(&request)
      .send()
      .await?;

    let payment = decode_payment(response).await?;
    info!(order_id, payment_id = %payment.id, "created payment");
    Ok(payment)
  }

  #[instrument(skip(self))]
  pub async fn find_payment(&self, payment_id: &str) -> Result<Payment, PaymentError> {
    let response = self
      .http
      .get(format!("{API_BASE}/payments/{payment_id}"))
      .basic_auth(&self.config.shop_id, Some(&self.config.secret_key))
      .send()
      .await?;
    decode_payment(response).await
  }
}

async fn decode_payment(response: reqwest::Response) -> Result<Payment, PaymentError> {
  let status = response.status();
  if !status.is_success() {
    let body = response.text().await.unwrap_or_default();
    return Err(PaymentError::Api {
      status: status.as_u16(),
      body,
    });
  }
  Ok(response.json::<Payment>().await?)
}

/// Kopecks to the gateway's "123.45" decimal string.
fn format_amount(kopecks: i64) -> String {
  format!("{}.{:02}", kopecks / 100, kopecks % 100)
}

#[cfg(test)]
mod tests {
  use super::Payment;
  use super::PaymentStatus;
  use super::format_amount;

  #[test]
  fn formats_decimal_amounts() {
    assert_eq!(format_amount(25000), "250.00");
    assert_eq!(format_amount(199_95), "199.95");
    assert_eq!(format_amount(5), "0.05");
  }

  #[test]
  fn decodes_succeeded_payment() {
    let payment: Payment = serde_json::from_str(
      r#"{"id": "2d1e8f3a", "status": "succeeded", "paid": true}"#,
    )
    .expect("valid payload");
    assert_eq!(payment.status, PaymentStatus::Succeeded);
    assert!(payment.confirmation_url().is_none());
  }

  #[test]
  fn decodes_pending_payment_with_confirmation_url() {
    let payment: Payment = serde_json::from_str(
      r#"{
        "id": "2d1e8f3a",
        "status": "pending",
        "confirmation": {"type": "redirect", "confirmation_url": "https://yookassa.ru/checkout/x"}
      }"#,
    )
    .expect("valid payload");
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert_eq!(payment.confirmation_url(), Some("https://yookassa.ru/checkout/x"));
  }
}
