use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;

use super::gateway::{
    constant_time_eq, to_minor_units, GatewayError, OrderMetadata, PaymentGateway, RemoteOrder,
    RemotePayment, RemotePaymentStatus,
};
use crate::config::Config;
use crate::models::Gateway;

const RAZORPAY_BASE: &str = "https://api.razorpay.com/v1";

/// Client checkout: the browser pays against a Razorpay order and posts back
/// `order_id`, `payment_id` and an HMAC signature.
pub struct RazorpayService {
    key_id: Option<String>,
    key_secret: Option<String>,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct OrderBody {
    id: String,
}

#[derive(Debug, Deserialize)]
struct PaymentBody {
    status: String,
    amount: i64,
}

impl RazorpayService {
    pub fn new(key_id: Option<String>, key_secret: Option<String>) -> Self {
        RazorpayService {
            key_id,
            key_secret,
            client: Client::new(),
        }
    }

    pub fn from_config() -> Self {
        Self::new(Config::razorpay_key_id(), Config::razorpay_key_secret())
    }

    fn credentials(&self) -> Result<(&str, &str), GatewayError> {
        match (&self.key_id, &self.key_secret) {
            (Some(id), Some(secret)) => Ok((id.as_str(), secret.as_str())),
            _ => Err(GatewayError::NotConfigured("Razorpay")),
        }
    }

    /// `{order_id}|{payment_id}`, the string Razorpay signs.
    pub fn signature_payload(order_id: &str, payment_id: &str) -> String {
        format!("{}|{}", order_id, payment_id)
    }

    pub fn sign(secret: &str, payload: &str) -> Result<String, GatewayError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .map_err(|_| GatewayError::Malformed("invalid HMAC key".to_string()))?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

#[async_trait]
impl PaymentGateway for RazorpayService {
    fn gateway(&self) -> Gateway {
        Gateway::Razorpay
    }

    async fn create_remote_order(
        &self,
        amount: f64,
        currency: &str,
        metadata: &OrderMetadata<'_>,
    ) -> Result<RemoteOrder, GatewayError> {
        let (key_id, key_secret) = self.credentials()?;

        let res = self
            .client
            .post(format!("{}/orders", RAZORPAY_BASE))
            .basic_auth(key_id, Some(key_secret))
            .json(&json!({
                "amount": to_minor_units(amount),
                "currency": currency,
                "receipt": metadata.transaction_id,
                "payment_capture": 1,
                "notes": {
                    "subject_id": metadata.subject_id,
                    "plan_id": metadata.plan_id,
                }
            }))
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(GatewayError::Rejected(
                res.text().await.unwrap_or_else(|_| "Razorpay error".to_string()),
            ));
        }

        let body: OrderBody = res
            .json()
            .await
            .map_err(|e| GatewayError::Malformed(e.to_string()))?;
        Ok(RemoteOrder {
            gateway_order_id: body.id,
            redirect_url: None,
        })
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<RemotePayment, GatewayError> {
        let (key_id, key_secret) = self.credentials()?;

        let res = self
            .client
            .get(format!("{}/payments/{}", RAZORPAY_BASE, payment_id))
            .basic_auth(key_id, Some(key_secret))
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(GatewayError::Rejected(
                res.text().await.unwrap_or_else(|_| "Razorpay error".to_string()),
            ));
        }

        let body: PaymentBody = res
            .json()
            .await
            .map_err(|e| GatewayError::Malformed(e.to_string()))?;
        let status = match body.status.as_str() {
            "captured" => RemotePaymentStatus::Captured,
            "failed" | "refunded" => RemotePaymentStatus::Failed,
            _ => RemotePaymentStatus::Pending,
        };
        Ok(RemotePayment {
            status,
            amount_minor: body.amount,
        })
    }

    fn verify_signature(&self, payload: &str, signature: &str) -> Result<(), GatewayError> {
        let (_, key_secret) = self.credentials()?;
        let expected = Self::sign(key_secret, payload)?;
        if constant_time_eq(&expected, signature) {
            Ok(())
        } else {
            Err(GatewayError::SignatureMismatch)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> RazorpayService {
        RazorpayService::new(Some("rzp_test_key".to_string()), Some("s3cr3t".to_string()))
    }

    #[test]
    fn accepts_signature_over_order_and_payment() {
        let payload = RazorpayService::signature_payload("order_9A33XWu170gUtm", "pay_29QQoUBi66xm2f");
        let signature = RazorpayService::sign("s3cr3t", &payload).unwrap();
        assert!(service().verify_signature(&payload, &signature).is_ok());
    }

    #[test]
    fn rejects_tampered_payload() {
        let signature = RazorpayService::sign("s3cr3t", "order_1|pay_1").unwrap();
        assert!(matches!(
            service().verify_signature("order_1|pay_2", &signature),
            Err(GatewayError::SignatureMismatch)
        ));
    }

    #[test]
    fn rejects_signature_from_other_secret() {
        let signature = RazorpayService::sign("other", "order_1|pay_1").unwrap();
        assert!(service().verify_signature("order_1|pay_1", &signature).is_err());
    }

    #[test]
    fn unconfigured_gateway_refuses_to_verify() {
        let service = RazorpayService::new(None, None);
        assert!(matches!(
            service.verify_signature("a|b", "00"),
            Err(GatewayError::NotConfigured(_))
        ));
    }
}
