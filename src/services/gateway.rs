use async_trait::async_trait;
use subtle::ConstantTimeEq;

use super::error::ServiceError;
use crate::models::Gateway;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("request failed: {0}")]
    Request(String),

    #[error("gateway rejected the request: {0}")]
    Rejected(String),

    #[error("unexpected gateway response: {0}")]
    Malformed(String),

    #[error("signature mismatch")]
    SignatureMismatch,
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        GatewayError::Request(e.to_string())
    }
}

impl From<GatewayError> for ServiceError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::SignatureMismatch => ServiceError::SignatureMismatch,
            other => ServiceError::Gateway(other.to_string()),
        }
    }
}

/// What the gateway needs to know about the order it is collecting for.
#[derive(Debug, Clone)]
pub struct OrderMetadata<'a> {
    pub transaction_id: &'a str,
    pub subject_id: &'a str,
    pub plan_id: &'a str,
}

#[derive(Debug, Clone)]
pub struct RemoteOrder {
    pub gateway_order_id: String,
    /// Hosted payment page for redirect gateways.
    pub redirect_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemotePaymentStatus {
    Captured,
    Pending,
    Failed,
}

#[derive(Debug, Clone)]
pub struct RemotePayment {
    pub status: RemotePaymentStatus,
    /// Smallest currency unit (paise).
    pub amount_minor: i64,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn gateway(&self) -> Gateway;

    async fn create_remote_order(
        &self,
        amount: f64,
        currency: &str,
        metadata: &OrderMetadata<'_>,
    ) -> Result<RemoteOrder, GatewayError>;

    async fn fetch_payment(&self, payment_id: &str) -> Result<RemotePayment, GatewayError>;

    /// Checks a callback signature over the gateway's canonical payload string.
    fn verify_signature(&self, payload: &str, signature: &str) -> Result<(), GatewayError>;
}

pub fn to_minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    a.len() == b.len() && bool::from(a.ct_eq(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minor_units_round_half_paise() {
        assert_eq!(to_minor_units(999.0), 99900);
        assert_eq!(to_minor_units(1179.82), 117982);
        assert_eq!(to_minor_units(0.005), 1);
    }

    #[test]
    fn compares_in_constant_time() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "abcd"));
    }

    #[test]
    fn signature_errors_map_to_their_own_variant() {
        assert!(matches!(
            ServiceError::from(GatewayError::SignatureMismatch),
            ServiceError::SignatureMismatch
        ));
        assert!(matches!(
            ServiceError::from(GatewayError::Rejected("bad amount".to_string())),
            ServiceError::Gateway(_)
        ));
    }
}
