use async_trait::async_trait;
use data_encoding::BASE64;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};

use super::gateway::{
    constant_time_eq, to_minor_units, GatewayError, OrderMetadata, PaymentGateway, RemoteOrder,
    RemotePayment, RemotePaymentStatus,
};
use crate::config::Config;
use crate::models::Gateway;

const PAY_ENDPOINT: &str = "/pg/v1/pay";

/// Redirect checkout: the payer is sent to a hosted page and the result comes
/// back as a base64 JSON callback signed with the salted `X-VERIFY` checksum.
pub struct PhonePeService {
    merchant_id: Option<String>,
    salt_key: Option<String>,
    salt_index: String,
    base_url: String,
    redirect_url: String,
    callback_url: String,
    client: Client,
}

/// Decoded callback or status body.
#[derive(Debug, Deserialize)]
pub struct PhonePeResponse {
    pub success: bool,
    pub code: String,
    pub data: Option<PhonePeData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhonePeData {
    pub merchant_transaction_id: Option<String>,
    pub transaction_id: Option<String>,
    pub amount: Option<i64>,
    pub state: Option<String>,
    pub instrument_response: Option<InstrumentResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentResponse {
    pub redirect_info: Option<RedirectInfo>,
}

#[derive(Debug, Deserialize)]
pub struct RedirectInfo {
    pub url: String,
}

impl PhonePeResponse {
    pub fn is_success(&self) -> bool {
        self.code == "PAYMENT_SUCCESS"
    }

    pub fn is_pending(&self) -> bool {
        self.code == "PAYMENT_PENDING"
    }

    pub fn is_cancellation(&self) -> bool {
        self.code.contains("CANCEL")
    }

    pub fn merchant_transaction_id(&self) -> Option<&str> {
        self.data.as_ref()?.merchant_transaction_id.as_deref()
    }

    pub fn transaction_id(&self) -> Option<&str> {
        self.data.as_ref()?.transaction_id.as_deref()
    }
}

impl PhonePeService {
    pub fn new(
        merchant_id: Option<String>,
        salt_key: Option<String>,
        salt_index: String,
        base_url: String,
        redirect_url: String,
        callback_url: String,
    ) -> Self {
        PhonePeService {
            merchant_id,
            salt_key,
            salt_index,
            base_url,
            redirect_url,
            callback_url,
            client: Client::new(),
        }
    }

    pub fn from_config() -> Self {
        Self::new(
            Config::phonepe_merchant_id(),
            Config::phonepe_salt_key(),
            Config::phonepe_salt_index(),
            Config::phonepe_base_url(),
            Config::phonepe_redirect_url(),
            Config::phonepe_callback_url(),
        )
    }

    fn credentials(&self) -> Result<(&str, &str), GatewayError> {
        match (&self.merchant_id, &self.salt_key) {
            (Some(merchant_id), Some(salt_key)) => Ok((merchant_id.as_str(), salt_key.as_str())),
            _ => Err(GatewayError::NotConfigured("PhonePe")),
        }
    }

    /// `sha256(payload + salt_key) + "###" + salt_index`
    pub fn checksum(payload: &str, salt_key: &str, salt_index: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(payload.as_bytes());
        hasher.update(salt_key.as_bytes());
        format!("{}###{}", hex::encode(hasher.finalize()), salt_index)
    }

    pub fn decode(payload: &str) -> Result<PhonePeResponse, GatewayError> {
        let bytes = BASE64
            .decode(payload.as_bytes())
            .map_err(|e| GatewayError::Malformed(format!("base64: {}", e)))?;
        serde_json::from_slice(&bytes).map_err(|e| GatewayError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl PaymentGateway for PhonePeService {
    fn gateway(&self) -> Gateway {
        Gateway::PhonePe
    }

    async fn create_remote_order(
        &self,
        amount: f64,
        _currency: &str,
        metadata: &OrderMetadata<'_>,
    ) -> Result<RemoteOrder, GatewayError> {
        let (merchant_id, salt_key) = self.credentials()?;

        let request = json!({
            "merchantId": merchant_id,
            "merchantTransactionId": metadata.transaction_id,
            "merchantUserId": metadata.subject_id,
            "amount": to_minor_units(amount),
            "redirectUrl": format!("{}?transaction_id={}", self.redirect_url, metadata.transaction_id),
            "redirectMode": "POST",
            "callbackUrl": self.callback_url,
            "paymentInstrument": { "type": "PAY_PAGE" }
        });
        let encoded = BASE64.encode(request.to_string().as_bytes());
        let checksum = Self::checksum(&format!("{}{}", encoded, PAY_ENDPOINT), salt_key, &self.salt_index);

        let res = self
            .client
            .post(format!("{}{}", self.base_url, PAY_ENDPOINT))
            .header("X-VERIFY", checksum)
            .json(&json!({ "request": encoded }))
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(GatewayError::Rejected(
                res.text().await.unwrap_or_else(|_| "PhonePe error".to_string()),
            ));
        }

        let body: PhonePeResponse = res
            .json()
            .await
            .map_err(|e| GatewayError::Malformed(e.to_string()))?;
        if !body.success {
            return Err(GatewayError::Rejected(body.code));
        }
        let redirect_url = body
            .data
            .and_then(|d| d.instrument_response)
            .and_then(|i| i.redirect_info)
            .map(|r| r.url)
            .ok_or_else(|| GatewayError::Malformed("missing redirect url".to_string()))?;

        Ok(RemoteOrder {
            gateway_order_id: metadata.transaction_id.to_string(),
            redirect_url: Some(redirect_url),
        })
    }

    /// Server-to-server status check, keyed by merchant transaction id.
    async fn fetch_payment(&self, payment_id: &str) -> Result<RemotePayment, GatewayError> {
        let (merchant_id, salt_key) = self.credentials()?;
        let path = format!("/pg/v1/status/{}/{}", merchant_id, payment_id);
        let checksum = Self::checksum(&path, salt_key, &self.salt_index);

        let res = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .header("X-VERIFY", checksum)
            .header("X-MERCHANT-ID", merchant_id)
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(GatewayError::Rejected(
                res.text().await.unwrap_or_else(|_| "PhonePe error".to_string()),
            ));
        }

        let body: PhonePeResponse = res
            .json()
            .await
            .map_err(|e| GatewayError::Malformed(e.to_string()))?;
        let status = if body.is_success() {
            RemotePaymentStatus::Captured
        } else if body.is_pending() {
            RemotePaymentStatus::Pending
        } else {
            RemotePaymentStatus::Failed
        };
        let amount_minor = body.data.and_then(|d| d.amount).unwrap_or(0);
        Ok(RemotePayment { status, amount_minor })
    }

    fn verify_signature(&self, payload: &str, signature: &str) -> Result<(), GatewayError> {
        let (_, salt_key) = self.credentials()?;
        let expected = Self::checksum(payload, salt_key, &self.salt_index);
        if constant_time_eq(&expected, signature) {
            Ok(())
        } else {
            Err(GatewayError::SignatureMismatch)
        }
    }
}
