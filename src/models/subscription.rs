use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;

use crate::utils::time;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Expired,
}

/// Subscription snapshot embedded on the subscriber's account.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SubscriptionRecord {
    pub plan_id: String,
    pub start_date: DateTime,
    pub end_date: DateTime,
    pub status: SubscriptionStatus,
    pub card_number: String,
    pub expiry_month: i32,
    pub expiry_year: i32,
    pub payment_id: String,
    pub order_id: String,
    pub amount: f64,
    pub immediate_interview_call: bool,
}

impl SubscriptionRecord {
    /// Active and not yet past its end date.
    pub fn is_running(&self, now: DateTime) -> bool {
        self.status == SubscriptionStatus::Active && self.end_date > now
    }
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct SubscriptionResponse {
    pub plan_id: String,
    pub status: String,
    pub start_date: String,
    pub end_date: String,
    pub card_number: String,
    pub expiry: String,
    pub payment_id: String,
    pub order_id: String,
    pub amount: f64,
    pub immediate_interview_call: bool,
}

impl From<SubscriptionRecord> for SubscriptionResponse {
    fn from(record: SubscriptionRecord) -> Self {
        SubscriptionResponse {
            plan_id: record.plan_id,
            status: match record.status {
                SubscriptionStatus::Active => "active".to_string(),
                SubscriptionStatus::Expired => "expired".to_string(),
            },
            start_date: time::to_rfc3339(record.start_date),
            end_date: time::to_rfc3339(record.end_date),
            card_number: record.card_number,
            expiry: format!("{:02}/{}", record.expiry_month, record.expiry_year),
            payment_id: record.payment_id,
            order_id: record.order_id,
            amount: record.amount,
            immediate_interview_call: record.immediate_interview_call,
        }
    }
}
