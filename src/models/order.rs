use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Gateway {
    Razorpay,
    PhonePe,
}

impl Gateway {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gateway::Razorpay => "razorpay",
            Gateway::PhonePe => "phonepe",
        }
    }

    /// Client-checkout gateways start at `created`, redirect gateways at `pending`.
    pub fn initial_status(&self) -> OrderStatus {
        match self {
            Gateway::Razorpay => OrderStatus::Created,
            Gateway::PhonePe => OrderStatus::Pending,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Created,
    Pending,
    Paid,
    Failed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "created",
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Failed => "failed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Paid | OrderStatus::Failed | OrderStatus::Cancelled)
    }

    /// Statuses an order may leave.
    pub fn open() -> [OrderStatus; 2] {
        [OrderStatus::Created, OrderStatus::Pending]
    }
}

/// One payment attempt. `_id` is the gateway transaction id.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Order {
    #[serde(rename = "_id")]
    pub id: String,
    pub gateway: Gateway,
    pub subject_id: ObjectId,
    pub plan_id: String,
    pub amount: f64,
    pub currency: String,
    pub status: OrderStatus,
    pub gateway_payment_id: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct OrderResponse {
    pub order_id: String,
    pub gateway: String,
    pub plan_id: String,
    pub amount: f64,
    pub currency: String,
    pub status: String,
    pub gateway_payment_id: Option<String>,
    pub failure_reason: Option<String>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        OrderResponse {
            order_id: order.id,
            gateway: order.gateway.as_str().to_string(),
            plan_id: order.plan_id,
            amount: order.amount,
            currency: order.currency,
            status: order.status.as_str().to_string(),
            gateway_payment_id: order.gateway_payment_id,
            failure_reason: order.failure_reason,
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct VerifyRazorpayPaymentDto {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct PhonePeCheckoutDto {
    /// Optional client-generated merchant transaction id.
    pub transaction_id: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PhonePeCallbackDto {
    /// Base64 encoded JSON body, signed by the `X-VERIFY` header.
    pub response: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CancelOrderDto {
    pub reason: Option<String>,
}
