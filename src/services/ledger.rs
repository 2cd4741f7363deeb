use log::{info, warn};
use mongodb::bson::{oid::ObjectId, DateTime};
use std::sync::Arc;

use super::error::{ServiceError, ServiceResult};
use crate::models::{Gateway, Order, OrderStatus};
use crate::store::{OrderStore, Transition};

/// Records payment attempts and drives their one-way status changes.
#[derive(Clone)]
pub struct OrderLedger {
    orders: Arc<dyn OrderStore>,
}

pub struct NewOrder<'a> {
    pub subject_id: ObjectId,
    pub plan_id: &'a str,
    pub amount: f64,
    pub currency: &'a str,
    pub gateway: Gateway,
    /// Id chosen by the gateway or the client. Generated when absent.
    pub transaction_id: Option<String>,
}

impl OrderLedger {
    pub fn new(orders: Arc<dyn OrderStore>) -> Self {
        OrderLedger { orders }
    }

    pub async fn create_order(&self, new: NewOrder<'_>) -> ServiceResult<Order> {
        if new.amount <= 0.0 {
            return Err(ServiceError::validation("Order amount must be positive"));
        }
        let id = match new.transaction_id {
            Some(id) if id.trim().is_empty() => {
                return Err(ServiceError::validation("Transaction id cannot be empty"));
            }
            Some(id) => id,
            None => format!("TXN{}", uuid::Uuid::new_v4().simple()),
        };

        let now = DateTime::now();
        let order = Order {
            id,
            gateway: new.gateway,
            subject_id: new.subject_id,
            plan_id: new.plan_id.to_string(),
            amount: new.amount,
            currency: new.currency.to_string(),
            status: new.gateway.initial_status(),
            gateway_payment_id: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        };

        if !self.orders.insert(&order).await? {
            return Err(ServiceError::DuplicateOrder(order.id));
        }
        info!(
            "Order {} created via {} for plan {}",
            order.id,
            order.gateway.as_str(),
            order.plan_id
        );
        Ok(order)
    }

    pub async fn find_order(&self, order_id: &str) -> ServiceResult<Order> {
        self.orders
            .find(order_id)
            .await?
            .ok_or_else(|| ServiceError::OrderNotFound(order_id.to_string()))
    }

    /// Repeating this on a paid order returns it unchanged.
    pub async fn mark_paid(&self, order_id: &str, gateway_payment_id: &str) -> ServiceResult<Order> {
        match self
            .orders
            .transition(order_id, OrderStatus::Paid, Some(gateway_payment_id), None)
            .await?
        {
            Transition::Applied(order) => {
                info!("Order {} paid ({})", order_id, gateway_payment_id);
                Ok(order)
            }
            Transition::Rejected(order) if order.status == OrderStatus::Paid => Ok(order),
            Transition::Rejected(order) => Err(ServiceError::InvalidOrderState {
                order_id: order.id,
                status: order.status,
            }),
            Transition::Missing => Err(ServiceError::OrderNotFound(order_id.to_string())),
        }
    }

    /// Ends an order as `failed`, or `cancelled` when the payer backed out.
    pub async fn mark_failed(&self, order_id: &str, reason: &str, cancelled: bool) -> ServiceResult<Order> {
        let to = if cancelled { OrderStatus::Cancelled } else { OrderStatus::Failed };
        match self.orders.transition(order_id, to, None, Some(reason)).await? {
            Transition::Applied(order) => {
                warn!("Order {} {}: {}", order_id, to.as_str(), reason);
                Ok(order)
            }
            Transition::Rejected(order) if order.status == to => Ok(order),
            Transition::Rejected(order) => Err(ServiceError::InvalidOrderState {
                order_id: order.id,
                status: order.status,
            }),
            Transition::Missing => Err(ServiceError::OrderNotFound(order_id.to_string())),
        }
    }
}
