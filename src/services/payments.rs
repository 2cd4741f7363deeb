use log::{info, warn};
use mongodb::bson::oid::ObjectId;
use std::sync::Arc;

use super::activation::{ensure_purchasable, Activation, SubscriptionActivator};
use super::catalog::PlanCatalog;
use super::error::{ServiceError, ServiceResult};
use super::gateway::{to_minor_units, OrderMetadata, PaymentGateway, RemotePaymentStatus};
use super::ledger::{NewOrder, OrderLedger};
use super::phonepe::PhonePeService;
use super::razorpay::RazorpayService;
use crate::models::{Gateway, Order, SubscriptionRecord};
use crate::store::AccountStore;

/// A checkout the client can complete with the gateway.
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub order: Order,
    pub redirect_url: Option<String>,
}

/// How a redirect-gateway callback was settled.
#[derive(Debug, Clone)]
pub enum CallbackOutcome {
    Activated(Activation),
    Pending(Order),
    Failed(Order),
}

/// Checkout and confirmation for both gateways, on top of the ledger and activator.
#[derive(Clone)]
pub struct Payments {
    catalog: PlanCatalog,
    ledger: OrderLedger,
    activator: SubscriptionActivator,
    accounts: Arc<dyn AccountStore>,
    razorpay: Arc<dyn PaymentGateway>,
    phonepe: Arc<dyn PaymentGateway>,
}

impl Payments {
    pub fn new(
        catalog: PlanCatalog,
        ledger: OrderLedger,
        activator: SubscriptionActivator,
        accounts: Arc<dyn AccountStore>,
        razorpay: Arc<dyn PaymentGateway>,
        phonepe: Arc<dyn PaymentGateway>,
    ) -> Self {
        Payments { catalog, ledger, activator, accounts, razorpay, phonepe }
    }

    pub async fn start_razorpay(&self, subject_id: &ObjectId, plan_id: &str) -> ServiceResult<CheckoutSession> {
        let plan = self.catalog.find_active_plan(plan_id).await?;
        let account = self
            .accounts
            .find(subject_id)
            .await?
            .ok_or_else(|| ServiceError::SubjectNotFound(subject_id.to_hex()))?;
        ensure_purchasable(&plan, account.role)?;

        let receipt = format!("rcpt_{}", uuid::Uuid::new_v4().simple());
        let subject = subject_id.to_hex();
        let remote = self
            .razorpay
            .create_remote_order(
                plan.price,
                &plan.currency,
                &OrderMetadata { transaction_id: &receipt, subject_id: &subject, plan_id: &plan.id },
            )
            .await?;

        let order = self
            .ledger
            .create_order(NewOrder {
                subject_id: *subject_id,
                plan_id: &plan.id,
                amount: plan.price,
                currency: &plan.currency,
                gateway: Gateway::Razorpay,
                transaction_id: Some(remote.gateway_order_id),
            })
            .await?;
        Ok(CheckoutSession { order, redirect_url: None })
    }

    /// Signature first: a bad signature never touches the order.
    pub async fn confirm_razorpay(
        &self,
        subject_id: &ObjectId,
        order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> ServiceResult<Activation> {
        let payload = RazorpayService::signature_payload(order_id, payment_id);
        if let Err(e) = self.razorpay.verify_signature(&payload, signature) {
            warn!("Razorpay signature rejected for order {}", order_id);
            return Err(e.into());
        }

        let order = self.ledger.find_order(order_id).await?;
        if order.gateway != self.razorpay.gateway() {
            return Err(ServiceError::validation("Order was not placed with Razorpay"));
        }
        self.activator
            .activate(subject_id, order_id, &order.plan_id, payment_id)
            .await
    }

    pub async fn start_phonepe(
        &self,
        subject_id: &ObjectId,
        plan_id: &str,
        transaction_id: Option<String>,
    ) -> ServiceResult<CheckoutSession> {
        let plan = self.catalog.find_active_plan(plan_id).await?;
        let account = self
            .accounts
            .find(subject_id)
            .await?
            .ok_or_else(|| ServiceError::SubjectNotFound(subject_id.to_hex()))?;
        ensure_purchasable(&plan, account.role)?;

        let order = self
            .ledger
            .create_order(NewOrder {
                subject_id: *subject_id,
                plan_id: &plan.id,
                amount: plan.price,
                currency: &plan.currency,
                gateway: Gateway::PhonePe,
                transaction_id,
            })
            .await?;

        let subject = subject_id.to_hex();
        let remote = self
            .phonepe
            .create_remote_order(
                order.amount,
                &order.currency,
                &OrderMetadata { transaction_id: &order.id, subject_id: &subject, plan_id: &plan.id },
            )
            .await;

        match remote {
            Ok(remote) => Ok(CheckoutSession { order, redirect_url: remote.redirect_url }),
            Err(e) => {
                let reason = e.to_string();
                self.ledger.mark_failed(&order.id, &reason, false).await?;
                Err(e.into())
            }
        }
    }

    /// Settles a signed PhonePe callback. Success is double-checked with a
    /// server-to-server status call before anything is activated.
    pub async fn handle_phonepe_callback(&self, payload: &str, signature: &str) -> ServiceResult<CallbackOutcome> {
        self.phonepe.verify_signature(payload, signature)?;
        let response = PhonePeService::decode(payload)?;
        let order_id = response
            .merchant_transaction_id()
            .ok_or_else(|| ServiceError::validation("Callback has no merchant transaction id"))?;
        let order = self.ledger.find_order(order_id).await?;

        if response.is_pending() {
            info!("PhonePe order {} still pending", order_id);
            return Ok(CallbackOutcome::Pending(order));
        }
        if !response.is_success() {
            let failed = self
                .ledger
                .mark_failed(order_id, &response.code, response.is_cancellation())
                .await?;
            return Ok(CallbackOutcome::Failed(failed));
        }

        let payment = self.phonepe.fetch_payment(order_id).await?;
        if payment.status != RemotePaymentStatus::Captured {
            return Err(ServiceError::Gateway(format!(
                "PhonePe reports order {} as not captured",
                order_id
            )));
        }
        if payment.amount_minor != to_minor_units(order.amount) {
            return Err(ServiceError::Gateway(format!(
                "PhonePe amount {} does not match order amount {}",
                payment.amount_minor,
                to_minor_units(order.amount)
            )));
        }

        let payment_id = response.transaction_id().unwrap_or(order_id);
        let activation = self
            .activator
            .activate(&order.subject_id, order_id, &order.plan_id, payment_id)
            .await?;
        Ok(CallbackOutcome::Activated(activation))
    }

    pub async fn order_for(&self, subject_id: &ObjectId, order_id: &str) -> ServiceResult<Order> {
        let order = self.ledger.find_order(order_id).await?;
        if order.subject_id != *subject_id {
            return Err(ServiceError::OrderNotFound(order_id.to_string()));
        }
        Ok(order)
    }

    pub async fn cancel(&self, subject_id: &ObjectId, order_id: &str, reason: &str) -> ServiceResult<Order> {
        self.order_for(subject_id, order_id).await?;
        self.ledger.mark_failed(order_id, reason, true).await
    }

    pub async fn subscription_of(&self, subject_id: &ObjectId) -> ServiceResult<Option<SubscriptionRecord>> {
        let account = self
            .accounts
            .find(subject_id)
            .await?
            .ok_or_else(|| ServiceError::SubjectNotFound(subject_id.to_hex()))?;
        Ok(account.subscription)
    }
}
