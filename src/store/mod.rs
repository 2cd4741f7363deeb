//! Persistence ports for the subscription and quota state machine.
//!
//! Every mutation that has a race is expressed here as a conditional write,
//! so implementations decide atomicity at the storage layer:
//!
//! - order transitions filter on the current status,
//! - subscription writes compare-and-set `subscription_version`,
//! - card numbers are unique under a storage constraint,
//! - posting units are claimed with a `> 0` write predicate, and accounts
//!   without a running subscription also need `active_jobs` below one.

pub mod mongo;
#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use mongodb::bson::{oid::ObjectId, DateTime};

use crate::models::{Account, Job, Order, OrderStatus, Otp, Plan, PlanAudience, SubscriptionRecord};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<mongodb::bson::ser::Error> for StoreError {
    fn from(e: mongodb::bson::ser::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Result of a conditional order write.
#[derive(Debug, Clone)]
pub enum Transition {
    /// This call moved the order.
    Applied(Order),
    /// The order was not in a state the transition accepts; carries the current record.
    Rejected(Order),
    Missing,
}

/// Result of a subscription compare-and-set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionWrite {
    Applied,
    /// `subscription_version` moved since the account was read.
    Stale,
    /// The card number is already held by another account.
    DuplicateCard,
}

#[async_trait]
pub trait PlanStore: Send + Sync {
    async fn find(&self, plan_id: &str) -> StoreResult<Option<Plan>>;

    /// Active plans, optionally filtered by audience, cheapest first.
    async fn list_active(&self, audience: Option<PlanAudience>) -> StoreResult<Vec<Plan>>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Returns `false` when an order with the same id already exists.
    async fn insert(&self, order: &Order) -> StoreResult<bool>;

    async fn find(&self, order_id: &str) -> StoreResult<Option<Order>>;

    /// Moves an order out of `created|pending`. Never touches a terminal order.
    async fn transition(
        &self,
        order_id: &str,
        to: OrderStatus,
        gateway_payment_id: Option<&str>,
        failure_reason: Option<&str>,
    ) -> StoreResult<Transition>;
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn insert(&self, account: &Account) -> StoreResult<ObjectId>;

    async fn find(&self, id: &ObjectId) -> StoreResult<Option<Account>>;

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Account>>;

    async fn touch_login(&self, id: &ObjectId) -> StoreResult<()>;

    /// Replaces the subscription snapshot if `subscription_version` still equals
    /// `expected_version`, bumping the version, recording `record.order_id` in
    /// `activated_orders` and adding `postings_granted` posting units in the
    /// same write.
    async fn write_subscription(
        &self,
        id: &ObjectId,
        expected_version: i64,
        record: &SubscriptionRecord,
        postings_granted: i32,
    ) -> StoreResult<SubscriptionWrite>;

    /// Takes one posting unit for a live job and bumps `active_jobs`, in one
    /// write. Needs a unit left; without a subscription running at `now` it
    /// also needs `active_jobs` to be zero.
    async fn claim_posting(&self, id: &ObjectId, now: DateTime) -> StoreResult<bool>;

    /// Undoes a claim: gives the unit back and drops `active_jobs` (never below zero).
    async fn release_posting(&self, id: &ObjectId) -> StoreResult<()>;

    /// Marks every active subscription ending at or before `now` as expired.
    async fn expire_lapsed(&self, now: DateTime) -> StoreResult<u64>;
}

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert(&self, job: &Job) -> StoreResult<ObjectId>;

    async fn find(&self, id: &ObjectId) -> StoreResult<Option<Job>>;

    async fn list_for_employer(&self, employer_id: &ObjectId) -> StoreResult<Vec<Job>>;

    /// Flips `is_active` only if it currently equals `!active`.
    async fn set_active(&self, id: &ObjectId, active: bool) -> StoreResult<bool>;
}

/// Keyed login codes that expire on their own, shared by every instance.
#[async_trait]
pub trait OtpStore: Send + Sync {
    async fn put(&self, otp: &Otp) -> StoreResult<()>;

    async fn find(&self, key: &str) -> StoreResult<Option<Otp>>;

    async fn record_attempt(&self, key: &str) -> StoreResult<()>;

    async fn remove(&self, key: &str) -> StoreResult<()>;
}
