//! Converts a verified payment into a subscription window.
//!
//! The order is moved to `paid` first, with a write that fails once the order
//! is cancelled or failed, so a cancelled order never gains a subscription.
//! The account write is then a compare-and-set on `subscription_version` that
//! also records the order in `activated_orders`, so replays of one order never
//! extend twice. A paid order whose snapshot never landed gets it applied by
//! the next call for that order.

use chrono::Datelike;
use log::{info, warn};
use mongodb::bson::{oid::ObjectId, DateTime};
use rand::Rng;
use std::sync::Arc;

use super::catalog::PlanCatalog;
use super::email::{self, Notifier};
use super::error::{ServiceError, ServiceResult};
use super::ledger::OrderLedger;
use crate::models::{
    Account, OrderStatus, Plan, PlanAudience, Role, SubscriptionRecord, SubscriptionStatus,
};
use crate::store::{AccountStore, SubscriptionWrite};
use crate::utils::time;

/// Collisions tolerated on one card prefix before moving to the next.
const COLLISIONS_PER_PREFIX: u32 = 10;

/// Re-reads allowed when another activation wins the compare-and-set.
const MAX_STALE_RETRIES: u32 = 16;

/// Source of the 10 random digits after the prefix.
pub type DigitSource = fn() -> u64;

pub fn random_digits() -> u64 {
    rand::thread_rng().gen_range(0..10_000_000_000)
}

/// First prefix of the rolling 2-digit series: the year's last two digits.
pub fn starting_prefix(now: DateTime) -> u8 {
    let year = time::to_chrono(now).year().rem_euclid(100) as u8;
    if year < 10 { year + 10 } else { year }
}

/// Next prefix in the series, wrapping 99 back to 10.
pub fn next_prefix(prefix: u8) -> u8 {
    if prefix >= 99 { 10 } else { prefix + 1 }
}

pub fn card_number(prefix: u8, digits: u64) -> String {
    format!("{:02}{:010}", prefix, digits % 10_000_000_000)
}

#[derive(Debug, Clone, PartialEq)]
pub enum Activation {
    Activated(SubscriptionRecord),
    /// The order had already been applied. Carries the account's latest
    /// subscription, which may come from a later order.
    AlreadyActivated(SubscriptionRecord),
}

impl Activation {
    pub fn record(&self) -> &SubscriptionRecord {
        match self {
            Activation::Activated(record) | Activation::AlreadyActivated(record) => record,
        }
    }

    pub fn into_record(self) -> SubscriptionRecord {
        match self {
            Activation::Activated(record) | Activation::AlreadyActivated(record) => record,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Activation::Activated(_))
    }
}

/// Older accounts have no `activated_orders`; their snapshot still names its order.
fn has_applied(account: &Account, order_id: &str) -> bool {
    account.activated_orders.iter().any(|id| id == order_id)
        || account
            .subscription
            .as_ref()
            .map(|s| s.order_id == order_id)
            .unwrap_or(false)
}

/// Rejects free tiers and plans sold to a different kind of account.
pub fn ensure_purchasable(plan: &Plan, role: Role) -> ServiceResult<()> {
    if plan.is_free {
        return Err(ServiceError::InvalidPlanForPayment(plan.id.clone()));
    }
    if plan.validity_months <= 0 {
        return Err(ServiceError::validation(format!(
            "Plan {} has no validity period",
            plan.id
        )));
    }
    let allowed = match plan.audience {
        PlanAudience::Employee => role == Role::Employee,
        PlanAudience::Employer => role == Role::Employer,
    };
    if !allowed {
        return Err(ServiceError::validation(format!(
            "Plan {} is not available for {} accounts",
            plan.id,
            role.as_str()
        )));
    }
    Ok(())
}

#[derive(Clone)]
pub struct SubscriptionActivator {
    catalog: PlanCatalog,
    ledger: OrderLedger,
    accounts: Arc<dyn AccountStore>,
    notifier: Arc<dyn Notifier>,
    max_card_attempts: u32,
    digits: DigitSource,
}

impl SubscriptionActivator {
    pub fn new(
        catalog: PlanCatalog,
        ledger: OrderLedger,
        accounts: Arc<dyn AccountStore>,
        notifier: Arc<dyn Notifier>,
        max_card_attempts: u32,
    ) -> Self {
        SubscriptionActivator {
            catalog,
            ledger,
            accounts,
            notifier,
            max_card_attempts: max_card_attempts.max(1),
            digits: random_digits,
        }
    }

    pub fn with_digit_source(mut self, digits: DigitSource) -> Self {
        self.digits = digits;
        self
    }

    pub async fn activate(
        &self,
        subject_id: &ObjectId,
        order_id: &str,
        plan_id: &str,
        gateway_payment_id: &str,
    ) -> ServiceResult<Activation> {
        let order = self.ledger.find_order(order_id).await?;
        if order.subject_id != *subject_id || order.plan_id != plan_id {
            return Err(ServiceError::validation(
                "Order does not belong to this subscriber and plan",
            ));
        }
        if matches!(order.status, OrderStatus::Failed | OrderStatus::Cancelled) {
            return Err(ServiceError::InvalidOrderState {
                order_id: order.id,
                status: order.status,
            });
        }

        let plan = self.catalog.find_active_plan(plan_id).await?;
        if plan.is_free {
            return Err(ServiceError::InvalidPlanForPayment(plan.id));
        }
        ensure_purchasable(&plan, self.load_account(subject_id).await?.role)?;

        // Fails if the order was cancelled or failed since it was read.
        let order = self.ledger.mark_paid(order_id, gateway_payment_id).await?;
        let payment_id = order
            .gateway_payment_id
            .clone()
            .unwrap_or_else(|| gateway_payment_id.to_string());

        let mut prefix = starting_prefix(DateTime::now());
        let mut collisions = 0;
        let mut stale = 0;

        loop {
            let account = self.load_account(subject_id).await?;
            if has_applied(&account, order_id) {
                return match account.subscription {
                    Some(current) => Ok(Activation::AlreadyActivated(current)),
                    None => Err(ServiceError::InvalidOrderState {
                        order_id: order.id,
                        status: order.status,
                    }),
                };
            }

            let now = DateTime::now();
            let start_date = match account.subscription.as_ref() {
                Some(current) if current.is_running(now) => current.end_date,
                _ => now,
            };
            let end_date = time::add_months(start_date, plan.validity_months as u32)
                .ok_or_else(|| ServiceError::validation("Subscription end date is out of range"))?;
            let (expiry_month, expiry_year) = time::month_year(end_date);

            let record = SubscriptionRecord {
                plan_id: plan.id.clone(),
                start_date,
                end_date,
                status: SubscriptionStatus::Active,
                card_number: card_number(prefix, (self.digits)()),
                expiry_month,
                expiry_year,
                payment_id: payment_id.clone(),
                order_id: order_id.to_string(),
                amount: order.amount,
                immediate_interview_call: plan.features.immediate_interview_call,
            };
            let postings = match plan.audience {
                PlanAudience::Employer => plan.features.active_job_postings.max(0),
                PlanAudience::Employee => 0,
            };

            match self
                .accounts
                .write_subscription(subject_id, account.subscription_version, &record, postings)
                .await?
            {
                SubscriptionWrite::Applied => {
                    info!(
                        "Subscription {} active for {} until {} (card {})",
                        plan.id,
                        subject_id.to_hex(),
                        time::to_rfc3339(record.end_date),
                        record.card_number
                    );
                    self.notify(&account, &plan, &record);
                    return Ok(Activation::Activated(record));
                }
                SubscriptionWrite::DuplicateCard => {
                    collisions += 1;
                    if collisions >= self.max_card_attempts {
                        return Err(ServiceError::CardNumberExhausted(self.max_card_attempts));
                    }
                    if collisions % COLLISIONS_PER_PREFIX == 0 {
                        prefix = next_prefix(prefix);
                        warn!("Card number prefix rotated to {:02}", prefix);
                    }
                }
                SubscriptionWrite::Stale => {
                    stale += 1;
                    if stale > MAX_STALE_RETRIES {
                        return Err(ServiceError::ConcurrentUpdate);
                    }
                }
            }
        }
    }

    async fn load_account(&self, subject_id: &ObjectId) -> ServiceResult<Account> {
        self.accounts
            .find(subject_id)
            .await?
            .ok_or_else(|| ServiceError::SubjectNotFound(subject_id.to_hex()))
    }

    /// Fire-and-forget confirmation email.
    fn notify(&self, account: &Account, plan: &Plan, record: &SubscriptionRecord) {
        let format = |dt: DateTime| time::to_chrono(dt).format("%d %b %Y").to_string();
        let (subject, body) = email::subscription_confirmation(
            account.name.as_deref().unwrap_or(""),
            &plan.name,
            &record.card_number,
            &format(record.start_date),
            &format(record.end_date),
        );
        let address = account.email.clone();
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            if let Err(e) = notifier.send(&address, &subject, &body).await {
                warn!("Subscription confirmation to {} not sent: {}", address, e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Gateway;
    use crate::services::catalog::fixtures::{employer_plan, plan};
    use crate::services::email::testing::RecordingNotifier;
    use crate::services::ledger::NewOrder;
    use crate::models::Order;
    use crate::store::memory::{MemoryAccountStore, MemoryOrderStore, MemoryPlanStore};
    use crate::store::{OrderStore, StoreResult, Transition};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::collections::HashSet;

    struct Harness {
        activator: SubscriptionActivator,
        ledger: OrderLedger,
        accounts: Arc<MemoryAccountStore>,
        notifier: Arc<RecordingNotifier>,
    }

    fn harness_with(notifier: RecordingNotifier, max_card_attempts: u32) -> Harness {
        harness_on(Arc::new(MemoryOrderStore::default()), notifier, max_card_attempts)
    }

    fn harness_on(orders: Arc<dyn OrderStore>, notifier: RecordingNotifier, max_card_attempts: u32) -> Harness {
        let plans = Arc::new(MemoryPlanStore::with(vec![
            plan("free", 0.0, 1),
            plan("gold", 999.0, 1),
            plan("platinum", 2499.0, 12),
            employer_plan("hire-pro", 4999.0, 3, 10),
        ]));
        let ledger = OrderLedger::new(orders);
        let accounts = Arc::new(MemoryAccountStore::default());
        let notifier = Arc::new(notifier);
        let activator = SubscriptionActivator::new(
            PlanCatalog::new(plans),
            ledger.clone(),
            accounts.clone(),
            notifier.clone(),
            max_card_attempts,
        );
        Harness { activator, ledger, accounts, notifier }
    }

    fn harness() -> Harness {
        harness_with(RecordingNotifier::default(), 150)
    }

    /// Order store where the payer cancels just before the paid write lands.
    #[derive(Default)]
    struct CancelBeforePaid {
        inner: MemoryOrderStore,
    }

    #[async_trait]
    impl OrderStore for CancelBeforePaid {
        async fn insert(&self, order: &Order) -> StoreResult<bool> {
            self.inner.insert(order).await
        }

        async fn find(&self, order_id: &str) -> StoreResult<Option<Order>> {
            self.inner.find(order_id).await
        }

        async fn transition(
            &self,
            order_id: &str,
            to: OrderStatus,
            gateway_payment_id: Option<&str>,
            failure_reason: Option<&str>,
        ) -> StoreResult<Transition> {
            if to == OrderStatus::Paid {
                self.inner
                    .transition(order_id, OrderStatus::Cancelled, None, Some("payer cancelled"))
                    .await?;
            }
            self.inner.transition(order_id, to, gateway_payment_id, failure_reason).await
        }
    }

    impl Harness {
        async fn subscriber(&self, role: Role) -> ObjectId {
            let email = format!("{}@example.com", ObjectId::new().to_hex());
            self.accounts.insert(&Account::new(&email, role, 1)).await.unwrap()
        }

        async fn order(&self, subject_id: ObjectId, plan_id: &str, amount: f64) -> String {
            self.ledger
                .create_order(NewOrder {
                    subject_id,
                    plan_id,
                    amount,
                    currency: "INR",
                    gateway: Gateway::Razorpay,
                    transaction_id: None,
                })
                .await
                .unwrap()
                .id
        }

        async fn account(&self, id: &ObjectId) -> Account {
            self.accounts.find(id).await.unwrap().unwrap()
        }
    }

    fn at(y: i32, m: u32, d: u32) -> DateTime {
        time::from_chrono(Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap())
    }

    fn running_subscription(end_date: DateTime) -> SubscriptionRecord {
        SubscriptionRecord {
            plan_id: "gold".to_string(),
            start_date: at(2020, 1, 1),
            end_date,
            status: SubscriptionStatus::Active,
            card_number: "990000000001".to_string(),
            expiry_month: 1,
            expiry_year: 2099,
            payment_id: "pay_old".to_string(),
            order_id: "order_old".to_string(),
            amount: 999.0,
            immediate_interview_call: true,
        }
    }

    #[tokio::test]
    async fn first_activation_starts_now() {
        let h = harness();
        let subject = h.subscriber(Role::Employee).await;
        let order_id = h.order(subject, "platinum", 2499.0).await;

        let before = DateTime::now();
        let activation = h.activator.activate(&subject, &order_id, "platinum", "pay_1").await.unwrap();
        let after = DateTime::now();

        let record = activation.record();
        assert!(activation.is_new());
        assert!(record.start_date >= before && record.start_date <= after);
        assert_eq!(Some(record.end_date), time::add_months(record.start_date, 12));
        assert_eq!(record.status, SubscriptionStatus::Active);
        assert_eq!(record.payment_id, "pay_1");
        assert_eq!(record.amount, 2499.0);
        assert!(record.immediate_interview_call);

        let order = h.ledger.find_order(&order_id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
        assert_eq!(order.gateway_payment_id.as_deref(), Some("pay_1"));
    }

    #[tokio::test]
    async fn running_subscription_is_extended_from_its_end() {
        let h = harness();
        let mut account = Account::new("ext@example.com", Role::Employee, 0);
        let current_end = at(2099, 1, 31);
        account.subscription = Some(running_subscription(current_end));
        let subject = h.accounts.insert(&account).await.unwrap();
        let order_id = h.order(subject, "gold", 999.0).await;

        let record = h.activator.activate(&subject, &order_id, "gold", "pay_2").await.unwrap().into_record();

        assert_eq!(record.start_date, current_end);
        assert_eq!(record.end_date, at(2099, 2, 28));
        assert_eq!((record.expiry_month, record.expiry_year), (2, 2099));
    }

    #[tokio::test]
    async fn expired_subscription_restarts_from_now() {
        let h = harness();
        let mut account = Account::new("lapsed@example.com", Role::Employee, 0);
        account.subscription = Some(running_subscription(at(2021, 6, 30)));
        let subject = h.accounts.insert(&account).await.unwrap();
        let order_id = h.order(subject, "gold", 999.0).await;

        let before = DateTime::now();
        let record = h.activator.activate(&subject, &order_id, "gold", "pay_3").await.unwrap().into_record();
        assert!(record.start_date >= before);
        assert_ne!(record.card_number, "990000000001");
    }

    #[tokio::test]
    async fn second_call_for_same_order_does_not_extend() {
        let h = harness();
        let subject = h.subscriber(Role::Employee).await;
        let order_id = h.order(subject, "gold", 999.0).await;

        let first = h.activator.activate(&subject, &order_id, "gold", "pay_4").await.unwrap();
        let second = h.activator.activate(&subject, &order_id, "gold", "pay_4").await.unwrap();

        assert!(first.is_new());
        assert!(!second.is_new());
        assert_eq!(first.record(), second.record());
        assert_eq!(h.account(&subject).await.subscription_version, 1);
    }

    #[tokio::test]
    async fn replay_after_lost_order_write_repairs_the_order() {
        let h = harness();
        let subject = h.subscriber(Role::Employee).await;
        let order_id = h.order(subject, "gold", 999.0).await;
        let account = h.account(&subject).await;

        // Snapshot landed but the order write never happened.
        let mut landed = running_subscription(at(2099, 5, 1));
        landed.order_id = order_id.clone();
        h.accounts
            .write_subscription(&subject, account.subscription_version, &landed, 0)
            .await
            .unwrap();

        let activation = h.activator.activate(&subject, &order_id, "gold", "pay_5").await.unwrap();
        assert_eq!(activation, Activation::AlreadyActivated(landed));
        assert_eq!(h.ledger.find_order(&order_id).await.unwrap().status, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn paid_order_without_snapshot_is_applied() {
        let h = harness();
        let subject = h.subscriber(Role::Employee).await;
        let order_id = h.order(subject, "gold", 999.0).await;

        // Order write landed but the snapshot never did.
        h.ledger.mark_paid(&order_id, "pay_8").await.unwrap();

        let activation = h.activator.activate(&subject, &order_id, "gold", "pay_8").await.unwrap();
        assert!(activation.is_new());
        assert_eq!(activation.record().order_id, order_id);
        let account = h.account(&subject).await;
        assert_eq!(account.subscription_version, 1);
        assert_eq!(account.activated_orders, vec![order_id]);
    }

    #[tokio::test]
    async fn cancel_racing_the_paid_write_leaves_no_subscription() {
        let h = harness_on(Arc::new(CancelBeforePaid::default()), RecordingNotifier::default(), 150);
        let subject = h.subscriber(Role::Employee).await;
        let order_id = h.order(subject, "gold", 999.0).await;

        let err = h.activator.activate(&subject, &order_id, "gold", "pay_9").await.unwrap_err();

        assert!(matches!(
            err,
            ServiceError::InvalidOrderState { status: OrderStatus::Cancelled, .. }
        ));
        assert_eq!(h.ledger.find_order(&order_id).await.unwrap().status, OrderStatus::Cancelled);
        let account = h.account(&subject).await;
        assert!(account.subscription.is_none());
        assert_eq!(account.subscription_version, 0);
    }

    #[tokio::test]
    async fn replaying_an_older_order_returns_latest_subscription_unchanged() {
        let h = harness();
        let subject = h.subscriber(Role::Employee).await;
        let first = h.order(subject, "gold", 999.0).await;
        let second = h.order(subject, "platinum", 2499.0).await;

        h.activator.activate(&subject, &first, "gold", "pay_a").await.unwrap();
        let latest = h.activator.activate(&subject, &second, "platinum", "pay_b").await.unwrap().into_record();

        let replay = h.activator.activate(&subject, &first, "gold", "pay_a").await.unwrap();
        assert_eq!(replay, Activation::AlreadyActivated(latest.clone()));
        assert_eq!(replay.record().order_id, second);

        let account = h.account(&subject).await;
        assert_eq!(account.subscription_version, 2);
        assert_eq!(account.subscription.unwrap().end_date, latest.end_date);
    }

    #[tokio::test]
    async fn failed_order_cannot_activate() {
        let h = harness();
        let subject = h.subscriber(Role::Employee).await;
        let order_id = h.order(subject, "gold", 999.0).await;
        h.ledger.mark_failed(&order_id, "declined", false).await.unwrap();

        let err = h.activator.activate(&subject, &order_id, "gold", "pay_6").await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::InvalidOrderState { status: OrderStatus::Failed, .. }
        ));
        assert!(h.account(&subject).await.subscription.is_none());
    }

    #[tokio::test]
    async fn missing_order_plan_and_subject() {
        let h = harness();
        let subject = h.subscriber(Role::Employee).await;
        assert!(matches!(
            h.activator.activate(&subject, "missing", "gold", "pay").await,
            Err(ServiceError::OrderNotFound(_))
        ));

        let order_id = h.order(subject, "retired", 10.0).await;
        assert!(matches!(
            h.activator.activate(&subject, &order_id, "retired", "pay").await,
            Err(ServiceError::PlanNotFound(_))
        ));

        let ghost = ObjectId::new();
        let order_id = h.order(ghost, "gold", 999.0).await;
        assert!(matches!(
            h.activator.activate(&ghost, &order_id, "gold", "pay").await,
            Err(ServiceError::SubjectNotFound(_))
        ));
    }

    #[tokio::test]
    async fn free_plan_cannot_be_paid_for() {
        let h = harness();
        let subject = h.subscriber(Role::Employee).await;
        let order_id = h.order(subject, "free", 1.0).await;
        assert!(matches!(
            h.activator.activate(&subject, &order_id, "free", "pay").await,
            Err(ServiceError::InvalidPlanForPayment(id)) if id == "free"
        ));
    }

    #[tokio::test]
    async fn order_must_match_subject_and_plan() {
        let h = harness();
        let subject = h.subscriber(Role::Employee).await;
        let other = h.subscriber(Role::Employee).await;
        let order_id = h.order(subject, "gold", 999.0).await;

        assert!(matches!(
            h.activator.activate(&other, &order_id, "gold", "pay").await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            h.activator.activate(&subject, &order_id, "platinum", "pay").await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn employer_plan_grants_posting_units() {
        let h = harness();
        let employer = h.subscriber(Role::Employer).await;
        let order_id = h.order(employer, "hire-pro", 4999.0).await;

        h.activator.activate(&employer, &order_id, "hire-pro", "pay_7").await.unwrap();
        assert_eq!(h.account(&employer).await.remaining_active_postings, 11);

        h.activator.activate(&employer, &order_id, "hire-pro", "pay_7").await.unwrap();
        assert_eq!(h.account(&employer).await.remaining_active_postings, 11);
    }

    #[tokio::test]
    async fn plan_audience_must_match_role() {
        let h = harness();
        let employee = h.subscriber(Role::Employee).await;
        let order_id = h.order(employee, "hire-pro", 4999.0).await;
        assert!(matches!(
            h.activator.activate(&employee, &order_id, "hire-pro", "pay").await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_activations_get_distinct_cards() {
        let h = harness();
        let mut handles = Vec::new();
        for _ in 0..32 {
            let subject = h.subscriber(Role::Employee).await;
            let order_id = h.order(subject, "gold", 999.0).await;
            let activator = h.activator.clone();
            handles.push(tokio::spawn(async move {
                activator.activate(&subject, &order_id, "gold", "pay").await
            }));
        }
        let mut cards = HashSet::new();
        for handle in handles {
            let record = handle.await.unwrap().unwrap().into_record();
            assert_eq!(record.card_number.len(), 12);
            assert!(cards.insert(record.card_number));
        }
        assert_eq!(cards.len(), 32);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_orders_for_one_subscriber_both_extend() {
        let h = harness();
        let subject = h.subscriber(Role::Employee).await;
        let first = h.order(subject, "gold", 999.0).await;
        let second = h.order(subject, "gold", 999.0).await;

        let (a, b) = tokio::join!(
            h.activator.activate(&subject, &first, "gold", "pay_a"),
            h.activator.activate(&subject, &second, "gold", "pay_b"),
        );
        a.unwrap();
        b.unwrap();

        let account = h.account(&subject).await;
        let record = account.subscription.unwrap();
        assert_eq!(account.subscription_version, 2);
        assert!(record.end_date > time::add_months(DateTime::now(), 1).unwrap());
    }

    fn constant_digits() -> u64 {
        1_234_567_890
    }

    #[tokio::test]
    async fn collisions_rotate_the_prefix() {
        let h = harness_with(RecordingNotifier::default(), 150);
        let activator = h.activator.clone().with_digit_source(constant_digits);
        let prefix = starting_prefix(DateTime::now());

        let mut holder = Account::new("holder@example.com", Role::Employee, 0);
        let mut held = running_subscription(at(2099, 1, 1));
        held.card_number = card_number(prefix, constant_digits());
        holder.subscription = Some(held);
        h.accounts.insert(&holder).await.unwrap();

        let subject = h.subscriber(Role::Employee).await;
        let order_id = h.order(subject, "gold", 999.0).await;
        let record = activator.activate(&subject, &order_id, "gold", "pay").await.unwrap().into_record();

        assert_eq!(record.card_number, card_number(next_prefix(prefix), constant_digits()));
    }

    #[tokio::test]
    async fn exhausted_card_numbers_leave_a_paid_order_to_retry() {
        let h = harness_with(RecordingNotifier::default(), 5);
        let activator = h.activator.clone().with_digit_source(constant_digits);
        let prefix = starting_prefix(DateTime::now());

        let mut holder = Account::new("holder@example.com", Role::Employee, 0);
        let mut held = running_subscription(at(2099, 1, 1));
        held.card_number = card_number(prefix, constant_digits());
        holder.subscription = Some(held);
        h.accounts.insert(&holder).await.unwrap();

        let subject = h.subscriber(Role::Employee).await;
        let order_id = h.order(subject, "gold", 999.0).await;
        let err = activator.activate(&subject, &order_id, "gold", "pay").await.unwrap_err();

        assert!(matches!(err, ServiceError::CardNumberExhausted(5)));
        assert!(h.account(&subject).await.subscription.is_none());
        assert_eq!(h.ledger.find_order(&order_id).await.unwrap().status, OrderStatus::Paid);

        let retried = h.activator.activate(&subject, &order_id, "gold", "pay").await.unwrap();
        assert!(retried.is_new());
        assert_eq!(h.account(&subject).await.subscription_version, 1);
    }

    #[tokio::test]
    async fn notification_failure_does_not_undo_activation() {
        let h = harness_with(RecordingNotifier::failing(), 150);
        let subject = h.subscriber(Role::Employee).await;
        let order_id = h.order(subject, "gold", 999.0).await;

        let activation = h.activator.activate(&subject, &order_id, "gold", "pay").await.unwrap();
        tokio::task::yield_now().await;

        assert!(activation.is_new());
        assert!(h.account(&subject).await.subscription.is_some());
    }

    #[tokio::test]
    async fn confirmation_is_sent_to_the_subscriber() {
        let h = harness();
        let subject = h.subscriber(Role::Employee).await;
        let order_id = h.order(subject, "gold", 999.0).await;
        let email = h.account(&subject).await.email;

        let record = h.activator.activate(&subject, &order_id, "gold", "pay").await.unwrap().into_record();
        for _ in 0..10 {
            if !h.notifier.sent.lock().unwrap().is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }

        let sent = h.notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, email);
        assert!(sent[0].2.contains(&record.card_number));
    }

    #[test]
    fn card_number_layout() {
        assert_eq!(card_number(26, 42), "260000000042");
        assert_eq!(card_number(10, 9_999_999_999), "109999999999");
    }

    #[test]
    fn prefix_series_wraps() {
        assert_eq!(next_prefix(26), 27);
        assert_eq!(next_prefix(99), 10);
        assert_eq!(starting_prefix(at(2026, 10, 17)), 26);
        assert_eq!(starting_prefix(at(2105, 1, 1)), 15);
    }
}
