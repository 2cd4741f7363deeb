//! In-process stores for unit tests. Each conditional write runs under one
//! lock, which gives the same atomicity the MongoDB filters give.

use async_trait::async_trait;
use mongodb::bson::{oid::ObjectId, DateTime};
use std::collections::HashMap;
use std::sync::Mutex;

use super::{
    AccountStore, JobStore, OrderStore, OtpStore, PlanStore, StoreResult, SubscriptionWrite,
    Transition,
};
use crate::models::{
    Account, Job, Order, OrderStatus, Otp, Plan, PlanAudience, SubscriptionRecord,
    SubscriptionStatus,
};

#[derive(Default)]
pub struct MemoryPlanStore {
    plans: Mutex<HashMap<String, Plan>>,
}

impl MemoryPlanStore {
    pub fn with(plans: Vec<Plan>) -> Self {
        let store = MemoryPlanStore::default();
        for plan in plans {
            store.put(plan);
        }
        store
    }

    pub fn put(&self, plan: Plan) {
        self.plans.lock().unwrap().insert(plan.id.clone(), plan);
    }
}

#[async_trait]
impl PlanStore for MemoryPlanStore {
    async fn find(&self, plan_id: &str) -> StoreResult<Option<Plan>> {
        Ok(self.plans.lock().unwrap().get(plan_id).cloned())
    }

    async fn list_active(&self, audience: Option<PlanAudience>) -> StoreResult<Vec<Plan>> {
        let mut plans: Vec<Plan> = self
            .plans
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.is_active && audience.map(|a| a == p.audience).unwrap_or(true))
            .cloned()
            .collect();
        plans.sort_by(|a, b| a.price.total_cmp(&b.price).then_with(|| a.id.cmp(&b.id)));
        Ok(plans)
    }
}

#[derive(Default)]
pub struct MemoryOrderStore {
    orders: Mutex<HashMap<String, Order>>,
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn insert(&self, order: &Order) -> StoreResult<bool> {
        let mut orders = self.orders.lock().unwrap();
        if orders.contains_key(&order.id) {
            return Ok(false);
        }
        orders.insert(order.id.clone(), order.clone());
        Ok(true)
    }

    async fn find(&self, order_id: &str) -> StoreResult<Option<Order>> {
        Ok(self.orders.lock().unwrap().get(order_id).cloned())
    }

    async fn transition(
        &self,
        order_id: &str,
        to: OrderStatus,
        gateway_payment_id: Option<&str>,
        failure_reason: Option<&str>,
    ) -> StoreResult<Transition> {
        let mut orders = self.orders.lock().unwrap();
        let Some(order) = orders.get_mut(order_id) else {
            return Ok(Transition::Missing);
        };
        if order.status.is_terminal() {
            return Ok(Transition::Rejected(order.clone()));
        }
        order.status = to;
        if let Some(payment_id) = gateway_payment_id {
            order.gateway_payment_id = Some(payment_id.to_string());
        }
        if let Some(reason) = failure_reason {
            order.failure_reason = Some(reason.to_string());
        }
        order.updated_at = DateTime::now();
        Ok(Transition::Applied(order.clone()))
    }
}

#[derive(Default)]
pub struct MemoryAccountStore {
    accounts: Mutex<HashMap<ObjectId, Account>>,
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn insert(&self, account: &Account) -> StoreResult<ObjectId> {
        let id = account.id.unwrap_or_else(ObjectId::new);
        let mut stored = account.clone();
        stored.id = Some(id);
        self.accounts.lock().unwrap().insert(id, stored);
        Ok(id)
    }

    async fn find(&self, id: &ObjectId) -> StoreResult<Option<Account>> {
        Ok(self.accounts.lock().unwrap().get(id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .values()
            .find(|a| a.email == email)
            .cloned())
    }

    async fn touch_login(&self, id: &ObjectId) -> StoreResult<()> {
        if let Some(account) = self.accounts.lock().unwrap().get_mut(id) {
            account.last_login_at = DateTime::now();
        }
        Ok(())
    }

    async fn write_subscription(
        &self,
        id: &ObjectId,
        expected_version: i64,
        record: &SubscriptionRecord,
        postings_granted: i32,
    ) -> StoreResult<SubscriptionWrite> {
        let mut accounts = self.accounts.lock().unwrap();
        let card_taken = accounts.iter().any(|(other_id, other)| {
            other_id != id
                && other
                    .subscription
                    .as_ref()
                    .map(|s| s.card_number == record.card_number)
                    .unwrap_or(false)
        });
        if card_taken {
            return Ok(SubscriptionWrite::DuplicateCard);
        }
        let Some(account) = accounts.get_mut(id) else {
            return Ok(SubscriptionWrite::Stale);
        };
        if account.subscription_version != expected_version {
            return Ok(SubscriptionWrite::Stale);
        }
        account.subscription = Some(record.clone());
        account.subscription_version += 1;
        if !account.activated_orders.contains(&record.order_id) {
            account.activated_orders.push(record.order_id.clone());
        }
        account.remaining_active_postings += postings_granted;
        account.updated_at = DateTime::now();
        Ok(SubscriptionWrite::Applied)
    }

    async fn claim_posting(&self, id: &ObjectId, now: DateTime) -> StoreResult<bool> {
        let mut accounts = self.accounts.lock().unwrap();
        let Some(account) = accounts.get_mut(id) else {
            return Ok(false);
        };
        if account.remaining_active_postings <= 0
            || (!account.has_running_subscription(now) && account.active_jobs >= 1)
        {
            return Ok(false);
        }
        account.remaining_active_postings -= 1;
        account.active_jobs += 1;
        Ok(true)
    }

    async fn release_posting(&self, id: &ObjectId) -> StoreResult<()> {
        if let Some(account) = self.accounts.lock().unwrap().get_mut(id) {
            account.remaining_active_postings += 1;
            account.active_jobs = (account.active_jobs - 1).max(0);
        }
        Ok(())
    }

    async fn expire_lapsed(&self, now: DateTime) -> StoreResult<u64> {
        let mut expired = 0;
        for account in self.accounts.lock().unwrap().values_mut() {
            if let Some(sub) = account.subscription.as_mut() {
                if sub.status == SubscriptionStatus::Active && sub.end_date <= now {
                    sub.status = SubscriptionStatus::Expired;
                    account.subscription_version += 1;
                    expired += 1;
                }
            }
        }
        Ok(expired)
    }
}

#[derive(Default)]
pub struct MemoryJobStore {
    jobs: Mutex<HashMap<ObjectId, Job>>,
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, job: &Job) -> StoreResult<ObjectId> {
        let id = job.id.unwrap_or_else(ObjectId::new);
        let mut stored = job.clone();
        stored.id = Some(id);
        self.jobs.lock().unwrap().insert(id, stored);
        Ok(id)
    }

    async fn find(&self, id: &ObjectId) -> StoreResult<Option<Job>> {
        Ok(self.jobs.lock().unwrap().get(id).cloned())
    }

    async fn list_for_employer(&self, employer_id: &ObjectId) -> StoreResult<Vec<Job>> {
        let mut jobs: Vec<Job> = self
            .jobs
            .lock()
            .unwrap()
            .values()
            .filter(|j| &j.employer_id == employer_id)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    async fn set_active(&self, id: &ObjectId, active: bool) -> StoreResult<bool> {
        match self.jobs.lock().unwrap().get_mut(id) {
            Some(job) if job.is_active != active => {
                job.is_active = active;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[derive(Default)]
pub struct MemoryOtpStore {
    otps: Mutex<HashMap<String, Otp>>,
}

#[async_trait]
impl OtpStore for MemoryOtpStore {
    async fn put(&self, otp: &Otp) -> StoreResult<()> {
        self.otps.lock().unwrap().insert(otp.key.clone(), otp.clone());
        Ok(())
    }

    async fn find(&self, key: &str) -> StoreResult<Option<Otp>> {
        Ok(self.otps.lock().unwrap().get(key).cloned())
    }

    async fn record_attempt(&self, key: &str) -> StoreResult<()> {
        if let Some(otp) = self.otps.lock().unwrap().get_mut(key) {
            otp.attempts += 1;
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        self.otps.lock().unwrap().remove(key);
        Ok(())
    }
}
