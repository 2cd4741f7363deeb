use async_trait::async_trait;
use log::info;
use mongodb::bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{
    FindOneAndUpdateOptions, FindOptions, IndexOptions, ReplaceOptions, ReturnDocument,
};
use mongodb::{Collection, Cursor, Database, IndexModel};
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::{
    AccountStore, JobStore, OrderStore, OtpStore, PlanStore, StoreError, StoreResult,
    SubscriptionWrite, Transition,
};
use crate::models::{Account, Job, Order, OrderStatus, Otp, Plan, PlanAudience, SubscriptionRecord};

pub const PLANS: &str = "plans";
pub const ORDERS: &str = "orders";
pub const ACCOUNTS: &str = "accounts";
pub const JOBS: &str = "jobs";
pub const OTPS: &str = "otps";

const DUPLICATE_KEY: i32 = 11000;

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match &*err.kind {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY,
        ErrorKind::Command(e) => e.code == DUPLICATE_KEY,
        _ => false,
    }
}

async fn collect<T>(mut cursor: Cursor<T>) -> StoreResult<Vec<T>>
where
    T: DeserializeOwned + Unpin + Send + Sync,
{
    let mut items = Vec::new();
    while cursor.advance().await? {
        let item = cursor
            .deserialize_current()
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        items.push(item);
    }
    Ok(items)
}

/// Creates the constraints the state machine relies on. Safe to run on every boot.
pub async fn ensure_indexes(db: &Database) -> StoreResult<()> {
    let card_number = IndexModel::builder()
        .keys(doc! { "subscription.card_number": 1 })
        .options(
            IndexOptions::builder()
                .name("uniq_card_number".to_string())
                .unique(true)
                .partial_filter_expression(doc! { "subscription.card_number": { "$exists": true } })
                .build(),
        )
        .build();
    let email = IndexModel::builder()
        .keys(doc! { "email": 1 })
        .options(IndexOptions::builder().name("uniq_email".to_string()).unique(true).build())
        .build();
    let subscription_end = IndexModel::builder()
        .keys(doc! { "subscription.status": 1, "subscription.end_date": 1 })
        .build();
    db.collection::<Document>(ACCOUNTS)
        .create_indexes(vec![card_number, email, subscription_end], None)
        .await?;

    let orders_by_subject = IndexModel::builder()
        .keys(doc! { "subject_id": 1, "created_at": -1 })
        .build();
    db.collection::<Document>(ORDERS)
        .create_index(orders_by_subject, None)
        .await?;

    let active_jobs = IndexModel::builder()
        .keys(doc! { "employer_id": 1, "is_active": 1 })
        .build();
    db.collection::<Document>(JOBS)
        .create_index(active_jobs, None)
        .await?;

    let otp_ttl = IndexModel::builder()
        .keys(doc! { "expires_at": 1 })
        .options(
            IndexOptions::builder()
                .name("otp_ttl".to_string())
                .expire_after(Duration::from_secs(0))
                .build(),
        )
        .build();
    db.collection::<Document>(OTPS)
        .create_index(otp_ttl, None)
        .await?;

    info!("✓ MongoDB indexes ensured");
    Ok(())
}

/* ----------------------------- PLANS ----------------------------- */

pub struct MongoPlanStore {
    plans: Collection<Plan>,
}

impl MongoPlanStore {
    pub fn new(db: &Database) -> Self {
        MongoPlanStore { plans: db.collection(PLANS) }
    }
}

#[async_trait]
impl PlanStore for MongoPlanStore {
    async fn find(&self, plan_id: &str) -> StoreResult<Option<Plan>> {
        Ok(self.plans.find_one(doc! { "_id": plan_id }, None).await?)
    }

    async fn list_active(&self, audience: Option<PlanAudience>) -> StoreResult<Vec<Plan>> {
        let mut filter = doc! { "is_active": true };
        if let Some(audience) = audience {
            filter.insert("audience", audience.as_str());
        }
        let options = FindOptions::builder()
            .sort(doc! { "price": 1, "_id": 1 })
            .build();
        let cursor = self.plans.find(filter, options).await?;
        collect(cursor).await
    }
}

/* ----------------------------- ORDERS ----------------------------- */

pub struct MongoOrderStore {
    orders: Collection<Order>,
}

impl MongoOrderStore {
    pub fn new(db: &Database) -> Self {
        MongoOrderStore { orders: db.collection(ORDERS) }
    }
}

#[async_trait]
impl OrderStore for MongoOrderStore {
    async fn insert(&self, order: &Order) -> StoreResult<bool> {
        match self.orders.insert_one(order, None).await {
            Ok(_) => Ok(true),
            Err(e) if is_duplicate_key(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn find(&self, order_id: &str) -> StoreResult<Option<Order>> {
        Ok(self.orders.find_one(doc! { "_id": order_id }, None).await?)
    }

    async fn transition(
        &self,
        order_id: &str,
        to: OrderStatus,
        gateway_payment_id: Option<&str>,
        failure_reason: Option<&str>,
    ) -> StoreResult<Transition> {
        let open: Vec<&str> = OrderStatus::open().iter().map(|s| s.as_str()).collect();
        let mut set = doc! {
            "status": to.as_str(),
            "updated_at": DateTime::now(),
        };
        if let Some(payment_id) = gateway_payment_id {
            set.insert("gateway_payment_id", payment_id);
        }
        if let Some(reason) = failure_reason {
            set.insert("failure_reason", reason);
        }

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let updated = self
            .orders
            .find_one_and_update(
                doc! { "_id": order_id, "status": { "$in": open } },
                doc! { "$set": set },
                options,
            )
            .await?;

        match updated {
            Some(order) => Ok(Transition::Applied(order)),
            None => match self.find(order_id).await? {
                Some(current) => Ok(Transition::Rejected(current)),
                None => Ok(Transition::Missing),
            },
        }
    }
}

/* ----------------------------- ACCOUNTS ----------------------------- */

pub struct MongoAccountStore {
    accounts: Collection<Account>,
}

impl MongoAccountStore {
    pub fn new(db: &Database) -> Self {
        MongoAccountStore { accounts: db.collection(ACCOUNTS) }
    }
}

#[async_trait]
impl AccountStore for MongoAccountStore {
    async fn insert(&self, account: &Account) -> StoreResult<ObjectId> {
        let result = self.accounts.insert_one(account, None).await?;
        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| StoreError::Serialization("inserted account id is not an ObjectId".to_string()))
    }

    async fn find(&self, id: &ObjectId) -> StoreResult<Option<Account>> {
        Ok(self.accounts.find_one(doc! { "_id": id }, None).await?)
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        Ok(self.accounts.find_one(doc! { "email": email }, None).await?)
    }

    async fn touch_login(&self, id: &ObjectId) -> StoreResult<()> {
        self.accounts
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "last_login_at": DateTime::now() } },
                None,
            )
            .await?;
        Ok(())
    }

    async fn write_subscription(
        &self,
        id: &ObjectId,
        expected_version: i64,
        record: &SubscriptionRecord,
        postings_granted: i32,
    ) -> StoreResult<SubscriptionWrite> {
        let order_id = record.order_id.clone();
        let record = mongodb::bson::to_bson(record)?;
        let result = self
            .accounts
            .update_one(
                doc! { "_id": id, "subscription_version": expected_version },
                doc! {
                    "$set": { "subscription": record, "updated_at": DateTime::now() },
                    "$addToSet": { "activated_orders": order_id },
                    "$inc": {
                        "subscription_version": 1_i64,
                        "remaining_active_postings": postings_granted,
                    },
                },
                None,
            )
            .await;

        match result {
            Ok(r) if r.matched_count == 1 => Ok(SubscriptionWrite::Applied),
            Ok(_) => Ok(SubscriptionWrite::Stale),
            Err(e) if is_duplicate_key(&e) => Ok(SubscriptionWrite::DuplicateCard),
            Err(e) => Err(e.into()),
        }
    }

    async fn claim_posting(&self, id: &ObjectId, now: DateTime) -> StoreResult<bool> {
        let result = self
            .accounts
            .update_one(
                doc! {
                    "_id": id,
                    "remaining_active_postings": { "$gt": 0 },
                    "$or": [
                        { "active_jobs": { "$not": { "$gte": 1 } } },
                        { "subscription.status": "active", "subscription.end_date": { "$gt": now } },
                    ],
                },
                doc! {
                    "$inc": { "remaining_active_postings": -1, "active_jobs": 1 },
                    "$set": { "updated_at": DateTime::now() },
                },
                None,
            )
            .await?;
        Ok(result.modified_count == 1)
    }

    async fn release_posting(&self, id: &ObjectId) -> StoreResult<()> {
        // Pipeline update so `active_jobs` clamps at zero on documents that predate the counter.
        let update = vec![doc! {
            "$set": {
                "remaining_active_postings": { "$add": [{ "$ifNull": ["$remaining_active_postings", 0] }, 1] },
                "active_jobs": { "$max": [0, { "$subtract": [{ "$ifNull": ["$active_jobs", 0] }, 1] }] },
                "updated_at": DateTime::now(),
            }
        }];
        self.accounts.update_one(doc! { "_id": id }, update, None).await?;
        Ok(())
    }

    async fn expire_lapsed(&self, now: DateTime) -> StoreResult<u64> {
        let result = self
            .accounts
            .update_many(
                doc! {
                    "subscription.status": "active",
                    "subscription.end_date": { "$lte": now },
                },
                doc! {
                    "$set": { "subscription.status": "expired", "updated_at": now },
                    "$inc": { "subscription_version": 1_i64 },
                },
                None,
            )
            .await?;
        Ok(result.modified_count)
    }
}

/* ----------------------------- JOBS ----------------------------- */

pub struct MongoJobStore {
    jobs: Collection<Job>,
}

impl MongoJobStore {
    pub fn new(db: &Database) -> Self {
        MongoJobStore { jobs: db.collection(JOBS) }
    }
}

#[async_trait]
impl JobStore for MongoJobStore {
    async fn insert(&self, job: &Job) -> StoreResult<ObjectId> {
        let result = self.jobs.insert_one(job, None).await?;
        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| StoreError::Serialization("inserted job id is not an ObjectId".to_string()))
    }

    async fn find(&self, id: &ObjectId) -> StoreResult<Option<Job>> {
        Ok(self.jobs.find_one(doc! { "_id": id }, None).await?)
    }

    async fn list_for_employer(&self, employer_id: &ObjectId) -> StoreResult<Vec<Job>> {
        let options = FindOptions::builder().sort(doc! { "created_at": -1 }).build();
        let cursor = self
            .jobs
            .find(doc! { "employer_id": employer_id }, options)
            .await?;
        collect(cursor).await
    }

    async fn set_active(&self, id: &ObjectId, active: bool) -> StoreResult<bool> {
        let result = self
            .jobs
            .update_one(
                doc! { "_id": id, "is_active": !active },
                doc! { "$set": { "is_active": active, "updated_at": DateTime::now() } },
                None,
            )
            .await?;
        Ok(result.modified_count == 1)
    }
}

/* ----------------------------- OTPS ----------------------------- */

pub struct MongoOtpStore {
    otps: Collection<Otp>,
}

impl MongoOtpStore {
    pub fn new(db: &Database) -> Self {
        MongoOtpStore { otps: db.collection(OTPS) }
    }
}

#[async_trait]
impl OtpStore for MongoOtpStore {
    async fn put(&self, otp: &Otp) -> StoreResult<()> {
        let options = ReplaceOptions::builder().upsert(true).build();
        self.otps
            .replace_one(doc! { "_id": &otp.key }, otp, options)
            .await?;
        Ok(())
    }

    async fn find(&self, key: &str) -> StoreResult<Option<Otp>> {
        Ok(self.otps.find_one(doc! { "_id": key }, None).await?)
    }

    async fn record_attempt(&self, key: &str) -> StoreResult<()> {
        self.otps
            .update_one(doc! { "_id": key }, doc! { "$inc": { "attempts": 1 } }, None)
            .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        self.otps.delete_one(doc! { "_id": key }, None).await?;
        Ok(())
    }
}
