use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;

use super::subscription::{SubscriptionRecord, SubscriptionResponse};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Employee,
    Employer,
    EmployerAdmin,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Employee => "employee",
            Role::Employer => "employer",
            Role::EmployerAdmin => "employer_admin",
            Role::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "employee" => Some(Role::Employee),
            "employer" => Some(Role::Employer),
            "employer_admin" => Some(Role::EmployerAdmin),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// Any account that can hold a subscription or post jobs.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Account {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
    /// Parent employer for employer-admins.
    pub employer_id: Option<ObjectId>,
    pub subscription: Option<SubscriptionRecord>,
    #[serde(default)]
    pub subscription_version: i64,
    #[serde(default)]
    pub remaining_active_postings: i32,
    /// Live jobs holding a posting unit.
    #[serde(default)]
    pub active_jobs: i32,
    /// Orders whose subscription window has been applied to this account.
    #[serde(default)]
    pub activated_orders: Vec<String>,
    pub is_active: bool,
    pub last_login_at: DateTime,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Account {
    pub fn new(email: &str, role: Role, free_postings: i32) -> Self {
        let now = DateTime::now();
        Account {
            id: None,
            email: email.to_string(),
            name: None,
            role,
            employer_id: None,
            subscription: None,
            subscription_version: 0,
            remaining_active_postings: if role == Role::Employer { free_postings } else { 0 },
            active_jobs: 0,
            activated_orders: Vec::new(),
            is_active: true,
            last_login_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_running_subscription(&self, now: DateTime) -> bool {
        self.subscription
            .as_ref()
            .map(|s| s.is_running(now))
            .unwrap_or(false)
    }
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct AccountResponse {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub role: String,
    pub remaining_active_postings: i32,
    pub active_jobs: i32,
    pub subscription: Option<SubscriptionResponse>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        AccountResponse {
            id: account.id.map(|id| id.to_hex()).unwrap_or_default(),
            email: account.email,
            name: account.name,
            role: account.role.as_str().to_string(),
            remaining_active_postings: account.remaining_active_postings,
            active_jobs: account.active_jobs,
            subscription: account.subscription.map(SubscriptionResponse::from),
        }
    }
}
