use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;

/// Who a plan is sold to.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema, rocket::FromFormField)]
#[serde(rename_all = "lowercase")]
pub enum PlanAudience {
    Employee,
    Employer,
}

impl PlanAudience {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanAudience::Employee => "employee",
            PlanAudience::Employer => "employer",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RecruiterPriority {
    None,
    Medium,
    Highest,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct TaxBreakdown {
    pub base_amount: f64,
    pub gst_percent: f64,
    pub gst_amount: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct PlanFeatures {
    pub can_apply: bool,
    pub recruiter_priority: RecruiterPriority,
    pub immediate_interview_call: bool,
    pub profile_boosted: bool,
    pub dedicated_manager: bool,
    pub resume_review_count: i32,
    /// Posting units granted to an employer on activation.
    #[serde(default)]
    pub active_job_postings: i32,
}

/// A subscription tier. Referenced by slug; edits only affect future activations.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct Plan {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub audience: PlanAudience,
    pub price: f64,
    pub currency: String,
    pub tax: TaxBreakdown,
    pub validity_months: i32,
    pub is_free: bool,
    pub is_active: bool,
    pub features: PlanFeatures,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct PlanResponse {
    pub id: String,
    pub name: String,
    pub audience: String,
    pub price: f64,
    pub currency: String,
    pub tax: TaxBreakdown,
    pub validity_months: i32,
    pub is_free: bool,
    pub features: PlanFeatures,
}

impl From<Plan> for PlanResponse {
    fn from(plan: Plan) -> Self {
        PlanResponse {
            id: plan.id,
            name: plan.name,
            audience: plan.audience.as_str().to_string(),
            price: plan.price,
            currency: plan.currency,
            tax: plan.tax,
            validity_months: plan.validity_months,
            is_free: plan.is_free,
            features: plan.features,
        }
    }
}
