use std::sync::Arc;

use super::error::{ServiceError, ServiceResult};
use crate::models::{Plan, PlanAudience};
use crate::store::PlanStore;
use crate::utils::validate_slug;

/// Read-only view over subscription tiers.
#[derive(Clone)]
pub struct PlanCatalog {
    plans: Arc<dyn PlanStore>,
}

impl PlanCatalog {
    pub fn new(plans: Arc<dyn PlanStore>) -> Self {
        PlanCatalog { plans }
    }

    pub async fn find_active_plan(&self, plan_id: &str) -> ServiceResult<Plan> {
        if !validate_slug(plan_id) {
            return Err(ServiceError::PlanNotFound(plan_id.to_string()));
        }
        match self.plans.find(plan_id).await? {
            Some(plan) if plan.is_active => Ok(plan),
            _ => Err(ServiceError::PlanNotFound(plan_id.to_string())),
        }
    }

    pub async fn list_active_plans(&self, audience: Option<PlanAudience>) -> ServiceResult<Vec<Plan>> {
        Ok(self.plans.list_active(audience).await?)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::models::{Plan, PlanAudience, PlanFeatures, RecruiterPriority, TaxBreakdown};

    pub fn plan(id: &str, price: f64, validity_months: i32) -> Plan {
        let gst_amount = (price * 18.0 / 118.0 * 100.0).round() / 100.0;
        Plan {
            id: id.to_string(),
            name: id.to_uppercase(),
            audience: PlanAudience::Employee,
            price,
            currency: "INR".to_string(),
            tax: TaxBreakdown {
                base_amount: price - gst_amount,
                gst_percent: 18.0,
                gst_amount,
            },
            validity_months,
            is_free: price == 0.0,
            is_active: true,
            features: PlanFeatures {
                can_apply: true,
                recruiter_priority: RecruiterPriority::Medium,
                immediate_interview_call: price >= 999.0,
                profile_boosted: price > 0.0,
                dedicated_manager: false,
                resume_review_count: 1,
                active_job_postings: 0,
            },
        }
    }

    pub fn employer_plan(id: &str, price: f64, validity_months: i32, postings: i32) -> Plan {
        let mut plan = plan(id, price, validity_months);
        plan.audience = PlanAudience::Employer;
        plan.features.can_apply = false;
        plan.features.active_job_postings = postings;
        plan
    }
}
