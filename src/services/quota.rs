use log::{info, warn};
use mongodb::bson::{oid::ObjectId, DateTime};
use std::sync::Arc;

use super::error::{ServiceError, ServiceResult};
use crate::models::{Account, CreateJobDto, Job};
use crate::store::{AccountStore, JobStore};

/// Decides which new or toggled job listings may be active.
#[derive(Clone)]
pub struct QuotaGate {
    accounts: Arc<dyn AccountStore>,
    jobs: Arc<dyn JobStore>,
}

impl QuotaGate {
    pub fn new(accounts: Arc<dyn AccountStore>, jobs: Arc<dyn JobStore>) -> Self {
        QuotaGate { accounts, jobs }
    }

    async fn load_employer(&self, employer_id: &ObjectId) -> ServiceResult<Account> {
        self.accounts
            .find(employer_id)
            .await?
            .ok_or_else(|| ServiceError::SubjectNotFound(employer_id.to_hex()))
    }

    /// `true` means a posting unit was taken and the new job may go live.
    ///
    /// The unit check and the single-active-job rule for unsubscribed
    /// employers are one conditional write on the account.
    pub async fn evaluate_new_job_activation(&self, employer_id: &ObjectId) -> ServiceResult<bool> {
        self.load_employer(employer_id).await?;
        Ok(self.accounts.claim_posting(employer_id, DateTime::now()).await?)
    }

    pub async fn create_job(&self, employer_id: &ObjectId, dto: CreateJobDto) -> ServiceResult<Job> {
        if dto.title.trim().is_empty() {
            return Err(ServiceError::validation("Job title is required"));
        }
        if dto.description.trim().is_empty() {
            return Err(ServiceError::validation("Job description is required"));
        }
        if let (Some(min), Some(max)) = (dto.salary_min, dto.salary_max) {
            if min > max {
                return Err(ServiceError::validation("Minimum salary exceeds maximum salary"));
            }
        }

        let is_active = self.evaluate_new_job_activation(employer_id).await?;
        let now = DateTime::now();
        let mut job = Job {
            id: None,
            employer_id: *employer_id,
            title: dto.title.trim().to_string(),
            description: dto.description,
            location: dto.location,
            job_type: dto.job_type,
            salary_min: dto.salary_min,
            salary_max: dto.salary_max,
            skills: dto.skills,
            is_active,
            created_at: now,
            updated_at: now,
        };

        match self.jobs.insert(&job).await {
            Ok(id) => job.id = Some(id),
            Err(e) => {
                if is_active {
                    self.accounts.release_posting(employer_id).await?;
                }
                return Err(e.into());
            }
        }

        if is_active {
            info!("Job {:?} live for employer {}", job.id, employer_id.to_hex());
        } else {
            info!("Job {:?} pending activation for employer {}", job.id, employer_id.to_hex());
        }
        Ok(job)
    }

    pub async fn toggle_job_active(&self, job_id: &ObjectId, employer_id: &ObjectId) -> ServiceResult<Job> {
        let mut job = match self.jobs.find(job_id).await? {
            Some(job) if job.employer_id == *employer_id => job,
            _ => return Err(ServiceError::JobNotFound(job_id.to_hex())),
        };

        if job.is_active {
            if self.jobs.set_active(job_id, false).await? {
                self.accounts.release_posting(employer_id).await?;
            }
            job.is_active = false;
            return Ok(job);
        }

        let now = DateTime::now();
        if !self.accounts.claim_posting(employer_id, now).await? {
            let employer = self.load_employer(employer_id).await?;
            if !employer.has_running_subscription(now) && employer.active_jobs >= 1 {
                return Err(ServiceError::SingleActiveJobLimit);
            }
            return Err(ServiceError::QuotaExhausted);
        }
        if !self.jobs.set_active(job_id, true).await? {
            // Activated by a concurrent toggle; give the unit back.
            warn!("Job {} already active, releasing posting", job_id.to_hex());
            self.accounts.release_posting(employer_id).await?;
        }
        job.is_active = true;
        Ok(job)
    }

    pub async fn list_jobs(&self, employer_id: &ObjectId) -> ServiceResult<Vec<Job>> {
        Ok(self.jobs.list_for_employer(employer_id).await?)
    }
}
