use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Job {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub employer_id: ObjectId,
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub job_type: Option<String>, // "fulltime", "parttime", "contract", "internship"
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub skills: Vec<String>,
    /// Set once at creation from the quota gate; later changes go through toggle.
    pub is_active: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateJobDto {
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub job_type: Option<String>,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    #[serde(default)]
    pub skills: Vec<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct JobResponse {
    pub id: String,
    pub employer_id: String,
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub job_type: Option<String>,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub skills: Vec<String>,
    pub is_active: bool,
    /// Created without a free posting unit; waits for manual or subscription reactivation.
    pub pending_activation: bool,
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        JobResponse {
            id: job.id.map(|id| id.to_hex()).unwrap_or_default(),
            employer_id: job.employer_id.to_hex(),
            title: job.title,
            description: job.description,
            location: job.location,
            job_type: job.job_type,
            salary_min: job.salary_min,
            salary_max: job.salary_max,
            skills: job.skills,
            is_active: job.is_active,
            pending_activation: !job.is_active,
        }
    }
}
