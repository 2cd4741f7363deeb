use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;
use mongodb::bson::oid::ObjectId;

use crate::guards::EmployerGuard;
use crate::models::{CreateJobDto, JobResponse};
use crate::services::QuotaGate;
use crate::utils::{ApiError, ApiResponse};

#[openapi(tag = "Jobs")]
#[post("/jobs", data = "<dto>")]
pub async fn create_job(
    gate: &State<QuotaGate>,
    employer: EmployerGuard,
    dto: Json<CreateJobDto>,
) -> Result<Json<ApiResponse<JobResponse>>, ApiError> {
    let job = gate.create_job(&employer.employer_id, dto.into_inner()).await?;
    let message = if job.is_active {
        "Job published"
    } else {
        "Job saved; it goes live once a posting slot is available"
    };
    Ok(Json(ApiResponse::success_with_message(
        message.to_string(),
        JobResponse::from(job),
    )))
}

#[openapi(tag = "Jobs")]
#[get("/jobs/mine")]
pub async fn list_my_jobs(
    gate: &State<QuotaGate>,
    employer: EmployerGuard,
) -> Result<Json<ApiResponse<Vec<JobResponse>>>, ApiError> {
    let jobs = gate.list_jobs(&employer.employer_id).await?;
    Ok(Json(ApiResponse::success(
        jobs.into_iter().map(JobResponse::from).collect(),
    )))
}

#[openapi(tag = "Jobs")]
#[post("/jobs/<job_id>/toggle-active")]
pub async fn toggle_job_active(
    gate: &State<QuotaGate>,
    employer: EmployerGuard,
    job_id: String,
) -> Result<Json<ApiResponse<JobResponse>>, ApiError> {
    let job_id = ObjectId::parse_str(&job_id).map_err(|_| ApiError::bad_request("Invalid job id"))?;
    let job = gate.toggle_job_active(&job_id, &employer.employer_id).await?;
    Ok(Json(ApiResponse::success(JobResponse::from(job))))
}
