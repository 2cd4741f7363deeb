use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use crate::models::{PlanAudience, PlanResponse};
use crate::services::PlanCatalog;
use crate::utils::{ApiError, ApiResponse};

#[openapi(tag = "Plans")]
#[get("/plans?<audience>")]
pub async fn list_plans(
    catalog: &State<PlanCatalog>,
    audience: Option<PlanAudience>,
) -> Result<Json<ApiResponse<Vec<PlanResponse>>>, ApiError> {
    let plans = catalog.list_active_plans(audience).await?;
    Ok(Json(ApiResponse::success(
        plans.into_iter().map(PlanResponse::from).collect(),
    )))
}

#[openapi(tag = "Plans")]
#[get("/plans/<plan_id>")]
pub async fn get_plan(
    catalog: &State<PlanCatalog>,
    plan_id: String,
) -> Result<Json<ApiResponse<PlanResponse>>, ApiError> {
    let plan = catalog.find_active_plan(&plan_id).await?;
    Ok(Json(ApiResponse::success(PlanResponse::from(plan))))
}
