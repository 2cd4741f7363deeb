use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;
use log::info;
use mongodb::bson::DateTime;

use crate::guards::AdminGuard;
use crate::services::ExpirySweeper;
use crate::utils::{ApiError, ApiResponse};

/// Runs the subscription expiry sweep immediately.
#[openapi(tag = "Admin")]
#[post("/admin/subscriptions/expire")]
pub async fn expire_subscriptions(
    sweeper: &State<ExpirySweeper>,
    admin: AdminGuard,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let expired = sweeper.sweep_expired(DateTime::now()).await?;
    info!("Admin {} ran the expiry sweep", admin.auth.account_id.to_hex());

    Ok(Json(ApiResponse::success(serde_json::json!({
        "expired": expired
    }))))
}
