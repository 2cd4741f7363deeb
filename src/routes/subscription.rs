use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;
use mongodb::bson::DateTime;

use crate::guards::AuthGuard;
use crate::models::SubscriptionResponse;
use crate::services::Payments;
use crate::utils::{ApiError, ApiResponse};

/// --------------------
/// Get Subscription Status
/// --------------------
#[openapi(tag = "Subscription")]
#[get("/subscription/status")]
pub async fn get_subscription_status(
    payments: &State<Payments>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let subscription = payments.subscription_of(&auth.account_id).await?;

    let body = match subscription {
        Some(record) => {
            let is_running = record.is_running(DateTime::now());
            serde_json::json!({
                "has_subscription": true,
                "is_running": is_running,
                "subscription": SubscriptionResponse::from(record),
            })
        }
        None => serde_json::json!({
            "has_subscription": false,
            "is_running": false,
            "subscription": null,
        }),
    };
    Ok(Json(ApiResponse::success(body)))
}
