use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use crate::models::{AccountResponse, RefreshTokenDto, SendOtpDto, VerifyOtpDto};
use crate::services::{AuthService, Session};
use crate::utils::{ApiError, ApiResponse};

fn session_body(session: Session) -> serde_json::Value {
    serde_json::json!({
        "access_token": session.access_token,
        "refresh_token": session.refresh_token,
        "is_new_user": session.is_new_user,
        "account": AccountResponse::from(session.account),
    })
}

/// --------------------
/// Send OTP
/// --------------------
#[openapi(tag = "Auth")]
#[post("/auth/send-otp", data = "<dto>")]
pub async fn send_otp(
    auth: &State<AuthService>,
    dto: Json<SendOtpDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    auth.send_otp(&dto.email, dto.role.as_deref()).await?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "message": "OTP sent successfully"
    }))))
}

/// --------------------
/// Verify OTP + Login
/// --------------------
#[openapi(tag = "Auth")]
#[post("/auth/verify-otp", data = "<dto>")]
pub async fn verify_otp(
    auth: &State<AuthService>,
    dto: Json<VerifyOtpDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let session = auth.verify_otp(&dto.email, &dto.otp).await?;
    Ok(Json(ApiResponse::success_with_message(
        "Login successful".to_string(),
        session_body(session),
    )))
}

#[openapi(tag = "Auth")]
#[post("/auth/refresh", data = "<dto>")]
pub async fn refresh_token(
    auth: &State<AuthService>,
    dto: Json<RefreshTokenDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let session = auth.refresh(&dto.refresh_token).await?;
    Ok(Json(ApiResponse::success(session_body(session))))
}
