use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;

/// One outstanding login code. Keyed by email; MongoDB drops it at `expires_at`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Otp {
    #[serde(rename = "_id")]
    pub key: String,
    pub otp: String,
    pub role: String,
    pub expires_at: DateTime,
    pub attempts: i32,
    pub created_at: DateTime,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SendOtpDto {
    pub email: String,
    /// Role for a first-time login: "employee" or "employer".
    pub role: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct VerifyOtpDto {
    pub email: String,
    pub otp: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RefreshTokenDto {
    pub refresh_token: String,
}
