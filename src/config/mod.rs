use rocket::figment::{Figment, providers::{Env, Format, Toml}};
use rocket::Config as RocketConfig;
use std::env;

pub struct Config;

impl Config {
    fn figment() -> Figment {
        // Get the current profile
        let profile = env::var("ROCKET_PROFILE").unwrap_or_else(|_| "development".to_string());

        Figment::from(RocketConfig::default())
            .merge(Toml::file("Rocket.toml").nested())
            .select(&profile)
            .merge(Env::prefixed("ROCKET_").split("_"))
    }

    pub fn jwt_secret() -> String {
        Self::figment()
            .extract_inner("jwt_secret")
            .unwrap_or_else(|_| "default-secret".to_string())
    }

    pub fn jwt_refresh_secret() -> String {
        Self::figment()
            .extract_inner("jwt_refresh_secret")
            .unwrap_or_else(|_| "default-refresh-secret".to_string())
    }

    pub fn jwt_expiry() -> i64 {
        Self::figment()
            .extract_inner("jwt_expiry")
            .unwrap_or(900)
    }

    pub fn jwt_refresh_expiry() -> i64 {
        Self::figment()
            .extract_inner("jwt_refresh_expiry")
            .unwrap_or(604800)
    }

    pub fn mongodb_uri() -> String {
        Self::figment()
            .extract_inner("mongodb_uri")
            .unwrap_or_else(|_| "mongodb://localhost:27017/hireline".to_string())
    }

    pub fn mongodb_database() -> String {
        Self::figment()
            .extract_inner("mongodb_database")
            .unwrap_or_else(|_| "hireline".to_string())
    }

    pub fn mail_host() -> String {
        Self::figment()
            .extract_inner("mail_host")
            .unwrap_or_else(|_| "smtp.gmail.com".to_string())
    }

    pub fn mail_user() -> String {
        Self::figment()
            .extract_inner("mail_user")
            .unwrap_or_default()
    }

    pub fn mail_password() -> String {
        Self::figment()
            .extract_inner("mail_password")
            .unwrap_or_default()
    }

    pub fn mail_from() -> String {
        Self::figment()
            .extract_inner("mail_from")
            .unwrap_or_else(|_| "Hireline <noreply@hireline.in>".to_string())
    }

    pub fn is_development() -> bool {
        let profile = env::var("ROCKET_PROFILE").unwrap_or_else(|_| "development".to_string());
        profile == "development"
    }

    pub fn razorpay_key_id() -> Option<String> {
        Self::figment()
            .extract_inner("razorpay_key_id")
            .ok()
    }

    pub fn razorpay_key_secret() -> Option<String> {
        Self::figment()
            .extract_inner("razorpay_key_secret")
            .ok()
    }

    pub fn is_razorpay_enabled() -> bool {
        Self::razorpay_key_id().is_some()
            && Self::razorpay_key_secret().is_some()
    }

    pub fn phonepe_merchant_id() -> Option<String> {
        Self::figment()
            .extract_inner("phonepe_merchant_id")
            .ok()
    }

    pub fn phonepe_salt_key() -> Option<String> {
        Self::figment()
            .extract_inner("phonepe_salt_key")
            .ok()
    }

    pub fn phonepe_salt_index() -> String {
        Self::figment()
            .extract_inner::<String>("phonepe_salt_index")
            .or_else(|_| Self::figment().extract_inner::<i64>("phonepe_salt_index").map(|i| i.to_string()))
            .unwrap_or_else(|_| "1".to_string())
    }

    pub fn phonepe_base_url() -> String {
        Self::figment()
            .extract_inner("phonepe_base_url")
            .unwrap_or_else(|_| "https://api-preprod.phonepe.com/apis/pg-sandbox".to_string())
    }

    pub fn phonepe_redirect_url() -> String {
        Self::figment()
            .extract_inner("phonepe_redirect_url")
            .unwrap_or_else(|_| "http://localhost:3000/payment/status".to_string())
    }

    pub fn phonepe_callback_url() -> String {
        Self::figment()
            .extract_inner("phonepe_callback_url")
            .unwrap_or_else(|_| "http://localhost:8000/api/v1/payments/phonepe/callback".to_string())
    }

    pub fn is_phonepe_enabled() -> bool {
        Self::phonepe_merchant_id().is_some()
            && Self::phonepe_salt_key().is_some()
    }

    pub fn card_number_max_attempts() -> u32 {
        Self::figment()
            .extract_inner("card_number_max_attempts")
            .unwrap_or(150)
    }

    pub fn free_job_postings() -> i32 {
        Self::figment()
            .extract_inner("free_job_postings")
            .unwrap_or(1)
    }

    pub fn expiry_sweep_interval_secs() -> u64 {
        Self::figment()
            .extract_inner("expiry_sweep_interval_secs")
            .unwrap_or(86400)
    }

    pub fn otp_ttl_secs() -> i64 {
        Self::figment()
            .extract_inner("otp_ttl_secs")
            .unwrap_or(600)
    }
}
