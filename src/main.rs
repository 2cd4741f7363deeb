#[macro_use]
extern crate rocket;

mod config;
mod db;
mod guards;
mod models;
mod routes;
mod services;
mod store;
mod utils;

use dotenvy::dotenv;
use log::{info, warn};
use rocket::fairing::{AdHoc, Fairing, Info, Kind};
use rocket::http::Header;
use rocket::{Build, Request, Response, Rocket};
use rocket_okapi::openapi_get_routes;
use rocket_okapi::swagger_ui::{SwaggerUIConfig, make_swagger_ui};
use std::time::Duration;

use crate::config::Config;
use crate::services::ExpirySweeper;

/* ----------------------------- CORS ----------------------------- */

pub struct CORS;

#[rocket::async_trait]
impl Fairing for CORS {
    fn info(&self) -> Info {
        Info {
            name: "CORS",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        if let Some(origin) = request.headers().get_one("Origin") {
            response.set_header(Header::new("Access-Control-Allow-Origin", origin));
        }

        response.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "GET, POST, PUT, DELETE, OPTIONS",
        ));

        response.set_header(Header::new(
            "Access-Control-Allow-Headers",
            "Content-Type, Authorization, X-VERIFY",
        ));

        response.set_header(Header::new("Access-Control-Allow-Credentials", "true"));
    }
}

/* ----------------------------- OPTIONS ----------------------------- */

#[options("/<_..>")]
fn options_handler() {}

/* ----------------------------- ERRORS ----------------------------- */

#[catch(404)]
fn not_found() -> rocket::serde::json::Value {
    rocket::serde::json::json!({
        "success": false,
        "message": "Resource not found (check /api/v1 prefix)"
    })
}

#[catch(401)]
fn unauthorized() -> rocket::serde::json::Value {
    rocket::serde::json::json!({
        "success": false,
        "message": "Missing or invalid access token"
    })
}

#[catch(403)]
fn forbidden() -> rocket::serde::json::Value {
    rocket::serde::json::json!({
        "success": false,
        "message": "Not allowed for this account"
    })
}

#[catch(500)]
fn internal_error() -> rocket::serde::json::Value {
    rocket::serde::json::json!({
        "success": false,
        "message": "Internal server error"
    })
}

/* ----------------------------- SWEEPER ----------------------------- */

fn expiry_sweep() -> AdHoc {
    AdHoc::on_liftoff("Subscription expiry sweep", |rocket| {
        Box::pin(async move {
            match rocket.state::<ExpirySweeper>() {
                Some(sweeper) => {
                    let interval = Duration::from_secs(Config::expiry_sweep_interval_secs().max(1));
                    sweeper.clone().spawn(interval);
                    info!("Expiry sweep scheduled every {:?}", interval);
                }
                None => warn!("Expiry sweep not scheduled: services unavailable"),
            }
        })
    })
}

/* ----------------------------- SWAGGER ----------------------------- */

fn swagger_config() -> SwaggerUIConfig {
    SwaggerUIConfig {
        url: "/api/v1/openapi.json".to_string(),
        ..Default::default()
    }
}

/* ----------------------------- LAUNCH ----------------------------- */

#[launch]
fn rocket() -> Rocket<Build> {
    dotenv().ok();
    env_logger::init();

    info!("🚀 Hireline API running");
    info!("📚 Swagger UI → http://localhost:8000/api/docs");
    if !Config::is_razorpay_enabled() {
        warn!("Razorpay keys missing; Razorpay checkout disabled");
    }
    if !Config::is_phonepe_enabled() {
        warn!("PhonePe merchant config missing; PhonePe checkout disabled");
    }

    rocket::build()
        .attach(db::init())
        .attach(expiry_sweep())
        .attach(CORS)
        .mount("/", routes![options_handler])
        .mount(
            "/api/v1",
            openapi_get_routes![
                // Auth
                routes::auth::send_otp,
                routes::auth::verify_otp,
                routes::auth::refresh_token,
                // Plans
                routes::plan::list_plans,
                routes::plan::get_plan,
                // Payments
                routes::payment::razorpay_checkout,
                routes::payment::razorpay_verify,
                routes::payment::phonepe_checkout,
                routes::payment::phonepe_callback,
                routes::payment::get_order,
                routes::payment::cancel_order,
                // Subscription
                routes::subscription::get_subscription_status,
                // Jobs
                routes::job::create_job,
                routes::job::list_my_jobs,
                routes::job::toggle_job_active,
                // Admin
                routes::admin::expire_subscriptions,
            ],
        )
        .mount("/api/docs", make_swagger_ui(&swagger_config()))
        .register("/", catchers![not_found, unauthorized, forbidden, internal_error])
}
