use rocket::http::Status;
use rocket::request::{self, FromRequest, Outcome, Request};
use rocket::State;
use log::warn;
use mongodb::bson::oid::ObjectId;

// === OpenAPI (compatible with rocket_okapi 0.8.0 / 0.8.1) ===
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::request::{OpenApiFromRequest, RequestHeaderInput};

use crate::models::Role;
use crate::services::{AuthService, JwtService};

/// JWT-based authentication guard
pub struct AuthGuard {
    pub account_id: ObjectId,
    pub role: Role,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthGuard {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let token = match req.headers().get_one("Authorization") {
            Some(token) => token.trim_start_matches("Bearer "),
            None => return Outcome::Error((Status::Unauthorized, ())),
        };
        let jwt = match req.guard::<&State<JwtService>>().await {
            Outcome::Success(jwt) => jwt,
            _ => return Outcome::Error((Status::InternalServerError, ())),
        };

        match jwt.verify_token(token, false) {
            Ok(claims) => match ObjectId::parse_str(&claims.sub) {
                Ok(account_id) => Outcome::Success(AuthGuard {
                    account_id,
                    role: claims.role,
                }),
                Err(_) => Outcome::Error((Status::Unauthorized, ())),
            },
            Err(_) => Outcome::Error((Status::Unauthorized, ())),
        }
    }
}

/// Employers and their admins. `employer_id` is the account that owns the
/// jobs and the posting quota.
pub struct EmployerGuard {
    pub auth: AuthGuard,
    pub employer_id: ObjectId,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for EmployerGuard {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let auth = match req.guard::<AuthGuard>().await {
            Outcome::Success(auth) => auth,
            Outcome::Error(e) => return Outcome::Error(e),
            Outcome::Forward(f) => return Outcome::Forward(f),
        };

        match auth.role {
            Role::Employer => {
                let employer_id = auth.account_id;
                Outcome::Success(EmployerGuard { auth, employer_id })
            }
            Role::EmployerAdmin => {
                let service = match req.guard::<&State<AuthService>>().await {
                    Outcome::Success(service) => service,
                    _ => return Outcome::Error((Status::InternalServerError, ())),
                };
                match service.account(&auth.account_id).await {
                    Ok(account) => match account.employer_id {
                        Some(employer_id) => Outcome::Success(EmployerGuard { auth, employer_id }),
                        None => {
                            warn!("Employer admin {} has no employer", auth.account_id.to_hex());
                            Outcome::Error((Status::Forbidden, ()))
                        }
                    },
                    Err(_) => Outcome::Error((Status::Forbidden, ())),
                }
            }
            _ => Outcome::Error((Status::Forbidden, ())),
        }
    }
}

pub struct AdminGuard {
    pub auth: AuthGuard,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminGuard {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        match req.guard::<AuthGuard>().await {
            Outcome::Success(auth) if auth.role == Role::Admin => Outcome::Success(AdminGuard { auth }),
            Outcome::Success(_) => Outcome::Error((Status::Forbidden, ())),
            Outcome::Error(e) => Outcome::Error(e),
            Outcome::Forward(f) => Outcome::Forward(f),
        }
    }
}

/// The `X-VERIFY` checksum PhonePe sends with its callbacks.
pub struct PhonePeSignature(pub String);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for PhonePeSignature {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        match req.headers().get_one("X-VERIFY") {
            Some(value) if !value.is_empty() => Outcome::Success(PhonePeSignature(value.to_string())),
            _ => Outcome::Error((Status::BadRequest, ())),
        }
    }
}

/// === OpenAPI Integration ===
/// None of the guards contribute parameters to the generated docs.
macro_rules! no_openapi_input {
    ($($guard:ty),*) => {
        $(
            impl<'a> OpenApiFromRequest<'a> for $guard {
                fn from_request_input(
                    _gen: &mut OpenApiGenerator,
                    _name: String,
                    _required: bool,
                ) -> rocket_okapi::Result<RequestHeaderInput> {
                    Ok(RequestHeaderInput::None)
                }
            }
        )*
    };
}

no_openapi_input!(AuthGuard, EmployerGuard, AdminGuard, PhonePeSignature);
