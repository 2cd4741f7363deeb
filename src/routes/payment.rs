use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use crate::guards::{AuthGuard, PhonePeSignature};
use crate::models::{
    CancelOrderDto, OrderResponse, PhonePeCallbackDto, PhonePeCheckoutDto, Role,
    SubscriptionResponse, VerifyRazorpayPaymentDto,
};
use crate::services::{CallbackOutcome, Payments};
use crate::utils::{ApiError, ApiResponse};

/// Employer admins manage the employer's jobs but the subscription belongs to the employer.
fn ensure_purchaser(auth: &AuthGuard) -> Result<(), ApiError> {
    if auth.role == Role::EmployerAdmin {
        return Err(ApiError::forbidden("Employer admins cannot purchase plans"));
    }
    Ok(())
}

/// --------------------
/// Razorpay checkout
/// --------------------
#[openapi(tag = "Payments")]
#[post("/payments/razorpay/checkout/<plan_id>")]
pub async fn razorpay_checkout(
    payments: &State<Payments>,
    auth: AuthGuard,
    plan_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    if !crate::config::Config::is_razorpay_enabled() {
        return Err(ApiError::service_unavailable("Razorpay is not configured"));
    }
    ensure_purchaser(&auth)?;

    let session = payments.start_razorpay(&auth.account_id, &plan_id).await?;
    Ok(Json(ApiResponse::success(serde_json::json!({
        "razorpay_key_id": crate::config::Config::razorpay_key_id(),
        "order": OrderResponse::from(session.order),
    }))))
}

/// --------------------
/// Razorpay verification
/// --------------------
#[openapi(tag = "Payments")]
#[post("/payments/razorpay/verify", data = "<dto>")]
pub async fn razorpay_verify(
    payments: &State<Payments>,
    auth: AuthGuard,
    dto: Json<VerifyRazorpayPaymentDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let activation = payments
        .confirm_razorpay(
            &auth.account_id,
            &dto.razorpay_order_id,
            &dto.razorpay_payment_id,
            &dto.razorpay_signature,
        )
        .await?;

    let message = if activation.is_new() {
        "Subscription activated"
    } else {
        "Payment already processed"
    };
    Ok(Json(ApiResponse::success_with_message(
        message.to_string(),
        serde_json::json!({
            "subscription": SubscriptionResponse::from(activation.into_record()),
        }),
    )))
}

/// --------------------
/// PhonePe checkout
/// --------------------
#[openapi(tag = "Payments")]
#[post("/payments/phonepe/checkout/<plan_id>", data = "<dto>")]
pub async fn phonepe_checkout(
    payments: &State<Payments>,
    auth: AuthGuard,
    plan_id: String,
    dto: Option<Json<PhonePeCheckoutDto>>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    if !crate::config::Config::is_phonepe_enabled() {
        return Err(ApiError::service_unavailable("PhonePe is not configured"));
    }
    ensure_purchaser(&auth)?;

    let transaction_id = dto.map(|d| d.into_inner()).unwrap_or_default().transaction_id;
    let session = payments
        .start_phonepe(&auth.account_id, &plan_id, transaction_id)
        .await?;
    Ok(Json(ApiResponse::success(serde_json::json!({
        "redirect_url": session.redirect_url,
        "order": OrderResponse::from(session.order),
    }))))
}

/// --------------------
/// PhonePe server callback
/// --------------------
#[openapi(tag = "Payments")]
#[post("/payments/phonepe/callback", data = "<dto>")]
pub async fn phonepe_callback(
    payments: &State<Payments>,
    signature: PhonePeSignature,
    dto: Json<PhonePeCallbackDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let outcome = payments
        .handle_phonepe_callback(&dto.response, &signature.0)
        .await?;

    let body = match outcome {
        CallbackOutcome::Activated(activation) => serde_json::json!({
            "status": "paid",
            "subscription": SubscriptionResponse::from(activation.into_record()),
        }),
        CallbackOutcome::Pending(order) => serde_json::json!({
            "status": order.status.as_str(),
        }),
        CallbackOutcome::Failed(order) => serde_json::json!({
            "status": order.status.as_str(),
            "reason": order.failure_reason,
        }),
    };
    Ok(Json(ApiResponse::success(body)))
}

#[openapi(tag = "Payments")]
#[get("/payments/orders/<order_id>")]
pub async fn get_order(
    payments: &State<Payments>,
    auth: AuthGuard,
    order_id: String,
) -> Result<Json<ApiResponse<OrderResponse>>, ApiError> {
    let order = payments.order_for(&auth.account_id, &order_id).await?;
    Ok(Json(ApiResponse::success(OrderResponse::from(order))))
}

#[openapi(tag = "Payments")]
#[post("/payments/orders/<order_id>/cancel", data = "<dto>")]
pub async fn cancel_order(
    payments: &State<Payments>,
    auth: AuthGuard,
    order_id: String,
    dto: Option<Json<CancelOrderDto>>,
) -> Result<Json<ApiResponse<OrderResponse>>, ApiError> {
    let reason = dto
        .and_then(|d| d.into_inner().reason)
        .unwrap_or_else(|| "Cancelled by user".to_string());
    let order = payments.cancel(&auth.account_id, &order_id, &reason).await?;
    Ok(Json(ApiResponse::success(OrderResponse::from(order))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::oid::ObjectId;
    use rocket::http::Status;

    fn guard(role: Role) -> AuthGuard {
        AuthGuard { account_id: ObjectId::new(), role }
    }

    #[test]
    fn employer_admins_are_forbidden_from_checkout() {
        let err = ensure_purchaser(&guard(Role::EmployerAdmin)).unwrap_err();
        assert_eq!(err.status, Status::Forbidden);

        assert!(ensure_purchaser(&guard(Role::Employer)).is_ok());
        assert!(ensure_purchaser(&guard(Role::Employee)).is_ok());
    }
}
