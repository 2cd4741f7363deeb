pub mod activation;
pub mod auth;
pub mod catalog;
pub mod email;
pub mod error;
pub mod expiry;
pub mod gateway;
pub mod jwt;
pub mod ledger;
pub mod payments;
pub mod phonepe;
pub mod quota;
pub mod razorpay;

pub use activation::SubscriptionActivator;
pub use auth::{AuthService, Session};
pub use catalog::PlanCatalog;
pub use email::EmailService;
pub use error::{ErrorKind, ServiceError};
pub use expiry::ExpirySweeper;
pub use jwt::JwtService;
pub use ledger::OrderLedger;
pub use payments::{CallbackOutcome, Payments};
pub use phonepe::PhonePeService;
pub use quota::QuotaGate;
pub use razorpay::RazorpayService;
