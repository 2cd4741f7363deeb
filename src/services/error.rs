use crate::models::OrderStatus;
use crate::store::StoreError;

/// Coarse classes callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unauthorized,
    NotFound,
    Conflict,
    Validation,
    ExternalService,
    Unexpected,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Order {0} not found")]
    OrderNotFound(String),

    #[error("Plan {0} not found")]
    PlanNotFound(String),

    #[error("Account {0} not found")]
    SubjectNotFound(String),

    #[error("Job {0} not found")]
    JobNotFound(String),

    #[error("An order with transaction id {0} already exists")]
    DuplicateOrder(String),

    #[error("Order {order_id} is {} and cannot change", .status.as_str())]
    InvalidOrderState { order_id: String, status: OrderStatus },

    #[error("Only one job can be active without a subscription")]
    SingleActiveJobLimit,

    #[error("No active job postings left on this account")]
    QuotaExhausted,

    #[error("Plan {0} cannot be purchased")]
    InvalidPlanForPayment(String),

    #[error("{0}")]
    Validation(String),

    #[error("Invalid payment signature")]
    SignatureMismatch,

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Could not allocate a unique card number after {0} attempts")]
    CardNumberExhausted(u32),

    #[error("Subscription changed concurrently, please retry")]
    ConcurrentUpdate,

    #[error("Invalid or expired OTP")]
    InvalidOtp,

    #[error("Too many wrong attempts, request a new OTP")]
    OtpAttemptsExceeded,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Could not deliver notification: {0}")]
    Notification(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::InvalidOtp | ServiceError::InvalidToken => ErrorKind::Unauthorized,
            ServiceError::OrderNotFound(_)
            | ServiceError::PlanNotFound(_)
            | ServiceError::SubjectNotFound(_)
            | ServiceError::JobNotFound(_) => ErrorKind::NotFound,
            ServiceError::DuplicateOrder(_)
            | ServiceError::InvalidOrderState { .. }
            | ServiceError::SingleActiveJobLimit
            | ServiceError::QuotaExhausted
            | ServiceError::ConcurrentUpdate
            | ServiceError::OtpAttemptsExceeded => ErrorKind::Conflict,
            ServiceError::InvalidPlanForPayment(_) | ServiceError::Validation(_) => {
                ErrorKind::Validation
            }
            ServiceError::SignatureMismatch
            | ServiceError::Gateway(_)
            | ServiceError::CardNumberExhausted(_)
            | ServiceError::Notification(_) => ErrorKind::ExternalService,
            ServiceError::Store(_) => ErrorKind::Unexpected,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation(message.into())
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
