pub mod response;
pub mod time;
pub mod validation;

pub use response::{ApiError, ApiResponse};
pub use validation::{generate_otp, validate_email, validate_slug};
