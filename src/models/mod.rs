pub mod user;
pub mod otp;
pub mod job;
pub mod plan;
pub mod order;
pub mod subscription;

pub use user::*;
pub use otp::*;
pub use job::*;
pub use plan::*;
pub use order::*;
pub use subscription::*;
