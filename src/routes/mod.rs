pub mod admin;
pub mod auth;
pub mod job;
pub mod payment;
pub mod plan;
pub mod subscription;
