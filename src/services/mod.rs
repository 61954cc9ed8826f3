pub mod auth;
pub mod children;
pub mod email;
pub mod guidance;
pub mod metrics;
pub mod parents;
pub mod reports;
pub mod staff;
pub mod storage;
pub mod uploads;
pub mod visits;
