pub mod auth;
pub mod child;
pub mod guidance;
pub mod report;
pub mod staff;
pub mod upload;
pub mod user;
pub mod visit;
