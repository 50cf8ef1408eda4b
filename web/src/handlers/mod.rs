//! HTTP request handlers.

pub mod health;
pub mod mvc;

pub use health::health_check;
pub use mvc::dispatch;
