//! Core utilities: configuration, errors, process execution, rate limiting,
//! and logging setup.

pub mod config;
pub mod error;
pub mod logging;
pub mod process;
pub mod rate_limiter;

pub use error::{AppError, AppResult};
pub use rate_limiter::RateLimiter;
