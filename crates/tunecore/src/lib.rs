//! Tunecore: media acquisition and track identification engine.
//!
//! The library behind the Tunebot chat front-end: downloads media from
//! hostile, anti-bot-protected platforms through a data-driven retry engine,
//! normalizes it with FFmpeg, and identifies audio through a cascading
//! fingerprint → recognition API → catalog search chain.
//!
//! The chat protocol itself is not here; a delivery adapter calls
//! [`pipeline::Pipeline`] and renders what comes back.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, process execution, rate limiting, logging
//! - `download`: platform classification, size probing, the strategy engine,
//!   and the authenticated Instagram downloader
//! - `conversion`: FFmpeg transcoding (normalize, extract, compress)
//! - `identify`: the identification chain and its service clients
//! - `pipeline`: the inbound surface called by the delivery adapter

pub mod conversion;
pub mod core;
pub mod download;
pub mod identify;
pub mod pipeline;

// Re-export commonly used types for convenience
pub use crate::core::{config, AppError, AppResult, RateLimiter};
pub use download::{platform::Platform, DownloadRequest, DownloadResult, WorkDir};
pub use identify::{Identifier, IdentificationOutcome};
pub use pipeline::{LinkOutcome, Pipeline, SearchOutcome};
