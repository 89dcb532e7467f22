//! Upstream access: rate limiting and the authenticated API client.
//!
//! This module provides:
//! - A flat-gap rate limiter shared by every outbound call
//! - The football-data client with quota tracking and typed errors
//! - The [`UpstreamSource`] seam used by the scheduler

mod client;
mod rate_limiter;

pub use client::{ClientOptions, DynUpstreamSource, QuotaState, UpstreamClient, UpstreamSource};
pub use rate_limiter::RateLimiter;
