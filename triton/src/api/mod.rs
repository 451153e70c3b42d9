//! CloudAPI client and typed domain accessors

pub mod account;
pub mod client;
pub mod compute;
pub mod error;
pub mod network;
pub mod services;
pub mod volumes;

pub use client::{Client, RetryConfig};
pub use error::ApiError;
