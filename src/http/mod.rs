//! HTTP client module with status classification and error handling.

mod client;

pub use client::{HttpClient, StatusError};
