//! Client side of the remote processing service.
//!
//! This module provides:
//! * [`ServiceApi`]: async trait with one method per service endpoint.
//! * [`HttpServiceClient`]: reqwest implementation driven by [`ServiceConfig`].
//! * Wire types: [`JobStatus`], [`JobState`], [`ProcessRequest`], [`TaskId`].
//! * [`ApiError`]: transport, status and parse failures.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use falcon_client::api::{HttpServiceClient, ServiceApi};
//! use falcon_client::config::AppConfig;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let api = HttpServiceClient::from_config(&config.service).unwrap();
//!
//!     api.health().await.unwrap();
//!     for file in api.list_outputs().await.unwrap() {
//!         println!("{file} -> {}", api.download_url(&file));
//!     }
//! }
//! ```
//!
//! [`ServiceConfig`]: crate::config::ServiceConfig

pub mod client;
pub mod http;
pub mod types;

#[cfg(test)]
pub mod mock;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use client::{ApiError, ServiceApi};
pub use http::HttpServiceClient;
pub use types::{JobState, JobStatus, ProcessRequest, TaskId};

#[cfg(test)]
pub use mock::MockServiceApi;
