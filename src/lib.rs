//! Client-side workflow controller for the Falcon call-analysis service.
//!
//! One [`session::SessionController`] walks a single asset through the
//! service: upload and job creation, periodic status polling with
//! human-readable progress, then collection of the generated artifacts.

pub mod api;
pub mod artifacts;
pub mod asset;
pub mod config;
pub mod poller;
pub mod session;
pub mod steps;
