//! HTTP service for the cask extension repository.
//!
//! This crate provides:
//! - Extension upload, signing and publication
//! - The update feed polled by browser clients
//! - Package downloads at their canonical URLs
//! - Health and Prometheus metrics endpoints

pub mod error;
pub mod feed;
pub mod handlers;
pub mod metrics;
pub mod publish;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use feed::UpdateFeedGenerator;
pub use publish::{PublishOutcome, Publisher};
pub use routes::create_router;
pub use state::AppState;
