//! Remote progress service client
//!
//! The [`ProgressClient`] trait is the one seam the rest of the crate
//! talks to; [`HttpProgressClient`] implements it over the service's
//! HTTP surface and [`CachedProgress`] layers the response cache on top
//! of any implementation.

mod cached;
pub mod client;
mod error;
mod http;
mod types;

pub use cached::CachedProgress;
pub use client::ProgressClient;
pub use error::RemoteError;
pub use http::HttpProgressClient;
pub use types::BulkOutcome;
