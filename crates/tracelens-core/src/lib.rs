//! Data model for rendering completed profiling sessions.
//!
//! This crate provides the read-side types shared by the tracelens crates:
//! - [`Session`] and its [`Timing`] tree
//! - [`CustomTiming`] annotations and their per-category aggregation
//! - [`ClientTimings`] parsed from browser-submitted form fields
//! - Error types

pub mod client;
pub mod error;
pub mod session;
pub mod timing;

pub use client::{parse_client_timings, ClientFieldError, ClientTimingEntry, ClientTimings};
pub use error::{BoxError, Error, Result};
pub use session::Session;
pub use timing::{CustomTiming, CustomTimingGroup, CustomTimings, Timing, TimingIter};
