//! Rendering of completed profiling sessions.
//!
//! Two outputs are produced from a [`Session`](tracelens_core::Session):
//!
//! - a bootstrap payload for the interactive results UI, listing the
//!   sessions the user has not seen yet ([`RenderCoordinator::render_includes`])
//! - a flat text report, HTML-escaped or plain ([`render_html`],
//!   [`render_plain_text`])
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use tracelens_render::{DisplayOptions, MemoryStorage, RenderCoordinator, RenderSettings, RequestContext};
//!
//! let storage = Arc::new(MemoryStorage::new());
//! let coordinator = RenderCoordinator::new(RenderSettings::new(storage));
//! let payload = coordinator.render_includes(Some(&session), &RequestContext::new("/"), &DisplayOptions::default())?;
//! println!("{}", coordinator.render_plain_text(Some(&session)));
//! ```

pub mod collaborators;
mod environment;
mod format;
mod includes;
mod storage;
mod text;

// Re-export public API
pub use collaborators::{
    ensure_trailing_slash, BasePathResolver, RequestContext, ResultsAuthorizer, SessionStorage,
    StaticBasePath,
};
pub use environment::{FixedEnvironment, ReportEnvironment, SystemEnvironment, FALLBACK_HOST_NAME};
pub use format::{escape_html, format_ms};
pub use includes::{
    DisplayOptions, IncludesPayload, RenderCoordinator, RenderPosition, RenderSettings,
    DEFAULT_ROUTE_BASE_PATH,
};
pub use storage::{MemoryStorage, StorageLimits};
pub use text::{render, render_html, render_plain_text, RenderMode, TextReport, DEPTH_MARKER};

pub use tracelens_core::parse_client_timings;
