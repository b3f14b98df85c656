//! Bootstrap payload for the results UI.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracelens_core::{Result, Session};
use tracing::{debug, trace};
use uuid::Uuid;

use crate::collaborators::{
    ensure_trailing_slash, BasePathResolver, RequestContext, ResultsAuthorizer, SessionStorage,
    StaticBasePath,
};
use crate::environment::{ReportEnvironment, SystemEnvironment};
use crate::text::{render, RenderMode};

/// Base path the UI fetches results from unless configured otherwise.
pub const DEFAULT_ROUTE_BASE_PATH: &str = "/tracelens/";

/// Which corner of the page the results button sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RenderPosition {
    Left,
    Right,
    BottomLeft,
    BottomRight,
}

impl RenderPosition {
    /// Get a display name for this position.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::BottomLeft => "bottomLeft",
            Self::BottomRight => "bottomRight",
        }
    }
}

/// Display toggles forwarded to the UI.
///
/// Every field is optional; `None` lets the UI apply its own default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayOptions {
    /// Side of the page for the results button.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<RenderPosition>,
    /// Show trivial timings by default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_trivial: Option<bool>,
    /// Show the time-with-children column by default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_time_with_children: Option<bool>,
    /// Popups kept before the oldest is removed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_traces_to_show: Option<u32>,
    /// Show the minimize and clear buttons.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_controls: Option<bool>,
    /// Start with the results hidden.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_hidden: Option<bool>,
}

/// Everything the presentation layer needs to emit its includes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncludesPayload {
    /// Version of this crate, for cache busting.
    pub version: String,
    /// Base path for fetching session results, ending in `/`.
    pub path: String,
    /// The session being rendered.
    pub current_id: Uuid,
    /// Sessions to show, oldest first; always ends with `current_id`.
    pub ids: Vec<Uuid>,
    /// Whether the caller may see results beyond the current session.
    pub authorized: bool,
    #[serde(flatten)]
    pub display: DisplayOptions,
}

impl IncludesPayload {
    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Collaborators used to render sessions.
#[derive(Clone)]
pub struct RenderSettings {
    /// Results authorization; `None` authorizes everyone.
    pub authorizer: Option<Arc<dyn ResultsAuthorizer>>,
    /// Source of unviewed session ids.
    pub storage: Arc<dyn SessionStorage>,
    /// Where the UI fetches results from.
    pub base_path: Arc<dyn BasePathResolver>,
    /// Clock and host name for text reports.
    pub environment: Arc<dyn ReportEnvironment>,
}

impl RenderSettings {
    /// Settings with no authorization policy, the default base path and the
    /// system clock.
    #[must_use]
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            authorizer: None,
            storage,
            base_path: Arc::new(StaticBasePath(DEFAULT_ROUTE_BASE_PATH.to_string())),
            environment: Arc::new(SystemEnvironment),
        }
    }

    #[must_use]
    pub fn with_authorizer(mut self, authorizer: Arc<dyn ResultsAuthorizer>) -> Self {
        self.authorizer = Some(authorizer);
        self
    }

    #[must_use]
    pub fn with_base_path(mut self, base_path: Arc<dyn BasePathResolver>) -> Self {
        self.base_path = base_path;
        self
    }

    #[must_use]
    pub fn with_environment(mut self, environment: Arc<dyn ReportEnvironment>) -> Self {
        self.environment = environment;
        self
    }
}

/// Renders completed sessions for the presentation layer.
///
/// Holds no mutable state; share it freely between request handlers.
#[derive(Clone)]
pub struct RenderCoordinator {
    settings: RenderSettings,
}

impl RenderCoordinator {
    #[must_use]
    pub const fn new(settings: RenderSettings) -> Self {
        Self { settings }
    }

    #[must_use]
    pub const fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Whether `request` may see results beyond its own session.
    pub fn is_authorized(&self, request: &RequestContext) -> Result<bool> {
        self.settings
            .authorizer
            .as_ref()
            .map_or(Ok(true), |authorizer| authorizer.is_authorized(request))
    }

    /// Build the includes payload for `session`.
    ///
    /// Returns `Ok(None)` when there is no session. Collaborator errors are
    /// returned as is.
    pub fn render_includes(
        &self,
        session: Option<&Session>,
        request: &RequestContext,
        display: &DisplayOptions,
    ) -> Result<Option<IncludesPayload>> {
        let Some(session) = session else {
            trace!("No active session, nothing to include");
            return Ok(None);
        };

        let authorized = self.is_authorized(request)?;
        let current_id = session.id();

        let mut ids = if authorized {
            self.settings.storage.unviewed_ids(session.user())?
        } else {
            Vec::new()
        };
        // The current session has not been shown yet, so it always goes last.
        ids.retain(|id| *id != current_id);
        ids.push(current_id);

        let path = ensure_trailing_slash(&self.settings.base_path.resolve_base_path());

        debug!(
            session = %current_id,
            ids = ids.len(),
            authorized,
            "Built includes payload"
        );

        Ok(Some(IncludesPayload {
            version: env!("CARGO_PKG_VERSION").to_string(),
            path,
            current_id,
            ids,
            authorized,
            display: display.clone(),
        }))
    }

    /// HTML-escaped text report; `""` when there is no session.
    #[must_use]
    pub fn render_html(&self, session: Option<&Session>) -> String {
        render(session, RenderMode::Html, self.settings.environment.as_ref())
    }

    /// Plain-text report; `""` when there is no session.
    #[must_use]
    pub fn render_plain_text(&self, session: Option<&Session>) -> String {
        render(session, RenderMode::PlainText, self.settings.environment.as_ref())
    }
}
