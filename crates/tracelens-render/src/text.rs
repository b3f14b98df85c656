//! Line-oriented text reports of a profiling session.
//!
//! Each timing becomes one line: `>` repeated once per level of depth, the
//! name, the duration, then one segment per custom timing category:
//!
//! ```text
//! web-01 at 2026-10-19T12:00:00Z
//! Request = 120.5ms
//! >Query = 45.25ms (sql = 45.25ms in 1 cmd)
//! ```

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use tracelens_core::{Session, Timing};

use crate::environment::{ReportEnvironment, SystemEnvironment};
use crate::format::{escape_html, format_ms};

/// Marker repeated once per level of depth.
pub const DEPTH_MARKER: char = '>';

/// How text in the report is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderMode {
    /// Names and host are HTML-escaped.
    Html,
    /// Text is written as is; suitable for logs and test output.
    PlainText,
}

/// A text report bound to a session, a host and a timestamp.
///
/// Formatting walks the tree with an explicit stack, so arbitrarily deep
/// sessions render without recursion.
#[derive(Debug, Clone)]
pub struct TextReport<'a> {
    session: &'a Session,
    mode: RenderMode,
    host: String,
    rendered_at: DateTime<Utc>,
}

impl<'a> TextReport<'a> {
    /// Capture host and time from `env` for a report on `session`.
    #[must_use]
    pub fn new(session: &'a Session, mode: RenderMode, env: &dyn ReportEnvironment) -> Self {
        Self {
            session,
            mode,
            host: env.host_name(),
            rendered_at: env.now(),
        }
    }

    fn write_text(&self, f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
        match self.mode {
            RenderMode::Html => f.write_str(&escape_html(text)),
            RenderMode::PlainText => f.write_str(text),
        }
    }

    fn write_timing(
        &self,
        f: &mut fmt::Formatter<'_>,
        depth: usize,
        timing: &Timing,
    ) -> fmt::Result {
        for _ in 0..depth {
            write!(f, "{DEPTH_MARKER}")?;
        }
        self.write_text(f, timing.name())?;
        write!(f, " = {}ms", format_ms(timing.duration_ms()))?;

        if timing.has_custom_timings() {
            for group in timing.custom_timing_groups() {
                f.write_str(" (")?;
                self.write_text(f, group.category)?;
                write!(
                    f,
                    " = {}ms in {} {})",
                    format_ms(group.total_ms),
                    group.count(),
                    group.unit()
                )?;
            }
        }
        writeln!(f)
    }
}

impl fmt::Display for TextReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_text(f, &self.host)?;
        f.write_str(" at ")?;
        self.write_text(
            f,
            &self.rendered_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        )?;
        writeln!(f)?;

        for (depth, timing) in self.session.timings() {
            self.write_timing(f, depth, timing)?;
        }
        Ok(())
    }
}

/// Render `session` in `mode`; an absent session renders as `""`.
#[must_use]
pub fn render(session: Option<&Session>, mode: RenderMode, env: &dyn ReportEnvironment) -> String {
    session.map_or_else(String::new, |session| {
        TextReport::new(session, mode, env).to_string()
    })
}

/// HTML-escaped report using the system clock and host name.
#[must_use]
pub fn render_html(session: Option<&Session>) -> String {
    render(session, RenderMode::Html, &SystemEnvironment)
}

/// Plain-text report using the system clock and host name.
#[must_use]
pub fn render_plain_text(session: Option<&Session>) -> String {
    render(session, RenderMode::PlainText, &SystemEnvironment)
}
