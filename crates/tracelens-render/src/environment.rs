//! Clock and host identity for report headers.

use chrono::{DateTime, Utc};

/// Host name used when the system does not report one.
pub const FALLBACK_HOST_NAME: &str = "localhost";

/// Supplies the current UTC time and the machine name.
pub trait ReportEnvironment: Send + Sync {
    /// Current UTC time.
    fn now(&self) -> DateTime<Utc>;

    /// Name of the machine rendering the report.
    fn host_name(&self) -> String;
}

/// The real clock and the operating system's host name.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnvironment;

impl ReportEnvironment for SystemEnvironment {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn host_name(&self) -> String {
        sysinfo::System::host_name().unwrap_or_else(|| FALLBACK_HOST_NAME.to_string())
    }
}

/// A frozen clock and host, for reproducible output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedEnvironment {
    pub host: String,
    pub now: DateTime<Utc>,
}

impl FixedEnvironment {
    #[must_use]
    pub fn new(host: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            host: host.into(),
            now,
        }
    }
}

impl ReportEnvironment for FixedEnvironment {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn host_name(&self) -> String {
        self.host.clone()
    }
}
