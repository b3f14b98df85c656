//! Interfaces to the authorization, storage and routing collaborators.

use std::net::IpAddr;

use tracelens_core::Result;
use uuid::Uuid;

/// The parts of an incoming request an authorization policy may inspect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Request path.
    pub path: String,
    /// Authenticated user, if any.
    pub user: Option<String>,
    /// Client address.
    pub remote_addr: Option<IpAddr>,
}

impl RequestContext {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    #[must_use]
    pub fn with_remote_addr(mut self, addr: IpAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }
}

/// Decides whether a caller may see profiling results beyond the current one.
pub trait ResultsAuthorizer: Send + Sync {
    fn is_authorized(&self, request: &RequestContext) -> Result<bool>;
}

impl<F> ResultsAuthorizer for F
where
    F: Fn(&RequestContext) -> Result<bool> + Send + Sync,
{
    fn is_authorized(&self, request: &RequestContext) -> Result<bool> {
        self(request)
    }
}

/// Source of the sessions a user has not been shown yet.
///
/// Implementations own the "viewed" bookkeeping and must keep it consistent
/// under concurrent renders for the same user.
pub trait SessionStorage: Send + Sync {
    /// Unviewed session ids for `user` (`None` = anonymous), oldest first.
    fn unviewed_ids(&self, user: Option<&str>) -> Result<Vec<Uuid>>;
}

/// Resolves the base path the UI fetches session data from.
pub trait BasePathResolver: Send + Sync {
    fn resolve_base_path(&self) -> String;
}

/// A base path fixed at configuration time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticBasePath(pub String);

impl BasePathResolver for StaticBasePath {
    fn resolve_base_path(&self) -> String {
        self.0.clone()
    }
}

/// Normalize `path` to end in exactly one `/`.
#[must_use]
pub fn ensure_trailing_slash(path: &str) -> String {
    let mut normalized = path.trim_end_matches('/').to_string();
    normalized.push('/');
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_normalized() {
        assert_eq!(ensure_trailing_slash("/profiler"), "/profiler/");
        assert_eq!(ensure_trailing_slash("/profiler/"), "/profiler/");
        assert_eq!(ensure_trailing_slash("/profiler///"), "/profiler/");
        assert_eq!(ensure_trailing_slash(""), "/");
        assert_eq!(ensure_trailing_slash("/"), "/");
    }

    #[test]
    fn closures_are_authorizers() {
        let admins_only = |request: &RequestContext| -> Result<bool> {
            Ok(request.user.as_deref() == Some("admin"))
        };
        assert!(admins_only
            .is_authorized(&RequestContext::new("/").with_user("admin"))
            .unwrap());
        assert!(!admins_only.is_authorized(&RequestContext::new("/")).unwrap());
    }
}
