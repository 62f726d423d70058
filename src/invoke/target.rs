//! Addressing a function through a request URI.
//!
//! The host names the function and the optional user-info names the
//! qualifier: `fn://live@my-function/path?query`.

use crate::error::TripError;
use http::uri::{Authority, PathAndQuery, Scheme};
use http::Uri;

/// Scheme used by URIs the proxy builds.
pub const TARGET_SCHEME: &str = "fn";

/// The function a request is addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub function_name: String,
    pub qualifier: Option<String>,
}

impl Target {
    /// Create a target for an unqualified function.
    pub fn new(function_name: impl Into<String>) -> Self {
        Self {
            function_name: function_name.into(),
            qualifier: None,
        }
    }

    /// Select an alias or version.
    pub fn qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    /// Read the target out of a request URI.
    pub fn from_uri(uri: &Uri) -> Result<Self, TripError> {
        let authority = uri
            .authority()
            .ok_or_else(|| TripError::encoding(format!("no function named in {}", uri)))?;

        let (qualifier, host) = match authority.as_str().rsplit_once('@') {
            Some((user_info, _)) => {
                // Only the user name part selects the qualifier.
                let user = user_info.split(':').next().unwrap_or("");
                let qualifier = (!user.is_empty()).then(|| user.to_string());
                (qualifier, authority.host())
            }
            None => (None, authority.host()),
        };

        if host.is_empty() {
            return Err(TripError::encoding(format!("no function named in {}", uri)));
        }

        Ok(Self {
            function_name: host.to_string(),
            qualifier,
        })
    }

    /// Build a URI addressing this target with the given path and query.
    pub fn uri(&self, path_and_query: Option<&PathAndQuery>) -> Result<Uri, TripError> {
        let authority = match &self.qualifier {
            Some(q) => format!("{}@{}", q, self.function_name),
            None => self.function_name.clone(),
        };
        let authority = Authority::try_from(authority.as_str())
            .map_err(|e| TripError::encoding(format!("invalid function target: {}", e)))?;
        let scheme = Scheme::try_from(TARGET_SCHEME)
            .map_err(|e| TripError::encoding(e.to_string()))?;

        Uri::builder()
            .scheme(scheme)
            .authority(authority)
            .path_and_query(path_and_query.map(|p| p.as_str()).unwrap_or("/"))
            .build()
            .map_err(|e| TripError::encoding(format!("invalid function target: {}", e)))
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.qualifier {
            Some(q) => write!(f, "{}:{}", self.function_name, q),
            None => write!(f, "{}", self.function_name),
        }
    }
}
