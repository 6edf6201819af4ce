#![forbid(unsafe_code)]

//! Error taxonomy.
//!
//! Only caller mistakes surface as errors. Lookups return `Option`,
//! persistence failures degrade to an empty snapshot, and id collisions
//! are regenerated internally; none of those produce a [`NavError`].

use std::fmt;

/// Errors surfaced to callers of the navigation API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavError {
    /// A push/replace targeted a fragment-bearing location while the
    /// platform cannot represent fragment-addressed states.
    UnsupportedHashState {
        /// The rejected target location as submitted.
        url: String,
    },
    /// A caller argument was out of range (e.g. `go(0)`).
    InvalidArgument(String),
}

impl fmt::Display for NavError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedHashState { url } => {
                write!(
                    f,
                    "fragment-addressed states are not supported in this environment: {url}"
                )
            }
            Self::InvalidArgument(detail) => write!(f, "invalid argument: {detail}"),
        }
    }
}

impl std::error::Error for NavError {}

/// Standard result type for the navigation API.
pub type Result<T> = std::result::Result<T, NavError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_offending_url() {
        let err = NavError::UnsupportedHashState {
            url: "/page#section".to_owned(),
        };
        assert!(err.to_string().contains("/page#section"));
    }

    #[test]
    fn invalid_argument_carries_detail() {
        let err = NavError::InvalidArgument("go(0)".to_owned());
        assert!(err.to_string().contains("go(0)"));
    }
}
