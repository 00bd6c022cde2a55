/*
Session Port

The authentication/session collaborator supplies the bearer credential. Its absence is not an
error: every engine operation quietly declines to run without one.
*/

use std::fmt;

/// Bearer credential for the notification API
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for building the `Authorization` header
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Source of the current session credential
pub trait CredentialProvider: Send + Sync {
    /// The credential to use right now, or `None` when signed out
    fn credential(&self) -> Option<Credential>;
}
