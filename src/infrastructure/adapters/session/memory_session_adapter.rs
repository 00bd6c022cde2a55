/*
Memory Session Adapter

Holds the bearer credential for the current session in memory. `login` and `logout` stand in
for the dashboard's authentication provider; the sync engine only ever reads through the
CredentialProvider port.
*/

use std::sync::{PoisonError, RwLock};

use crate::application::ports::output::session_port::{Credential, CredentialProvider};

#[derive(Debug, Default)]
pub struct SessionCredentials {
    current: RwLock<Option<Credential>>,
}

impl SessionCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        let session = Self::new();
        session.login(token);
        session
    }

    /// Installs a credential. Blank tokens count as signed out.
    pub fn login(&self, token: impl Into<String>) {
        let credential = Credential::new(token);
        let next = if credential.is_blank() { None } else { Some(credential) };
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = next;
    }

    pub fn logout(&self) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn is_signed_in(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl CredentialProvider for SessionCredentials {
    fn credential(&self) -> Option<Credential> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
