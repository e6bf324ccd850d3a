//! Local identity resolution.

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use crate::state::presence::ANONYMOUS_NAME;

/// A signed-in user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: String,
    pub email: Option<String>,
    /// Profile display name
    pub username: Option<String>,
}

impl AuthenticatedUser {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            username: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }
}

/// Source of the currently signed-in user.
pub trait IdentityProvider {
    fn current_user(&self) -> Option<AuthenticatedUser>;
}

/// Provider with nobody signed in.
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

impl IdentityProvider for Anonymous {
    fn current_user(&self) -> Option<AuthenticatedUser> {
        None
    }
}

/// A fixed user, for hosts that resolved sign-in elsewhere.
impl IdentityProvider for AuthenticatedUser {
    fn current_user(&self) -> Option<AuthenticatedUser> {
        Some(self.clone())
    }
}

/// Presence key and display name of the local client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalIdentity {
    pub key: String,
    pub name: String,
    pub authenticated: bool,
}

impl LocalIdentity {
    /// Resolve the local identity at session start.
    ///
    /// Without a signed-in user the key is `anonymous-<millis>` taken from
    /// `started_at`.
    #[instrument(skip(provider))]
    pub fn resolve(provider: &dyn IdentityProvider, started_at: DateTime<Utc>) -> Self {
        let identity = match provider.current_user() {
            Some(user) => {
                let name = user
                    .username
                    .or(user.email)
                    .unwrap_or_else(|| ANONYMOUS_NAME.to_string());
                Self {
                    key: user.id,
                    name,
                    authenticated: true,
                }
            }
            None => Self {
                key: format!("anonymous-{}", started_at.timestamp_millis()),
                name: ANONYMOUS_NAME.to_string(),
                authenticated: false,
            },
        };

        debug!(key = %identity.key, authenticated = identity.authenticated, "Identity resolved");
        identity
    }
}
