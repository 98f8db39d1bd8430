//! Caller identity resolution.
//!
//! Authentication mechanics live outside this crate. The engine only ever
//! sees a [`Caller`]: either an anonymous request or a verified user id
//! produced by an [`IdentityProvider`]. Read operations degrade to empty
//! results for anonymous callers; write operations reject them.

use std::collections::HashMap;

/// Unique identifier for a user, assigned by the identity collaborator.
pub type UserId = String;

/// Resolved request identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    /// No verified identity.
    Anonymous,
    /// Verified identity resolved to exactly one user.
    User(UserId),
}

impl Caller {
    /// The user id, if authenticated.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Caller::Anonymous => None,
            Caller::User(id) => Some(id),
        }
    }
}

/// External identity collaborator: maps an opaque credential to a caller.
pub trait IdentityProvider {
    fn resolve(&self, credential: &str) -> Caller;
}

/// Identity provider backed by a static credential table.
///
/// Serves the CLI and tests; a hosted deployment would plug in a real
/// provider behind the same trait.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    users: HashMap<String, UserId>,
}

impl StaticIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a credential -> user mapping.
    pub fn register(&mut self, credential: impl Into<String>, user_id: impl Into<UserId>) {
        self.users.insert(credential.into(), user_id.into());
    }
}

impl IdentityProvider for StaticIdentity {
    fn resolve(&self, credential: &str) -> Caller {
        match self.users.get(credential) {
            Some(id) => Caller::User(id.clone()),
            None => Caller::Anonymous,
        }
    }
}
