//! Authenticated-user identity
//!
//! The streaming transport and history endpoints are addressed per user.
//! Identity resolution itself (sign-in, tokens) is an external concern;
//! this crate only asks "who is signed in right now".

use std::sync::Mutex;

/// Source of the authenticated user identity.
pub trait IdentitySource: Send + Sync {
    /// The resolved identity (an opaque address such as an email), or
    /// `None` when nobody is signed in.
    fn identity(&self) -> Option<String>;
}

/// Identity fixed at startup (config-driven), with interior mutability so
/// sign-out can clear it.
pub struct StaticIdentity {
    identity: Mutex<Option<String>>,
}

impl StaticIdentity {
    pub fn new(identity: Option<String>) -> Self {
        Self {
            identity: Mutex::new(identity),
        }
    }

    /// Drop the identity (sign-out).
    #[allow(dead_code)] // Sign-out hook for the app shell
    pub fn clear(&self) {
        *self.identity.lock().unwrap() = None;
    }
}

impl IdentitySource for StaticIdentity {
    fn identity(&self) -> Option<String> {
        self.identity.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_identity_resolves_and_clears() {
        let identity = StaticIdentity::new(Some("student@campus.edu".to_string()));
        assert_eq!(identity.identity().as_deref(), Some("student@campus.edu"));

        identity.clear();
        assert_eq!(identity.identity(), None);
    }
}
