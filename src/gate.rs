//! Route authorization gate. Pure decision function over a session snapshot;
//! no side effects, no I/O. Evaluation order is fixed: loading, then
//! authentication, then the custom predicate, then role membership. The first
//! failing check decides and later checks are never evaluated.

use crate::models::{Role, User};
use crate::roles::has_role;

/// Point-in-time view of session state, detached from the live manager so the
/// gate stays pure.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub is_authenticated: bool,
    pub is_loading: bool,
    pub user: Option<User>,
}

pub type GatePredicate<'a> = &'a (dyn Fn(&SessionSnapshot) -> bool + Send + Sync);

pub struct RouteGuard<'a> {
    /// Intended destination, carried on the login redirect so navigation can
    /// resume after authentication.
    pub intended: &'a str,
    pub require_auth: bool,
    pub required_role: Option<Role>,
    pub custom: Option<GatePredicate<'a>>,
}

impl<'a> RouteGuard<'a> {
    pub fn new(intended: &'a str) -> Self {
        Self { intended, require_auth: true, required_role: None, custom: None }
    }

    pub fn public(mut self) -> Self {
        self.require_auth = false;
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.required_role = Some(role);
        self
    }

    pub fn with_custom(mut self, predicate: GatePredicate<'a>) -> Self {
        self.custom = Some(predicate);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// Session state still loading; hold the navigation.
    Pending,
    /// Redirect to login, resuming at `intended` afterwards.
    DeniedUnauthenticated { intended: String },
    /// Authenticated but fails the role or custom check.
    DeniedForbidden,
    Allowed,
}

pub fn evaluate(snapshot: &SessionSnapshot, guard: &RouteGuard<'_>) -> Access {
    if snapshot.is_loading {
        return Access::Pending;
    }
    if guard.require_auth && !snapshot.is_authenticated {
        return Access::DeniedUnauthenticated { intended: guard.intended.to_string() };
    }
    if let Some(custom) = guard.custom {
        if !custom(snapshot) {
            return Access::DeniedForbidden;
        }
    }
    if let Some(role) = guard.required_role {
        let member = snapshot.user.as_ref().map(|u| has_role(&u.roles, role)).unwrap_or(false);
        if !member {
            return Access::DeniedForbidden;
        }
    }
    Access::Allowed
}
