//! Access Guard
//!
//! Per-route authorization. Everything here is synchronous and computed from
//! already-fetched session data.

use edu_common::{Role, TenantId, User};
use serde::Serialize;

use crate::error::AccessError;
use crate::portal::Portal;

/// Result of identity resolution.
///
/// Three-valued on purpose: treating `Loading` as `Anonymous` produces
/// spurious login redirects.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// "Who am I" still in flight
    #[default]
    Loading,
    /// No valid session
    Anonymous,
    /// Identity resolved
    Authenticated(User),
}

impl SessionState {
    /// Authenticated user, if any
    pub fn user(&self) -> Option<&User> {
        match self {
            Self::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    /// Whether identity resolution is still pending
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

/// Route decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Identity still resolving, show a loading state
    Defer,
    /// Render the route
    Render,
    /// Send to the login page
    RedirectToLogin,
    /// Send to the user's home
    RedirectToHome,
}

/// Decide whether `session` may reach `route`.
///
/// Admin bypasses role checks. An empty `allowed_roles` means the route only
/// requires authentication.
pub fn authorize_route(session: &SessionState, route: &str, allowed_roles: &[Role]) -> Decision {
    let user = match session {
        SessionState::Loading => return Decision::Defer,
        SessionState::Anonymous => return Decision::RedirectToLogin,
        SessionState::Authenticated(user) => user,
    };

    if user.is_admin() || allowed_roles.is_empty() || allowed_roles.contains(&user.role) {
        return Decision::Render;
    }

    tracing::debug!(route, role = %user.role, "route not allowed for role");
    Decision::RedirectToHome
}

/// Server-side form of [`authorize_route`]: yields the user or an error.
///
/// There is no loading state on the server, so `Loading` counts as
/// unauthenticated.
pub fn require_role<'a>(session: &'a SessionState, allowed_roles: &[Role]) -> Result<&'a User, AccessError> {
    match (authorize_route(session, "", allowed_roles), session.user()) {
        (Decision::Render, Some(user)) => Ok(user),
        (Decision::RedirectToHome, Some(user)) => Err(AccessError::Forbidden { role: user.role }),
        _ => Err(AccessError::Unauthenticated),
    }
}

/// Reject access to data owned by another tenant.
///
/// Applies to admins too: an admin's reach ends at its own tenant.
pub fn authorize_tenant(user: &User, resource_tenant: TenantId) -> Result<(), AccessError> {
    if user.tenant_id == resource_tenant {
        return Ok(());
    }

    tracing::warn!(
        user_id = %user.id,
        user_tenant = %user.tenant_id,
        resource_tenant = %resource_tenant,
        "cross-tenant access attempt"
    );
    Err(AccessError::CrossTenant {
        user_tenant: user.tenant_id,
        resource_tenant,
    })
}

/// Navigation correction: redirect to `/` when the path wandered outside the
/// current portal. Advisory only, never an access control.
pub fn navigation_correction(current_portal: Option<&Portal>, path: &str) -> Option<&'static str> {
    let portal = current_portal?;
    if path == "/" || portal.owns_path(path) {
        None
    } else {
        Some("/")
    }
}

/// Allowed roles for every route under `prefix`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRule {
    /// Path prefix (segment aligned)
    pub prefix: &'static str,
    /// Roles allowed; empty means any authenticated user
    pub allowed: &'static [Role],
}

/// Static route → roles table
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl RouteTable {
    /// Build from rules
    pub fn new(rules: Vec<RouteRule>) -> Self {
        Self { rules }
    }

    /// Table matching the portal catalog: each portal's base route needs its role
    pub fn from_portals(portals: &[Portal]) -> Self {
        let rules = portals
            .iter()
            .map(|p| RouteRule {
                prefix: p.base_route,
                allowed: role_slice(p.required_role),
            })
            .collect();
        Self { rules }
    }

    /// Add a rule
    pub fn with_rule(mut self, prefix: &'static str, allowed: &'static [Role]) -> Self {
        self.rules.push(RouteRule { prefix, allowed });
        self
    }

    /// Roles for `path`, longest matching prefix wins
    pub fn allowed_roles_for(&self, path: &str) -> &'static [Role] {
        self.rules
            .iter()
            .filter(|r| {
                path == r.prefix
                    || path
                        .strip_prefix(r.prefix)
                        .is_some_and(|rest| rest.starts_with('/') || r.prefix.ends_with('/'))
            })
            .max_by_key(|r| r.prefix.len())
            .map(|r| r.allowed)
            .unwrap_or(&[])
    }

    /// Decide for a concrete path
    pub fn authorize(&self, session: &SessionState, path: &str) -> Decision {
        authorize_route(session, path, self.allowed_roles_for(path))
    }
}

fn role_slice(role: Role) -> &'static [Role] {
    match role {
        Role::Admin => &[Role::Admin],
        Role::Student => &[Role::Student],
        Role::Teacher => &[Role::Teacher],
        Role::Hub => &[Role::Hub],
        Role::Partner => &[Role::Partner],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portal::PORTALS;
    use proptest::prelude::*;
    use uuid::Uuid;

    fn session(role: Role) -> SessionState {
        SessionState::Authenticated(User::new(role, Uuid::new_v4()))
    }

    fn role_strategy() -> impl Strategy<Value = Role> {
        prop::sample::select(Role::ALL.to_vec())
    }

    fn roles_strategy() -> impl Strategy<Value = Vec<Role>> {
        prop::collection::vec(role_strategy(), 0..=5)
    }

    proptest! {
        #[test]
        fn prop_render_iff_admin_or_open_or_member(role in role_strategy(), allowed in roles_strategy()) {
            let decision = authorize_route(&session(role), "/any", &allowed);
            let expected = role == Role::Admin || allowed.is_empty() || allowed.contains(&role);
            if expected {
                prop_assert_eq!(decision, Decision::Render);
            } else {
                prop_assert_eq!(decision, Decision::RedirectToHome);
            }
        }

        #[test]
        fn prop_anonymous_always_login(allowed in roles_strategy()) {
            prop_assert_eq!(
                authorize_route(&SessionState::Anonymous, "/any", &allowed),
                Decision::RedirectToLogin
            );
        }

        #[test]
        fn prop_loading_always_defers(allowed in roles_strategy()) {
            prop_assert_eq!(
                authorize_route(&SessionState::Loading, "/any", &allowed),
                Decision::Defer
            );
        }
    }

    #[test]
    fn test_require_role() {
        let hub = session(Role::Hub);
        assert!(require_role(&hub, &Role::OPERATORS).is_ok());
        assert_eq!(
            require_role(&session(Role::Student), &Role::OPERATORS),
            Err(AccessError::Forbidden { role: Role::Student })
        );
        assert_eq!(
            require_role(&SessionState::Loading, &[]),
            Err(AccessError::Unauthenticated)
        );
        assert_eq!(
            require_role(&SessionState::Anonymous, &[]),
            Err(AccessError::Unauthenticated)
        );
    }

    #[test]
    fn test_tenant_isolation() {
        let admin = User::new(Role::Admin, Uuid::new_v4());
        assert!(authorize_tenant(&admin, admin.tenant_id).is_ok());
        assert!(matches!(
            authorize_tenant(&admin, Uuid::new_v4()),
            Err(AccessError::CrossTenant { .. })
        ));
    }

    #[test]
    fn test_navigation_correction() {
        let teacher = &PORTALS[2];
        assert_eq!(navigation_correction(Some(teacher), "/teacher/classes"), None);
        assert_eq!(navigation_correction(Some(teacher), "/"), None);
        assert_eq!(navigation_correction(Some(teacher), "/admin/users"), Some("/"));
        assert_eq!(navigation_correction(None, "/admin/users"), None);
    }

    #[test]
    fn test_route_table_longest_prefix() {
        let table = RouteTable::from_portals(&PORTALS)
            .with_rule("/admin/reports", &[Role::Admin, Role::Partner]);

        assert_eq!(table.allowed_roles_for("/admin/users"), &[Role::Admin]);
        assert_eq!(
            table.allowed_roles_for("/admin/reports/monthly"),
            &[Role::Admin, Role::Partner]
        );
        assert!(table.allowed_roles_for("/profile").is_empty());

        assert_eq!(
            table.authorize(&session(Role::Partner), "/admin/reports"),
            Decision::Render
        );
        assert_eq!(
            table.authorize(&session(Role::Partner), "/admin/users"),
            Decision::RedirectToHome
        );
        assert_eq!(table.authorize(&session(Role::Student), "/profile"), Decision::Render);
    }
}
