//! Session-scoped authorization context
//!
//! Holds the resolved session and the current portal selection, passed
//! explicitly to whoever needs an authorization decision.

use edu_common::{Role, User, UserId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::AccessError;
use crate::guard::{authorize_route, navigation_correction, Decision, RouteTable, SessionState};
use crate::portal::{Portal, PortalId, PortalRegistry};

/// Where the last selected portal is remembered between reloads.
///
/// Advisory only: a stored id is re-validated against the user's entitlements
/// before it is used.
pub trait PortalPreferenceStore: Send + Sync {
    /// Last selection for this user
    fn load(&self, user_id: UserId) -> Option<PortalId>;
    /// Remember a selection
    fn save(&self, user_id: UserId, portal: PortalId);
    /// Forget the selection (logout)
    fn clear(&self, user_id: UserId);
}

/// Process-local preference store
#[derive(Debug, Default, Clone)]
pub struct InMemoryPortalPreferences {
    entries: Arc<RwLock<HashMap<UserId, PortalId>>>,
}

impl InMemoryPortalPreferences {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl PortalPreferenceStore for InMemoryPortalPreferences {
    fn load(&self, user_id: UserId) -> Option<PortalId> {
        self.entries.read().get(&user_id).copied()
    }

    fn save(&self, user_id: UserId, portal: PortalId) {
        self.entries.write().insert(user_id, portal);
    }

    fn clear(&self, user_id: UserId) {
        self.entries.write().remove(&user_id);
    }
}

/// Authorization context for one session
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    session: SessionState,
    current_portal: Option<Portal>,
}

impl AuthContext {
    /// Context with identity still resolving
    pub fn loading() -> Self {
        Self::default()
    }

    /// Context for a resolved session, no portal selected yet
    pub fn new(session: SessionState) -> Self {
        Self {
            session,
            current_portal: None,
        }
    }

    /// Session state
    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Authenticated user, if any
    pub fn user(&self) -> Option<&User> {
        self.session.user()
    }

    /// Currently selected portal
    pub fn current_portal(&self) -> Option<&Portal> {
        self.current_portal.as_ref()
    }

    /// Replace the session (login, logout, identity refresh).
    ///
    /// The portal selection survives only if the new user is still entitled to it.
    pub fn set_session(&mut self, registry: &PortalRegistry, session: SessionState) {
        self.session = session;
        let keep = match (self.session.user(), self.current_portal) {
            (Some(user), Some(portal)) => registry.select_portal(user, portal.id).is_ok(),
            _ => false,
        };
        if !keep {
            self.current_portal = None;
        }
    }

    /// Portals available in this session
    pub fn available_portals(&self, registry: &PortalRegistry) -> Result<Vec<Portal>, AccessError> {
        let user = self.user().ok_or(AccessError::Unauthenticated)?;
        registry.resolve_available_portals(user)
    }

    /// Select a portal. On error nothing changes.
    pub fn select_portal(
        &mut self,
        registry: &PortalRegistry,
        store: &dyn PortalPreferenceStore,
        requested: PortalId,
    ) -> Result<Portal, AccessError> {
        let user = self.user().ok_or(AccessError::Unauthenticated)?;
        let portal = registry.select_portal(user, requested)?;
        self.remember(store, portal)
    }

    /// [`AuthContext::select_portal`] for a portal id as sent by a client
    pub fn select_portal_by_name(
        &mut self,
        registry: &PortalRegistry,
        store: &dyn PortalPreferenceStore,
        requested: &str,
    ) -> Result<Portal, AccessError> {
        let user = self.user().ok_or(AccessError::Unauthenticated)?;
        let portal = registry.select_portal_by_name(user, requested)?;
        self.remember(store, portal)
    }

    fn remember(&mut self, store: &dyn PortalPreferenceStore, portal: Portal) -> Result<Portal, AccessError> {
        let user = self.user().ok_or(AccessError::Unauthenticated)?;
        store.save(user.id, portal.id);
        self.current_portal = Some(portal);
        Ok(portal)
    }

    /// Restore the remembered portal, or default to the first entitled one
    pub fn restore_portal(
        &mut self,
        registry: &PortalRegistry,
        store: &dyn PortalPreferenceStore,
    ) -> Result<Portal, AccessError> {
        let user = self.user().ok_or(AccessError::Unauthenticated)?;
        let remembered = store
            .load(user.id)
            .and_then(|id| registry.select_portal(user, id).ok());

        let portal = match remembered {
            Some(portal) => portal,
            None => {
                let available = registry.resolve_available_portals(user)?;
                *home_portal(user, &available).ok_or(AccessError::NoPortalForRole(user.role))?
            }
        };

        self.current_portal = Some(portal);
        Ok(portal)
    }

    /// Route decision for this session
    pub fn authorize(&self, route: &str, allowed_roles: &[Role]) -> Decision {
        authorize_route(&self.session, route, allowed_roles)
    }

    /// Route decision for a concrete path, roles looked up in `routes`
    pub fn authorize_path(&self, routes: &RouteTable, path: &str) -> Decision {
        routes.authorize(&self.session, path)
    }

    /// Advisory redirect when the path left the current portal
    pub fn navigation_correction(&self, path: &str) -> Option<&'static str> {
        navigation_correction(self.current_portal.as_ref(), path)
    }
}

/// The portal matching the user's own role, else the first available
fn home_portal<'a>(user: &User, available: &'a [Portal]) -> Option<&'a Portal> {
    available
        .iter()
        .find(|p| p.required_role == user.role)
        .or_else(|| available.first())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn ctx(role: Role) -> AuthContext {
        AuthContext::new(SessionState::Authenticated(User::new(role, Uuid::new_v4())))
    }

    #[test]
    fn test_select_persists_preference() {
        let registry = PortalRegistry::default();
        let store = InMemoryPortalPreferences::new();
        let mut context = ctx(Role::Admin);

        let portal = context.select_portal(&registry, &store, PortalId::Partner).unwrap();
        assert_eq!(portal.id, PortalId::Partner);
        assert_eq!(store.load(context.user().unwrap().id), Some(PortalId::Partner));
    }

    #[test]
    fn test_rejected_selection_changes_nothing() {
        let registry = PortalRegistry::default();
        let store = InMemoryPortalPreferences::new();
        let mut context = ctx(Role::Student);
        context.select_portal(&registry, &store, PortalId::Student).unwrap();

        let err = context.select_portal(&registry, &store, PortalId::Admin);
        assert!(matches!(err, Err(AccessError::PortalNotAvailable { .. })));
        assert_eq!(context.current_portal().unwrap().id, PortalId::Student);
        assert_eq!(store.load(context.user().unwrap().id), Some(PortalId::Student));
    }

    #[test]
    fn test_restore_ignores_stale_preference() {
        let registry = PortalRegistry::default();
        let store = InMemoryPortalPreferences::new();
        let mut context = ctx(Role::Teacher);
        store.save(context.user().unwrap().id, PortalId::Admin);

        let portal = context.restore_portal(&registry, &store).unwrap();
        assert_eq!(portal.id, PortalId::Teacher);
    }

    #[test]
    fn test_restore_admin_prefers_remembered() {
        let registry = PortalRegistry::default();
        let store = InMemoryPortalPreferences::new();
        let mut context = ctx(Role::Admin);
        assert_eq!(context.restore_portal(&registry, &store).unwrap().id, PortalId::Admin);

        store.save(context.user().unwrap().id, PortalId::Hub);
        assert_eq!(context.restore_portal(&registry, &store).unwrap().id, PortalId::Hub);
    }

    #[test]
    fn test_logout_drops_portal() {
        let registry = PortalRegistry::default();
        let store = InMemoryPortalPreferences::new();
        let mut context = ctx(Role::Hub);
        context.select_portal(&registry, &store, PortalId::Hub).unwrap();

        context.set_session(&registry, SessionState::Anonymous);
        assert!(context.current_portal().is_none());
        assert_eq!(context.authorize("/hub", &[Role::Hub]), Decision::RedirectToLogin);
    }

    #[test]
    fn test_loading_context_defers() {
        let context = AuthContext::loading();
        assert_eq!(context.authorize("/admin", &[Role::Admin]), Decision::Defer);
        assert!(context.navigation_correction("/admin").is_none());
    }

    #[test]
    fn test_navigation_correction_follows_selection() {
        let registry = PortalRegistry::default();
        let store = InMemoryPortalPreferences::new();
        let mut context = ctx(Role::Admin);
        context.select_portal(&registry, &store, PortalId::Partner).unwrap();

        assert_eq!(context.navigation_correction("/partner/leads"), None);
        assert_eq!(context.navigation_correction("/admin/courses"), Some("/"));
    }

    #[test]
    fn test_select_by_wire_name() {
        let registry = PortalRegistry::default();
        let store = InMemoryPortalPreferences::new();
        let mut context = ctx(Role::Partner);

        assert_eq!(context.select_portal_by_name(&registry, &store, "partner").unwrap().id, PortalId::Partner);
        assert!(matches!(
            context.select_portal_by_name(&registry, &store, "coordinator"),
            Err(AccessError::PortalNotAvailable { .. })
        ));
        assert_eq!(context.current_portal().unwrap().id, PortalId::Partner);
        assert_eq!(store.load(context.user().unwrap().id), Some(PortalId::Partner));
    }

    #[test]
    fn test_authorize_path_uses_route_table() {
        let registry = PortalRegistry::default();
        let routes = RouteTable::from_portals(registry.all());

        let teacher = ctx(Role::Teacher);
        assert_eq!(teacher.authorize_path(&routes, "/teacher/classes"), Decision::Render);
        assert_eq!(teacher.authorize_path(&routes, "/admin/users"), Decision::RedirectToHome);
        assert_eq!(teacher.authorize_path(&routes, "/profile"), Decision::Render);

        assert_eq!(AuthContext::loading().authorize_path(&routes, "/admin"), Decision::Defer);
        assert_eq!(
            AuthContext::new(SessionState::Anonymous).authorize_path(&routes, "/teacher"),
            Decision::RedirectToLogin
        );
    }
}
