//! Portal Registry
//!
//! Fixed catalog of portals and the mapping from a user's role to the portals
//! the user may select.

use edu_common::{CommonError, Role, User};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AccessError;

/// Portal identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortalId {
    /// Back office
    Admin,
    /// Learner portal
    Student,
    /// Instructor portal
    Teacher,
    /// Hub/unit portal
    Hub,
    /// Partner portal
    Partner,
}

impl PortalId {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Student => "student",
            Self::Teacher => "teacher",
            Self::Hub => "hub",
            Self::Partner => "partner",
        }
    }
}

impl fmt::Display for PortalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PortalId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "student" => Ok(Self::Student),
            "teacher" => Ok(Self::Teacher),
            "hub" => Ok(Self::Hub),
            "partner" => Ok(Self::Partner),
            other => Err(other.to_string()),
        }
    }
}

/// Portal catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Portal {
    /// Portal ID
    pub id: PortalId,
    /// Display name
    pub name: &'static str,
    /// Route prefix owned by this portal
    pub base_route: &'static str,
    /// Role a non-admin user needs to enter
    pub required_role: Role,
}

impl Portal {
    /// Whether `path` lies under this portal's base route
    pub fn owns_path(&self, path: &str) -> bool {
        path == self.base_route
            || path
                .strip_prefix(self.base_route)
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

/// The compiled-in catalog
pub const PORTALS: [Portal; 5] = [
    Portal {
        id: PortalId::Admin,
        name: "Administração",
        base_route: "/admin",
        required_role: Role::Admin,
    },
    Portal {
        id: PortalId::Student,
        name: "Portal do Aluno",
        base_route: "/student",
        required_role: Role::Student,
    },
    Portal {
        id: PortalId::Teacher,
        name: "Portal do Professor",
        base_route: "/teacher",
        required_role: Role::Teacher,
    },
    Portal {
        id: PortalId::Hub,
        name: "Portal do Polo",
        base_route: "/hub",
        required_role: Role::Hub,
    },
    Portal {
        id: PortalId::Partner,
        name: "Portal do Parceiro",
        base_route: "/partner",
        required_role: Role::Partner,
    },
];

/// What to do with a role that has no portal of its own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedRolePolicy {
    /// Treat as a configuration error
    #[default]
    Reject,
    /// Send the user to the student portal
    FallbackToStudent,
}

impl UnmatchedRolePolicy {
    /// Interpret a raw role string coming from the identity provider
    pub fn interpret_role(&self, raw: &str) -> Result<Role, CommonError> {
        match (raw.parse::<Role>(), self) {
            (Ok(role), _) => Ok(role),
            (Err(_), Self::FallbackToStudent) => {
                tracing::warn!(role = raw, "unrecognized role, falling back to student");
                Ok(Role::Student)
            }
            (Err(e), Self::Reject) => Err(e),
        }
    }
}

/// Portal registry
#[derive(Debug, Clone)]
pub struct PortalRegistry {
    portals: &'static [Portal],
    unmatched_role: UnmatchedRolePolicy,
}

impl PortalRegistry {
    /// Registry over the full catalog
    pub fn new(unmatched_role: UnmatchedRolePolicy) -> Self {
        Self::with_catalog(&PORTALS, unmatched_role)
    }

    /// Registry over a restricted catalog (deployments that disable portals)
    pub fn with_catalog(portals: &'static [Portal], unmatched_role: UnmatchedRolePolicy) -> Self {
        Self {
            portals,
            unmatched_role,
        }
    }

    /// Every portal in the catalog
    pub fn all(&self) -> &'static [Portal] {
        self.portals
    }

    /// Lookup by ID
    pub fn get(&self, id: PortalId) -> Option<&'static Portal> {
        self.portals.iter().find(|p| p.id == id)
    }

    /// Configured fallback policy
    pub fn unmatched_role_policy(&self) -> UnmatchedRolePolicy {
        self.unmatched_role
    }

    /// Portals the user may select
    pub fn resolve_available_portals(&self, user: &User) -> Result<Vec<Portal>, AccessError> {
        if user.is_admin() {
            return Ok(self.portals.to_vec());
        }

        if let Some(portal) = self.portals.iter().find(|p| p.required_role == user.role) {
            return Ok(vec![*portal]);
        }

        match self.unmatched_role {
            UnmatchedRolePolicy::FallbackToStudent => {
                let student = self
                    .get(PortalId::Student)
                    .ok_or(AccessError::NoPortalForRole(user.role))?;
                tracing::warn!(
                    role = %user.role,
                    user_id = %user.id,
                    "no portal for role, falling back to student portal"
                );
                Ok(vec![*student])
            }
            UnmatchedRolePolicy::Reject => Err(AccessError::NoPortalForRole(user.role)),
        }
    }

    /// Validate a portal selection. No state changes here.
    pub fn select_portal(&self, user: &User, requested: PortalId) -> Result<Portal, AccessError> {
        self.resolve_available_portals(user)?
            .into_iter()
            .find(|p| p.id == requested)
            .ok_or_else(|| AccessError::for_portal(requested, user.role))
    }

    /// Parse-and-select for string ids coming off the wire
    pub fn select_portal_by_name(&self, user: &User, requested: &str) -> Result<Portal, AccessError> {
        let id = requested
            .parse::<PortalId>()
            .map_err(|raw| AccessError::portal_not_available(raw, user.role))?;
        self.select_portal(user, id)
    }
}

impl Default for PortalRegistry {
    fn default() -> Self {
        Self::new(UnmatchedRolePolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user(role: Role) -> User {
        User::new(role, Uuid::new_v4())
    }

    #[test]
    fn test_admin_gets_all_portals() {
        let registry = PortalRegistry::default();
        let portals = registry.resolve_available_portals(&user(Role::Admin)).unwrap();
        assert_eq!(portals.len(), 5);
    }

    #[test]
    fn test_teacher_gets_teacher_portal_only() {
        let registry = PortalRegistry::default();
        let portals = registry.resolve_available_portals(&user(Role::Teacher)).unwrap();
        assert_eq!(portals.len(), 1);
        assert_eq!(portals[0].id, PortalId::Teacher);
    }

    #[test]
    fn test_every_role_has_a_catalog_entry() {
        let registry = PortalRegistry::default();
        for role in Role::ALL {
            assert!(registry.resolve_available_portals(&user(role)).is_ok());
        }
    }

    static NO_PARTNER: [Portal; 2] = [PORTALS[0], PORTALS[1]];

    #[test]
    fn test_unmatched_role_rejected_by_default() {
        let registry = PortalRegistry::with_catalog(&NO_PARTNER, UnmatchedRolePolicy::Reject);
        assert_eq!(
            registry.resolve_available_portals(&user(Role::Partner)),
            Err(AccessError::NoPortalForRole(Role::Partner))
        );
    }

    #[test]
    fn test_unmatched_role_fallback() {
        let registry =
            PortalRegistry::with_catalog(&NO_PARTNER, UnmatchedRolePolicy::FallbackToStudent);
        let portals = registry.resolve_available_portals(&user(Role::Partner)).unwrap();
        assert_eq!(portals, vec![PORTALS[1]]);
    }

    #[test]
    fn test_select_portal() {
        let registry = PortalRegistry::default();
        let hub = user(Role::Hub);

        assert_eq!(registry.select_portal(&hub, PortalId::Hub).unwrap().base_route, "/hub");
        assert!(matches!(
            registry.select_portal(&hub, PortalId::Admin),
            Err(AccessError::PortalNotAvailable { .. })
        ));
        assert!(registry.select_portal(&user(Role::Admin), PortalId::Partner).is_ok());
    }

    #[test]
    fn test_select_unknown_portal_name() {
        let registry = PortalRegistry::default();
        let err = registry
            .select_portal_by_name(&user(Role::Admin), "finance")
            .unwrap_err();
        assert_eq!(err, AccessError::portal_not_available("finance", Role::Admin));
    }

    #[test]
    fn test_owns_path() {
        let portal = PORTALS[3];
        assert!(portal.owns_path("/hub"));
        assert!(portal.owns_path("/hub/enrollments"));
        assert!(!portal.owns_path("/hubris"));
        assert!(!portal.owns_path("/admin"));
    }

    #[test]
    fn test_interpret_role() {
        assert_eq!(UnmatchedRolePolicy::Reject.interpret_role("hub"), Ok(Role::Hub));
        assert!(UnmatchedRolePolicy::Reject.interpret_role("dean").is_err());
        assert_eq!(
            UnmatchedRolePolicy::FallbackToStudent.interpret_role("dean"),
            Ok(Role::Student)
        );
    }
}
