//! Authorization errors

use edu_common::{Role, TenantId};
use thiserror::Error;

use crate::portal::PortalId;

/// Authorization failure.
///
/// Surfaced to end users as a redirect or a 401/403, never as raw text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// No authenticated user
    #[error("authentication required")]
    Unauthenticated,

    /// Role not allowed on this route or operation
    #[error("role {role} is not allowed here")]
    Forbidden {
        /// Role of the caller
        role: Role,
    },

    /// Requested portal is not in the user's entitled set
    #[error("portal {requested} is not available to role {role}")]
    PortalNotAvailable {
        /// Portal the caller asked for
        requested: String,
        /// Role of the caller
        role: Role,
    },

    /// Resource belongs to another tenant
    #[error("cross-tenant access denied")]
    CrossTenant {
        /// Caller's tenant
        user_tenant: TenantId,
        /// Resource's tenant
        resource_tenant: TenantId,
    },

    /// Role has no portal and fallback is disabled
    #[error("no portal configured for role {0}")]
    NoPortalForRole(Role),
}

impl AccessError {
    /// Requested portal id could not be matched at all
    pub fn portal_not_available(requested: impl Into<String>, role: Role) -> Self {
        Self::PortalNotAvailable {
            requested: requested.into(),
            role,
        }
    }

    /// Used by callers that only need the portal id form
    pub fn for_portal(requested: PortalId, role: Role) -> Self {
        Self::portal_not_available(requested.as_str(), role)
    }
}
