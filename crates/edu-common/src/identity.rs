//! Identity Data Model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::CommonError;

/// Tenant ID (one institution account)
pub type TenantId = Uuid;

/// User ID as issued by the identity provider
pub type UserId = Uuid;

/// Portal role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Back-office administrator of a tenant
    Admin,
    /// Learner
    Student,
    /// Instructor
    Teacher,
    /// Hub (unit/polo) consultant
    Hub,
    /// Commercial partner
    Partner,
}

impl Role {
    /// Every role, in catalog order
    pub const ALL: [Role; 5] = [
        Role::Admin,
        Role::Student,
        Role::Teacher,
        Role::Hub,
        Role::Partner,
    ];

    /// Roles allowed to submit enrollments on behalf of a learner
    pub const OPERATORS: [Role; 3] = [Role::Admin, Role::Partner, Role::Hub];

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

    /// Whether this role may act as an enrollment operator
    pub fn is_operator(&self) -> bool {
        Self::OPERATORS.contains(self)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "student" => Ok(Self::Student),
            "teacher" => Ok(Self::Teacher),
            "hub" => Ok(Self::Hub),
            "partner" => Ok(Self::Partner),
            _ => Err(CommonError::UnrecognizedRole(s.to_string())),
        }
    }
}

/// Authenticated user as returned by the identity provider.
///
/// Read-only to the core. Every authorization decision looks at both
/// `role` and `tenant_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// User ID
    pub id: UserId,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Login email
    #[serde(default)]
    pub email: String,
    /// Portal role
    pub role: Role,
    /// Owning tenant
    pub tenant_id: TenantId,
}

impl User {
    /// Create a user with empty contact fields
    pub fn new(role: Role, tenant_id: TenantId) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: String::new(),
            email: String::new(),
            role,
            tenant_id,
        }
    }

    /// Whether the user is a tenant administrator
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
