//! EduPortal shared types
//!
//! Identity data owned by the external identity/session service and read by
//! every other crate: roles, users and the tenant partition key.

#![warn(missing_docs)]

pub mod error;
pub mod identity;

pub use error::CommonError;
pub use identity::{Role, TenantId, User, UserId};
