//! Portal Registry & Access Guard
//!
//! Decides who may reach which part of the platform.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          ACCESS CONTROL                                 │
//! │                                                                         │
//! │  ┌──────────────┐   SessionState    ┌──────────────────────────────┐    │
//! │  │  Identity    │ ────────────────► │        AuthContext           │    │
//! │  │  Provider    │ Loading/Anon/User │  session + current portal    │    │
//! │  └──────────────┘                   └──────────────┬───────────────┘    │
//! │                                                    │                    │
//! │  ┌──────────────┐                   ┌──────────────▼───────────────┐    │
//! │  │   Portal     │ ◄──────────────── │        Access Guard          │    │
//! │  │  Registry    │  role → portals   │ authorize_route (pure)       │    │
//! │  └──────────────┘                   │ authorize_tenant             │    │
//! │                                     └──────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `authorize_route` is the only enforcement point. Portal selection and
//! navigation correction are UI conveniences layered on top of it.

#![warn(missing_docs)]

pub mod context;
pub mod error;
pub mod guard;
pub mod identity;
pub mod portal;

pub use context::{AuthContext, InMemoryPortalPreferences, PortalPreferenceStore};
pub use error::AccessError;
pub use guard::{
    authorize_route, authorize_tenant, navigation_correction, require_role, Decision,
    RouteRule, RouteTable, SessionState,
};
pub use identity::{
    resolve_session, Credentials, HttpIdentityProvider, IdentityError, IdentityProvider,
    InMemoryIdentityProvider, LoginOutcome, Registration, SessionCredential,
};
pub use portal::{Portal, PortalId, PortalRegistry, UnmatchedRolePolicy, PORTALS};
