//! roster-axum: Axum adapter for Roster.
//!
//! Exposes extractors that resolve the tenant context per request, the
//! signed preference cookie, and routes for switching and tenancy mutations.

pub mod app;
pub mod cookies;
pub mod extract;
pub mod routes;
pub mod state;
mod error;

pub use error::RosterAxumError;
pub use state::{RedirectRoutes, RosterAxumState};

pub use app::{axum, RosterAxumApp};
pub use cookies::PreferenceCookie;
pub use extract::{ActiveTenant, ContextRejection, RequestIdentity, SignedIn};
