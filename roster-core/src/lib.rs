//! roster-core: transport-agnostic tenant context resolution for Roster.

pub mod app;
pub mod collaborators;
pub mod config;
pub mod errors;
pub mod events;
pub mod memory;
pub mod metrics;
pub mod resolver;
pub mod switch;
pub mod tenancy;
pub mod tenant;

#[cfg(feature = "postgres")]
pub mod pg;

pub use app::RosterApp;
pub use collaborators::{Credentials, IdentityProvider, MembershipStore};
pub use config::{load_env_config, RosterConfig, RosterConfigSnapshot};
pub use errors::{CollaboratorError, ErrorKind, RosterError, RosterResult};
pub use events::{
    listener, Invalidation, InvalidationHub, InvalidationListener, InvalidationPattern,
    InvalidationScope, ListenerId,
};
pub use memory::{InMemoryMembershipStore, StaticIdentityProvider};
pub use metrics::{ResolverMetrics, ResolverMetricsSnapshot};
pub use resolver::{reconcile, ResolveError, Resolution, Selection, TenantResolver};
pub use switch::{PreferenceUpdate, SwitchOutcome};
pub use tenancy::{
    clear_preference, require_current_membership, CreateTenantInput, CreatedTenant, TenancyChange,
};
pub use tenant::{
    ActiveTenantPreference, Membership, MembershipId, Principal, PrincipalId, RoleId, Tenant,
    TenantContext, TenantId,
};

#[cfg(feature = "postgres")]
pub use pg::PgMembershipStore;
