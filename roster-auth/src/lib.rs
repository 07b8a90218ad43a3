//! roster-auth: identity providers and the signed active-company preference.

pub mod options;
pub mod preference;
pub mod remote;

#[cfg(any(feature = "jwt-aws-lc-rs", feature = "jwt-rust-crypto"))]
pub mod jwt;

pub use options::{AuthOptions, JwtAlgorithm, JwtOptions, PreferenceOptions, RemoteAuthOptions, SESSION_COOKIE};
pub use preference::{PreferenceCodec, PreferenceCodecError};
pub use remote::RemoteIdentityProvider;

#[cfg(any(feature = "jwt-aws-lc-rs", feature = "jwt-rust-crypto"))]
pub use jwt::JwtIdentityProvider;
