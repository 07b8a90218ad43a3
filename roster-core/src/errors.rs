//! # Errors
//!
//! Roster carries structured, Feathers-style errors through `anyhow::Error`:
//! - consistent status codes + class names
//! - transport-agnostic (the axum adapter decides how to serialize)
//! - an optional `source` that never reaches clients
//!
//! Routine tenant-resolution outcomes (not signed in, no company yet) are NOT
//! errors; see [`crate::resolver::Resolution`]. Everything here is either a
//! denial, a bad input, or a collaborator failure.

use std::fmt;

use anyhow::Error as AnyError;
use serde_json::Value;

/// A convenience result type for Roster APIs.
pub type RosterResult<T> = std::result::Result<T, AnyError>;

/// Message shown for every authorization denial. Never names the tenant.
pub const DENIED_MESSAGE: &str = "You are not a member of this company or it does not exist.";

/// Message shown when membership or identity could not be verified.
pub const VERIFICATION_FAILED_MESSAGE: &str = "Access verification failed. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,       // 400
    NotAuthenticated, // 401
    Forbidden,        // 403
    NotFound,         // 404
    Conflict,         // 409
    Unprocessable,    // 422
    GeneralError,     // 500
    Unavailable,      // 503
}

impl ErrorKind {
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::NotAuthenticated => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Unprocessable => 422,
            ErrorKind::GeneralError => 500,
            ErrorKind::Unavailable => 503,
        }
    }

    /// Error `name` (e.g. "Forbidden")
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "BadRequest",
            ErrorKind::NotAuthenticated => "NotAuthenticated",
            ErrorKind::Forbidden => "Forbidden",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::Conflict => "Conflict",
            ErrorKind::Unprocessable => "Unprocessable",
            ErrorKind::GeneralError => "GeneralError",
            ErrorKind::Unavailable => "Unavailable",
        }
    }

    /// Error `className` (kebab-cased)
    pub fn class_name(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "bad-request",
            ErrorKind::NotAuthenticated => "not-authenticated",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not-found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Unprocessable => "unprocessable",
            ErrorKind::GeneralError => "general-error",
            ErrorKind::Unavailable => "unavailable",
        }
    }
}

/// A structured Roster error that can live inside `anyhow::Error`.
#[derive(Debug)]
pub struct RosterError {
    pub kind: ErrorKind,
    pub message: String,
    pub data: Option<Value>,
    pub errors: Option<Value>,
    pub source: Option<AnyError>,
}

impl RosterError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            data: None,
            errors: None,
            source: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_errors(mut self, errors: Value) -> Self {
        self.errors = Some(errors);
        self
    }

    pub fn with_source(mut self, source: AnyError) -> Self {
        self.source = Some(source);
        self
    }

    pub fn code(&self) -> u16 {
        self.kind.status_code()
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn class_name(&self) -> &'static str {
        self.kind.class_name()
    }

    pub fn into_anyhow(self) -> AnyError {
        AnyError::new(self)
    }

    /// Find a `RosterError` anywhere in an `anyhow` chain.
    pub fn from_anyhow(err: &AnyError) -> Option<&RosterError> {
        err.chain().find_map(|e| e.downcast_ref::<RosterError>())
    }

    /// Turn any error into a RosterError:
    /// - if it's already a RosterError, keep it
    /// - otherwise wrap as GeneralError
    pub fn normalize(err: AnyError) -> RosterError {
        match err.downcast::<RosterError>() {
            Ok(roster) => roster,
            Err(other) => {
                RosterError::new(ErrorKind::GeneralError, other.to_string()).with_source(other)
            }
        }
    }

    /// Client-safe copy: keeps kind/message/data/errors, drops `source`.
    pub fn sanitize_for_client(&self) -> RosterError {
        RosterError {
            kind: self.kind,
            message: self.message.clone(),
            data: self.data.clone(),
            errors: self.errors.clone(),
            source: None,
        }
    }

    pub fn to_json(&self) -> Value {
        let mut base = serde_json::json!({
            "name": self.name(),
            "message": self.message,
            "code": self.code(),
            "className": self.class_name(),
        });

        if let Some(d) = &self.data {
            base["data"] = d.clone();
        }
        if let Some(e) = &self.errors {
            base["errors"] = e.clone();
        }
        base
    }

    // ---- Constructors ----

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, msg)
    }
    pub fn not_authenticated(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotAuthenticated, msg)
    }
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, msg)
    }
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, msg)
    }
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, msg)
    }
    pub fn unprocessable(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unprocessable, msg)
    }
    pub fn general_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::GeneralError, msg)
    }
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unavailable, msg)
    }

    /// The one denial every tenancy check returns.
    pub fn denied() -> Self {
        Self::forbidden(DENIED_MESSAGE)
    }
}

impl fmt::Display for RosterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.name(), self.code(), self.message)
    }
}

impl std::error::Error for RosterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Failure talking to an external collaborator (identity provider,
/// membership store). Always fatal for the current request.
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    #[error("{collaborator} timed out")]
    Timeout { collaborator: &'static str },

    #[error("{collaborator} unavailable: {message}")]
    Unavailable {
        collaborator: &'static str,
        message: String,
    },

    #[error("{collaborator} returned an unexpected response: {message}")]
    Backend {
        collaborator: &'static str,
        message: String,
    },

    #[error("{collaborator} is misconfigured: {message}")]
    Misconfigured {
        collaborator: &'static str,
        message: String,
    },
}

impl CollaboratorError {
    pub fn timeout(collaborator: &'static str) -> Self {
        Self::Timeout { collaborator }
    }

    pub fn unavailable(collaborator: &'static str, message: impl Into<String>) -> Self {
        Self::Unavailable {
            collaborator,
            message: message.into(),
        }
    }

    pub fn backend(collaborator: &'static str, message: impl Into<String>) -> Self {
        Self::Backend {
            collaborator,
            message: message.into(),
        }
    }

    pub fn misconfigured(collaborator: &'static str, message: impl Into<String>) -> Self {
        Self::Misconfigured {
            collaborator,
            message: message.into(),
        }
    }

    pub fn collaborator(&self) -> &'static str {
        match self {
            Self::Timeout { collaborator }
            | Self::Unavailable { collaborator, .. }
            | Self::Backend { collaborator, .. }
            | Self::Misconfigured { collaborator, .. } => collaborator,
        }
    }
}

impl From<CollaboratorError> for RosterError {
    /// Collaborator failures surface as a generic 503; details stay in `source`.
    fn from(err: CollaboratorError) -> Self {
        RosterError::unavailable(VERIFICATION_FAILED_MESSAGE).with_source(AnyError::new(err))
    }
}

/// Bail out of an `anyhow`-returning function with a RosterError.
#[macro_export]
macro_rules! bail_roster {
    ($ctor:ident, $msg:expr) => {
        return Err($crate::errors::RosterError::$ctor($msg).into_anyhow())
    };
    ($ctor:ident, $fmt:literal, $($arg:tt)*) => {
        return Err($crate::errors::RosterError::$ctor(format!($fmt, $($arg)*)).into_anyhow())
    };
}
