//! Error taxonomy of the bridge.
//!
//! "Nothing is playing" is not an error anywhere in here: it is modeled as
//! `None` / `false` by the callers.

use thiserror::Error;

/// Failure classes a session registry can report while enumerating
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The caller does not hold the listener privilege
    #[error("security failure while listing sessions: {0}")]
    Security(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failures of a single session handle
#[derive(Debug, Error)]
pub enum SessionError {
    /// The owning app tore its session down; the handle is stale
    #[error("media session is gone")]
    Gone,

    #[error(transparent)]
    Fault(#[from] anyhow::Error),
}

/// Errors surfaced by the bridge operations
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("notification listener permission not granted")]
    PermissionDenied,

    #[error("media session is gone")]
    SessionGone,

    /// Anything unexpected from the OS layer; never masked
    #[error(transparent)]
    Fault(#[from] anyhow::Error),
}

impl From<SessionError> for BridgeError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Gone => BridgeError::SessionGone,
            SessionError::Fault(e) => BridgeError::Fault(e),
        }
    }
}

impl BridgeError {
    /// Whether the error is an expected "no data" condition rather than a defect
    pub fn is_recoverable(&self) -> bool {
        matches!(self, BridgeError::PermissionDenied | BridgeError::SessionGone)
    }
}

pub type BridgeResult<T> = std::result::Result<T, BridgeError>;
