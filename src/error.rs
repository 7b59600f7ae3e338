//! Error types for device effect management

use thiserror::Error;

/// Errors returned by device effect operations.
///
/// Only [`IncompatibleEffect`](EffectError::IncompatibleEffect),
/// [`Unavailable`](EffectError::Unavailable), [`HandleInitFailure`](EffectError::HandleInitFailure)
/// and HAL failures ever reach the caller of
/// [`DeviceEffectManager::create_effect`](crate::DeviceEffectManager::create_effect).
/// The others are outcomes the manager normalizes or logs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EffectError {
    /// Wrong effect category, or the HAL is older than the device effect floor
    #[error("effect is not usable as a device effect: {0}")]
    IncompatibleEffect(String),

    /// No effect factory / HAL is present
    #[error("effects factory unavailable")]
    Unavailable,

    /// No patch currently routes to the device
    #[error("no patch routes to the device")]
    NotFound,

    /// The proxy is already bound to a patch
    #[error("device effect already bound")]
    AlreadyBound,

    /// The client channel could not be used to build a handle
    #[error("effect handle init failed: {0}")]
    HandleInitFailure(String),

    /// The effect behind a handle no longer exists
    #[error("effect reference is stale")]
    StaleReference,

    /// Malformed argument (e.g. a patch without endpoints)
    #[error("bad value: {0}")]
    BadValue(String),

    /// Failure reported by the HAL while creating or attaching an effect
    #[error("HAL error: {0}")]
    Hal(String),
}

/// Result type for device effect operations
pub type EffectResult<T> = Result<T, EffectError>;
