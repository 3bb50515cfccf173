//! Engine error type.
//!
//! Absence is never an error in this crate: a missing key or member shows up as
//! `None`, `0` or an empty `Vec`. The variants below are the conditions a caller
//! has to tell apart from a normal miss.

use bytes::Bytes;
use thiserror::Error;

/// Errors surfaced by the storage engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// The key could not be mapped to a shard or lock stripe.
    ///
    /// This is an integrity problem, not a miss. Operations that hit it abort
    /// before touching any state.
    #[error("cannot route key {key:?} to a shard")]
    Routing { key: Bytes },

    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    #[error("no such key")]
    KeyNotFound,

    #[error("value is not a valid float")]
    NotAFloat,

    #[error("syntax error")]
    SyntaxError,

    #[error("resulting score is not a number (NaN)")]
    Overflow,

    /// The timer wheel needs a Tokio runtime to spawn its control loop.
    #[error("no Tokio runtime available to start the timer wheel")]
    NoRuntime,

    #[error("timer wheel already started")]
    TimerAlreadyStarted,
}

impl EngineError {
    pub(crate) fn routing(key: &[u8]) -> Self {
        EngineError::Routing {
            key: Bytes::copy_from_slice(key),
        }
    }
}

/// Result alias used across the engine.
pub type Result<T> = std::result::Result<T, EngineError>;
