//! Delayed one-shot callbacks.
//!
//! See [`TimerWheel`].

pub mod wheel;

pub use wheel::{Callback, TimerWheel};
