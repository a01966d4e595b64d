//! Media session status bridge.
//!
//! Observes and controls the device's active "now playing" session on behalf
//! of a lyrics UI. The OS side (session registry, listener settings, settings
//! launcher) is reached through the traits in [`traits`]; platform backends
//! live in the `nowplaying-media-session` crate.

pub mod actions;
pub mod bridge;
pub mod channel;
pub mod dispatcher;
pub mod error;
pub mod models;
pub mod normalizer;
pub mod permission;
pub mod registry;
pub mod selector;
pub mod traits;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use actions::*;
pub use bridge::*;
pub use channel::*;
pub use dispatcher::*;
pub use error::*;
pub use models::*;
pub use normalizer::*;
pub use permission::*;
pub use registry::*;
pub use selector::*;
pub use traits::*;
