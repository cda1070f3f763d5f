// src/types.rs

use serde::{Deserialize, Serialize};

/// Coarse state of the host environment, as far as compiling is concerned.
///
/// - `Editing`: compiling is safe; source changes are compiled right away.
/// - `Restricted`: a live mode (e.g. the story is being played) during which
///   compiling is unsafe. Source changes are parked on the pending list and
///   compiled once the host returns to `Editing`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostMode {
    #[default]
    Editing,
    Restricted,
}

/// Answer to a host asking to enter restricted mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeTransition {
    /// Nothing is compiling; the host may enter restricted mode now.
    Allowed,
    /// A batch is in flight. The transition is replayed through
    /// [`crate::host::Host::enter_restricted_mode`] once the batch drains
    /// without errors.
    Deferred,
}
