//! The [`StateStore`] trait.

use expgen_types::RemoveState;

use crate::error::StateResult;

/// Durable storage for one [`RemoveState`] per target.
///
/// The map contents are opaque to the store; it only has to round-trip them
/// faithfully.
pub trait StateStore: Send + Sync {
    /// Load the state for `target`.
    ///
    /// Returns an empty map if nothing has been saved for it yet.
    fn load(&self, target: &str) -> StateResult<RemoveState>;

    /// Persist the full state for `target`, replacing any previous content.
    fn save(&self, target: &str, state: &RemoveState) -> StateResult<()>;

    /// Whether anything has been saved for `target`.
    fn contains(&self, target: &str) -> StateResult<bool> {
        Ok(!self.load(target)?.is_empty())
    }
}
