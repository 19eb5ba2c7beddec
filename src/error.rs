//! Error types for transient maps.
//!
//! Lookups that miss and removals of absent keys are not errors; the only
//! fault the crate reports is misuse of a frozen [`TransientHashMap`].
//!
//! [`TransientHashMap`]: crate::persistent::TransientHashMap

use thiserror::Error;

/// Represents misuse of a [`TransientHashMap`](crate::persistent::TransientHashMap).
///
/// # Examples
///
/// ```rust
/// use persistent_hamt::{TransientError, TransientHashMap};
///
/// let mut transient: TransientHashMap<&str, i32> = TransientHashMap::new();
/// transient.insert("a", 1);
/// let frozen = transient.freeze().unwrap();
/// assert_eq!(frozen.len(), 1);
///
/// assert_eq!(
///     transient.try_insert("b", 2),
///     Err(TransientError::UsedAfterFreeze { operation: "try_insert" })
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransientError {
    /// A mutating operation was called after the transient was frozen.
    #[error("TransientHashMap::{operation}: transient used after freeze")]
    UsedAfterFreeze {
        /// The name of the rejected operation.
        operation: &'static str,
    },
}
