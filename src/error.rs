//! Error types shared across the registry, engine and collaborator traits.

use thiserror::Error;

/// Errors returned by the registry API (`register_net_hook`,
/// `register_net_hooks`, `register_hook`, ...).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RegisterError {
    /// Entry allocation failed.
    #[error("failed to allocate a hook entry")]
    OutOfMemory,
    /// No chain exists for the requested `(namespace, family, hooknum, device)`.
    ///
    /// Tolerated by [`crate::registry::Registry::register_hook`] and by
    /// namespace replay: a namespace that has no matching chain simply
    /// does not receive the hook.
    #[error("no hook chain for the requested target")]
    NoSuchTarget,
}

/// Errors surfaced by the external queue collaborator (see
/// [`crate::collaborators::queue`]).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// No userspace listener is bound to the requested queue id.
    #[error("no listener bound to queue")]
    NoListener,
    /// The collaborator failed for any other reason.
    #[error("queue collaborator failed")]
    Failed,
}

/// The default errno substituted for a `DROP` verdict that did not specify
/// one (the source's `-EPERM`, "operation not permitted").
pub const DEFAULT_DROP_ERRNO: i32 = 1;

/// Maps an encoded drop errno (zero meaning "use the default") to the
/// concrete value the caller should re-surface upstream.
pub fn resolve_drop_errno(errno: i32) -> i32 {
    if errno == 0 {
        DEFAULT_DROP_ERRNO
    } else {
        errno
    }
}
