//! Registration descriptors and registry-internal entries.
//!
//! Mirrors the source's `nf_hook_ops` / `nf_hook_entry` split: [`HookOps`]
//! is what the caller supplies, [`HookEntry`] is what the registry stores.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::family::{Family, HookPoint};
use crate::verdict::Verdict;

/// Opaque token identifying a registered hook, handed back by `register()`
/// and required by `unregister()`.
///
/// The source identifies an entry at deregistration by the address of the
/// caller's original `nf_hook_ops`. Safe Rust has no stable notion of
/// "the same descriptor, by address" once ownership has moved into the
/// registry, so this token is the idiomatic replacement: generated once at
/// registration time and presented back at removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookToken(Uuid);

impl HookToken {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for HookToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single interception point's full per-invocation context, passed by
/// the caller into every callback and into [`crate::engine::hook_slow`].
pub struct HookState<'a, P> {
    pub hook: HookPoint,
    pub pf: Family,
    /// Entries with `priority < thresh` are skipped.
    pub thresh: i32,
    /// The device the packet arrived on, if any.
    pub in_device: Option<&'a str>,
    /// The device the packet will leave through, if any.
    pub out_device: Option<&'a str>,
    /// Opaque socket/connection marker (diagnostic-only; not interpreted
    /// by the engine).
    pub sock: Option<&'a str>,
    /// Continuation the caller invokes iff the engine returns `Proceed`.
    pub okfn: Box<dyn FnOnce(&mut P) + 'a>,
}

impl<'a, P> fmt::Debug for HookState<'a, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookState")
            .field("hook", &self.hook)
            .field("pf", &self.pf)
            .field("thresh", &self.thresh)
            .finish_non_exhaustive()
    }
}

/// A hook's callback. Takes the registrant's private data, the packet, and
/// the invocation state, and returns a verdict. Must not block.
pub type HookFn<P> = dyn Fn(&(dyn Any + Send + Sync), &mut P, &HookState<'_, P>) -> Verdict
    + Send
    + Sync;

/// Registration descriptor supplied by the caller. Immutable after
/// registration.
pub struct HookOps<P> {
    pub family: Family,
    pub hooknum: HookPoint,
    /// Lower runs earlier. Ties preserve registration order.
    pub priority: i32,
    pub callback: Arc<HookFn<P>>,
    /// Opaque data owned by the registrant, handed back to the callback on
    /// every invocation.
    pub private: Arc<dyn Any + Send + Sync>,
    /// Required and only valid when `family == Family::Netdev`.
    pub device: Option<String>,
}

impl<P> Clone for HookOps<P> {
    fn clone(&self) -> Self {
        Self {
            family: self.family,
            hooknum: self.hooknum,
            priority: self.priority,
            callback: self.callback.clone(),
            private: self.private.clone(),
            device: self.device.clone(),
        }
    }
}

impl<P> fmt::Debug for HookOps<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookOps")
            .field("family", &self.family)
            .field("hooknum", &self.hooknum)
            .field("priority", &self.priority)
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

/// Registry-internal entry. Created at registration, destroyed only after
/// the publication protocol's quiescence following deregistration.
pub struct HookEntry<P> {
    pub(crate) token: HookToken,
    pub(crate) ops: HookOps<P>,
    /// Monotonic sequence number assigned at insertion, used purely to
    /// preserve registration order among equal-priority entries (a `Vec`
    /// resort is not stable enough across interleaved inserts/removes on
    /// its own).
    pub(crate) seq: u64,
}

impl<P> HookEntry<P> {
    pub fn new(ops: HookOps<P>, seq: u64) -> Self {
        Self {
            token: HookToken::new(),
            ops,
            seq,
        }
    }

    pub fn token(&self) -> HookToken {
        self.token
    }

    pub fn priority(&self) -> i32 {
        self.ops.priority
    }

    pub fn invoke(&self, packet: &mut P, state: &HookState<'_, P>) -> Verdict {
        (self.ops.callback)(&*self.ops.private, packet, state)
    }
}

impl<P> fmt::Debug for HookEntry<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookEntry")
            .field("token", &self.token)
            .field("priority", &self.ops.priority)
            .field("seq", &self.seq)
            .finish()
    }
}
