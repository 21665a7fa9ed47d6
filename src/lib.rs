//! A packet-filtering hook framework: priority-ordered callback chains
//! multiplexed across protocol families, hook points, and isolated network
//! namespaces.
//!
//! Protocol code builds a [`hook::HookState`] naming the chain to run and
//! calls [`engine::hook_slow`]; the engine walks the chain, invokes each
//! callback in priority order, and returns an [`engine::EngineOutcome`]
//! telling the caller whether to proceed, that the packet was dropped, or
//! that it was consumed (stolen or queued). Registration
//! ([`registry::Registry`]) is rare and fully serialized; the traversal
//! itself is wait-free.

pub mod chain;
pub mod cli;
pub mod collaborators;
pub mod device;
#[cfg(feature = "diagnostics")]
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod family;
pub mod grace;
pub mod hook;
pub mod logging;
pub mod namespace;
pub mod registry;
pub mod verdict;
