//! External collaborators the engine and registry call into, but do not
//! own: the userspace queue subsystem, the per-family helper table, and
//! the connection-tracking attach/destroy trampolines.
//!
//! None of their internals (the queue wire protocol, checksum/route
//! helpers, conntrack itself) are in scope; only the seam the core
//! framework calls through.

pub mod afinfo;
pub mod conntrack;
pub mod queue;
