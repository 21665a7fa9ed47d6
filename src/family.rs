//! Protocol family and hook-point tags.
//!
//! These are the two axes (besides the namespace) a [`crate::chain::Chain`]
//! is addressed by. `NETDEV`/`Ingress` is the one combination that is *not*
//! addressed through the namespace's chain table — see [`crate::device`].

use enum_iterator::Sequence;

/// Protocol family a hook is registered against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Sequence)]
pub enum Family {
    Unspec,
    Ipv4,
    Ipv6,
    Arp,
    Bridge,
    Decnet,
    Netdev,
}

impl Family {
    /// Number of families, used to size the chain table.
    pub const COUNT: usize = 7;

    pub fn index(self) -> usize {
        match self {
            Family::Unspec => 0,
            Family::Ipv4 => 1,
            Family::Ipv6 => 2,
            Family::Arp => 3,
            Family::Bridge => 4,
            Family::Decnet => 5,
            Family::Netdev => 6,
        }
    }
}

/// Interception point within a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Sequence)]
pub enum HookPoint {
    PreRouting,
    LocalIn,
    Forward,
    LocalOut,
    PostRouting,
    /// Only valid when `family == Family::Netdev`; the chain for this hook
    /// point lives on the device object, not the namespace's table.
    Ingress,
}

impl HookPoint {
    pub const COUNT: usize = 6;

    pub fn index(self) -> usize {
        match self {
            HookPoint::PreRouting => 0,
            HookPoint::LocalIn => 1,
            HookPoint::Forward => 2,
            HookPoint::LocalOut => 3,
            HookPoint::PostRouting => 4,
            HookPoint::Ingress => 5,
        }
    }
}
