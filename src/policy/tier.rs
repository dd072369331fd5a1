use bytemuck::NoUninit;
use enum_map::Enum;

use std::fmt;

/// One of the three memory classes, ordered fastest to slowest.
///
/// The representation is a plain byte so a tier can live in an
/// `atomic::Atomic<Tier>` page-table field and key an `EnumMap`.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Enum, NoUninit)]
pub enum Tier {
    /// The local NUMA node.
    Local,
    /// The remote NUMA node.
    Remote,
    /// Persistent memory.
    Pmem,
}

impl Tier {
    pub const COUNT: usize = 3;

    pub fn name(&self) -> &'static str {
        match self {
            Tier::Local => "LOCAL",
            Tier::Remote => "REMOTE",
            Tier::Pmem => "PMEM",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A tier transition the policy can request. Only the four adjacent moves
/// exist; the policy never skips the middle tier in one step.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Enum)]
pub enum Transition {
    LocalToRemote,
    RemoteToLocal,
    RemoteToPmem,
    PmemToRemote,
}

impl Transition {
    /// The transition from `from` to `to`, or `None` when the pair is not a
    /// policy transition (including `from == to`).
    pub fn between(from: Tier, to: Tier) -> Option<Transition> {
        match (from, to) {
            (Tier::Local, Tier::Remote) => Some(Transition::LocalToRemote),
            (Tier::Remote, Tier::Local) => Some(Transition::RemoteToLocal),
            (Tier::Remote, Tier::Pmem) => Some(Transition::RemoteToPmem),
            (Tier::Pmem, Tier::Remote) => Some(Transition::PmemToRemote),
            _ => None,
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (from, to) = match self {
            Transition::LocalToRemote => (Tier::Local, Tier::Remote),
            Transition::RemoteToLocal => (Tier::Remote, Tier::Local),
            Transition::RemoteToPmem => (Tier::Remote, Tier::Pmem),
            Transition::PmemToRemote => (Tier::Pmem, Tier::Remote),
        };
        write!(f, "{}->{}", from, to)
    }
}
