use std::fmt;

use crate::policy::Tier;

/// What a client wants done at an offset.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OpKind {
    Read,
    Write,
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OpKind::Read => write!(f, "READ"),
            OpKind::Write => write!(f, "WRITE"),
        }
    }
}

/// One client request. The offset is relative to the client's own address
/// space; the server resolves it to a logical page id.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AccessMsg {
    pub client_id: usize,
    pub offset: usize,
    pub op: OpKind,
}

impl fmt::Display for AccessMsg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "client {} {} at offset {}", self.client_id, self.op, self.offset)
    }
}

/// A request from the scanner to move one page to another tier.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MigrationMsg {
    pub page_id: usize,
    pub target: Tier,
}

impl fmt::Display for MigrationMsg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "move page {} to {}", self.page_id, self.target)
    }
}
