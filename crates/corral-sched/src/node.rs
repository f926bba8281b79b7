//! Cluster member identity.

use serde::{Deserialize, Serialize};

/// Identity of a cluster member within a scheduler context.
///
/// Nodes are compared by id, never by name string: two `Node` records with
/// the same uname but different ids are different members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub(crate) usize);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// A cluster member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Identity within the owning scheduler context.
    pub id: NodeId,

    /// Node uname, for logs only.
    pub name: String,
}
