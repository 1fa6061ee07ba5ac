use crate::mailbox::NodeId;
use crate::worker::WorkerKey;

/// A read-only picture of one node and its subtree.
///
/// Obtained from [`WorkflowHost::snapshot`](crate::WorkflowHost::snapshot).
/// Children are ordered by key.  Comparing the [`id`](NodeSnapshot::id) of a
/// child across two snapshots tells whether the node survived the render
/// passes in between or was replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSnapshot {
    /// Identity of the live node.
    pub id: NodeId,
    /// Type name of the node's workflow.
    pub workflow: &'static str,
    /// The key the parent rendered this node with (empty for the root).
    pub key: String,
    /// Workers currently running for this node.
    pub workers: Vec<WorkerKey>,
    /// Mounted children.
    pub children: Vec<NodeSnapshot>,
}

impl NodeSnapshot {
    /// The direct child rendered with `key`, if any.
    pub fn child(&self, key: &str) -> Option<&NodeSnapshot> {
        self.children.iter().find(|child| child.key == key)
    }

    /// Number of nodes in this subtree, including this one.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(NodeSnapshot::node_count).sum::<usize>()
    }

    /// Number of workers running in this subtree.
    pub fn worker_count(&self) -> usize {
        self.workers.len() + self.children.iter().map(NodeSnapshot::worker_count).sum::<usize>()
    }
}
