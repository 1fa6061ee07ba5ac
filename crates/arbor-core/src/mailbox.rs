//! The hand-off layer between the outside world and the tree.
//!
//! Every action that can change state -- a sink invocation, a worker result --
//! travels as an [`Envelope`] through one unbounded channel owned by the
//! host.  The envelope is addressed by the path of node ids from the root to
//! the target node.  Node ids are never reused, so an envelope addressed to a
//! node that has since been torn down (and possibly replaced by a new node
//! with the same key) simply fails to route and is dropped.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Identity of one live node.  Unique for the lifetime of its host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity of one started worker task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct WorkerId(u64);

/// What an envelope carries to its node.
pub(crate) enum Payload {
    /// An action of the node's own action type.
    Action(Box<dyn Any + Send>),
    /// A raw value produced by one of the node's workers.
    WorkerOutput {
        worker: WorkerId,
        value: Box<dyn Any + Send>,
    },
}

/// An addressed payload waiting in the host's queue.
pub struct Envelope {
    pub(crate) path: Arc<[NodeId]>,
    pub(crate) payload: Payload,
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.payload {
            Payload::Action(_) => "action",
            Payload::WorkerOutput { .. } => "worker-output",
        };
        f.debug_struct("Envelope")
            .field("path", &self.path)
            .field("kind", &kind)
            .finish()
    }
}

/// Shared flag revoked when a node is torn down.
#[derive(Debug, Clone)]
pub(crate) struct Liveness(Arc<AtomicBool>);

impl Liveness {
    pub(crate) fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Revoke the flag.  Returns `true` if it was still alive.
    pub(crate) fn revoke(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

/// Per-host environment shared by every node of one tree.
pub(crate) struct TreeEnv {
    tx: mpsc::UnboundedSender<Envelope>,
    next_id: AtomicU64,
}

impl TreeEnv {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Envelope>) -> Self {
        Self {
            tx,
            next_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn next_node_id(&self) -> NodeId {
        NodeId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn next_worker_id(&self) -> WorkerId {
        WorkerId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Address for a new node below `parent` (or the root when `None`).
    pub(crate) fn address_below(&self, parent: Option<&Address>) -> Address {
        let id = self.next_node_id();
        let path: Arc<[NodeId]> = match parent {
            Some(parent) => parent.path.iter().copied().chain([id]).collect(),
            None => Arc::from([id]),
        };
        Address {
            tx: self.tx.clone(),
            path,
            liveness: Liveness::new(),
        }
    }
}

/// Where a node's actions are delivered.
///
/// An `Address` is the capability behind every [`Sink`](crate::Sink): the
/// host's queue, the path to the owning node, and the node's liveness flag.
/// Posting to the address of a torn-down node is a silent no-op.
#[derive(Clone)]
pub struct Address {
    tx: mpsc::UnboundedSender<Envelope>,
    path: Arc<[NodeId]>,
    liveness: Liveness,
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Address")
            .field("path", &self.path)
            .field("live", &self.is_live())
            .finish()
    }
}

impl Address {
    /// Create an address that is not attached to any tree.
    ///
    /// Actions posted to it are collected by the returned [`DetachedMailbox`].
    /// This is the seam test harnesses use to capture sink invocations from a
    /// simulated render pass.
    pub fn detached() -> (Address, DetachedMailbox) {
        let (tx, rx) = mpsc::unbounded_channel();
        let env = TreeEnv::new(tx);
        (env.address_below(None), DetachedMailbox { rx })
    }

    /// The node this address points to.
    pub fn node(&self) -> NodeId {
        // Paths are never empty: they always end with the addressed node.
        self.path[self.path.len() - 1]
    }

    /// Whether the addressed node is still mounted.
    pub fn is_live(&self) -> bool {
        self.liveness.is_alive()
    }

    pub(crate) fn liveness(&self) -> &Liveness {
        &self.liveness
    }

    /// Enqueue a payload.  Returns `false` if it was dropped.
    pub(crate) fn post(&self, payload: Payload) -> bool {
        if !self.liveness.is_alive() {
            tracing::trace!(node = %self.node(), "dropping payload for torn-down node");
            return false;
        }
        self.tx
            .send(Envelope {
                path: self.path.clone(),
                payload,
            })
            .is_ok()
    }
}

/// Receiving end of a [`detached`](Address::detached) address.
pub struct DetachedMailbox {
    rx: mpsc::UnboundedReceiver<Envelope>,
}

impl DetachedMailbox {
    /// Take the next posted action, if any, as an `A`.
    ///
    /// Worker outputs and actions of any other type are skipped.
    pub fn try_recv_action<A: 'static>(&mut self) -> Option<A> {
        while let Ok(envelope) = self.rx.try_recv() {
            if let Payload::Action(action) = envelope.payload {
                if let Ok(action) = action.downcast::<A>() {
                    return Some(*action);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_ids_are_never_reused() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let env = TreeEnv::new(tx);
        let a = env.next_node_id();
        let b = env.next_node_id();
        assert_ne!(a, b);
    }

    #[test]
    fn child_address_extends_parent_path() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let env = TreeEnv::new(tx);
        let root = env.address_below(None);
        let child = env.address_below(Some(&root));
        assert_eq!(child.path.len(), 2);
        assert_eq!(child.path[0], root.node());
    }

    #[test]
    fn revoked_address_drops_posts() {
        let (address, mut mailbox) = Address::detached();
        assert!(address.post(Payload::Action(Box::new(1u8))));
        address.liveness().revoke();
        assert!(!address.is_live());
        assert!(!address.post(Payload::Action(Box::new(2u8))));
        assert_eq!(mailbox.try_recv_action::<u8>(), Some(1));
        assert_eq!(mailbox.try_recv_action::<u8>(), None);
    }

    #[test]
    fn revoke_reports_first_transition_only() {
        let liveness = Liveness::new();
        assert!(liveness.revoke());
        assert!(!liveness.revoke());
    }
}
