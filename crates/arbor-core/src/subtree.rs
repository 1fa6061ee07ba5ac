//! Reconciliation of a node's children and workers across render passes.
//!
//! A render pass only stages its changes.  Requested identities that existed
//! before are reused in place (their state survives), new identities start
//! fresh nodes on the side, and requested workers are collected.  Nothing
//! is torn down, swapped in or started until the host commits the whole
//! tree after the root's render succeeds.  If any node in the tree fails,
//! the host rolls the tree back instead: reused nodes get their previous
//! props back, started nodes are torn down, and the committed children and
//! workers are left exactly as they were.

use crate::context::{ChildKey, ChildRequest, OutputMap, RenderBackend, WorkerRequest};
use crate::error::RenderError;
use crate::mailbox::{Address, NodeId, TreeEnv};
use crate::node::ErasedNode;
use crate::snapshot::NodeSnapshot;
use crate::worker::{WorkerKey, WorkerSet};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::runtime::Handle;

/// A mounted child and the translation of its outputs into the parent's
/// actions (taken from the most recent committed render).
pub(crate) struct ChildSlot<A> {
    pub(crate) node: Box<dyn ErasedNode>,
    pub(crate) on_output: OutputMap<A>,
}

/// How a child requested during a pass relates to the committed children.
enum Visit<A> {
    /// An existing child, rendered in place.  Its new output mapping waits
    /// for the commit.
    Reused(OutputMap<A>),
    /// A node started during this pass.
    Started(ChildSlot<A>),
}

/// Everything one render pass over one node requested, held until the tree
/// is committed or rolled back.
pub(crate) struct PendingPass<A> {
    visits: HashMap<ChildKey, Visit<A>>,
    workers: HashMap<WorkerKey, WorkerRequest<A>>,
    runtime: Option<Handle>,
}

impl<A> Default for PendingPass<A> {
    fn default() -> Self {
        Self {
            visits: HashMap::new(),
            workers: HashMap::new(),
            runtime: None,
        }
    }
}

/// The children and workers owned by one node.
pub(crate) struct SubtreeManager<A> {
    children: HashMap<ChildKey, ChildSlot<A>>,
    pub(crate) workers: WorkerSet<A>,
}

impl<A> Default for SubtreeManager<A> {
    fn default() -> Self {
        Self {
            children: HashMap::new(),
            workers: WorkerSet::default(),
        }
    }
}

impl<A> SubtreeManager<A> {
    pub(crate) fn child_mut(&mut self, id: NodeId) -> Option<&mut ChildSlot<A>> {
        self.children.values_mut().find(|slot| slot.node.id() == id)
    }

    /// Make a staged pass the committed generation: commit every requested
    /// child, tear down children that were not requested, and reconcile the
    /// workers.
    pub(crate) fn commit(&mut self, pending: PendingPass<A>, env: &Arc<TreeEnv>, address: &Address) {
        let PendingPass {
            visits,
            workers,
            runtime,
        } = pending;

        let mut children = HashMap::with_capacity(visits.len());
        for (key, visit) in visits {
            let mut slot = match visit {
                Visit::Reused(on_output) => match self.children.remove(&key) {
                    Some(mut slot) => {
                        slot.on_output = on_output;
                        slot
                    }
                    None => continue,
                },
                Visit::Started(slot) => {
                    tracing::trace!(parent = %address.node(), child = ?key, "child started");
                    slot
                }
            };
            slot.node.commit();
            children.insert(key, slot);
        }

        for (key, mut slot) in self.children.drain() {
            tracing::trace!(parent = %address.node(), child = ?key, "child no longer rendered");
            slot.node.teardown();
        }
        self.children = children;
        self.workers.reconcile(workers, runtime.as_ref(), env, address);
    }

    /// Discard a staged pass.  Reused children are rolled back in place and
    /// nodes started by the pass are torn down.
    pub(crate) fn rollback(&mut self, pending: PendingPass<A>) {
        for (key, visit) in pending.visits {
            match visit {
                Visit::Reused(_) => {
                    if let Some(slot) = self.children.get_mut(&key) {
                        slot.node.rollback();
                    }
                }
                Visit::Started(mut slot) => {
                    slot.node.rollback();
                    slot.node.teardown();
                }
            }
        }
    }

    /// Tear down every child depth-first, then cancel every worker.
    pub(crate) fn teardown(&mut self) {
        for (_, mut slot) in self.children.drain() {
            slot.node.teardown();
        }
        self.workers.shutdown();
    }

    pub(crate) fn snapshots(&self) -> Vec<NodeSnapshot> {
        let mut keys: Vec<_> = self.children.keys().collect();
        keys.sort();
        keys.into_iter()
            .map(|key| self.children[key].node.snapshot(key.key()))
            .collect()
    }
}

/// One render pass over one node's subtree.  Implements the live
/// [`RenderBackend`].
pub(crate) struct RenderPass<'a, A> {
    manager: &'a mut SubtreeManager<A>,
    pending: &'a mut PendingPass<A>,
    env: &'a Arc<TreeEnv>,
    address: &'a Address,
    violation: Option<RenderError>,
}

impl<'a, A> RenderPass<'a, A> {
    pub(crate) fn begin(
        manager: &'a mut SubtreeManager<A>,
        pending: &'a mut PendingPass<A>,
        env: &'a Arc<TreeEnv>,
        address: &'a Address,
    ) -> Self {
        Self {
            manager,
            pending,
            env,
            address,
            violation: None,
        }
    }

    fn violate(&mut self, error: RenderError) -> RenderError {
        self.violation.get_or_insert_with(|| error.clone());
        error
    }

    /// Complete the pass with the workflow's result.
    ///
    /// A contract violation recorded during the pass wins over the
    /// workflow's own result.
    pub(crate) fn finish<R>(mut self, result: Result<R, RenderError>) -> Result<R, RenderError> {
        let result = match self.violation.take() {
            Some(violation) => Err(violation),
            None => result,
        };
        if let Err(error) = &result {
            tracing::debug!(node = %self.address.node(), %error, "render pass failed");
        }
        result
    }
}

impl<A> RenderBackend<A> for RenderPass<'_, A> {
    fn render_child(&mut self, request: ChildRequest<A>) -> Result<Box<dyn Any>, RenderError> {
        if self.pending.visits.contains_key(&request.key) {
            let key = request.key;
            return Err(self.violate(RenderError::DuplicateChild {
                workflow: key.workflow_name(),
                key: key.key().to_string(),
            }));
        }

        let ChildRequest {
            key,
            workflow,
            on_output,
        } = request;

        match self.manager.children.get_mut(&key) {
            // A failed rerender has already rolled the child back.
            Some(slot) => match workflow.rerender(slot.node.as_mut()) {
                Ok(rendering) => {
                    self.pending.visits.insert(key, Visit::Reused(on_output));
                    Ok(rendering)
                }
                Err(error) => Err(self.violate(error)),
            },
            None => match workflow.mount(self.env, self.address) {
                Ok((node, rendering)) => {
                    self.pending
                        .visits
                        .insert(key, Visit::Started(ChildSlot { node, on_output }));
                    Ok(rendering)
                }
                Err(error) => Err(self.violate(error)),
            },
        }
    }

    fn run_worker(&mut self, request: WorkerRequest<A>) -> Result<(), RenderError> {
        if self.pending.workers.contains_key(&request.key) {
            let key = &request.key;
            let error = RenderError::DuplicateWorker {
                worker: key.worker_name(),
                key: key.key().to_string(),
            };
            return Err(self.violate(error));
        }
        if self.pending.runtime.is_none() && !self.manager.workers.is_running(&request) {
            match Handle::try_current() {
                Ok(runtime) => self.pending.runtime = Some(runtime),
                Err(_) => {
                    let error = RenderError::NoAsyncRuntime {
                        worker: request.key.worker_name(),
                    };
                    return Err(self.violate(error));
                }
            }
        }
        self.pending.workers.insert(request.key.clone(), request);
        Ok(())
    }

    fn address(&self) -> Address {
        self.address.clone()
    }
}
