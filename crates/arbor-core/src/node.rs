//! Live instances of workflows and their type-erased handles.

use crate::context::{ChildKey, RenderContext};
use crate::error::{HostError, RenderError};
use crate::mailbox::{Address, NodeId, Payload, TreeEnv};
use crate::snapshot::NodeSnapshot;
use crate::subtree::{PendingPass, RenderPass, SubtreeManager};
use crate::workflow::Workflow;
use std::any::{type_name, Any};
use std::sync::Arc;

/// Result of routing a payload to its node.
pub(crate) enum Delivery<O> {
    /// The addressed node (or the worker that produced the value) is gone.
    Stale,
    /// The payload was applied; the node produced this output, if any.
    Applied(Option<O>),
}

/// Object-safe view of a [`Workflow`] value, used to request children whose
/// concrete type is only known at the call site.
pub(crate) trait ErasedWorkflow: Send {
    fn as_any(&self) -> &dyn Any;
    fn workflow_name(&self) -> &'static str;
    fn child_key(&self, key: String) -> ChildKey;

    /// Start a node for this workflow below `parent` and render it.  The
    /// new node's own pass stays staged until it is committed.
    fn mount(
        self: Box<Self>,
        env: &Arc<TreeEnv>,
        parent: &Address,
    ) -> Result<(Box<dyn ErasedNode>, Box<dyn Any>), RenderError>;

    /// Hand this workflow to an existing node as its new props and render
    /// it.  The previous props are kept until the node is committed.
    fn rerender(self: Box<Self>, node: &mut dyn ErasedNode) -> Result<Box<dyn Any>, RenderError>;
}

impl<W: Workflow> ErasedWorkflow for W {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn workflow_name(&self) -> &'static str {
        type_name::<W>()
    }

    fn child_key(&self, key: String) -> ChildKey {
        ChildKey::of::<W>(key)
    }

    fn mount(
        self: Box<Self>,
        env: &Arc<TreeEnv>,
        parent: &Address,
    ) -> Result<(Box<dyn ErasedNode>, Box<dyn Any>), RenderError> {
        let mut node = WorkflowNode::new(*self, env.clone(), env.address_below(Some(parent)));
        let rendering = node.render()?;
        Ok((Box::new(node), Box::new(rendering)))
    }

    fn rerender(self: Box<Self>, node: &mut dyn ErasedNode) -> Result<Box<dyn Any>, RenderError> {
        let node = node
            .as_any_mut()
            .downcast_mut::<WorkflowNode<W>>()
            .ok_or(RenderError::TypeMismatch {
                expected: type_name::<WorkflowNode<W>>(),
            })?;
        node.stage_workflow(*self);
        Ok(Box::new(node.render()?))
    }
}

/// Object-safe view of a [`WorkflowNode`], so children of differing workflow
/// types can live in one map.
pub(crate) trait ErasedNode: Send {
    fn id(&self) -> NodeId;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn deliver(
        &mut self,
        path: &[NodeId],
        payload: Payload,
    ) -> Result<Delivery<Box<dyn Any + Send>>, HostError>;
    fn commit(&mut self);
    fn rollback(&mut self);
    fn teardown(&mut self);
    fn snapshot(&self, key: &str) -> NodeSnapshot;
}

/// One live instance of a workflow.
///
/// Owns the workflow's current props and state, its mounted children and
/// its running workers.  Between a render and the commit that follows it,
/// a node also holds what that render staged and the props it replaced.
/// Dropping a node tears it down.
pub(crate) struct WorkflowNode<W: Workflow> {
    workflow: W,
    replaced: Option<W>,
    state: W::State,
    subtree: SubtreeManager<W::Action>,
    pending: Option<PendingPass<W::Action>>,
    env: Arc<TreeEnv>,
    address: Address,
}

impl<W: Workflow> WorkflowNode<W> {
    pub(crate) fn new(workflow: W, env: Arc<TreeEnv>, address: Address) -> Self {
        let state = workflow.initial_state();
        tracing::trace!(node = %address.node(), workflow = type_name::<W>(), "node started");
        Self {
            workflow,
            replaced: None,
            state,
            subtree: SubtreeManager::default(),
            pending: None,
            env,
            address,
        }
    }

    pub(crate) fn address(&self) -> &Address {
        &self.address
    }

    /// Replace the props for the next render.  The replaced props come
    /// back if that render is rolled back.
    pub(crate) fn stage_workflow(&mut self, workflow: W) {
        let previous = std::mem::replace(&mut self.workflow, workflow);
        self.replaced.get_or_insert(previous);
    }

    /// Run one render pass over this node and its subtree.
    ///
    /// On success the pass is staged: call [`commit`](Self::commit) or
    /// [`rollback`](Self::rollback) before the next render.  On failure this
    /// node has already been rolled back.
    pub(crate) fn render(&mut self) -> Result<W::Rendering, RenderError> {
        let mut pending = PendingPass::default();
        let result = {
            let mut pass = RenderPass::begin(&mut self.subtree, &mut pending, &self.env, &self.address);
            let result = {
                let mut ctx = RenderContext::new(&mut pass);
                self.workflow.render(&self.state, &mut ctx)
            };
            pass.finish(result)
        };
        self.pending = Some(pending);
        if result.is_err() {
            self.rollback();
        }
        result
    }

    /// Apply the staged pass to this node and, recursively, its subtree.
    pub(crate) fn commit(&mut self) {
        self.replaced = None;
        if let Some(pending) = self.pending.take() {
            self.subtree.commit(pending, &self.env, &self.address);
        }
    }

    /// Discard the staged pass and restore the props it replaced.
    pub(crate) fn rollback(&mut self) {
        if let Some(previous) = self.replaced.take() {
            self.workflow = previous;
        }
        if let Some(pending) = self.pending.take() {
            self.subtree.rollback(pending);
        }
    }

    fn reduce(&mut self, action: W::Action) -> Option<W::Output> {
        self.workflow.reduce(&mut self.state, action)
    }

    /// Route `payload` along `path` (which starts with this node's id) and
    /// apply it.  Outputs of descendants are translated on the way back up.
    pub(crate) fn deliver(
        &mut self,
        path: &[NodeId],
        payload: Payload,
    ) -> Result<Delivery<W::Output>, HostError> {
        match path {
            [id] if *id == self.address.node() => self.apply(payload),
            [id, rest @ ..] if *id == self.address.node() => {
                let Some(slot) = self.subtree.child_mut(rest[0]) else {
                    return Ok(Delivery::Stale);
                };
                let action = match slot.node.deliver(rest, payload)? {
                    Delivery::Stale => return Ok(Delivery::Stale),
                    Delivery::Applied(None) => None,
                    Delivery::Applied(Some(output)) => (slot.on_output)(output),
                };
                Ok(Delivery::Applied(action.and_then(|action| self.reduce(action))))
            }
            _ => Ok(Delivery::Stale),
        }
    }

    fn apply(&mut self, payload: Payload) -> Result<Delivery<W::Output>, HostError> {
        match payload {
            Payload::Action(action) => {
                let action = action
                    .downcast::<W::Action>()
                    .map_err(|_| HostError::ActionTypeMismatch {
                        node: self.address.node(),
                        expected: type_name::<W::Action>(),
                    })?;
                Ok(Delivery::Applied(self.reduce(*action)))
            }
            Payload::WorkerOutput { worker, value } => match self.subtree.workers.map_output(worker, value) {
                None => Ok(Delivery::Stale),
                Some(None) => Ok(Delivery::Applied(None)),
                Some(Some(action)) => Ok(Delivery::Applied(self.reduce(action))),
            },
        }
    }

    /// Tear down this node: revoke its sinks, tear down its children
    /// depth-first, cancel its workers.  Idempotent.
    pub(crate) fn teardown(&mut self) {
        if !self.address.liveness().revoke() {
            return;
        }
        tracing::trace!(node = %self.address.node(), workflow = type_name::<W>(), "tearing down node");
        self.pending = None;
        self.subtree.teardown();
    }

    pub(crate) fn snapshot(&self, key: &str) -> NodeSnapshot {
        NodeSnapshot {
            id: self.address.node(),
            workflow: type_name::<W>(),
            key: key.to_string(),
            workers: self.subtree.workers.keys(),
            children: self.subtree.snapshots(),
        }
    }
}

impl<W: Workflow> Drop for WorkflowNode<W> {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl<W: Workflow> ErasedNode for WorkflowNode<W> {
    fn id(&self) -> NodeId {
        self.address.node()
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn deliver(
        &mut self,
        path: &[NodeId],
        payload: Payload,
    ) -> Result<Delivery<Box<dyn Any + Send>>, HostError> {
        Ok(match WorkflowNode::deliver(self, path, payload)? {
            Delivery::Stale => Delivery::Stale,
            Delivery::Applied(output) => {
                Delivery::Applied(output.map(|output| -> Box<dyn Any + Send> { Box::new(output) }))
            }
        })
    }

    fn commit(&mut self) {
        WorkflowNode::commit(self);
    }

    fn rollback(&mut self) {
        WorkflowNode::rollback(self);
    }

    fn teardown(&mut self) {
        WorkflowNode::teardown(self);
    }

    fn snapshot(&self, key: &str) -> NodeSnapshot {
        WorkflowNode::snapshot(self, key)
    }
}
