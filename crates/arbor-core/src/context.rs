use crate::any_workflow::AnyWorkflow;
use crate::error::RenderError;
use crate::mailbox::Address;
use crate::node::ErasedWorkflow;
use crate::sink::Sink;
use crate::worker::{ErasedWorker, Worker, WorkerKey};
use crate::workflow::Workflow;
use std::any::{Any, TypeId};
use std::cmp::Ordering;
use std::fmt;

/// Translates a type-erased output into an action of the receiving node.
///
/// Returns `None` when the receiver declared no interest in the output.
pub type OutputMap<A> = Box<dyn Fn(Box<dyn Any + Send>) -> Option<A> + Send>;

/// Identity of a child among its siblings: (workflow type, instance key).
///
/// Two requests with the same `ChildKey` in consecutive render passes refer
/// to the same node.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ChildKey {
    type_id: TypeId,
    type_name: &'static str,
    key: String,
}

impl ChildKey {
    /// Key for a child of workflow type `W`.
    pub fn of<W: 'static>(key: impl Into<String>) -> Self {
        Self {
            type_id: TypeId::of::<W>(),
            type_name: std::any::type_name::<W>(),
            key: key.into(),
        }
    }

    /// Type name of the child workflow.
    pub fn workflow_name(&self) -> &'static str {
        self.type_name
    }

    /// The instance key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether this key identifies a workflow of type `W`.
    pub fn is<W: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<W>()
    }
}

impl fmt::Debug for ChildKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", self.type_name, self.key)
    }
}

impl PartialOrd for ChildKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ChildKey {
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.key, self.type_name, self.type_id).cmp(&(&other.key, other.type_name, other.type_id))
    }
}

/// A request, made during a render pass, for a child's rendering.
pub struct ChildRequest<A> {
    pub(crate) key: ChildKey,
    pub(crate) workflow: Box<dyn ErasedWorkflow>,
    pub(crate) on_output: OutputMap<A>,
}

impl<A> ChildRequest<A> {
    pub(crate) fn new(workflow: Box<dyn ErasedWorkflow>, key: String, on_output: OutputMap<A>) -> Self {
        Self {
            key: workflow.child_key(key),
            workflow,
            on_output,
        }
    }

    /// Identity of the requested child.
    pub fn key(&self) -> &ChildKey {
        &self.key
    }

    /// The requested workflow value (the child's props), if it is a `C`.
    pub fn workflow<C: 'static>(&self) -> Option<&C> {
        self.workflow.as_any().downcast_ref::<C>()
    }

    /// Translate an output of the child into the requester's action.
    pub fn map_output(&self, output: Box<dyn Any + Send>) -> Option<A> {
        (self.on_output)(output)
    }
}

/// A request, made during a render pass, to keep a worker running.
pub struct WorkerRequest<A> {
    pub(crate) key: WorkerKey,
    pub(crate) worker: Box<dyn ErasedWorker>,
    pub(crate) on_output: OutputMap<A>,
}

impl<A> WorkerRequest<A> {
    /// Identity of the requested worker.
    pub fn key(&self) -> &WorkerKey {
        &self.key
    }

    /// The requested worker (its configuration), if it is a `K`.
    pub fn worker<K: 'static>(&self) -> Option<&K> {
        self.worker.as_any().downcast_ref::<K>()
    }

    /// Translate a worker output into the requester's action.
    pub fn map_output(&self, output: Box<dyn Any + Send>) -> Option<A> {
        (self.on_output)(output)
    }
}

/// What a [`RenderContext`] delegates to.
///
/// The runtime implements this for live render passes.  A test harness can
/// implement it to render a workflow against stubbed children and workers
/// without running them.
pub trait RenderBackend<A> {
    /// Produce the rendering of the requested child.
    ///
    /// The returned box must hold the child's `Rendering` type.
    fn render_child(&mut self, request: ChildRequest<A>) -> Result<Box<dyn Any>, RenderError>;

    /// Ensure the requested worker is running for the duration of this pass.
    fn run_worker(&mut self, request: WorkerRequest<A>) -> Result<(), RenderError>;

    /// Address of the node being rendered.
    fn address(&self) -> Address;
}

/// The capabilities handed to [`Workflow::render`] for one render pass.
///
/// A `RenderContext` borrows the pass that created it, so it cannot outlive
/// the `render` call it was passed to.
///
/// # Example
///
/// ```rust,ignore
/// fn render(&self, state: &State, ctx: &mut RenderContext<'_, Action>) -> Result<Screen, RenderError> {
///     let editor = ctx.render_child(Editor { text: state.draft.clone() }, "editor", Action::Edited)?;
///     ctx.run_worker(After::new(Duration::from_secs(5)), "autosave", |_| Action::Autosave)?;
///     Ok(Screen { editor, on_close: ctx.make_sink().contramap(|()| Action::Close) })
/// }
/// ```
pub struct RenderContext<'a, A> {
    backend: &'a mut dyn RenderBackend<A>,
}

impl<A> fmt::Debug for RenderContext<'_, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderContext")
            .field("node", &self.backend.address().node())
            .finish()
    }
}

impl<'a, A: Send + 'static> RenderContext<'a, A> {
    /// Wrap a backend.
    pub fn new(backend: &'a mut dyn RenderBackend<A>) -> Self {
        Self { backend }
    }

    /// Render a child workflow and translate its outputs with `on_output`.
    ///
    /// If a child with the same type and `key` was rendered in the previous
    /// pass, that node is reused and receives `child` as its new props;
    /// otherwise a new node is started.  Requesting the same identity twice
    /// in one pass fails with [`RenderError::DuplicateChild`].
    pub fn render_child<C: Workflow>(
        &mut self,
        child: C,
        key: impl Into<String>,
        on_output: impl Fn(C::Output) -> A + Send + 'static,
    ) -> Result<C::Rendering, RenderError> {
        let on_output: OutputMap<A> = Box::new(move |output| {
            output
                .downcast::<C::Output>()
                .ok()
                .map(|output| on_output(*output))
        });
        let rendering = self
            .backend
            .render_child(ChildRequest::new(Box::new(child), key.into(), on_output))?;
        downcast_rendering::<C::Rendering>(rendering)
    }

    /// Render a child workflow, discarding its outputs.
    pub fn render_child_ignoring_output<C: Workflow>(
        &mut self,
        child: C,
        key: impl Into<String>,
    ) -> Result<C::Rendering, RenderError> {
        let rendering = self.backend.render_child(ChildRequest::new(
            Box::new(child),
            key.into(),
            Box::new(|_| None),
        ))?;
        downcast_rendering::<C::Rendering>(rendering)
    }

    /// Render a type-erased child.
    ///
    /// Identity is the wrapped workflow's type plus `key`.
    pub fn render_any<R: 'static, O: Send + 'static>(
        &mut self,
        child: &AnyWorkflow<R, O>,
        key: impl Into<String>,
        on_output: impl Fn(O) -> A + Send + 'static,
    ) -> Result<R, RenderError> {
        let on_output: OutputMap<A> = Box::new(move |output| {
            output.downcast::<O>().ok().map(|output| on_output(*output))
        });
        let (workflow, map) = child.instantiate();
        let rendering = self
            .backend
            .render_child(ChildRequest::new(workflow, key.into(), on_output))?;
        map(rendering)
    }

    /// Keep `worker` running while this node keeps requesting it.
    ///
    /// Values the worker produces are translated with `on_output` and
    /// delivered to this node as actions, one render pass each.  Requesting
    /// the same (worker type, key) twice in one pass fails with
    /// [`RenderError::DuplicateWorker`].
    pub fn run_worker<K: Worker>(
        &mut self,
        worker: K,
        key: impl Into<String>,
        on_output: impl Fn(K::Output) -> A + Send + 'static,
    ) -> Result<(), RenderError> {
        let on_output: OutputMap<A> = Box::new(move |output| {
            output
                .downcast::<K::Output>()
                .ok()
                .map(|output| on_output(*output))
        });
        self.backend.run_worker(WorkerRequest {
            key: WorkerKey::of::<K>(key),
            worker: Box::new(worker),
            on_output,
        })
    }

    /// A sink delivering actions to this node.
    pub fn make_sink(&mut self) -> Sink<A> {
        Sink::new(self.backend.address())
    }
}

pub(crate) fn downcast_rendering<R: 'static>(rendering: Box<dyn Any>) -> Result<R, RenderError> {
    rendering
        .downcast::<R>()
        .map(|rendering| *rendering)
        .map_err(|_| RenderError::TypeMismatch {
            expected: std::any::type_name::<R>(),
        })
}
