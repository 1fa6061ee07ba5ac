use crate::context::downcast_rendering;
use crate::error::RenderError;
use crate::node::ErasedWorkflow;
use crate::workflow::Workflow;
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

type RenderingMap<R> = Arc<dyn Fn(Box<dyn Any>) -> Result<R, RenderError> + Send + Sync>;
type Factory = Arc<dyn Fn() -> Box<dyn ErasedWorkflow> + Send + Sync>;

/// A workflow whose concrete type has been erased.
///
/// `AnyWorkflow<R, O>` holds any workflow whose output is `O`, together with
/// a function turning its rendering into `R`.  It lets a parent render
/// children whose type is only decided at runtime.  Rendering it behaves
/// exactly like rendering the wrapped workflow: the node's identity is the
/// *wrapped* type plus the key, so swapping in a workflow of another type
/// under the same key replaces the node.
///
/// `AnyWorkflow` is cheap to clone, so a parent can keep one in its own props
/// and render it on every pass.
///
/// Build one with [`WorkflowExt::into_any`](crate::WorkflowExt::into_any) or
/// [`WorkflowExt::map_rendering`](crate::WorkflowExt::map_rendering), and
/// render it with [`RenderContext::render_any`](crate::RenderContext::render_any).
pub struct AnyWorkflow<R, O> {
    factory: Factory,
    workflow_name: &'static str,
    map: RenderingMap<R>,
    _output: PhantomData<fn() -> O>,
}

impl<R, O> Clone for AnyWorkflow<R, O> {
    fn clone(&self) -> Self {
        Self {
            factory: self.factory.clone(),
            workflow_name: self.workflow_name,
            map: self.map.clone(),
            _output: PhantomData,
        }
    }
}

impl<R, O> fmt::Debug for AnyWorkflow<R, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyWorkflow")
            .field("workflow", &self.workflow_name)
            .finish()
    }
}

impl<R: 'static, O> AnyWorkflow<R, O> {
    /// Erase `workflow`.
    pub fn new<W>(workflow: W) -> Self
    where
        W: Workflow<Rendering = R, Output = O> + Clone + Sync,
    {
        Self {
            factory: Arc::new(move || -> Box<dyn ErasedWorkflow> { Box::new(workflow.clone()) }),
            workflow_name: std::any::type_name::<W>(),
            map: Arc::new(downcast_rendering::<W::Rendering>),
            _output: PhantomData,
        }
    }

    /// Type name of the wrapped workflow.
    pub fn workflow_name(&self) -> &'static str {
        self.workflow_name
    }

    /// Transform the rendering produced by the wrapped workflow.
    pub fn map_rendering<T: 'static>(
        self,
        f: impl Fn(R) -> T + Send + Sync + 'static,
    ) -> AnyWorkflow<T, O> {
        let map = self.map;
        AnyWorkflow {
            factory: self.factory,
            workflow_name: self.workflow_name,
            map: Arc::new(move |rendering: Box<dyn Any>| map(rendering).map(&f)),
            _output: PhantomData,
        }
    }

    pub(crate) fn instantiate(&self) -> (Box<dyn ErasedWorkflow>, RenderingMap<R>) {
        ((self.factory)(), self.map.clone())
    }
}
