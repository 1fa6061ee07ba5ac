use crate::any_workflow::AnyWorkflow;
use crate::context::RenderContext;
use crate::error::RenderError;

/// The contract every composable unit of the tree implements.
///
/// A `Workflow` is pure data plus pure functions.  The workflow value itself
/// is the unit's *props*: a parent constructs a fresh value on every render
/// and the runtime hands it to the already-running node, whose state is kept.
/// The runtime drives each node through a fixed cycle:
///
/// 1. [`initial_state`](Workflow::initial_state) is called once, when a
///    render pass first requests the node's identity.
/// 2. [`render`](Workflow::render) turns the current state into a
///    `Rendering`, requesting children, workers and sinks through the
///    [`RenderContext`].
/// 3. Actions (from sinks, child outputs, or workers) are applied with
///    [`reduce`](Workflow::reduce), which is the only place state changes.
///    A reducer may yield an `Output` for the parent.
/// 4. Steps 2-3 repeat until a render pass no longer requests the node.
///
/// Units with no output or no actions use [`std::convert::Infallible`].
///
/// # Example
///
/// ```rust
/// use arbor_core::{RenderContext, RenderError, Workflow};
/// use std::convert::Infallible;
///
/// struct Counter;
///
/// enum Action {
///     Increment,
///     Reset,
/// }
///
/// impl Workflow for Counter {
///     type State = i64;
///     type Action = Action;
///     type Output = Infallible;
///     type Rendering = i64;
///
///     fn initial_state(&self) -> i64 {
///         0
///     }
///
///     fn render(&self, state: &i64, _ctx: &mut RenderContext<'_, Action>) -> Result<i64, RenderError> {
///         Ok(*state)
///     }
///
///     fn reduce(&self, state: &mut i64, action: Action) -> Option<Infallible> {
///         match action {
///             Action::Increment => *state += 1,
///             Action::Reset => *state = 0,
///         }
///         None
///     }
/// }
/// ```
pub trait Workflow: Send + Sized + 'static {
    /// State owned exclusively by the node.
    type State: Send + 'static;

    /// Values applied to the state by [`reduce`](Workflow::reduce).
    type Action: Send + 'static;

    /// Values surfaced to the parent, at most one per applied action.
    type Output: Send + 'static;

    /// The value [`render`](Workflow::render) produces.  Opaque to the runtime.
    type Rendering: Send + 'static;

    /// Construct the state for a newly created node.
    fn initial_state(&self) -> Self::State;

    /// Compute the rendering for `state`.
    ///
    /// Must be free of side effects beyond what it requests through `ctx`.
    /// Errors returned by the context are usage-contract violations and
    /// should be propagated with `?`.
    fn render(
        &self,
        state: &Self::State,
        ctx: &mut RenderContext<'_, Self::Action>,
    ) -> Result<Self::Rendering, RenderError>;

    /// Apply an action to the state, optionally producing an output for the
    /// parent.
    fn reduce(&self, state: &mut Self::State, action: Self::Action) -> Option<Self::Output>;
}

/// Convenience methods available on every [`Workflow`].
pub trait WorkflowExt: Workflow {
    /// Render this workflow as a child of the node owning `ctx`.
    ///
    /// Shorthand for [`RenderContext::render_child`].
    fn rendered_in<A: Send + 'static>(
        self,
        ctx: &mut RenderContext<'_, A>,
        key: impl Into<String>,
        on_output: impl Fn(Self::Output) -> A + Send + 'static,
    ) -> Result<Self::Rendering, RenderError> {
        ctx.render_child(self, key, on_output)
    }

    /// Erase the concrete type of this workflow.
    fn into_any(self) -> AnyWorkflow<Self::Rendering, Self::Output>
    where
        Self: Clone + Sync,
    {
        AnyWorkflow::new(self)
    }

    /// Erase the concrete type and transform the rendering.
    fn map_rendering<R: 'static>(
        self,
        f: impl Fn(Self::Rendering) -> R + Send + Sync + 'static,
    ) -> AnyWorkflow<R, Self::Output>
    where
        Self: Clone + Sync,
    {
        AnyWorkflow::new(self).map_rendering(f)
    }
}

impl<W: Workflow> WorkflowExt for W {}
