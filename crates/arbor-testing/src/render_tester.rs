use crate::expectation::{ChildExpectation, ExpectedWorker, ExpectedWorkflow, WorkerExpectation};
use arbor_core::{
    Address, ChildKey, ChildRequest, DetachedMailbox, RenderBackend, RenderContext, RenderError,
    Worker, WorkerKey, WorkerRequest, Workflow,
};
use std::any::Any;
use std::collections::HashSet;
use std::fmt;

/// Renders one workflow in isolation, with its children and workers
/// replaced by expectations.
///
/// `RenderTester` runs a single simulated render pass -- no host, no tokio
/// runtime.  Every child and worker the workflow requests must match an
/// expectation, which supplies the child's rendering and, optionally, an
/// output to feed back.  At most one action may be produced per render
/// (from a child output, a worker output, or a sink invoked inside the
/// assertion closure); it is applied to the state with
/// [`Workflow::reduce`].
///
/// Mismatches panic with a descriptive message, so tests read as
/// assertions.
///
/// # Example
///
/// ```rust,ignore
/// use arbor_testing::{ExpectedWorkflow, RenderTesterExt};
///
/// TodoList { items }
///     .render_tester(TodoListState::default())
///     .expect_workflow(ExpectedWorkflow::<TodoEdit>::new("edit", edit_screen)
///         .output(TodoEditOutput::Discard))
///     .render(|screen| assert_eq!(screen.rows.len(), 1))
///     .assert_state(|state| assert!(state.editing.is_none()));
/// ```
pub struct RenderTester<W: Workflow> {
    workflow: W,
    state: W::State,
    children: Vec<Box<dyn ChildExpectation<W::Action>>>,
    workers: Vec<Box<dyn WorkerExpectation<W::Action>>>,
}

impl<W: Workflow> RenderTester<W> {
    /// A tester starting from the workflow's initial state.
    pub fn new(workflow: W) -> Self {
        let state = workflow.initial_state();
        Self::with_state(workflow, state)
    }

    /// A tester starting from `state`.
    pub fn with_state(workflow: W, state: W::State) -> Self {
        Self {
            workflow,
            state,
            children: Vec::new(),
            workers: Vec::new(),
        }
    }

    /// Expect the workflow to render the described child exactly once.
    pub fn expect_workflow<C: Workflow>(mut self, expected: ExpectedWorkflow<C>) -> Self {
        self.children.push(Box::new(expected));
        self
    }

    /// Expect the workflow to run the described worker exactly once.
    pub fn expect_worker<K: Worker>(mut self, expected: ExpectedWorker<K>) -> Self {
        self.workers.push(Box::new(expected));
        self
    }

    /// Run the render pass, hand the rendering to `assertions`, then apply
    /// the (at most one) action the pass produced.
    ///
    /// # Panics
    ///
    /// If the workflow requests a child or worker that was not expected,
    /// leaves an expectation unfulfilled, breaks a usage contract, or
    /// produces more than one action.
    pub fn render(self, assertions: impl FnOnce(&W::Rendering)) -> RenderTesterResult<W> {
        let Self {
            workflow,
            mut state,
            children,
            workers,
        } = self;
        let (address, mut mailbox) = Address::detached();
        let mut backend = SimulatedPass {
            workflow: std::any::type_name::<W>(),
            address,
            children,
            workers,
            rendered: HashSet::new(),
            ran: HashSet::new(),
            actions: Vec::new(),
            violation: None,
        };

        let result = {
            let mut ctx = RenderContext::new(&mut backend);
            workflow.render(&state, &mut ctx)
        };
        let rendering = match (backend.violation.take(), result) {
            (Some(violation), _) | (None, Err(violation)) => {
                panic!("rendering {} failed: {violation}", backend.workflow)
            }
            (None, Ok(rendering)) => rendering,
        };
        backend.assert_fulfilled();

        assertions(&rendering);

        let mut actions = std::mem::take(&mut backend.actions);
        while let Some(action) = mailbox.try_recv_action::<W::Action>() {
            actions.push(action);
        }
        assert!(
            actions.len() <= 1,
            "rendering {} produced {} actions; a single render may produce at most one",
            backend.workflow,
            actions.len()
        );
        let output = actions
            .pop()
            .and_then(|action| workflow.reduce(&mut state, action));

        RenderTesterResult {
            workflow,
            state,
            output,
            rendering,
            mailbox,
        }
    }
}

/// Adds [`render_tester`](RenderTesterExt::render_tester) to every
/// [`Workflow`].
pub trait RenderTesterExt: Workflow {
    /// Start a [`RenderTester`] for this workflow with the given state.
    fn render_tester(self, state: Self::State) -> RenderTester<Self> {
        RenderTester::with_state(self, state)
    }
}

impl<W: Workflow> RenderTesterExt for W {}

/// The outcome of [`RenderTester::render`].
pub struct RenderTesterResult<W: Workflow> {
    workflow: W,
    state: W::State,
    output: Option<W::Output>,
    rendering: W::Rendering,
    mailbox: DetachedMailbox,
}

impl<W: Workflow> RenderTesterResult<W> {
    /// State after the produced action (if any) was applied.
    pub fn state(&self) -> &W::State {
        &self.state
    }

    /// Output of the applied action, if it produced one.
    pub fn output(&self) -> Option<&W::Output> {
        self.output.as_ref()
    }

    /// The rendering the pass produced.
    pub fn rendering(&self) -> &W::Rendering {
        &self.rendering
    }

    /// Run `check` against the resulting state.  Chainable.
    pub fn assert_state(&self, check: impl FnOnce(&W::State)) -> &Self {
        check(&self.state);
        self
    }

    /// Run `check` against the output of the applied action, `None` if
    /// there was none.  Chainable.
    pub fn assert_output(&self, check: impl FnOnce(Option<&W::Output>)) -> &Self {
        check(self.output.as_ref());
        self
    }

    /// Apply, in order, every action sent since the render through sinks
    /// found in the rendering.  Returns the outputs they produced.
    pub fn apply_sink_actions(&mut self) -> Vec<W::Output> {
        let mut outputs = Vec::new();
        while let Some(action) = self.mailbox.try_recv_action::<W::Action>() {
            outputs.extend(self.workflow.reduce(&mut self.state, action));
        }
        outputs
    }

    /// Continue with another render starting from the resulting state.
    pub fn into_tester(self) -> RenderTester<W> {
        RenderTester::with_state(self.workflow, self.state)
    }

    /// Consume the result, keeping only the resulting state.
    pub fn into_state(self) -> W::State {
        self.state
    }
}

impl<W: Workflow> fmt::Debug for RenderTesterResult<W>
where
    W::State: fmt::Debug,
    W::Output: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderTesterResult")
            .field("state", &self.state)
            .field("output", &self.output)
            .finish()
    }
}

/// Stand-in for a live render pass.
struct SimulatedPass<A> {
    workflow: &'static str,
    address: Address,
    children: Vec<Box<dyn ChildExpectation<A>>>,
    workers: Vec<Box<dyn WorkerExpectation<A>>>,
    rendered: HashSet<ChildKey>,
    ran: HashSet<WorkerKey>,
    actions: Vec<A>,
    violation: Option<RenderError>,
}

impl<A> SimulatedPass<A> {
    fn violate(&mut self, error: RenderError) -> RenderError {
        self.violation.get_or_insert_with(|| error.clone());
        error
    }

    fn assert_fulfilled(&self) {
        let missing: Vec<String> = self
            .children
            .iter()
            .map(|expected| expected.describe())
            .chain(self.workers.iter().map(|expected| expected.describe()))
            .collect();
        assert!(
            missing.is_empty(),
            "rendering {} did not request expected {}",
            self.workflow,
            missing.join(", ")
        );
    }
}

impl<A> RenderBackend<A> for SimulatedPass<A> {
    fn render_child(&mut self, request: ChildRequest<A>) -> Result<Box<dyn Any>, RenderError> {
        let key = request.key().clone();
        if !self.rendered.insert(key.clone()) {
            return Err(self.violate(RenderError::DuplicateChild {
                workflow: key.workflow_name(),
                key: key.key().to_string(),
            }));
        }
        let Some(index) = self.children.iter().position(|expected| expected.matches(&request)) else {
            panic!("rendering {} requested unexpected child {key:?}", self.workflow);
        };
        let fulfilled = self.children.remove(index).fulfil(&request);
        self.actions.extend(fulfilled.action);
        Ok(fulfilled.rendering)
    }

    fn run_worker(&mut self, request: WorkerRequest<A>) -> Result<(), RenderError> {
        let key = request.key().clone();
        if !self.ran.insert(key.clone()) {
            return Err(self.violate(RenderError::DuplicateWorker {
                worker: key.worker_name(),
                key: key.key().to_string(),
            }));
        }
        let Some(index) = self.workers.iter().position(|expected| expected.matches(&request)) else {
            panic!("rendering {} requested unexpected worker {key:?}", self.workflow);
        };
        let action = self.workers.remove(index).fulfil(&request);
        self.actions.extend(action);
        Ok(())
    }

    fn address(&self) -> Address {
        self.address.clone()
    }
}
