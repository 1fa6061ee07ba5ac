use arbor_core::{ChildRequest, Worker, WorkerRequest, Workflow};
use std::any::Any;

/// A child the workflow under test is expected to render, with the canned
/// rendering to hand back in place of actually running it.
///
/// # Example
///
/// ```rust,ignore
/// let expected = ExpectedWorkflow::<TodoEdit>::new("edit", edit_screen)
///     .props(|edit| assert_eq!(edit.title, "Milk"))
///     .output(TodoEditOutput::Save("Milk".into()));
/// ```
pub struct ExpectedWorkflow<C: Workflow> {
    key: String,
    rendering: C::Rendering,
    output: Option<C::Output>,
    check: Option<Box<dyn FnOnce(&C)>>,
}

impl<C: Workflow> ExpectedWorkflow<C> {
    /// Expect a child of type `C` rendered with `key`, and answer with
    /// `rendering`.
    pub fn new(key: impl Into<String>, rendering: C::Rendering) -> Self {
        Self {
            key: key.into(),
            rendering,
            output: None,
            check: None,
        }
    }

    /// Simulate the child emitting `output` during the render.
    pub fn output(mut self, output: C::Output) -> Self {
        self.output = Some(output);
        self
    }

    /// Inspect the props the parent rendered the child with.
    pub fn props(mut self, check: impl FnOnce(&C) + 'static) -> Self {
        self.check = Some(Box::new(check));
        self
    }
}

/// A worker the workflow under test is expected to run.
pub struct ExpectedWorker<K: Worker> {
    key: String,
    output: Option<K::Output>,
    check: Option<Box<dyn FnOnce(&K)>>,
}

impl<K: Worker> ExpectedWorker<K> {
    /// Expect a worker of type `K` run with `key`.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            output: None,
            check: None,
        }
    }

    /// Simulate the worker producing `output` during the render.
    pub fn output(mut self, output: K::Output) -> Self {
        self.output = Some(output);
        self
    }

    /// Inspect the worker the parent requested.
    pub fn config(mut self, check: impl FnOnce(&K) + 'static) -> Self {
        self.check = Some(Box::new(check));
        self
    }
}

/// What a fulfilled expectation hands back to the simulated pass.
pub(crate) struct Fulfilled<A> {
    pub(crate) rendering: Box<dyn Any>,
    pub(crate) action: Option<A>,
}

pub(crate) trait ChildExpectation<A> {
    fn matches(&self, request: &ChildRequest<A>) -> bool;
    fn describe(&self) -> String;
    fn fulfil(self: Box<Self>, request: &ChildRequest<A>) -> Fulfilled<A>;
}

impl<C: Workflow, A> ChildExpectation<A> for ExpectedWorkflow<C> {
    fn matches(&self, request: &ChildRequest<A>) -> bool {
        request.key().is::<C>() && request.key().key() == self.key
    }

    fn describe(&self) -> String {
        format!("{}({:?})", std::any::type_name::<C>(), self.key)
    }

    fn fulfil(self: Box<Self>, request: &ChildRequest<A>) -> Fulfilled<A> {
        if let Some(check) = self.check {
            match request.workflow::<C>() {
                Some(props) => check(props),
                None => panic!("child {:?} was not rendered with a {}", request.key(), std::any::type_name::<C>()),
            }
        }
        let action = self
            .output
            .and_then(|output| request.map_output(Box::new(output)));
        Fulfilled {
            rendering: Box::new(self.rendering),
            action,
        }
    }
}

pub(crate) trait WorkerExpectation<A> {
    fn matches(&self, request: &WorkerRequest<A>) -> bool;
    fn describe(&self) -> String;
    fn fulfil(self: Box<Self>, request: &WorkerRequest<A>) -> Option<A>;
}

impl<K: Worker, A> WorkerExpectation<A> for ExpectedWorker<K> {
    fn matches(&self, request: &WorkerRequest<A>) -> bool {
        request.key().is::<K>() && request.key().key() == self.key
    }

    fn describe(&self) -> String {
        format!("{}({:?})", std::any::type_name::<K>(), self.key)
    }

    fn fulfil(self: Box<Self>, request: &WorkerRequest<A>) -> Option<A> {
        if let Some(check) = self.check {
            match request.worker::<K>() {
                Some(worker) => check(worker),
                None => panic!("worker {:?} is not a {}", request.key(), std::any::type_name::<K>()),
            }
        }
        self.output
            .and_then(|output| request.map_output(Box::new(output)))
    }
}
