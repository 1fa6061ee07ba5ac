use crate::mailbox::NodeId;

/// A usage-contract violation detected during a render pass.
///
/// These errors indicate a structural bug in the workflow that produced them
/// (for example, rendering the same child twice in one pass).  They abort the
/// offending render pass and are surfaced to whoever started it: the parent
/// node, and ultimately the [`WorkflowHost`](crate::WorkflowHost) caller.
///
/// Once a violation has been reported in a pass, the pass fails even if the
/// workflow discarded the `Err` returned by the [`RenderContext`](crate::RenderContext).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    /// The same (workflow type, key) pair was requested twice in one pass.
    #[error("child workflow `{workflow}` with key {key:?} was rendered more than once in the same render pass")]
    DuplicateChild {
        /// Type name of the child workflow.
        workflow: &'static str,
        /// Instance key of the child.
        key: String,
    },

    /// The same (worker type, key) pair was requested twice in one pass.
    #[error("worker `{worker}` with key {key:?} was run more than once in the same render pass")]
    DuplicateWorker {
        /// Type name of the worker.
        worker: &'static str,
        /// Instance key of the worker.
        key: String,
    },

    /// A worker had to be started but no tokio runtime was available.
    #[error("worker `{worker}` must be started from within a tokio runtime")]
    NoAsyncRuntime {
        /// Type name of the worker.
        worker: &'static str,
    },

    /// A type-erased value (rendering, node, or action) had an unexpected type.
    #[error("expected a value of type `{expected}`")]
    TypeMismatch {
        /// Type name that was expected.
        expected: &'static str,
    },
}

/// Errors returned by a [`WorkflowHost`](crate::WorkflowHost).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    /// A render pass failed with a usage-contract violation.
    #[error("render pass failed: {0}")]
    Render(#[from] RenderError),

    /// An action addressed to a node did not match its action type.
    #[error("action delivered to node {node} is not a `{expected}`")]
    ActionTypeMismatch {
        /// The node the action was addressed to.
        node: NodeId,
        /// The node's declared action type.
        expected: &'static str,
    },

    /// The host has been shut down.
    #[error("workflow host has been torn down")]
    TornDown,
}
