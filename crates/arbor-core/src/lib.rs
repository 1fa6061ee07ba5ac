//! Core runtime for the **arbor** workflow framework.
//!
//! `arbor-core` provides the unit contract and the runtime that drives a tree
//! of units.  Each unit (a [`Workflow`]) owns private state, turns it into a
//! rendering, and changes it only in response to actions.  Parents compose
//! children by rendering them; children talk back only through their
//! outputs.  The runtime keeps the live tree in step with what each render
//! pass asks for.
//!
//! # Key types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`Workflow`] | The unit contract (initial state / render / reduce) |
//! | [`RenderContext`] | Capabilities during a render pass: children, workers, sinks |
//! | [`Sink`] | Callback capability that feeds actions into one node |
//! | [`Worker`] | Long-running async source of values, keyed like children |
//! | [`AnyWorkflow`] | A workflow with its concrete type erased |
//! | [`WorkflowHost`] | Owns the root, the action queue and the current rendering |
//! | [`RenderBackend`] | Seam between a [`RenderContext`] and whoever runs the pass |
//!
//! # Lifecycle
//!
//! 1. **start** -- A node is created the first time a render pass requests
//!    its (type, key) identity; [`Workflow::initial_state`] runs once.
//! 2. **render** -- [`Workflow::render`] produces the rendering and declares
//!    the children and workers the node needs right now.
//! 3. **act** -- A sink, a child output or a worker value is applied with
//!    [`Workflow::reduce`]; the host then renders the tree again from the root.
//! 4. **tear down** -- A node not requested by its parent's latest successful pass is
//!    torn down with its subtree; its workers are cancelled and its sinks go
//!    inert.
//!
//! # Quick example
//!
//! ```ignore
//! use arbor_core::{RenderContext, RenderError, Workflow, WorkflowHost};
//!
//! let mut host = WorkflowHost::new(Counter)?;
//! let sink = host.sink();
//! sink.send(Action::Increment);
//! host.process_pending()?;
//! assert_eq!(*host.rendering(), 1);
//! ```

pub mod any_workflow;
pub mod context;
pub mod error;
pub mod host;
mod mailbox;
mod node;
pub mod sink;
pub mod snapshot;
mod subtree;
pub mod worker;
pub mod workers;
pub mod workflow;

pub use any_workflow::AnyWorkflow;
pub use context::{ChildKey, ChildRequest, OutputMap, RenderBackend, RenderContext, WorkerRequest};
pub use error::{HostError, RenderError};
pub use host::{HostHandle, HostOptions, HostOutputs, HostStatus, RenderingUpdates, WorkflowHost};
pub use mailbox::{Address, DetachedMailbox, NodeId};
pub use sink::Sink;
pub use snapshot::NodeSnapshot;
pub use worker::{Worker, WorkerKey};
pub use workers::{After, Every};
pub use workflow::{Workflow, WorkflowExt};
