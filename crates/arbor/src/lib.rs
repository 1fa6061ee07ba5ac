//! **arbor** -- Composable stateful workflows with unidirectional data flow.
//!
//! This is the umbrella crate that re-exports everything you need to build
//! and test a workflow tree from a single dependency:
//!
//! ```toml
//! [dependencies]
//! arbor = "0.1"
//! ```
//!
//! # Re-exports
//!
//! * All public items from [`arbor_core`] are available at the crate root
//!   ([`Workflow`], [`RenderContext`], [`Sink`], [`Worker`],
//!   [`WorkflowHost`], etc.).
//! * The [`testing`] module re-exports everything from [`arbor_testing`]
//!   ([`RenderTester`](testing::RenderTester) and its expectations).
//! * [`futures`] and [`tokio`] are re-exported so downstream crates do not
//!   need to depend on them directly.
//!
//! # Quick start
//!
//! ```ignore
//! use arbor::{RenderContext, RenderError, Workflow, WorkflowHost};
//! use std::convert::Infallible;
//!
//! struct Hello;
//!
//! impl Workflow for Hello {
//!     type State = ();
//!     type Action = Infallible;
//!     type Output = Infallible;
//!     type Rendering = String;
//!
//!     fn initial_state(&self) {}
//!
//!     fn render(&self, _: &(), _: &mut RenderContext<'_, Infallible>) -> Result<String, RenderError> {
//!         Ok("Hello, arbor!".into())
//!     }
//!
//!     fn reduce(&self, _: &mut (), action: Infallible) -> Option<Infallible> {
//!         match action {}
//!     }
//! }
//!
//! let host = WorkflowHost::new(Hello)?;
//! println!("{}", host.rendering());
//! ```

pub use arbor_core::*;
pub mod testing {
    pub use arbor_testing::*;
}

// Re-export dependencies for use in demos and downstream crates
pub use futures;
pub use tokio;
