//! # Ticker Example
//!
//! A parent workflow that renders a countdown child.  The child runs an
//! [`Every`] worker while it is counting and reports back with an output
//! when it reaches zero; the parent then stops rendering it, which cancels
//! the timer.
//!
//! Run with: `RUST_LOG=arbor_core=debug cargo run --example ticker`

use arbor::futures::StreamExt;
use arbor::{Every, RenderContext, RenderError, Workflow, WorkflowHost};
use std::convert::Infallible;
use std::time::Duration;

/// Counts down from `from`, one step per tick.
struct Countdown {
    from: u32,
}

struct Finished;

impl Workflow for Countdown {
    type State = u32;
    type Action = ();
    type Output = Finished;
    type Rendering = String;

    fn initial_state(&self) -> u32 {
        self.from
    }

    fn render(&self, state: &u32, ctx: &mut RenderContext<'_, ()>) -> Result<String, RenderError> {
        if *state > 0 {
            ctx.run_worker(Every::new(Duration::from_millis(250)), "tick", |_| ())?;
        }
        Ok(format!("{state}..."))
    }

    fn reduce(&self, state: &mut u32, (): ()) -> Option<Finished> {
        *state = state.saturating_sub(1);
        (*state == 0).then_some(Finished)
    }
}

struct Launch;

#[derive(Clone, Copy, PartialEq)]
enum Phase {
    Counting,
    Launched,
}

impl Workflow for Launch {
    type State = Phase;
    type Action = Phase;
    type Output = ();
    type Rendering = String;

    fn initial_state(&self) -> Phase {
        Phase::Counting
    }

    fn render(&self, state: &Phase, ctx: &mut RenderContext<'_, Phase>) -> Result<String, RenderError> {
        match state {
            Phase::Counting => ctx.render_child(Countdown { from: 5 }, "countdown", |Finished| Phase::Launched),
            Phase::Launched => Ok("liftoff!".into()),
        }
    }

    fn reduce(&self, state: &mut Phase, action: Phase) -> Option<()> {
        *state = action;
        (action == Phase::Launched).then_some(())
    }
}

#[arbor::tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut host = WorkflowHost::new(Launch)?;
    let mut outputs = host.take_outputs();
    let mut updates = host.rendering_updates();
    let handle = host.handle();
    println!("{}", host.rendering());
    let runner = arbor::tokio::spawn(host.run());

    loop {
        arbor::tokio::select! {
            biased;

            Some(rendering) = updates.next() => println!("{rendering}"),
            Some(()) = outputs.next() => break,
        }
    }
    handle.stop();
    runner.await??;
    Ok(())
}
