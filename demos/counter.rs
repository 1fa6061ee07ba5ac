//! # Counter Example
//!
//! A minimal counter driven from standard input, demonstrating the core
//! arbor loop:
//! - Implementing the [`Workflow`] trait with `initial_state`, `render`, and `reduce`
//! - Embedding sinks in the rendering and sending actions through them
//! - Running a [`WorkflowHost`] and watching its rendering updates
//!
//! Type `+` to increment, `-` to decrement, `0` to reset, `q` to quit.
//!
//! Run with: `cargo run --example counter`

use arbor::futures::StreamExt;
use arbor::tokio::io::{AsyncBufReadExt, BufReader};
use arbor::{RenderContext, RenderError, Sink, Workflow, WorkflowHost};
use std::convert::Infallible;

struct Counter;

#[derive(Debug)]
enum Action {
    Add(i64),
    Reset,
}

/// What a front end would draw: the count and the buttons around it.
#[derive(Clone)]
struct Screen {
    count: i64,
    on_add: Sink<i64>,
    on_reset: Sink<()>,
}

impl Workflow for Counter {
    type State = i64;
    type Action = Action;
    type Output = Infallible;
    type Rendering = Screen;

    fn initial_state(&self) -> i64 {
        0
    }

    fn render(&self, state: &i64, ctx: &mut RenderContext<'_, Action>) -> Result<Screen, RenderError> {
        let sink = ctx.make_sink();
        Ok(Screen {
            count: *state,
            on_add: sink.contramap(Action::Add),
            on_reset: sink.contramap(|()| Action::Reset),
        })
    }

    fn reduce(&self, state: &mut i64, action: Action) -> Option<Infallible> {
        tracing::debug!(?action, "counter action");
        match action {
            Action::Add(n) => *state += n,
            Action::Reset => *state = 0,
        }
        None
    }
}

#[arbor::tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut host = WorkflowHost::new(Counter)?;
    let mut screen = host.rendering().clone();
    let mut updates = host.rendering_updates();
    let handle = host.handle();
    let runner = arbor::tokio::spawn(host.run());

    println!("count: {}", screen.count);
    let mut lines = BufReader::new(arbor::tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "+" => screen.on_add.send(1),
            "-" => screen.on_add.send(-1),
            "0" => screen.on_reset.send(()),
            "q" => break,
            other => {
                println!("unknown command {other:?}");
                continue;
            }
        }
        if let Some(next) = updates.next().await {
            screen = next;
            println!("count: {}", screen.count);
        }
    }

    handle.stop();
    runner.await??;
    Ok(())
}
