//! Render-pass simulation for testing **arbor** workflows in isolation.
//!
//! A [`RenderTester`] renders one workflow against stubbed children and
//! workers: each request the workflow makes is answered by an
//! [`ExpectedWorkflow`] or [`ExpectedWorker`] instead of a live node or
//! task.  No host and no async runtime are involved, so tests are plain
//! `#[test]` functions.
//!
//! ```rust,ignore
//! use arbor_testing::{ExpectedWorkflow, RenderTesterExt};
//!
//! Root
//!     .render_tester(RootState::Welcome)
//!     .expect_workflow(ExpectedWorkflow::<Welcome>::new("", welcome_screen)
//!         .output(WelcomeOutput::LoggedIn { name: "Ada".into() }))
//!     .render(|_| {})
//!     .assert_state(|state| assert!(matches!(state, RootState::Todo { .. })));
//! ```

mod expectation;
mod render_tester;

pub use expectation::{ExpectedWorker, ExpectedWorkflow};
pub use render_tester::{RenderTester, RenderTesterExt, RenderTesterResult};

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_core::{RenderContext, RenderError, Sink, Worker, Workflow};
    use futures::stream::BoxStream;
    use std::convert::Infallible;

    // A child that echoes its props.
    struct Echo {
        text: String,
    }

    #[derive(Debug, PartialEq)]
    enum EchoOutput {
        Said(String),
    }

    impl Workflow for Echo {
        type State = ();
        type Action = Infallible;
        type Output = EchoOutput;
        type Rendering = String;

        fn initial_state(&self) {}

        fn render(&self, _state: &(), _ctx: &mut RenderContext<'_, Infallible>) -> Result<String, RenderError> {
            Ok(self.text.clone())
        }

        fn reduce(&self, _state: &mut (), action: Infallible) -> Option<EchoOutput> {
            match action {}
        }
    }

    struct Poll {
        every_ms: u64,
    }

    impl Worker for Poll {
        type Output = u32;

        fn run(&self) -> BoxStream<'static, u32> {
            Box::pin(futures::stream::empty())
        }

        fn is_equivalent(&self, other: &Self) -> bool {
            self.every_ms == other.every_ms
        }
    }

    // Renders one `Echo` per line and polls while `polling`.
    struct Board {
        lines: Vec<String>,
        polling: bool,
    }

    #[derive(Debug, Default, PartialEq)]
    struct BoardState {
        heard: Vec<String>,
        polls: u32,
    }

    #[derive(Debug)]
    enum BoardAction {
        Heard(String),
        Polled(u32),
        Clear,
    }

    struct BoardScreen {
        lines: Vec<String>,
        clear: Sink<()>,
    }

    impl Workflow for Board {
        type State = BoardState;
        type Action = BoardAction;
        type Output = usize;
        type Rendering = BoardScreen;

        fn initial_state(&self) -> BoardState {
            BoardState::default()
        }

        fn render(&self, _state: &BoardState, ctx: &mut RenderContext<'_, BoardAction>) -> Result<BoardScreen, RenderError> {
            let mut lines = Vec::new();
            for (index, line) in self.lines.iter().enumerate() {
                let echo = Echo { text: line.clone() };
                lines.push(ctx.render_child(echo, index.to_string(), |EchoOutput::Said(text)| BoardAction::Heard(text))?);
            }
            if self.polling {
                ctx.run_worker(Poll { every_ms: 100 }, "poll", BoardAction::Polled)?;
            }
            Ok(BoardScreen {
                lines,
                clear: ctx.make_sink().contramap(|()| BoardAction::Clear),
            })
        }

        fn reduce(&self, state: &mut BoardState, action: BoardAction) -> Option<usize> {
            match action {
                BoardAction::Heard(text) => {
                    state.heard.push(text);
                    Some(state.heard.len())
                }
                BoardAction::Polled(n) => {
                    state.polls += n;
                    None
                }
                BoardAction::Clear => {
                    state.heard.clear();
                    Some(0)
                }
            }
        }
    }

    fn board(lines: &[&str], polling: bool) -> Board {
        Board {
            lines: lines.iter().map(|line| line.to_string()).collect(),
            polling,
        }
    }

    #[test]
    fn expected_children_supply_renderings() {
        board(&["a", "b"], false)
            .render_tester(BoardState::default())
            .expect_workflow(ExpectedWorkflow::<Echo>::new("0", "first".into()))
            .expect_workflow(ExpectedWorkflow::<Echo>::new("1", "second".into()))
            .render(|screen| assert_eq!(screen.lines, ["first", "second"]))
            .assert_state(|state| assert_eq!(*state, BoardState::default()))
            .assert_output(|output| assert!(output.is_none()));
    }

    #[test]
    fn child_output_is_applied_as_an_action() {
        let result = board(&["a"], false)
            .render_tester(BoardState::default())
            .expect_workflow(
                ExpectedWorkflow::<Echo>::new("0", String::new())
                    .props(|echo| assert_eq!(echo.text, "a"))
                    .output(EchoOutput::Said("hello".into())),
            )
            .render(|_| {});
        assert_eq!(result.state().heard, ["hello"]);
        assert_eq!(result.output(), Some(&1));
    }

    #[test]
    fn worker_output_is_applied_as_an_action() {
        RenderTester::new(board(&[], true))
            .expect_worker(
                ExpectedWorker::<Poll>::new("poll")
                    .config(|poll| assert_eq!(poll.every_ms, 100))
                    .output(3),
            )
            .render(|_| {})
            .assert_state(|state| assert_eq!(state.polls, 3));
    }

    #[test]
    fn sink_sent_during_assertions_is_applied() {
        let state = BoardState {
            heard: vec!["old".into()],
            polls: 0,
        };
        board(&[], false)
            .render_tester(state)
            .render(|screen| screen.clear.send(()))
            .assert_state(|state| assert!(state.heard.is_empty()))
            .assert_output(|output| assert_eq!(output, Some(&0)));
    }

    #[test]
    fn sinks_used_after_render_are_applied_on_request() {
        let state = BoardState {
            heard: vec!["old".into()],
            polls: 0,
        };
        let mut result = board(&[], false).render_tester(state).render(|_| {});
        result.rendering().clear.send(());
        assert_eq!(result.apply_sink_actions(), [0]);
        assert!(result.state().heard.is_empty());
    }

    #[test]
    fn renders_chain_through_state() {
        let first = board(&["a"], false)
            .render_tester(BoardState::default())
            .expect_workflow(ExpectedWorkflow::<Echo>::new("0", String::new()).output(EchoOutput::Said("x".into())))
            .render(|_| {});
        let second = first
            .into_tester()
            .expect_workflow(ExpectedWorkflow::<Echo>::new("0", String::new()).output(EchoOutput::Said("y".into())))
            .render(|_| {});
        assert_eq!(second.into_state().heard, ["x", "y"]);
    }

    #[test]
    #[should_panic(expected = "unexpected child")]
    fn unexpected_child_panics() {
        board(&["a"], false).render_tester(BoardState::default()).render(|_| {});
    }

    #[test]
    #[should_panic(expected = "did not request expected")]
    fn unfulfilled_expectation_panics() {
        board(&[], false)
            .render_tester(BoardState::default())
            .expect_worker(ExpectedWorker::<Poll>::new("poll"))
            .render(|_| {});
    }

    #[test]
    #[should_panic(expected = "at most one")]
    fn two_actions_in_one_render_panic() {
        board(&["a", "b"], false)
            .render_tester(BoardState::default())
            .expect_workflow(ExpectedWorkflow::<Echo>::new("0", String::new()).output(EchoOutput::Said("1".into())))
            .expect_workflow(ExpectedWorkflow::<Echo>::new("1", String::new()).output(EchoOutput::Said("2".into())))
            .render(|_| {});
    }

    #[test]
    #[should_panic(expected = "more than once")]
    fn duplicate_keys_panic() {
        struct Twice;

        impl Workflow for Twice {
            type State = ();
            type Action = Infallible;
            type Output = Infallible;
            type Rendering = ();

            fn initial_state(&self) {}

            fn render(&self, _state: &(), ctx: &mut RenderContext<'_, Infallible>) -> Result<(), RenderError> {
                let echo = || Echo { text: String::new() };
                ctx.render_child_ignoring_output(echo(), "k")?;
                // Discarding the error does not rescue the pass.
                let _ = ctx.render_child_ignoring_output(echo(), "k");
                Ok(())
            }

            fn reduce(&self, _state: &mut (), action: Infallible) -> Option<Infallible> {
                match action {}
            }
        }

        Twice
            .render_tester(())
            .expect_workflow(ExpectedWorkflow::<Echo>::new("k", String::new()))
            .render(|_| {});
    }
}
