use crate::error::HostError;
use crate::mailbox::{Envelope, TreeEnv};
use crate::node::{Delivery, WorkflowNode};
use crate::sink::Sink;
use crate::snapshot::NodeSnapshot;
use crate::workflow::Workflow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Notify};
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Every rendering published after the stream was created, in order.
pub type RenderingUpdates<R> = UnboundedReceiverStream<R>;

/// Every output the root workflow emits after the stream was taken.
pub type HostOutputs<O> = UnboundedReceiverStream<O>;

/// Configuration options for a [`WorkflowHost`].
///
/// All fields have sensible defaults (see [`Default`] impl).  Use struct
/// update syntax to override only the options you need:
///
/// # Example
///
/// ```rust
/// use arbor_core::HostOptions;
///
/// let opts = HostOptions {
///     name: "checkout".into(),
///     max_batch: 16,
///     ..HostOptions::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct HostOptions {
    /// Name attached to the host's log events (default: `"workflow"`).
    pub name: String,
    /// Maximum number of queued actions [`WorkflowHost::run`] processes in
    /// one burst before checking for a stop request again (default: 100).
    pub max_batch: u32,
    /// How long a burst may keep draining already-queued actions
    /// (default: 100µs).
    pub batch_window: Duration,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            name: "workflow".into(),
            max_batch: 100,
            batch_window: Duration::from_micros(100),
        }
    }
}

/// Where a [`WorkflowHost`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostStatus {
    /// No render pass is running.
    Idle,
    /// A render pass is computing the tree.
    Rendering,
    /// The host was shut down and its tree torn down.
    TornDown,
}

/// A cloneable handle to stop a running [`WorkflowHost`].
///
/// Obtain a handle with [`WorkflowHost::handle`] before calling
/// [`run`](WorkflowHost::run).  It can be sent across threads or into async
/// tasks.
#[derive(Debug, Clone)]
pub struct HostHandle {
    stopped: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl HostHandle {
    /// Ask the run loop to exit.
    ///
    /// The loop finishes the render pass in progress, if any, and returns
    /// without processing the remaining queued actions.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    /// Whether [`stop`](HostHandle::stop) has been called.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// Drives a tree of workflows from its root.
///
/// The host owns the root node, the single action queue, and the most recent
/// rendering.  All state changes and render passes happen inside the host's
/// `&mut self` methods, one at a time: actions sent through sinks or
/// produced by workers are queued and, once dequeued, applied to their node
/// and followed by exactly one render pass from the root.
///
/// Construction runs the initial render pass.  Dropping the host (or calling
/// [`shutdown`](WorkflowHost::shutdown)) tears the whole tree down.
///
/// # Example
///
/// ```rust,ignore
/// let mut host = WorkflowHost::new(Counter)?;
/// assert_eq!(*host.rendering(), 0);
///
/// let sink = host.sink();
/// sink.send(Action::Increment);
/// host.process_pending()?;
/// assert_eq!(*host.rendering(), 1);
/// ```
pub struct WorkflowHost<W: Workflow> {
    root: WorkflowNode<W>,
    inbox: mpsc::UnboundedReceiver<Envelope>,
    rendering: W::Rendering,
    render_count: u64,
    status: HostStatus,
    subscribers: Vec<mpsc::UnboundedSender<W::Rendering>>,
    outputs: Option<mpsc::UnboundedSender<W::Output>>,
    options: HostOptions,
    stopped: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl<W> WorkflowHost<W>
where
    W: Workflow,
    W::Rendering: Clone,
{
    /// Start a host with default options and run the initial render pass.
    pub fn new(workflow: W) -> Result<Self, HostError> {
        Self::with_options(workflow, HostOptions::default())
    }

    /// Start a host with custom options and run the initial render pass.
    ///
    /// Returns an error if the initial render pass violates a usage contract.
    pub fn with_options(workflow: W, options: HostOptions) -> Result<Self, HostError> {
        let (tx, inbox) = mpsc::unbounded_channel();
        let env = Arc::new(TreeEnv::new(tx));
        let address = env.address_below(None);
        let mut root = WorkflowNode::new(workflow, env, address);
        let rendering = root.render()?;
        root.commit();

        tracing::debug!(host = %options.name, "host started");

        Ok(Self {
            root,
            inbox,
            rendering,
            render_count: 1,
            status: HostStatus::Idle,
            subscribers: Vec::new(),
            outputs: None,
            options,
            stopped: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
        })
    }

    /// The most recently published rendering.
    pub fn rendering(&self) -> &W::Rendering {
        &self.rendering
    }

    /// A stream of every rendering published from now on.
    ///
    /// Each call creates an independent stream.  The stream ends when the
    /// host is shut down or dropped.
    pub fn rendering_updates(&mut self) -> RenderingUpdates<W::Rendering> {
        let (tx, rx) = mpsc::unbounded_channel();
        if self.status != HostStatus::TornDown {
            self.subscribers.push(tx);
        }
        UnboundedReceiverStream::new(rx)
    }

    /// Take the stream of root outputs.
    ///
    /// Outputs emitted before the first call are dropped.  A second call
    /// replaces the previous stream, which then ends.
    pub fn take_outputs(&mut self) -> HostOutputs<W::Output> {
        let (tx, rx) = mpsc::unbounded_channel();
        if self.status != HostStatus::TornDown {
            self.outputs = Some(tx);
        }
        UnboundedReceiverStream::new(rx)
    }

    /// A sink delivering actions to the root node.
    pub fn sink(&self) -> Sink<W::Action> {
        Sink::new(self.root.address().clone())
    }

    /// A handle that can stop [`run`](WorkflowHost::run) from elsewhere.
    pub fn handle(&self) -> HostHandle {
        HostHandle {
            stopped: self.stopped.clone(),
            wake: self.wake.clone(),
        }
    }

    /// Number of completed render passes, including the initial one.
    pub fn render_count(&self) -> u64 {
        self.render_count
    }

    /// Current lifecycle status.
    pub fn status(&self) -> HostStatus {
        self.status
    }

    /// The options this host was started with.
    pub fn options(&self) -> &HostOptions {
        &self.options
    }

    /// A picture of the live tree.
    pub fn snapshot(&self) -> NodeSnapshot {
        self.root.snapshot("")
    }

    /// Replace the root workflow's props and run one render pass.
    ///
    /// The root node keeps its state.  If the pass fails, the previous props
    /// and the whole tree are kept as they were.
    pub fn update(&mut self, workflow: W) -> Result<(), HostError> {
        self.ensure_live()?;
        self.root.stage_workflow(workflow);
        self.render_pass()
    }

    /// Apply every action currently queued, one render pass per applied
    /// action, and return how many were applied.
    ///
    /// Actions addressed to nodes that have been torn down are dropped and not
    /// counted.  Actions queued while this runs (for example by a render
    /// pass) are processed as well.
    pub fn process_pending(&mut self) -> Result<usize, HostError> {
        self.ensure_live()?;
        let mut applied = 0;
        while let Ok(envelope) = self.inbox.try_recv() {
            if self.dispatch(envelope)? {
                applied += 1;
            }
        }
        Ok(applied)
    }

    /// Wait for the next action that applies, process it, and return the
    /// resulting rendering.
    pub async fn next_rendering(&mut self) -> Result<&W::Rendering, HostError> {
        self.ensure_live()?;
        loop {
            let envelope = self.inbox.recv().await.ok_or(HostError::TornDown)?;
            if self.dispatch(envelope)? {
                return Ok(&self.rendering);
            }
        }
    }

    /// Process actions as they arrive until stopped through a
    /// [`HostHandle`], then tear the tree down.
    pub async fn run(mut self) -> Result<(), HostError> {
        self.ensure_live()?;
        let result = self.event_loop().await;
        self.shutdown();
        result
    }

    /// Tear down the whole tree.  Subsequent calls fail with
    /// [`HostError::TornDown`]; rendering and output streams end.
    pub fn shutdown(&mut self) {
        if self.status == HostStatus::TornDown {
            return;
        }
        tracing::debug!(host = %self.options.name, passes = self.render_count, "shutting down");
        self.root.teardown();
        self.status = HostStatus::TornDown;
        self.subscribers.clear();
        self.outputs = None;
    }

    async fn event_loop(&mut self) -> Result<(), HostError> {
        let wake = self.wake.clone();
        loop {
            if self.stopped.load(Ordering::SeqCst) {
                return Ok(());
            }

            tokio::select! {
                biased;

                _ = wake.notified() => {}

                Some(envelope) = self.inbox.recv() => {
                    self.dispatch(envelope)?;

                    // Micro-batch: keep draining what is already queued for a
                    // short window, up to `max_batch` actions.
                    let deadline = Instant::now() + self.options.batch_window;
                    let mut batch_count = 0u32;
                    while Instant::now() < deadline
                        && batch_count < self.options.max_batch
                        && !self.stopped.load(Ordering::SeqCst)
                    {
                        match self.inbox.try_recv() {
                            Ok(envelope) => {
                                self.dispatch(envelope)?;
                                batch_count += 1;
                            }
                            Err(_) => break,
                        }
                    }
                }
            }
        }
    }

    /// Route one envelope.  Returns whether it was applied.
    fn dispatch(&mut self, envelope: Envelope) -> Result<bool, HostError> {
        let Envelope { path, payload } = envelope;
        match self.root.deliver(&path, payload)? {
            Delivery::Stale => {
                tracing::debug!(host = %self.options.name, ?path, "dropping action for torn-down node");
                Ok(false)
            }
            Delivery::Applied(output) => {
                self.render_pass()?;
                if let Some(output) = output {
                    self.emit(output);
                }
                Ok(true)
            }
        }
    }

    /// Render the whole tree and commit it.  A failed render has already
    /// rolled every node back, so the committed tree is untouched.
    fn render_pass(&mut self) -> Result<(), HostError> {
        self.status = HostStatus::Rendering;
        let result = self.root.render();
        self.status = HostStatus::Idle;
        let rendering = result?;
        self.root.commit();

        self.render_count += 1;
        self.subscribers
            .retain(|subscriber| subscriber.send(rendering.clone()).is_ok());
        self.rendering = rendering;
        tracing::debug!(host = %self.options.name, pass = self.render_count, "render pass complete");
        Ok(())
    }

    fn emit(&mut self, output: W::Output) {
        match &self.outputs {
            Some(tx) => {
                if tx.send(output).is_err() {
                    self.outputs = None;
                }
            }
            None => {
                tracing::trace!(host = %self.options.name, "dropping root output: no listener");
            }
        }
    }

    fn ensure_live(&self) -> Result<(), HostError> {
        match self.status {
            HostStatus::TornDown => Err(HostError::TornDown),
            _ => Ok(()),
        }
    }
}
