use crate::context::{OutputMap, WorkerRequest};
use crate::mailbox::{Address, Payload, TreeEnv, WorkerId};
use futures::stream::BoxStream;
use futures::StreamExt;
use std::any::{Any, TypeId};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

/// A long-lived asynchronous source of values a node can subscribe to.
///
/// Workers are requested from [`RenderContext::run_worker`](crate::RenderContext::run_worker)
/// and kept alive by the runtime through diffing: on every render pass the
/// set of requested workers is compared with the running set.
///
/// * Requested again with an [equivalent](Worker::is_equivalent)
///   configuration -- the running task is kept.
/// * Requested with a different configuration -- the old task is cancelled
///   and a new one started.
/// * No longer requested -- the task is cancelled.
///
/// Each value the stream yields is delivered to the owning node as an action,
/// one render pass per value.  Failures should be encoded in `Output` (for
/// example a `Result`); the runtime does not retry.
///
/// # Example
///
/// ```rust,ignore
/// struct Fetch {
///     url: String,
/// }
///
/// impl Worker for Fetch {
///     type Output = Result<String, String>;
///
///     fn run(&self) -> BoxStream<'static, Self::Output> {
///         let url = self.url.clone();
///         Box::pin(futures::stream::once(async move { fetch(&url).await }))
///     }
///
///     fn is_equivalent(&self, other: &Self) -> bool {
///         self.url == other.url
///     }
/// }
/// ```
pub trait Worker: Send + 'static {
    /// The type of values this worker produces.
    type Output: Send + 'static;

    /// Start the work.  Called once per started task.
    fn run(&self) -> BoxStream<'static, Self::Output>;

    /// Whether `other` describes the same work as `self`.
    fn is_equivalent(&self, other: &Self) -> bool;
}

/// Identity of a worker within one node: (worker type, key).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct WorkerKey {
    type_id: TypeId,
    type_name: &'static str,
    key: String,
}

impl WorkerKey {
    /// Key for a worker of type `K`.
    pub fn of<K: 'static>(key: impl Into<String>) -> Self {
        Self {
            type_id: TypeId::of::<K>(),
            type_name: std::any::type_name::<K>(),
            key: key.into(),
        }
    }

    /// Type name of the worker.
    pub fn worker_name(&self) -> &'static str {
        self.type_name
    }

    /// The instance key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether this key identifies a worker of type `K`.
    pub fn is<K: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<K>()
    }
}

impl fmt::Debug for WorkerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", self.type_name, self.key)
    }
}

impl PartialOrd for WorkerKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for WorkerKey {
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.key, self.type_name, self.type_id).cmp(&(&other.key, other.type_name, other.type_id))
    }
}

/// Object-safe view of a [`Worker`].
pub(crate) trait ErasedWorker: Send {
    fn as_any(&self) -> &dyn Any;
    fn same_config(&self, other: &dyn ErasedWorker) -> bool;
    fn run_erased(&self) -> BoxStream<'static, Box<dyn Any + Send>>;
}

impl<K: Worker> ErasedWorker for K {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn same_config(&self, other: &dyn ErasedWorker) -> bool {
        other
            .as_any()
            .downcast_ref::<K>()
            .is_some_and(|other| self.is_equivalent(other))
    }

    fn run_erased(&self) -> BoxStream<'static, Box<dyn Any + Send>> {
        Box::pin(
            self.run()
                .map(|value| -> Box<dyn Any + Send> { Box::new(value) }),
        )
    }
}

/// A started worker task.  Cancelled when dropped.
struct ActiveWorker<A> {
    id: WorkerId,
    worker: Box<dyn ErasedWorker>,
    on_output: OutputMap<A>,
    abort: AbortHandle,
}

impl<A> Drop for ActiveWorker<A> {
    fn drop(&mut self) {
        self.abort.abort();
    }
}

impl<A> ActiveWorker<A> {
    fn start(request: WorkerRequest<A>, runtime: &Handle, env: &TreeEnv, address: &Address) -> Self {
        let id = env.next_worker_id();
        let mut stream = request.worker.run_erased();
        let address = address.clone();
        let task = runtime.spawn(async move {
            while let Some(value) = stream.next().await {
                if !address.post(Payload::WorkerOutput { worker: id, value }) {
                    break;
                }
            }
        });
        Self {
            id,
            worker: request.worker,
            on_output: request.on_output,
            abort: task.abort_handle(),
        }
    }
}

/// The workers running on behalf of one node.
pub(crate) struct WorkerSet<A> {
    active: HashMap<WorkerKey, ActiveWorker<A>>,
}

impl<A> Default for WorkerSet<A> {
    fn default() -> Self {
        Self {
            active: HashMap::new(),
        }
    }
}

impl<A> WorkerSet<A> {
    /// Whether `request` would be satisfied by a task that is already running.
    pub(crate) fn is_running(&self, request: &WorkerRequest<A>) -> bool {
        self.active
            .get(&request.key)
            .is_some_and(|running| running.worker.same_config(request.worker.as_ref()))
    }

    /// Diff the workers requested in a pass against the running ones.
    /// Keep equivalent ones, restart changed ones, cancel the rest.
    pub(crate) fn reconcile(
        &mut self,
        requested: HashMap<WorkerKey, WorkerRequest<A>>,
        runtime: Option<&Handle>,
        env: &TreeEnv,
        address: &Address,
    ) {
        let mut next = HashMap::with_capacity(requested.len());
        for (key, request) in requested {
            match self.active.remove(&key) {
                Some(mut running) if running.worker.same_config(request.worker.as_ref()) => {
                    running.on_output = request.on_output;
                    next.insert(key, running);
                }
                previous => {
                    if previous.is_some() {
                        tracing::debug!(node = %address.node(), worker = ?key, "worker configuration changed, restarting");
                    }
                    drop(previous);
                    match runtime {
                        Some(runtime) => {
                            tracing::debug!(node = %address.node(), worker = ?key, "starting worker");
                            next.insert(key, ActiveWorker::start(request, runtime, env, address));
                        }
                        None => {
                            tracing::warn!(node = %address.node(), worker = ?key, "no runtime to start worker on");
                        }
                    }
                }
            }
        }
        for key in self.active.keys() {
            tracing::debug!(node = %address.node(), worker = ?key, "cancelling worker");
        }
        self.active = next;
    }

    /// Translate a value from worker `id` into an action.
    ///
    /// Returns `None` if `id` is not running anymore (the value is late and
    /// must be dropped), `Some(None)` if the node ignores the value.
    pub(crate) fn map_output(&self, id: WorkerId, value: Box<dyn Any + Send>) -> Option<Option<A>> {
        self.active
            .values()
            .find(|running| running.id == id)
            .map(|running| (running.on_output)(value))
    }

    /// Cancel every running worker.
    pub(crate) fn shutdown(&mut self) {
        self.active.clear();
    }

    /// Keys of the running workers, sorted.
    pub(crate) fn keys(&self) -> Vec<WorkerKey> {
        let mut keys: Vec<_> = self.active.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of running workers (for testing).
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.active.len()
    }
}
