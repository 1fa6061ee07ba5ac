use crate::mailbox::{Address, Payload};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A callback capability that feeds actions into one node.
///
/// Sinks are obtained from [`RenderContext::make_sink`](crate::RenderContext::make_sink)
/// and are meant to be embedded in renderings: a button's "on tap" handler,
/// a text field's "on change".  Invoking [`send`](Sink::send) enqueues the
/// action for the owning node's reducer; the host then runs one render pass
/// from the root.
///
/// A sink may outlive the node it was made for.  Once that node has been torn
/// down the sink is inert: `send` silently drops the action.
///
/// `Sink` is [`Clone`], [`Send`] and [`Sync`], so it can be handed to any
/// thread.
///
/// # Example
///
/// ```rust,ignore
/// struct Screen {
///     title: String,
///     on_title_changed: Sink<String>,
/// }
///
/// fn render(&self, state: &State, ctx: &mut RenderContext<'_, Action>) -> Result<Screen, RenderError> {
///     Ok(Screen {
///         title: state.title.clone(),
///         on_title_changed: ctx.make_sink().contramap(Action::TitleChanged),
///     })
/// }
/// ```
pub struct Sink<A> {
    address: Address,
    wrap: Arc<dyn Fn(A) -> Box<dyn Any + Send> + Send + Sync>,
}

impl<A> Clone for Sink<A> {
    fn clone(&self) -> Self {
        Self {
            address: self.address.clone(),
            wrap: self.wrap.clone(),
        }
    }
}

impl<A> fmt::Debug for Sink<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sink")
            .field("node", &self.address.node())
            .field("live", &self.address.is_live())
            .finish()
    }
}

impl<A: Send + 'static> Sink<A> {
    /// A sink delivering `A` as-is to the node behind `address`.
    ///
    /// `A` must be the node's action type; the runtime reports a
    /// [`HostError::ActionTypeMismatch`](crate::HostError::ActionTypeMismatch)
    /// otherwise.
    pub fn new(address: Address) -> Self {
        Self {
            address,
            wrap: Arc::new(|action: A| -> Box<dyn Any + Send> { Box::new(action) }),
        }
    }
}

impl<A: 'static> Sink<A> {
    /// Enqueue an action for the owning node.
    ///
    /// Returns immediately; the action is applied when the host next drains
    /// its queue.  A no-op if the owning node has been torn down.
    pub fn send(&self, action: A) {
        self.address.post(Payload::Action((self.wrap)(action)));
    }

    /// Whether the owning node is still mounted.
    pub fn is_live(&self) -> bool {
        self.address.is_live()
    }

    /// The address this sink delivers to.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Adapt this sink to accept a different input type.
    ///
    /// The returned sink converts each `B` with `f` before delivering it to the
    /// same node.
    pub fn contramap<B: 'static>(&self, f: impl Fn(B) -> A + Send + Sync + 'static) -> Sink<B> {
        let wrap = self.wrap.clone();
        Sink {
            address: self.address.clone(),
            wrap: Arc::new(move |b: B| wrap(f(b))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_posts_to_address() {
        let (address, mut mailbox) = Address::detached();
        let sink = Sink::<u32>::new(address);
        sink.send(7);
        assert_eq!(mailbox.try_recv_action::<u32>(), Some(7));
    }

    #[test]
    fn contramap_converts_before_delivery() {
        let (address, mut mailbox) = Address::detached();
        let sink = Sink::<String>::new(address).contramap(|n: u32| format!("n={n}"));
        sink.send(3);
        assert_eq!(mailbox.try_recv_action::<String>().as_deref(), Some("n=3"));
    }

    #[test]
    fn inert_after_revocation() {
        let (address, mut mailbox) = Address::detached();
        let sink = Sink::<u32>::new(address.clone());
        let clone = sink.clone();
        address.liveness().revoke();
        assert!(!sink.is_live());
        clone.send(1);
        assert_eq!(mailbox.try_recv_action::<u32>(), None);
    }

    #[test]
    fn sinks_cross_threads() {
        let (address, mut mailbox) = Address::detached();
        let sink = Sink::<u32>::new(address);
        std::thread::spawn(move || sink.send(11)).join().unwrap();
        assert_eq!(mailbox.try_recv_action::<u32>(), Some(11));
    }
}
