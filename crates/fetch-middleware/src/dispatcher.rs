//! Channel-backed next stage
//!
//! Middleware forwards actions through the Dispatcher into an unbounded
//! channel. The owner of the receiver (the rest of the pipeline, typically a
//! reducer loop) processes them in order.

use crate::action::NextAction;
use tokio::sync::mpsc;

/// Sends forwarded actions to the rest of the pipeline
pub struct Dispatcher<S> {
    tx: mpsc::UnboundedSender<NextAction<S>>,
}

impl<S: Send + Sync + 'static> Dispatcher<S> {
    /// Create a dispatcher and the receiver that drains it
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<NextAction<S>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn new(tx: mpsc::UnboundedSender<NextAction<S>>) -> Self {
        Self { tx }
    }

    /// Forward an action
    ///
    /// Logs instead of failing when the receiver is gone.
    pub fn dispatch(&self, action: NextAction<S>) {
        if let Err(e) = self.tx.send(action) {
            log::error!(
                "Dispatcher: failed to forward {}: receiver closed",
                e.0.action_type()
            );
        }
    }

    /// This dispatcher as a next-stage function for the middleware
    pub fn as_next(&self) -> impl Fn(NextAction<S>) + Send + Sync + 'static {
        let dispatcher = self.clone();
        move |action| dispatcher.dispatch(action)
    }
}

impl<S> Clone for Dispatcher<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}
