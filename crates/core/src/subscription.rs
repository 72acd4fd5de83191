//! Observable values with explicit subscription lifetimes
//!
//! Both the instance source and the status aggregate publish their full
//! current value through a `tokio::sync::watch` channel. A [`Subscription`]
//! yields that value once immediately and then again after every change;
//! a [`SubscriptionHandle`] drives a listener callback until it is
//! unsubscribed or dropped.

use log::trace;
use std::fmt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Pull-style subscription to a published value
pub struct Subscription<T> {
    receiver: watch::Receiver<T>,
    delivered_initial: bool,
}

impl<T: Clone> Subscription<T> {
    pub(crate) fn new(receiver: watch::Receiver<T>) -> Self {
        Self {
            receiver,
            delivered_initial: false,
        }
    }

    /// Wait for the next value
    ///
    /// The first call returns the current value without waiting. Returns
    /// `None` once the publisher has gone away.
    pub async fn next(&mut self) -> Option<T> {
        if !self.delivered_initial {
            self.delivered_initial = true;
            return Some(self.receiver.borrow_and_update().clone());
        }
        match self.receiver.changed().await {
            Ok(()) => Some(self.receiver.borrow_and_update().clone()),
            Err(_) => None,
        }
    }

    /// Latest value without waiting
    pub fn current(&self) -> T {
        self.receiver.borrow().clone()
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("delivered_initial", &self.delivered_initial)
            .finish()
    }
}

/// Handle for a listener callback; unsubscribes on drop
pub struct SubscriptionHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SubscriptionHandle {
    /// Stop delivering values and wait for the listener task to exit
    pub async fn unsubscribe(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

/// Spawn a task that calls `listener` with every value of `subscription`
///
/// Must be called from within a tokio runtime.
pub(crate) fn spawn_listener<T, F>(mut subscription: Subscription<T>, mut listener: F) -> SubscriptionHandle
where
    T: Clone + Send + Sync + 'static,
    F: FnMut(&T) + Send + 'static,
{
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                value = subscription.next() => match value {
                    Some(value) => listener(&value),
                    None => break,
                },
            }
        }
        trace!("Listener task exiting");
    });

    SubscriptionHandle {
        cancel,
        task: Some(task),
    }
}
