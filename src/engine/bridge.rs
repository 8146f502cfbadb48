// src/engine/bridge.rs

//! Worker → owning-loop bridge.
//!
//! Workers never touch owning-loop state directly. They enqueue a closure
//! with [`BridgeHandle::call_from_thread`] and wait until the owning
//! [`EventLoop`] has run it against its state and acknowledged. Every
//! cross-thread effect is therefore a serialized call on the loop, with no
//! locks around the state itself.

use std::fmt;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

use crate::errors::BridgeClosed;

type Callback<S> = Box<dyn FnOnce(&mut S) + Send>;

struct Request<S> {
    func: Callback<S>,
    ack: Option<oneshot::Sender<()>>,
}

/// Create a connected handle / loop pair for owning-loop state `S`.
pub fn channel<S: 'static>() -> (BridgeHandle<S>, EventLoop<S>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (BridgeHandle { tx }, EventLoop { rx })
}

/// Cloneable sending side, given to workers.
pub struct BridgeHandle<S> {
    tx: mpsc::UnboundedSender<Request<S>>,
}

impl<S> Clone for BridgeHandle<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<S> fmt::Debug for BridgeHandle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeHandle")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl<S: 'static> BridgeHandle<S> {
    /// Run `func` on the owning loop and wait until it has completed.
    pub async fn call_from_thread<F>(&self, func: F) -> Result<(), BridgeClosed>
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        let ack = self.enqueue(func)?;
        ack.await.map_err(|_| BridgeClosed)
    }

    /// Blocking variant of [`call_from_thread`](Self::call_from_thread) for
    /// plain OS threads.
    ///
    /// # Panics
    ///
    /// Panics when called from within an async execution context.
    pub fn call_blocking<F>(&self, func: F) -> Result<(), BridgeClosed>
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        let ack = self.enqueue(func)?;
        ack.blocking_recv().map_err(|_| BridgeClosed)
    }

    /// Queue `func` on the owning loop without waiting for it to run.
    pub fn post<F>(&self, func: F) -> Result<(), BridgeClosed>
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        self.tx
            .send(Request {
                func: Box::new(func),
                ack: None,
            })
            .map_err(|_| BridgeClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn enqueue<F>(&self, func: F) -> Result<oneshot::Receiver<()>, BridgeClosed>
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send(Request {
                func: Box::new(func),
                ack: Some(ack_tx),
            })
            .map_err(|_| BridgeClosed)?;
        Ok(ack_rx)
    }
}

/// Receiving side, driven by the single owning task.
///
/// Dropping the loop fails every pending and future call with
/// [`BridgeClosed`], so no worker can block forever on a loop that is gone.
pub struct EventLoop<S> {
    rx: mpsc::UnboundedReceiver<Request<S>>,
}

impl<S> fmt::Debug for EventLoop<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("pending", &self.rx.len())
            .finish()
    }
}

impl<S> EventLoop<S> {
    /// Serve requests against `state` until `done(&state)` holds or every
    /// handle has been dropped. Returns the state.
    pub async fn run_until<F>(mut self, mut state: S, mut done: F) -> S
    where
        F: FnMut(&S) -> bool,
    {
        while !done(&state) {
            let Some(request) = self.rx.recv().await else {
                debug!("all bridge handles dropped; owning loop exiting");
                break;
            };
            dispatch(&mut state, request);
        }
        state
    }

    /// Serve requests until every handle has been dropped.
    pub async fn run(self, state: S) -> S {
        self.run_until(state, |_| false).await
    }

    /// Run at most one already-queued request. Returns whether one ran.
    ///
    /// For embedding in a foreign loop that has its own wake-up source.
    pub fn dispatch_one(&mut self, state: &mut S) -> bool {
        match self.rx.try_recv() {
            Ok(request) => {
                dispatch(state, request);
                true
            }
            Err(_) => false,
        }
    }
}

fn dispatch<S>(state: &mut S, request: Request<S>) {
    (request.func)(state);
    if let Some(ack) = request.ack {
        if ack.send(()).is_err() {
            trace!("bridge caller stopped waiting before acknowledgement");
        }
    }
}
