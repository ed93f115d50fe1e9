//! Posting work onto the render thread.
//!
//! The render loop owns a [`RenderQueue`] and drains it once per frame, before
//! the frame's update and draw steps. Any thread holding a [`RenderPoster`] can
//! enqueue a closure that will later receive `&mut S`, where `S` is the state
//! owned by the render loop (see [`crate::world::World`]).
//!
//! Posting is fire-and-forget: once the queue is closed (teardown) or dropped,
//! posts are silently discarded and [`RenderPoster::post`] returns `false`.

use std::{
    fmt::Debug,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use crossbeam_channel::{Receiver, Sender, unbounded};

/// A unit of work executed on the render thread between two frames.
pub type RenderTask<S> = Box<dyn FnOnce(&mut S) + Send + 'static>;

/// FIFO of tasks consumed by the render thread.
pub struct RenderQueue<S: 'static> {
    tx: Sender<RenderTask<S>>,
    rx: Receiver<RenderTask<S>>,
    open: Arc<AtomicBool>,
}

impl<S: 'static> RenderQueue<S> {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            tx,
            rx,
            open: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Create a handle other threads can use to post work.
    pub fn poster(&self) -> RenderPoster<S> {
        RenderPoster {
            tx: self.tx.clone(),
            open: self.open.clone(),
        }
    }

    /// Run every task that was pending when the drain started, in posting order.
    ///
    /// Tasks posted while draining (including by a drained task) are left for
    /// the next frame. Returns the number of tasks executed.
    pub fn drain(&self, state: &mut S) -> usize {
        if self.is_closed() {
            // posts that raced with `close`
            let discarded = self.rx.try_iter().count();
            if discarded > 0 {
                log::debug!("discarding {} task(s) posted while closing", discarded);
            }
            return 0;
        }
        let pending = self.rx.len();
        let mut executed = 0;
        for _ in 0..pending {
            match self.rx.try_recv() {
                Ok(task) => {
                    task(state);
                    executed += 1;
                }
                Err(_) => break,
            }
        }
        if executed > 0 {
            log::trace!("drained {} render task(s)", executed);
        }
        executed
    }

    /// Stop accepting tasks and discard the ones still pending.
    pub fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            let discarded = self.rx.try_iter().count();
            if discarded > 0 {
                log::debug!(
                    "render queue closed with {} pending task(s), discarding them",
                    discarded
                );
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        !self.open.load(Ordering::SeqCst)
    }

    /// Number of tasks waiting for the next drain.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl<S: 'static> Default for RenderQueue<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: 'static> Drop for RenderQueue<S> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<S: 'static> Debug for RenderQueue<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderQueue")
            .field("pending", &self.rx.len())
            .field("open", &self.open.load(Ordering::Relaxed))
            .finish()
    }
}

/// Cloneable, `Send` handle for posting onto a [`RenderQueue`].
pub struct RenderPoster<S: 'static> {
    tx: Sender<RenderTask<S>>,
    open: Arc<AtomicBool>,
}

impl<S: 'static> RenderPoster<S> {
    /// Enqueue `task` to run on the render thread before its next frame.
    ///
    /// Returns `false` if the queue no longer accepts work, including when it
    /// is closed while posting. The task never runs in that case and no error
    /// is raised.
    pub fn post<F>(&self, task: F) -> bool
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        if !self.open.load(Ordering::SeqCst) {
            log::debug!("render queue is closed, dropping posted task");
            return false;
        }
        match self.tx.send(Box::new(task)) {
            // closed between the check and the send: the task will never run
            Ok(()) if !self.open.load(Ordering::SeqCst) => {
                log::debug!("render queue closed while posting, dropping posted task");
                false
            }
            Ok(()) => true,
            Err(_) => {
                log::debug!("render queue is gone, dropping posted task");
                false
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        !self.open.load(Ordering::SeqCst)
    }
}

// Manual impl: `S` itself never needs to be `Clone`.
impl<S: 'static> Clone for RenderPoster<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            open: self.open.clone(),
        }
    }
}

impl<S: 'static> Debug for RenderPoster<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RenderPoster")
    }
}
