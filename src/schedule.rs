//! One-shot deferred tasks that fire on a timer thread and execute on the
//! render thread.
//!
//! A [`DeferredTask`] owns a dedicated timer thread. The thread waits on either
//! the deadline or a cancel signal. When the deadline wins, it posts the action
//! through a [`RenderPoster`]; the render loop then runs it between two frames
//! when it drains its [`crate::post::RenderQueue`]. The timer thread never
//! touches render state itself.
//!
//! ```text
//! Scheduled -> Fired -> Posted -> Executed
//!     |          |        |
//!     +----------+--------+----> Cancelled
//! ```
//!
//! Cancelling never joins the timer thread.

use std::{
    fmt::Debug,
    sync::{
        Arc,
        atomic::{AtomicU8, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::{Sender, after, bounded, select};

use crate::post::RenderPoster;

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("could not spawn the timer thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Lifecycle of a [`DeferredTask`].
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Waiting for the deadline.
    Scheduled = 0,
    /// The deadline passed and the timer thread is posting the action.
    Fired = 1,
    /// The action sits in the render queue.
    Posted = 2,
    /// The action ran on the render thread.
    Executed = 3,
    /// The task was cancelled before the action ran.
    Cancelled = 4,
}

impl TaskState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => TaskState::Scheduled,
            1 => TaskState::Fired,
            2 => TaskState::Posted,
            3 => TaskState::Executed,
            _ => TaskState::Cancelled,
        }
    }

    /// Whether the task can no longer change state.
    pub fn is_final(&self) -> bool {
        matches!(self, TaskState::Executed | TaskState::Cancelled)
    }
}

#[derive(Debug)]
struct SharedState(AtomicU8);

impl SharedState {
    fn get(&self) -> TaskState {
        TaskState::from_u8(self.0.load(Ordering::SeqCst))
    }

    fn transition(&self, from: TaskState, to: TaskState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Claim the right to run the action. Fails once cancelled or executed.
    fn claim_execution(&self) -> bool {
        self.0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |raw| {
                match TaskState::from_u8(raw) {
                    TaskState::Fired | TaskState::Posted => Some(TaskState::Executed as u8),
                    _ => None,
                }
            })
            .is_ok()
    }

    /// Move any non-final state to `Cancelled`.
    fn cancel(&self) -> bool {
        self.0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |raw| {
                if TaskState::from_u8(raw).is_final() {
                    None
                } else {
                    Some(TaskState::Cancelled as u8)
                }
            })
            .is_ok()
    }
}

/// A single action scheduled to run on the render thread after a delay.
///
/// Dropping the task cancels it.
pub struct DeferredTask {
    name: String,
    state: Arc<SharedState>,
    cancel_tx: Sender<()>,
    scheduled_at: Instant,
    delay: Duration,
}

impl DeferredTask {
    /// Schedule `action` to run on the render thread owning `poster`'s queue,
    /// no earlier than `delay` from now.
    pub fn schedule<S, F>(
        name: impl Into<String>,
        delay: Duration,
        poster: RenderPoster<S>,
        action: F,
    ) -> Result<Self, ScheduleError>
    where
        S: 'static,
        F: FnOnce(&mut S) + Send + 'static,
    {
        let name = name.into();
        let state = Arc::new(SharedState(AtomicU8::new(TaskState::Scheduled as u8)));
        let (cancel_tx, cancel_rx) = bounded::<()>(1);
        let scheduled_at = Instant::now();

        let timer_state = state.clone();
        let timer_name = name.clone();
        // The handle is dropped on purpose: the timer thread is never joined.
        let _timer = thread::Builder::new()
            .name(format!("deferred-{}", name))
            .spawn(move || {
                select! {
                    // Either an explicit cancel or the task handle being dropped.
                    recv(cancel_rx) -> _ => {
                        timer_state.cancel();
                        log::debug!("deferred task '{}' cancelled before firing", timer_name);
                        return;
                    }
                    recv(after(delay)) -> _ => {}
                }
                if !timer_state.transition(TaskState::Scheduled, TaskState::Fired) {
                    // Cancelled while the deadline was being delivered.
                    return;
                }
                log::debug!(
                    "deferred task '{}' fired after {:?}",
                    timer_name,
                    scheduled_at.elapsed()
                );

                let exec_state = timer_state.clone();
                let exec_name = timer_name.clone();
                let posted = poster.post(move |target: &mut S| {
                    if exec_state.claim_execution() {
                        log::info!("running deferred task '{}'", exec_name);
                        action(target);
                    } else {
                        log::debug!("deferred task '{}' was cancelled, skipping", exec_name);
                    }
                });
                if posted {
                    // The render thread may already have executed it.
                    timer_state.transition(TaskState::Fired, TaskState::Posted);
                } else {
                    timer_state.cancel();
                }
            })?;

        Ok(Self {
            name,
            state,
            cancel_tx,
            scheduled_at,
            delay,
        })
    }

    /// Cancel the task without waiting for the timer thread.
    ///
    /// Has no effect once the action executed. Calling it again is harmless.
    pub fn cancel(&self) {
        if self.state.cancel() {
            log::debug!("cancelling deferred task '{}'", self.name);
        }
        // Full channel means a cancel is already on its way.
        let _ = self.cancel_tx.try_send(());
    }

    pub fn state(&self) -> TaskState {
        self.state.get()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scheduled_at(&self) -> Instant {
        self.scheduled_at
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Drop for DeferredTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl Debug for DeferredTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredTask")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("delay", &self.delay)
            .finish()
    }
}
