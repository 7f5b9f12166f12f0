//! Driver — runs a `ChatEngine` on tokio so bot messages arrive on time.
//!
//! DESIGN
//! ======
//! The engine sits behind `Arc<Mutex<_>>`. A background task sleeps until
//! the engine's next due instant (or until a host action wakes it), polls
//! the engine under the lock, and forwards deliveries and typing changes to
//! the host over an mpsc channel.
//!
//! Deliveries only ever come out of the engine's own queue, taken under the
//! same lock that `close()` clears it under. Every event is stamped with the
//! engine generation it was polled in, and [`ChatEvents`] drops any event
//! whose stamp is older than the engine's current generation. Events already
//! buffered in the channel when `close()` runs never reach the host.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::chat::{ChatEngine, ChatError, Message, TextOutcome};
use crate::flow::FlowOption;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// What the host needs to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    Delivered(Message),
    Typing(bool),
}

/// An event tagged with the session generation that produced it.
#[derive(Debug)]
struct Stamped {
    generation: u64,
    event: ChatEvent,
}

/// Receiving half of a driver. Yields only events from the current session.
pub struct ChatEvents {
    rx: mpsc::Receiver<Stamped>,
    engine: Arc<Mutex<ChatEngine>>,
}

impl ChatEvents {
    /// Next current-session event, or `None` once the delivery task is gone.
    pub async fn recv(&mut self) -> Option<ChatEvent> {
        while let Some(stamped) = self.rx.recv().await {
            if let Some(event) = self.admit(stamped) {
                return Some(event);
            }
        }
        None
    }

    /// Non-blocking [`ChatEvents::recv`]. `None` when nothing current is buffered.
    pub fn try_recv(&mut self) -> Option<ChatEvent> {
        while let Ok(stamped) = self.rx.try_recv() {
            if let Some(event) = self.admit(stamped) {
                return Some(event);
            }
        }
        None
    }

    fn admit(&self, stamped: Stamped) -> Option<ChatEvent> {
        let current = lock(&self.engine).generation();
        if stamped.generation == current {
            Some(stamped.event)
        } else {
            debug!(stale = stamped.generation, current, "dropped event from a closed session");
            None
        }
    }
}

/// Host-side handle to a running chat session.
pub struct ChatDriver {
    engine: Arc<Mutex<ChatEngine>>,
    wake: Arc<Notify>,
    task: JoinHandle<()>,
}

impl ChatDriver {
    /// Spawn the delivery task. Must be called inside a tokio runtime.
    #[must_use]
    pub fn spawn(engine: ChatEngine) -> (Self, ChatEvents) {
        let engine = Arc::new(Mutex::new(engine));
        let wake = Arc::new(Notify::new());
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let task = tokio::spawn(delivery_loop(Arc::clone(&engine), Arc::clone(&wake), tx));
        let events = ChatEvents { rx, engine: Arc::clone(&engine) };
        (Self { engine, wake, task }, events)
    }

    /// See [`ChatEngine::start`].
    pub fn start(&self) -> bool {
        let started = self.lock().start();
        self.wake.notify_one();
        started
    }

    /// See [`ChatEngine::select_option`].
    ///
    /// # Errors
    ///
    /// Same as [`ChatEngine::select_option`].
    pub fn select_option(&self, option: &FlowOption) -> Result<(), ChatError> {
        let result = self.lock().select_option(option);
        self.wake.notify_one();
        result
    }

    /// Select an offered option by its typed id.
    ///
    /// # Errors
    ///
    /// `OptionNotOffered` if no offered option has this id.
    pub fn select_option_id(&self, id: &str) -> Result<(), ChatError> {
        let result = {
            let mut engine = self.lock();
            let option = engine.offered().iter().find(|o| o.id == id).cloned();
            match option {
                Some(option) => engine.select_option(&option),
                None if !engine.is_active() => Err(ChatError::NotStarted),
                None => Err(ChatError::OptionNotOffered { id: id.to_string() }),
            }
        };
        self.wake.notify_one();
        result
    }

    /// See [`ChatEngine::submit_text`].
    ///
    /// # Errors
    ///
    /// Same as [`ChatEngine::submit_text`].
    pub fn submit_text(&self, text: &str) -> Result<TextOutcome, ChatError> {
        let result = self.lock().submit_text(text);
        self.wake.notify_one();
        result
    }

    /// See [`ChatEngine::close`].
    pub fn close(&self) {
        self.lock().close();
        self.wake.notify_one();
    }

    /// Run `f` against the engine under the lock.
    pub fn with_engine<R>(&self, f: impl FnOnce(&ChatEngine) -> R) -> R {
        f(&self.lock())
    }

    /// Close the session and stop the delivery task.
    pub fn shutdown(self) {
        self.close();
        self.task.abort();
    }

    fn lock(&self) -> MutexGuard<'_, ChatEngine> {
        lock(&self.engine)
    }
}

fn lock(engine: &Mutex<ChatEngine>) -> MutexGuard<'_, ChatEngine> {
    engine.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn delivery_loop(engine: Arc<Mutex<ChatEngine>>, wake: Arc<Notify>, tx: mpsc::Sender<Stamped>) {
    let mut typing = false;
    let mut typing_generation = 0;
    loop {
        let (delivered, generation, now_typing, next_due) = {
            let mut engine = lock(&engine);
            let delivered = engine.poll();
            (delivered, engine.generation(), engine.is_typing(), engine.next_due())
        };
        // A new session starts with no indicator shown.
        if generation != typing_generation {
            typing = false;
            typing_generation = generation;
        }

        for message in delivered {
            if lock(&engine).generation() != generation {
                debug!(id = %message.id, "session closed before forwarding; dropped");
                break;
            }
            debug!(id = %message.id, "forwarding bot message");
            if tx.send(Stamped { generation, event: ChatEvent::Delivered(message) }).await.is_err() {
                return;
            }
        }
        if now_typing != typing {
            typing = now_typing;
            if tx.send(Stamped { generation, event: ChatEvent::Typing(typing) }).await.is_err() {
                return;
            }
        }

        match next_due {
            Some(due) => {
                tokio::select! {
                    () = tokio::time::sleep_until(due.into()) => {}
                    () = wake.notified() => {}
                }
            }
            None => wake.notified().await,
        }
    }
}

#[cfg(test)]
#[path = "driver_test.rs"]
mod tests;
